//! Projective mapping between the two sensor planes.
//!
//! A first estimate of the eight coefficients comes from a linear least-squares fit on
//! point correspondences, which is then refined with a derivative-free search on the
//! intensity difference between the left image and the warped right image.

pub mod settings;
pub mod simplex;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::{debug, info};
use nalgebra::{Point2, SMatrix, SVector};
use thiserror::Error;

use crate::math::{invert, InverseError};
use crate::raster::{ImageError, IntensityImage, SensorImage};

pub use settings::EstimatorSettings;
pub use simplex::{Minimizer, Minimum, NelderMead};

/// Fewest correspondences that determine the eight coefficients
pub const MIN_CORRESPONDENCES: usize = 4;

pub const WARPED_IMAGE_FILE: &str = "right_projected_to_left.tif";
pub const DIFFERENCE_IMAGE_FILE: &str = "projection_diff.tif";

#[derive(Debug, Error)]
pub enum HomographyError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("correspondences line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("at least 4 correspondences are needed, found {0}")]
    TooFewCorrespondences(usize),

    #[error("correspondences do not determine a projective transform: {0}")]
    Singular(#[from] InverseError),

    #[error("expected {expected} parameters, found {found}")]
    ParameterCount { expected: usize, found: usize },

    #[error("simplex refinement did not converge within {iterations} iterations")]
    NotConverged { iterations: u64 },

    #[error("could not write the estimation report: {0}")]
    Report(#[source] io::Error),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Solver(#[from] anyhow::Error),
}

/// A point seen at `left` on sensor 0 and at `right` on sensor 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointCorrespondence {
    pub left: Point2<f64>,
    pub right: Point2<f64>,
}

impl PointCorrespondence {
    pub fn new(left: Point2<f64>, right: Point2<f64>) -> Self {
        Self { left, right }
    }
}

/// Parses `xl yl xr yr` lines, skipping blank ones.
pub fn parse_correspondences(content: &str) -> Result<Vec<PointCorrespondence>, HomographyError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            let line_number = index + 1;
            let (xl, yl, xr, yr) = line
                .split_whitespace()
                .collect_tuple::<(&str, &str, &str, &str)>()
                .ok_or_else(|| HomographyError::Parse {
                    line: line_number,
                    reason: format!(
                        "expected 4 values (xl yl xr yr), found {}",
                        line.split_whitespace().count()
                    ),
                })?;

            let value = |token: &str| {
                token.parse::<f64>().map_err(|_| HomographyError::Parse {
                    line: line_number,
                    reason: format!("'{token}' is not a number"),
                })
            };

            Ok(PointCorrespondence::new(
                Point2::new(value(xl)?, value(yl)?),
                Point2::new(value(xr)?, value(yr)?),
            ))
        })
        .collect()
}

pub fn read_correspondences(
    path: impl AsRef<Path>,
) -> Result<Vec<PointCorrespondence>, HomographyError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| HomographyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_correspondences(&content)
}

/// Pixel rows and columns compared by the photometric objective
struct Region {
    xs: Range<usize>,
    ys: Range<usize>,
}

impl Region {
    fn central(width: usize, height: usize, border_fraction: f64) -> Self {
        Self {
            xs: central_range(width, border_fraction),
            ys: central_range(height, border_fraction),
        }
    }

    fn pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.ys
            .clone()
            .flat_map(move |y| self.xs.clone().map(move |x| (x, y)))
    }
}

fn central_range(len: usize, border_fraction: f64) -> Range<usize> {
    let len_f = len as f64;
    let start = (border_fraction * len_f) as usize;
    let end = ((1.0 - border_fraction) * len_f).ceil() as usize;
    start..end.min(len)
}

/// Maps sensor 0 pixels onto sensor 1:
///
/// ```text
/// xr = (h0 xl + h1 yl + h2) / (h6 xl + h7 yl + 1)
/// yr = (h3 xl + h4 yl + h5) / (h6 xl + h7 yl + 1)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectiveTransform {
    coefficients: [f64; 8],
}

impl ProjectiveTransform {
    pub fn new(coefficients: [f64; 8]) -> Self {
        Self { coefficients }
    }

    pub fn identity() -> Self {
        Self::new([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0])
    }

    pub fn coefficients(&self) -> &[f64; 8] {
        &self.coefficients
    }

    pub fn map(&self, point: &Point2<f64>) -> Point2<f64> {
        let h = &self.coefficients;
        let w = h[6] * point.x + h[7] * point.y + 1.0;
        Point2::new(
            (h[0] * point.x + h[1] * point.y + h[2]) / w,
            (h[3] * point.x + h[4] * point.y + h[5]) / w,
        )
    }

    /// Linear least-squares fit through the normal equations.
    pub fn fit(correspondences: &[PointCorrespondence]) -> Result<Self, HomographyError> {
        if correspondences.len() < MIN_CORRESPONDENCES {
            return Err(HomographyError::TooFewCorrespondences(
                correspondences.len(),
            ));
        }

        let mut normal = SMatrix::<f64, 8, 8>::zeros();
        let mut rhs = SVector::<f64, 8>::zeros();
        for c in correspondences {
            let (xl, yl) = (c.left.x, c.left.y);
            let (xr, yr) = (c.right.x, c.right.y);

            let row_x = SVector::from([xl, yl, 1.0, 0.0, 0.0, 0.0, -xl * xr, -yl * xr]);
            let row_y = SVector::from([0.0, 0.0, 0.0, xl, yl, 1.0, -xl * yr, -yl * yr]);
            normal += row_x * row_x.transpose() + row_y * row_y.transpose();
            rhs += row_x * xr + row_y * yr;
        }

        let solution = invert(&normal)? * rhs;
        let transform = Self::new(solution.into());
        debug!(
            "linear projective fit on {} correspondences: {:?}",
            correspondences.len(),
            transform.coefficients
        );
        Ok(transform)
    }

    /// Mean squared difference between `left` and `right` warped by this transform,
    /// over the central part of `left`. Infinite when no pixel maps inside `right`.
    pub fn photometric_residual<L, R>(&self, left: &L, right: &R, border_fraction: f64) -> f64
    where
        L: SensorImage + ?Sized,
        R: SensorImage + ?Sized,
    {
        let region = Region::central(left.width(), left.height(), border_fraction);
        photometric_residual(&self.coefficients, left, right, &region)
    }

    /// Refines the coefficients by minimising the photometric residual.
    ///
    /// Returns the refined transform and the number of iterations used.
    pub fn refine<L, R>(
        &self,
        left: &L,
        right: &R,
        settings: &EstimatorSettings,
        minimizer: &dyn Minimizer,
    ) -> Result<(Self, u64), HomographyError>
    where
        L: SensorImage + ?Sized,
        R: SensorImage + ?Sized,
    {
        let region = Region::central(left.width(), left.height(), settings.border_fraction);
        let objective = |params: &[f64]| match <&[f64; 8]>::try_from(params) {
            Ok(coefficients) => photometric_residual(coefficients, left, right, &region),
            Err(_) => f64::INFINITY,
        };

        let minimum = minimizer.minimize(
            &self.coefficients,
            &settings.step_sizes,
            &objective,
            settings.max_iterations,
            settings.tolerance,
        )?;
        if !minimum.converged {
            return Err(HomographyError::NotConverged {
                iterations: minimum.iterations,
            });
        }

        let found = minimum.params.len();
        let coefficients: [f64; 8] = minimum
            .params
            .try_into()
            .map_err(|_| HomographyError::ParameterCount { expected: 8, found })?;
        debug!(
            "simplex refinement converged after {} iterations: {coefficients:?}",
            minimum.iterations
        );
        Ok((Self::new(coefficients), minimum.iterations))
    }

    /// Renders the right image warped onto the left frame and the left minus warped
    /// difference, both over the central region only.
    pub fn render_diagnostics<L, R>(
        &self,
        left: &L,
        right: &R,
        border_fraction: f64,
    ) -> (IntensityImage, IntensityImage)
    where
        L: SensorImage + ?Sized,
        R: SensorImage + ?Sized,
    {
        let (width, height) = (left.width(), left.height());
        let mut warped = IntensityImage::new(width, height);
        let mut difference = IntensityImage::new(width, height);

        for (x, y) in Region::central(width, height, border_fraction).pixels() {
            let p = self.map(&Point2::new(x as f64, y as f64));
            let value = right.sample(p.x, p.y).unwrap_or(0.0);
            warped.set(x, y, value as f32);
            difference.set(x, y, (left.intensity(x, y) - value) as f32);
        }

        (warped, difference)
    }

    /// Writes the diagnostic images as 8-bit TIFF files into `dir`.
    pub fn write_diagnostic_images<L, R>(
        &self,
        left: &L,
        right: &R,
        border_fraction: f64,
        dir: impl AsRef<Path>,
    ) -> Result<(), HomographyError>
    where
        L: SensorImage + ?Sized,
        R: SensorImage + ?Sized,
    {
        let dir = dir.as_ref();
        let (warped, difference) = self.render_diagnostics(left, right, border_fraction);
        warped.save(dir.join(WARPED_IMAGE_FILE))?;
        difference.save(dir.join(DIFFERENCE_IMAGE_FILE))?;
        info!("wrote projection diagnostics to {}", dir.display());
        Ok(())
    }
}

impl Default for ProjectiveTransform {
    fn default() -> Self {
        Self::identity()
    }
}

fn photometric_residual<L, R>(coefficients: &[f64; 8], left: &L, right: &R, region: &Region) -> f64
where
    L: SensorImage + ?Sized,
    R: SensorImage + ?Sized,
{
    let transform = ProjectiveTransform::new(*coefficients);
    let (sum, count) = region
        .pixels()
        .filter_map(|(x, y)| {
            let p = transform.map(&Point2::new(x as f64, y as f64));
            right.sample(p.x, p.y).map(|value| left.intensity(x, y) - value)
        })
        .fold((0.0, 0usize), |(sum, count), d| (sum + d * d, count + 1));

    if count == 0 {
        f64::INFINITY
    } else {
        sum / count as f64
    }
}

/// Coefficients before and after photometric refinement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimationReport {
    pub initial: ProjectiveTransform,
    pub refined: ProjectiveTransform,
    pub iterations: u64,
}

impl EstimationReport {
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "Projection parameters from point matching:")?;
        for c in self.initial.coefficients() {
            writeln!(writer, "{c:e}")?;
        }
        writeln!(writer, "Projection parameters after simplex optimization:")?;
        for c in self.refined.coefficients() {
            writeln!(writer, "{c:e}")?;
        }
        writeln!(writer, "Optimization took {} iterations", self.iterations)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), HomographyError> {
        let file = File::create(path).map_err(HomographyError::Report)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer).map_err(HomographyError::Report)?;
        writer.flush().map_err(HomographyError::Report)
    }
}

/// Fits the transform on `correspondences`, refines it on the images, then writes the
/// report and diagnostic images requested by `settings`.
pub fn estimate<L, R>(
    correspondences: &[PointCorrespondence],
    left: &L,
    right: &R,
    settings: &EstimatorSettings,
    minimizer: &dyn Minimizer,
) -> Result<EstimationReport, HomographyError>
where
    L: SensorImage + ?Sized,
    R: SensorImage + ?Sized,
{
    let initial = ProjectiveTransform::fit(correspondences)?;
    let (refined, iterations) = initial.refine(left, right, settings, minimizer)?;
    let report = EstimationReport {
        initial,
        refined,
        iterations,
    };

    if let Some(path) = &settings.report_path {
        report.save(path)?;
    }
    if let Some(dir) = &settings.diagnostic_images_dir {
        refined.write_diagnostic_images(left, right, settings.border_fraction, dir)?;
    }

    Ok(report)
}
