//! Stereo calibration data and the two on-disk calibration formats.
//!
//! The format is chosen by the file extension only: `.xml` files are read as vic3D
//! calibration exports, `.txt` files as the generic one-value-per-line format.

pub mod text;
pub mod vic3d;

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use log::debug;
use nalgebra::{self as na, Matrix4, Point2};
use thiserror::Error;

use crate::camera::{CameraId, CameraIntrinsics};
use crate::math::InverseError;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("could not read calibration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unrecognized calibration file format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("expected 22 or 28 calibration values, found {0}")]
    ValueCount(usize),

    #[error("invalid principal point for camera {camera}: cx={cx}, cy={cy}")]
    InvalidPrincipalPoint { camera: usize, cx: f64, cy: f64 },

    #[error(transparent)]
    Inverse(#[from] InverseError),
}

/// Calibration of a two-camera rig.
///
/// Camera 0 is the reference frame: `extrinsics` maps camera-0 coordinates into
/// camera-1 coordinates and `world_transform` maps camera-0 coordinates into world
/// coordinates. The data never changes once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoCalibration<F> {
    intrinsics: [CameraIntrinsics<F>; 2],
    extrinsics: Matrix4<F>,
    world_transform: Matrix4<F>,
}

impl<F: na::RealField + Copy + Debug> StereoCalibration<F> {
    /// Creates a calibration after checking both principal points.
    pub fn try_new(
        intrinsics: [CameraIntrinsics<F>; 2],
        extrinsics: Matrix4<F>,
        world_transform: Matrix4<F>,
    ) -> Result<Self, CalibrationError> {
        for (camera, cam) in intrinsics.iter().enumerate() {
            if !cam.has_valid_principal_point() {
                return Err(CalibrationError::InvalidPrincipalPoint {
                    camera,
                    cx: cam.cx.to_subset_unchecked(),
                    cy: cam.cy.to_subset_unchecked(),
                });
            }
        }

        Ok(Self {
            intrinsics,
            extrinsics,
            world_transform,
        })
    }

    pub fn intrinsics(&self, camera: CameraId) -> &CameraIntrinsics<F> {
        &self.intrinsics[camera.index()]
    }

    /// Camera-0 to camera-1 transform
    pub fn extrinsics(&self) -> &Matrix4<F> {
        &self.extrinsics
    }

    /// Camera-0 to world transform
    pub fn world_transform(&self) -> &Matrix4<F> {
        &self.world_transform
    }

    /// Applies the one-pass radial correction of `camera` to a sensor point.
    pub fn correct_lens_distortion(&self, point: &Point2<F>, camera: CameraId) -> Point2<F> {
        self.intrinsics(camera).correct_radial_distortion(point)
    }

    fn log_parameters(&self) {
        for (camera, cam) in self.intrinsics.iter().enumerate() {
            debug!("camera {camera} intrinsics: {cam:?}");
        }
        debug!("camera 0 to camera 1 transform: {}", self.extrinsics);
        debug!("camera 0 to world transform: {}", self.world_transform);
    }
}

impl StereoCalibration<f64> {
    /// Loads a calibration file, dispatching on its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let parse: fn(&str) -> Result<Self, CalibrationError> = match extension.as_deref() {
            Some("xml") => {
                debug!("reading {} as a vic3D calibration", path.display());
                Self::from_vic3d_str
            }
            Some("txt") => {
                debug!("reading {} as a generic text calibration", path.display());
                Self::from_text_str
            }
            _ => return Err(CalibrationError::UnsupportedFormat(path.to_path_buf())),
        };

        let content = std::fs::read_to_string(path).map_err(|source| CalibrationError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let calibration = parse(&content)?;
        calibration.log_parameters();
        Ok(calibration)
    }

    /// Parses the content of a vic3D calibration file.
    pub fn from_vic3d_str(content: &str) -> Result<Self, CalibrationError> {
        vic3d::parse(content)
    }

    /// Parses the content of a generic text calibration file.
    pub fn from_text_str(content: &str) -> Result<Self, CalibrationError> {
        text::parse(content)
    }
}

/// Splits a line on whitespace and angle brackets.
pub(crate) fn tokenize(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c.is_whitespace() || c == '<' || c == '>')
        .filter(|token| !token.is_empty())
}

pub(crate) fn parse_scalar(token: &str, line: usize) -> Result<f64, CalibrationError> {
    token.parse::<f64>().map_err(|_| CalibrationError::Parse {
        line,
        reason: format!("'{token}' is not a number"),
    })
}

/// Parses the first `N` tokens into an array; the caller checks there are enough.
pub(crate) fn parse_array<const N: usize>(
    tokens: &[&str],
    line: usize,
) -> Result<[f64; N], CalibrationError> {
    let mut values = [0.0; N];
    for (value, token) in values.iter_mut().zip(tokens) {
        *value = parse_scalar(token, line)?;
    }
    Ok(values)
}
