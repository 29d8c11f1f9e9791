//! Configuration of the projective transform estimation.

use std::path::PathBuf;

/// Initial simplex step per coefficient: the linear terms move by a thousandth, the
/// translations by a pixel and the perspective terms by a ten-thousandth.
pub const DEFAULT_STEP_SIZES: [f64; 8] = [0.001, 0.001, 1.0, 0.001, 0.001, 1.0, 0.0001, 0.0001];

/// Settings of the simplex refinement and of the optional diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorSettings {
    /// Iteration cap of the simplex search
    pub max_iterations: u64,
    /// Convergence threshold on the spread of the simplex costs
    pub tolerance: f64,
    pub step_sizes: [f64; 8],
    /// Fraction of the frame excluded on each side when comparing intensities
    pub border_fraction: f64,
    /// Where to write the coefficient report, if anywhere
    pub report_path: Option<PathBuf>,
    /// Directory receiving the warped and difference images, if any
    pub diagnostic_images_dir: Option<PathBuf>,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-5,
            step_sizes: DEFAULT_STEP_SIZES,
            border_fraction: 0.05,
            report_path: None,
            diagnostic_images_dir: None,
        }
    }
}

impl EstimatorSettings {
    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_step_sizes(mut self, step_sizes: [f64; 8]) -> Self {
        self.step_sizes = step_sizes;
        self
    }

    pub fn with_border_fraction(mut self, border_fraction: f64) -> Self {
        self.border_fraction = border_fraction;
        self
    }

    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    pub fn with_diagnostic_images(mut self, dir: impl Into<PathBuf>) -> Self {
        self.diagnostic_images_dir = Some(dir.into());
        self
    }
}
