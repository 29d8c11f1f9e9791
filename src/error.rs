use crate::calibration::CalibrationError;
use crate::homography::HomographyError;
use crate::math::InverseError;
use crate::raster::ImageError;
use crate::stereo::StateError;
use crate::triangulation::TriangulationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Triangulation(#[from] TriangulationError),

    #[error(transparent)]
    Homography(#[from] HomographyError),

    #[error(transparent)]
    Inverse(#[from] InverseError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Unknown error: {0}")]
    Unknown(#[from] anyhow::Error),
}
