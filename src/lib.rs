pub mod calibration;
pub mod camera;
mod error;
pub mod homography;
pub mod math;
pub mod raster;
pub mod stereo;
pub mod triangulation;

pub use calibration::StereoCalibration;
pub use camera::{CameraId, CameraIntrinsics};
pub use error::Error;
pub use homography::{EstimatorSettings, NelderMead, PointCorrespondence, ProjectiveTransform};
pub use raster::{IntensityImage, SensorImage};
pub use stereo::StereoSystem;
pub use triangulation::TriangulatedPoint;
