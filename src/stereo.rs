//! Entry point tying a loaded calibration to an optional sensor-to-sensor mapping.

use std::path::Path;

use log::info;
use nalgebra::{Point2, Point3};
use thiserror::Error;

use crate::calibration::{CalibrationError, StereoCalibration};
use crate::homography::{
    self, read_correspondences, EstimationReport, EstimatorSettings, Minimizer,
    PointCorrespondence, ProjectiveTransform,
};
use crate::raster::{IntensityImage, SensorImage};
use crate::triangulation::{TriangulatedPoint, TriangulationError};
use crate::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("no projective transform has been estimated yet")]
    NotEstimated,

    #[error("the projective transform has already been estimated")]
    AlreadyEstimated,
}

/// A calibrated stereo rig.
///
/// The calibration is fixed at construction. The projective transform between the
/// sensors can be estimated once; every other operation only reads.
#[derive(Debug, Clone)]
pub struct StereoSystem {
    calibration: StereoCalibration<f64>,
    estimation: Option<EstimationReport>,
}

impl StereoSystem {
    pub fn new(calibration: StereoCalibration<f64>) -> Self {
        Self {
            calibration,
            estimation: None,
        }
    }

    /// Loads a `.xml` (vic3D) or `.txt` calibration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CalibrationError> {
        StereoCalibration::load(path).map(Self::new)
    }

    pub fn calibration(&self) -> &StereoCalibration<f64> {
        &self.calibration
    }

    pub fn triangulate(
        &self,
        left: &Point2<f64>,
        right: &Point2<f64>,
        correct_distortion: bool,
    ) -> Result<TriangulatedPoint<f64>, TriangulationError> {
        self.calibration.triangulate(left, right, correct_distortion)
    }

    pub fn triangulate_all<I>(
        &self,
        pairs: I,
        correct_distortion: bool,
    ) -> Vec<Result<TriangulatedPoint<f64>, TriangulationError>>
    where
        I: IntoIterator<Item = (Point2<f64>, Point2<f64>)>,
    {
        self.calibration.triangulate_all(pairs, correct_distortion)
    }

    pub fn project_camera0_to_sensor1(
        &self,
        point: &Point3<f64>,
    ) -> Result<Point2<f64>, TriangulationError> {
        self.calibration.project_camera0_to_sensor1(point)
    }

    /// Estimates and stores the left to right sensor mapping.
    ///
    /// Fails with [`StateError::AlreadyEstimated`] on a second call; the stored
    /// transform is never replaced.
    pub fn estimate_projective_transform<L, R>(
        &mut self,
        correspondences: &[PointCorrespondence],
        left: &L,
        right: &R,
        settings: &EstimatorSettings,
        minimizer: &dyn Minimizer,
    ) -> Result<&EstimationReport, Error>
    where
        L: SensorImage + ?Sized,
        R: SensorImage + ?Sized,
    {
        if self.estimation.is_some() {
            return Err(StateError::AlreadyEstimated.into());
        }

        let report = homography::estimate(correspondences, left, right, settings, minimizer)?;
        info!(
            "projective transform estimated in {} iterations: {:?}",
            report.iterations,
            report.refined.coefficients()
        );
        Ok(self.estimation.insert(report))
    }

    /// Same as [`Self::estimate_projective_transform`], reading the correspondences
    /// and both images from disk.
    pub fn estimate_projective_transform_from_files(
        &mut self,
        correspondences: impl AsRef<Path>,
        left: impl AsRef<Path>,
        right: impl AsRef<Path>,
        settings: &EstimatorSettings,
        minimizer: &dyn Minimizer,
    ) -> Result<&EstimationReport, Error> {
        let correspondences = read_correspondences(correspondences)?;
        let left = IntensityImage::open(left)?;
        let right = IntensityImage::open(right)?;
        self.estimate_projective_transform(&correspondences, &left, &right, settings, minimizer)
    }

    pub fn projective_transform(&self) -> Option<&ProjectiveTransform> {
        self.estimation.as_ref().map(|report| &report.refined)
    }

    pub fn estimation_report(&self) -> Option<&EstimationReport> {
        self.estimation.as_ref()
    }

    /// Maps a camera 0 sensor point onto the camera 1 sensor with the estimated transform.
    pub fn project_left_to_right_sensor(
        &self,
        point: &Point2<f64>,
    ) -> Result<Point2<f64>, StateError> {
        self.projective_transform()
            .map(|transform| transform.map(point))
            .ok_or(StateError::NotEstimated)
    }
}

impl From<StereoCalibration<f64>> for StereoSystem {
    fn from(calibration: StereoCalibration<f64>) -> Self {
        Self::new(calibration)
    }
}
