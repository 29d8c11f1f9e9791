use std::fmt::Debug;

use log::{trace, warn};
use nalgebra::{self as na, Matrix4x3, Point2, Point3, Vector4};
use thiserror::Error;

use crate::calibration::StereoCalibration;
use crate::camera::CameraId;
use crate::math::{invert, transform_point, InverseError};

/// Per-point failures; they never invalidate the calibration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TriangulationError {
    #[error("could not invert the triangulation normal matrix: {0}")]
    Singular(#[from] InverseError),

    #[error("point has zero depth in camera 1")]
    ZeroDepth,
}

/// A triangulated point expressed in the camera 0 frame and in world coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangulatedPoint<F: na::Scalar> {
    pub camera: Point3<F>,
    pub world: Point3<F>,
}

impl<F: na::RealField + Copy + Debug> StereoCalibration<F> {
    /// Triangulates a pair of matching sensor points (camera 0, camera 1).
    ///
    /// Both perspective projections are linearised around the unknown camera 0 point,
    /// giving four equations in three unknowns that are solved in the least-squares
    /// sense through the normal equations.
    pub fn triangulate(
        &self,
        left: &Point2<F>,
        right: &Point2<F>,
        correct_distortion: bool,
    ) -> Result<TriangulatedPoint<F>, TriangulationError> {
        let (p0, p1) = if correct_distortion {
            (
                self.correct_lens_distortion(left, CameraId::Left),
                self.correct_lens_distortion(right, CameraId::Right),
            )
        } else {
            (*left, *right)
        };

        let zero = F::zero();
        let c0 = self.intrinsics(CameraId::Left);
        let c1 = self.intrinsics(CameraId::Right);
        let e = self.extrinsics();
        let cmx = c1.cx - p1.x;
        let cmy = c1.cy - p1.y;

        #[rustfmt::skip]
        let m = Matrix4x3::new(
            c0.fx, c0.fs, c0.cx - p0.x,
            zero, c0.fy, c0.cy - p0.y,
            cmx * e[(2, 0)] + c1.fx * e[(0, 0)] + c1.fs * e[(1, 0)],
            cmx * e[(2, 1)] + c1.fx * e[(0, 1)] + c1.fs * e[(1, 1)],
            cmx * e[(2, 2)] + c1.fx * e[(0, 2)] + c1.fs * e[(1, 2)],
            cmy * e[(2, 0)] + c1.fy * e[(1, 0)],
            cmy * e[(2, 1)] + c1.fy * e[(1, 1)],
            cmy * e[(2, 2)] + c1.fy * e[(1, 2)],
        );
        let r = Vector4::new(
            zero,
            zero,
            -c1.fx * e[(0, 3)] - c1.fs * e[(1, 3)] - cmx * e[(2, 3)],
            -c1.fy * e[(1, 3)] - cmy * e[(2, 3)],
        );

        let mtm_inv = invert(&m.tr_mul(&m))?;
        let camera = Point3::from(mtm_inv * m.tr_mul(&r));
        let world = transform_point(self.world_transform(), &camera);
        trace!("triangulated {p0} / {p1} to camera 0 {camera}, world {world}");

        Ok(TriangulatedPoint { camera, world })
    }

    /// Triangulates many pairs; a failing pair only fails its own entry.
    pub fn triangulate_all<I>(
        &self,
        pairs: I,
        correct_distortion: bool,
    ) -> Vec<Result<TriangulatedPoint<F>, TriangulationError>>
    where
        I: IntoIterator<Item = (Point2<F>, Point2<F>)>,
    {
        pairs
            .into_iter()
            .map(|(left, right)| self.triangulate(&left, &right, correct_distortion))
            .collect()
    }

    /// Projects a point given in the camera 0 frame onto the camera 1 sensor.
    ///
    /// Logs a warning when the recovered homogeneous scale is not close to one.
    pub fn project_camera0_to_sensor1(
        &self,
        point: &Point3<F>,
    ) -> Result<Point2<F>, TriangulationError> {
        let e = self.extrinsics();
        let psi = e[(2, 0)] * point.x + e[(2, 1)] * point.y + e[(2, 2)] * point.z + e[(2, 3)];
        if psi == F::zero() {
            return Err(TriangulationError::ZeroDepth);
        }

        let projection = self.intrinsics(CameraId::Right).projection_matrix(e);
        let h = projection * point.to_homogeneous() / psi;
        if (h.z - F::one()).abs() >= na::convert::<f64, F>(0.1) {
            warn!(
                "inconsistent depth when projecting {point} to camera 1: scale {}",
                h.z
            );
        }

        Ok(Point2::new(h.x, h.y))
    }
}
