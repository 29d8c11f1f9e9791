use nalgebra::{self as na, Matrix3, Matrix3x4, Matrix4, Point2};

/// One of the two cameras of the stereo rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraId {
    /// Camera 0, the reference frame for triangulated points
    Left,
    /// Camera 1
    Right,
}

impl CameraId {
    pub fn index(self) -> usize {
        match self {
            CameraId::Left => 0,
            CameraId::Right => 1,
        }
    }
}

/// Camera intrinsic parameters
///
/// Calibration files store the values in exactly this field order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics<F> {
    /// Principal point x coordinate (pixels)
    pub cx: F,
    /// Principal point y coordinate (pixels)
    pub cy: F,
    /// Focal length in x direction (pixels)
    pub fx: F,
    /// Focal length in y direction (pixels)
    pub fy: F,
    /// Skew
    pub fs: F,
    /// First radial distortion coefficient
    pub k1: F,
    /// Second radial distortion coefficient
    pub k2: F,
    /// Third radial distortion coefficient
    pub k3: F,
}

impl<F: Copy> From<[F; 8]> for CameraIntrinsics<F> {
    fn from([cx, cy, fx, fy, fs, k1, k2, k3]: [F; 8]) -> Self {
        Self {
            cx,
            cy,
            fx,
            fy,
            fs,
            k1,
            k2,
            k3,
        }
    }
}

impl<F: na::RealField + Copy> CameraIntrinsics<F> {
    /// Pinhole intrinsics without skew or lens distortion
    pub fn pinhole(cx: F, cy: F, fx: F, fy: F) -> Self {
        let zero = F::zero();
        Self::from([cx, cy, fx, fy, zero, zero, zero, zero])
    }

    /// Both principal point coordinates must be strictly positive; the distortion
    /// correction divides by them.
    pub fn has_valid_principal_point(&self) -> bool {
        self.cx > F::zero() && self.cy > F::zero()
    }

    /// The upper triangular camera matrix K
    pub fn camera_matrix(&self) -> Matrix3<F> {
        let zero = F::zero();
        let one = F::one();

        Matrix3::new(
            self.fx, self.fs, self.cx, //
            zero, self.fy, self.cy, //
            zero, zero, one,
        )
    }

    /// Computes the projection matrix P = K [I|0] T for a camera whose frame is reached
    /// through the homogeneous transform `transform`
    pub fn projection_matrix(&self, transform: &Matrix4<F>) -> Matrix3x4<F> {
        let mut k0 = Matrix3x4::<F>::zeros();
        k0.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&self.camera_matrix());

        k0 * transform
    }

    /// One-pass approximate radial undistortion of a sensor point.
    ///
    /// The radial factor is evaluated once at the distorted location and subtracted;
    /// this is not the exact inverse of the distortion model.
    pub fn correct_radial_distortion(&self, point: &Point2<F>) -> Point2<F> {
        let r1 = (point.x - self.cx) / self.cx;
        let r2 = (point.y - self.cy) / self.cy;
        let rho2 = r1 * r1 + r2 * r2;
        let factor = self.k1 * rho2 + self.k2 * rho2 * rho2 + self.k3 * rho2 * rho2 * rho2;

        Point2::new(
            point.x - factor * r1 * self.cx,
            point.y - factor * r2 * self.cy,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::cardan_bryan_transform;
    use approx::assert_relative_eq;

    fn distorted_intrinsics() -> CameraIntrinsics<f64> {
        CameraIntrinsics::from([320.0, 240.0, 1000.0, 1000.0, 0.0, 0.05, -0.01, 0.002])
    }

    #[test]
    fn test_no_distortion_is_identity() {
        let intrinsics = CameraIntrinsics::pinhole(320.0, 240.0, 1000.0, 1000.0);
        let p = Point2::new(17.5, 402.25);
        assert_eq!(intrinsics.correct_radial_distortion(&p), p);
    }

    #[test]
    fn test_principal_point_is_fixed() {
        let intrinsics = distorted_intrinsics();
        let p = Point2::new(320.0, 240.0);
        assert_eq!(intrinsics.correct_radial_distortion(&p), p);
    }

    #[test]
    fn test_single_pass_correction() {
        let intrinsics = distorted_intrinsics();
        let corrected = intrinsics.correct_radial_distortion(&Point2::new(480.0, 360.0));

        // r1 = 0.5, r2 = 0.5, rho2 = 0.5
        let factor: f64 = 0.05 * 0.5 - 0.01 * 0.25 + 0.002 * 0.125;
        assert_relative_eq!(corrected.x, 480.0 - factor * 0.5 * 320.0, epsilon = 1e-12);
        assert_relative_eq!(corrected.y, 360.0 - factor * 0.5 * 240.0, epsilon = 1e-12);

        // applying it twice keeps moving the point, there is no fixed-point iteration
        let twice = intrinsics.correct_radial_distortion(&corrected);
        assert!((twice.x - corrected.x).abs() > 1e-6);
    }

    #[test]
    fn test_principal_point_validation() {
        assert!(distorted_intrinsics().has_valid_principal_point());
        assert!(!CameraIntrinsics::pinhole(0.0, 240.0, 1000.0, 1000.0).has_valid_principal_point());
        assert!(!CameraIntrinsics::pinhole(320.0, -1.0, 1000.0, 1000.0).has_valid_principal_point());
    }

    #[test]
    fn test_projection_matrix_with_identity() {
        let intrinsics = CameraIntrinsics::from([320.0, 240.0, 800.0, 900.0, 2.0, 0.0, 0.0, 0.0]);
        let p = intrinsics.projection_matrix(&Matrix4::identity());

        assert_eq!(p.fixed_view::<3, 3>(0, 0).clone_owned(), intrinsics.camera_matrix());
        assert_eq!(p.column(3).clone_owned(), na::Vector3::zeros());
    }

    #[test]
    fn test_projection_matrix_with_translation() {
        let intrinsics = CameraIntrinsics::pinhole(320.0, 240.0, 1000.0, 1000.0);
        let t = cardan_bryan_transform(0.0, 0.0, 0.0, 100.0, 0.0, 0.0);
        let p = intrinsics.projection_matrix(&t);

        let h = p * na::Vector4::new(0.0, 0.0, 500.0, 1.0);
        assert_relative_eq!(h.x / h.z, 520.0, epsilon = 1e-12);
        assert_relative_eq!(h.y / h.z, 240.0, epsilon = 1e-12);
    }
}
