use nalgebra::{self as na, Matrix4, Point3};

/// Builds a 4x4 homogeneous transform from Cardan-Bryan angles (degrees) and a translation.
///
/// The rotation block follows the aircraft yaw-pitch-roll convention: rotate about Z by
/// `gamma`, then about Y by `beta`, then about X by `alpha`.
pub fn cardan_bryan_transform<F: na::RealField + Copy>(
    alpha: F,
    beta: F,
    gamma: F,
    tx: F,
    ty: F,
    tz: F,
) -> Matrix4<F> {
    let to_radians = F::pi() / na::convert::<f64, F>(180.0);
    let (sx, cx) = (alpha * to_radians).sin_cos();
    let (sy, cy) = (beta * to_radians).sin_cos();
    let (sz, cz) = (gamma * to_radians).sin_cos();
    let zero = F::zero();
    let one = F::one();

    Matrix4::new(
        cy * cz,
        sx * sy * cz - cx * sz,
        cx * sy * cz + sx * sz,
        tx,
        cy * sz,
        sx * sy * sz + cx * cz,
        cx * sy * sz - sx * cz,
        ty,
        -sy,
        sx * cy,
        cx * cy,
        tz,
        zero,
        zero,
        zero,
        one,
    )
}

/// Applies a homogeneous transform to a 3D point (implicit `w = 1`).
pub fn transform_point<F: na::RealField + Copy>(transform: &Matrix4<F>, point: &Point3<F>) -> Point3<F> {
    let h = transform * point.to_homogeneous();
    Point3::new(h.x, h.y, h.z)
}

/// Orientation of a camera as Cardan-Bryan angles in degrees plus a translation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardanBryanPose<F> {
    pub alpha: F,
    pub beta: F,
    pub gamma: F,
    pub tx: F,
    pub ty: F,
    pub tz: F,
}

impl<F: na::RealField + Copy> CardanBryanPose<F> {
    pub fn to_transform(&self) -> Matrix4<F> {
        cardan_bryan_transform(self.alpha, self.beta, self.gamma, self.tx, self.ty, self.tz)
    }
}

impl<F: Copy> From<[F; 6]> for CardanBryanPose<F> {
    fn from([alpha, beta, gamma, tx, ty, tz]: [F; 6]) -> Self {
        Self {
            alpha,
            beta,
            gamma,
            tx,
            ty,
            tz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_angles_give_identity_rotation() {
        let t = cardan_bryan_transform(0.0, 0.0, 0.0, 1.5, -2.25, 300.0);

        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(t[(i, j)], if i == j { 1.0 } else { 0.0 });
            }
        }
        assert_eq!(t[(0, 3)], 1.5);
        assert_eq!(t[(1, 3)], -2.25);
        assert_eq!(t[(2, 3)], 300.0);
        assert_eq!(t.row(3).clone_owned(), na::RowVector4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_matches_zyx_euler_composition() {
        let (alpha, beta, gamma) = (12.0f64, -33.0, 71.0);
        let t = cardan_bryan_transform(alpha, beta, gamma, 0.0, 0.0, 0.0);

        let expected = na::Rotation3::from_axis_angle(&na::Vector3::z_axis(), gamma.to_radians())
            * na::Rotation3::from_axis_angle(&na::Vector3::y_axis(), beta.to_radians())
            * na::Rotation3::from_axis_angle(&na::Vector3::x_axis(), alpha.to_radians());

        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(t[(i, j)], expected[(i, j)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_rotation_block_is_orthonormal() {
        let t = cardan_bryan_transform(45.0f64, 10.0, -120.0, 0.0, 0.0, 0.0);
        let r = t.fixed_view::<3, 3>(0, 0);
        let rrt = r * r.transpose();

        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(rrt[(i, j)], if i == j { 1.0 } else { 0.0 }, epsilon = 1e-12);
            }
        }
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pose_from_array() {
        let pose = CardanBryanPose::from([0.0f64, 0.0, 90.0, 10.0, 0.0, 0.0]);
        let p = transform_point(&pose.to_transform(), &Point3::new(1.0, 0.0, 0.0));

        assert_relative_eq!(p.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-12);
    }
}
