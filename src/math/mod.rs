pub mod inverse;
pub mod transform;

pub use inverse::{invert, InverseError};
pub use transform::{cardan_bryan_transform, transform_point, CardanBryanPose};
