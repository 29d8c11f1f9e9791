//! Reader for the generic text calibration format.
//!
//! Every line that is not blank and does not start with `#` holds exactly one value,
//! optionally followed by a `#` annotation. Values are consumed in order:
//!
//! | values | meaning |
//! |---|---|
//! | 0..8 | camera 0 intrinsics `cx cy fx fy fs k1 k2 k3` |
//! | 8..16 | camera 1 intrinsics |
//! | 16..22 | camera 0 to camera 1 pose `alpha beta gamma tx ty tz` |
//! | 22..28 | optional world to camera 0 pose |

use log::debug;
use nalgebra::Matrix4;

use super::{parse_scalar, tokenize, CalibrationError, StereoCalibration};
use crate::camera::CameraIntrinsics;
use crate::math::{invert, CardanBryanPose};

pub const VALUES_WITHOUT_WORLD: usize = 22;
pub const VALUES_WITH_WORLD: usize = 28;

pub(crate) fn parse(content: &str) -> Result<StereoCalibration<f64>, CalibrationError> {
    let mut values = Vec::with_capacity(VALUES_WITH_WORLD);

    for (index, line) in content.lines().enumerate() {
        let line_number = index + 1;
        let mut tokens = tokenize(line);

        let Some(value) = tokens.next() else {
            continue;
        };
        if value.starts_with('#') {
            continue;
        }
        if let Some(extra) = tokens.next() {
            if !extra.starts_with('#') {
                return Err(CalibrationError::Parse {
                    line: line_number,
                    reason: format!("expected a single value per line, found '{extra}'"),
                });
            }
        }

        values.push(parse_scalar(value, line_number)?);
    }

    if values.len() != VALUES_WITHOUT_WORLD && values.len() != VALUES_WITH_WORLD {
        return Err(CalibrationError::ValueCount(values.len()));
    }

    let left = CameraIntrinsics::from(array_at::<8>(&values, 0));
    let right = CameraIntrinsics::from(array_at::<8>(&values, 8));
    let extrinsics = CardanBryanPose::from(array_at::<6>(&values, 16)).to_transform();

    let world_transform = if values.len() == VALUES_WITH_WORLD {
        debug!("loading custom transform from camera 0 to world coordinates");
        invert(&CardanBryanPose::from(array_at::<6>(&values, 22)).to_transform())?
    } else {
        Matrix4::identity()
    };

    StereoCalibration::try_new([left, right], extrinsics, world_transform)
}

fn array_at<const N: usize>(values: &[f64], offset: usize) -> [f64; N] {
    std::array::from_fn(|i| values[offset + i])
}
