//! Reader for vic3D `cal.xml` exports.
//!
//! These files carry a `!DOCTYPE` header that XML parsers reject, so the file is
//! scanned line by line instead. Each `CAMERA` record holds the intrinsics at token
//! positions 2..=9 and the world-to-camera orientation (Cardan-Bryan angles and
//! translation) at positions 11..=16.

use log::debug;

use super::{parse_array, tokenize, CalibrationError, StereoCalibration};
use crate::camera::CameraIntrinsics;
use crate::math::{invert, CardanBryanPose};

const CAMERA_TAG: &str = "CAMERA";
const MIN_TOKENS: usize = 18;
const INTRINSICS_OFFSET: usize = 2;
const ORIENTATION_OFFSET: usize = 11;

struct CameraRecord {
    intrinsics: CameraIntrinsics<f64>,
    orientation: CardanBryanPose<f64>,
}

pub(crate) fn parse(content: &str) -> Result<StereoCalibration<f64>, CalibrationError> {
    let mut records: Vec<CameraRecord> = Vec::with_capacity(2);
    let mut last_line = 0;

    for (index, line) in content.lines().enumerate() {
        let line_number = index + 1;
        last_line = line_number;

        let tokens: Vec<&str> = tokenize(line).collect();
        if tokens.first() != Some(&CAMERA_TAG) {
            continue;
        }
        if records.len() == 2 {
            return Err(CalibrationError::Parse {
                line: line_number,
                reason: "more than two CAMERA records".to_string(),
            });
        }
        if tokens.len() < MIN_TOKENS {
            return Err(CalibrationError::Parse {
                line: line_number,
                reason: format!(
                    "CAMERA record has {} tokens, expected at least {MIN_TOKENS}",
                    tokens.len()
                ),
            });
        }

        let intrinsics = parse_array::<8>(&tokens[INTRINSICS_OFFSET..], line_number)?;
        let orientation = parse_array::<6>(&tokens[ORIENTATION_OFFSET..], line_number)?;
        debug!(
            "vic3D camera {} orientation {:?}",
            records.len(),
            orientation
        );

        records.push(CameraRecord {
            intrinsics: intrinsics.into(),
            orientation: orientation.into(),
        });
    }

    let [left, right]: [CameraRecord; 2] =
        records
            .try_into()
            .map_err(|found: Vec<CameraRecord>| CalibrationError::Parse {
                line: last_line,
                reason: format!("expected two CAMERA records, found {}", found.len()),
            })?;

    // the orientations are world to camera, camera 0 becomes the reference frame
    let world_transform = invert(&left.orientation.to_transform())?;
    let extrinsics = right.orientation.to_transform() * world_transform;

    StereoCalibration::try_new(
        [left.intrinsics, right.intrinsics],
        extrinsics,
        world_transform,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraId;
    use crate::math::cardan_bryan_transform;
    use approx::assert_relative_eq;
    use nalgebra::Matrix4;

    fn camera_line(id: usize, intrinsics: &str, orientation: &str) -> String {
        format!(
            "  <CAMERA ID=\"{id}\">{intrinsics}<ORIENTATION>{orientation}</ORIENTATION></CAMERA>\n"
        )
    }

    fn vic3d_file(cx0: f64) -> String {
        let mut content = String::from("<!DOCTYPE calibration>\n<CALIBRATION>\n");
        content += &camera_line(
            0,
            &format!("{cx0} 240 1000 1000 0.5 0.01 0 0"),
            "10 -5 2 -50 0 1000",
        );
        content += &camera_line(
            1,
            "330 250 1010 1005 0 -0.02 0 0",
            "12 20 -3 60 5 990",
        );
        content += "</CALIBRATION>\n";
        content
    }

    #[test]
    fn test_parse_two_cameras() {
        let calibration = StereoCalibration::from_vic3d_str(&vic3d_file(320.0)).unwrap();

        let left = calibration.intrinsics(CameraId::Left);
        assert_eq!(left.cx, 320.0);
        assert_eq!(left.fs, 0.5);
        assert_eq!(left.k1, 0.01);
        let right = calibration.intrinsics(CameraId::Right);
        assert_eq!(right.cy, 250.0);
        assert_eq!(right.fy, 1005.0);
        assert_eq!(right.k1, -0.02);

        let t0 = cardan_bryan_transform(10.0, -5.0, 2.0, -50.0, 0.0, 1000.0);
        let t1 = cardan_bryan_transform(12.0, 20.0, -3.0, 60.0, 5.0, 990.0);

        // world -> camera 0 -> world must be the identity
        let round_trip = calibration.world_transform() * t0;
        // camera 0 -> camera 1 composed with world -> camera 0 gives world -> camera 1
        let world_to_right = calibration.extrinsics() * t0;
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(round_trip[(i, j)], expected, epsilon = 1e-9);
                assert_relative_eq!(world_to_right[(i, j)], t1[(i, j)], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_identical_cameras_give_identity_extrinsics() {
        let mut content = camera_line(0, "320 240 1000 1000 0 0 0 0", "1 2 3 4 5 6");
        content += &camera_line(1, "320 240 1000 1000 0 0 0 0", "1 2 3 4 5 6");

        let calibration = StereoCalibration::from_vic3d_str(&content).unwrap();
        let e = calibration.extrinsics();
        let identity = Matrix4::<f64>::identity();
        for i in 0..4 {
            for j in 0..4 {
                assert_relative_eq!(e[(i, j)], identity[(i, j)], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_single_camera_is_parse_error() {
        let content = camera_line(0, "320 240 1000 1000 0 0 0 0", "0 0 0 0 0 0");
        assert!(matches!(
            StereoCalibration::from_vic3d_str(&content),
            Err(CalibrationError::Parse { .. })
        ));
    }

    #[test]
    fn test_three_cameras_is_parse_error() {
        let line = camera_line(0, "320 240 1000 1000 0 0 0 0", "0 0 0 0 0 0");
        let content = line.repeat(3);
        assert!(matches!(
            StereoCalibration::from_vic3d_str(&content),
            Err(CalibrationError::Parse { line: 3, .. })
        ));
    }

    #[test]
    fn test_short_camera_record() {
        let mut content = camera_line(0, "320 240 1000 1000 0 0 0 0", "0 0 0 0 0 0");
        content += "<CAMERA ID=\"1\">320 240 1000</CAMERA>\n";
        assert!(matches!(
            StereoCalibration::from_vic3d_str(&content),
            Err(CalibrationError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_non_numeric_value() {
        let mut content = camera_line(0, "320 240 1000 1000 0 0 0 0", "0 0 0 0 0 0");
        content += &camera_line(1, "320 240 abc 1000 0 0 0 0", "0 0 0 0 0 0");
        assert!(matches!(
            StereoCalibration::from_vic3d_str(&content),
            Err(CalibrationError::Parse { line: 2, .. })
        ));
    }

    #[test]
    fn test_zero_principal_point() {
        assert!(matches!(
            StereoCalibration::from_vic3d_str(&vic3d_file(0.0)),
            Err(CalibrationError::InvalidPrincipalPoint { camera: 0, .. })
        ));
    }
}
