//! Triangulates matched sensor points.
//!
//! ```text
//! cargo run --example triangulate -- <calibration.xml|.txt> <points.txt> [--distortion]
//! ```
//!
//! Each line of the points file holds `xl yl xr yr`.

use anyhow::Context;
use stereo_triangulation::homography::read_correspondences;
use stereo_triangulation::StereoSystem;

fn main() -> Result<(), stereo_triangulation::Error> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let calibration = args.next().context("missing calibration file argument")?;
    let points = args.next().context("missing points file argument")?;
    let correct_distortion = args.any(|arg| arg == "--distortion");

    let system = StereoSystem::load(&calibration)?;
    let pairs = read_correspondences(&points)?
        .into_iter()
        .map(|c| (c.left, c.right));

    for (i, result) in system
        .triangulate_all(pairs, correct_distortion)
        .into_iter()
        .enumerate()
    {
        match result {
            Ok(point) => println!(
                "{i}: camera {:.4} {:.4} {:.4}  world {:.4} {:.4} {:.4}",
                point.camera.x,
                point.camera.y,
                point.camera.z,
                point.world.x,
                point.world.y,
                point.world.z
            ),
            Err(err) => println!("{i}: {err}"),
        }
    }

    Ok(())
}
