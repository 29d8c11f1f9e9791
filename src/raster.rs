//! Grey level images consumed by the projective transform estimator.
//!
//! The estimator only needs the [`SensorImage`] contract; [`IntensityImage`] is a
//! plain row-major buffer implementing it, with file I/O delegated to the `image` crate.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("buffer of {len} values does not match a {width}x{height} image")]
    InvalidBuffer {
        width: usize,
        height: usize,
        len: usize,
    },

    #[error(transparent)]
    Codec(#[from] image::ImageError),
}

/// Read access to a single channel image.
pub trait SensorImage {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Intensity at an integer pixel. Callers stay within `width() x height()`.
    fn intensity(&self, x: usize, y: usize) -> f64;

    /// Intensity at a sub-pixel location, `None` outside the image.
    fn sample(&self, x: f64, y: f64) -> Option<f64>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntensityImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl IntensityImage {
    /// Black image
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Result<Self, ImageError> {
        if data.len() != width * height {
            return Err(ImageError::InvalidBuffer {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> f32) -> Self {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// Decodes any format supported by the `image` crate and converts it to 8-bit grey.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let luma = image::open(path)?.to_luma8();
        let (width, height) = luma.dimensions();
        let data = luma.into_raw().into_iter().map(f32::from).collect();
        Self::from_vec(width as usize, height as usize, data)
    }

    /// Writes the image as 8-bit grey; values are rounded and clamped to `[0, 255]`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ImageError> {
        let raw = self
            .data
            .iter()
            .map(|&v| v.round().clamp(0.0, 255.0) as u8)
            .collect();
        let buffer = image::GrayImage::from_raw(self.width as u32, self.height as u32, raw).ok_or(
            ImageError::InvalidBuffer {
                width: self.width,
                height: self.height,
                len: self.data.len(),
            },
        )?;
        buffer.save(path)?;
        Ok(())
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

impl SensorImage for IntensityImage {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn intensity(&self, x: usize, y: usize) -> f64 {
        f64::from(self.data[y * self.width + x])
    }

    /// Bilinear interpolation; the last row and column are replicated.
    fn sample(&self, x: f64, y: f64) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let in_bounds = x >= 0.0
            && y >= 0.0
            && x <= (self.width - 1) as f64
            && y <= (self.height - 1) as f64;
        if !in_bounds {
            return None;
        }

        let iu = x.trunc() as usize;
        let iv = y.trunc() as usize;
        let frac_u = x.fract();
        let frac_v = y.fract();

        let val00 = self.intensity(iu, iv);
        let val01 = if iu + 1 < self.width {
            self.intensity(iu + 1, iv)
        } else {
            val00
        };
        let val10 = if iv + 1 < self.height {
            self.intensity(iu, iv + 1)
        } else {
            val00
        };
        let val11 = if iu + 1 < self.width && iv + 1 < self.height {
            self.intensity(iu + 1, iv + 1)
        } else {
            val00
        };

        let frac_uu = 1. - frac_u;
        let frac_vv = 1. - frac_v;

        Some(
            val00 * frac_uu * frac_vv
                + val01 * frac_u * frac_vv
                + val10 * frac_uu * frac_v
                + val11 * frac_u * frac_v,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp() -> IntensityImage {
        IntensityImage::from_fn(4, 3, |x, y| (10 * x + 100 * y) as f32)
    }

    #[test]
    fn test_from_fn_is_row_major() {
        let raster = ramp();
        assert_eq!(raster.as_slice()[..5], [0.0, 10.0, 20.0, 30.0, 100.0]);
        assert_eq!(raster.intensity(3, 2), 230.0);
    }

    #[test]
    fn test_sample_matches_pixels_and_interpolates() {
        let raster = ramp();
        assert_eq!(raster.sample(2.0, 1.0), Some(120.0));
        assert_relative_eq!(raster.sample(1.5, 0.5).unwrap(), 65.0, epsilon = 1e-9);
        assert_relative_eq!(raster.sample(3.0, 1.25).unwrap(), 155.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sample_outside() {
        let raster = ramp();
        assert_eq!(raster.sample(-0.01, 1.0), None);
        assert_eq!(raster.sample(3.01, 1.0), None);
        assert_eq!(raster.sample(1.0, 2.5), None);
        assert_eq!(IntensityImage::new(0, 0).sample(0.0, 0.0), None);
    }

    #[test]
    fn test_invalid_buffer() {
        assert!(matches!(
            IntensityImage::from_vec(3, 3, vec![0.0; 8]),
            Err(ImageError::InvalidBuffer { len: 8, .. })
        ));
    }

    #[test]
    fn test_save_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.tif");

        let mut raster = ramp();
        raster.set(0, 0, -20.0);
        raster.set(1, 0, 300.0);
        raster.save(&path).unwrap();

        let loaded = IntensityImage::open(&path).unwrap();
        assert_eq!(loaded.width(), 4);
        assert_eq!(loaded.height(), 3);
        assert_eq!(loaded.intensity(0, 0), 0.0);
        assert_eq!(loaded.intensity(1, 0), 255.0);
        assert_eq!(loaded.intensity(2, 1), 120.0);
    }
}
