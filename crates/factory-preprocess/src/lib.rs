//! factory‑preprocess – pixel conversions shared by the detectors.
//!
//! * [`Preprocessor`] resizes an RGB crop and packs it as an NCHW `f32`
//!   tensor for the defect classifier.
//! * [`gray_blurred`] prepares frames for background differencing.
//! * [`rgb_to_hsv`] uses the 8‑bit HSV convention (H 0‑179, S/V 0‑255) that
//!   the colour presets are written in.

use image::{GrayImage, RgbImage};
use ndarray::Array4;
use resize::{new, Pixel, Type};
use rgb::FromSlice;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Resize failed: {0}")]
    Resize(String),
    #[error("Cannot preprocess an empty {0}x{1} image")]
    EmptyImage(u32, u32),
}

pub type Result<T> = std::result::Result<T, PreprocessError>;

/// Pixel scaling applied while packing the tensor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scale {
    /// Raw 0‑255 values, as the u8 → f32 model input conversion does.
    Raw,
    /// Divide by 255.
    Unit,
}

#[derive(Clone)]
pub struct Preprocessor {
    dst_w: u32,
    dst_h: u32,
    scale: Scale,
}

impl Preprocessor {
    /// Create a pre‑processor that outputs a 1×3×H×W tensor.
    pub fn new(dst_w: u32, dst_h: u32, scale: Scale) -> Self {
        Self { dst_w, dst_h, scale }
    }

    pub fn input_size(&self) -> (u32, u32) {
        (self.dst_w, self.dst_h)
    }

    /// Bilinear resize, then HWC → NCHW.
    pub fn run(&self, img: &RgbImage) -> Result<Array4<f32>> {
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return Err(PreprocessError::EmptyImage(w, h));
        }

        let dst_w = self.dst_w as usize;
        let dst_h = self.dst_h as usize;
        let mut dst = vec![0u8; dst_w * dst_h * 3];

        if (w, h) == (self.dst_w, self.dst_h) {
            dst.copy_from_slice(img.as_raw());
        } else {
            let mut resizer = new(
                w as usize,
                h as usize,
                dst_w,
                dst_h,
                Pixel::RGB8,
                Type::Triangle,
            )
            .map_err(|e| PreprocessError::Resize(format!("{e:?}")))?;
            resizer
                .resize(img.as_raw().as_rgb(), dst.as_rgb_mut())
                .map_err(|e| PreprocessError::Resize(format!("{e:?}")))?;
        }

        let div = match self.scale {
            Scale::Raw => 1.0,
            Scale::Unit => 255.0,
        };
        let mut arr = Array4::<f32>::zeros((1, 3, dst_h, dst_w));
        for y in 0..dst_h {
            for x in 0..dst_w {
                let base = (y * dst_w + x) * 3;
                for c in 0..3 {
                    arr[(0, c, y, x)] = dst[base + c] as f32 / div;
                }
            }
        }
        Ok(arr)
    }
}

/// Luma conversion followed by a Gaussian blur (sigma in pixels).
pub fn gray_blurred(img: &RgbImage, sigma: f32) -> GrayImage {
    let gray = image::imageops::grayscale(img);
    if sigma > 0.0 {
        imageproc::filter::gaussian_blur_f32(&gray, sigma)
    } else {
        gray
    }
}

/// RGB → HSV with H in 0‑179 and S, V in 0‑255.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let rf = r as f32;
    let gf = g as f32;
    let bf = b as f32;
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    (
        ((h / 2.0).round() as u32 % 180) as u8,
        s.round().clamp(0.0, 255.0) as u8,
        v.round().clamp(0.0, 255.0) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), (0, 255, 255));
        assert_eq!(rgb_to_hsv(0, 255, 0), (60, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 255), (120, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 0), (0, 0, 0));
        assert_eq!(rgb_to_hsv(128, 128, 128), (0, 0, 128));
    }

    #[test]
    fn raw_scale_keeps_byte_values() {
        let img = RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]));
        let out = Preprocessor::new(4, 4, Scale::Raw).run(&img).unwrap();
        assert_eq!(out[(0, 0, 0, 0)], 10.0);
        assert_eq!(out[(0, 1, 2, 3)], 20.0);
        assert_eq!(out[(0, 2, 3, 3)], 30.0);
    }
}
