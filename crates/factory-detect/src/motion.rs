// factory-detect/src/motion.rs
//
// Background differencing against the previous frame. An item is reported
// once its changed area is plausible and its centre sits in the trigger band.
use crate::{load_profile, ConfigError, Detector, Rect, Region, Result};
use factory_camera::Frame;
use factory_preprocess::gray_blurred;
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::region_labelling::{connected_components, Connectivity};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionPreset {
    /// Gaussian sigma applied before differencing; 0 disables the blur.
    pub blur_sigma: f32,
    /// Per-pixel absolute luma difference counted as motion.
    pub diff_threshold: u8,
    /// Dilation radius merging nearby changed pixels.
    pub dilate_radius: u8,
    /// Accepted changed-area range, as fractions of the frame area.
    pub min_area: f32,
    pub max_area: f32,
    /// Horizontal band (fractions of frame width) the item centre must be in.
    pub trigger_band: [f32; 2],
    /// Pixels added around the crop on every side.
    pub padding: u32,
    /// Frames ignored after a report, so one item triggers once.
    pub cooldown_frames: u32,
}

impl Default for MotionPreset {
    fn default() -> Self {
        Self {
            blur_sigma: 2.0,
            diff_threshold: 25,
            dilate_radius: 3,
            min_area: 0.02,
            max_area: 0.6,
            trigger_band: [0.35, 0.65],
            padding: 8,
            cooldown_frames: 10,
        }
    }
}

impl MotionPreset {
    fn validate(&self, path: &str) -> std::result::Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            path: path.to_string(),
            reason: reason.to_string(),
        };
        if !(0.0..=1.0).contains(&self.min_area) || !(0.0..=1.0).contains(&self.max_area) {
            return Err(invalid("min_area and max_area must be within 0..=1"));
        }
        if self.min_area > self.max_area {
            return Err(invalid("min_area is larger than max_area"));
        }
        let [lo, hi] = self.trigger_band;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(invalid("trigger_band must be an ordered pair within 0..=1"));
        }
        if self.blur_sigma < 0.0 {
            return Err(invalid("blur_sigma must not be negative"));
        }
        Ok(())
    }
}

pub struct MotionDetector {
    preset: MotionPreset,
    previous: Option<GrayImage>,
    cooldown: u32,
}

impl MotionDetector {
    pub fn new(preset: MotionPreset) -> Self {
        Self {
            preset,
            previous: None,
            cooldown: 0,
        }
    }

    pub fn load_preset(path: &Path, profile: &str) -> std::result::Result<Self, ConfigError> {
        let preset: MotionPreset = load_profile(path, profile)?;
        preset.validate(&path.display().to_string())?;
        debug!("motion preset {profile} from {}: {preset:?}", path.display());
        Ok(Self::new(preset))
    }

    pub fn preset(&self) -> &MotionPreset {
        &self.preset
    }

    fn changed_mask(&self, previous: &GrayImage, current: &GrayImage) -> GrayImage {
        let threshold = self.preset.diff_threshold;
        let mut mask = GrayImage::new(current.width(), current.height());
        for (x, y, px) in mask.enumerate_pixels_mut() {
            let a = previous.get_pixel(x, y)[0];
            let b = current.get_pixel(x, y)[0];
            if a.abs_diff(b) > threshold {
                *px = Luma([255]);
            }
        }
        if self.preset.dilate_radius > 0 {
            imageproc::morphology::dilate(&mask, Norm::LInf, self.preset.dilate_radius)
        } else {
            mask
        }
    }

    /// Bounding box and pixel count of the largest changed component.
    fn largest_component(mask: &GrayImage) -> Option<(Rect, u64)> {
        let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
        // label → (min_x, min_y, max_x, max_y, count)
        let mut stats: Vec<(u32, u32, u32, u32, u64)> = Vec::new();
        for (x, y, px) in labels.enumerate_pixels() {
            let label = px[0] as usize;
            if label == 0 {
                continue;
            }
            if stats.len() < label {
                stats.resize(label, (u32::MAX, u32::MAX, 0, 0, 0));
            }
            let s = &mut stats[label - 1];
            s.0 = s.0.min(x);
            s.1 = s.1.min(y);
            s.2 = s.2.max(x);
            s.3 = s.3.max(y);
            s.4 += 1;
        }
        stats
            .into_iter()
            .filter(|s| s.4 > 0)
            .max_by_key(|s| s.4)
            .map(|(x0, y0, x1, y1, count)| {
                (
                    Rect {
                        x: x0,
                        y: y0,
                        width: x1 - x0 + 1,
                        height: y1 - y0 + 1,
                    },
                    count,
                )
            })
    }

    fn padded(&self, rect: Rect, width: u32, height: u32) -> Rect {
        let pad = self.preset.padding;
        let x = rect.x.saturating_sub(pad);
        let y = rect.y.saturating_sub(pad);
        let right = (rect.x + rect.width + pad).min(width);
        let bottom = (rect.y + rect.height + pad).min(height);
        Rect {
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }
}

impl Detector for MotionDetector {
    type Input = Frame;
    type Output = Region;

    fn detect(&mut self, frame: &Frame) -> Result<Option<Region>> {
        let current = gray_blurred(&frame.image, self.preset.blur_sigma);
        let previous = match self.previous.replace(current) {
            Some(prev) if prev.dimensions() == frame.image.dimensions() => prev,
            _ => return Ok(None),
        };
        if self.cooldown > 0 {
            self.cooldown -= 1;
            return Ok(None);
        }
        let Some(current) = self.previous.as_ref() else {
            return Ok(None);
        };

        let mask = self.changed_mask(&previous, current);
        let Some((bounds, count)) = Self::largest_component(&mask) else {
            return Ok(None);
        };

        let (w, h) = frame.image.dimensions();
        let ratio = count as f32 / (w as f32 * h as f32);
        if ratio < self.preset.min_area || ratio > self.preset.max_area {
            return Ok(None);
        }
        let centre = bounds.center_x() / w as f32;
        let [lo, hi] = self.preset.trigger_band;
        if centre < lo || centre > hi {
            return Ok(None);
        }

        let crop = self.padded(bounds, w, h);
        let image =
            image::imageops::crop_imm(&frame.image, crop.x, crop.y, crop.width, crop.height)
                .to_image();
        self.cooldown = self.preset.cooldown_frames;
        debug!(
            "motion on frame {}: {:?} covers {:.1}%",
            frame.seq,
            crop,
            ratio * 100.0
        );

        Ok(Some(Region {
            image,
            bounds: crop,
            frame_seq: frame.seq,
        }))
    }

    fn name(&self) -> &'static str {
        "motion"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn preset() -> MotionPreset {
        MotionPreset {
            blur_sigma: 0.0,
            diff_threshold: 25,
            dilate_radius: 1,
            min_area: 0.01,
            max_area: 0.5,
            trigger_band: [0.3, 0.7],
            padding: 0,
            cooldown_frames: 0,
        }
    }

    fn frame_with_block(x0: u32, seq: u64) -> Frame {
        let mut img = RgbImage::new(100, 100);
        for y in 40..60 {
            for x in x0..x0 + 20 {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        Frame::new(img, seq)
    }

    #[test]
    fn first_frame_never_reports() {
        let mut det = MotionDetector::new(preset());
        assert!(det.detect(&frame_with_block(40, 0)).unwrap().is_none());
    }

    #[test]
    fn centred_item_is_cropped() {
        let mut det = MotionDetector::new(preset());
        det.detect(&Frame::new(RgbImage::new(100, 100), 0)).unwrap();
        let region = det.detect(&frame_with_block(40, 1)).unwrap().expect("region");
        assert_eq!(region.frame_seq, 1);
        // dilation grows the 20×20 block by one pixel on every side
        assert_eq!(
            region.bounds,
            Rect {
                x: 39,
                y: 39,
                width: 22,
                height: 22
            }
        );
        assert_eq!(region.image.dimensions(), (22, 22));
    }

    #[test]
    fn item_outside_band_is_ignored() {
        let mut det = MotionDetector::new(preset());
        det.detect(&Frame::new(RgbImage::new(100, 100), 0)).unwrap();
        assert!(det.detect(&frame_with_block(0, 1)).unwrap().is_none());
    }

    #[test]
    fn still_scene_is_ignored() {
        let mut det = MotionDetector::new(preset());
        det.detect(&frame_with_block(40, 0)).unwrap();
        assert!(det.detect(&frame_with_block(40, 1)).unwrap().is_none());
    }

    #[test]
    fn cooldown_suppresses_repeat_reports() {
        let mut p = preset();
        p.cooldown_frames = 1;
        let mut det = MotionDetector::new(p);
        det.detect(&Frame::new(RgbImage::new(100, 100), 0)).unwrap();
        assert!(det.detect(&frame_with_block(40, 1)).unwrap().is_some());
        assert!(det.detect(&Frame::new(RgbImage::new(100, 100), 2)).unwrap().is_none());
        assert!(det.detect(&frame_with_block(40, 3)).unwrap().is_some());
    }
}
