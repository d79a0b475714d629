// factory-detect/src/color.rs
use crate::{load_profile, Classification, ConfigError, Detector, Region, Result};
use factory_preprocess::rgb_to_hsv;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Inclusive HSV box (H 0‑179). A hue range with `lower[0] > upper[0]` wraps
/// through 0, which is how reds are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRange {
    pub name: String,
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorRange {
    fn contains(&self, (h, s, v): (u8, u8, u8)) -> bool {
        let hue_ok = if self.lower[0] <= self.upper[0] {
            h >= self.lower[0] && h <= self.upper[0]
        } else {
            h >= self.lower[0] || h <= self.upper[0]
        };
        hue_ok
            && s >= self.lower[1]
            && s <= self.upper[1]
            && v >= self.lower[2]
            && v <= self.upper[2]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorPreset {
    pub colors: Vec<ColorRange>,
    /// Ratios at or below this are dropped from the result.
    #[serde(default)]
    pub min_ratio: f32,
}

/// Ranks the preset colours by the share of region pixels they cover.
pub struct ColorDetector {
    preset: ColorPreset,
}

impl ColorDetector {
    pub fn new(preset: ColorPreset) -> Self {
        Self { preset }
    }

    pub fn load_preset(path: &Path, profile: &str) -> std::result::Result<Self, ConfigError> {
        let preset: ColorPreset = load_profile(path, profile)?;
        if preset.colors.is_empty() {
            return Err(ConfigError::Invalid {
                path: path.display().to_string(),
                reason: format!("profile {profile:?} defines no colours"),
            });
        }
        debug!(
            "colour preset {profile} from {}: {} colours",
            path.display(),
            preset.colors.len()
        );
        Ok(Self::new(preset))
    }
}

impl Detector for ColorDetector {
    type Input = Region;
    type Output = Classification;

    fn detect(&mut self, region: &Region) -> Result<Option<Classification>> {
        let total = region.image.width() as u64 * region.image.height() as u64;
        if total == 0 {
            return Ok(None);
        }

        let mut counts = vec![0u64; self.preset.colors.len()];
        for px in region.image.pixels() {
            let hsv = rgb_to_hsv(px[0], px[1], px[2]);
            for (i, range) in self.preset.colors.iter().enumerate() {
                if range.contains(hsv) {
                    counts[i] += 1;
                }
            }
        }

        let min_ratio = self.preset.min_ratio;
        let class = Classification::ranked(
            self.preset
                .colors
                .iter()
                .zip(counts)
                .map(|(range, n)| (range.name.clone(), n as f32 / total as f32))
                .filter(|(_, ratio)| *ratio > min_ratio),
        );
        Ok(if class.is_empty() { None } else { Some(class) })
    }

    fn name(&self) -> &'static str {
        "color"
    }
}
