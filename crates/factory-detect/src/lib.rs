// factory-detect/src/lib.rs
// ============================================================
// factory-detect  –  per-lane analysis stages
// Stage 1 finds a region of interest in a frame (motion).
// Stage 2 classifies that region (ONNX defect model or colour).
// ------------------------------------------------------------
// Pipeline: Frame → Option<Region> → Option<Classification>
// ------------------------------------------------------------
// Public API
//   * Detector::detect(input)           – one stage, one input
//   * MotionDetector::load_preset(p, n) – JSON preset profile
//   * ColorDetector::load_preset(p, n)  – JSON preset profile
//   * ClassifierDetector::load(model)   – tract ONNX model
//   * ActuationRule::qualifies(class)   – lane push decision
// ============================================================

//! Conveyor – detection layer
//!
//! Every stage implements the same [`Detector`] trait and differs only in its
//! input and output types. A lane chains a frame-level detector with a
//! region-level classifier; "no result" is `Ok(None)`, never an error.

use factory_camera::Frame;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod classifier;
mod color;
mod motion;
mod preset;

pub use classifier::{ClassifierDetector, ClassifierSettings};
pub use color::{ColorDetector, ColorPreset, ColorRange};
pub use motion::{MotionDetector, MotionPreset};
pub use preset::load_profile;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Preset or model file {0} does not exist")]
    Missing(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed preset {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Preset {path} has no profile named {profile:?}")]
    UnknownProfile { path: String, profile: String },
    #[error("Invalid preset {path}: {reason}")]
    Invalid { path: String, reason: String },
    // tract errors are anyhow errors, so they are carried as values
    #[error("Failed to load model {path}: {error}")]
    Model {
        path: String,
        error: tract_onnx::prelude::TractError,
    },
}

#[derive(Debug, Error)]
pub enum DetectError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Preprocess failed: {0}")]
    Preprocess(#[from] factory_preprocess::PreprocessError),
    #[error("Model inference error: {0}")]
    Tract(tract_onnx::prelude::TractError),
    #[error("Invalid output shape: expected [1, N], got {0:?}")]
    InvalidOutputShape(Vec<usize>),
}

impl From<tract_onnx::prelude::TractError> for DetectError {
    fn from(e: tract_onnx::prelude::TractError) -> Self {
        DetectError::Tract(e)
    }
}

pub type Result<T> = std::result::Result<T, DetectError>;

/// Axis aligned rectangle in parent-frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn center_x(&self) -> f32 {
        self.x as f32 + self.width as f32 / 2.0
    }
}

/// Cropped area of interest plus where it came from.
#[derive(Debug, Clone)]
pub struct Region {
    pub image: RgbImage,
    pub bounds: Rect,
    pub frame_seq: u64,
}

/// One ranked classification entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub name: String,
    pub confidence: f32,
}

/// Labels ranked by descending confidence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    ranked: Vec<Label>,
}

impl Classification {
    /// Sort `scores` by confidence (stable, so ties keep input order).
    /// NaN scores rank last.
    pub fn ranked<S: Into<String>>(scores: impl IntoIterator<Item = (S, f32)>) -> Self {
        let mut ranked: Vec<Label> = scores
            .into_iter()
            .map(|(name, confidence)| Label {
                name: name.into(),
                confidence,
            })
            .collect();
        ranked.sort_by(|a, b| {
            a.confidence
                .is_nan()
                .cmp(&b.confidence.is_nan())
                .then_with(|| b.confidence.total_cmp(&a.confidence))
        });
        Self { ranked }
    }

    pub fn top(&self) -> Option<&Label> {
        self.ranked.first()
    }

    pub fn confidence_of(&self, name: &str) -> Option<f32> {
        self.ranked
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.confidence)
    }

    pub fn labels(&self) -> &[Label] {
        &self.ranked
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

/// A single analysis stage.
pub trait Detector: Send {
    type Input;
    type Output;

    fn detect(&mut self, input: &Self::Input) -> Result<Option<Self::Output>>;

    fn name(&self) -> &'static str;
}

/// Frame-level stage: finds the region worth classifying.
pub type RegionDetector = dyn Detector<Input = Frame, Output = Region>;
/// Region-level stage: ranks labels for a region.
pub type RegionClassifier = dyn Detector<Input = Region, Output = Classification>;

/// Decides whether a classification triggers the lane's actuator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActuationRule {
    /// Push when `label` scores strictly above `threshold`.
    LabelAbove { label: String, threshold: f32 },
    /// Push when `label` is the top-ranked result.
    TopLabel { label: String },
}

impl ActuationRule {
    pub fn qualifies(&self, class: &Classification) -> bool {
        match self {
            ActuationRule::LabelAbove { label, threshold } => class
                .confidence_of(label)
                .map(|c| c > *threshold)
                .unwrap_or(false),
            ActuationRule::TopLabel { label } => {
                class.top().map(|t| &t.name == label).unwrap_or(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_is_descending_and_stable() {
        let c = Classification::ranked([("white", 0.2), ("blue", 0.7), ("red", 0.2)]);
        let names: Vec<_> = c.labels().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["blue", "white", "red"]);
    }

    #[test]
    fn nan_scores_rank_last() {
        let c = Classification::ranked([
            ("white", 0.2),
            ("smudge", f32::NAN),
            ("blue", 0.7),
            ("glare", -f32::NAN),
        ]);
        let names: Vec<_> = c.labels().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["blue", "white", "smudge", "glare"]);
        assert!(!ActuationRule::TopLabel {
            label: "smudge".into()
        }
        .qualifies(&c));
    }

    #[test]
    fn label_above_is_strict() {
        let rule = ActuationRule::LabelAbove {
            label: "bad".into(),
            threshold: 0.5,
        };
        assert!(rule.qualifies(&Classification::ranked([("bad", 0.8), ("good", 0.2)])));
        assert!(!rule.qualifies(&Classification::ranked([("bad", 0.5), ("good", 0.5)])));
        assert!(!rule.qualifies(&Classification::ranked([("good", 1.0)])));
    }

    #[test]
    fn top_label_needs_first_place() {
        let rule = ActuationRule::TopLabel { label: "blue".into() };
        assert!(rule.qualifies(&Classification::ranked([("blue", 0.4), ("white", 0.1)])));
        assert!(!rule.qualifies(&Classification::ranked([("blue", 0.1), ("white", 0.4)])));
        assert!(!rule.qualifies(&Classification::default()));
    }

    #[test]
    fn rule_deserializes_from_tagged_json() {
        let rule: ActuationRule =
            serde_json::from_str(r#"{"kind":"label_above","label":"bad","threshold":0.5}"#).unwrap();
        assert_eq!(
            rule,
            ActuationRule::LabelAbove {
                label: "bad".into(),
                threshold: 0.5
            }
        );
    }
}
