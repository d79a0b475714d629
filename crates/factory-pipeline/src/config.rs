// factory-pipeline/src/config.rs
use crate::event::{ActuatorId, SourceId};
use factory_detect::{ActuationRule, ClassifierSettings, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A preset file plus the profile to take from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetRef {
    pub path: PathBuf,
    #[serde(default = "default_profile")]
    pub profile: String,
}

fn default_profile() -> String {
    "default".to_string()
}

impl PresetRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            profile: default_profile(),
        }
    }
}

/// Second stage of a lane, run on each detected region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageConfig {
    Classifier(ClassifierSettings),
    Color(PresetRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneConfig {
    /// Camera number; the lane is reported as `Cam<n>`.
    pub camera: u8,
    /// Image directory or video file.
    pub source: PathBuf,
    pub actuator: ActuatorId,
    pub motion: PresetRef,
    pub stage: StageConfig,
    pub rule: ActuationRule,
}

impl LaneConfig {
    pub fn id(&self) -> SourceId {
        SourceId(self.camera)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Serial device of the factory controller.
    pub device: PathBuf,
    pub sample_interval_ms: u64,
    pub idle_poll_ms: u64,
    pub final_drain_limit: usize,
    /// Where `SnapshotDisplay` writes; `None` runs headless.
    pub snapshot_dir: Option<PathBuf>,
    pub lanes: Vec<LaneConfig>,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        let source = PathBuf::from("resources/conveyor.mp4");
        let motion = PresetRef::new("resources/motion.cfg");
        Self {
            device: PathBuf::from("/dev/ttyACM0"),
            sample_interval_ms: 30,
            idle_poll_ms: 10,
            final_drain_limit: 64,
            snapshot_dir: None,
            lanes: vec![
                LaneConfig {
                    camera: 1,
                    source: source.clone(),
                    actuator: ActuatorId::Lane1,
                    motion: motion.clone(),
                    stage: StageConfig::Classifier(ClassifierSettings::new(
                        "resources/defect.onnx",
                    )),
                    rule: ActuationRule::LabelAbove {
                        label: "bad".to_string(),
                        threshold: 0.5,
                    },
                },
                LaneConfig {
                    camera: 2,
                    source,
                    actuator: ActuatorId::Lane2,
                    motion,
                    stage: StageConfig::Color(PresetRef::new("resources/color.cfg")),
                    rule: ActuationRule::TopLabel {
                        label: "blue".to_string(),
                    },
                },
            ],
        }
    }
}

impl FactoryConfig {
    /// Read a JSON config; absent keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let shown = path.display().to_string();
        if !path.exists() {
            return Err(ConfigError::Missing(shown));
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: shown.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Malformed {
            path: shown,
            source,
        })
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    /// Point every lane at the same frame source.
    pub fn set_source(&mut self, source: &Path) {
        for lane in &mut self.lanes {
            lane.source = source.to_path_buf();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_wire_two_lanes() {
        let cfg = FactoryConfig::default();
        assert_eq!(cfg.device, PathBuf::from("/dev/ttyACM0"));
        assert_eq!(cfg.sample_interval(), Duration::from_millis(30));
        let ids: Vec<_> = cfg.lanes.iter().map(|l| (l.id(), l.actuator)).collect();
        assert_eq!(
            ids,
            vec![
                (SourceId(1), ActuatorId::Lane1),
                (SourceId(2), ActuatorId::Lane2)
            ]
        );
        assert!(matches!(cfg.lanes[0].stage, StageConfig::Classifier(_)));
        assert!(matches!(cfg.lanes[1].stage, StageConfig::Color(_)));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: FactoryConfig =
            serde_json::from_str(r#"{ "device": "/dev/null", "sample_interval_ms": 5 }"#).unwrap();
        assert_eq!(cfg.device, PathBuf::from("/dev/null"));
        assert_eq!(cfg.sample_interval_ms, 5);
        assert_eq!(cfg.idle_poll_ms, 10);
        assert_eq!(cfg.lanes.len(), 2);
    }

    #[test]
    fn lane_json_uses_tagged_stage_and_rule() {
        let json = r#"{
            "lanes": [{
                "camera": 3,
                "source": "frames/",
                "actuator": 2,
                "motion": { "path": "motion.cfg" },
                "stage": { "kind": "color", "path": "color.cfg", "profile": "night" },
                "rule": { "kind": "top_label", "label": "blue" }
            }]
        }"#;
        let cfg: FactoryConfig = serde_json::from_str(json).unwrap();
        let lane = &cfg.lanes[0];
        assert_eq!(lane.id(), SourceId(3));
        assert_eq!(lane.motion.profile, "default");
        assert_eq!(
            lane.stage,
            StageConfig::Color(PresetRef {
                path: "color.cfg".into(),
                profile: "night".into()
            })
        );
    }

    #[test]
    fn set_source_rewrites_every_lane() {
        let mut cfg = FactoryConfig::default();
        cfg.set_source(Path::new("/tmp/frames"));
        assert!(cfg.lanes.iter().all(|l| l.source == Path::new("/tmp/frames")));
    }
}
