// factory-pipeline/src/factory.rs
//
// Setup and run are separate phases: `build` reports every configuration
// problem as a SetupError before any thread starts; `run` always ends with
// a RunReport.
use crate::cancel::CancellationToken;
use crate::channel::event_channel;
use crate::config::{FactoryConfig, LaneConfig, StageConfig};
use crate::dispatcher::{Dispatcher, DispatcherSettings, RunReport};
use crate::event::SourceId;
use crate::sink::{Actuator, DisplaySink, StopRequest};
use crate::worker::{spawn_lane, Lane, WorkerHandle};
use factory_camera::CameraError;
use factory_detect::{
    ClassifierDetector, ColorDetector, ConfigError, MotionDetector, RegionClassifier,
};
use log::{error, info};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{lane}: {source}")]
    LaneConfig {
        lane: SourceId,
        #[source]
        source: ConfigError,
    },
    #[error("{lane}: cannot open frame source: {source}")]
    Source {
        lane: SourceId,
        #[source]
        source: CameraError,
    },
    #[error("Invalid factory configuration: {0}")]
    Invalid(String),
    #[error("Failed to spawn lane thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Side-effect collaborators handed to the dispatcher.
pub struct Collaborators {
    pub actuator: Box<dyn Actuator>,
    pub display: Box<dyn DisplaySink>,
    pub stop: Box<dyn StopRequest>,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub sample_interval: Duration,
    pub dispatcher: DispatcherSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(30),
            dispatcher: DispatcherSettings::default(),
        }
    }
}

impl From<&FactoryConfig> for PipelineSettings {
    fn from(cfg: &FactoryConfig) -> Self {
        Self {
            sample_interval: cfg.sample_interval(),
            dispatcher: DispatcherSettings {
                idle_poll: cfg.idle_poll(),
                final_drain_limit: cfg.final_drain_limit,
            },
        }
    }
}

pub struct Factory {
    settings: PipelineSettings,
    lanes: Vec<Lane>,
    collaborators: Collaborators,
}

impl Factory {
    /// Assemble from ready-made lanes. Lane ids and actuators must be unique.
    pub fn new(
        settings: PipelineSettings,
        lanes: Vec<Lane>,
        collaborators: Collaborators,
    ) -> Result<Self, SetupError> {
        if lanes.is_empty() {
            return Err(SetupError::Invalid("no lanes configured".to_string()));
        }
        let mut ids = BTreeSet::new();
        let mut actuators = BTreeSet::new();
        for lane in &lanes {
            if !ids.insert(lane.id) {
                return Err(SetupError::Invalid(format!("{} configured twice", lane.id)));
            }
            if !actuators.insert(lane.actuator) {
                return Err(SetupError::Invalid(format!(
                    "{} is bound to more than one lane",
                    lane.actuator
                )));
            }
        }
        Ok(Self {
            settings,
            lanes,
            collaborators,
        })
    }

    /// Open every source and load every preset and model named in `config`.
    pub fn build(config: &FactoryConfig, collaborators: Collaborators) -> Result<Self, SetupError> {
        let lanes = config
            .lanes
            .iter()
            .map(build_lane)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(PipelineSettings::from(config), lanes, collaborators)
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    /// Start one thread per lane and dispatch on the calling thread until
    /// every lane is done or a stop is requested.
    pub fn run(self) -> Result<RunReport, SetupError> {
        let Factory {
            settings,
            lanes,
            collaborators,
        } = self;
        let token = CancellationToken::new();
        let (tx, rx) = event_channel();

        let mut workers: Vec<WorkerHandle> = Vec::with_capacity(lanes.len());
        for lane in lanes {
            match spawn_lane(lane, tx.clone(), token.clone(), settings.sample_interval) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    error!("failed to start lane: {e}");
                    token.cancel();
                    for w in workers {
                        w.join();
                    }
                    return Err(SetupError::Spawn(e));
                }
            }
        }
        drop(tx);
        info!("{} lanes running", workers.len());

        let dispatcher = Dispatcher::new(
            rx,
            token,
            collaborators.actuator,
            collaborators.display,
            collaborators.stop,
            settings.dispatcher,
        );
        Ok(dispatcher.run(workers))
    }
}

fn build_lane(cfg: &LaneConfig) -> Result<Lane, SetupError> {
    let id = cfg.id();
    let lane_err = |source: ConfigError| SetupError::LaneConfig { lane: id, source };

    let detector = MotionDetector::load_preset(&cfg.motion.path, &cfg.motion.profile)
        .map_err(lane_err)?;
    let classifier: Box<RegionClassifier> = match &cfg.stage {
        StageConfig::Classifier(settings) => {
            Box::new(ClassifierDetector::load(settings).map_err(lane_err)?)
        }
        StageConfig::Color(preset) => Box::new(
            ColorDetector::load_preset(&preset.path, &preset.profile).map_err(lane_err)?,
        ),
    };
    let source = factory_camera::open_source(&cfg.source)
        .map_err(|source| SetupError::Source { lane: id, source })?;

    Ok(Lane {
        id,
        actuator: cfg.actuator,
        source,
        detector: Box::new(detector),
        classifier,
        rule: cfg.rule.clone(),
    })
}
