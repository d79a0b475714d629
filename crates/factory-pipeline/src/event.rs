//! Typed messages flowing from lane workers to the dispatcher.

use factory_camera::Frame;
use factory_detect::Region;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Camera / lane identity, shown as `Cam<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u8);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cam{}", self.0)
    }
}

/// Physical actuator lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ActuatorId {
    Lane1,
    Lane2,
}

impl ActuatorId {
    pub fn number(self) -> u8 {
        match self {
            ActuatorId::Lane1 => 1,
            ActuatorId::Lane2 => 2,
        }
    }
}

impl TryFrom<u8> for ActuatorId {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(ActuatorId::Lane1),
            2 => Ok(ActuatorId::Lane2),
            other => Err(format!("no actuator lane {other} (expected 1 or 2)")),
        }
    }
}

impl From<ActuatorId> for u8 {
    fn from(id: ActuatorId) -> u8 {
        id.number()
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actuator {}", self.number())
    }
}

/// Event payloads own their pixels; the dispatcher consumes them.
#[derive(Debug)]
pub enum Event {
    LiveFrame { source: SourceId, frame: Frame },
    DetectedRegion { source: SourceId, region: Region },
    ActuatorPush { source: SourceId, actuator: ActuatorId },
    WorkerDone(SourceId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    LiveFrame,
    DetectedRegion,
    ActuatorPush,
    WorkerDone,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::LiveFrame { .. } => EventKind::LiveFrame,
            Event::DetectedRegion { .. } => EventKind::DetectedRegion,
            Event::ActuatorPush { .. } => EventKind::ActuatorPush,
            Event::WorkerDone(_) => EventKind::WorkerDone,
        }
    }

    pub fn source(&self) -> SourceId {
        match self {
            Event::LiveFrame { source, .. }
            | Event::DetectedRegion { source, .. }
            | Event::ActuatorPush { source, .. } => *source,
            Event::WorkerDone(source) => *source,
        }
    }
}

/// Display title for an image event, e.g. `Cam1 live`.
pub fn display_title(source: SourceId, kind: EventKind) -> String {
    let stage = match kind {
        EventKind::LiveFrame => "live",
        EventKind::DetectedRegion => "detected",
        EventKind::ActuatorPush => "push",
        EventKind::WorkerDone => "done",
    };
    format!("{source} {stage}")
}
