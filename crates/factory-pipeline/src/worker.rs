// factory-pipeline/src/worker.rs
//
// One sampling loop per camera:
//   cancelled? → pace → next frame → LiveFrame → motion → DetectedRegion
//   → classify → ActuatorPush (when the lane rule qualifies) → repeat
use crate::cancel::CancellationToken;
use crate::channel::{ChannelClosed, EventSender};
use crate::event::{ActuatorId, Event, SourceId};
use crate::pacer::Pacer;
use factory_camera::{CameraError, FrameSource};
use factory_detect::{ActuationRule, Classification, DetectError, RegionClassifier, RegionDetector};
use log::{debug, error, info, warn};
use std::fmt;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Frame source failed: {0}")]
    Camera(#[from] CameraError),
    #[error("{stage} stage failed: {source}")]
    Detect {
        stage: &'static str,
        #[source]
        source: DetectError,
    },
    #[error(transparent)]
    Channel(#[from] ChannelClosed),
}

/// Why a lane worker stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// Frame source reached end of stream.
    Exhausted,
    /// Observed the cancellation token.
    Cancelled,
    Failed(String),
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerExit::Exhausted => f.write_str("source exhausted"),
            WorkerExit::Cancelled => f.write_str("cancelled"),
            WorkerExit::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

/// Everything one camera lane owns.
pub struct Lane {
    pub id: SourceId,
    pub actuator: ActuatorId,
    pub source: Box<dyn FrameSource>,
    pub detector: Box<RegionDetector>,
    pub classifier: Box<RegionClassifier>,
    pub rule: ActuationRule,
}

impl fmt::Debug for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lane")
            .field("id", &self.id)
            .field("actuator", &self.actuator)
            .field("source", &self.source.describe())
            .field("detector", &self.detector.name())
            .field("classifier", &self.classifier.name())
            .field("rule", &self.rule)
            .finish()
    }
}

/// Emits the lane's `WorkerDone` when dropped, so every exit path
/// (including a panic inside a stage) produces exactly one.
struct DoneGuard {
    id: SourceId,
    events: EventSender,
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        if self.events.push(Event::WorkerDone(self.id)).is_err() {
            warn!("{}: could not report WorkerDone, dispatcher is gone", self.id);
        }
    }
}

enum Step {
    Continue,
    Exhausted,
    Cancelled,
}

pub struct WorkerHandle {
    pub id: SourceId,
    pub thread: JoinHandle<WorkerExit>,
}

impl WorkerHandle {
    /// Wait for the worker thread; a panic is reported as a failure.
    pub fn join(self) -> (SourceId, WorkerExit) {
        let exit = self
            .thread
            .join()
            .unwrap_or_else(|_| WorkerExit::Failed("worker thread panicked".to_string()));
        (self.id, exit)
    }
}

/// Start `lane` on its own named thread.
pub fn spawn_lane(
    lane: Lane,
    events: EventSender,
    token: CancellationToken,
    interval: Duration,
) -> std::io::Result<WorkerHandle> {
    let id = lane.id;
    let thread = std::thread::Builder::new()
        .name(format!("lane-{}", id.to_string().to_lowercase()))
        .spawn(move || run_lane(lane, events, token, interval))?;
    Ok(WorkerHandle { id, thread })
}

/// Run the sampling loop on the current thread until the source ends,
/// the token is cancelled or a stage fails.
pub fn run_lane(
    mut lane: Lane,
    events: EventSender,
    token: CancellationToken,
    interval: Duration,
) -> WorkerExit {
    let guard = DoneGuard {
        id: lane.id,
        events: events.clone(),
    };
    let pacer = Pacer::new(interval, token.clone());
    info!("{} started on {}", lane.id, lane.source.describe());

    let exit = loop {
        match cycle(&mut lane, &events, &token, &pacer) {
            Ok(Step::Continue) => continue,
            Ok(Step::Exhausted) => break WorkerExit::Exhausted,
            Ok(Step::Cancelled) => break WorkerExit::Cancelled,
            Err(e) => {
                error!("{}: {e}", lane.id);
                break WorkerExit::Failed(e.to_string());
            }
        }
    };

    // release the source before announcing completion
    let Lane { id, source, .. } = lane;
    drop(source);
    drop(guard);
    info!("{id} stopped: {exit}");
    exit
}

fn cycle(
    lane: &mut Lane,
    events: &EventSender,
    token: &CancellationToken,
    pacer: &Pacer,
) -> Result<Step, WorkerError> {
    if token.is_cancelled() || !pacer.wait() {
        return Ok(Step::Cancelled);
    }

    let Some(frame) = lane.source.next_frame()? else {
        return Ok(Step::Exhausted);
    };

    // live view is published whatever the stages below do with the frame
    events.push(Event::LiveFrame {
        source: lane.id,
        frame: frame.clone(),
    })?;

    let Some(region) = lane
        .detector
        .detect(&frame)
        .map_err(|source| WorkerError::Detect {
            stage: lane.detector.name(),
            source,
        })?
    else {
        return Ok(Step::Continue);
    };

    let frame_seq = region.frame_seq;
    events.push(Event::DetectedRegion {
        source: lane.id,
        region: region.clone(),
    })?;

    let class = lane
        .classifier
        .detect(&region)
        .map_err(|source| WorkerError::Detect {
            stage: lane.classifier.name(),
            source,
        })?;

    match class {
        Some(class) => {
            let push = lane.rule.qualifies(&class);
            report(lane, frame_seq, &class, push);
            if push {
                events.push(Event::ActuatorPush {
                    source: lane.id,
                    actuator: lane.actuator,
                })?;
            }
        }
        None => debug!("{} frame {frame_seq}: nothing recognised", lane.id),
    }
    Ok(Step::Continue)
}

fn report(lane: &Lane, frame_seq: u64, class: &Classification, push: bool) {
    let scores: Vec<String> = class
        .labels()
        .iter()
        .map(|l| format!("{}: {:.2}%", l.name, l.confidence * 100.0))
        .collect();
    let verdict = if push { "reject" } else { "pass" };
    info!(
        "{} frame {frame_seq}: {verdict} [{}]",
        lane.id,
        scores.join(", ")
    );
}
