// factory-pipeline/src/dispatcher.rs
//
// Single consumer of the event channel and the only caller of the actuator
// and display. Owns the cancellation token's write side.
//
//   RUNNING ──(all WorkerDone | external stop)──▶ DRAINING ──(joined)──▶ STOPPED
use crate::cancel::CancellationToken;
use crate::channel::{EventReceiver, Pulled};
use crate::event::{display_title, Event, EventKind, SourceId};
use crate::pacer::Pacer;
use crate::sink::{Actuator, DisplaySink, StopRequest};
use crate::worker::{WorkerExit, WorkerHandle};
use log::{debug, error, info, warn};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// Every expected lane reported `WorkerDone`.
    AllWorkersDone,
    /// Stop request from the operator or the display.
    ExternalStop,
    /// Every sender vanished without all `WorkerDone` events arriving.
    ProducersGone,
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownCause::AllWorkersDone => "all lanes finished",
            ShutdownCause::ExternalStop => "stop requested",
            ShutdownCause::ProducersGone => "all lanes vanished",
        })
    }
}

/// Events handled, by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventCounts {
    pub live: u64,
    pub detected: u64,
    pub pushes: u64,
    pub done: u64,
}

impl EventCounts {
    fn record(&mut self, kind: EventKind) {
        match kind {
            EventKind::LiveFrame => self.live += 1,
            EventKind::DetectedRegion => self.detected += 1,
            EventKind::ActuatorPush => self.pushes += 1,
            EventKind::WorkerDone => self.done += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub cause: ShutdownCause,
    pub handled: EventCounts,
    pub pushes_failed: u64,
    pub display_failures: u64,
    /// Events dropped unhandled after shutdown began: images always,
    /// pushes too once every lane had finished.
    pub discarded: u64,
    pub final_state: DispatchState,
    pub workers: Vec<(SourceId, WorkerExit)>,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shutdown: {}; frames {} regions {} pushes {} ({} failed), {} discarded",
            self.cause,
            self.handled.live,
            self.handled.detected,
            self.handled.pushes,
            self.pushes_failed,
            self.discarded
        )?;
        for (id, exit) in &self.workers {
            write!(f, "; {id} {exit}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DispatcherSettings {
    /// Poll period while the channel is empty.
    pub idle_poll: Duration,
    /// Upper bound on events pulled in each drain pass after shutdown.
    pub final_drain_limit: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_millis(10),
            final_drain_limit: 64,
        }
    }
}

pub struct Dispatcher {
    events: EventReceiver,
    token: CancellationToken,
    actuator: Box<dyn Actuator>,
    display: Box<dyn DisplaySink>,
    stop: Box<dyn StopRequest>,
    settings: DispatcherSettings,
    expected: BTreeSet<SourceId>,
    done: BTreeSet<SourceId>,
    state: DispatchState,
    cause: Option<ShutdownCause>,
    handled: EventCounts,
    pushes_failed: u64,
    display_failures: u64,
    discarded: u64,
}

impl Dispatcher {
    pub fn new(
        events: EventReceiver,
        token: CancellationToken,
        actuator: Box<dyn Actuator>,
        display: Box<dyn DisplaySink>,
        stop: Box<dyn StopRequest>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            events,
            token,
            actuator,
            display,
            stop,
            settings,
            expected: BTreeSet::new(),
            done: BTreeSet::new(),
            state: DispatchState::Running,
            cause: None,
            handled: EventCounts::default(),
            pushes_failed: 0,
            display_failures: 0,
            discarded: 0,
        }
    }

    /// Drive the lanes to completion, join them, then release the actuator
    /// and the display (in that order).
    pub fn run(mut self, workers: Vec<WorkerHandle>) -> RunReport {
        self.expected = workers.iter().map(|w| w.id).collect();
        if self.expected.is_empty() {
            self.shut_down(ShutdownCause::AllWorkersDone);
        }

        let pacer = Pacer::new(self.settings.idle_poll, self.token.clone());
        while self.state == DispatchState::Running {
            self.poll_stop();
            if self.token.is_cancelled() {
                self.state = DispatchState::Draining;
                break;
            }
            match self.events.try_pull() {
                Pulled::Event(event) => {
                    self.dispatch(event);
                    self.events.ack();
                }
                Pulled::Empty => {
                    pacer.wait();
                }
                Pulled::Closed => {
                    warn!(
                        "event channel closed with lanes {:?} unreported",
                        self.missing()
                    );
                    self.shut_down(ShutdownCause::ProducersGone);
                }
            }
        }
        self.state = DispatchState::Draining;
        info!("shutting down: {}", self.cause_or_external());

        self.drain();
        let exits: Vec<(SourceId, WorkerExit)> =
            workers.into_iter().map(WorkerHandle::join).collect();
        // anything pushed between the first drain and the joins
        self.drain();
        let left = self.events.queued();
        if left > 0 {
            warn!("{left} events left unhandled after shutdown");
        }
        debug!("{} events pulled but not acknowledged", self.events.unacked());
        self.state = DispatchState::Stopped;

        let report = RunReport {
            cause: self.cause_or_external(),
            handled: self.handled,
            pushes_failed: self.pushes_failed,
            display_failures: self.display_failures,
            discarded: self.discarded,
            final_state: self.state,
            workers: exits,
        };
        let Dispatcher {
            actuator, display, ..
        } = self;
        drop(actuator);
        drop(display);
        debug!("actuator and display released");
        report
    }

    fn poll_stop(&mut self) {
        if self.token.is_cancelled() {
            return;
        }
        if self.stop.stop_requested() || self.display.quit_requested() {
            info!("stop requested");
            self.shut_down(ShutdownCause::ExternalStop);
        }
    }

    fn shut_down(&mut self, cause: ShutdownCause) {
        if self.token.cancel() {
            self.cause = Some(cause);
        }
    }

    fn cause_or_external(&self) -> ShutdownCause {
        self.cause.unwrap_or(ShutdownCause::ExternalStop)
    }

    fn missing(&self) -> Vec<SourceId> {
        self.expected.difference(&self.done).copied().collect()
    }

    fn dispatch(&mut self, event: Event) {
        self.handled.record(event.kind());
        match event {
            Event::LiveFrame { source, frame } => {
                self.show(&display_title(source, EventKind::LiveFrame), &frame.image)
            }
            Event::DetectedRegion { source, region } => self.show(
                &display_title(source, EventKind::DetectedRegion),
                &region.image,
            ),
            Event::ActuatorPush { source, actuator } => self.push(source, actuator),
            Event::WorkerDone(source) => self.worker_done(source),
        }
    }

    fn show(&mut self, title: &str, image: &image::RgbImage) {
        if let Err(e) = self.display.show(title, image) {
            self.display_failures += 1;
            warn!("display {title}: {e}");
        }
    }

    fn push(&mut self, source: SourceId, actuator: crate::event::ActuatorId) {
        match self.actuator.push(actuator) {
            Ok(()) => info!("{source}: pushed {actuator}"),
            Err(e) => {
                self.pushes_failed += 1;
                error!("{source}: {actuator} push failed: {e}");
            }
        }
    }

    fn worker_done(&mut self, source: SourceId) {
        if !self.done.insert(source) {
            warn!("duplicate WorkerDone from {source}");
        }
        info!("{source} done");
        if self.expected.is_subset(&self.done) {
            self.shut_down(ShutdownCause::AllWorkersDone);
        }
    }

    /// Pull at most `final_drain_limit` events. Images are dropped unshown.
    /// Pushes reach the actuator only after an external stop or lost lanes;
    /// once every lane reported done nothing has side effects.
    fn drain(&mut self) {
        for _ in 0..self.settings.final_drain_limit {
            let event = match self.events.try_pull() {
                Pulled::Event(event) => event,
                Pulled::Empty | Pulled::Closed => return,
            };
            match event {
                Event::ActuatorPush { source, actuator } => {
                    if self.cause == Some(ShutdownCause::AllWorkersDone) {
                        self.discarded += 1;
                        debug!("{source}: {actuator} push dropped, every lane is done");
                    } else {
                        self.handled.record(EventKind::ActuatorPush);
                        self.push(source, actuator);
                    }
                }
                Event::WorkerDone(source) => {
                    self.handled.record(EventKind::WorkerDone);
                    self.done.insert(source);
                    debug!("{source} done (while draining)");
                }
                Event::LiveFrame { .. } | Event::DetectedRegion { .. } => self.discarded += 1,
            }
            self.events.ack();
        }
    }
}
