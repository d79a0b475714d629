// factory-pipeline/src/lib.rs
// ============================================================
// factory-pipeline  –  lanes, event channel, dispatcher
// N lane threads sample, detect and push events; the calling
// thread dispatches them to the display and the actuator.
// ------------------------------------------------------------
// lane thread ─┐
//              ├─▶ EventChannel ─▶ Dispatcher ─▶ DisplaySink / Actuator
// lane thread ─┘        ▲                 │
//                       └── CancellationToken (one writer)
// ------------------------------------------------------------
// Public API
//   * Factory::build(config, collaborators) – setup phase
//   * Factory::run()                         – run phase, RunReport
//   * Actuator / DisplaySink / StopRequest   – side-effect seams
// ============================================================

//! Conveyor – event pipeline
//!
//! Lane workers never touch the actuator or the display; only the
//! [`Dispatcher`] does, from a single thread. Shutdown is cooperative:
//! every loop checks the shared [`CancellationToken`] once per iteration.

mod cancel;
mod channel;
mod config;
mod dispatcher;
mod event;
mod factory;
mod pacer;
mod sink;
mod worker;

pub use cancel::CancellationToken;
pub use channel::{event_channel, ChannelClosed, EventReceiver, EventSender, Pulled};
pub use config::{FactoryConfig, LaneConfig, PresetRef, StageConfig};
pub use dispatcher::{
    DispatchState, Dispatcher, DispatcherSettings, EventCounts, RunReport, ShutdownCause,
};
pub use event::{display_title, ActuatorId, Event, EventKind, SourceId};
pub use factory::{Collaborators, Factory, PipelineSettings, SetupError};
pub use pacer::Pacer;
pub use sink::{Actuator, DeviceError, DisplayError, DisplaySink, NeverStop, StopRequest};
pub use worker::{run_lane, spawn_lane, Lane, WorkerError, WorkerExit, WorkerHandle};
