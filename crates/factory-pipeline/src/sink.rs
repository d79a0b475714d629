// factory-pipeline/src/sink.rs
//
// Everything the dispatcher drives. Implementations live in factory-devices
// (hardware, files, windows) and in the tests (scripted fakes).
use crate::event::ActuatorId;
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Actuator device {0} is not connected")]
    Unavailable(String),
    #[error("Write to actuator device {path} failed: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("Display backend error: {0}")]
    Backend(String),
}

/// Owner of the physical push lanes. Used from the dispatcher thread only.
pub trait Actuator {
    fn push(&mut self, lane: ActuatorId) -> Result<(), DeviceError>;
}

/// Named image outputs. Showing the same title again replaces the image.
pub trait DisplaySink {
    fn show(&mut self, title: &str, image: &RgbImage) -> Result<(), DisplayError>;

    /// Operator asked to quit from the display itself.
    fn quit_requested(&mut self) -> bool {
        false
    }
}

/// External stop signal polled once per dispatcher iteration.
pub trait StopRequest {
    fn stop_requested(&mut self) -> bool;
}

impl StopRequest for Arc<AtomicBool> {
    fn stop_requested(&mut self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

/// Stop source that never fires.
pub struct NeverStop;

impl StopRequest for NeverStop {
    fn stop_requested(&mut self) -> bool {
        false
    }
}

impl<T: Actuator + ?Sized> Actuator for Box<T> {
    fn push(&mut self, lane: ActuatorId) -> Result<(), DeviceError> {
        (**self).push(lane)
    }
}

impl<T: DisplaySink + ?Sized> DisplaySink for Box<T> {
    fn show(&mut self, title: &str, image: &RgbImage) -> Result<(), DisplayError> {
        (**self).show(title, image)
    }

    fn quit_requested(&mut self) -> bool {
        (**self).quit_requested()
    }
}
