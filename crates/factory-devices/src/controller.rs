// factory-devices/src/controller.rs
//
// Line protocol to the conveyor controller: one ASCII command per line.
//   START       conveyor on, status light green
//   PUSH <n>    fire pusher on lane n
//   STOP        conveyor off
use factory_pipeline::{Actuator, ActuatorId, DeviceError};
use log::{error, info, warn};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Push(ActuatorId),
    Stop,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Start => f.write_str("START"),
            Command::Push(lane) => write!(f, "PUSH {}", lane.number()),
            Command::Stop => f.write_str("STOP"),
        }
    }
}

/// Scoped handle on the controller: `open` starts the line and dropping the
/// handle stops it.
///
/// When the device cannot be opened the controller stays *detached*: the
/// line keeps running and every push reports [`DeviceError::Unavailable`].
pub struct FactoryController {
    path: String,
    port: Option<File>,
}

impl FactoryController {
    pub fn open(path: &Path) -> Self {
        let shown = path.display().to_string();
        let port = match OpenOptions::new().write(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("factory controller {shown} unavailable ({e}); running detached");
                None
            }
        };
        let mut controller = Self { path: shown, port };
        if controller.port.is_some() {
            match controller.send(Command::Start) {
                Ok(()) => info!("factory controller {} started", controller.path),
                Err(e) => error!("{e}"),
            }
        }
        controller
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn send(&mut self, command: Command) -> Result<(), DeviceError> {
        let Some(port) = self.port.as_mut() else {
            return Err(DeviceError::Unavailable(self.path.clone()));
        };
        writeln!(port, "{command}")
            .and_then(|_| port.flush())
            .map_err(|source| DeviceError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

impl Actuator for FactoryController {
    fn push(&mut self, lane: ActuatorId) -> Result<(), DeviceError> {
        self.send(Command::Push(lane))
    }
}

impl Drop for FactoryController {
    fn drop(&mut self) {
        if self.port.is_none() {
            return;
        }
        match self.send(Command::Stop) {
            Ok(()) => info!("factory controller {} stopped", self.path),
            Err(e) => error!("{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_render_as_lines() {
        assert_eq!(Command::Start.to_string(), "START");
        assert_eq!(Command::Push(ActuatorId::Lane2).to_string(), "PUSH 2");
        assert_eq!(Command::Stop.to_string(), "STOP");
    }

    #[test]
    fn detached_controller_reports_unavailable() {
        let mut c = FactoryController::open(Path::new("/nonexistent/dir/ttyACM9"));
        assert!(!c.is_connected());
        assert!(matches!(
            c.push(ActuatorId::Lane1),
            Err(DeviceError::Unavailable(_))
        ));
    }
}
