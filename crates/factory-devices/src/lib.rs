// factory-devices/src/lib.rs
// ============================================================
// factory-devices  –  what the dispatcher drives
// ------------------------------------------------------------
// Public API
//   * FactoryController::open(path) – serial line, START/STOP scoped
//   * SnapshotDisplay::new(dir)     – latest PNG per title
//   * NullDisplay                   – headless
//   * WindowDisplay::new()          – SDL2 windows (feature "sdl")
// ============================================================

mod controller;
mod display;
#[cfg(feature = "sdl")]
mod window;

pub use controller::{Command, FactoryController};
pub use display::{title_slug, NullDisplay, SnapshotDisplay};
#[cfg(feature = "sdl")]
pub use window::WindowDisplay;
