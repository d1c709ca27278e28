//! Capture process supervision.
//!
//! Spawns ffmpeg (or any capture command), tracks it in a registry keyed by
//! handle id and tears it down gracefully first, forcefully second.

mod handle;
mod service;

pub use handle::{CaptureCommand, ExitOutcome, ProcessHandle};
pub use service::ProcessSupervisor;
