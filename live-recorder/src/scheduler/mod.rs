//! Periodic scheduling of live checks.

mod resource;
mod service;

pub use resource::{DiskMonitor, DiskSpaceStatus, bytes_to_gib};
pub use service::{Scheduler, TickReport};
