//! live-recorder library crate.
//!
//! Watches live-stream rooms across platforms and records them with ffmpeg
//! while they are live. The binary wires these modules together; the
//! library is exposed for integration testing and embedding.

pub mod capture;
pub mod config;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod persistence;
pub mod scheduler;
pub mod supervisor;
pub mod utils;

pub use error::{Error, Result};
