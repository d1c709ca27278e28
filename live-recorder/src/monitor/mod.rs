//! Live detection and the orchestrator that acts on it.

pub mod detector;
pub mod events;
pub mod service;

pub use detector::{CheckRequest, LiveStatus, StreamDetector};
pub use events::{EventBroadcaster, RecordingEvent};
pub use service::{Collaborators, RecordingOrchestrator};
