//! Events published to observers of the engine.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::RecordingStatus;

#[derive(Debug, Clone, Serialize)]
pub enum RecordingEvent {
    /// Visible state of a recording changed.
    Changed {
        recording_id: String,
        status: RecordingStatus,
        message: Option<String>,
    },
    /// A stream was detected going live.
    StreamStarted {
        recording_id: String,
        streamer_name: String,
        title: String,
        timestamp: DateTime<Utc>,
    },
    /// A capture ended; the file is ready for post-processing.
    CaptureFinished {
        recording_id: String,
        output_path: Option<PathBuf>,
        success: bool,
        timestamp: DateTime<Utc>,
    },
    DiskSpaceLow {
        available_gib: f64,
        threshold_gib: f64,
    },
    DiskSpaceRecovered {
        available_gib: f64,
    },
}

impl RecordingEvent {
    pub fn recording_id(&self) -> Option<&str> {
        match self {
            Self::Changed { recording_id, .. }
            | Self::StreamStarted { recording_id, .. }
            | Self::CaptureFinished { recording_id, .. } => Some(recording_id),
            Self::DiskSpaceLow { .. } | Self::DiskSpaceRecovered { .. } => None,
        }
    }

    /// Human-readable one-liner.
    pub fn description(&self) -> String {
        match self {
            Self::Changed {
                recording_id,
                status,
                message,
            } => match message {
                Some(message) => format!("{recording_id}: {status} ({message})"),
                None => format!("{recording_id}: {status}"),
            },
            Self::StreamStarted {
                streamer_name,
                title,
                ..
            } => format!("{streamer_name} is now live: {title}"),
            Self::CaptureFinished {
                recording_id,
                output_path,
                ..
            } => match output_path {
                Some(path) => format!("{recording_id}: capture finished, {}", path.display()),
                None => format!("{recording_id}: capture finished"),
            },
            Self::DiskSpaceLow {
                available_gib,
                threshold_gib,
            } => format!(
                "free disk space {available_gib:.2} GiB below {threshold_gib:.2} GiB, new captures paused"
            ),
            Self::DiskSpaceRecovered { available_gib } => {
                format!("free disk space recovered to {available_gib:.2} GiB")
            }
        }
    }
}

/// Fan-out of [`RecordingEvent`]s.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<RecordingEvent>,
}

impl EventBroadcaster {
    /// Broadcaster with the default capacity (256).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: RecordingEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_subscribe() {
        let broadcaster = EventBroadcaster::new();
        // no subscribers yet
        broadcaster.publish(RecordingEvent::DiskSpaceRecovered { available_gib: 3.0 });

        let mut receiver = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);
        broadcaster.publish(RecordingEvent::Changed {
            recording_id: "rec-1".into(),
            status: RecordingStatus::Offline,
            message: None,
        });

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.recording_id(), Some("rec-1"));
        assert_eq!(event.description(), "rec-1: offline");
    }

    #[test]
    fn test_disk_event_description() {
        let event = RecordingEvent::DiskSpaceLow {
            available_gib: 0.5,
            threshold_gib: 1.0,
        };
        assert!(event.recording_id().is_none());
        assert!(event.description().contains("0.50 GiB"));
    }
}
