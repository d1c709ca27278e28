//! Value objects for the recording domain.

mod recording_url;
mod schedule;

pub use recording_url::RecordingUrl;
pub use schedule::ScheduleWindow;
