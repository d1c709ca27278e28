//! Domain layer: the recording entity, its state machine and value objects.

pub mod recording;
pub mod state;
pub mod value_objects;

pub use recording::{
    ContainerFormat, RecordMode, Recording, RecordingConfig, RecordingRuntime, RecordingStatus,
};
pub use state::{Effects, NotificationState, StateInput};
pub use value_objects::{RecordingUrl, ScheduleWindow};
