//! Loading and saving the recording list.

mod dto;
mod store;

pub use dto::RecordingDto;
pub use store::{JsonFileStore, MemoryStore, RecordingStore};
