//! Persisted form of a recording.

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::domain::{Recording, RecordingConfig, RecordingUrl};

/// What survives a restart: identity, configuration, the last seen title
/// and the monitor flag. Everything else in the runtime starts fresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingDto {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub config: RecordingConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_name: Option<String>,
    #[serde(default)]
    pub monitor_enabled: bool,
}

impl From<&Recording> for RecordingDto {
    fn from(recording: &Recording) -> Self {
        Self {
            id: recording.id.clone(),
            url: recording.url.to_string(),
            config: recording.config.clone(),
            last_title: recording.runtime.live_title.clone(),
            translated_title: recording.runtime.translated_title.clone(),
            anchor_name: recording.runtime.anchor_name.clone(),
            monitor_enabled: recording.runtime.monitor_enabled,
        }
    }
}

impl RecordingDto {
    /// Rebuild the entity with a fresh runtime.
    ///
    /// The monitor flag is returned separately: the orchestrator restarts
    /// monitoring through the state machine rather than restoring it raw.
    pub fn into_recording(self) -> Result<(Recording, bool)> {
        let url = RecordingUrl::new(&self.url)?;
        let mut recording = Recording::with_id(self.id, url, self.config)?;
        recording.runtime.live_title = self.last_title;
        recording.runtime.translated_title = self.translated_title;
        recording.runtime.anchor_name = self.anchor_name;
        Ok((recording, self.monitor_enabled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RecordingStatus, StateInput};

    #[test]
    fn test_runtime_resets_on_load() {
        let mut recording = Recording::with_id(
            "rec-1",
            RecordingUrl::new("https://www.huya.com/660000").unwrap(),
            RecordingConfig::default(),
        )
        .unwrap();
        recording.apply(StateInput::MonitorStarted);
        recording.runtime.is_live = true;
        recording.runtime.consecutive_errors = 7;
        recording.runtime.live_title = Some("late night".into());
        recording.runtime.translated_title = Some("深夜".into());

        let dto = RecordingDto::from(&recording);
        assert!(dto.monitor_enabled);

        let (restored, monitor) = dto.into_recording().unwrap();
        assert!(monitor);
        assert_eq!(restored.id, "rec-1");
        assert_eq!(restored.platform_key(), "huya");
        assert_eq!(restored.runtime.live_title.as_deref(), Some("late night"));
        assert_eq!(restored.runtime.translated_title.as_deref(), Some("深夜"));
        assert!(!restored.runtime.is_live);
        assert!(!restored.runtime.monitor_enabled);
        assert_eq!(restored.runtime.consecutive_errors, 0);
        assert_eq!(restored.runtime.status, RecordingStatus::Idle);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dto: RecordingDto =
            serde_json::from_str(r#"{"id":"a","url":"https://www.twitch.tv/alice"}"#).unwrap();
        assert!(!dto.monitor_enabled);
        assert_eq!(dto.config, RecordingConfig::default());
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let dto = RecordingDto {
            id: "a".into(),
            url: "not a url".into(),
            config: RecordingConfig::default(),
            last_title: None,
            translated_title: None,
            anchor_name: None,
            monitor_enabled: false,
        };
        assert!(dto.into_recording().is_err());
    }
}
