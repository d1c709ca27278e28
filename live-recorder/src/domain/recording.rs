//! The recording target: configuration plus the runtime state the engine owns.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use platforms_resolver::{PlatformMatch, Quality};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::state::NotificationState;
use super::value_objects::{RecordingUrl, ScheduleWindow};
use crate::{Error, Result};

/// Whether a live stream is captured automatically or only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordMode {
    #[default]
    Auto,
    Manual,
}

impl std::str::FromStr for RecordMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            other => Err(Error::validation(format!("unknown record mode: {other}"))),
        }
    }
}

/// Output container of the capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    #[default]
    Ts,
    Flv,
    Mkv,
    Mp4,
}

impl ContainerFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ts => "ts",
            Self::Flv => "flv",
            Self::Mkv => "mkv",
            Self::Mp4 => "mp4",
        }
    }

    /// ffmpeg muxer name.
    pub fn muxer(&self) -> &'static str {
        match self {
            Self::Ts => "mpegts",
            Self::Flv => "flv",
            Self::Mkv => "matroska",
            Self::Mp4 => "mp4",
        }
    }
}

/// User-editable settings of a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub quality: Quality,
    pub container: ContainerFormat,
    pub segment_enabled: bool,
    pub segment_time_secs: u64,
    pub scheduled_enabled: bool,
    /// `HH:MM:SS` start of the daily window.
    pub scheduled_start: String,
    pub monitor_hours: f64,
    /// Overrides the global save directory.
    pub save_dir: Option<PathBuf>,
    pub record_mode: RecordMode,
    /// Report the stream going live but never capture it.
    pub notify_only: bool,
    pub push_enabled: bool,
    /// Per-target poll interval; the scheduler interval when unset.
    pub loop_time_secs: Option<u64>,
    /// User supplied display/anchor name.
    pub streamer_name: Option<String>,
    /// Thumbnail and translation overrides of the presentation layer, stored as-is.
    pub presentation: serde_json::Value,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            quality: Quality::Od,
            container: ContainerFormat::Ts,
            segment_enabled: false,
            segment_time_secs: 1800,
            scheduled_enabled: false,
            scheduled_start: "00:00:00".to_string(),
            monitor_hours: 24.0,
            save_dir: None,
            record_mode: RecordMode::Auto,
            notify_only: false,
            push_enabled: true,
            loop_time_secs: None,
            streamer_name: None,
            presentation: serde_json::Value::Null,
        }
    }
}

impl RecordingConfig {
    /// Whether a live stream should be captured rather than only reported.
    pub fn captures(&self) -> bool {
        self.record_mode == RecordMode::Auto && !self.notify_only
    }

    /// The daily window, if scheduling is enabled.
    pub fn schedule(&self) -> Result<Option<ScheduleWindow>> {
        if !self.scheduled_enabled {
            return Ok(None);
        }
        ScheduleWindow::parse(&self.scheduled_start, self.monitor_hours).map(Some)
    }

    pub fn validate(&self) -> Result<()> {
        self.schedule()?;
        if self.segment_enabled && self.segment_time_secs == 0 {
            return Err(Error::validation("segment time must be positive"));
        }
        if self.loop_time_secs == Some(0) {
            return Err(Error::validation("loop time must be positive"));
        }
        Ok(())
    }
}

/// Visible state of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordingStatus {
    #[default]
    Idle,
    Checking,
    Offline,
    LiveNotRecording,
    Recording,
    CheckError,
    RecordingError,
    /// Live check skipped, outside the scheduled window.
    OutOfSchedule,
    /// Live but not started, free disk space below the threshold.
    DiskFull,
}

impl RecordingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::Offline => "offline",
            Self::LiveNotRecording => "live",
            Self::Recording => "recording",
            Self::CheckError => "check_error",
            Self::RecordingError => "recording_error",
            Self::OutOfSchedule => "out_of_schedule",
            Self::DiskFull => "disk_full",
        }
    }
}

impl fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State owned by the engine; reset whenever a recording is loaded.
#[derive(Debug, Clone, Default)]
pub struct RecordingRuntime {
    pub is_live: bool,
    pub is_recording: bool,
    pub is_checking: bool,
    pub monitor_enabled: bool,
    pub status: RecordingStatus,
    pub status_message: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub cumulative_duration: Duration,
    pub last_duration: Duration,
    pub notification: NotificationState,
    pub detection_time: Option<DateTime<Utc>>,
    pub live_title: Option<String>,
    /// Translation of `live_title` cached by the presentation layer.
    pub translated_title: Option<String>,
    pub anchor_name: Option<String>,
    /// Directory of the current broadcast, chosen once per live session.
    pub recording_dir: Option<PathBuf>,
    pub last_check_at: Option<Instant>,
    pub consecutive_errors: u32,
    /// Set by a permanent resolution failure; cleared when the target is edited.
    pub check_halted: bool,
    pub output_path: Option<PathBuf>,
}

/// Consecutive transient failures before backoff applies.
pub const BACKOFF_THRESHOLD: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(60);
const BACKOFF_CAP: Duration = Duration::from_secs(60 * 60);

impl RecordingRuntime {
    /// Poll interval after applying exponential backoff for repeated
    /// transient failures. Never shorter than `base`.
    pub fn effective_interval(&self, base: Duration) -> Duration {
        if self.consecutive_errors < BACKOFF_THRESHOLD {
            return base;
        }
        let exponent = (self.consecutive_errors - BACKOFF_THRESHOLD).min(16);
        let backoff = BACKOFF_BASE.saturating_mul(1 << exponent).min(BACKOFF_CAP);
        base.max(backoff)
    }

    /// Whether a check is due at `now` for the given interval.
    pub fn is_due(&self, now: Instant, base: Duration) -> bool {
        match self.last_check_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.effective_interval(base),
        }
    }
}

/// One monitored live-stream room.
#[derive(Debug, Clone)]
pub struct Recording {
    pub id: String,
    pub url: RecordingUrl,
    pub platform: PlatformMatch,
    pub config: RecordingConfig,
    pub runtime: RecordingRuntime,
}

impl Recording {
    /// Create a new recording with a fresh id.
    pub fn new(url: RecordingUrl, config: RecordingConfig) -> Result<Self> {
        Self::with_id(uuid::Uuid::new_v4().to_string(), url, config)
    }

    pub fn with_id(id: impl Into<String>, url: RecordingUrl, config: RecordingConfig) -> Result<Self> {
        config.validate()?;
        let platform = url
            .platform()
            .ok_or_else(|| Error::validation(format!("cannot identify platform of {url}")))?;
        Ok(Self {
            id: id.into(),
            url,
            platform,
            config,
            runtime: RecordingRuntime::default(),
        })
    }

    pub fn platform_key(&self) -> &str {
        &self.platform.key
    }

    /// Best known name for the streamer: user supplied, then platform reported.
    pub fn display_name(&self) -> &str {
        self.config
            .streamer_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.runtime.anchor_name.as_deref())
            .unwrap_or(self.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(url: &str) -> Recording {
        Recording::new(RecordingUrl::new(url).unwrap(), RecordingConfig::default()).unwrap()
    }

    #[test]
    fn test_new_recording_identifies_platform() {
        let rec = recording("https://www.huya.com/660000");
        assert_eq!(rec.platform_key(), "huya");
        assert_eq!(rec.runtime.status, RecordingStatus::Idle);
        assert!(uuid::Uuid::parse_str(&rec.id).is_ok());
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut rec = recording("https://live.example.com/1");
        assert_eq!(rec.display_name(), "https://live.example.com/1");
        rec.runtime.anchor_name = Some("Alice".into());
        assert_eq!(rec.display_name(), "Alice");
        rec.config.streamer_name = Some("Bob".into());
        assert_eq!(rec.display_name(), "Bob");
    }

    #[test]
    fn test_captures() {
        let mut config = RecordingConfig::default();
        assert!(config.captures());
        config.notify_only = true;
        assert!(!config.captures());
        config.notify_only = false;
        config.record_mode = RecordMode::Manual;
        assert!(!config.captures());
    }

    #[test]
    fn test_config_validation() {
        let config = RecordingConfig {
            scheduled_enabled: true,
            scheduled_start: "nope".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RecordingConfig {
            loop_time_secs: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_interval_backoff() {
        let base = Duration::from_secs(30);
        let mut runtime = RecordingRuntime::default();
        assert_eq!(runtime.effective_interval(base), base);

        runtime.consecutive_errors = 3;
        assert_eq!(runtime.effective_interval(base), Duration::from_secs(60));
        runtime.consecutive_errors = 5;
        assert_eq!(runtime.effective_interval(base), Duration::from_secs(240));
        runtime.consecutive_errors = 40;
        assert_eq!(runtime.effective_interval(base), Duration::from_secs(3600));

        // a long base interval is never shortened
        runtime.consecutive_errors = 3;
        assert_eq!(
            runtime.effective_interval(Duration::from_secs(600)),
            Duration::from_secs(600)
        );
    }

    #[test]
    fn test_record_mode_parse() {
        assert_eq!("Manual".parse::<RecordMode>().unwrap(), RecordMode::Manual);
        assert!("sometimes".parse::<RecordMode>().is_err());
    }
}
