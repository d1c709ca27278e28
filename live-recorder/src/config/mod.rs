//! Application configuration.
//!
//! Loaded from a TOML file (default: `<config dir>/live-recorder/config.toml`),
//! then overridden by `LIVE_RECORDER_*` environment variables. A `.env` file
//! in the working directory is honoured. Every field has a default, so a
//! missing file is not an error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use platforms_resolver::Credentials;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

const APP_DIR: &str = "live-recorder";

pub const ENV_FFMPEG: &str = "LIVE_RECORDER_FFMPEG";
pub const ENV_DATA_DIR: &str = "LIVE_RECORDER_DATA_DIR";
pub const ENV_LOG_DIR: &str = "LIVE_RECORDER_LOG_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub ffmpeg: FfmpegConfig,
    pub dedup: DedupConfig,
    pub proxy: ProxyConfig,
    pub notification: NotificationConfig,
    /// Session material per platform key.
    pub credentials: BTreeMap<String, Credentials>,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between scheduler ticks.
    pub interval_secs: u64,
    /// New captures are refused below this much free space.
    pub disk_threshold_gib: f64,
    /// Time a capture gets to finalize after the graceful stop request.
    pub stop_grace_secs: u64,
    /// Time allowed for the process tree to disappear after a forced kill.
    pub kill_timeout_secs: u64,
    /// Prune registry entries whose process vanished, once per tick.
    pub reconcile: bool,
    /// Per-request timeout for platform resolution.
    pub resolve_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            disk_threshold_gib: 1.0,
            stop_grace_secs: 10,
            kill_timeout_secs: 5,
            reconcile: true,
            resolve_timeout_secs: 30,
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_secs(self.kill_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    pub binary: String,
    pub input_args: Vec<String>,
    pub output_args: Vec<String>,
    pub user_agent: Option<String>,
    /// Socket read/write timeout passed to ffmpeg, in seconds.
    pub rw_timeout_secs: u64,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            user_agent: None,
            rw_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub platform_cache_capacity: usize,
    pub short_link_cache_capacity: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            platform_cache_capacity: 1024,
            short_link_cache_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub url: Option<String>,
}

impl ProxyConfig {
    /// Proxy URL to use, if enabled and set.
    pub fn active(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// JSON webhook receiving "stream started" pushes. Logged only when unset.
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// JSON file holding the recording list.
    pub data_file: PathBuf,
    /// Root directory for captures without their own `save_dir`.
    pub save_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self::under(&default_data_dir())
    }
}

impl PathsConfig {
    fn under(data_dir: &Path) -> Self {
        Self {
            data_file: data_dir.join("recordings.json"),
            save_dir: data_dir.join("downloads"),
            log_dir: data_dir.join("logs"),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(APP_DIR))
}

impl AppConfig {
    /// Default location of the config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
    }

    /// Load from `path` (or the default location), then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match path {
            Some(ref p) if p.exists() => {
                debug!(path = %p.display(), "Loading configuration");
                let content =
                    std::fs::read_to_string(p).map_err(|e| Error::io_path("reading config", p, e))?;
                Self::from_toml(&content)?
            }
            _ => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Invalid config file: {}", e)))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Apply `LIVE_RECORDER_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(ffmpeg) = lookup(ENV_FFMPEG).filter(|v| !v.is_empty()) {
            self.ffmpeg.binary = ffmpeg;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.is_empty()) {
            let log_dir = self.paths.log_dir.clone();
            self.paths = PathsConfig::under(Path::new(&dir));
            self.paths.log_dir = log_dir;
        }
        if let Some(dir) = lookup(ENV_LOG_DIR).filter(|v| !v.is_empty()) {
            self.paths.log_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduler.interval_secs == 0 {
            return Err(Error::config("scheduler.interval_secs must be positive"));
        }
        let threshold = self.scheduler.disk_threshold_gib;
        if threshold.is_nan() || threshold < 0.0 {
            return Err(Error::config("scheduler.disk_threshold_gib must be >= 0"));
        }
        if self.dedup.platform_cache_capacity == 0 || self.dedup.short_link_cache_capacity == 0 {
            return Err(Error::config("dedup cache capacities must be positive"));
        }
        if self.ffmpeg.binary.trim().is_empty() {
            return Err(Error::config("ffmpeg.binary must not be empty"));
        }
        Ok(())
    }

    /// Credentials configured for `platform_key`.
    pub fn credentials_for(&self, platform_key: &str) -> Option<&Credentials> {
        self.credentials.get(platform_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert_eq!(config.scheduler.interval_secs, 300);
        assert_eq!(config.ffmpeg.binary, "ffmpeg");
        assert!(config.proxy.active().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml() {
        let config = AppConfig::from_toml(
            r#"
            [scheduler]
            interval_secs = 60

            [proxy]
            enabled = true
            url = "http://127.0.0.1:7890"

            [credentials.bilibili]
            cookies = "SESSDATA=abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.interval_secs, 60);
        assert_eq!(config.scheduler.stop_grace_secs, 10);
        assert_eq!(config.proxy.active(), Some("http://127.0.0.1:7890"));
        assert_eq!(
            config.credentials_for("bilibili").and_then(|c| c.cookies.as_deref()),
            Some("SESSDATA=abc")
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = AppConfig::from_toml("[scheduler]\ninterval_secs = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
        assert!(AppConfig::from_toml("scheduler = 3").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            ENV_FFMPEG => Some("/opt/ffmpeg".to_string()),
            ENV_DATA_DIR => Some("/data".to_string()),
            _ => None,
        });
        assert_eq!(config.ffmpeg.binary, "/opt/ffmpeg");
        assert_eq!(config.paths.data_file, Path::new("/data/recordings.json"));
        assert_eq!(config.paths.save_dir, Path::new("/data/downloads"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.dedup.platform_cache_capacity, 1024);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.scheduler.interval_secs, config.scheduler.interval_secs);
    }
}
