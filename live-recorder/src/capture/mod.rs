//! ffmpeg command construction.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use platforms_resolver::headers::headers_for;

use crate::config::FfmpegConfig;
use crate::domain::{ContainerFormat, Recording};
use crate::supervisor::CaptureCommand;
use crate::utils::filename::{capture_file_stem, sanitize_filename};

/// Builds the argv of a capture.
///
/// Layout: global flags, configured input args, user agent, headers, proxy,
/// `-i <url>`, stream copy, configured output args, muxer/segment options
/// and finally the output path.
#[derive(Debug, Clone)]
pub struct CommandBuilder<'a> {
    ffmpeg: &'a FfmpegConfig,
    input_url: String,
    headers: Vec<(String, String)>,
    proxy: Option<String>,
    container: ContainerFormat,
    segment_time_secs: Option<u64>,
    output_dir: PathBuf,
    file_stem: String,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(ffmpeg: &'a FfmpegConfig, input_url: impl Into<String>) -> Self {
        Self {
            ffmpeg,
            input_url: input_url.into(),
            headers: Vec::new(),
            proxy: None,
            container: ContainerFormat::default(),
            segment_time_secs: None,
            output_dir: PathBuf::from("."),
            file_stem: "capture".to_string(),
        }
    }

    /// Add the static headers the CDN of `platform_key` expects.
    pub fn platform_headers(mut self, platform_key: &str) -> Self {
        self.headers.extend(
            headers_for(platform_key)
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn proxy(mut self, proxy: Option<&str>) -> Self {
        self.proxy = proxy.map(str::to_owned);
        self
    }

    pub fn container(mut self, container: ContainerFormat) -> Self {
        self.container = container;
        self
    }

    /// Split the output every `secs` seconds; `None` writes a single file.
    pub fn segment(mut self, secs: Option<u64>) -> Self {
        self.segment_time_secs = secs.filter(|s| *s > 0);
        self
    }

    pub fn output(mut self, dir: impl Into<PathBuf>, file_stem: impl Into<String>) -> Self {
        self.output_dir = dir.into();
        self.file_stem = file_stem.into();
        self
    }

    /// Path of the (first) output file.
    pub fn output_path(&self) -> PathBuf {
        let ext = self.container.extension();
        match self.segment_time_secs {
            Some(_) => self.output_dir.join(format!("{}_%03d.{}", self.file_stem, ext)),
            None => self.output_dir.join(format!("{}.{}", self.file_stem, ext)),
        }
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-loglevel", "error", "-nostats"]
            .map(String::from)
            .to_vec();

        args.extend(self.ffmpeg.input_args.iter().cloned());

        if self.ffmpeg.rw_timeout_secs > 0 {
            args.extend([
                "-rw_timeout".to_string(),
                (self.ffmpeg.rw_timeout_secs * 1_000_000).to_string(),
            ]);
        }

        if let Some(ref ua) = self.ffmpeg.user_agent {
            args.extend(["-user_agent".to_string(), ua.clone()]);
        }

        if !self.headers.is_empty() {
            let joined: String = self
                .headers
                .iter()
                .map(|(k, v)| format!("{}: {}\r\n", k, v))
                .collect();
            args.extend(["-headers".to_string(), joined]);
        }

        if let Some(ref proxy) = self.proxy
            && self.input_url.starts_with("http")
        {
            args.extend(["-http_proxy".to_string(), proxy.clone()]);
        }

        args.extend(["-i".to_string(), self.input_url.clone()]);
        args.extend(["-map", "0", "-c", "copy"].map(String::from));
        args.extend(self.ffmpeg.output_args.iter().cloned());

        match self.segment_time_secs {
            Some(secs) => args.extend([
                "-f".to_string(),
                "segment".to_string(),
                "-segment_format".to_string(),
                self.container.muxer().to_string(),
                "-segment_time".to_string(),
                secs.to_string(),
                "-reset_timestamps".to_string(),
                "1".to_string(),
            ]),
            None => {
                args.extend(["-f".to_string(), self.container.muxer().to_string()]);
                if self.container == ContainerFormat::Mp4 {
                    args.extend(["-movflags".to_string(), "+frag_keyframe+empty_moov".to_string()]);
                }
            }
        }

        args.push(self.output_path().to_string_lossy().to_string());
        args
    }

    pub fn build(&self, owner_id: impl Into<String>) -> CaptureCommand {
        CaptureCommand {
            program: self.ffmpeg.binary.clone(),
            args: self.build_args(),
            working_dir: None,
            owner_id: owner_id.into(),
        }
    }
}

/// Directory for the current broadcast of `recording`:
/// `<save dir>/<platform>/<streamer>`.
pub fn broadcast_dir(recording: &Recording, default_save_dir: &Path) -> PathBuf {
    let root = recording
        .config
        .save_dir
        .clone()
        .unwrap_or_else(|| default_save_dir.to_path_buf());
    root.join(sanitize_filename(&recording.platform.name))
        .join(sanitize_filename(recording.display_name()))
}

/// Capture command for a live `recording` pulling `stream_url` into `dir`.
pub fn capture_command(
    ffmpeg: &FfmpegConfig,
    recording: &Recording,
    stream_url: &str,
    dir: &Path,
    proxy: Option<&str>,
    now: DateTime<Local>,
) -> CaptureCommand {
    let config = &recording.config;
    CommandBuilder::new(ffmpeg, stream_url)
        .platform_headers(recording.platform_key())
        .proxy(proxy)
        .container(config.container)
        .segment(config.segment_enabled.then_some(config.segment_time_secs))
        .output(dir, capture_file_stem(recording.display_name(), now))
        .build(recording.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RecordingConfig, RecordingUrl};
    use chrono::TimeZone;

    fn position(args: &[String], flag: &str) -> usize {
        args.iter().position(|a| a == flag).unwrap()
    }

    #[test]
    fn test_basic_args() {
        let ffmpeg = FfmpegConfig::default();
        let args = CommandBuilder::new(&ffmpeg, "https://cdn/live.flv")
            .output("/rec", "alice_1")
            .build_args();

        assert_eq!(args[position(&args, "-i") + 1], "https://cdn/live.flv");
        assert_eq!(args[position(&args, "-f") + 1], "mpegts");
        assert_eq!(args.last().unwrap(), "/rec/alice_1.ts");
        assert!(!args.contains(&"-headers".to_string()));
        assert!(position(&args, "-rw_timeout") < position(&args, "-i"));
    }

    #[test]
    fn test_headers_proxy_and_user_agent() {
        let ffmpeg = FfmpegConfig {
            user_agent: Some("UA/1.0".into()),
            ..Default::default()
        };
        let args = CommandBuilder::new(&ffmpeg, "https://cdn/live.flv")
            .platform_headers("bilibili")
            .proxy(Some("http://127.0.0.1:7890"))
            .build_args();

        let headers = &args[position(&args, "-headers") + 1];
        assert!(headers.contains("origin: https://live.bilibili.com\r\n"));
        assert!(headers.contains("referer: https://live.bilibili.com/\r\n"));
        assert_eq!(args[position(&args, "-http_proxy") + 1], "http://127.0.0.1:7890");
        assert_eq!(args[position(&args, "-user_agent") + 1], "UA/1.0");
        assert!(position(&args, "-headers") < position(&args, "-i"));
    }

    #[test]
    fn test_segmented_output() {
        let ffmpeg = FfmpegConfig::default();
        let builder = CommandBuilder::new(&ffmpeg, "https://cdn/live.flv")
            .container(ContainerFormat::Mkv)
            .segment(Some(600))
            .output("/rec", "alice");
        let args = builder.build_args();

        assert_eq!(args[position(&args, "-f") + 1], "segment");
        assert_eq!(args[position(&args, "-segment_format") + 1], "matroska");
        assert_eq!(args[position(&args, "-segment_time") + 1], "600");
        assert_eq!(args.last().unwrap(), "/rec/alice_%03d.mkv");
        assert_eq!(builder.output_path(), PathBuf::from("/rec/alice_%03d.mkv"));
    }

    #[test]
    fn test_zero_segment_time_means_single_file() {
        let ffmpeg = FfmpegConfig::default();
        let builder = CommandBuilder::new(&ffmpeg, "x").segment(Some(0));
        assert!(!builder.build_args().contains(&"segment".to_string()));
    }

    #[test]
    fn test_capture_command_for_recording() {
        let ffmpeg = FfmpegConfig::default();
        let mut recording = Recording::with_id(
            "rec-1",
            RecordingUrl::new("https://www.huya.com/660000").unwrap(),
            RecordingConfig::default(),
        )
        .unwrap();
        recording.runtime.anchor_name = Some("Alice".into());

        let dir = broadcast_dir(&recording, Path::new("/downloads"));
        assert_eq!(dir, PathBuf::from("/downloads/Huya/Alice"));

        let now = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let command = capture_command(&ffmpeg, &recording, "https://cdn/x.flv", &dir, None, now);
        assert_eq!(command.owner_id, "rec-1");
        assert_eq!(command.program, "ffmpeg");
        assert_eq!(
            command.output_path(),
            Some(PathBuf::from("/downloads/Huya/Alice/Alice_2024-01-02_03-04-05.ts"))
        );
        assert!(command.args.iter().any(|a| a.contains("referer: https://www.huya.com")));
    }
}
