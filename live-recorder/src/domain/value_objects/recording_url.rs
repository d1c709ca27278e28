//! Recording URL value object.

use platforms_resolver::{PlatformMatch, platform};
use serde::{Deserialize, Serialize};

use crate::Error;

/// A validated room URL.
///
/// The host is lowercased and trailing slashes are dropped; the path and
/// query are kept verbatim because room identifiers can be case sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordingUrl(String);

impl RecordingUrl {
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        let url = url.into();
        let url = url.trim();
        Self::validate(url)?;
        Ok(Self(Self::normalize(url)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Platform identity, falling back to the host for unknown sites.
    pub fn platform(&self) -> Option<PlatformMatch> {
        platform::identify(&self.0)
    }

    fn validate(url: &str) -> Result<(), Error> {
        if url.is_empty() {
            return Err(Error::validation("URL cannot be empty"));
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::validation("URL must start with http:// or https://"));
        }

        if url.contains(char::is_whitespace) {
            return Err(Error::validation("URL cannot contain whitespace"));
        }

        match url::Url::parse(url) {
            Ok(parsed) if parsed.host_str().is_some_and(|h| !h.is_empty()) => Ok(()),
            _ => Err(Error::validation(format!("URL has no host: {url}"))),
        }
    }

    /// Lowercase the scheme and host, strip trailing slashes.
    fn normalize(url: &str) -> String {
        let url = url.trim_end_matches('/');

        if let Some(pos) = url.find("://") {
            let (scheme, rest) = url.split_at(pos + 3);
            match rest.find(['/', '?', '#']) {
                Some(path_start) => {
                    let (domain, path) = rest.split_at(path_start);
                    format!("{}{}{}", scheme.to_lowercase(), domain.to_lowercase(), path)
                }
                None => format!("{}{}", scheme.to_lowercase(), rest.to_lowercase()),
            }
        } else {
            url.to_string()
        }
    }
}

impl std::fmt::Display for RecordingUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RecordingUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<RecordingUrl> for String {
    fn from(url: RecordingUrl) -> Self {
        url.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let url = RecordingUrl::new("  https://WWW.TWITCH.TV/Streamer123/ ").unwrap();
        assert_eq!(url.as_str(), "https://www.twitch.tv/Streamer123");

        let query = RecordingUrl::new("https://Live.Example.com?Room=AbC").unwrap();
        assert_eq!(query.as_str(), "https://live.example.com?Room=AbC");
    }

    #[test]
    fn test_invalid_urls() {
        assert!(RecordingUrl::new("").is_err());
        assert!(RecordingUrl::new("www.twitch.tv/streamer").is_err());
        assert!(RecordingUrl::new("https://twitch.tv/a b").is_err());
        assert!(RecordingUrl::new("https://").is_err());
    }

    #[test]
    fn test_platform() {
        let huya = RecordingUrl::new("https://www.huya.com/123456").unwrap();
        assert_eq!(huya.platform().map(|p| p.key), Some("huya".to_string()));

        let unknown = RecordingUrl::new("https://live.example.com/123456").unwrap();
        let platform = unknown.platform().unwrap();
        assert_eq!(platform.key, "example");
        assert_eq!(platform.name, "live.example.com");
    }

    #[test]
    fn test_serialization() {
        let url = RecordingUrl::new("https://www.twitch.tv/streamer").unwrap();
        let json = serde_json::to_string(&url).unwrap();
        assert_eq!(json, "\"https://www.twitch.tv/streamer\"");
        let parsed: RecordingUrl = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, url);
    }
}
