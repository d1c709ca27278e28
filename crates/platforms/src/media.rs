use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// The room a resolver is asked about.
#[derive(Debug, Clone)]
pub struct StreamTarget {
    pub url: String,
    pub platform_key: String,
    /// Preferred quality label, see [`Quality`].
    pub quality: Quality,
}

impl StreamTarget {
    pub fn new(url: impl Into<String>, platform_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            platform_key: platform_key.into(),
            quality: Quality::default(),
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }
}

/// Session material forwarded to the platform (cookies, tokens).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub cookies: Option<String>,
    pub token: Option<String>,
}

impl Credentials {
    pub fn cookies(cookies: impl Into<String>) -> Self {
        Self {
            cookies: Some(cookies.into()),
            token: None,
        }
    }
}

/// Quality preference, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Quality {
    /// Original / source quality.
    #[default]
    Od,
    Uhd,
    Hd,
    Sd,
    Ld,
}

impl Quality {
    pub const ALL: [Quality; 5] = [Self::Od, Self::Uhd, Self::Hd, Self::Sd, Self::Ld];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Od => "OD",
            Self::Uhd => "UHD",
            Self::Hd => "HD",
            Self::Sd => "SD",
            Self::Ld => "LD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OD" | "ORIGIN" | "SOURCE" => Some(Self::Od),
            "UHD" => Some(Self::Uhd),
            "HD" => Some(Self::Hd),
            "SD" => Some(Self::Sd),
            "LD" => Some(Self::Ld),
            _ => None,
        }
    }

    fn rank(&self) -> usize {
        Self::ALL.iter().position(|q| q == self).unwrap_or(0)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live status and playable URLs of a room.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamInfo {
    pub anchor_name: String,
    pub title: String,
    pub is_live: bool,
    /// Available qualities, best first.
    pub quality_urls: Vec<(Quality, String)>,
    /// URL chosen for the requested quality, if live.
    pub playable_url: Option<String>,
    /// Cookies the platform handed back and that should replace the stored ones.
    pub refreshed_cookies: Option<String>,
    pub extras: Option<FxHashMap<String, String>>,
}

impl StreamInfo {
    pub fn offline(anchor_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            anchor_name: anchor_name.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Pick the URL for `quality`, falling back to the nearest worse quality
    /// and then to the best available one.
    pub fn select(&self, quality: Quality) -> Option<&str> {
        self.quality_urls
            .iter()
            .filter(|(q, _)| q.rank() >= quality.rank())
            .min_by_key(|(q, _)| q.rank())
            .or_else(|| self.quality_urls.first())
            .map(|(_, url)| url.as_str())
    }

    /// Fill `playable_url` from `quality_urls`.
    pub fn with_selected(mut self, quality: Quality) -> Self {
        if self.is_live {
            self.playable_url = self.select(quality).map(str::to_owned);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> StreamInfo {
        StreamInfo {
            is_live: true,
            quality_urls: vec![
                (Quality::Od, "od".into()),
                (Quality::Hd, "hd".into()),
                (Quality::Ld, "ld".into()),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_select_exact_and_fallback() {
        let info = info();
        assert_eq!(info.select(Quality::Od), Some("od"));
        assert_eq!(info.select(Quality::Hd), Some("hd"));
        // no UHD: nearest worse is HD
        assert_eq!(info.select(Quality::Uhd), Some("hd"));
        assert_eq!(info.select(Quality::Sd), Some("ld"));
    }

    #[test]
    fn test_select_falls_back_to_best() {
        let info = StreamInfo {
            quality_urls: vec![(Quality::Od, "od".into())],
            ..info()
        };
        assert_eq!(info.select(Quality::Ld), Some("od"));
        assert_eq!(StreamInfo::default().select(Quality::Od), None);
    }

    #[test]
    fn test_with_selected_only_when_live() {
        let live = info().with_selected(Quality::Hd);
        assert_eq!(live.playable_url.as_deref(), Some("hd"));

        let offline = StreamInfo {
            is_live: false,
            ..info()
        }
        .with_selected(Quality::Hd);
        assert_eq!(offline.playable_url, None);
    }

    #[test]
    fn test_quality_parse() {
        assert_eq!(Quality::parse("origin"), Some(Quality::Od));
        assert_eq!(Quality::parse(" hd "), Some(Quality::Hd));
        assert_eq!(Quality::parse("4k"), None);
    }
}
