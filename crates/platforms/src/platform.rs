//! Static platform identification table.
//!
//! Identification is a pure pattern match over the room URL; it never
//! touches the network and is safe to cache.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::host_of;

/// A streaming platform the resolver knows how to identify.
#[derive(Debug)]
pub struct Platform {
    /// Stable short identifier, e.g. `"huya"`.
    pub key: &'static str,
    /// Human readable name, e.g. `"Huya"`.
    pub name: &'static str,
    regex: &'static LazyLock<Regex>,
}

impl Platform {
    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }
}

/// Result of identifying a URL: `(platform name, platform key)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformMatch {
    pub name: String,
    pub key: String,
}

impl PlatformMatch {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }

    /// Generic identification for hosts missing from the table.
    ///
    /// The key is the registrable label of the host
    /// (`live.example.com` → `example`), the name is the full host.
    pub fn from_host(url: &str) -> Option<Self> {
        let host = host_of(url)?;
        let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
        let key = match labels.len() {
            0 => return None,
            1 => labels[0],
            n => labels[n - 2],
        };
        Some(Self::new(host.clone(), key))
    }
}

macro_rules! url_regex {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($pattern).unwrap());
    };
}

url_regex!(TWITCH, r"^https?://(?:www\.|m\.)?twitch\.tv/([^/?#]+)");
url_regex!(HUYA, r"^https?://(?:www\.|m\.)?huya\.com/([^/?#]+)");
url_regex!(BILIBILI, r"^https?://(?:live\.bilibili\.com|b23\.tv)/([^/?#]+)");
url_regex!(DOUYIN, r"^https?://(?:live\.douyin\.com|v\.douyin\.com|(?:www\.)?douyin\.com)/([a-zA-Z0-9_-]+)");
url_regex!(DOUYU, r"^https?://(?:www\.)?douyu\.com/");
url_regex!(KUAISHOU, r"^https?://(?:live\.kuaishou\.com|v\.kuaishou\.com)/");
url_regex!(TIKTOK, r"^https?://(?:www\.|vm\.)?tiktok\.com/");
url_regex!(YOUTUBE, r"^https?://(?:www\.|m\.)?(?:youtube\.com|youtu\.be)/");
url_regex!(KICK, r"^https?://(?:www\.)?kick\.com/([^/?#]+)");
url_regex!(ACFUN, r"^https?://live\.acfun\.cn/live/(\d+)");
url_regex!(WEIBO, r"^https?://(?:www\.)?weibo\.com/l/wblive/");
url_regex!(REDBOOK, r"^https?://(?:www\.xiaohongshu\.com|xhslink\.com)/");
url_regex!(TWITCASTING, r"^https?://(?:www\.)?twitcasting\.tv/([^/?#]+)");
url_regex!(PICARTO, r"^https?://(?:www\.)?picarto\.tv/([^/?#]+)");
url_regex!(PANDATV, r"^https?://(?:www\.)?pandalive\.co\.kr/");
url_regex!(SOOP, r"^https?://play\.sooplive\.co\.kr/([^/?#]+)");
url_regex!(BIGO, r"^https?://(?:www\.)?bigo\.tv/");
url_regex!(CHZZK, r"^https?://chzzk\.naver\.com/live/([^/?#]+)");
url_regex!(SHOWROOM, r"^https?://(?:www\.)?showroom-live\.com/");
url_regex!(YY, r"^https?://(?:www\.)?yy\.com/");

macro_rules! platform_table {
    ( $( $key:literal, $name:literal => $regex:ident ),+ $(,)? ) => {
        &[
            $(
                Platform {
                    key: $key,
                    name: $name,
                    regex: &$regex,
                },
            )+
        ]
    };
}

static PLATFORMS: &[Platform] = platform_table![
    "twitch", "Twitch" => TWITCH,
    "huya", "Huya" => HUYA,
    "bilibili", "Bilibili" => BILIBILI,
    "douyin", "Douyin" => DOUYIN,
    "douyu", "Douyu" => DOUYU,
    "kuaishou", "Kuaishou" => KUAISHOU,
    "tiktok", "TikTok" => TIKTOK,
    "youtube", "YouTube" => YOUTUBE,
    "kick", "Kick" => KICK,
    "acfun", "Acfun" => ACFUN,
    "weibo", "Weibo" => WEIBO,
    "redbook", "RedBook" => REDBOOK,
    "twitcasting", "Twitcasting" => TWITCASTING,
    "picarto", "Picarto" => PICARTO,
    "pandatv", "PandaTV" => PANDATV,
    "soop", "SOOP" => SOOP,
    "bigo", "Bigo" => BIGO,
    "chzzk", "Chzzk" => CHZZK,
    "showroom", "Showroom" => SHOWROOM,
    "yy", "YY" => YY,
];

/// Look up a platform by key.
pub fn platform_by_key(key: &str) -> Option<&'static Platform> {
    PLATFORMS.iter().find(|p| p.key == key)
}

/// Identify the platform of `url`.
///
/// Returns `None` for URLs no entry of the table recognises.
pub fn resolve(url: &str) -> Option<PlatformMatch> {
    let url = url.trim();
    PLATFORMS
        .iter()
        .find(|p| p.matches(url))
        .map(|p| PlatformMatch::new(p.name, p.key))
}

/// Like [`resolve`], falling back to a host-derived identity.
pub fn identify(url: &str) -> Option<PlatformMatch> {
    resolve(url).or_else(|| PlatformMatch::from_host(url))
}

pub(crate) fn room_capture(key: &str) -> Option<&'static Regex> {
    match key {
        "twitch" => Some(&TWITCH),
        "huya" => Some(&HUYA),
        "bilibili" => Some(&BILIBILI),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_platforms() {
        let cases = [
            ("https://www.twitch.tv/streamer", "twitch"),
            ("https://www.huya.com/123456", "huya"),
            ("https://live.bilibili.com/21452505", "bilibili"),
            ("https://b23.tv/abcdEF", "bilibili"),
            ("https://live.douyin.com/745964462470", "douyin"),
            ("https://v.douyin.com/iRNBho6u/", "douyin"),
            ("https://www.douyin.com/745964462470", "douyin"),
            ("https://www.tiktok.com/@someone/live", "tiktok"),
            ("https://live.kuaishou.com/u/3xv78fxycm35nn4", "kuaishou"),
        ];

        for (url, key) in cases {
            let m = resolve(url).unwrap_or_else(|| panic!("{url} not identified"));
            assert_eq!(m.key, key, "{url}");
        }
    }

    #[test]
    fn test_resolve_unknown() {
        assert_eq!(resolve("https://live.example.com/123456"), None);
        assert_eq!(resolve(""), None);
        assert_eq!(resolve("not a url"), None);
    }

    #[test]
    fn test_identify_falls_back_to_host() {
        let m = identify("https://live.example.com/123456").unwrap();
        assert_eq!(m.key, "example");
        assert_eq!(m.name, "live.example.com");

        let m = identify("https://www.huya.com/1").unwrap();
        assert_eq!(m, PlatformMatch::new("Huya", "huya"));

        assert_eq!(identify("garbage"), None);
    }

    #[test]
    fn test_platform_keys_are_unique() {
        let mut keys: Vec<_> = PLATFORMS.iter().map(|p| p.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), PLATFORMS.len());
        assert!(platform_by_key("huya").is_some());
        assert!(platform_by_key("nope").is_none());
    }
}
