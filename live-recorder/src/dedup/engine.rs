//! Duplicate detection for candidate room URLs.

use std::fmt;
use std::sync::Arc;

use platforms_resolver::{PlatformMatch, platform};
use serde::{Serialize, Serializer};
use tracing::{debug, trace};

use super::cache::BoundedCache;
use super::room_id::{extract_room_id, is_short_link};
use super::short_link::{AnchorNameLookup, ShortLinkResolver};
use crate::config::DedupConfig;
use crate::domain::Recording;

/// Why a candidate was considered a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateReason {
    None,
    UrlIdentical,
    SameStreamer,
    SameRoomId,
}

impl DuplicateReason {
    /// Stable reason code; empty when not a duplicate.
    pub fn code(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::UrlIdentical => "URL_IDENTICAL",
            Self::SameStreamer => "SAME_STREAMER",
            Self::SameRoomId => "SAME_ROOM_ID",
        }
    }
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for DuplicateReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// What the engine needs to know about an existing target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupTarget {
    pub url: String,
    pub streamer_name: Option<String>,
}

impl DedupTarget {
    pub fn new(url: impl Into<String>, streamer_name: Option<&str>) -> Self {
        Self {
            url: url.into(),
            streamer_name: streamer_name.map(str::to_owned),
        }
    }
}

impl From<&Recording> for DedupTarget {
    fn from(recording: &Recording) -> Self {
        let name = recording
            .config
            .streamer_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(recording.runtime.anchor_name.as_deref());
        Self::new(recording.url.as_str(), name)
    }
}

/// Decides whether a candidate URL is already covered by the target set.
///
/// Checks run cheapest first and stop at the first hit:
/// exact URL, then same streamer on the same platform, then same room id on
/// the same platform. Only the anchor lookup and short-link expansion touch
/// the network; platform identities and expanded short links are cached.
pub struct DedupEngine {
    platform_cache: BoundedCache<String, Option<PlatformMatch>>,
    short_link_cache: BoundedCache<String, Option<String>>,
    short_links: Arc<dyn ShortLinkResolver>,
    anchors: Arc<dyn AnchorNameLookup>,
}

impl DedupEngine {
    pub fn new(
        config: &DedupConfig,
        short_links: Arc<dyn ShortLinkResolver>,
        anchors: Arc<dyn AnchorNameLookup>,
    ) -> Self {
        Self {
            platform_cache: BoundedCache::new(config.platform_cache_capacity),
            short_link_cache: BoundedCache::new(config.short_link_cache_capacity),
            short_links,
            anchors,
        }
    }

    pub async fn is_duplicate(
        &self,
        candidate_url: &str,
        candidate_streamer_name: Option<&str>,
        existing: &[DedupTarget],
    ) -> (bool, DuplicateReason) {
        let candidate = candidate_url.trim();
        if candidate.is_empty() {
            return (false, DuplicateReason::None);
        }

        if existing.iter().any(|t| t.url == candidate) {
            return (true, DuplicateReason::UrlIdentical);
        }

        let Some(platform) = self.platform_of(candidate) else {
            trace!(url = candidate, "candidate platform unknown");
            return (false, DuplicateReason::None);
        };

        let same_platform: Vec<&DedupTarget> = existing
            .iter()
            .filter(|t| self.platform_of(&t.url).is_some_and(|p| p.key == platform.key))
            .collect();
        if same_platform.is_empty() {
            return (false, DuplicateReason::None);
        }

        if same_platform.iter().any(|t| t.streamer_name.is_some()) {
            let name = match candidate_streamer_name.map(str::trim).filter(|n| !n.is_empty()) {
                Some(name) => Some(name.to_owned()),
                None => self.anchors.anchor_name(candidate, &platform.key).await,
            };
            if let Some(name) = name
                && same_platform
                    .iter()
                    .any(|t| t.streamer_name.as_deref() == Some(name.as_str()))
            {
                debug!(url = candidate, streamer = %name, "duplicate streamer");
                return (true, DuplicateReason::SameStreamer);
            }
        }

        let Some(room_id) = self.room_id_of(candidate, &platform.key).await else {
            return (false, DuplicateReason::None);
        };
        for target in same_platform {
            if self.room_id_of(&target.url, &platform.key).await.as_deref() == Some(room_id.as_str()) {
                debug!(url = candidate, room_id = %room_id, "duplicate room");
                return (true, DuplicateReason::SameRoomId);
            }
        }

        (false, DuplicateReason::None)
    }

    /// Cached platform identity of `url`.
    pub fn platform_of(&self, url: &str) -> Option<PlatformMatch> {
        let key = url.to_owned();
        if let Some(cached) = self.platform_cache.get(&key) {
            return cached;
        }
        let identified = platform::identify(url);
        self.platform_cache.insert(key, identified.clone());
        identified
    }

    /// Room id of `url`, expanding short links once.
    pub async fn room_id_of(&self, url: &str, platform_key: &str) -> Option<String> {
        if !is_short_link(url) {
            return extract_room_id(platform_key, url);
        }

        let key = url.to_owned();
        if let Some(cached) = self.short_link_cache.get(&key) {
            return cached;
        }

        let room_id = match self.short_links.expand(url).await {
            Some(expanded) if !is_short_link(&expanded) => {
                let key = self
                    .platform_of(&expanded)
                    .map(|p| p.key)
                    .unwrap_or_else(|| platform_key.to_owned());
                extract_room_id(&key, &expanded)
            }
            _ => None,
        };
        self.short_link_cache.insert(key, room_id.clone());
        room_id
    }

    pub fn cached_platforms(&self) -> usize {
        self.platform_cache.len()
    }

    pub fn cached_short_links(&self) -> usize {
        self.short_link_cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::NoAnchorLookup;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingShortLinks {
        target: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ShortLinkResolver for CountingShortLinks {
        async fn expand(&self, _url: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.target.clone()
        }
    }

    fn engine_with(short_links: Arc<dyn ShortLinkResolver>) -> DedupEngine {
        DedupEngine::new(&DedupConfig::default(), short_links, Arc::new(NoAnchorLookup))
    }

    fn engine() -> DedupEngine {
        engine_with(Arc::new(CountingShortLinks {
            target: None,
            calls: AtomicUsize::new(0),
        }))
    }

    #[tokio::test]
    async fn test_empty_candidate() {
        let existing = vec![DedupTarget::new("https://www.huya.com/1", None)];
        assert_eq!(
            engine().is_duplicate("  ", None, &existing).await,
            (false, DuplicateReason::None)
        );
    }

    #[tokio::test]
    async fn test_identical_url_wins_over_other_matches() {
        let existing = vec![DedupTarget::new("https://www.huya.com/1", Some("Alice"))];
        let result = engine()
            .is_duplicate("https://www.huya.com/1", Some("Alice"), &existing)
            .await;
        assert_eq!(result, (true, DuplicateReason::UrlIdentical));
    }

    #[tokio::test]
    async fn test_same_streamer_before_room_id() {
        let existing = vec![DedupTarget::new("https://www.huya.com/1", Some("Alice"))];
        // same room id too, but the streamer check comes first
        let result = engine()
            .is_duplicate("https://www.huya.com/1?from=share", Some("Alice"), &existing)
            .await;
        assert_eq!(result, (true, DuplicateReason::SameStreamer));
    }

    #[tokio::test]
    async fn test_streamer_name_is_case_sensitive_and_platform_scoped() {
        let existing = vec![
            DedupTarget::new("https://www.huya.com/1", Some("Alice")),
            DedupTarget::new("https://www.twitch.tv/bob", Some("Bob")),
        ];
        let engine = engine();
        assert_eq!(
            engine
                .is_duplicate("https://www.huya.com/2", Some("alice"), &existing)
                .await,
            (false, DuplicateReason::None)
        );
        assert_eq!(
            engine
                .is_duplicate("https://www.huya.com/3", Some("Bob"), &existing)
                .await,
            (false, DuplicateReason::None)
        );
    }

    #[tokio::test]
    async fn test_room_id_across_url_shapes() {
        let existing = vec![DedupTarget::new("https://www.douyu.com/9999", None)];
        let result = engine()
            .is_duplicate("https://www.douyu.com/topic/s13?rid=9999", None, &existing)
            .await;
        assert_eq!(result, (true, DuplicateReason::SameRoomId));
    }

    #[tokio::test]
    async fn test_short_link_expanded_once_and_cached() {
        let short_links = Arc::new(CountingShortLinks {
            target: Some("https://live.douyin.com/777".to_string()),
            calls: AtomicUsize::new(0),
        });
        let engine = engine_with(short_links.clone());
        let existing = vec![DedupTarget::new("https://live.douyin.com/777", None)];

        for _ in 0..3 {
            let result = engine
                .is_duplicate("https://v.douyin.com/abcd/", None, &existing)
                .await;
            assert_eq!(result, (true, DuplicateReason::SameRoomId));
        }
        assert_eq!(short_links.calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.cached_short_links(), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_short_link_is_cached_as_none() {
        let short_links = Arc::new(CountingShortLinks {
            target: None,
            calls: AtomicUsize::new(0),
        });
        let engine = engine_with(short_links.clone());
        let existing = vec![DedupTarget::new("https://live.douyin.com/777", None)];

        for _ in 0..2 {
            let result = engine
                .is_duplicate("https://v.douyin.com/dead/", None, &existing)
                .await;
            assert_eq!(result, (false, DuplicateReason::None));
        }
        assert_eq!(short_links.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_example_scenario() {
        let engine = engine();
        let mut existing = Vec::new();

        let first = "https://live.example.com/123456";
        assert_eq!(
            engine.is_duplicate(first, None, &existing).await,
            (false, DuplicateReason::None)
        );
        existing.push(DedupTarget::new(first, None));

        let (dup, reason) = engine
            .is_duplicate("https://live.example.com/123456?x=1", None, &existing)
            .await;
        assert!(dup);
        assert_eq!(reason.code(), "SAME_ROOM_ID");

        existing.push(DedupTarget::new("https://live.example.com/777", Some("Alice")));
        let (dup, reason) = engine
            .is_duplicate("https://live.example.com/888", Some("Alice"), &existing)
            .await;
        assert!(dup);
        assert_eq!(reason.code(), "SAME_STREAMER");
        assert!(engine.cached_platforms() >= 3);
    }

    #[test]
    fn test_reason_codes() {
        assert_eq!(DuplicateReason::None.code(), "");
        assert_eq!(
            serde_json::to_string(&DuplicateReason::SameRoomId).unwrap(),
            "\"SAME_ROOM_ID\""
        );
    }
}
