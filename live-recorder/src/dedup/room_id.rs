//! Textual room-id extraction, one rule per platform.

use url::Url;

/// How to pull the room identifier out of a URL.
#[derive(Debug, Clone, Copy)]
pub enum RoomIdRule {
    /// The n-th non-empty path segment.
    PathSegment(usize),
    /// The last non-empty path segment.
    LastPathSegment,
    /// A query parameter.
    QueryParam(&'static str),
    /// Last path segment, split on `delimiter`, taking the final part.
    DelimiterSplit(char),
    Custom(fn(&Url) -> Option<String>),
}

/// Link-shortener hosts whose room id is only known after following the
/// redirect.
pub const SHORT_LINK_HOSTS: &[&str] = &[
    "v.douyin.com",
    "b23.tv",
    "v.kuaishou.com",
    "vm.tiktok.com",
    "xhslink.com",
    "t.cn",
];

static RULES: &[(&str, RoomIdRule)] = &[
    ("twitch", RoomIdRule::PathSegment(0)),
    ("huya", RoomIdRule::PathSegment(0)),
    ("bilibili", RoomIdRule::PathSegment(0)),
    ("douyin", RoomIdRule::LastPathSegment),
    ("douyu", RoomIdRule::Custom(douyu_room)),
    ("kuaishou", RoomIdRule::PathSegment(1)),
    ("acfun", RoomIdRule::PathSegment(1)),
    ("chzzk", RoomIdRule::PathSegment(1)),
    ("soop", RoomIdRule::PathSegment(0)),
    ("kick", RoomIdRule::PathSegment(0)),
    ("twitcasting", RoomIdRule::PathSegment(0)),
    ("picarto", RoomIdRule::PathSegment(0)),
    ("weibo", RoomIdRule::DelimiterSplit(':')),
    ("bigo", RoomIdRule::LastPathSegment),
    ("redbook", RoomIdRule::QueryParam("host_id")),
    ("youtube", RoomIdRule::Custom(youtube_room)),
    ("tiktok", RoomIdRule::Custom(tiktok_room)),
];

fn rule_for(platform_key: &str) -> RoomIdRule {
    RULES
        .iter()
        .find(|(key, _)| *key == platform_key)
        .map(|(_, rule)| *rule)
        .unwrap_or(RoomIdRule::LastPathSegment)
}

/// Whether `url` points at a link shortener.
pub fn is_short_link(url: &str) -> bool {
    platforms_resolver::utils::host_of(url)
        .is_some_and(|host| SHORT_LINK_HOSTS.contains(&host.as_str()))
}

/// Extract the room id of `url` using the rule for `platform_key`.
///
/// Returns `None` for empty or unparsable URLs, bare domains and URLs the
/// rule finds nothing in. Short links are not expanded here.
pub fn extract_room_id(platform_key: &str, url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    parsed.host_str()?;

    let id = match rule_for(platform_key) {
        RoomIdRule::PathSegment(n) => segments(&parsed).nth(n).map(str::to_owned),
        RoomIdRule::LastPathSegment => segments(&parsed).last().map(str::to_owned),
        RoomIdRule::QueryParam(name) => query_param(&parsed, name),
        RoomIdRule::DelimiterSplit(delimiter) => segments(&parsed)
            .last()
            .and_then(|s| s.rsplit(delimiter).next())
            .map(str::to_owned),
        RoomIdRule::Custom(extract) => extract(&parsed),
    };

    id.filter(|id| !id.is_empty())
}

fn segments(url: &Url) -> impl Iterator<Item = &str> {
    url.path_segments()
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// `douyu.com/topic/xyz?rid=123` or `douyu.com/123`.
fn douyu_room(url: &Url) -> Option<String> {
    query_param(url, "rid").or_else(|| segments(url).last().map(str::to_owned))
}

/// `watch?v=<id>`, `/live/<id>`, `/@handle/live`, `/channel/<id>/live`.
fn youtube_room(url: &Url) -> Option<String> {
    if let Some(v) = query_param(url, "v") {
        return Some(v);
    }
    let parts: Vec<&str> = segments(url).collect();
    match parts.as_slice() {
        ["live", id, ..] => Some((*id).to_owned()),
        ["channel", id, ..] => Some((*id).to_owned()),
        [handle, ..] if handle.starts_with('@') => Some((*handle).to_owned()),
        [id] if url.host_str() == Some("youtu.be") => Some((*id).to_owned()),
        _ => None,
    }
}

/// `tiktok.com/@user/live` -> `user`.
fn tiktok_room(url: &Url) -> Option<String> {
    segments(url)
        .find_map(|s| s.strip_prefix('@'))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rule_takes_last_segment() {
        assert_eq!(
            extract_room_id("example", "https://live.example.com/123456?x=1"),
            Some("123456".to_string())
        );
        assert_eq!(
            extract_room_id("example", "https://live.example.com/a/b/123456/"),
            Some("123456".to_string())
        );
    }

    #[test]
    fn test_bare_domain_and_malformed() {
        assert_eq!(extract_room_id("example", "https://live.example.com"), None);
        assert_eq!(extract_room_id("example", "https://live.example.com/"), None);
        assert_eq!(extract_room_id("example", ""), None);
        assert_eq!(extract_room_id("example", "not a url"), None);
    }

    #[test]
    fn test_platform_rules() {
        assert_eq!(
            extract_room_id("huya", "https://www.huya.com/660000"),
            Some("660000".into())
        );
        assert_eq!(
            extract_room_id("kuaishou", "https://live.kuaishou.com/u/3xabc"),
            Some("3xabc".into())
        );
        assert_eq!(
            extract_room_id("douyu", "https://www.douyu.com/topic/s13?rid=9999"),
            Some("9999".into())
        );
        assert_eq!(
            extract_room_id("weibo", "https://weibo.com/l/wblive/p/show/1022:2321325026370190442592"),
            Some("2321325026370190442592".into())
        );
        assert_eq!(
            extract_room_id("youtube", "https://www.youtube.com/watch?v=abcDEF"),
            Some("abcDEF".into())
        );
        assert_eq!(
            extract_room_id("youtube", "https://www.youtube.com/@someone/live"),
            Some("@someone".into())
        );
        assert_eq!(
            extract_room_id("tiktok", "https://www.tiktok.com/@user/live"),
            Some("user".into())
        );
        assert_eq!(
            extract_room_id("redbook", "https://www.xiaohongshu.com/livestream/1?host_id=77"),
            Some("77".into())
        );
    }

    #[test]
    fn test_short_link_hosts() {
        assert!(is_short_link("https://v.douyin.com/iRNBho6u/"));
        assert!(is_short_link("https://b23.tv/abc"));
        assert!(!is_short_link("https://live.douyin.com/123"));
        assert!(!is_short_link("garbage"));
    }
}
