use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;

use crate::error::ResolverError;
use crate::extractor::Extractor;
use crate::media::{Credentials, Quality, StreamInfo, StreamTarget};
use crate::resolver::PlatformResolver;
use crate::utils::capture_group_1;

static ROOM_DATA_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var TT_ROOM_DATA = (.*?);").unwrap());
static PROFILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var TT_PROFILE_INFO = (.*?);").unwrap());
static STREAM_DATA_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"stream: (\{.+)\n.*?};").unwrap());

/// Huya resolver scraping the room page.
pub struct Huya;

const HUYA_URL: &str = "https://www.huya.com";

#[derive(Debug, PartialEq)]
struct RoomState {
    anchor_name: String,
    title: String,
    is_live: bool,
}

impl Huya {
    fn parse_room(page: &str) -> Result<RoomState, ResolverError> {
        if page.contains("找不到这个主播") {
            return Err(ResolverError::StreamerNotFound);
        }
        if page.contains("该主播涉嫌违规，正在整改中") {
            return Err(ResolverError::StreamerBanned);
        }

        let room_data = capture_group_1(&ROOM_DATA_REGEX, page)
            .ok_or_else(|| ResolverError::Other("Failed to extract room data".to_string()))?;
        let room: Value = serde_json::from_str(room_data)?;

        let title = room
            .get("introduction")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let state = room.get("state").and_then(Value::as_str).unwrap_or_default();

        let anchor_name = capture_group_1(&PROFILE_REGEX, page)
            .and_then(|p| serde_json::from_str::<Value>(p).ok())
            .and_then(|p| p.get("nick").and_then(Value::as_str).map(str::to_owned))
            .unwrap_or_default();

        // replays are flagged in the title and report ON as well
        let is_live = state == "ON" && !title.contains("【回放】");

        Ok(RoomState {
            anchor_name,
            title,
            is_live,
        })
    }

    fn parse_streams(page: &str) -> Result<Vec<(Quality, String)>, ResolverError> {
        let stream_json = capture_group_1(&STREAM_DATA_REGEX, page)
            .ok_or(ResolverError::ValidationError("no stream data on page".into()))?;
        let stream: Value = serde_json::from_str(stream_json)?;

        let info = stream["data"][0]["gameStreamInfoList"]
            .as_array()
            .and_then(|list| {
                list.iter()
                    .max_by_key(|s| s["iWebPriorityRate"].as_i64().unwrap_or(0))
            })
            .ok_or(ResolverError::ValidationError("empty stream list".into()))?;

        let field = |name: &str| info[name].as_str().unwrap_or_default();
        let base = format!(
            "{}/{}.{}?{}",
            field("sFlvUrl"),
            field("sStreamName"),
            field("sFlvUrlSuffix"),
            field("sFlvAntiCode").replace("&amp;", "&"),
        );

        let mut bitrates: Vec<i64> = stream["vMultiStreamInfo"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|b| b["iBitRate"].as_i64())
                    .filter(|b| *b > 0)
                    .collect()
            })
            .unwrap_or_default();
        bitrates.sort_unstable_by(|a, b| b.cmp(a));

        let mut urls = vec![(Quality::Od, base.clone())];
        for (quality, bitrate) in Quality::ALL.iter().skip(1).zip(bitrates) {
            urls.push((*quality, format!("{base}&ratio={bitrate}")));
        }
        Ok(urls)
    }
}

#[async_trait]
impl PlatformResolver for Huya {
    fn platform_key(&self) -> &'static str {
        "huya"
    }

    async fn fetch_stream_info(
        &self,
        client: &Client,
        target: &StreamTarget,
        credentials: Option<&Credentials>,
    ) -> Result<StreamInfo, ResolverError> {
        let mut extractor = Extractor::new("Huya", target.url.clone(), client.clone());
        extractor.set_origin_and_referer_static(HUYA_URL);
        if let Some(cookies) = credentials.and_then(|c| c.cookies.as_deref()) {
            extractor.set_cookies_from_string(cookies);
        }

        let response = extractor.send(extractor.get(&extractor.url)).await?;
        let cookies_changed = extractor.parse_and_store_cookies(response.headers());
        let page = response.text().await?;

        let room = Self::parse_room(&page)?;
        let mut info = StreamInfo::offline(room.anchor_name, room.title);
        if cookies_changed {
            info.refreshed_cookies = extractor.cookie_string();
        }
        if room.is_live {
            info.is_live = true;
            info.quality_urls = Self::parse_streams(&page)?;
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = concat!(
        "var TT_ROOM_DATA = {\"state\":\"ON\",\"introduction\":\"night session\"};\n",
        "var TT_PROFILE_INFO = {\"nick\":\"Alice\"};\n",
        "stream: {\"data\":[{\"gameStreamInfoList\":[",
        "{\"sFlvUrl\":\"https://a.flv.huya.com/src\",\"sStreamName\":\"s1\",\"sFlvUrlSuffix\":\"flv\",\"sFlvAntiCode\":\"wsSecret=x&amp;t=1\",\"iWebPriorityRate\":1},",
        "{\"sFlvUrl\":\"https://b.flv.huya.com/src\",\"sStreamName\":\"s1\",\"sFlvUrlSuffix\":\"flv\",\"sFlvAntiCode\":\"wsSecret=y\",\"iWebPriorityRate\":5}",
        "]}],\"vMultiStreamInfo\":[{\"iBitRate\":0},{\"iBitRate\":2000},{\"iBitRate\":4000}]}\n",
        "};",
    );

    #[test]
    fn test_parse_room_live() {
        let room = Huya::parse_room(PAGE).unwrap();
        assert_eq!(
            room,
            RoomState {
                anchor_name: "Alice".into(),
                title: "night session".into(),
                is_live: true,
            }
        );
    }

    #[test]
    fn test_parse_room_replay_is_offline() {
        let page = "var TT_ROOM_DATA = {\"state\":\"ON\",\"introduction\":\"【回放】old\"};";
        assert!(!Huya::parse_room(page).unwrap().is_live);
    }

    #[test]
    fn test_parse_room_errors() {
        assert!(matches!(
            Huya::parse_room("找不到这个主播"),
            Err(ResolverError::StreamerNotFound)
        ));
        assert!(matches!(
            Huya::parse_room("<html></html>"),
            Err(ResolverError::Other(_))
        ));
    }

    #[test]
    fn test_parse_streams_prefers_priority_cdn() {
        let urls = Huya::parse_streams(PAGE).unwrap();
        assert_eq!(urls[0].0, Quality::Od);
        assert_eq!(urls[0].1, "https://b.flv.huya.com/src/s1.flv?wsSecret=y");
        assert_eq!(urls[1], (Quality::Uhd, format!("{}&ratio=4000", urls[0].1)));
        assert_eq!(urls[2].0, Quality::Hd);
        assert_eq!(urls.len(), 3);
    }
}
