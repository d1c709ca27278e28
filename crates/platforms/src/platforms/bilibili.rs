use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ResolverError;
use crate::extractor::Extractor;
use crate::media::{Credentials, Quality, StreamInfo, StreamTarget};
use crate::platform::room_capture;
use crate::resolver::PlatformResolver;
use crate::utils::{capture_group_1, capture_group_1_or_invalid_url};

const BASE_URL: &str = "https://live.bilibili.com";
const ROOM_INFO_URL: &str = "https://api.live.bilibili.com/room/v1/Room/get_info";
const ANCHOR_URL: &str = "https://api.live.bilibili.com/live_user/v1/UserInfo/get_anchor_in_room";
const PLAY_INFO_URL: &str = "https://api.live.bilibili.com/xlive/web-room/v2/index/getRoomPlayInfo";

static PAGE_TITLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<title>(.*?) - (?:.*?) - 哔哩哔哩直播").unwrap());

/// Bilibili live resolver.
///
/// The room API occasionally returns an empty title; the room page is then
/// scraped for it within `title_fallback_timeout`, degrading to an empty
/// title instead of failing.
pub struct Bilibili {
    title_fallback_timeout: Duration,
}

impl Default for Bilibili {
    fn default() -> Self {
        Self {
            title_fallback_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct RoomInfo {
    room_id: u64,
    live_status: u8,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct AnchorInfo {
    info: AnchorProfile,
}

#[derive(Debug, Deserialize)]
struct AnchorProfile {
    uname: String,
}

#[derive(Debug, Deserialize)]
struct PlayInfo {
    playurl_info: Option<PlayUrlInfo>,
}

#[derive(Debug, Deserialize)]
struct PlayUrlInfo {
    playurl: PlayUrl,
}

#[derive(Debug, Deserialize)]
struct PlayUrl {
    stream: Vec<PlayStream>,
}

#[derive(Debug, Deserialize)]
struct PlayStream {
    protocol_name: String,
    format: Vec<PlayFormat>,
}

#[derive(Debug, Deserialize)]
struct PlayFormat {
    format_name: String,
    codec: Vec<PlayCodec>,
}

#[derive(Debug, Deserialize)]
struct PlayCodec {
    codec_name: String,
    base_url: String,
    current_qn: u32,
    url_info: Vec<UrlInfo>,
}

#[derive(Debug, Deserialize)]
struct UrlInfo {
    host: String,
    extra: String,
}

fn quality_qn(quality: Quality) -> u32 {
    match quality {
        Quality::Od => 10000,
        Quality::Uhd => 400,
        Quality::Hd => 250,
        Quality::Sd => 150,
        Quality::Ld => 80,
    }
}

fn unwrap_api<T>(response: ApiResponse<T>) -> Result<T, ResolverError> {
    match (response.code, response.data) {
        (0, Some(data)) => Ok(data),
        (1, _) | (60004, _) => Err(ResolverError::StreamerNotFound),
        (code, _) => Err(ResolverError::ValidationError(format!(
            "bilibili api code {code}: {}",
            response.message
        ))),
    }
}

impl Bilibili {
    async fn get_json<T: for<'de> Deserialize<'de>>(
        extractor: &Extractor,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ResolverError> {
        let response = extractor.send(extractor.get(url).query(query)).await?;
        let body = response.text().await?;
        let parsed: ApiResponse<T> = serde_json::from_str(&body)?;
        unwrap_api(parsed)
    }

    fn pick_url(play: PlayInfo) -> Option<(u32, String)> {
        let playurl = play.playurl_info?.playurl;
        // prefer http-flv, then hls fmp4/ts
        let mut candidates: Vec<(u8, u32, String)> = Vec::new();
        for stream in playurl.stream {
            for format in stream.format {
                let rank = match (stream.protocol_name.as_str(), format.format_name.as_str()) {
                    ("http_stream", "flv") => 0,
                    ("http_hls", "fmp4") => 1,
                    ("http_hls", "ts") => 2,
                    _ => 3,
                };
                for codec in format.codec.into_iter().filter(|c| c.codec_name == "avc") {
                    if let Some(info) = codec.url_info.first() {
                        let url = format!("{}{}{}", info.host, codec.base_url, info.extra);
                        candidates.push((rank, codec.current_qn, url));
                    }
                }
            }
        }
        candidates.sort_by_key(|(rank, ..)| *rank);
        candidates.into_iter().next().map(|(_, qn, url)| (qn, url))
    }

    fn quality_for_qn(qn: u32) -> Quality {
        Quality::ALL
            .into_iter()
            .find(|q| quality_qn(*q) <= qn)
            .unwrap_or(Quality::Ld)
    }

    async fn scrape_title(&self, extractor: &Extractor, room_id: u64) -> String {
        let page_url = format!("{BASE_URL}/{room_id}");
        let fetch = async {
            let response = extractor.send(extractor.get(&page_url)).await?;
            Ok::<_, ResolverError>(response.text().await?)
        };

        match tokio::time::timeout(self.title_fallback_timeout, fetch).await {
            Ok(Ok(page)) => capture_group_1(&PAGE_TITLE_REGEX, &page)
                .map(str::to_owned)
                .unwrap_or_default(),
            Ok(Err(e)) => {
                debug!(room_id, error = %e, "title fallback failed");
                String::new()
            }
            Err(_) => {
                warn!(room_id, "title fallback timed out");
                String::new()
            }
        }
    }
}

#[async_trait]
impl PlatformResolver for Bilibili {
    fn platform_key(&self) -> &'static str {
        "bilibili"
    }

    async fn fetch_stream_info(
        &self,
        client: &Client,
        target: &StreamTarget,
        credentials: Option<&Credentials>,
    ) -> Result<StreamInfo, ResolverError> {
        let regex = room_capture("bilibili").ok_or(ResolverError::InvalidUrl(target.url.clone()))?;
        let rid = capture_group_1_or_invalid_url(regex, &target.url)?.to_owned();

        let mut extractor = Extractor::new("Bilibili", target.url.clone(), client.clone());
        extractor.set_origin_and_referer_static(BASE_URL);
        if let Some(cookies) = credentials.and_then(|c| c.cookies.as_deref()) {
            extractor.set_cookies_from_string(cookies);
        }

        let room: RoomInfo =
            Self::get_json(&extractor, ROOM_INFO_URL, &[("room_id", rid.clone())]).await?;
        let anchor: AnchorInfo = Self::get_json(
            &extractor,
            ANCHOR_URL,
            &[("roomid", room.room_id.to_string())],
        )
        .await?;

        let title = if room.title.is_empty() {
            self.scrape_title(&extractor, room.room_id).await
        } else {
            room.title
        };

        let mut info = StreamInfo::offline(anchor.info.uname, title);
        if room.live_status != 1 {
            return Ok(info);
        }

        let play: PlayInfo = Self::get_json(
            &extractor,
            PLAY_INFO_URL,
            &[
                ("room_id", room.room_id.to_string()),
                ("protocol", "0,1".to_string()),
                ("format", "0,1,2".to_string()),
                ("codec", "0".to_string()),
                ("qn", quality_qn(target.quality).to_string()),
                ("platform", "web".to_string()),
            ],
        )
        .await?;

        info.is_live = true;
        if let Some((qn, url)) = Self::pick_url(play) {
            info.quality_urls.push((Self::quality_for_qn(qn), url));
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_api() {
        let ok: ApiResponse<u8> = serde_json::from_str(r#"{"code":0,"data":1}"#).unwrap();
        assert_eq!(unwrap_api(ok).unwrap(), 1);

        let missing: ApiResponse<u8> =
            serde_json::from_str(r#"{"code":1,"message":"not found"}"#).unwrap();
        assert!(matches!(unwrap_api(missing), Err(ResolverError::StreamerNotFound)));
    }

    #[test]
    fn test_pick_url_prefers_flv() {
        let body = r#"{"playurl_info":{"playurl":{"stream":[
            {"protocol_name":"http_hls","format":[{"format_name":"ts","codec":[
                {"codec_name":"avc","base_url":"/live/a.m3u8","current_qn":10000,"url_info":[{"host":"https://hls","extra":"?x=1"}]}]}]},
            {"protocol_name":"http_stream","format":[{"format_name":"flv","codec":[
                {"codec_name":"hevc","base_url":"/live/h.flv","current_qn":10000,"url_info":[{"host":"https://h","extra":""}]},
                {"codec_name":"avc","base_url":"/live/a.flv","current_qn":250,"url_info":[{"host":"https://flv","extra":"?y=2"}]}]}]}
        ]}}}"#;
        let play: PlayInfo = serde_json::from_str(body).unwrap();
        let (qn, url) = Bilibili::pick_url(play).unwrap();
        assert_eq!(qn, 250);
        assert_eq!(url, "https://flv/live/a.flv?y=2");
        assert_eq!(Bilibili::quality_for_qn(qn), Quality::Hd);
    }

    #[test]
    fn test_quality_for_qn() {
        assert_eq!(Bilibili::quality_for_qn(10000), Quality::Od);
        assert_eq!(Bilibili::quality_for_qn(400), Quality::Uhd);
        assert_eq!(Bilibili::quality_for_qn(10), Quality::Ld);
    }

    #[test]
    fn test_page_title_regex() {
        let page = "<title>My stream - Alice - 哔哩哔哩直播，二次元弹幕直播平台</title>";
        assert_eq!(capture_group_1(&PAGE_TITLE_REGEX, page), Some("My stream"));
    }
}
