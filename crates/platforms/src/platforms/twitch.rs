use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::ResolverError;
use crate::extractor::Extractor;
use crate::media::{Credentials, Quality, StreamInfo, StreamTarget};
use crate::platform::room_capture;
use crate::resolver::PlatformResolver;
use crate::utils::capture_group_1_or_invalid_url;

const BASE_URL: &str = "https://www.twitch.tv";
const GQL_API_URL: &str = "https://gql.twitch.tv/gql";
const USHER_URL: &str = "https://usher.ttvnw.net/api/channel/hls";
const CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";

/// Twitch resolver backed by the public GQL endpoint.
pub struct Twitch;

#[derive(Debug, Deserialize)]
struct GqlResponse<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ChannelShellData {
    #[serde(rename = "userOrError")]
    user_or_error: Option<UserOrError>,
}

#[derive(Debug, Deserialize)]
struct UserOrError {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    stream: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamMetadataData {
    user: Option<MetadataUser>,
}

#[derive(Debug, Deserialize)]
struct MetadataUser {
    #[serde(rename = "lastBroadcast")]
    last_broadcast: Option<LastBroadcast>,
    stream: Option<MetadataStream>,
}

#[derive(Debug, Deserialize)]
struct LastBroadcast {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataStream {
    #[serde(rename = "type")]
    stream_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessTokenData {
    #[serde(rename = "streamPlaybackAccessToken")]
    token: Option<AccessToken>,
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    value: String,
    signature: String,
}

fn persisted_query(operation_name: &str, sha256_hash: &str, variables: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "operationName": operation_name,
        "extensions": {
            "persistedQuery": {
                "version": 1,
                "sha256Hash": sha256_hash,
            }
        },
        "variables": variables,
    })
}

impl Twitch {
    fn extractor(client: &Client, target: &StreamTarget, credentials: Option<&Credentials>) -> Extractor {
        let mut extractor = Extractor::new("Twitch", target.url.clone(), client.clone());
        extractor.set_referer_static(BASE_URL);
        extractor.add_header_str("Client-Id", CLIENT_ID);
        extractor.add_header_str("device-id", uuid::Uuid::new_v4().simple().to_string());

        if let Some(credentials) = credentials {
            if let Some(token) = credentials.token.as_deref() {
                extractor.add_header_str("Authorization", format!("OAuth {token}"));
            }
            if let Some(cookies) = credentials.cookies.as_deref() {
                extractor.set_cookies_from_string(cookies);
            }
        }
        extractor
    }

    async fn post_gql<T: for<'de> Deserialize<'de>>(
        extractor: &Extractor,
        body: &serde_json::Value,
    ) -> Result<T, ResolverError> {
        let response = extractor
            .send(extractor.post(GQL_API_URL).json(body))
            .await?;
        let body = response.text().await?;
        debug!(len = body.len(), "twitch gql response");
        Ok(serde_json::from_str(&body)?)
    }

    async fn playback_url(extractor: &Extractor, login: &str) -> Result<String, ResolverError> {
        let query = persisted_query(
            "PlaybackAccessToken",
            "ed230aa1e33e07eebb8928504583da78a5173989fadfb1ac94be06a04f3cdbe9",
            serde_json::json!({
                "isLive": true,
                "login": login,
                "isVod": false,
                "vodID": "",
                "playerType": "site",
            }),
        );
        let response: GqlResponse<AccessTokenData> = Self::post_gql(extractor, &query).await?;
        let token = response
            .data
            .and_then(|d| d.token)
            .ok_or_else(|| ResolverError::ValidationError("missing playback access token".into()))?;

        let mut url = url::Url::parse(&format!("{USHER_URL}/{login}.m3u8"))
            .map_err(|e| ResolverError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("sig", &token.signature)
            .append_pair("token", &token.value)
            .append_pair("allow_source", "true")
            .append_pair("fast_bread", "true");
        Ok(url.into())
    }
}

#[async_trait]
impl PlatformResolver for Twitch {
    fn platform_key(&self) -> &'static str {
        "twitch"
    }

    async fn fetch_stream_info(
        &self,
        client: &Client,
        target: &StreamTarget,
        credentials: Option<&Credentials>,
    ) -> Result<StreamInfo, ResolverError> {
        let regex = room_capture("twitch").ok_or(ResolverError::InvalidUrl(target.url.clone()))?;
        let login = capture_group_1_or_invalid_url(regex, &target.url)?.to_ascii_lowercase();
        let extractor = Self::extractor(client, target, credentials);

        let shell: GqlResponse<ChannelShellData> = Self::post_gql(
            &extractor,
            &persisted_query(
                "ChannelShell",
                "fea4573a7bf2644f5b3f2cbbdcbee0d17312e48d2e55f080589d053aad353f11",
                serde_json::json!({ "login": login }),
            ),
        )
        .await?;
        let user = shell
            .data
            .and_then(|d| d.user_or_error)
            .ok_or(ResolverError::StreamerNotFound)?;
        let Some(anchor_name) = user.display_name.clone() else {
            // userOrError resolves to an error object for unknown logins
            return Err(ResolverError::StreamerNotFound);
        };

        let metadata: GqlResponse<StreamMetadataData> = Self::post_gql(
            &extractor,
            &persisted_query(
                "StreamMetadata",
                "b57f9b910f8cd1a4659d894fe7550ccc81ec9052c01e438b290fd66a040b9b93",
                serde_json::json!({ "channelLogin": login, "previewImageURL": "" }),
            ),
        )
        .await?;
        let metadata_user = metadata.data.and_then(|d| d.user);

        let is_live = match &metadata_user {
            Some(u) => u.stream.as_ref().and_then(|s| s.stream_type.as_deref()) == Some("live"),
            None => user.stream.is_some(),
        };
        let title = metadata_user
            .and_then(|u| u.last_broadcast)
            .and_then(|b| b.title)
            .unwrap_or_default();

        if !is_live {
            return Ok(StreamInfo::offline(anchor_name, title));
        }

        let url = Self::playback_url(&extractor, &login).await?;
        Ok(StreamInfo {
            anchor_name,
            title,
            is_live,
            quality_urls: vec![(Quality::Od, url)],
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel_shell() {
        let body = r#"{"data":{"userOrError":{"displayName":"Alice","stream":{"id":"1"}}}}"#;
        let parsed: GqlResponse<ChannelShellData> = serde_json::from_str(body).unwrap();
        let user = parsed.data.unwrap().user_or_error.unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Alice"));
        assert!(user.stream.is_some());
    }

    #[test]
    fn test_parse_stream_metadata() {
        let body = r#"{"data":{"user":{"lastBroadcast":{"title":"hello"},"stream":{"type":"live"}}}}"#;
        let parsed: GqlResponse<StreamMetadataData> = serde_json::from_str(body).unwrap();
        let user = parsed.data.unwrap().user.unwrap();
        assert_eq!(user.last_broadcast.unwrap().title.as_deref(), Some("hello"));
        assert_eq!(user.stream.unwrap().stream_type.as_deref(), Some("live"));
    }
}
