//! Live status checks for single recordings.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use platforms_resolver::{Credentials, ResolverRegistry, StreamInfo, StreamTarget};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::domain::Recording;
use crate::{Error, Result};

/// Outcome of a successful check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveStatus {
    Live {
        title: String,
        anchor_name: String,
        /// URL to hand to the capture process.
        stream_url: String,
    },
    Offline {
        title: String,
        anchor_name: String,
    },
}

impl LiveStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Live { title, .. } | Self::Offline { title, .. } => title,
        }
    }

    pub fn anchor_name(&self) -> &str {
        match self {
            Self::Live { anchor_name, .. } | Self::Offline { anchor_name, .. } => anchor_name,
        }
    }

    pub fn stream_url(&self) -> Option<&str> {
        match self {
            Self::Live { stream_url, .. } => Some(stream_url),
            Self::Offline { .. } => None,
        }
    }

    fn from_info(info: StreamInfo, url: &str) -> Result<Self> {
        if !info.is_live {
            return Ok(Self::Offline {
                title: info.title,
                anchor_name: info.anchor_name,
            });
        }
        // live but no playable URL yet: the CDN usually catches up by the next poll
        let stream_url = info.playable_url.ok_or_else(|| {
            Error::ResolutionTransient(format!("{url} is live but has no playable stream"))
        })?;
        Ok(Self::Live {
            title: info.title,
            anchor_name: info.anchor_name,
            stream_url,
        })
    }
}

/// What a check needs to know about a recording, copied out of the entity
/// so no lock is held across the network call.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub recording_id: String,
    pub target: StreamTarget,
}

impl From<&Recording> for CheckRequest {
    fn from(recording: &Recording) -> Self {
        Self {
            recording_id: recording.id.clone(),
            target: StreamTarget::new(recording.url.as_str(), recording.platform_key())
                .with_quality(recording.config.quality),
        }
    }
}

/// Asks the platform resolvers whether rooms are live.
///
/// Holds per-platform credentials and swaps in cookies the platforms hand
/// back, so later checks present the refreshed session.
pub struct StreamDetector {
    registry: Arc<ResolverRegistry>,
    credentials: Mutex<FxHashMap<String, Credentials>>,
    proxy: Option<String>,
    timeout: Duration,
}

impl StreamDetector {
    pub fn new(registry: Arc<ResolverRegistry>, timeout: Duration) -> Self {
        Self {
            registry,
            credentials: Mutex::new(FxHashMap::default()),
            proxy: None,
            timeout,
        }
    }

    pub fn with_credentials(self, credentials: &BTreeMap<String, Credentials>) -> Self {
        {
            let mut map = self.credentials.lock();
            map.extend(credentials.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self
    }

    pub fn with_proxy(mut self, proxy: Option<&str>) -> Self {
        self.proxy = proxy.map(str::to_owned);
        self
    }

    pub fn registry(&self) -> &Arc<ResolverRegistry> {
        &self.registry
    }

    /// Credentials currently used for `platform_key`.
    pub fn credentials_for(&self, platform_key: &str) -> Option<Credentials> {
        self.credentials.lock().get(platform_key).cloned()
    }

    pub async fn check(&self, request: &CheckRequest) -> Result<LiveStatus> {
        let target = &request.target;
        let credentials = self.credentials_for(&target.platform_key);
        debug!(
            recording_id = %request.recording_id,
            platform = %target.platform_key,
            "checking live status"
        );

        let fetch =
            self.registry
                .fetch_stream_info(target, credentials.as_ref(), self.proxy.as_deref());
        let info = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| {
                Error::ResolutionTransient(format!(
                    "live check timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        if let Some(cookies) = info.refreshed_cookies.clone() {
            self.store_refreshed_cookies(&target.platform_key, cookies);
        }

        LiveStatus::from_info(info, &target.url)
    }

    fn store_refreshed_cookies(&self, platform_key: &str, cookies: String) {
        let mut map = self.credentials.lock();
        let entry = map.entry(platform_key.to_string()).or_default();
        if entry.cookies.as_deref() != Some(cookies.as_str()) {
            info!(platform = platform_key, "platform refreshed session cookies");
            entry.cookies = Some(cookies);
        }
    }
}
