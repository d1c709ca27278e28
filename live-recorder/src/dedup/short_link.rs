//! Expansion of link-shortener URLs and anchor-name lookups.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use platforms_resolver::{Credentials, ResolverRegistry, StreamTarget};
use reqwest::Client;
use tracing::debug;

/// Follows a short link to the URL it redirects to.
#[async_trait]
pub trait ShortLinkResolver: Send + Sync {
    /// Final URL after redirects, or `None` if it cannot be reached.
    async fn expand(&self, url: &str) -> Option<String>;
}

/// Resolves short links with an HTTP GET that follows redirects.
pub struct HttpShortLinkResolver {
    client: Client,
    timeout: Duration,
}

impl HttpShortLinkResolver {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl ShortLinkResolver for HttpShortLinkResolver {
    async fn expand(&self, url: &str) -> Option<String> {
        match self.client.get(url).timeout(self.timeout).send().await {
            Ok(response) => Some(response.url().to_string()),
            Err(e) => {
                debug!(url, error = %e, "short link expansion failed");
                None
            }
        }
    }
}

/// Looks up the real anchor name behind a room URL.
#[async_trait]
pub trait AnchorNameLookup: Send + Sync {
    async fn anchor_name(&self, url: &str, platform_key: &str) -> Option<String>;
}

/// Anchor lookup backed by the platform resolvers.
pub struct ResolverAnchorLookup {
    registry: Arc<ResolverRegistry>,
    credentials: Box<dyn Fn(&str) -> Option<Credentials> + Send + Sync>,
}

impl ResolverAnchorLookup {
    pub fn new(registry: Arc<ResolverRegistry>) -> Self {
        Self {
            registry,
            credentials: Box::new(|_| None),
        }
    }

    /// Use `credentials` to find session material per platform key.
    pub fn with_credentials(
        mut self,
        credentials: impl Fn(&str) -> Option<Credentials> + Send + Sync + 'static,
    ) -> Self {
        self.credentials = Box::new(credentials);
        self
    }
}

#[async_trait]
impl AnchorNameLookup for ResolverAnchorLookup {
    async fn anchor_name(&self, url: &str, platform_key: &str) -> Option<String> {
        if !self.registry.supports(platform_key) {
            return None;
        }

        let target = StreamTarget::new(url, platform_key);
        let credentials = (self.credentials)(platform_key);
        match self
            .registry
            .fetch_stream_info(&target, credentials.as_ref(), None)
            .await
        {
            Ok(info) if !info.anchor_name.is_empty() => Some(info.anchor_name),
            Ok(_) => None,
            Err(e) => {
                debug!(url, error = %e, "anchor lookup failed");
                None
            }
        }
    }
}

/// Lookup that never finds anything; for offline use.
pub struct NoAnchorLookup;

#[async_trait]
impl AnchorNameLookup for NoAnchorLookup {
    async fn anchor_name(&self, _url: &str, _platform_key: &str) -> Option<String> {
        None
    }
}
