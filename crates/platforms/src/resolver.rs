//! Resolver capability and the startup-populated registry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::client::{DEFAULT_TIMEOUT, build_client};
use crate::error::ResolverError;
use crate::media::{Credentials, StreamInfo, StreamTarget};
use crate::platforms::{Bilibili, Huya, Twitch};

/// Fetches live status and stream URLs for one platform.
#[async_trait]
pub trait PlatformResolver: Send + Sync {
    /// Key of the platform this resolver serves, see [`crate::platform`].
    fn platform_key(&self) -> &'static str;

    async fn fetch_stream_info(
        &self,
        client: &Client,
        target: &StreamTarget,
        credentials: Option<&Credentials>,
    ) -> Result<StreamInfo, ResolverError>;
}

/// Maps platform keys to resolver implementations.
///
/// Implementations are registered explicitly at startup; there is no
/// runtime discovery.
pub struct ResolverRegistry {
    resolvers: FxHashMap<&'static str, Arc<dyn PlatformResolver>>,
    client: Client,
    proxied_clients: Mutex<FxHashMap<String, Client>>,
    timeout: Duration,
}

impl ResolverRegistry {
    pub fn new(client: Client) -> Self {
        Self {
            resolvers: FxHashMap::default(),
            client,
            proxied_clients: Mutex::new(FxHashMap::default()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Registry with every built-in resolver.
    pub fn with_defaults(client: Client) -> Self {
        let mut registry = Self::new(client);
        registry.register(Arc::new(Twitch));
        registry.register(Arc::new(Huya));
        registry.register(Arc::new(Bilibili::default()));
        registry
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn register(&mut self, resolver: Arc<dyn PlatformResolver>) {
        self.resolvers.insert(resolver.platform_key(), resolver);
    }

    pub fn supports(&self, platform_key: &str) -> bool {
        self.resolvers.contains_key(platform_key)
    }

    pub fn supported_keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.resolvers.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<Client, ResolverError> {
        let Some(proxy) = proxy.filter(|p| !p.trim().is_empty()) else {
            return Ok(self.client.clone());
        };

        let mut clients = self.proxied_clients.lock();
        if let Some(client) = clients.get(proxy) {
            return Ok(client.clone());
        }
        debug!(proxy, "building proxied resolver client");
        let client = build_client(Some(proxy), self.timeout)?;
        clients.insert(proxy.to_owned(), client.clone());
        Ok(client)
    }

    /// Fetch the live status of `target`, routing through `proxy` if given.
    ///
    /// The returned info has `playable_url` selected for the target quality.
    pub async fn fetch_stream_info(
        &self,
        target: &StreamTarget,
        credentials: Option<&Credentials>,
        proxy: Option<&str>,
    ) -> Result<StreamInfo, ResolverError> {
        let resolver = self
            .resolvers
            .get(target.platform_key.as_str())
            .cloned()
            .ok_or_else(|| ResolverError::PlatformNotSupported(target.platform_key.clone()))?;

        let client = self.client_for(proxy)?;
        let info = resolver
            .fetch_stream_info(&client, target, credentials)
            .await?;
        Ok(info.with_selected(target.quality))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::media::Quality;

    struct Fixed;

    #[async_trait]
    impl PlatformResolver for Fixed {
        fn platform_key(&self) -> &'static str {
            "fixed"
        }

        async fn fetch_stream_info(
            &self,
            _client: &Client,
            _target: &StreamTarget,
            _credentials: Option<&Credentials>,
        ) -> Result<StreamInfo, ResolverError> {
            Ok(StreamInfo {
                anchor_name: "anchor".into(),
                is_live: true,
                quality_urls: vec![(Quality::Od, "od".into()), (Quality::Sd, "sd".into())],
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_registry_dispatch_and_select() {
        let mut registry = ResolverRegistry::new(crate::client::default_client().unwrap());
        registry.register(Arc::new(Fixed));

        let target = StreamTarget::new("https://fixed/1", "fixed").with_quality(Quality::Hd);
        let info = registry
            .fetch_stream_info(&target, None, None)
            .await
            .unwrap();
        assert_eq!(info.playable_url.as_deref(), Some("sd"));
    }

    #[tokio::test]
    async fn test_registry_unsupported() {
        let registry = ResolverRegistry::new(crate::client::default_client().unwrap());
        let target = StreamTarget::new("https://kick.com/x", "kick");
        let err = registry
            .fetch_stream_info(&target, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_defaults_registered() {
        let registry = ResolverRegistry::with_defaults(crate::client::default_client().unwrap());
        assert_eq!(registry.supported_keys(), vec!["bilibili", "huya", "twitch"]);
        assert!(!registry.supports("kick"));
    }
}
