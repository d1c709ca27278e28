use std::sync::OnceLock;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::error::ResolverError;

pub(crate) const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Default timeout applied to every resolver request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build an HTTP client, optionally routed through `proxy`.
///
/// An invalid proxy URL is logged and ignored rather than failing the caller.
pub fn build_client(proxy: Option<&str>, timeout: Duration) -> Result<Client, ResolverError> {
    install_rustls_provider();

    let mut builder = Client::builder().timeout(timeout).user_agent(DEFAULT_UA);
    match proxy.filter(|p| !p.trim().is_empty()) {
        Some(url) => match reqwest::Proxy::all(url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(error) => {
                warn!(proxy_url = %url, error = %error, "Invalid proxy URL; disabling proxy");
                builder = builder.no_proxy();
            }
        },
        None => builder = builder.no_proxy(),
    }

    builder.build().map_err(ResolverError::HttpError)
}

pub fn default_client() -> Result<Client, ResolverError> {
    build_client(None, DEFAULT_TIMEOUT)
}
