//! Shared HTTP plumbing for platform resolvers.

use std::str::FromStr;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::client::DEFAULT_UA;
use crate::error::ResolverError;

/// Base request builder carrying platform headers and a cookie jar.
///
/// Resolvers construct one per fetch, so cookie state never leaks between
/// targets.
#[derive(Debug, Clone)]
pub struct Extractor {
    pub url: String,
    pub platform_name: &'static str,
    client: Client,
    headers: HeaderMap,
    cookies: FxHashMap<String, String>,
}

impl Extractor {
    pub fn new(platform_name: &'static str, url: impl Into<String>, client: Client) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::USER_AGENT, HeaderValue::from_static(DEFAULT_UA));
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.8,en-US;q=0.5,en;q=0.3"),
        );

        Self {
            url: url.into(),
            platform_name,
            client,
            headers,
            cookies: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn set_referer_static(&mut self, referer: &'static str) {
        self.headers
            .insert(reqwest::header::REFERER, HeaderValue::from_static(referer));
    }

    #[inline]
    pub fn set_origin_and_referer_static(&mut self, base_url: &'static str) {
        let v = HeaderValue::from_static(base_url);
        self.headers.insert(reqwest::header::ORIGIN, v.clone());
        self.headers.insert(reqwest::header::REFERER, v);
    }

    pub fn add_header_str<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, value: V) {
        match (
            HeaderName::from_str(key.as_ref()),
            HeaderValue::from_str(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => debug!(header = key.as_ref(), "Invalid header; skipping"),
        }
    }

    /// Set cookies from a cookie string (`name1=value1; name2=value2`).
    pub fn set_cookies_from_string(&mut self, cookie_string: &str) {
        for part in cookie_string.split(&[';', '\n'][..]).map(str::trim) {
            let Some((name, value)) = part.split_once('=') else {
                continue;
            };
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() || value.is_empty() {
                continue;
            }
            self.cookies.insert(name.to_owned(), value.to_owned());
        }
    }

    pub fn get_cookie(&self, name: &str) -> Option<&String> {
        self.cookies.get(name)
    }

    /// Store cookies from `set-cookie` response headers.
    pub fn parse_and_store_cookies(&mut self, headers: &HeaderMap) -> bool {
        let mut changed = false;
        for value in headers.get_all("set-cookie").iter() {
            if let Ok(cookie_str) = value.to_str()
                && let Some(cookie_part) = cookie_str.split(';').next()
                && let Some((name, value)) = cookie_part.split_once('=')
            {
                let (name, value) = (name.trim(), value.trim());
                if name.is_empty() || value.is_empty() {
                    continue;
                }
                changed |= self.cookies.insert(name.to_owned(), value.to_owned()).as_deref()
                    != Some(value);
            }
        }
        changed
    }

    /// Serialize the cookie jar back into a cookie string.
    pub fn cookie_string(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let mut pairs: Vec<_> = self.cookies.iter().collect();
        pairs.sort();
        Some(
            pairs
                .into_iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut headers = self.headers.clone();
        if let Some(cookie_header) = self.cookie_string() {
            match HeaderValue::from_str(&cookie_header) {
                Ok(value) => {
                    headers.insert(reqwest::header::COOKIE, value);
                }
                Err(e) => debug!(error = %e, "Failed to build Cookie header"),
            }
        }
        self.client.request(method, url).headers(headers)
    }

    /// Send `request` and turn non-success statuses into errors.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ResolverError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ResolverError::Timeout
            } else {
                ResolverError::HttpError(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolverError::HttpStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(response)
    }
}
