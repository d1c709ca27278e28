//! "Stream started" pushes.
//!
//! Delivery failures never reach the state machine; the orchestrator logs
//! them and moves on.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::NotificationConfig;
use crate::domain::Recording;
use crate::{Error, Result};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn push(&self, title: &str, body: &str) -> Result<()>;
}

/// Writes pushes to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn push(&self, title: &str, body: &str) -> Result<()> {
        info!(title, body, "notification");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    title: &'a str,
    body: &'a str,
    timestamp: chrono::DateTime<chrono::Utc>,
}

/// POSTs a JSON `{title, body, timestamp}` document to a URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(client: Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn push(&self, title: &str, body: &str) -> Result<()> {
        let payload = WebhookPayload {
            title,
            body,
            timestamp: chrono::Utc::now(),
        };
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Other(format!("webhook request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Other(format!("webhook returned {}", status)));
        }
        debug!(url = %self.url, "webhook delivered");
        Ok(())
    }
}

/// Webhook notifier when a URL is configured, log notifier otherwise.
pub fn notifier_from_config(config: &NotificationConfig, client: Client) -> Arc<dyn Notifier> {
    match config.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => Arc::new(WebhookNotifier::new(
            client,
            url,
            Duration::from_secs(config.timeout_secs),
        )),
        None => Arc::new(LogNotifier),
    }
}

/// Title and body of the "stream started" push for `recording`.
pub fn stream_started_message(recording: &Recording) -> (String, String) {
    let name = recording.display_name();
    let title = format!("{} is live", name);
    let body = match recording.runtime.live_title.as_deref().filter(|t| !t.is_empty()) {
        Some(live_title) => format!("{} on {}: {}", name, recording.platform.name, live_title),
        None => format!("{} started streaming on {}", name, recording.platform.name),
    };
    (title, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RecordingConfig, RecordingUrl};

    #[test]
    fn test_stream_started_message() {
        let mut recording = Recording::with_id(
            "rec",
            RecordingUrl::new("https://www.twitch.tv/alice").unwrap(),
            RecordingConfig {
                streamer_name: Some("Alice".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let (title, body) = stream_started_message(&recording);
        assert_eq!(title, "Alice is live");
        assert_eq!(body, "Alice started streaming on Twitch");

        recording.runtime.live_title = Some("speedruns".into());
        let (_, body) = stream_started_message(&recording);
        assert_eq!(body, "Alice on Twitch: speedruns");
    }

    #[tokio::test]
    async fn test_log_notifier() {
        LogNotifier.push("t", "b").await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_failure_is_an_error() {
        let client = platforms_resolver::default_client().unwrap();
        let notifier = WebhookNotifier::new(client, "http://127.0.0.1:9/hook", Duration::from_secs(2));
        assert!(notifier.push("t", "b").await.is_err());
    }
}
