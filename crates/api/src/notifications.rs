//! Notification service client.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// A configured delivery channel (Slack, email, webhook...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationChannel {
    /// Channel name used as the delivery alias
    pub name: String,
    /// Channel kind as reported by the service
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// A single alert to deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Target channel name
    pub channel: String,
    /// Short subject line
    pub subject: String,
    /// Alert body
    pub message: String,
    /// When the alert was raised
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Create a notification stamped with the current time.
    pub fn new(
        channel: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            subject: subject.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Alert delivery.
#[async_trait]
pub trait NotificationClient: Send + Sync {
    /// List configured channels.
    async fn list_channels(&self) -> Result<Vec<NotificationChannel>>;

    /// Deliver one notification.
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// HTTP client for the hosted notification service.
#[derive(Clone)]
pub struct HttpNotificationClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpNotificationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpNotificationClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.api_key.is_some())
            .finish()
    }
}

impl HttpNotificationClient {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Authenticate requests with an API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("X-Api-Key", key),
            None => request,
        }
    }
}

#[async_trait]
impl NotificationClient for HttpNotificationClient {
    #[instrument(skip(self))]
    async fn list_channels(&self) -> Result<Vec<NotificationChannel>> {
        let url = format!("{}/notifications/channels", self.base_url);
        let response = self.authorize(self.client.get(&url)).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Notification API error: {} - {}", status, body);
        }

        let channels: Vec<NotificationChannel> = response.json().await?;
        debug!(count = channels.len(), "Listed notification channels");
        Ok(channels)
    }

    #[instrument(skip(self, notification), fields(channel = %notification.channel))]
    async fn send(&self, notification: &Notification) -> Result<()> {
        let url = format!("{}/notifications", self.base_url);
        let response = self
            .authorize(self.client.post(&url))
            .json(notification)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Notification API error: {} - {}", status, body);
        }

        debug!(subject = %notification.subject, "Notification sent");
        Ok(())
    }
}

/// Records notifications instead of delivering them (dry runs and tests).
#[derive(Debug, Clone, Default)]
pub struct RecordingNotificationClient {
    channels: Vec<NotificationChannel>,
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotificationClient {
    /// Create a recorder that reports the given channel names.
    pub fn with_channels<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: names
                .into_iter()
                .map(|name| NotificationChannel {
                    name: name.into(),
                    kind: None,
                })
                .collect(),
            sent: Arc::default(),
        }
    }

    /// Notifications recorded so far.
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationClient for RecordingNotificationClient {
    async fn list_channels(&self) -> Result<Vec<NotificationChannel>> {
        Ok(self.channels.clone())
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}
