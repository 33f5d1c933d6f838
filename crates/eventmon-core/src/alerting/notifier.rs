//! Webhook delivery for alert transitions

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{error, info};
use uuid::Uuid;

use super::sink::{AlertKind, AlertSink};

/// Notice posted to the webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertNotice {
    /// Unique identifier of this notice
    pub alert_id: Uuid,
    /// Monitor name
    pub monitor: String,
    /// Transition kind
    pub status: AlertKind,
    /// Human-readable message
    pub message: String,
    /// When the notice was built
    pub sent_at: DateTime<Utc>,
}

impl AlertNotice {
    /// Build a notice for `monitor`
    pub fn new(monitor: &str, status: AlertKind) -> Self {
        let message = match status {
            AlertKind::Raised => format!("Monitor '{monitor}' fell below its minimum five minute rate"),
            AlertKind::Cleared => format!("Monitor '{monitor}' recovered to its minimum five minute rate"),
        };

        Self {
            alert_id: Uuid::new_v4(),
            monitor: monitor.to_string(),
            status,
            message,
            sent_at: Utc::now(),
        }
    }
}

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Request failed or returned a non-success status
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Alerter could not be built
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Sink that posts every transition to a webhook
#[derive(Debug, Clone)]
pub struct WebhookAlerter {
    client: Client,
    url: String,
}

impl WebhookAlerter {
    /// Create a webhook alerter with a per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let url = url.into();
        if url.is_empty() {
            return Err(NotificationError::ConfigError("webhook url must not be empty".to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::ConfigError(e.to_string()))?;

        Ok(Self { client, url })
    }

    /// Post a notice and wait for the response
    pub async fn send(&self, notice: &AlertNotice) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.url)
            .json(notice)
            .send()
            .await
            .map_err(|e| NotificationError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::HttpError(format!(
                "Webhook returned {}: {}",
                status, body
            )));
        }

        info!(monitor = %notice.monitor, status = %notice.status, url = %self.url, "Webhook notification sent");
        Ok(())
    }

    fn dispatch(&self, monitor: &str, kind: AlertKind) {
        let notice = AlertNotice::new(monitor, kind);

        let Ok(handle) = Handle::try_current() else {
            error!(monitor = %monitor, "No runtime available for webhook delivery");
            return;
        };

        let alerter = self.clone();
        handle.spawn(async move {
            if let Err(e) = alerter.send(&notice).await {
                error!(monitor = %notice.monitor, error = %e, "Webhook notification failed");
            }
        });
    }
}

impl AlertSink for WebhookAlerter {
    fn raise(&self, monitor: &str) {
        self.dispatch(monitor, AlertKind::Raised);
    }

    fn clear(&self, monitor: &str) {
        self.dispatch(monitor, AlertKind::Cleared);
    }
}
