//! Configuration management for EventMon

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alerting::{AlertSink, LogAlerter, WebhookAlerter};
use crate::error::{Error, Result};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Monitor definitions
    pub monitors: MonitorsConfig,

    /// Alerting configuration
    pub alerting: AlertingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load defaults, then an optional settings file, then `EVENTMON__*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("EVENTMON").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

/// Monitor definition source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorsConfig {
    /// JSON file with monitor definitions
    pub file: PathBuf,
}

impl Default for MonitorsConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("etc/monitor.json"),
        }
    }
}

/// Where alert transitions go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Log lines only
    #[default]
    Log,
    /// HTTP webhook
    Webhook,
}

/// Alerting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    /// Sink receiving raise/clear notifications
    pub sink: SinkKind,
    /// Webhook target, required for the webhook sink
    pub webhook_url: Option<String>,
    /// Per-request webhook timeout
    #[serde(with = "humantime_serde")]
    pub webhook_timeout: Duration,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::Log,
            webhook_url: None,
            webhook_timeout: Duration::from_secs(10),
        }
    }
}

impl AlertingConfig {
    /// Build the configured sink
    pub fn build_sink(&self) -> Result<Arc<dyn AlertSink>> {
        match self.sink {
            SinkKind::Log => Ok(Arc::new(LogAlerter)),
            SinkKind::Webhook => {
                let url = self
                    .webhook_url
                    .as_deref()
                    .ok_or_else(|| Error::config("alerting.webhook_url is required for the webhook sink"))?;
                let alerter = WebhookAlerter::new(url, self.webhook_timeout)
                    .map_err(|e| Error::config(e.to_string()))?;
                Ok(Arc::new(alerter))
            }
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
