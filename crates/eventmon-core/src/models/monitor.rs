//! Monitor definitions and exposed monitor state

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Alert state of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    /// Rate at or above the configured minimum
    #[default]
    Ok,
    /// Rate below the configured minimum
    Alerting,
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertState::Ok => f.write_str("OK"),
            AlertState::Alerting => f.write_str("ALERTING"),
        }
    }
}

/// Attribute filter of a monitor definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDefinition {
    /// Attribute key to required string prefix
    #[serde(default)]
    pub starts_with: BTreeMap<String, String>,
}

/// One monitor as read from the definition file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorDefinition {
    /// Event type that counts toward this monitor
    pub event_type: String,

    /// Optional attribute prefix filter
    #[serde(default)]
    pub filter: FilterDefinition,

    /// Minimum acceptable five minute rate, in events per second
    pub min_five_minute_rate: f64,
}

impl MonitorDefinition {
    /// Create a definition without filter
    pub fn new(event_type: impl Into<String>, min_five_minute_rate: f64) -> Self {
        Self {
            event_type: event_type.into(),
            filter: FilterDefinition::default(),
            min_five_minute_rate,
        }
    }

    /// Require attribute `key` to start with `prefix`
    #[must_use]
    pub fn starts_with(mut self, key: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.filter.starts_with.insert(key.into(), prefix.into());
        self
    }

    /// Reject definitions that cannot become a working monitor
    pub fn validate(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::validation("monitor name must not be empty"));
        }
        if self.event_type.is_empty() {
            return Err(Error::validation(format!("monitor '{name}': eventType must not be empty")));
        }
        if !self.min_five_minute_rate.is_finite() || self.min_five_minute_rate < 0.0 {
            return Err(Error::validation(format!(
                "monitor '{name}': minFiveMinuteRate must be a finite, non-negative number (got {})",
                self.min_five_minute_rate
            )));
        }
        if self.filter.starts_with.keys().any(String::is_empty) {
            return Err(Error::validation(format!(
                "monitor '{name}': startsWith filter keys must not be empty"
            )));
        }
        Ok(())
    }
}

/// Monitor definitions keyed by monitor name
pub type MonitorDefinitions = BTreeMap<String, MonitorDefinition>;

/// Parse monitor definitions from a JSON document
pub fn parse_monitor_definitions(json: &str) -> Result<MonitorDefinitions> {
    Ok(serde_json::from_str(json)?)
}

/// Load monitor definitions from a JSON file
pub fn load_monitor_definitions(path: impl AsRef<Path>) -> Result<MonitorDefinitions> {
    let contents = std::fs::read_to_string(path)?;
    parse_monitor_definitions(&contents)
}

/// Read-only view of a monitor for status and metrics surfaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// Monitor name
    pub name: String,
    /// Event type counted by the monitor
    pub event_type: String,
    /// Total matching events
    pub total_count: u64,
    /// One minute rate, events per second
    pub one_minute_rate: f64,
    /// Five minute rate, events per second
    pub five_minute_rate: f64,
    /// Fifteen minute rate, events per second
    pub fifteen_minute_rate: f64,
    /// Configured minimum five minute rate
    pub min_five_minute_rate: f64,
    /// False until the first tick produced a sample
    pub initialized: bool,
    /// Current alert state
    pub alert_state: AlertState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const DEFINITIONS: &str = r#"{
        "ScorerHttpMonitor": {
            "eventType": "HttpRequest",
            "filter": {"startsWith": {"requestUri": "/v1/scorer/", "responseCode": "2"}},
            "minFiveMinuteRate": 0.5
        },
        "PrsMessageMonitor": {
            "eventType": "PrsMessage",
            "minFiveMinuteRate": 1
        }
    }"#;

    #[test]
    fn test_parse_definitions() {
        let defs = parse_monitor_definitions(DEFINITIONS).unwrap();

        assert_eq!(defs.len(), 2);
        assert_eq!(
            defs["ScorerHttpMonitor"],
            MonitorDefinition::new("HttpRequest", 0.5)
                .starts_with("requestUri", "/v1/scorer/")
                .starts_with("responseCode", "2")
        );
        assert_eq!(defs["PrsMessageMonitor"], MonitorDefinition::new("PrsMessage", 1.0));
    }

    #[test]
    fn test_load_definitions_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DEFINITIONS.as_bytes()).unwrap();

        let defs = load_monitor_definitions(file.path()).unwrap();
        assert!(defs.contains_key("PrsMessageMonitor"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_monitor_definitions("/nonexistent/monitors.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_validate_rejects_bad_definitions() {
        assert!(matches!(
            MonitorDefinition::new("Http", 1.0).validate(""),
            Err(Error::Validation(_))
        ));
        assert!(MonitorDefinition::new("", 1.0).validate("m").is_err());
        assert!(MonitorDefinition::new("Http", -1.0).validate("m").is_err());
        assert!(MonitorDefinition::new("Http", f64::NAN).validate("m").is_err());
        assert!(MonitorDefinition::new("Http", 1.0)
            .starts_with("", "x")
            .validate("m")
            .is_err());
        assert!(MonitorDefinition::new("Http", 0.0).validate("m").is_ok());
    }

    #[test]
    fn test_alert_state_display() {
        assert_eq!(AlertState::Ok.to_string(), "OK");
        assert_eq!(AlertState::Alerting.to_string(), "ALERTING");
    }
}
