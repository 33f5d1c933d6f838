//! Alert sinks: the only outward calls a monitor makes

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Receives threshold crossing notifications from monitors.
///
/// Called from the scheduler's tick path, so implementations must not block.
/// A monitor records the transition only after the call returns: if a sink
/// panics, the same call is made again on the next tick.
pub trait AlertSink: Send + Sync {
    /// The monitor's five minute rate dropped below its minimum
    fn raise(&self, monitor: &str);

    /// The monitor's five minute rate recovered
    fn clear(&self, monitor: &str);
}

/// Kind of alert transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// Alert raised
    Raised,
    /// Alert cleared
    Cleared,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Raised => f.write_str("raised"),
            AlertKind::Cleared => f.write_str("cleared"),
        }
    }
}

/// One recorded alert transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Monitor name
    pub monitor: String,
    /// Transition kind
    pub kind: AlertKind,
    /// When the transition was recorded
    pub at: DateTime<Utc>,
}

/// Sink that writes alert transitions to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlerter;

impl AlertSink for LogAlerter {
    fn raise(&self, monitor: &str) {
        warn!(monitor = %monitor, "Alert raised: event rate below minimum");
    }

    fn clear(&self, monitor: &str) {
        info!(monitor = %monitor, "Alert cleared: event rate recovered");
    }
}

#[derive(Debug, Default)]
struct InMemoryState {
    active: BTreeSet<String>,
    history: Vec<AlertRecord>,
}

/// Sink that keeps alerts in memory
#[derive(Debug, Default)]
pub struct InMemoryAlerter {
    state: Mutex<InMemoryState>,
}

impl InMemoryAlerter {
    /// Create an empty alerter
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of monitors currently raised
    pub fn active(&self) -> Vec<String> {
        self.state.lock().active.iter().cloned().collect()
    }

    /// Every transition in arrival order
    pub fn history(&self) -> Vec<AlertRecord> {
        self.state.lock().history.clone()
    }

    fn record(&self, monitor: &str, kind: AlertKind) {
        let mut state = self.state.lock();
        match kind {
            AlertKind::Raised => state.active.insert(monitor.to_string()),
            AlertKind::Cleared => state.active.remove(monitor),
        };
        state.history.push(AlertRecord {
            monitor: monitor.to_string(),
            kind,
            at: Utc::now(),
        });
    }
}

impl AlertSink for InMemoryAlerter {
    fn raise(&self, monitor: &str) {
        self.record(monitor, AlertKind::Raised);
    }

    fn clear(&self, monitor: &str) {
        self.record(monitor, AlertKind::Cleared);
    }
}
