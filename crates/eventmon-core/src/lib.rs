//! # EventMon
//!
//! Event rate monitoring with decayed rates and threshold alerts.
//!
//! EventMon classifies a stream of discrete events against configured
//! monitors, keeps one, five and fifteen minute decayed rates per monitor, and
//! raises an alert when a monitor's five minute rate falls below its minimum.
//!
//! ## Architecture
//!
//! - **Stats**: EWMA rates and the self-ticking counter built on them
//! - **Scheduler**: one shared tokio-based scheduler ticking every counter
//! - **Monitor**: predicate + counter + alert state machine
//! - **Alerting**: sinks receiving raise/clear notifications
//! - **Replay**: offline evaluation of recorded events
//!
//! ## Quick Start
//!
//! ```bash
//! # Check a monitor definition file
//! eventmon validate --monitors etc/monitor.json
//!
//! # Replay recorded events
//! eventmon replay --monitors etc/monitor.json --events events.ndjson
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_precision_loss)]

pub mod alerting;
pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod replay;
pub mod scheduler;
pub mod stats;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{AlertSink, InMemoryAlerter, LogAlerter, WebhookAlerter};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::monitor::{EventPredicate, Monitor, MonitorSet};
    pub use crate::replay::{ReplayReport, Replayer};
    pub use crate::scheduler::Scheduler;
    pub use crate::stats::{CounterStat, Ewma};
}
