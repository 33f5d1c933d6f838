//! Alert notification for EventMon
//!
//! Monitors talk to the outside world only through [`AlertSink`]; the
//! concrete sink is chosen by the embedding application.

mod notifier;
mod sink;

pub use notifier::{AlertNotice, NotificationError, WebhookAlerter};
pub use sink::{AlertKind, AlertRecord, AlertSink, InMemoryAlerter, LogAlerter};
