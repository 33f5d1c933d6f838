//! Monitors: a predicate, a rate counter and a minimum rate
//!
//! Every ingested event is tested against each monitor's predicate and
//! matching events feed the monitor's counter. After each tick the monitor
//! compares its five minute rate with the configured minimum and reports
//! transitions to the alert sink.

mod predicate;
mod set;

pub use predicate::EventPredicate;
pub use set::MonitorSet;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::alerting::AlertSink;
use crate::error::Result;
use crate::models::{AlertState, Event, MonitorDefinition, MonitorSnapshot};
use crate::scheduler::Scheduler;
use crate::stats::{CounterStat, RateMeter};

/// State shared between the monitor and its scheduled tick
struct AlertTracker {
    name: String,
    min_five_minute_rate: f64,
    state: Mutex<AlertState>,
    sink: Arc<dyn AlertSink>,
}

impl AlertTracker {
    /// Compare a fresh sample with the minimum and notify on a transition
    fn evaluate(&self, meter: &RateMeter) {
        if !meter.is_initialized() {
            return;
        }

        let rate = meter.five_minute_rate();
        let mut state = self.state.lock();

        match *state {
            AlertState::Ok if rate < self.min_five_minute_rate => {
                warn!(
                    monitor = %self.name,
                    rate,
                    threshold = self.min_five_minute_rate,
                    "Monitor rate below minimum"
                );
                self.sink.raise(&self.name);
                *state = AlertState::Alerting;
            }
            AlertState::Alerting if rate >= self.min_five_minute_rate => {
                info!(
                    monitor = %self.name,
                    rate,
                    threshold = self.min_five_minute_rate,
                    "Monitor rate recovered"
                );
                self.sink.clear(&self.name);
                *state = AlertState::Ok;
            }
            _ => {}
        }
    }
}

/// A named rule counting matching events and alerting on a low rate
pub struct Monitor {
    name: String,
    event_type: String,
    predicate: EventPredicate,
    counter: CounterStat,
    tracker: Arc<AlertTracker>,
}

impl Monitor {
    /// Build a monitor from a definition. Nothing is scheduled until `start`.
    pub fn new(
        name: impl Into<String>,
        definition: &MonitorDefinition,
        scheduler: Scheduler,
        sink: Arc<dyn AlertSink>,
    ) -> Result<Self> {
        let name = name.into();
        definition.validate(&name)?;

        Ok(Self {
            predicate: EventPredicate::for_definition(definition),
            counter: CounterStat::new(name.clone(), scheduler),
            tracker: Arc::new(AlertTracker {
                name: name.clone(),
                min_five_minute_rate: definition.min_five_minute_rate,
                state: Mutex::new(AlertState::Ok),
                sink,
            }),
            event_type: definition.event_type.clone(),
            name,
        })
    }

    /// Monitor name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Predicate deciding which events count
    pub fn predicate(&self) -> &EventPredicate {
        &self.predicate
    }

    /// Underlying counter
    pub fn counter(&self) -> &CounterStat {
        &self.counter
    }

    /// Current alert state
    pub fn alert_state(&self) -> AlertState {
        *self.tracker.state.lock()
    }

    /// Count the event if it matches. Returns whether it matched.
    pub fn ingest(&self, event: &Event) -> bool {
        let matched = self.predicate.matches(event);
        if matched {
            self.counter.update(1);
        }
        matched
    }

    /// Begin scheduled ticking and evaluation
    pub fn start(&self) {
        let tracker = self.tracker.clone();
        self.counter.start_with(move |meter| tracker.evaluate(meter));
        debug!(monitor = %self.name, "Monitor started");
    }

    /// Stop scheduled ticking
    pub fn stop(&self) {
        self.counter.stop();
    }

    /// Tick the counter now and evaluate the alert state.
    ///
    /// Only valid while stopped. A started monitor is ticked by its schedule
    /// entry alone and the call is ignored.
    pub fn tick(&self) {
        self.advance(1);
    }

    /// Apply `ticks` ticks at once, as after a stretch with no new events.
    ///
    /// The alert state is evaluated after the first tick, which carries the
    /// pending events, and again after the rest. Without new events the rate
    /// only falls, so no transition is missed between the two. Ignored while
    /// started.
    pub fn advance(&self, ticks: u64) {
        if ticks == 0 {
            return;
        }
        if !self.counter.try_tick(1) {
            warn!(monitor = %self.name, "Ignoring manual tick on a scheduled monitor");
            return;
        }
        self.tracker.evaluate(self.counter.meter());

        if ticks > 1 && self.counter.try_tick(ticks - 1) {
            self.tracker.evaluate(self.counter.meter());
        }
    }

    /// Read-only view of counts, rates and alert state
    pub fn snapshot(&self) -> MonitorSnapshot {
        let meter = self.counter.meter();
        MonitorSnapshot {
            name: self.name.clone(),
            event_type: self.event_type.clone(),
            total_count: meter.count(),
            one_minute_rate: meter.one_minute_rate(),
            five_minute_rate: meter.five_minute_rate(),
            fifteen_minute_rate: meter.fifteen_minute_rate(),
            min_five_minute_rate: self.tracker.min_five_minute_rate,
            initialized: meter.is_initialized(),
            alert_state: self.alert_state(),
        }
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("name", &self.name)
            .field("predicate", &self.predicate)
            .field("min_five_minute_rate", &self.tracker.min_five_minute_rate)
            .field("alert_state", &self.alert_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::{AlertKind, InMemoryAlerter};
    use chrono::Utc;
    use std::time::Duration;

    fn monitor(min_rate: f64, alerter: &Arc<InMemoryAlerter>) -> Monitor {
        Monitor::new(
            "ScorerHttpMonitor",
            &MonitorDefinition::new("HttpRequest", min_rate).starts_with("requestUri", "/v1/scorer/"),
            Scheduler::current().unwrap(),
            alerter.clone(),
        )
        .unwrap()
    }

    fn scorer_event() -> Event {
        Event::new("HttpRequest", "id", "host", Utc::now()).with_attribute("requestUri", "/v1/scorer/foo")
    }

    fn feed(monitor: &Monitor, n: usize) {
        for _ in 0..n {
            monitor.ingest(&scorer_event());
        }
    }

    fn kinds(alerter: &InMemoryAlerter) -> Vec<AlertKind> {
        alerter.history().into_iter().map(|r| r.kind).collect()
    }

    #[tokio::test]
    async fn test_counts_only_matching_events() {
        let alerter = Arc::new(InMemoryAlerter::new());
        let monitor = monitor(0.0, &alerter);

        feed(&monitor, 3);
        for _ in 0..7 {
            monitor.ingest(
                &Event::new("HttpRequest", "id", "host", Utc::now()).with_attribute("requestUri", "/other/path"),
            );
        }
        monitor.tick();

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.total_count, 3);
        assert!((snapshot.five_minute_rate - 3.0 / 5.0).abs() < 1e-9);
        assert!(snapshot.initialized);
    }

    #[tokio::test]
    async fn test_no_alert_before_first_tick() {
        let alerter = Arc::new(InMemoryAlerter::new());
        let monitor = monitor(1.0, &alerter);

        let snapshot = monitor.snapshot();
        assert!(!snapshot.initialized);
        assert_eq!(snapshot.alert_state, AlertState::Ok);
        assert!(alerter.history().is_empty());
    }

    #[tokio::test]
    async fn test_raise_and_clear_exactly_once() {
        let alerter = Arc::new(InMemoryAlerter::new());
        let monitor = monitor(1.0, &alerter);

        // 5 events per 5s tick is exactly 1/s
        feed(&monitor, 5);
        monitor.tick();
        assert_eq!(monitor.alert_state(), AlertState::Ok);

        for _ in 0..3 {
            monitor.tick();
        }
        assert_eq!(monitor.alert_state(), AlertState::Alerting);
        assert_eq!(kinds(&alerter), vec![AlertKind::Raised]);

        for _ in 0..5 {
            feed(&monitor, 100);
            monitor.tick();
        }
        assert_eq!(monitor.alert_state(), AlertState::Ok);
        assert_eq!(kinds(&alerter), vec![AlertKind::Raised, AlertKind::Cleared]);
        assert!(alerter.active().is_empty());
    }

    #[tokio::test]
    async fn test_rate_at_threshold_is_ok() {
        let alerter = Arc::new(InMemoryAlerter::new());
        let monitor = monitor(1.0, &alerter);

        feed(&monitor, 5);
        monitor.tick();

        assert_eq!(monitor.alert_state(), AlertState::Ok);
        assert!(alerter.history().is_empty());
    }

    #[tokio::test]
    async fn test_long_advance_raises_once() {
        let alerter = Arc::new(InMemoryAlerter::new());
        let monitor = monitor(1.0, &alerter);

        feed(&monitor, 1_000);
        monitor.tick();
        assert_eq!(monitor.alert_state(), AlertState::Ok);

        // roughly ten years of 5s ticks
        monitor.advance(63_000_000);

        assert_eq!(monitor.counter().meter().ticks(), 63_000_001);
        assert_eq!(monitor.snapshot().five_minute_rate, 0.0);
        assert_eq!(kinds(&alerter), vec![AlertKind::Raised]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_tick_ignored_while_started() {
        let alerter = Arc::new(InMemoryAlerter::new());
        let monitor = monitor(1.0, &alerter);
        monitor.start();

        monitor.tick();
        monitor.advance(10);
        assert_eq!(monitor.counter().meter().ticks(), 0);
        assert!(alerter.history().is_empty());

        monitor.stop();
        monitor.tick();
        assert_eq!(monitor.counter().meter().ticks(), 1);
    }

    struct FailingOnceSink {
        calls: std::sync::atomic::AtomicUsize,
        inner: InMemoryAlerter,
    }

    impl AlertSink for FailingOnceSink {
        fn raise(&self, monitor: &str) {
            if self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                panic!("sink unavailable");
            }
            self.inner.raise(monitor);
        }

        fn clear(&self, monitor: &str) {
            self.inner.clear(monitor);
        }
    }

    #[tokio::test]
    async fn test_panicking_sink_is_retried_on_next_tick() {
        let sink = Arc::new(FailingOnceSink {
            calls: std::sync::atomic::AtomicUsize::new(0),
            inner: InMemoryAlerter::new(),
        });
        let monitor = Monitor::new(
            "Prs",
            &MonitorDefinition::new("PrsMessage", 1.0),
            Scheduler::current().unwrap(),
            sink.clone(),
        )
        .unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| monitor.tick()));
        assert!(result.is_err());
        assert_eq!(monitor.alert_state(), AlertState::Ok);

        monitor.tick();
        assert_eq!(monitor.alert_state(), AlertState::Alerting);
        assert_eq!(sink.inner.active(), vec!["Prs".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_definition_is_rejected() {
        let result = Monitor::new(
            "broken",
            &MonitorDefinition::new("HttpRequest", -1.0),
            Scheduler::current().unwrap(),
            Arc::new(InMemoryAlerter::new()),
        );
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_tick_raises_alert() {
        let alerter = Arc::new(InMemoryAlerter::new());
        let monitor = monitor(1.0, &alerter);
        monitor.start();

        tokio::time::sleep(Duration::from_millis(5_500)).await;

        assert_eq!(monitor.counter().meter().ticks(), 1);
        assert_eq!(monitor.alert_state(), AlertState::Alerting);
        assert_eq!(alerter.active(), vec!["ScorerHttpMonitor".to_string()]);

        monitor.stop();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(monitor.counter().meter().ticks(), 1);
    }
}
