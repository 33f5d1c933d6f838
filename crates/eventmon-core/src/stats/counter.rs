//! Counter with one, five and fifteen minute decayed rates
//!
//! The numbers live in a [`RateMeter`] shared with the schedule entry; the
//! [`CounterStat`] owns that entry and guards start/stop with its own lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::scheduler::{ScheduledTask, Scheduler};

use super::ewma::{Ewma, TICK_INTERVAL};

const ONE_SECOND: Duration = Duration::from_secs(1);

/// Total count plus three decayed rates. Lock-free on every path.
#[derive(Debug)]
pub struct RateMeter {
    count: AtomicU64,
    ticks: AtomicU64,
    one_minute: Ewma,
    five_minute: Ewma,
    fifteen_minute: Ewma,
}

impl RateMeter {
    fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            one_minute: Ewma::one_minute(),
            five_minute: Ewma::five_minute(),
            fifteen_minute: Ewma::fifteen_minute(),
        }
    }

    /// Add `n` events to the total and to every rate
    pub fn update(&self, n: u64) {
        self.one_minute.update(n);
        self.five_minute.update(n);
        self.fifteen_minute.update(n);
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    /// Decay all three rates, always in 1m, 5m, 15m order
    pub fn tick(&self) {
        self.one_minute.tick();
        self.five_minute.tick();
        self.fifteen_minute.tick();
        self.ticks.fetch_add(1, Ordering::Release);
    }

    /// Apply `ticks` ticks at once; see [`Ewma::tick_many`]
    pub fn tick_many(&self, ticks: u64) {
        self.one_minute.tick_many(ticks);
        self.five_minute.tick_many(ticks);
        self.fifteen_minute.tick_many(ticks);
        self.ticks.fetch_add(ticks, Ordering::Release);
    }

    /// Total events ever recorded
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Number of ticks applied so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Whether the rates hold at least one sample
    pub fn is_initialized(&self) -> bool {
        self.ticks() > 0
    }

    /// One minute rate in events per second
    pub fn one_minute_rate(&self) -> f64 {
        self.one_minute.rate(ONE_SECOND)
    }

    /// Five minute rate in events per second
    pub fn five_minute_rate(&self) -> f64 {
        self.five_minute.rate(ONE_SECOND)
    }

    /// Fifteen minute rate in events per second
    pub fn fifteen_minute_rate(&self) -> f64 {
        self.fifteen_minute.rate(ONE_SECOND)
    }
}

/// A self-ticking event counter.
///
/// `update` and `tick` never block. `start` and `stop` are idempotent and
/// serialized by a lock that is only held while installing or removing the
/// schedule entry.
#[derive(Debug)]
pub struct CounterStat {
    name: String,
    meter: Arc<RateMeter>,
    scheduler: Scheduler,
    task: Mutex<Option<ScheduledTask>>,
}

impl CounterStat {
    /// Create a stopped counter that will tick on `scheduler` once started
    pub fn new(name: impl Into<String>, scheduler: Scheduler) -> Self {
        Self {
            name: name.into(),
            meter: Arc::new(RateMeter::new()),
            scheduler,
            task: Mutex::new(None),
        }
    }

    /// Begin ticking every 5 seconds, after an initial 5 second delay
    pub fn start(&self) {
        self.start_with(|_| {});
    }

    /// Like [`CounterStat::start`], running `after_tick` after every scheduled tick
    pub(crate) fn start_with<F>(&self, after_tick: F)
    where
        F: Fn(&RateMeter) + Send + Sync + 'static,
    {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let meter = self.meter.clone();
        *task = Some(self.scheduler.schedule_at_fixed_rate(
            self.name.clone(),
            TICK_INTERVAL,
            TICK_INTERVAL,
            move || {
                meter.tick();
                after_tick(&meter);
            },
        ));
        debug!(counter = %self.name, "Counter started");
    }

    /// Cancel scheduled ticking. Safe before `start` and when already stopped.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            drop(task);
            debug!(counter = %self.name, "Counter stopped");
        }
    }

    /// Whether a schedule entry is installed
    pub fn is_started(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Add `n` events
    pub fn update(&self, n: u64) {
        self.meter.update(n);
    }

    /// Tick all three rates immediately, outside the schedule.
    ///
    /// Only one owner may tick at a time: call this while the counter is
    /// stopped, or use [`CounterStat::try_tick`].
    pub fn tick(&self) {
        self.meter.tick();
    }

    /// Apply `ticks` ticks now unless a schedule entry owns ticking.
    ///
    /// The start/stop lock is held while ticking, so the counter cannot be
    /// started concurrently. Returns whether the ticks were applied.
    pub fn try_tick(&self, ticks: u64) -> bool {
        let task = self.task.lock();
        if task.is_some() {
            return false;
        }
        self.meter.tick_many(ticks);
        true
    }

    /// The shared numbers behind this counter
    pub fn meter(&self) -> &RateMeter {
        &self.meter
    }

    /// Total events ever recorded
    pub fn count(&self) -> u64 {
        self.meter.count()
    }

    /// One minute rate in events per second
    pub fn one_minute_rate(&self) -> f64 {
        self.meter.one_minute_rate()
    }

    /// Five minute rate in events per second
    pub fn five_minute_rate(&self) -> f64 {
        self.meter.five_minute_rate()
    }

    /// Fifteen minute rate in events per second
    pub fn fifteen_minute_rate(&self) -> f64 {
        self.meter.fifteen_minute_rate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[tokio::test]
    async fn test_update_then_tick() {
        let counter = CounterStat::new("test", Scheduler::current().unwrap());
        counter.update(3);

        assert_eq!(counter.count(), 3);
        assert_eq!(counter.five_minute_rate(), 0.0);

        counter.tick();
        assert_eq!(counter.count(), 3);
        assert_close(counter.one_minute_rate(), 0.6);
        assert_close(counter.five_minute_rate(), 0.6);
        assert_close(counter.fifteen_minute_rate(), 0.6);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let counter = CounterStat::new("test", Scheduler::current().unwrap());
        counter.stop();
        counter.stop();
        assert!(!counter.is_started());
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_tick_defers_to_schedule() {
        let counter = CounterStat::new("test", Scheduler::current().unwrap());
        counter.update(10);
        assert!(counter.try_tick(3));
        assert_eq!(counter.meter().ticks(), 3);

        counter.start();
        assert!(!counter.try_tick(1));
        assert_eq!(counter.meter().ticks(), 3);

        counter.stop();
        assert!(counter.try_tick(1));
        assert_eq!(counter.meter().ticks(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_ticks() {
        let counter = CounterStat::new("test", Scheduler::current().unwrap());
        counter.start();
        counter.start();
        assert!(counter.is_started());

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(counter.meter().ticks(), 0);

        tokio::time::sleep(Duration::from_millis(10_200)).await;
        assert_eq!(counter.meter().ticks(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_then_restart() {
        let scheduler = Scheduler::current().unwrap();
        let stopped = CounterStat::new("stopped", scheduler.clone());
        let running = CounterStat::new("running", scheduler);
        stopped.start();
        running.start();

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(stopped.meter().ticks(), 1);

        stopped.stop();
        stopped.update(7);
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(stopped.meter().ticks(), 1);
        assert_eq!(stopped.five_minute_rate(), 0.0);
        assert_eq!(running.meter().ticks(), 5);

        stopped.start();
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(stopped.meter().ticks(), 2);
        assert!(stopped.five_minute_rate() > 0.0);
    }
}
