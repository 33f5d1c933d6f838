//! Exponentially-weighted moving average
//!
//! Equivalent in shape to the UNIX load average: events are accumulated
//! between ticks, and every tick folds the instantaneous rate of the last
//! interval into the running estimate with a fixed smoothing constant.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Nominal period between two ticks of every EWMA built by the named constructors
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Smoothing constant for a window of `minutes`, given the nominal tick interval
fn alpha_for_window(minutes: f64) -> f64 {
    1.0 - (-TICK_INTERVAL.as_secs_f64() / 60.0 / minutes).exp()
}

/// An exponentially-weighted moving average of an event rate.
///
/// `update` may be called from any number of threads concurrently with a
/// `tick`. `tick` itself must have a single owner per instance.
#[derive(Debug)]
pub struct Ewma {
    alpha: f64,
    interval_nanos: f64,
    /// Current rate in events per nanosecond, stored as `f64` bits
    rate: AtomicU64,
    initialized: AtomicBool,
    uncounted: AtomicU64,
}

impl Ewma {
    /// Create an EWMA with a specific smoothing constant and expected tick interval.
    ///
    /// Panics unless `alpha` is in `(0, 1]` and `interval` is non-zero.
    pub fn new(alpha: f64, interval: Duration) -> Self {
        assert!(alpha > 0.0 && alpha <= 1.0, "alpha must be in (0, 1], got {alpha}");
        assert!(!interval.is_zero(), "tick interval must be non-zero");

        Self {
            alpha,
            interval_nanos: interval.as_nanos() as f64,
            rate: AtomicU64::new(0f64.to_bits()),
            initialized: AtomicBool::new(false),
            uncounted: AtomicU64::new(0),
        }
    }

    /// EWMA equivalent to the UNIX one minute load average, ticked every 5 seconds
    pub fn one_minute() -> Self {
        Self::new(alpha_for_window(1.0), TICK_INTERVAL)
    }

    /// EWMA equivalent to the UNIX five minute load average, ticked every 5 seconds
    pub fn five_minute() -> Self {
        Self::new(alpha_for_window(5.0), TICK_INTERVAL)
    }

    /// EWMA equivalent to the UNIX fifteen minute load average, ticked every 5 seconds
    pub fn fifteen_minute() -> Self {
        Self::new(alpha_for_window(15.0), TICK_INTERVAL)
    }

    /// Smoothing constant
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Record `n` new events; they are folded into the rate on the next tick
    pub fn update(&self, n: u64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    /// Mark the passage of one interval and decay the current rate
    pub fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::AcqRel);
        let instant_rate = count as f64 / self.interval_nanos;

        let rate = if self.initialized.load(Ordering::Acquire) {
            let current = self.raw_rate();
            current + self.alpha * (instant_rate - current)
        } else {
            instant_rate
        };

        self.rate.store(rate.to_bits(), Ordering::Release);
        self.initialized.store(true, Ordering::Release);
    }

    /// Apply `ticks` ticks at once.
    ///
    /// Events pending now are folded into the first tick. The remaining ticks
    /// decay the rate in closed form, as if no events arrived during them.
    pub fn tick_many(&self, ticks: u64) {
        if ticks == 0 {
            return;
        }
        self.tick();

        if ticks > 1 {
            let decay = (1.0 - self.alpha).powf((ticks - 1) as f64);
            let rate = self.raw_rate() * decay;
            self.rate.store(rate.to_bits(), Ordering::Release);
        }
    }

    /// Whether at least one tick has happened
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Rate expressed as events per `unit` of time
    pub fn rate(&self, unit: Duration) -> f64 {
        self.raw_rate() * unit.as_nanos() as f64
    }

    fn raw_rate(&self) -> f64 {
        f64::from_bits(self.rate.load(Ordering::Acquire))
    }
}
