//! Process-wide periodic scheduler
//!
//! Every counter in the process schedules its decay ticks here. Each schedule
//! entry is a lightweight tokio task on one shared runtime, so the thread
//! count stays flat no matter how many monitors are configured.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error};

use crate::error::{Error, Result};

#[cfg(panic = "abort")]
compile_error!("eventmon isolates panicking ticks with catch_unwind and must be built with panic = \"unwind\"");

/// Shared handle used to install periodic tasks
#[derive(Debug, Clone)]
pub struct Scheduler {
    handle: Handle,
}

impl Scheduler {
    /// Use the tokio runtime the caller is running on
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| Error::Scheduler(e.to_string()))?;
        Ok(Self { handle })
    }

    /// Use an explicit runtime handle
    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Run `task` every `period`, starting after `initial_delay`.
    ///
    /// Ticks that fall behind are delayed rather than replayed in a burst.
    /// A panic inside `task` is logged and the schedule continues.
    pub fn schedule_at_fixed_rate<F>(
        &self,
        name: impl Into<String>,
        initial_delay: Duration,
        period: Duration,
        task: F,
    ) -> ScheduledTask
    where
        F: Fn() + Send + Sync + 'static,
    {
        let name = name.into();
        let task_name = name.clone();

        let join = self.handle.spawn(async move {
            let mut ticker = interval_at(Instant::now() + initial_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if catch_unwind(AssertUnwindSafe(&task)).is_err() {
                    error!(task = %task_name, "Scheduled task panicked");
                }
            }
        });

        debug!(task = %name, ?period, "Installed schedule entry");

        ScheduledTask {
            name,
            abort: join.abort_handle(),
        }
    }
}

/// A recurring schedule entry. Dropping it cancels the schedule.
#[derive(Debug)]
pub struct ScheduledTask {
    name: String,
    abort: AbortHandle,
}

impl ScheduledTask {
    /// Name the entry was installed under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cancel future runs without waiting for an in-flight run to finish
    pub fn cancel(&self) {
        if !self.abort.is_finished() {
            debug!(task = %self.name, "Removed schedule entry");
        }
        self.abort.abort();
    }

    /// Whether the entry is no longer scheduled
    pub fn is_cancelled(&self) -> bool {
        self.abort.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_current_requires_runtime() {
        let err = Scheduler::current().unwrap_err();
        assert!(matches!(err, Error::Scheduler(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_after_initial_delay_then_periodically() {
        let scheduler = Scheduler::current().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let _task = scheduler.schedule_at_fixed_rate(
            "test",
            Duration::from_secs(5),
            Duration::from_secs(5),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_task_keeps_schedule_alive() {
        let scheduler = Scheduler::current().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let task = scheduler.schedule_at_fixed_rate(
            "flaky",
            Duration::from_secs(1),
            Duration::from_secs(1),
            move || {
                let run = counter.fetch_add(1, Ordering::SeqCst);
                if run == 0 {
                    panic!("first run fails");
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert!(!task.is_cancelled());
    }

    #[test]
    fn test_release_profile_keeps_unwinding() {
        let manifest = include_str!("../../../Cargo.toml");
        let release = manifest
            .split("[profile.release]")
            .nth(1)
            .expect("release profile");
        let release = release.split("\n[").next().unwrap_or(release);
        assert!(!release.contains("panic"), "release profile must unwind: {release}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_task_cancels_schedule() {
        let scheduler = Scheduler::current().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let task = scheduler.schedule_at_fixed_rate(
            "dropped",
            Duration::from_secs(1),
            Duration::from_secs(1),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        drop(task);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
