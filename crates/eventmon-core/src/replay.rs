//! Offline replay of recorded events
//!
//! Drives a [`MonitorSet`] from event timestamps instead of the wall clock:
//! every time event time crosses a tick boundary all monitors are ticked,
//! once per elapsed interval, so recorded traffic can be checked against
//! monitor definitions without waiting for real time to pass. A gap spanning
//! many intervals is applied in one step.

use std::io::BufRead;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{Event, MonitorSnapshot};
use crate::monitor::MonitorSet;
use crate::stats::TICK_INTERVAL;

/// Summary of a replay run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Events replayed
    pub events: usize,
    /// Events skipped because they were older than the current interval
    pub out_of_order: usize,
    /// Ticks applied to every monitor
    pub ticks: u64,
    /// Total (event, monitor) matches
    pub matches: usize,
    /// Monitor state after the final tick
    pub snapshots: Vec<MonitorSnapshot>,
}

/// Feeds time-ordered events into monitors, ticking on event time
pub struct Replayer<'a> {
    monitors: &'a MonitorSet,
    interval: chrono::Duration,
    window_start: Option<DateTime<Utc>>,
    events: usize,
    out_of_order: usize,
    ticks: u64,
    matches: usize,
}

impl<'a> Replayer<'a> {
    /// Create a replayer over `monitors`
    pub fn new(monitors: &'a MonitorSet) -> Self {
        Self {
            monitors,
            interval: chrono::Duration::seconds(TICK_INTERVAL.as_secs() as i64),
            window_start: None,
            events: 0,
            out_of_order: 0,
            ticks: 0,
            matches: 0,
        }
    }

    /// Replay one event
    pub fn push(&mut self, event: &Event) {
        let window_start = *self.window_start.get_or_insert(event.timestamp);

        if event.timestamp < window_start {
            warn!(id = %event.id, timestamp = %event.timestamp, "Skipping out-of-order event");
            self.out_of_order += 1;
            return;
        }

        let interval_ms = self.interval.num_milliseconds();
        let elapsed = (event.timestamp - window_start).num_milliseconds() / interval_ms;
        if elapsed > 0 {
            self.advance(elapsed.unsigned_abs());
            self.window_start = Some(window_start + chrono::Duration::milliseconds(elapsed * interval_ms));
        }

        self.events += 1;
        self.matches += self.monitors.ingest(event);
    }

    /// Replay newline-delimited JSON events; blank lines are ignored
    pub fn push_ndjson<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: Event = serde_json::from_str(&line)?;
            self.push(&event);
        }
        Ok(())
    }

    /// Tick the trailing interval and report
    pub fn finish(mut self) -> ReplayReport {
        if self.window_start.is_some() {
            self.advance(1);
        }

        ReplayReport {
            events: self.events,
            out_of_order: self.out_of_order,
            ticks: self.ticks,
            matches: self.matches,
            snapshots: self.monitors.snapshots(),
        }
    }

    fn advance(&mut self, ticks: u64) {
        self.monitors.advance_all(ticks);
        self.ticks += ticks;
        debug!(ticks, total = self.ticks, "Replay ticks");
    }
}
