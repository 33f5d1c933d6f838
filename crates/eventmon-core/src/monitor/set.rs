//! The full set of configured monitors

use std::sync::Arc;

use tracing::{debug, info};

use crate::alerting::AlertSink;
use crate::error::{Error, Result};
use crate::models::{Event, MonitorDefinitions, MonitorSnapshot};
use crate::scheduler::Scheduler;

use super::Monitor;

/// All monitors of the process, sharing one scheduler and one alert sink
#[derive(Debug)]
pub struct MonitorSet {
    monitors: Vec<Monitor>,
}

impl MonitorSet {
    /// Build every monitor, or none if any definition is invalid
    pub fn from_definitions(
        definitions: &MonitorDefinitions,
        scheduler: Scheduler,
        sink: Arc<dyn AlertSink>,
    ) -> Result<Self> {
        let monitors = definitions
            .iter()
            .map(|(name, definition)| Monitor::new(name, definition, scheduler.clone(), sink.clone()))
            .collect::<Result<Vec<_>>>()?;

        info!(count = monitors.len(), "Monitors configured");
        Ok(Self { monitors })
    }

    /// Number of monitors
    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    /// Whether no monitors are configured
    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Iterate over the monitors in name order
    pub fn iter(&self) -> impl Iterator<Item = &Monitor> {
        self.monitors.iter()
    }

    /// Look up a monitor by name
    pub fn get(&self, name: &str) -> Result<&Monitor> {
        self.monitors
            .iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| Error::not_found("monitor", name))
    }

    /// Offer one event to every monitor. Returns the number of monitors it matched.
    pub fn ingest(&self, event: &Event) -> usize {
        self.monitors.iter().filter(|m| m.ingest(event)).count()
    }

    /// Offer a batch of events. Returns the total number of matches.
    pub fn ingest_batch(&self, events: &[Event]) -> usize {
        let matches = events.iter().map(|e| self.ingest(e)).sum::<usize>();
        debug!(events = events.len(), matches, "Ingested batch");
        matches
    }

    /// Start scheduled ticking on every monitor
    pub fn start_all(&self) {
        for monitor in &self.monitors {
            monitor.start();
        }
    }

    /// Stop scheduled ticking on every monitor
    pub fn stop_all(&self) {
        for monitor in &self.monitors {
            monitor.stop();
        }
    }

    /// Tick every stopped monitor immediately; see [`Monitor::tick`]
    pub fn tick_all(&self) {
        for monitor in &self.monitors {
            monitor.tick();
        }
    }

    /// Apply `ticks` ticks to every stopped monitor; see [`Monitor::advance`]
    pub fn advance_all(&self, ticks: u64) {
        for monitor in &self.monitors {
            monitor.advance(ticks);
        }
    }

    /// Snapshots of every monitor in name order
    pub fn snapshots(&self) -> Vec<MonitorSnapshot> {
        self.monitors.iter().map(Monitor::snapshot).collect()
    }
}
