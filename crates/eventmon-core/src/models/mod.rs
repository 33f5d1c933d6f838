//! Data models for EventMon

mod event;
mod monitor;

pub use event::*;
pub use monitor::*;
