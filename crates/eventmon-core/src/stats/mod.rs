//! Rate statistics: EWMA and the self-ticking counter built on it

mod counter;
mod ewma;

pub use counter::{CounterStat, RateMeter};
pub use ewma::{Ewma, TICK_INTERVAL};
