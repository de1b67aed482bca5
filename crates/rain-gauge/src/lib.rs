//! RS200 rain gauge engine
//!
//! Drives an RS200 optical rain gauge: connection supervision, the one-time
//! configuration sequence, periodic polling, and publishing of decoded
//! readings to attached sinks.

pub mod config;
pub mod engine;
pub mod error;
pub mod runner;
pub mod sink;
pub mod supervisor;
pub mod timer;

#[cfg(test)]
mod testing;

pub use config::GaugeConfig;
pub use engine::{GaugeStatus, RainGauge};
pub use error::GaugeError;
pub use sink::{BroadcastSink, NumericSink, Reading, ReadingKind, Sinks};
pub use supervisor::LinkState;
pub use timer::{IntervalScheduler, TimerFired, TimerHandle, Timers};
