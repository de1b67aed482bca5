//! Consumers of published gauge values

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Receives numeric state published by the engine
pub trait NumericSink: Send + Sync {
    fn publish(&self, value: f64);

    /// Name used in the configuration dump
    fn name(&self) -> &str;
}

/// Which reading a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingKind {
    /// Rainfall status, scaled to a percentage-like value
    Rain,
    /// Raw realtime rain rate
    RealtimeRain,
}

impl ReadingKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ReadingKind::Rain => "rain",
            ReadingKind::RealtimeRain => "realtime_rain",
        }
    }
}

/// A published value
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Reading {
    pub kind: ReadingKind,
    pub value: f64,
}

/// Sinks wired to each output. Any of them may be empty.
#[derive(Clone, Default)]
pub struct Sinks {
    pub rain: Vec<Arc<dyn NumericSink>>,
    pub realtime_rain: Vec<Arc<dyn NumericSink>>,
}

impl Sinks {
    pub fn publish_rain(&self, value: f64) {
        for sink in &self.rain {
            sink.publish(value);
        }
    }

    pub fn publish_realtime_rain(&self, value: f64) {
        for sink in &self.realtime_rain {
            sink.publish(value);
        }
    }
}

/// Forwards values onto a broadcast channel as [`Reading`]s
pub struct BroadcastSink {
    kind: ReadingKind,
    tx: broadcast::Sender<Reading>,
}

impl BroadcastSink {
    #[must_use]
    pub fn new(kind: ReadingKind, tx: broadcast::Sender<Reading>) -> Self {
        Self { kind, tx }
    }
}

impl NumericSink for BroadcastSink {
    fn publish(&self, value: f64) {
        // No subscribers is fine
        let _ = self.tx.send(Reading {
            kind: self.kind,
            value,
        });
    }

    fn name(&self) -> &str {
        self.kind.name()
    }
}
