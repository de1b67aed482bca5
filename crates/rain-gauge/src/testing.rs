//! Fakes shared by the unit tests

use crate::sink::NumericSink;
use crate::timer::{TimerHandle, Timers};
use rs200_protocol::{FrameWriter, ProtocolError, RawFrame};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Timers that never fire on their own; tests drive them by hand
#[derive(Default)]
pub struct ManualTimers {
    next_id: u64,
    active: Vec<TimerHandle>,
    cancelled: Vec<TimerHandle>,
}

impl ManualTimers {
    pub fn active(&self) -> &[TimerHandle] {
        &self.active
    }

    pub fn cancelled(&self) -> &[TimerHandle] {
        &self.cancelled
    }
}

impl Timers for ManualTimers {
    fn set_interval(&mut self, name: &'static str, _period: Duration) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle::new(self.next_id, name);
        self.active.push(handle.clone());
        handle
    }

    fn cancel(&mut self, handle: &TimerHandle) -> bool {
        let Some(pos) = self.active.iter().position(|h| h == handle) else {
            return false;
        };
        self.cancelled.push(self.active.remove(pos));
        true
    }
}

/// Sink that remembers everything published to it
pub struct RecordingSink {
    name: &'static str,
    values: Mutex<Vec<f64>>,
}

impl RecordingSink {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            values: Mutex::new(Vec::new()),
        }
    }

    pub fn values(&self) -> Vec<f64> {
        self.values.lock().unwrap().clone()
    }
}

impl NumericSink for RecordingSink {
    fn publish(&self, value: f64) {
        self.values.lock().unwrap().push(value);
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Frame writer whose output stays readable after the engine moves into a task
#[derive(Clone, Default)]
pub struct SharedWriter(Arc<Mutex<Vec<RawFrame>>>);

impl SharedWriter {
    pub fn frames(&self) -> Vec<RawFrame> {
        self.0.lock().unwrap().clone()
    }
}

impl FrameWriter for SharedWriter {
    fn write_frame(&mut self, frame: &RawFrame) -> Result<(), ProtocolError> {
        self.0.lock().unwrap().push(*frame);
        Ok(())
    }
}
