//! Connection supervision for the RS200
//!
//! The module only answers once it has booted, so the engine keeps probing
//! for the firmware version on a recurring timer until a response arrives.
//! `boot_count` tracks progress:
//!
//! - `0`: not yet probed
//! - negative: probing, magnitude is the number of unanswered ticks
//! - positive: connected
//!
//! Once the magnitude exceeds the retry limit the component is failed for good.

use crate::error::GaugeError;
use crate::timer::TimerHandle;
use serde::Serialize;

/// Name of the recurring version-probe timer
pub const REBOOT_TIMER: &str = "reboot";

/// Default number of unanswered probes tolerated before giving up
pub const DEFAULT_MAX_FAILED_PROBES: u16 = 5;

/// Externally visible connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Unprobed,
    Probing,
    Connected,
    Failed,
}

/// What the engine should do after a reboot timer tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Probe again
    Retry { attempts: u16 },
    /// Probe one last time, then report the device as failed
    GiveUp { attempts: u16 },
    /// Tick arrived after connection or failure
    Ignored,
}

/// Boot/connection state machine
#[derive(Debug)]
pub struct Supervisor {
    boot_count: i16,
    max_failed_probes: u16,
    failed: bool,
    reboot_timer: Option<TimerHandle>,
}

impl Supervisor {
    #[must_use]
    pub fn new(max_failed_probes: u16) -> Self {
        Self {
            boot_count: 0,
            max_failed_probes,
            failed: false,
            reboot_timer: None,
        }
    }

    /// Start supervising with a freshly armed reboot timer
    pub fn arm(&mut self, handle: TimerHandle) {
        self.boot_count = 0;
        self.reboot_timer = Some(handle);
    }

    /// Whether `handle` is the reboot timer currently being supervised
    #[must_use]
    pub fn owns(&self, handle: &TimerHandle) -> bool {
        self.reboot_timer.as_ref() == Some(handle)
    }

    /// Hand over the reboot timer for cancellation. Yields it at most once.
    pub fn take_timer(&mut self) -> Option<TimerHandle> {
        self.reboot_timer.take()
    }

    /// Account for one reboot timer tick without a version response
    pub fn on_tick(&mut self) -> TickOutcome {
        if self.failed || self.boot_count > 0 {
            return TickOutcome::Ignored;
        }

        if self.boot_count < 0 {
            tracing::warn!(
                "{}",
                GaugeError::HandshakeTimeout {
                    attempts: self.failed_probes()
                }
            );
        }

        self.boot_count = self.boot_count.saturating_sub(1);
        let attempts = self.failed_probes();

        if attempts > self.max_failed_probes {
            self.failed = true;
            TickOutcome::GiveUp { attempts }
        } else {
            TickOutcome::Retry { attempts }
        }
    }

    /// Record a firmware version response.
    ///
    /// Returns `true` only for the first response since setup, i.e. when the
    /// configuration sequence should run.
    pub fn on_handshake(&mut self) -> bool {
        if self.failed || self.boot_count > 0 {
            return false;
        }
        self.boot_count = 1;
        true
    }

    #[must_use]
    pub fn boot_count(&self) -> i16 {
        self.boot_count
    }

    /// Consecutive unanswered probes
    #[must_use]
    pub fn failed_probes(&self) -> u16 {
        if self.boot_count < 0 {
            self.boot_count.unsigned_abs()
        } else {
            0
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.failed && self.boot_count > 0
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    #[must_use]
    pub fn state(&self) -> LinkState {
        if self.failed {
            LinkState::Failed
        } else if self.boot_count > 0 {
            LinkState::Connected
        } else if self.boot_count < 0 {
            LinkState::Probing
        } else {
            LinkState::Unprobed
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAILED_PROBES)
    }
}
