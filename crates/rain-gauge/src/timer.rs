//! Cancellable interval timers

use dashmap::DashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Handle to a scheduled interval, returned by [`Timers::set_interval`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    id: u64,
    name: &'static str,
}

impl TimerHandle {
    #[must_use]
    pub fn new(id: u64, name: &'static str) -> Self {
        Self { id, name }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Timer facility used by the supervision logic
pub trait Timers {
    /// Arm a recurring timer. The first firing happens one `period` from now.
    fn set_interval(&mut self, name: &'static str, period: Duration) -> TimerHandle;

    /// Cancel a timer. Returns `false` (and does nothing) if it was already
    /// cancelled or never existed.
    fn cancel(&mut self, handle: &TimerHandle) -> bool;
}

/// A timer firing delivered by [`IntervalScheduler`]
#[derive(Debug, Clone)]
pub struct TimerFired {
    pub handle: TimerHandle,
}

/// Tokio-backed [`Timers`] implementation
///
/// Each interval runs as its own task; firings arrive on the receiver
/// returned by [`IntervalScheduler::new`].
pub struct IntervalScheduler {
    /// Active timer tasks (keyed by handle id)
    timers: DashMap<u64, JoinHandle<()>>,
    next_id: u64,
    event_tx: mpsc::Sender<TimerFired>,
}

impl IntervalScheduler {
    /// Create a new scheduler and the receiver for its firings
    #[must_use]
    pub fn new() -> (Self, mpsc::Receiver<TimerFired>) {
        let (event_tx, event_rx) = mpsc::channel(16);
        let scheduler = Self {
            timers: DashMap::new(),
            next_id: 1,
            event_tx,
        };
        (scheduler, event_rx)
    }

    /// Get the number of active timers
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Timers for IntervalScheduler {
    fn set_interval(&mut self, name: &'static str, period: Duration) -> TimerHandle {
        let handle = TimerHandle::new(self.next_id, name);
        self.next_id += 1;

        let event_tx = self.event_tx.clone();
        let fired = handle.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;
                tracing::trace!("Timer {} fired", fired.name);
                if event_tx
                    .send(TimerFired {
                        handle: fired.clone(),
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        self.timers.insert(handle.id, task);
        tracing::debug!("Scheduled timer {} every {:?}", name, period);
        handle
    }

    fn cancel(&mut self, handle: &TimerHandle) -> bool {
        if let Some((_, task)) = self.timers.remove(&handle.id) {
            task.abort();
            tracing::debug!("Cancelled timer {}", handle.name);
            true
        } else {
            false
        }
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        // Abort all timer tasks
        for entry in self.timers.iter() {
            entry.value().abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_interval_fires_after_period() {
        let (mut scheduler, mut rx) = IntervalScheduler::new();
        let handle = scheduler.set_interval("reboot", Duration::from_secs(5));

        let start = tokio::time::Instant::now();
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.handle, handle);
        assert!(start.elapsed() >= Duration::from_secs(5));

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.handle.name(), "reboot");
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let (mut scheduler, mut rx) = IntervalScheduler::new();
        let handle = scheduler.set_interval("reboot", Duration::from_secs(5));
        assert_eq!(scheduler.active_count(), 1);

        assert!(scheduler.cancel(&handle));
        assert!(!scheduler.cancel(&handle));
        assert_eq!(scheduler.active_count(), 0);

        let next = tokio::time::timeout(Duration::from_secs(20), rx.recv()).await;
        assert!(next.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handles_are_unique() {
        let (mut scheduler, _rx) = IntervalScheduler::new();
        let first = scheduler.set_interval("reboot", Duration::from_secs(5));
        let second = scheduler.set_interval("reboot", Duration::from_secs(5));
        assert_ne!(first, second);
        assert_eq!(scheduler.active_count(), 2);
    }
}
