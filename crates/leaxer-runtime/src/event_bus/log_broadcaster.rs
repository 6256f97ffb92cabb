//! Log line ring buffer with 100ms batching before publication.
//!
//! Log lines arrive from synchronous stdout-reader contexts as well as
//! async tasks, so the ring buffer is guarded by a `std::sync::RwLock`
//! rather than a tokio one.

use std::collections::VecDeque;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use leaxer_core::events::AppEvent;
use leaxer_core::ports::EventBusPort;

const RING_CAPACITY: usize = 1000;
const BATCH_INTERVAL: Duration = Duration::from_millis(100);

/// Ring buffer of recent log lines plus a batching queue that flushes to
/// the bus on a 100ms timer.
pub struct LogBroadcaster {
    ring: RwLock<VecDeque<String>>,
    pending: Mutex<Vec<String>>,
}

impl LogBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ring: RwLock::new(VecDeque::with_capacity(RING_CAPACITY)),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Record a log line. Adds it to the ring immediately; queues it for
    /// the next batch flush rather than publishing synchronously.
    pub fn push(&self, line: String, _bus: &dyn EventBusPort) {
        {
            let mut ring = self.ring.write().expect("log ring lock poisoned");
            if ring.len() >= RING_CAPACITY {
                ring.pop_front();
            }
            ring.push_back(line.clone());
        }

        self.pending
            .lock()
            .expect("log pending lock poisoned")
            .push(line);
    }

    /// Flush any pending lines as a single publish per line, in arrival
    /// order. Intended to be called by a `tokio::time::interval` task
    /// owned by the bus.
    pub fn flush(&self, bus: &dyn EventBusPort) {
        let lines = {
            let mut pending = self.pending.lock().expect("log pending lock poisoned");
            std::mem::take(&mut *pending)
        };

        for line in lines {
            bus.publish(AppEvent::LogLine { line });
        }
    }

    /// Interval between batch flushes, for the owning task to schedule.
    #[must_use]
    pub const fn batch_interval() -> Duration {
        BATCH_INTERVAL
    }

    /// Return up to `count` most recent lines, newest last.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<String> {
        let ring = self.ring.read().expect("log ring lock poisoned");
        let len = ring.len();
        let skip = len.saturating_sub(count);
        ring.iter().skip(skip).cloned().collect()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::EventBus;

    #[test]
    fn ring_buffer_caps_at_capacity() {
        let broadcaster = LogBroadcaster::new();
        let bus = EventBus::new();
        for i in 0..(RING_CAPACITY + 10) {
            broadcaster.push(format!("line {i}"), &bus);
        }
        assert_eq!(broadcaster.recent(RING_CAPACITY + 10).len(), RING_CAPACITY);
    }

    #[test]
    fn recent_returns_newest_lines() {
        let broadcaster = LogBroadcaster::new();
        let bus = EventBus::new();
        for i in 0..5 {
            broadcaster.push(format!("line {i}"), &bus);
        }
        let recent = broadcaster.recent(2);
        assert_eq!(recent, vec!["line 3".to_string(), "line 4".to_string()]);
    }

    #[test]
    fn flush_publishes_and_drains_pending() {
        let broadcaster = LogBroadcaster::new();
        let bus = EventBus::new();
        broadcaster.push("a".to_string(), &bus);
        broadcaster.push("b".to_string(), &bus);
        broadcaster.flush(&bus);
        assert_eq!(broadcaster.recent(10).len(), 2);
    }
}
