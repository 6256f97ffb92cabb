//! Event Bus: topic-addressed pub/sub plus the Log Broadcaster
//! specialization (ring buffer + batched publication).

mod bus;
mod log_broadcaster;

pub use bus::EventBus;
pub use log_broadcaster::LogBroadcaster;

use std::sync::Arc;

/// Spawn the Log Broadcaster's periodic flush as its own task.
pub fn spawn_log_flush_loop(bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(LogBroadcaster::batch_interval());
        loop {
            ticker.tick().await;
            bus.flush_logs();
        }
    })
}
