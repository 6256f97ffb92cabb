//! Event Bus port.

use async_trait::async_trait;
use tokio_stream::wrappers::BroadcastStream;

use crate::events::{AppEvent, Topic};

/// Topic-addressed publish/subscribe with no delivery durability beyond
/// what an individual subscription keeps buffered.
#[async_trait]
pub trait EventBusPort: Send + Sync {
    /// Publish fire-and-forget; returns the number of active
    /// subscribers that received it (mirrors `broadcast::Sender::send`).
    fn publish(&self, event: AppEvent) -> usize;

    /// Subscribe to a single topic. Events published before this call
    /// are not delivered, except via the Log Broadcaster's ring buffer.
    fn subscribe(&self, topic: Topic) -> BroadcastStream<AppEvent>;

    /// Most recent log lines, used to seed a new subscriber to
    /// `Topic::LogsStream`.
    fn recent_logs(&self, count: usize) -> Vec<String>;
}
