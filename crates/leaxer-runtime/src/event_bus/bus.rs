//! Topic-addressed pub/sub over `AppEvent`.

use std::collections::HashMap;

use async_trait::async_trait;
use leaxer_core::events::{AppEvent, Topic};
use leaxer_core::ports::EventBusPort;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use super::log_broadcaster::LogBroadcaster;

const CHANNEL_CAPACITY: usize = 256;

/// Event bus with one broadcast channel per topic, built once at
/// construction over the closed topic set (`Topic::ALL`) rather than a
/// dynamically growing map.
pub struct EventBus {
    senders: HashMap<Topic, broadcast::Sender<AppEvent>>,
    log_broadcaster: LogBroadcaster,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let senders = Topic::ALL
            .iter()
            .map(|&topic| (topic, broadcast::channel(CHANNEL_CAPACITY).0))
            .collect();

        Self {
            senders,
            log_broadcaster: LogBroadcaster::new(),
        }
    }

    /// Queue a log line for batched publication on the `LogsStream` topic.
    pub fn push_log_line(&self, line: String) {
        self.log_broadcaster.push(line, self);
    }

    /// Flush any batched log lines, publishing one `AppEvent::LogLine`
    /// per line. Called by the periodic flush task.
    pub fn flush_logs(&self) {
        self.log_broadcaster.flush(self);
    }

    fn sender_for(&self, topic: Topic) -> &broadcast::Sender<AppEvent> {
        self.senders
            .get(&topic)
            .expect("Topic::ALL and the sender map are built from the same set")
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBusPort for EventBus {
    fn publish(&self, event: AppEvent) -> usize {
        let topic = event.topic();
        let sender = self.sender_for(topic);

        if sender.receiver_count() == 0 {
            return 0;
        }

        debug!(?topic, "publishing event");
        sender.send(event).unwrap_or(0)
    }

    fn subscribe(&self, topic: Topic) -> BroadcastStream<AppEvent> {
        BroadcastStream::new(self.sender_for(topic).subscribe())
    }

    fn recent_logs(&self, count: usize) -> Vec<String> {
        self.log_broadcaster.recent(count)
    }
}
