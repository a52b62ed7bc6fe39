//! In-process topic bus behind the SSE endpoints.
//!
//! Topics are created lazily on first subscription. Publishing to a topic
//! nobody listens on is a no-op. Events only tell subscribers what to
//! re-read; a receiver that lags simply misses hints.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use swoppa_shared::events::MarketEvent;
use tokio::sync::broadcast;
use tracing::debug;

const TOPIC_CAPACITY: usize = 64;

#[derive(Clone, Default)]
pub struct EventBus {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<MarketEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<MarketEvent> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Returns the number of receivers the event reached.
    pub fn publish(&self, topic: &str, event: MarketEvent) -> usize {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = topics.get(topic) else {
            return 0;
        };
        let reached = sender.send(event).unwrap_or(0);
        debug!(topic, reached, "Event published");
        reached
    }

    /// Drop topics without receivers.
    pub fn prune(&self) -> usize {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let before = topics.len();
        topics.retain(|_, sender| sender.receiver_count() > 0);
        let removed = before - topics.len();
        if removed > 0 {
            debug!(removed, "Pruned idle event topics");
        }
        removed
    }

    #[cfg(test)]
    pub fn topic_count(&self) -> usize {
        self.topics.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
