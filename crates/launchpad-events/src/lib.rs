use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

/// Topics the control plane fans events out on. Each has its own bounded
/// channel so a slow subscriber on one topic can't starve another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    LaunchProgress,
    Status,
    Gpu,
    Metrics,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::LaunchProgress => "launch_progress",
            Topic::Status => "status",
            Topic::Gpu => "gpu",
            Topic::Metrics => "metrics",
        }
    }

    pub fn all() -> [Topic; 4] {
        [Topic::LaunchProgress, Topic::Status, Topic::Gpu, Topic::Metrics]
    }
}

const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// A published event plus framing metadata. `dropped` is non-zero when this
/// event arrived after a lagging subscriber missed some number of prior
/// events on this topic.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub topic: &'static str,
    pub seq: u64,
    pub timestamp_ms: i64,
    pub dropped: u64,
    pub data: serde_json::Value,
}

struct TopicChannel {
    tx: broadcast::Sender<Envelope>,
    seq: AtomicU64,
}

/// Topic-based publish/subscribe internal to the control plane, exposed to
/// HTTP clients as Server-Sent Events.
pub struct EventBus {
    channels: HashMap<Topic, TopicChannel>,
}

impl EventBus {
    pub fn new() -> Self {
        let mut channels = HashMap::new();
        for topic in Topic::all() {
            let (tx, _rx) = broadcast::channel(DEFAULT_CHANNEL_CAPACITY);
            channels.insert(topic, TopicChannel { tx, seq: AtomicU64::new(0) });
        }
        Self { channels }
    }

    /// Publish `data` on `topic`. A no-op (data dropped) if there are no
    /// subscribers; publishers never block on slow subscribers.
    pub fn publish(&self, topic: Topic, data: serde_json::Value) {
        let channel = &self.channels[&topic];
        let seq = channel.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let envelope = Envelope {
            topic: topic.as_str(),
            seq,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            dropped: 0,
            data,
        };
        // Err(SendError) only when there are zero subscribers; that's fine.
        let _ = channel.tx.send(envelope);
    }

    pub fn subscribe(&self, topic: Topic) -> EventBusReceiver {
        EventBusReceiver {
            topic,
            rx: self.channels[&topic].tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.channels[&topic].tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedEventBus = Arc<EventBus>;

/// A single-topic receiver. Lagged delivery is recovered transparently: a
/// [`broadcast::error::RecvError::Lagged`] is folded into the next
/// successfully received envelope's `dropped` count rather than surfaced as
/// an error or disconnecting the subscriber.
pub struct EventBusReceiver {
    topic: Topic,
    rx: broadcast::Receiver<Envelope>,
}

impl EventBusReceiver {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub async fn recv(&mut self) -> Option<Envelope> {
        let mut dropped = 0u64;
        loop {
            match self.rx.recv().await {
                Ok(mut envelope) => {
                    envelope.dropped = dropped;
                    return Some(envelope);
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    dropped += n;
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
