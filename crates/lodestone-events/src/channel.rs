//! Bounded, order-preserving event channel.
//!
//! Unlike a broadcast bus this channel never drops events: once the buffer is full the
//! publisher waits for the consumer.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::payloads::EventEnvelope;
use crate::sink::EventSink;

/// Create a connected sink/stream pair with the given buffer size.
///
/// # Panics
///
/// Panics if `capacity` is zero.
#[must_use]
pub fn channel(capacity: usize) -> (ChannelSink, EventStream) {
    assert!(capacity > 0, "event channel capacity must be positive");
    let (sender, receiver) = mpsc::channel(capacity);
    (ChannelSink { sender }, EventStream { receiver })
}

/// Sending half of [`channel`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<EventEnvelope>,
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, envelope: EventEnvelope) {
        let id = envelope.id;
        if self.sender.send(envelope).await.is_err() {
            debug!(event_id = id, "event stream closed; dropping event");
        }
    }
}

/// Receiving half of [`channel`].
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::Receiver<EventEnvelope>,
}

impl EventStream {
    /// Receive the next envelope; `None` once every sink has been dropped.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        self.receiver.recv().await
    }
}
