#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Event plumbing between the download lifecycle and presentation layers.
//!
//! The publisher stamps each event with a sequential identifier, the session id, and a
//! timestamp, then hands it to an [`EventSink`]. Sinks are awaited in order, so observers see
//! events exactly in the order the session produced them.

mod channel;
mod payloads;
mod sink;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use uuid::Uuid;

pub use channel::{ChannelSink, EventStream, channel};
pub use payloads::{DownloadEvent, EventEnvelope, EventId};
pub use sink::{CallbackSink, EventSink, MemorySink, NullSink};

/// Stamps events and forwards them to a sink.
#[derive(Clone)]
pub struct EventPublisher {
    session_id: Uuid,
    next_id: Arc<AtomicU64>,
    sink: Arc<dyn EventSink>,
}

impl EventPublisher {
    /// Publisher for the given session, forwarding into `sink`.
    pub fn new(session_id: Uuid, sink: Arc<dyn EventSink>) -> Self {
        Self {
            session_id,
            next_id: Arc::new(AtomicU64::new(1)),
            sink,
        }
    }

    /// Publisher that discards every event.
    #[must_use]
    pub fn disabled(session_id: Uuid) -> Self {
        Self::new(session_id, Arc::new(NullSink))
    }

    /// Session the publisher stamps onto envelopes.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Publish an event, returning its identifier once the sink accepted it.
    pub async fn publish(&self, event: DownloadEvent) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            session_id: self.session_id,
            timestamp: Utc::now(),
            event,
        };
        self.sink.emit(envelope).await;
        id
    }
}
