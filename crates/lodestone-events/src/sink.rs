//! Destinations for published events.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::payloads::{DownloadEvent, EventEnvelope};

/// Receiver of event envelopes.
///
/// `emit` is awaited by the publisher before the session continues, so a slow sink slows the
/// polling loop instead of dropping events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one envelope.
    async fn emit(&self, envelope: EventEnvelope);
}

#[async_trait]
impl<T> EventSink for Arc<T>
where
    T: EventSink + ?Sized,
{
    async fn emit(&self, envelope: EventEnvelope) {
        (**self).emit(envelope).await;
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn emit(&self, _envelope: EventEnvelope) {}
}

/// Adapter that invokes a synchronous callback for each envelope.
pub struct CallbackSink<F> {
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: Fn(&EventEnvelope) + Send + Sync,
{
    /// Wrap a callback.
    pub const fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> EventSink for CallbackSink<F>
where
    F: Fn(&EventEnvelope) + Send + Sync,
{
    async fn emit(&self, envelope: EventEnvelope) {
        (self.callback)(&envelope);
    }
}

/// In-memory sink that keeps every envelope, mostly useful in tests and probes.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<EventEnvelope>>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every envelope received so far.
    #[must_use]
    pub fn envelopes(&self) -> Vec<EventEnvelope> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Copy of every event received so far, without envelopes.
    #[must_use]
    pub fn events(&self) -> Vec<DownloadEvent> {
        self.envelopes()
            .into_iter()
            .map(|envelope| envelope.event)
            .collect()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn emit(&self, envelope: EventEnvelope) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(envelope);
    }
}
