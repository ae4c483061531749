//! Metadata-only inspection of a magnet link.

use std::sync::Arc;

use lodestone_events::{DownloadEvent, EventPublisher, EventSink};
use lodestone_torrent_core::{FileEntry, MagnetRequest, TorrentMetadata, TransferEngine};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::completion::CompletionReporter;
use crate::error::LifecycleResult;
use crate::lifecycle::LifecycleSettings;
use crate::resolver::{MetadataResolver, Resolution};
use crate::session::TorrentSession;

/// Metadata and file listing of a torrent that was not downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// Resolved metadata.
    pub metadata: TorrentMetadata,
    /// Files in torrent order.
    pub files: Vec<FileEntry>,
}

/// Non-error end of a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Metadata was resolved and the torrent removed again.
    Resolved(ProbeReport),
    /// Cancellation was requested first.
    Cancelled,
}

/// Resolves metadata, lists files, then removes the torrent without downloading it.
pub struct MetadataProbe<E: TransferEngine> {
    session: TorrentSession<E>,
    cancel: CancellationToken,
    settings: LifecycleSettings,
    events: EventPublisher,
}

impl<E: TransferEngine> MetadataProbe<E> {
    /// Probe owning a fresh session on `engine`.
    pub fn new(
        engine: Arc<E>,
        config: E::Config,
        settings: LifecycleSettings,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let session = TorrentSession::new(engine, config);
        let events = EventPublisher::new(session.id(), sink);
        Self {
            session,
            cancel: CancellationToken::new(),
            settings,
            events,
        }
    }

    /// Use `token` for cancellation instead of a private one.
    #[must_use]
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Inspect `request`. The session is torn down before this returns.
    ///
    /// # Errors
    ///
    /// Returns the resolver's errors, [`crate::LifecycleError::EngineQueryFailed`] when the files
    /// cannot be listed, and [`crate::LifecycleError::Engine`] when removal fails or the probe
    /// already ran.
    pub async fn run(&mut self, request: &MagnetRequest) -> LifecycleResult<ProbeOutcome> {
        let outcome = self.inspect(request).await;
        self.session.teardown().await;
        outcome
    }

    async fn inspect(&mut self, request: &MagnetRequest) -> LifecycleResult<ProbeOutcome> {
        let resolver =
            MetadataResolver::new(self.settings.metadata_timeout, self.settings.poll_interval);
        let metadata = match resolver
            .resolve(&mut self.session, request, &self.cancel, &self.events)
            .await?
        {
            Resolution::Resolved(metadata) => self.session.record_metadata(metadata).clone(),
            Resolution::Cancelled => return Ok(ProbeOutcome::Cancelled),
        };
        self.events
            .publish(DownloadEvent::MetadataResolved {
                metadata: metadata.clone(),
            })
            .await;

        let files = CompletionReporter
            .collect(self.session.handle()?, &metadata)
            .await?;
        self.session.remove_torrent().await?;
        info!(
            session_id = %self.session.id(),
            info_hash = %metadata.info_hash,
            files = files.len(),
            "probe finished; torrent removed"
        );
        Ok(ProbeOutcome::Resolved(ProbeReport { metadata, files }))
    }
}
