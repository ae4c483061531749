//! Download lifecycle state machine.
//!
//! # Design
//! - `Created → ResolvingMetadata → Downloading → {Completed | Cancelled | Failed}`.
//! - Every transition publishes `PhaseChanged`; every terminal outcome publishes exactly one
//!   terminal event and is returned exactly once.
//! - Failure and cancellation tear the session down before the state settles. Completion
//!   lists files first, then tears down.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lodestone_config::{DEFAULT_METADATA_TIMEOUT, DEFAULT_POLL_INTERVAL, DownloaderSettings};
use lodestone_events::{DownloadEvent, EventPublisher, EventSink};
use lodestone_torrent_core::{
    DownloadResult, FailureReason, LifecycleState, MagnetRequest, TransferEngine,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::completion::CompletionReporter;
use crate::error::{LifecycleError, LifecycleResult};
use crate::monitor::{MonitorExit, ProgressMonitor};
use crate::resolver::{MetadataResolver, Resolution};
use crate::session::TorrentSession;

/// Timing knobs for a lifecycle run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleSettings {
    /// Upper bound on metadata resolution.
    pub metadata_timeout: Duration,
    /// Cadence of both polling loops.
    pub poll_interval: Duration,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl From<&DownloaderSettings> for LifecycleSettings {
    fn from(settings: &DownloaderSettings) -> Self {
        Self {
            metadata_timeout: settings.metadata_timeout,
            poll_interval: settings.poll_interval,
        }
    }
}

/// Non-error end of a lifecycle run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The payload is complete.
    Completed(DownloadResult),
    /// The run stopped on an external signal.
    Cancelled,
}

/// Drives one magnet download from submission to a terminal state.
pub struct LifecycleController<E: TransferEngine> {
    session: TorrentSession<E>,
    state: LifecycleState,
    cancel: CancellationToken,
    settings: LifecycleSettings,
    events: EventPublisher,
}

impl<E: TransferEngine> LifecycleController<E> {
    /// Controller owning a fresh session on `engine`, publishing into `sink`.
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
            state: LifecycleState::Created,
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

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Identifier stamped onto logs and events.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session.id()
    }

    /// Token that cancels the run when triggered.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the download to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] unless called from `Created` before
    /// [`Self::shutdown`]. Any other
    /// error has already moved the controller to a terminal state and torn the session down.
    pub async fn start(&mut self, request: &MagnetRequest) -> LifecycleResult<DownloadOutcome> {
        if self.state != LifecycleState::Created || self.session.is_torn_down() {
            return Err(LifecycleError::InvalidTransition {
                from: self.state,
                operation: "start",
            });
        }
        info!(
            session_id = %self.session.id(),
            destination = %request.destination.display(),
            "download session starting"
        );
        self.transition(LifecycleState::ResolvingMetadata).await;

        let resolver =
            MetadataResolver::new(self.settings.metadata_timeout, self.settings.poll_interval);
        let resolved = resolver
            .resolve(&mut self.session, request, &self.cancel, &self.events)
            .await;
        let metadata = match resolved {
            Ok(Resolution::Resolved(metadata)) => self.session.record_metadata(metadata).clone(),
            Ok(Resolution::Cancelled) => return Ok(self.settle_cancelled().await),
            Err(err) => return Err(self.settle_failed(err).await),
        };
        self.events
            .publish(DownloadEvent::MetadataResolved {
                metadata: metadata.clone(),
            })
            .await;
        self.transition(LifecycleState::Downloading).await;

        let monitor = ProgressMonitor::new(self.settings.poll_interval);
        let monitored = match self.session.handle() {
            Ok(handle) => monitor.run(handle, &self.cancel, &self.events).await,
            Err(err) => Err(err),
        };
        match monitored {
            Ok(MonitorExit::Completed(_)) => {}
            Ok(MonitorExit::Cancelled) => return Ok(self.settle_cancelled().await),
            Err(err) => return Err(self.settle_failed(err).await),
        }

        let files = match self.session.handle() {
            Ok(handle) => CompletionReporter.collect(handle, &metadata).await,
            Err(err) => Err(err),
        };
        let save_path = self
            .session
            .save_path()
            .map_or_else(|| request.destination.clone(), PathBuf::from);
        self.transition(LifecycleState::Completed).await;
        self.session.teardown().await;

        match files {
            Ok(files) => {
                let result = DownloadResult {
                    metadata,
                    files,
                    save_path,
                };
                info!(
                    session_id = %self.session.id(),
                    files = result.files.len(),
                    bytes = result.total_size(),
                    "download completed"
                );
                self.events
                    .publish(DownloadEvent::Completed {
                        result: result.clone(),
                    })
                    .await;
                Ok(DownloadOutcome::Completed(result))
            }
            Err(err) => {
                warn!(
                    session_id = %self.session.id(),
                    error = %err.detail(),
                    "download completed but files could not be listed"
                );
                self.events
                    .publish(DownloadEvent::Failed {
                        reason: FailureReason::EngineQueryFailed,
                        message: err.detail(),
                    })
                    .await;
                Err(err)
            }
        }
    }

    /// Cancel any run in progress and tear the session down. Safe from any state and
    /// idempotent.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        self.session.teardown().await;
    }

    async fn transition(&mut self, next: LifecycleState) {
        let from = self.state;
        if !from.can_transition_to(next) {
            warn!(
                session_id = %self.session.id(),
                from = %from,
                to = %next,
                "unexpected lifecycle transition"
            );
        }
        self.state = next;
        info!(session_id = %self.session.id(), from = %from, to = %next, "lifecycle transition");
        self.events
            .publish(DownloadEvent::PhaseChanged { from, to: next })
            .await;
    }

    async fn settle_cancelled(&mut self) -> DownloadOutcome {
        self.session.teardown().await;
        self.transition(LifecycleState::Cancelled).await;
        self.events.publish(DownloadEvent::Cancelled).await;
        DownloadOutcome::Cancelled
    }

    async fn settle_failed(&mut self, err: LifecycleError) -> LifecycleError {
        self.session.teardown().await;
        let reason = err.reason().unwrap_or(FailureReason::EngineError);
        self.transition(LifecycleState::Failed(reason)).await;
        let message = err.detail();
        warn!(session_id = %self.session.id(), reason = %reason, error = %message, "download failed");
        self.events
            .publish(DownloadEvent::Failed { reason, message })
            .await;
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestone_config::SessionConfigurator;
    use lodestone_events::MemorySink;
    use lodestone_torrent_sim::{Scenario, SimulatedEngine};

    #[tokio::test]
    async fn start_is_rejected_outside_created() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let engine = Arc::new(SimulatedEngine::new(Scenario::new("t")));
        let sink = MemorySink::new();
        let mut controller = LifecycleController::new(
            engine,
            SessionConfigurator::default().configure(),
            LifecycleSettings::default(),
            Arc::new(sink.clone()),
        );

        let first = controller
            .start(&MagnetRequest::new("not a magnet", dir.path()))
            .await;
        assert!(first.is_err());
        assert_eq!(
            controller.state(),
            LifecycleState::Failed(FailureReason::InvalidRequest)
        );

        let second = controller
            .start(&MagnetRequest::new("not a magnet", dir.path()))
            .await;
        assert!(matches!(
            second,
            Err(LifecycleError::InvalidTransition { operation: "start", .. })
        ));
        let terminal = sink.events().iter().filter(|event| event.is_terminal()).count();
        assert_eq!(terminal, 1);
        Ok(())
    }

    #[tokio::test]
    async fn start_after_shutdown_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let engine = Arc::new(SimulatedEngine::new(Scenario::new("t")));
        let sink = MemorySink::new();
        let mut controller = LifecycleController::new(
            Arc::clone(&engine),
            SessionConfigurator::default().configure(),
            LifecycleSettings::default(),
            Arc::new(sink.clone()),
        );
        controller.shutdown().await;

        let destination = dir.path().join("after-shutdown");
        let outcome = controller
            .start(&MagnetRequest::new(
                "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567",
                destination.clone(),
            ))
            .await;

        assert!(matches!(
            outcome,
            Err(LifecycleError::InvalidTransition {
                from: LifecycleState::Created,
                operation: "start",
            })
        ));
        assert_eq!(controller.state(), LifecycleState::Created);
        assert!(!destination.exists());
        assert!(sink.events().is_empty());
        assert!(engine.journal().is_empty());
        Ok(())
    }

    #[test]
    fn settings_follow_downloader_settings() {
        let settings = DownloaderSettings {
            metadata_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(200),
            ..DownloaderSettings::default()
        };
        let lifecycle = LifecycleSettings::from(&settings);
        assert_eq!(lifecycle.metadata_timeout, Duration::from_secs(5));
        assert_eq!(lifecycle.poll_interval, Duration::from_millis(200));
    }
}
