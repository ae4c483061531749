//! Bounded wait for torrent metadata.
//!
//! # Design
//! - The magnet URI is validated and the destination prepared before the engine is touched.
//! - The poll loop samples status once per interval and races the wait against cancellation.
//! - A peer count is reported when it is non-zero and differs from the last reported one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lodestone_events::{DownloadEvent, EventPublisher};
use lodestone_torrent_core::{
    AddMagnet, MagnetRequest, TorrentHandle, TorrentMetadata, TransferEngine,
};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{LifecycleError, LifecycleResult};
use crate::session::TorrentSession;

/// How a resolution attempt ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Metadata is available.
    Resolved(TorrentMetadata),
    /// Cancellation was requested first.
    Cancelled,
}

/// Polls the engine until metadata arrives or the timeout elapses.
#[derive(Debug, Clone, Copy)]
pub struct MetadataResolver {
    timeout: Duration,
    poll_interval: Duration,
}

impl MetadataResolver {
    /// Resolver with the given bound and poll cadence.
    #[must_use]
    pub const fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Submit `request` through `session` and wait for its metadata.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::InvalidRequest`] for a malformed URI; the engine is never called.
    /// - [`LifecycleError::DestinationUnavailable`] when the destination cannot be created.
    /// - [`LifecycleError::MetadataTimeout`] once the bound is exceeded.
    /// - [`LifecycleError::Engine`] or [`LifecycleError::EngineFault`] for engine failures.
    pub async fn resolve<E: TransferEngine>(
        &self,
        session: &mut TorrentSession<E>,
        request: &MagnetRequest,
        cancel: &CancellationToken,
        events: &EventPublisher,
    ) -> LifecycleResult<Resolution> {
        let link = request
            .validate()
            .map_err(|source| LifecycleError::InvalidRequest { source })?;
        let save_path = prepare_destination(&request.destination).await?;

        if cancel.is_cancelled() {
            return Ok(Resolution::Cancelled);
        }

        session.start_engine().await?;
        let info_hash = link.info_hash;
        session.admit(AddMagnet { link, save_path }).await?;
        let handle = session.handle()?;

        info!(
            session_id = %session.id(),
            info_hash = %info_hash,
            timeout_secs = self.timeout.as_secs(),
            "waiting for metadata"
        );

        let started = Instant::now();
        let mut ticker = interval_at(started + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_peers = 0;

        loop {
            if cancel.is_cancelled() {
                return Ok(Resolution::Cancelled);
            }

            let status = handle
                .status()
                .await
                .map_err(|source| LifecycleError::engine("status", source))?;
            if let Some(message) = status.error {
                return Err(LifecycleError::EngineFault { message });
            }

            if status.has_metadata {
                let metadata = handle
                    .metadata()
                    .await
                    .map_err(|source| LifecycleError::engine("metadata", source))?;
                info!(
                    session_id = %session.id(),
                    info_hash = %info_hash,
                    name = %metadata.name,
                    files = metadata.file_count,
                    waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "metadata resolved"
                );
                return Ok(Resolution::Resolved(metadata));
            }

            let waited = started.elapsed();
            if waited > self.timeout {
                return Err(LifecycleError::MetadataTimeout { waited });
            }

            if status.num_peers > 0 && status.num_peers != last_peers {
                last_peers = status.num_peers;
                debug!(session_id = %session.id(), peers = last_peers, "peers connected");
                events
                    .publish(DownloadEvent::PeersConnected { peers: last_peers })
                    .await;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                () = cancel.cancelled() => return Ok(Resolution::Cancelled),
            }
        }
    }
}

async fn prepare_destination(destination: &Path) -> LifecycleResult<PathBuf> {
    let unavailable = |source| LifecycleError::DestinationUnavailable {
        path: destination.to_path_buf(),
        source,
    };
    tokio::fs::create_dir_all(destination)
        .await
        .map_err(unavailable)?;
    tokio::fs::canonicalize(destination)
        .await
        .map_err(unavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestone_config::SessionConfigurator;
    use lodestone_events::MemorySink;
    use lodestone_torrent_core::FailureReason;
    use lodestone_torrent_sim::{EngineCall, Scenario, SimulatedEngine};
    use std::sync::Arc;
    use uuid::Uuid;

    const URI: &str = "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567&dn=sample";

    fn fixture(
        scenario: Scenario,
    ) -> (
        Arc<SimulatedEngine>,
        TorrentSession<SimulatedEngine>,
        MemorySink,
        EventPublisher,
    ) {
        let engine = Arc::new(SimulatedEngine::new(scenario));
        let session = TorrentSession::new(
            Arc::clone(&engine),
            SessionConfigurator::default().configure(),
        );
        let sink = MemorySink::new();
        let publisher = EventPublisher::new(Uuid::new_v4(), Arc::new(sink.clone()));
        (engine, session, sink, publisher)
    }

    fn resolver() -> MetadataResolver {
        MetadataResolver::new(Duration::from_secs(5), Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn reports_new_peer_counts_until_metadata_arrives() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (engine, mut session, sink, publisher) = fixture(
            Scenario::new("sample")
                .metadata_after_polls(3)
                .with_peers(vec![0, 2, 2, 4]),
        );
        let request = MagnetRequest::new(URI, dir.path().join("nested"));

        let resolution = resolver()
            .resolve(&mut session, &request, &CancellationToken::new(), &publisher)
            .await?;

        let Resolution::Resolved(metadata) = resolution else {
            anyhow::bail!("expected metadata, got {resolution:?}");
        };
        assert_eq!(metadata.name, "sample");
        assert_eq!(
            sink.events(),
            vec![DownloadEvent::PeersConnected { peers: 2 }]
        );
        assert!(dir.path().join("nested").is_dir());
        assert!(session.save_path().is_some_and(Path::is_absolute));
        assert_eq!(
            engine.journal().iter().filter(|call| **call == EngineCall::Status).count(),
            4
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn peer_count_dropping_to_zero_is_not_reported_again() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (_engine, mut session, sink, publisher) = fixture(
            Scenario::new("sample")
                .metadata_after_polls(5)
                .with_peers(vec![0, 2, 0, 2, 2]),
        );
        let request = MagnetRequest::new(URI, dir.path());

        resolver()
            .resolve(&mut session, &request, &CancellationToken::new(), &publisher)
            .await?;

        assert_eq!(
            sink.events(),
            vec![DownloadEvent::PeersConnected { peers: 2 }]
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_uri_never_reaches_the_engine() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (engine, mut session, _sink, publisher) = fixture(Scenario::new("unused"));
        let request = MagnetRequest::new("http://example.com/file.torrent", dir.path());

        let err = resolver()
            .resolve(&mut session, &request, &CancellationToken::new(), &publisher)
            .await
            .expect_err("non-magnet URI should be rejected");

        assert_eq!(err.reason(), Some(FailureReason::InvalidRequest));
        assert!(engine.journal().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_metadata_never_arrives() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (_engine, mut session, _sink, publisher) =
            fixture(Scenario::new("stalled").metadata_never());
        let request = MagnetRequest::new(URI, dir.path());

        let err = resolver()
            .resolve(&mut session, &request, &CancellationToken::new(), &publisher)
            .await
            .expect_err("resolution should time out");

        let LifecycleError::MetadataTimeout { waited } = err else {
            anyhow::bail!("expected timeout, got {err:?}");
        };
        assert!(waited > Duration::from_secs(5));
        assert!(waited <= Duration::from_secs(7));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_wait() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let (_engine, mut session, _sink, publisher) =
            fixture(Scenario::new("stalled").metadata_never());
        let request = MagnetRequest::new(URI, dir.path());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let resolution = resolver()
            .resolve(&mut session, &request, &cancel, &publisher)
            .await?;

        assert_eq!(resolution, Resolution::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(3));
        Ok(())
    }
}
