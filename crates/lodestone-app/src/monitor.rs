//! Progress polling during the download phase.
//!
//! # Design
//! - One status query per interval; each non-final query yields one `Progress` event.
//! - Reported fractions never decrease and stay below 1.0 until the engine reports seeding.
//! - Completion observed in a status sample wins over a cancellation that raced it.
//! - Once cancellation is seen no further progress is published.

use std::time::Duration;

use lodestone_events::{DownloadEvent, EventPublisher};
use lodestone_torrent_core::{EngineStatus, ProgressSnapshot, TorrentHandle};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{LifecycleError, LifecycleResult};

/// How the download phase ended without error.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorExit {
    /// The engine reported seed-complete; carries the final snapshot.
    Completed(ProgressSnapshot),
    /// Cancellation was requested first.
    Cancelled,
}

/// Fixed-cadence status poller.
#[derive(Debug, Clone, Copy)]
pub struct ProgressMonitor {
    poll_interval: Duration,
}

impl ProgressMonitor {
    /// Monitor polling every `poll_interval`.
    #[must_use]
    pub const fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Poll `handle` until it seeds or `cancel` fires, publishing a snapshot per cycle.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Engine`] when a status query fails and
    /// [`LifecycleError::EngineFault`] when the status carries an engine fault.
    pub async fn run<H: TorrentHandle>(
        &self,
        handle: &H,
        cancel: &CancellationToken,
        events: &EventPublisher,
    ) -> LifecycleResult<MonitorExit> {
        let started = Instant::now();
        let mut ticker = interval_at(started + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut fraction = 0.0_f64;

        loop {
            if cancel.is_cancelled() {
                return Ok(MonitorExit::Cancelled);
            }

            let status = handle
                .status()
                .await
                .map_err(|source| LifecycleError::engine("status", source))?;
            if let Some(message) = status.error.clone() {
                return Err(LifecycleError::EngineFault { message });
            }

            if status.is_seed {
                let snapshot = snapshot(&status, 1.0, started.elapsed());
                info!(
                    session_id = %events.session_id(),
                    bytes = snapshot.bytes_done,
                    "engine reports seed-complete"
                );
                events
                    .publish(DownloadEvent::Progress {
                        snapshot: snapshot.clone(),
                    })
                    .await;
                return Ok(MonitorExit::Completed(snapshot));
            }

            fraction = next_fraction(fraction, status.progress);
            if cancel.is_cancelled() {
                return Ok(MonitorExit::Cancelled);
            }

            let snapshot = snapshot(&status, fraction, started.elapsed());
            debug!(
                session_id = %events.session_id(),
                progress = snapshot.fraction,
                peers = snapshot.peers,
                rate = snapshot.download_rate,
                "download progress"
            );
            events.publish(DownloadEvent::Progress { snapshot }).await;

            tokio::select! {
                _ = ticker.tick() => {}
                () = cancel.cancelled() => return Ok(MonitorExit::Cancelled),
            }
        }
    }
}

/// Fold a reported fraction into the running value: clamp, ignore NaN, never decrease, and
/// keep strictly below 1.0 until the engine reports seeding.
fn next_fraction(previous: f64, reported: f64) -> f64 {
    if reported.is_nan() {
        return previous;
    }
    previous.max(reported.clamp(0.0, 1.0_f64.next_down()))
}

fn snapshot(status: &EngineStatus, fraction: f64, elapsed: Duration) -> ProgressSnapshot {
    let remaining = status.total_wanted.saturating_sub(status.total_done);
    let eta = (status.download_rate > 0 && fraction < 1.0)
        .then(|| Duration::from_secs(remaining.div_ceil(status.download_rate)));
    ProgressSnapshot {
        fraction,
        download_rate: status.download_rate,
        upload_rate: status.upload_rate,
        peers: status.num_peers,
        seeds: status.num_seeds,
        bytes_done: if fraction >= 1.0 {
            status.total_wanted
        } else {
            status.total_done
        },
        bytes_wanted: status.total_wanted,
        state: status.state,
        eta,
        elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestone_events::MemorySink;
    use lodestone_torrent_core::{AddMagnet, MagnetLink, TransferEngine};
    use lodestone_torrent_sim::{Scenario, SimulatedEngine, SimulatedHandle};
    use std::path::PathBuf;
    use std::sync::Arc;
    use uuid::Uuid;

    const URI: &str = "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567";

    async fn downloading_handle(scenario: Scenario) -> anyhow::Result<SimulatedHandle> {
        let engine = SimulatedEngine::new(scenario.without_materialization());
        let handle = engine
            .add(&AddMagnet {
                link: MagnetLink::parse(URI)?,
                save_path: PathBuf::from("/unused"),
            })
            .await?;
        handle.status().await?;
        handle.metadata().await?;
        Ok(handle)
    }

    fn fractions(sink: &MemorySink) -> Vec<f64> {
        sink.events()
            .into_iter()
            .filter_map(|event| match event {
                DownloadEvent::Progress { snapshot } => Some(snapshot.fraction),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn fraction_folding_is_monotonic_and_bounded() {
        assert!((next_fraction(0.4, 0.2) - 0.4).abs() < f64::EPSILON);
        assert!((next_fraction(0.4, f64::NAN) - 0.4).abs() < f64::EPSILON);
        assert!(next_fraction(0.0, 1.5) < 1.0);
        assert!(next_fraction(0.0, -0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn eta_requires_a_download_rate() {
        let status = EngineStatus {
            download_rate: 100,
            total_done: 250,
            total_wanted: 1_000,
            ..EngineStatus::default()
        };
        let with_rate = snapshot(&status, 0.25, Duration::from_secs(3));
        assert_eq!(with_rate.eta, Some(Duration::from_secs(8)));

        let stalled = snapshot(
            &EngineStatus {
                download_rate: 0,
                ..status
            },
            0.25,
            Duration::ZERO,
        );
        assert_eq!(stalled.eta, None);
        assert_eq!(stalled.eta_label(), "N/A");
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_monotonic_progress_until_seed() -> anyhow::Result<()> {
        let handle = downloading_handle(
            Scenario::new("t")
                .with_file("t/a", 1_000)
                .with_progress_steps(vec![0.2, 0.5, 0.4, 0.9])
                .seed_after_cycles(4),
        )
        .await?;
        let sink = MemorySink::new();
        let publisher = EventPublisher::new(Uuid::new_v4(), Arc::new(sink.clone()));

        let exit = ProgressMonitor::new(Duration::from_secs(1))
            .run(&handle, &CancellationToken::new(), &publisher)
            .await?;

        assert!(matches!(exit, MonitorExit::Completed(ref snap) if snap.is_complete()));
        assert_eq!(fractions(&sink), vec![0.2, 0.5, 0.5, 0.9, 1.0]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn completion_wins_over_cancellation_in_the_same_sample() -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let handle = downloading_handle(
            Scenario::new("t")
                .with_file("t/a", 10)
                .seed_after_cycles(2)
                .with_status_hook(move |call| {
                    // call 1 was the metadata poll; call 4 is the seeding sample
                    if call == 4 {
                        trigger.cancel();
                    }
                }),
        )
        .await?;
        let publisher = EventPublisher::disabled(Uuid::new_v4());

        let exit = ProgressMonitor::new(Duration::from_secs(1))
            .run(&handle, &cancel, &publisher)
            .await?;

        assert!(matches!(exit, MonitorExit::Completed(_)));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_suppresses_the_pending_snapshot() -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let handle = downloading_handle(
            Scenario::new("t")
                .with_file("t/a", 10)
                .seed_after_cycles(10)
                .with_status_hook(move |call| {
                    if call == 3 {
                        trigger.cancel();
                    }
                }),
        )
        .await?;
        let sink = MemorySink::new();
        let publisher = EventPublisher::new(Uuid::new_v4(), Arc::new(sink.clone()));

        let exit = ProgressMonitor::new(Duration::from_secs(1))
            .run(&handle, &cancel, &publisher)
            .await?;

        assert_eq!(exit, MonitorExit::Cancelled);
        assert_eq!(fractions(&sink).len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn engine_fault_in_status_is_an_error() -> anyhow::Result<()> {
        let handle = downloading_handle(
            Scenario::new("t")
                .with_file("t/a", 10)
                .fault_status_at(3, "disk full"),
        )
        .await?;
        let publisher = EventPublisher::disabled(Uuid::new_v4());

        let err = ProgressMonitor::new(Duration::from_secs(1))
            .run(&handle, &CancellationToken::new(), &publisher)
            .await
            .expect_err("fault should stop the monitor");

        assert!(matches!(err, LifecycleError::EngineFault { ref message } if message == "disk full"));
        Ok(())
    }
}
