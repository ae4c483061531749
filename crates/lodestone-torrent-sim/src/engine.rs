//! Simulated engine and torrent handle.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use lodestone_config::SessionConfig;
use lodestone_torrent_core::{
    AddMagnet, EngineState, EngineStatus, FileEntry, InfoHash, TorrentHandle, TorrentMetadata,
    TransferEngine,
};
use tracing::debug;

use crate::scenario::Scenario;

/// Engine call recorded in the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `configure` was applied.
    Configure,
    /// Discovery services were started.
    StartDiscovery,
    /// A magnet was admitted.
    Add {
        /// Info hash of the admitted magnet.
        info_hash: InfoHash,
    },
    /// A status sample was taken.
    Status,
    /// Metadata was read.
    Metadata,
    /// Files were enumerated.
    Files,
    /// The torrent was paused.
    PauseTorrent,
    /// The session was paused.
    PauseSession,
    /// The torrent was removed.
    Remove,
}

#[derive(Debug, Default)]
struct SimState {
    journal: Vec<EngineCall>,
    config: Option<SessionConfig>,
    info_hash: Option<InfoHash>,
    save_path: Option<PathBuf>,
    status_calls: u32,
    download_cycles: u32,
    metadata_fetched: bool,
    materialized: bool,
    removed: bool,
    paused: bool,
}

#[derive(Debug)]
struct Shared {
    scenario: Scenario,
    state: Mutex<SimState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory engine driven by a [`Scenario`]. Supports one torrent at a time.
#[derive(Debug, Clone)]
pub struct SimulatedEngine {
    shared: Arc<Shared>,
}

impl SimulatedEngine {
    /// Engine that follows `scenario`.
    #[must_use]
    pub fn new(scenario: Scenario) -> Self {
        Self {
            shared: Arc::new(Shared {
                scenario,
                state: Mutex::new(SimState::default()),
            }),
        }
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn journal(&self) -> Vec<EngineCall> {
        self.shared.lock().journal.clone()
    }

    /// Configuration passed to `configure`, if any.
    #[must_use]
    pub fn applied_config(&self) -> Option<SessionConfig> {
        self.shared.lock().config.clone()
    }

    /// Whether the torrent was removed from the session.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.shared.lock().removed
    }

    /// Whether the session was paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared.lock().paused
    }
}

#[async_trait]
impl TransferEngine for SimulatedEngine {
    type Handle = SimulatedHandle;
    type Config = SessionConfig;

    async fn configure(&self, config: &SessionConfig) -> Result<()> {
        let mut state = self.shared.lock();
        state.journal.push(EngineCall::Configure);
        state.config = Some(config.clone());
        Ok(())
    }

    async fn start_discovery(&self) -> Result<()> {
        let mut state = self.shared.lock();
        if state.config.is_none() {
            bail!("discovery started before the session was configured");
        }
        state.journal.push(EngineCall::StartDiscovery);
        Ok(())
    }

    async fn add(&self, request: &AddMagnet) -> Result<SimulatedHandle> {
        if self.shared.scenario.fail_add {
            bail!("simulated engine rejected magnet {}", request.link);
        }
        let mut state = self.shared.lock();
        if state.info_hash.is_some() {
            bail!("simulated engine already holds a torrent");
        }
        state.journal.push(EngineCall::Add {
            info_hash: request.link.info_hash,
        });
        state.info_hash = Some(request.link.info_hash);
        state.save_path = Some(request.save_path.clone());
        debug!(info_hash = %request.link.info_hash, "simulated torrent admitted");
        Ok(SimulatedHandle {
            shared: Arc::clone(&self.shared),
        })
    }

    async fn pause(&self) -> Result<()> {
        let mut state = self.shared.lock();
        state.journal.push(EngineCall::PauseSession);
        state.paused = true;
        Ok(())
    }

    async fn remove(&self, _handle: &SimulatedHandle) -> Result<()> {
        let mut state = self.shared.lock();
        if state.removed || state.info_hash.is_none() {
            bail!("unknown torrent for remove command");
        }
        state.journal.push(EngineCall::Remove);
        state.removed = true;
        Ok(())
    }
}

/// Handle to the torrent admitted into a [`SimulatedEngine`].
#[derive(Debug, Clone)]
pub struct SimulatedHandle {
    shared: Arc<Shared>,
}

impl SimulatedHandle {
    fn ensure_present(state: &SimState) -> Result<()> {
        if state.removed {
            bail!("torrent was removed from the session");
        }
        Ok(())
    }

    async fn materialize(&self, save_path: PathBuf) -> Result<()> {
        for file in &self.shared.scenario.files {
            let target = save_path.join(&file.path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let handle = tokio::fs::File::create(&target)
                .await
                .with_context(|| format!("failed to create {}", target.display()))?;
            handle
                .set_len(file.size)
                .await
                .with_context(|| format!("failed to size {}", target.display()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl TorrentHandle for SimulatedHandle {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    async fn status(&self) -> Result<EngineStatus> {
        let scenario = &self.shared.scenario;
        let (call, sample, pending_materialization) = {
            let mut state = self.shared.lock();
            Self::ensure_present(&state)?;
            state.journal.push(EngineCall::Status);
            state.status_calls += 1;
            let call = state.status_calls;

            if scenario.fail_status_at == Some(call) {
                return Err(anyhow!("simulated status query failure at call {call}"));
            }

            let total = scenario.total_size();
            let mut sample = EngineStatus {
                has_metadata: scenario.metadata_ready(call),
                num_peers: scenario.peers_at(call),
                state: EngineState::DownloadingMetadata,
                ..EngineStatus::default()
            };

            let mut pending = None;
            if state.metadata_fetched {
                state.download_cycles += 1;
                let cycle = state.download_cycles;
                sample.num_seeds = scenario.seeds;
                sample.total_wanted = total;
                if scenario.is_seed_at(cycle) {
                    sample.is_seed = true;
                    sample.progress = 1.0;
                    sample.total_done = total;
                    sample.upload_rate = scenario.upload_rate;
                    sample.state = EngineState::Seeding;
                    if scenario.materialize && !state.materialized {
                        state.materialized = true;
                        pending = state.save_path.clone();
                    }
                } else {
                    let progress = scenario.progress_at(cycle);
                    sample.progress = progress;
                    sample.total_done = (progress.clamp(0.0, 1.0) * total as f64) as u64;
                    sample.download_rate = scenario.download_rate;
                    sample.upload_rate = scenario.upload_rate;
                    sample.state = EngineState::Downloading;
                }
            }

            if let Some((at, message)) = &scenario.fault_status_at
                && *at == call
            {
                sample.error = Some(message.clone());
            }
            (call, sample, pending)
        };

        if let Some(hook) = &scenario.status_hook {
            hook(call);
        }
        if let Some(save_path) = pending_materialization {
            self.materialize(save_path).await?;
        }
        Ok(sample)
    }

    async fn metadata(&self) -> Result<TorrentMetadata> {
        let scenario = &self.shared.scenario;
        let mut state = self.shared.lock();
        Self::ensure_present(&state)?;
        state.journal.push(EngineCall::Metadata);
        if !scenario.metadata_ready(state.status_calls) {
            bail!("metadata requested before it was available");
        }
        let info_hash = state
            .info_hash
            .ok_or_else(|| anyhow!("metadata requested without a torrent"))?;
        state.metadata_fetched = true;
        Ok(TorrentMetadata {
            name: scenario.name.clone(),
            file_count: scenario.files.len(),
            total_size: scenario.total_size(),
            info_hash,
        })
    }

    async fn files(&self) -> Result<Vec<FileEntry>> {
        let mut state = self.shared.lock();
        Self::ensure_present(&state)?;
        state.journal.push(EngineCall::Files);
        if self.shared.scenario.fail_files {
            bail!("simulated file enumeration failure");
        }
        Ok(self.shared.scenario.files.clone())
    }

    async fn pause(&self) -> Result<()> {
        let mut state = self.shared.lock();
        Self::ensure_present(&state)?;
        state.journal.push(EngineCall::PauseTorrent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestone_config::SessionConfigurator;
    use lodestone_torrent_core::MagnetLink;

    const URI: &str = "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567";

    fn add_request(save_path: PathBuf) -> Result<AddMagnet> {
        Ok(AddMagnet {
            link: MagnetLink::parse(URI)?,
            save_path,
        })
    }

    #[tokio::test]
    async fn scripted_torrent_seeds_and_materializes_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let engine = SimulatedEngine::new(
            Scenario::new("pack")
                .with_file("pack/a.bin", 3)
                .with_file("pack/b.bin", 5)
                .metadata_after_polls(1)
                .seed_after_cycles(1),
        );
        let config = SessionConfigurator::default().configure();
        engine.configure(&config).await?;
        assert_eq!(engine.applied_config(), Some(config));
        engine.start_discovery().await?;
        let handle = engine.add(&add_request(dir.path().to_path_buf())?).await?;

        assert!(!handle.status().await?.has_metadata);
        assert!(handle.status().await?.has_metadata);
        let metadata = handle.metadata().await?;
        assert_eq!((metadata.file_count, metadata.total_size), (2, 8));

        let first = handle.status().await?;
        assert!(!first.is_seed);
        assert!((first.progress - 0.5).abs() < f64::EPSILON);
        let second = handle.status().await?;
        assert!(second.is_seed);
        assert_eq!(second.total_done, 8);

        let written = std::fs::metadata(dir.path().join("pack/b.bin"))?;
        assert_eq!(written.len(), 5);
        assert_eq!(engine.journal()[0], EngineCall::Configure);
        Ok(())
    }

    #[tokio::test]
    async fn faults_and_removal_are_reported() -> Result<()> {
        let engine = SimulatedEngine::new(
            Scenario::new("faulty")
                .fault_status_at(1, "disk full")
                .fail_status_at(2)
                .fail_files(),
        );
        assert!(engine.start_discovery().await.is_err());
        let handle = engine.add(&add_request(PathBuf::from("/unused"))?).await?;

        assert_eq!(handle.status().await?.error.as_deref(), Some("disk full"));
        assert!(handle.status().await.is_err());
        assert!(handle.files().await.is_err());

        engine.remove(&handle).await?;
        assert!(engine.is_removed());
        assert!(handle.status().await.is_err());
        assert!(engine.remove(&handle).await.is_err());
        Ok(())
    }
}
