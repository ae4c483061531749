//! Owned engine context for one download.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lodestone_torrent_core::{AddMagnet, TorrentHandle, TorrentMetadata, TransferEngine};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{LifecycleError, LifecycleResult};

/// Engine, configuration, and torrent handle for a single download.
///
/// The session is the only path to the engine. After [`TorrentSession::teardown`] it issues
/// no further engine calls.
pub struct TorrentSession<E: TransferEngine> {
    id: Uuid,
    engine: Arc<E>,
    config: E::Config,
    handle: Option<E::Handle>,
    save_path: Option<PathBuf>,
    metadata: Option<TorrentMetadata>,
    engine_started: bool,
    torn_down: bool,
}

impl<E: TransferEngine> TorrentSession<E> {
    /// New session; nothing is sent to the engine until [`Self::start_engine`].
    pub fn new(engine: Arc<E>, config: E::Config) -> Self {
        Self {
            id: Uuid::new_v4(),
            engine,
            config,
            handle: None,
            save_path: None,
            metadata: None,
            engine_started: false,
            torn_down: false,
        }
    }

    /// Identifier stamped onto logs and events.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Apply the configuration and start discovery. Runs at most once.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Engine`] when the engine rejects either call or the session
    /// was already torn down.
    pub async fn start_engine(&mut self) -> LifecycleResult<()> {
        self.ensure_live("start engine")?;
        if self.engine_started {
            return Ok(());
        }
        self.engine_started = true;
        self.engine
            .configure(&self.config)
            .await
            .map_err(|source| LifecycleError::engine("configure", source))?;
        self.engine
            .start_discovery()
            .await
            .map_err(|source| LifecycleError::engine("start_discovery", source))?;
        debug!(session_id = %self.id, "engine configured and discovery started");
        Ok(())
    }

    /// Admit a magnet into the engine and keep its handle.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Engine`] when admission fails, a torrent is already held, or
    /// the session was torn down.
    pub async fn admit(&mut self, request: AddMagnet) -> LifecycleResult<()> {
        self.ensure_live("add torrent")?;
        if self.handle.is_some() {
            return Err(LifecycleError::engine(
                "add",
                anyhow::anyhow!("session already holds a torrent"),
            ));
        }
        let handle = self
            .engine
            .add(&request)
            .await
            .map_err(|source| LifecycleError::engine("add", source))?;
        info!(
            session_id = %self.id,
            info_hash = %request.link.info_hash,
            save_path = %request.save_path.display(),
            "torrent admitted"
        );
        self.handle = Some(handle);
        self.save_path = Some(request.save_path);
        Ok(())
    }

    /// Handle of the admitted torrent.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Engine`] when no torrent has been admitted.
    pub fn handle(&self) -> LifecycleResult<&E::Handle> {
        self.handle.as_ref().ok_or_else(|| {
            LifecycleError::engine("handle", anyhow::anyhow!("no torrent admitted"))
        })
    }

    /// Directory the payload is written under.
    #[must_use]
    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    /// Record metadata. The first value wins; later calls return it unchanged.
    pub fn record_metadata(&mut self, metadata: TorrentMetadata) -> &TorrentMetadata {
        self.metadata.get_or_insert(metadata)
    }

    /// Metadata recorded for the torrent, if resolved.
    #[must_use]
    pub const fn metadata(&self) -> Option<&TorrentMetadata> {
        self.metadata.as_ref()
    }

    /// Remove the torrent from the engine, keeping downloaded data.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Engine`] when the engine refuses the removal.
    pub async fn remove_torrent(&mut self) -> LifecycleResult<()> {
        self.ensure_live("remove torrent")?;
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        if let Err(source) = self.engine.remove(&handle).await {
            self.handle = Some(handle);
            return Err(LifecycleError::engine("remove", source));
        }
        debug!(session_id = %self.id, "torrent removed from engine");
        Ok(())
    }

    /// Pause the torrent, then the session. Idempotent; failures are logged, not returned.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Some(handle) = &self.handle
            && let Err(err) = handle.pause().await
        {
            warn!(session_id = %self.id, error = %err, "failed to pause torrent during teardown");
        }
        if self.engine_started
            && let Err(err) = self.engine.pause().await
        {
            warn!(session_id = %self.id, error = %err, "failed to pause session during teardown");
        }
        info!(session_id = %self.id, "session torn down");
    }

    /// Whether [`Self::teardown`] has run.
    #[must_use]
    pub const fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    fn ensure_live(&self, operation: &'static str) -> LifecycleResult<()> {
        if self.torn_down {
            return Err(LifecycleError::engine(
                operation,
                anyhow::anyhow!("session already torn down"),
            ));
        }
        Ok(())
    }
}
