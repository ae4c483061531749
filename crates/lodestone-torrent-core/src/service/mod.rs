//! Engine traits implemented by transfer engine adapters.

use async_trait::async_trait;

use crate::model::{AddMagnet, EngineStatus, FileEntry, TorrentMetadata};

/// Session-level control surface of a transfer engine.
///
/// The engine owns networking, piece selection and storage; callers only configure it, admit
/// torrents, and pause or remove them.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Handle type returned for admitted torrents.
    type Handle: TorrentHandle;
    /// Settings type accepted by [`TransferEngine::configure`].
    type Config: Send + Sync;

    /// Apply session settings. Called once, before any torrent is admitted.
    async fn configure(&self, config: &Self::Config) -> anyhow::Result<()>;

    /// Start peer discovery services (DHT, local discovery, port mapping).
    async fn start_discovery(&self) -> anyhow::Result<()>;

    /// Admit a magnet link into the session.
    async fn add(&self, request: &AddMagnet) -> anyhow::Result<Self::Handle>;

    /// Pause the whole session.
    async fn pause(&self) -> anyhow::Result<()>;

    /// Remove a torrent from the session, leaving downloaded data in place.
    async fn remove(&self, handle: &Self::Handle) -> anyhow::Result<()>;
}

/// Per-torrent query and control surface.
#[async_trait]
pub trait TorrentHandle: Send + Sync {
    /// Sample the current torrent status.
    async fn status(&self) -> anyhow::Result<EngineStatus>;

    /// Torrent metadata; only valid once `status().has_metadata` is true.
    async fn metadata(&self) -> anyhow::Result<TorrentMetadata>;

    /// Files of the payload in torrent order.
    async fn files(&self) -> anyhow::Result<Vec<FileEntry>>;

    /// Pause this torrent.
    async fn pause(&self) -> anyhow::Result<()>;
}
