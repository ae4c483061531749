//! Core torrent domain types shared across the workspace.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MagnetResult;
use crate::format::{format_bytes, format_duration};
use crate::magnet::MagnetLink;

/// Twenty-byte BitTorrent v1 info hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Wrap raw hash bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw hash bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl Display for InfoHash {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&hex::encode(self.0))
    }
}

impl Serialize for InfoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for InfoHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(&text, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}

/// A magnet URI paired with the directory the payload should land in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagnetRequest {
    /// Raw magnet URI as supplied by the caller.
    pub uri: String,
    /// Destination directory for the payload.
    pub destination: PathBuf,
}

impl MagnetRequest {
    /// Build a request from a URI and destination directory.
    #[must_use]
    pub fn new(uri: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            uri: uri.into(),
            destination: destination.into(),
        }
    }

    /// Validate the URI and return the parsed link.
    ///
    /// # Errors
    ///
    /// Returns `MagnetError` when the URI is empty or not a usable magnet link.
    pub fn validate(&self) -> MagnetResult<MagnetLink> {
        MagnetLink::parse(&self.uri)
    }
}

/// Engine-level admission request produced from a validated [`MagnetRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMagnet {
    /// Parsed magnet link.
    pub link: MagnetLink,
    /// Directory the engine should write the payload into.
    pub save_path: PathBuf,
}

/// Torrent description available once the engine has fetched the info dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentMetadata {
    /// Torrent name from the info dictionary.
    pub name: String,
    /// Number of files in the payload.
    pub file_count: usize,
    /// Total payload size in bytes.
    pub total_size: u64,
    /// Identifier of the torrent.
    pub info_hash: InfoHash,
}

/// State label reported by the engine for a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Waiting in the engine queue.
    #[default]
    Queued,
    /// Verifying existing data on disk.
    CheckingFiles,
    /// Fetching the info dictionary from peers.
    DownloadingMetadata,
    /// Transferring payload pieces.
    Downloading,
    /// All wanted pieces present, not yet seeding.
    Finished,
    /// Holding the complete payload.
    Seeding,
    /// Validating fast-resume data.
    CheckingResumeData,
}

impl EngineState {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::CheckingFiles => "checking_files",
            Self::DownloadingMetadata => "downloading_metadata",
            Self::Downloading => "downloading",
            Self::Finished => "finished",
            Self::Seeding => "seeding",
            Self::CheckingResumeData => "checking_resume_data",
        }
    }
}

impl Display for EngineState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Raw status sample returned by [`crate::TorrentHandle::status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineStatus {
    /// Whether the info dictionary is available.
    pub has_metadata: bool,
    /// Fraction of wanted bytes present, as reported by the engine.
    pub progress: f64,
    /// Current download rate in bytes per second.
    pub download_rate: u64,
    /// Current upload rate in bytes per second.
    pub upload_rate: u64,
    /// Connected peers.
    pub num_peers: u32,
    /// Connected peers that hold the full payload.
    pub num_seeds: u32,
    /// Bytes of wanted data already present.
    pub total_done: u64,
    /// Bytes of data selected for download.
    pub total_wanted: u64,
    /// Engine state label.
    pub state: EngineState,
    /// Whether the torrent holds the complete payload.
    pub is_seed: bool,
    /// Unrecoverable fault reported by the engine (for example disk I/O failure).
    pub error: Option<String>,
}

/// Point-in-time progress view delivered to observers during the download phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Completion fraction in `[0, 1]`.
    pub fraction: f64,
    /// Download rate in bytes per second.
    pub download_rate: u64,
    /// Upload rate in bytes per second.
    pub upload_rate: u64,
    /// Connected peers.
    pub peers: u32,
    /// Connected seeds.
    pub seeds: u32,
    /// Bytes of wanted data already present.
    pub bytes_done: u64,
    /// Bytes selected for download.
    pub bytes_wanted: u64,
    /// Engine state label at sampling time.
    pub state: EngineState,
    /// Estimated time remaining, when the download rate allows an estimate.
    pub eta: Option<Duration>,
    /// Time spent in the download phase so far.
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Completion expressed as a percentage.
    #[must_use]
    pub fn percent(&self) -> f64 {
        self.fraction * 100.0
    }

    /// Whether the snapshot marks the end of the transfer.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.fraction >= 1.0
    }

    /// Remaining time rendered for display (`N/A` when unknown).
    #[must_use]
    pub fn eta_label(&self) -> String {
        format_duration(self.eta.unwrap_or_default())
    }
}

/// One file of the torrent payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the save directory.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

impl Display for FileEntry {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{} ({})",
            self.path.display(),
            format_bytes(self.size)
        )
    }
}

/// Outcome of a completed download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    /// Metadata of the downloaded torrent.
    pub metadata: TorrentMetadata,
    /// Files in torrent order.
    pub files: Vec<FileEntry>,
    /// Absolute directory the files were saved under.
    pub save_path: PathBuf,
}

impl DownloadResult {
    /// Sum of all file sizes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }
}

/// Why a session ended in the failed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The magnet URI could not be parsed.
    InvalidRequest,
    /// Metadata did not arrive within the configured bound.
    MetadataTimeout,
    /// The engine reported an unrecoverable fault.
    EngineError,
    /// File enumeration failed after completion.
    EngineQueryFailed,
    /// The destination directory could not be prepared.
    DestinationUnavailable,
}

impl FailureReason {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::MetadataTimeout => "metadata_timeout",
            Self::EngineError => "engine_error",
            Self::EngineQueryFailed => "engine_query_failed",
            Self::DestinationUnavailable => "destination_unavailable",
        }
    }
}

impl Display for FailureReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Lifecycle of a single download session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum LifecycleState {
    /// Session built, nothing submitted to the engine.
    Created,
    /// Waiting for the engine to fetch metadata.
    ResolvingMetadata,
    /// Transferring the payload.
    Downloading,
    /// Payload complete.
    Completed,
    /// Stopped by an external signal.
    Cancelled,
    /// Stopped by an error.
    Failed(FailureReason),
}

impl LifecycleState {
    /// Whether the state absorbs all further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed(_))
    }

    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::ResolvingMetadata)
                | (Self::ResolvingMetadata, Self::Downloading)
                | (
                    Self::ResolvingMetadata,
                    Self::Cancelled
                        | Self::Failed(
                            FailureReason::InvalidRequest
                                | FailureReason::MetadataTimeout
                                | FailureReason::EngineError
                                | FailureReason::DestinationUnavailable
                        )
                )
                | (
                    Self::Downloading,
                    Self::Completed | Self::Cancelled | Self::Failed(FailureReason::EngineError)
                )
        )
    }

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::ResolvingMetadata => "resolving_metadata",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed(_) => "failed",
        }
    }
}

impl Display for LifecycleState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(formatter, "failed ({reason})"),
            other => formatter.write_str(other.as_str()),
        }
    }
}
