//! Event payloads emitted while a download session runs.

use chrono::{DateTime, Utc};
use lodestone_torrent_core::{
    DownloadResult, FailureReason, LifecycleState, ProgressSnapshot, TorrentMetadata,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to each event, sequential within a session.
pub type EventId = u64;

/// Typed events surfaced to presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// The lifecycle state machine moved.
    PhaseChanged {
        /// State before the transition.
        from: LifecycleState,
        /// State after the transition.
        to: LifecycleState,
    },
    /// The peer count changed to a new non-zero value while resolving metadata.
    PeersConnected {
        /// Connected peer count.
        peers: u32,
    },
    /// Metadata became available.
    MetadataResolved {
        /// Name, file count, size and info hash.
        metadata: TorrentMetadata,
    },
    /// One polling cycle of the download phase.
    Progress {
        /// Sampled transfer state.
        snapshot: ProgressSnapshot,
    },
    /// The download finished and its files were enumerated.
    Completed {
        /// Files written and where they were saved.
        result: DownloadResult,
    },
    /// The session stopped on an external signal.
    Cancelled,
    /// The session stopped on an error.
    Failed {
        /// Category of the failure.
        reason: FailureReason,
        /// Error chain rendered as text.
        message: String,
    },
}

impl DownloadEvent {
    /// Machine-friendly discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PhaseChanged { .. } => "phase_changed",
            Self::PeersConnected { .. } => "peers_connected",
            Self::MetadataResolved { .. } => "metadata_resolved",
            Self::Progress { .. } => "progress",
            Self::Completed { .. } => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether the event reports a terminal outcome.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Cancelled | Self::Failed { .. }
        )
    }
}

/// Metadata wrapper around events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Sequential identifier within the session.
    pub id: EventId,
    /// Session that produced the event.
    pub session_id: Uuid,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
    /// The event itself.
    pub event: DownloadEvent,
}
