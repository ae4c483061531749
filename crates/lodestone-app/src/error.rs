//! # Design
//!
//! - One error type for every way a download session can end badly.
//! - Messages stay short; context lives in fields and in the source chain.
//! - Each variant maps onto the [`FailureReason`] recorded in the lifecycle state.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use lodestone_torrent_core::{FailureReason, LifecycleState, MagnetError};
use thiserror::Error;

/// Result alias for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors that end a download session.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The magnet URI could not be parsed.
    #[error("invalid magnet request")]
    InvalidRequest {
        /// Parse failure.
        source: MagnetError,
    },
    /// Metadata did not arrive in time.
    #[error("no metadata received within {}s", waited.as_secs())]
    MetadataTimeout {
        /// Time spent waiting.
        waited: Duration,
    },
    /// An engine call failed.
    #[error("engine call '{operation}' failed")]
    Engine {
        /// Engine operation identifier.
        operation: &'static str,
        /// Error reported by the engine adapter.
        source: anyhow::Error,
    },
    /// The engine reported a fault in its status.
    #[error("engine fault: {message}")]
    EngineFault {
        /// Fault text from the engine.
        message: String,
    },
    /// File enumeration failed after the download completed.
    #[error("could not list downloaded files")]
    EngineQueryFailed {
        /// Error reported by the engine adapter.
        source: anyhow::Error,
    },
    /// The destination directory could not be prepared.
    #[error("destination directory {} is unavailable", path.display())]
    DestinationUnavailable {
        /// Requested destination.
        path: PathBuf,
        /// Filesystem error.
        source: io::Error,
    },
    /// The operation is not valid in the current lifecycle state.
    #[error("cannot {operation} while {from}")]
    InvalidTransition {
        /// State at the time of the call.
        from: LifecycleState,
        /// Rejected operation.
        operation: &'static str,
    },
}

impl LifecycleError {
    pub(crate) fn engine(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Engine { operation, source }
    }

    /// Failure reason recorded when this error ends a session.
    ///
    /// `None` for errors that reject a call without ending the session.
    #[must_use]
    pub const fn reason(&self) -> Option<FailureReason> {
        match self {
            Self::InvalidRequest { .. } => Some(FailureReason::InvalidRequest),
            Self::MetadataTimeout { .. } => Some(FailureReason::MetadataTimeout),
            Self::Engine { .. } | Self::EngineFault { .. } => Some(FailureReason::EngineError),
            Self::EngineQueryFailed { .. } => Some(FailureReason::EngineQueryFailed),
            Self::DestinationUnavailable { .. } => Some(FailureReason::DestinationUnavailable),
            Self::InvalidTransition { .. } => None,
        }
    }

    /// Message with every source in the chain appended.
    #[must_use]
    pub fn detail(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn detail_includes_source_chain() {
        let err = LifecycleError::engine("status", anyhow!("socket closed"));
        assert_eq!(err.detail(), "engine call 'status' failed: socket closed");
        assert_eq!(err.reason(), Some(FailureReason::EngineError));
    }

    #[test]
    fn reasons_follow_variants() {
        let timeout = LifecycleError::MetadataTimeout {
            waited: Duration::from_secs(61),
        };
        assert_eq!(timeout.to_string(), "no metadata received within 61s");
        assert_eq!(timeout.reason(), Some(FailureReason::MetadataTimeout));

        let rejected = LifecycleError::InvalidTransition {
            from: LifecycleState::Completed,
            operation: "start",
        };
        assert_eq!(rejected.to_string(), "cannot start while completed");
        assert_eq!(rejected.reason(), None);
    }
}
