//! Error types for request validation.

use thiserror::Error;

/// Reasons a magnet URI is rejected before it reaches the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MagnetError {
    /// The URI was empty or only whitespace.
    #[error("magnet URI is empty")]
    Empty,
    /// The URI could not be parsed at all.
    #[error("magnet URI is malformed")]
    Malformed {
        /// Parser diagnostic.
        detail: String,
    },
    /// The URI used a scheme other than `magnet`.
    #[error("unsupported URI scheme")]
    UnsupportedScheme {
        /// Scheme that was supplied.
        scheme: String,
    },
    /// No `xt=urn:btih:` topic was present.
    #[error("magnet URI has no BitTorrent info hash")]
    MissingInfoHash,
    /// The `btih` value was neither 40 hex nor 32 base32 characters.
    #[error("magnet info hash is invalid")]
    InvalidInfoHash {
        /// Offending hash text.
        value: String,
    },
}

impl MagnetError {
    /// Human-readable explanation including the captured context.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Empty | Self::MissingInfoHash => self.to_string(),
            Self::Malformed { detail } => format!("{self}: {detail}"),
            Self::UnsupportedScheme { scheme } => format!("{self}: {scheme}"),
            Self::InvalidInfoHash { value } => format!("{self}: {value}"),
        }
    }
}

/// Convenience alias for magnet parsing results.
pub type MagnetResult<T> = Result<T, MagnetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_includes_context() {
        let err = MagnetError::UnsupportedScheme {
            scheme: "http".into(),
        };
        assert_eq!(err.to_string(), "unsupported URI scheme");
        assert_eq!(err.detail(), "unsupported URI scheme: http");
        assert_eq!(MagnetError::Empty.detail(), "magnet URI is empty");
    }
}
