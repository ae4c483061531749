#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Engine session configuration and environment-driven downloader settings.
//!
//! Layout: `session.rs` (`SessionConfigurator` and the immutable `SessionConfig`),
//! `tuning.rs` (operator overrides and their guard rails), `settings.rs` (environment loader),
//! `defaults.rs` (baseline values).

mod defaults;
pub mod error;
pub mod session;
pub mod settings;
pub mod tuning;

pub use defaults::{DEFAULT_DOWNLOAD_DIR, DEFAULT_METADATA_TIMEOUT, DEFAULT_POLL_INTERVAL};
pub use error::{ConfigError, ConfigResult};
pub use session::{
    DhtRouter, DiscoveryServices, SessionConfig, SessionConfigurator, SettingKey, SettingValue,
};
pub use settings::DownloaderSettings;
pub use tuning::{
    EngineTuning, MAX_CACHE_BLOCKS, MAX_CONNECTIONS, MAX_RATE_LIMIT_BPS, NormalizedTuning,
    normalize_tuning,
};
