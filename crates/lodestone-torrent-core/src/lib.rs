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

//! Engine-agnostic torrent interfaces and domain types.
//!
//! Layout: `model/` (requests, metadata, snapshots, lifecycle states), `magnet.rs` (magnet URI
//! parsing), `service/` (engine traits), `format.rs` (human-readable sizes and durations),
//! `error.rs` (parse errors).

pub mod error;
pub mod format;
pub mod magnet;
pub mod model;
pub mod service;

pub use error::{MagnetError, MagnetResult};
pub use format::{UNAVAILABLE, format_bytes, format_duration, format_rate};
pub use magnet::MagnetLink;
pub use model::{
    AddMagnet, DownloadResult, EngineState, EngineStatus, FailureReason, FileEntry, InfoHash,
    LifecycleState, MagnetRequest, ProgressSnapshot, TorrentMetadata,
};
pub use service::{TorrentHandle, TransferEngine};
