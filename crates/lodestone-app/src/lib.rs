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

//! Download lifecycle orchestration.
//!
//! Layout: `session.rs` (owned engine context and teardown), `resolver.rs` (bounded metadata
//! wait), `monitor.rs` (progress polling), `completion.rs` (file enumeration),
//! `lifecycle.rs` (the state machine tying them together), `probe.rs` (metadata-only
//! inspection), `error.rs` (lifecycle errors).

pub mod completion;
pub mod error;
pub mod lifecycle;
pub mod monitor;
pub mod probe;
pub mod resolver;
pub mod session;

pub use completion::CompletionReporter;
pub use error::{LifecycleError, LifecycleResult};
pub use lifecycle::{DownloadOutcome, LifecycleController, LifecycleSettings};
pub use monitor::{MonitorExit, ProgressMonitor};
pub use probe::{MetadataProbe, ProbeOutcome, ProbeReport};
pub use resolver::{MetadataResolver, Resolution};
pub use session::TorrentSession;
