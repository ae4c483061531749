#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Command-line front end for the download lifecycle.
//!
//! Layout:
//! - `cli.rs`: argument parsing, settings, Ctrl-C handling, and exit codes
//! - `output.rs`: event renderers and formatting helpers
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod output;

pub use cli::run;
