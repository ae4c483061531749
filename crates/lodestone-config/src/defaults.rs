//! Baseline values for the engine session and the downloader.

use std::time::Duration;

/// Directory used when the caller does not name one.
pub const DEFAULT_DOWNLOAD_DIR: &str = "./downloads";
/// Upper bound on the metadata resolution phase.
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(60);
/// Cadence of every polling loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub(crate) const CONNECTIONS_LIMIT: i64 = 200;
pub(crate) const CONNECTION_SPEED: i64 = 50;
pub(crate) const REQUEST_QUEUE_DEPTH: i64 = 500;
pub(crate) const PEERLIST_SIZE: i64 = 4_000;
pub(crate) const SEND_BUFFER_WATERMARK: i64 = 500 * 1024;
/// 256 * 16 KiB blocks.
pub(crate) const CACHE_SIZE: i64 = 256 * 16;
pub(crate) const ACTIVE_DOWNLOADS: i64 = 8;
pub(crate) const ACTIVE_LIMIT: i64 = 15;
pub(crate) const HANDSHAKE_TIMEOUT_SECS: i64 = 10;

pub(crate) const LISTEN_PORT_START: u16 = 6_881;
pub(crate) const LISTEN_PORT_END: u16 = 6_891;

pub(crate) const DHT_ROUTERS: [(&str, u16); 4] = [
    ("router.bittorrent.com", 6_881),
    ("router.utorrent.com", 6_881),
    ("dht.transmissionbt.com", 6_881),
    ("dht.libtorrent.org", 25_401),
];
