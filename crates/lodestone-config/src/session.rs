//! Immutable engine session configuration.
//!
//! # Design
//! - `SessionConfigurator::configure` is pure: it layers normalised tuning over the baseline
//!   and never fails.
//! - Keys use the engine's setting names so an adapter can forward them verbatim.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::tuning::{EngineTuning, normalize_tuning};

/// Setting understood by the transfer engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum SettingKey {
    ConnectionsLimit,
    ConnectionSpeed,
    MaxOutRequestQueue,
    MaxAllowedInRequestQueue,
    EnableDht,
    EnableLsd,
    EnableUpnp,
    EnableNatpmp,
    DownloadRateLimit,
    UploadRateLimit,
    MaxPeerlistSize,
    MaxPausedPeerlistSize,
    AnnounceToAllTrackers,
    AnnounceToAllTiers,
    StrictEndGameMode,
    SendBufferWatermark,
    CacheSize,
    ActiveDownloads,
    ActiveLimit,
    HandshakeTimeout,
    SeedTimeLimit,
    SeedTimeRatioLimit,
    MixedModeAlgorithm,
    PeerTos,
}

impl SettingKey {
    /// Engine-side name of the setting.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionsLimit => "connections_limit",
            Self::ConnectionSpeed => "connection_speed",
            Self::MaxOutRequestQueue => "max_out_request_queue",
            Self::MaxAllowedInRequestQueue => "max_allowed_in_request_queue",
            Self::EnableDht => "enable_dht",
            Self::EnableLsd => "enable_lsd",
            Self::EnableUpnp => "enable_upnp",
            Self::EnableNatpmp => "enable_natpmp",
            Self::DownloadRateLimit => "download_rate_limit",
            Self::UploadRateLimit => "upload_rate_limit",
            Self::MaxPeerlistSize => "max_peerlist_size",
            Self::MaxPausedPeerlistSize => "max_paused_peerlist_size",
            Self::AnnounceToAllTrackers => "announce_to_all_trackers",
            Self::AnnounceToAllTiers => "announce_to_all_tiers",
            Self::StrictEndGameMode => "strict_end_game_mode",
            Self::SendBufferWatermark => "send_buffer_watermark",
            Self::CacheSize => "cache_size",
            Self::ActiveDownloads => "active_downloads",
            Self::ActiveLimit => "active_limit",
            Self::HandshakeTimeout => "handshake_timeout",
            Self::SeedTimeLimit => "seed_time_limit",
            Self::SeedTimeRatioLimit => "seed_time_ratio_limit",
            Self::MixedModeAlgorithm => "mixed_mode_algorithm",
            Self::PeerTos => "peer_tos",
        }
    }
}

impl Display for SettingKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Value of a single setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Integer setting.
    Int(i64),
    /// Boolean toggle.
    Bool(bool),
}

impl Display for SettingValue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(formatter, "{value}"),
            Self::Bool(value) => write!(formatter, "{value}"),
        }
    }
}

/// Bootstrap node for the distributed hash table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhtRouter {
    /// Router host name.
    pub host: String,
    /// Router UDP port.
    pub port: u16,
}

impl Display for DhtRouter {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.host, self.port)
    }
}

/// Discovery services the engine should start after configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryServices {
    /// Distributed hash table.
    pub dht: bool,
    /// Local service discovery.
    pub lsd: bool,
    /// `UPnP` port mapping.
    pub upnp: bool,
    /// NAT-PMP port mapping.
    pub natpmp: bool,
}

/// Settings handed to the engine at startup. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    settings: BTreeMap<SettingKey, SettingValue>,
    listen_ports: RangeInclusive<u16>,
    dht_routers: Vec<DhtRouter>,
}

impl SessionConfig {
    /// Value stored for `key`.
    #[must_use]
    pub fn get(&self, key: SettingKey) -> Option<SettingValue> {
        self.settings.get(&key).copied()
    }

    /// Integer value stored for `key`, if it is an integer setting.
    #[must_use]
    pub fn int(&self, key: SettingKey) -> Option<i64> {
        match self.get(key)? {
            SettingValue::Int(value) => Some(value),
            SettingValue::Bool(_) => None,
        }
    }

    /// Boolean value stored for `key`, if it is a toggle.
    #[must_use]
    pub fn flag(&self, key: SettingKey) -> Option<bool> {
        match self.get(key)? {
            SettingValue::Bool(value) => Some(value),
            SettingValue::Int(_) => None,
        }
    }

    /// Iterate every setting in key order.
    pub fn iter(&self) -> impl Iterator<Item = (SettingKey, SettingValue)> + '_ {
        self.settings.iter().map(|(key, value)| (*key, *value))
    }

    /// Ports the engine may listen on.
    #[must_use]
    pub fn listen_ports(&self) -> RangeInclusive<u16> {
        self.listen_ports.clone()
    }

    /// DHT bootstrap nodes.
    #[must_use]
    pub fn dht_routers(&self) -> &[DhtRouter] {
        &self.dht_routers
    }

    /// Discovery services enabled by this configuration.
    #[must_use]
    pub fn discovery(&self) -> DiscoveryServices {
        DiscoveryServices {
            dht: self.flag(SettingKey::EnableDht).unwrap_or(false),
            lsd: self.flag(SettingKey::EnableLsd).unwrap_or(false),
            upnp: self.flag(SettingKey::EnableUpnp).unwrap_or(false),
            natpmp: self.flag(SettingKey::EnableNatpmp).unwrap_or(false),
        }
    }
}

/// Builds [`SessionConfig`] values from the baseline and optional tuning.
#[derive(Debug, Clone, Default)]
pub struct SessionConfigurator {
    tuning: EngineTuning,
    warnings: Vec<String>,
}

impl SessionConfigurator {
    /// Configurator that applies `tuning` after guard rails.
    #[must_use]
    pub fn with_tuning(tuning: &EngineTuning) -> Self {
        let normalized = normalize_tuning(tuning);
        Self {
            tuning: normalized.tuning,
            warnings: normalized.warnings,
        }
    }

    /// Adjustments made while normalising the tuning.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Build the session configuration.
    #[must_use]
    pub fn configure(&self) -> SessionConfig {
        use SettingKey as K;
        use SettingValue::{Bool, Int};

        let tuning = &self.tuning;
        let settings = BTreeMap::from([
            (
                K::ConnectionsLimit,
                Int(tuning.connections_limit.unwrap_or(defaults::CONNECTIONS_LIMIT)),
            ),
            (K::ConnectionSpeed, Int(defaults::CONNECTION_SPEED)),
            (K::MaxOutRequestQueue, Int(defaults::REQUEST_QUEUE_DEPTH)),
            (K::MaxAllowedInRequestQueue, Int(defaults::REQUEST_QUEUE_DEPTH)),
            (K::EnableDht, Bool(tuning.enable_dht.unwrap_or(true))),
            (K::EnableLsd, Bool(tuning.enable_lsd.unwrap_or(true))),
            (K::EnableUpnp, Bool(tuning.enable_upnp.unwrap_or(true))),
            (K::EnableNatpmp, Bool(tuning.enable_natpmp.unwrap_or(true))),
            (K::DownloadRateLimit, Int(tuning.download_rate_limit.unwrap_or(0))),
            (K::UploadRateLimit, Int(tuning.upload_rate_limit.unwrap_or(0))),
            (K::MaxPeerlistSize, Int(defaults::PEERLIST_SIZE)),
            (K::MaxPausedPeerlistSize, Int(defaults::PEERLIST_SIZE)),
            (K::AnnounceToAllTrackers, Bool(true)),
            (K::AnnounceToAllTiers, Bool(true)),
            (K::StrictEndGameMode, Bool(true)),
            (K::SendBufferWatermark, Int(defaults::SEND_BUFFER_WATERMARK)),
            (K::CacheSize, Int(tuning.cache_size.unwrap_or(defaults::CACHE_SIZE))),
            (
                K::ActiveDownloads,
                Int(tuning.active_downloads.unwrap_or(defaults::ACTIVE_DOWNLOADS)),
            ),
            (
                K::ActiveLimit,
                Int(tuning.active_limit.unwrap_or(defaults::ACTIVE_LIMIT)),
            ),
            (K::HandshakeTimeout, Int(defaults::HANDSHAKE_TIMEOUT_SECS)),
            (K::SeedTimeLimit, Int(0)),
            (K::SeedTimeRatioLimit, Int(0)),
            // 0 = prefer TCP
            (K::MixedModeAlgorithm, Int(0)),
            (K::PeerTos, Int(0)),
        ]);

        SessionConfig {
            settings,
            listen_ports: defaults::LISTEN_PORT_START..=defaults::LISTEN_PORT_END,
            dht_routers: defaults::DHT_ROUTERS
                .iter()
                .map(|(host, port)| DhtRouter {
                    host: (*host).to_string(),
                    port: *port,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_configuration_matches_documented_defaults() {
        let config = SessionConfigurator::default().configure();

        assert_eq!(config.int(SettingKey::ConnectionsLimit), Some(200));
        assert_eq!(config.int(SettingKey::ConnectionSpeed), Some(50));
        assert_eq!(config.int(SettingKey::MaxOutRequestQueue), Some(500));
        assert_eq!(config.int(SettingKey::DownloadRateLimit), Some(0));
        assert_eq!(config.int(SettingKey::SendBufferWatermark), Some(512_000));
        assert_eq!(config.int(SettingKey::CacheSize), Some(4_096));
        assert_eq!(config.int(SettingKey::ActiveLimit), Some(15));
        assert_eq!(config.flag(SettingKey::StrictEndGameMode), Some(true));
        assert_eq!(config.int(SettingKey::EnableDht), None);
        assert_eq!(config.iter().count(), 24);
        assert_eq!(config.listen_ports(), 6_881..=6_891);
        assert_eq!(config.dht_routers().len(), 4);
        assert_eq!(
            config.dht_routers()[3].to_string(),
            "dht.libtorrent.org:25401"
        );
        assert_eq!(
            config.discovery(),
            DiscoveryServices {
                dht: true,
                lsd: true,
                upnp: true,
                natpmp: true,
            }
        );
    }

    #[test]
    fn tuning_overrides_are_normalised_before_use() {
        let configurator = SessionConfigurator::with_tuning(&EngineTuning {
            connections_limit: Some(0),
            upload_rate_limit: Some(1_024),
            enable_upnp: Some(false),
            ..EngineTuning::default()
        });

        let config = configurator.configure();
        assert_eq!(config.int(SettingKey::ConnectionsLimit), Some(200));
        assert_eq!(config.int(SettingKey::UploadRateLimit), Some(1_024));
        assert!(!config.discovery().upnp);
        assert_eq!(configurator.warnings().len(), 1);
    }

    #[test]
    fn configure_is_repeatable() {
        let configurator = SessionConfigurator::default();
        assert_eq!(configurator.configure(), configurator.configure());
    }

    #[test]
    fn setting_keys_use_engine_names() -> anyhow::Result<()> {
        assert_eq!(SettingKey::MaxPausedPeerlistSize.as_str(), "max_paused_peerlist_size");
        assert_eq!(
            serde_json::to_value(SettingKey::AnnounceToAllTiers)?,
            serde_json::json!("announce_to_all_tiers")
        );
        Ok(())
    }
}
