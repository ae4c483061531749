//! Operator overrides for the engine session and their guard rails.
//!
//! # Design
//! - Overrides are optional; `None` keeps the baseline value.
//! - Normalisation never fails: out-of-range values are clamped or dropped and a warning is
//!   recorded so the caller can log it.

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Upper bound guard rail for rate limits (≈5 Gbps).
pub const MAX_RATE_LIMIT_BPS: i64 = 5_000_000_000;
/// Upper bound for the global connection limit.
pub const MAX_CONNECTIONS: i64 = 10_000;
/// Upper bound for the disk cache, in 16 KiB blocks (4 GiB).
pub const MAX_CACHE_BLOCKS: i64 = 262_144;

/// Optional overrides layered on top of the baseline session settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineTuning {
    /// Global peer connection limit.
    pub connections_limit: Option<i64>,
    /// Global download cap in bytes per second; `0` means unlimited.
    pub download_rate_limit: Option<i64>,
    /// Global upload cap in bytes per second; `0` means unlimited.
    pub upload_rate_limit: Option<i64>,
    /// Disk cache size in 16 KiB blocks.
    pub cache_size: Option<i64>,
    /// Maximum concurrently downloading torrents.
    pub active_downloads: Option<i64>,
    /// Maximum concurrently active torrents.
    pub active_limit: Option<i64>,
    /// Toggle for the distributed hash table.
    pub enable_dht: Option<bool>,
    /// Toggle for local service discovery.
    pub enable_lsd: Option<bool>,
    /// Toggle for `UPnP` port mapping.
    pub enable_upnp: Option<bool>,
    /// Toggle for NAT-PMP port mapping.
    pub enable_natpmp: Option<bool>,
}

/// Tuning after guard rails, with one warning per adjusted field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedTuning {
    /// Values that are safe to hand to the configurator.
    pub tuning: EngineTuning,
    /// Human-readable notes describing each adjustment.
    pub warnings: Vec<String>,
}

/// Clamp tuning overrides into safe ranges.
#[must_use]
pub fn normalize_tuning(tuning: &EngineTuning) -> NormalizedTuning {
    let mut warnings = Vec::new();

    let connections_limit = match tuning.connections_limit {
        Some(limit) if limit <= 0 => {
            warnings.push(format!(
                "connections_limit <= 0 requested; using default {}",
                defaults::CONNECTIONS_LIMIT
            ));
            None
        }
        Some(limit) if limit > MAX_CONNECTIONS => {
            warnings.push(format!(
                "connections_limit of {limit} exceeds guard rail; clamping to {MAX_CONNECTIONS}"
            ));
            Some(MAX_CONNECTIONS)
        }
        other => other,
    };

    let download_rate_limit =
        clamp_rate_limit("download_rate_limit", tuning.download_rate_limit, &mut warnings);
    let upload_rate_limit =
        clamp_rate_limit("upload_rate_limit", tuning.upload_rate_limit, &mut warnings);

    let cache_size = match tuning.cache_size {
        Some(size) if size < 0 => {
            warnings.push("cache_size < 0 requested; using default".to_string());
            None
        }
        Some(size) if size > MAX_CACHE_BLOCKS => {
            warnings.push(format!(
                "cache_size of {size} exceeds guard rail; clamping to {MAX_CACHE_BLOCKS}"
            ));
            Some(MAX_CACHE_BLOCKS)
        }
        other => other,
    };

    let active_downloads =
        positive_or_default("active_downloads", tuning.active_downloads, &mut warnings);
    let mut active_limit =
        positive_or_default("active_limit", tuning.active_limit, &mut warnings);

    let effective_downloads = active_downloads.unwrap_or(defaults::ACTIVE_DOWNLOADS);
    let effective_limit = active_limit.unwrap_or(defaults::ACTIVE_LIMIT);
    if effective_downloads > effective_limit {
        warnings.push(format!(
            "active_limit {effective_limit} is below active_downloads {effective_downloads}; raising it"
        ));
        active_limit = Some(effective_downloads);
    }

    NormalizedTuning {
        tuning: EngineTuning {
            connections_limit,
            download_rate_limit,
            upload_rate_limit,
            cache_size,
            active_downloads,
            active_limit,
            enable_dht: tuning.enable_dht,
            enable_lsd: tuning.enable_lsd,
            enable_upnp: tuning.enable_upnp,
            enable_natpmp: tuning.enable_natpmp,
        },
        warnings,
    }
}

fn clamp_rate_limit(field: &str, value: Option<i64>, warnings: &mut Vec<String>) -> Option<i64> {
    match value {
        Some(limit) if limit < 0 => {
            warnings.push(format!("{field} < 0 requested; leaving unlimited"));
            None
        }
        Some(limit) if limit > MAX_RATE_LIMIT_BPS => {
            warnings.push(format!(
                "{field} of {limit} exceeds guard rail; clamping to {MAX_RATE_LIMIT_BPS}"
            ));
            Some(MAX_RATE_LIMIT_BPS)
        }
        other => other,
    }
}

fn positive_or_default(
    field: &str,
    value: Option<i64>,
    warnings: &mut Vec<String>,
) -> Option<i64> {
    match value {
        Some(count) if count <= 0 => {
            warnings.push(format!("{field} <= 0 requested; using default"));
            None
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_tuning_produces_no_warnings() {
        let normalized = normalize_tuning(&EngineTuning::default());
        assert_eq!(normalized.tuning, EngineTuning::default());
        assert!(normalized.warnings.is_empty());
    }

    #[test]
    fn out_of_range_values_are_clamped_with_warnings() {
        let normalized = normalize_tuning(&EngineTuning {
            connections_limit: Some(50_000),
            download_rate_limit: Some(MAX_RATE_LIMIT_BPS + 1),
            upload_rate_limit: Some(-5),
            cache_size: Some(MAX_CACHE_BLOCKS * 2),
            active_downloads: Some(0),
            ..EngineTuning::default()
        });

        assert_eq!(normalized.tuning.connections_limit, Some(MAX_CONNECTIONS));
        assert_eq!(normalized.tuning.download_rate_limit, Some(MAX_RATE_LIMIT_BPS));
        assert_eq!(normalized.tuning.upload_rate_limit, None);
        assert_eq!(normalized.tuning.cache_size, Some(MAX_CACHE_BLOCKS));
        assert_eq!(normalized.tuning.active_downloads, None);
        assert_eq!(normalized.warnings.len(), 5);
        assert!(
            normalized
                .warnings
                .iter()
                .any(|msg| msg.contains("guard rail"))
        );
    }

    #[test]
    fn active_limit_is_raised_to_cover_active_downloads() {
        let normalized = normalize_tuning(&EngineTuning {
            active_downloads: Some(20),
            ..EngineTuning::default()
        });
        assert_eq!(normalized.tuning.active_limit, Some(20));
        assert_eq!(normalized.warnings.len(), 1);
    }

    #[test]
    fn zero_rate_limit_means_unlimited_and_is_kept() {
        let normalized = normalize_tuning(&EngineTuning {
            download_rate_limit: Some(0),
            ..EngineTuning::default()
        });
        assert_eq!(normalized.tuning.download_rate_limit, Some(0));
        assert!(normalized.warnings.is_empty());
    }
}
