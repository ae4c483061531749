//! Environment-driven downloader settings.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::{DEFAULT_DOWNLOAD_DIR, DEFAULT_METADATA_TIMEOUT, DEFAULT_POLL_INTERVAL};
use crate::error::{ConfigError, ConfigResult};
use crate::tuning::EngineTuning;

const DOWNLOAD_DIR: &str = "LODESTONE_DOWNLOAD_DIR";
const METADATA_TIMEOUT_SECS: &str = "LODESTONE_METADATA_TIMEOUT_SECS";
const POLL_INTERVAL_MS: &str = "LODESTONE_POLL_INTERVAL_MS";
const LOG_LEVEL: &str = "LODESTONE_LOG_LEVEL";
const LOG_FORMAT: &str = "LODESTONE_LOG_FORMAT";
const CONNECTIONS_LIMIT: &str = "LODESTONE_CONNECTIONS_LIMIT";
const DOWNLOAD_RATE_LIMIT: &str = "LODESTONE_DOWNLOAD_RATE_LIMIT";
const UPLOAD_RATE_LIMIT: &str = "LODESTONE_UPLOAD_RATE_LIMIT";
const CACHE_SIZE: &str = "LODESTONE_CACHE_SIZE";
const ACTIVE_DOWNLOADS: &str = "LODESTONE_ACTIVE_DOWNLOADS";
const ACTIVE_LIMIT: &str = "LODESTONE_ACTIVE_LIMIT";
const ENABLE_DHT: &str = "LODESTONE_ENABLE_DHT";
const ENABLE_LSD: &str = "LODESTONE_ENABLE_LSD";
const ENABLE_UPNP: &str = "LODESTONE_ENABLE_UPNP";
const ENABLE_NATPMP: &str = "LODESTONE_ENABLE_NATPMP";

/// Settings for one downloader process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloaderSettings {
    /// Destination used when the caller does not supply one.
    pub download_dir: PathBuf,
    /// Upper bound on metadata resolution.
    pub metadata_timeout: Duration,
    /// Cadence of the polling loops.
    pub poll_interval: Duration,
    /// Default tracing level when `RUST_LOG` is unset.
    pub log_level: String,
    /// Explicit log format (`json` or `pretty`); inferred when absent.
    pub log_format: Option<String>,
    /// Engine overrides.
    pub tuning: EngineTuning,
}

impl Default for DownloaderSettings {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            log_level: "info".to_string(),
            log_format: None,
            tuning: EngineTuning::default(),
        }
    }
}

impl DownloaderSettings {
    /// Load settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when a variable is set to an unusable value.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through `lookup`, which maps a variable name to its value.
    ///
    /// Unset and blank variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when a variable is set to an unusable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut settings = Self::default();

        if let Some(dir) = read(DOWNLOAD_DIR) {
            settings.download_dir = PathBuf::from(dir);
        }
        if let Some(raw) = read(METADATA_TIMEOUT_SECS) {
            let secs: u64 = parse_number(METADATA_TIMEOUT_SECS, &raw)?;
            settings.metadata_timeout = positive_duration(
                METADATA_TIMEOUT_SECS,
                &raw,
                Duration::from_secs(secs),
            )?;
        }
        if let Some(raw) = read(POLL_INTERVAL_MS) {
            let millis: u64 = parse_number(POLL_INTERVAL_MS, &raw)?;
            settings.poll_interval =
                positive_duration(POLL_INTERVAL_MS, &raw, Duration::from_millis(millis))?;
        }
        if let Some(level) = read(LOG_LEVEL) {
            settings.log_level = level;
        }
        if let Some(format) = read(LOG_FORMAT) {
            let normalized = format.to_ascii_lowercase();
            if normalized != "json" && normalized != "pretty" {
                return Err(ConfigError::InvalidField {
                    field: LOG_FORMAT,
                    value: format,
                    reason: "expected 'json' or 'pretty'",
                });
            }
            settings.log_format = Some(normalized);
        }

        let tuning = &mut settings.tuning;
        tuning.connections_limit = optional_number(CONNECTIONS_LIMIT, read(CONNECTIONS_LIMIT))?;
        tuning.download_rate_limit =
            optional_number(DOWNLOAD_RATE_LIMIT, read(DOWNLOAD_RATE_LIMIT))?;
        tuning.upload_rate_limit = optional_number(UPLOAD_RATE_LIMIT, read(UPLOAD_RATE_LIMIT))?;
        tuning.cache_size = optional_number(CACHE_SIZE, read(CACHE_SIZE))?;
        tuning.active_downloads = optional_number(ACTIVE_DOWNLOADS, read(ACTIVE_DOWNLOADS))?;
        tuning.active_limit = optional_number(ACTIVE_LIMIT, read(ACTIVE_LIMIT))?;
        tuning.enable_dht = optional_flag(ENABLE_DHT, read(ENABLE_DHT))?;
        tuning.enable_lsd = optional_flag(ENABLE_LSD, read(ENABLE_LSD))?;
        tuning.enable_upnp = optional_flag(ENABLE_UPNP, read(ENABLE_UPNP))?;
        tuning.enable_natpmp = optional_flag(ENABLE_NATPMP, read(ENABLE_NATPMP))?;

        Ok(settings)
    }
}

fn parse_number<T: FromStr>(field: &'static str, raw: &str) -> ConfigResult<T> {
    raw.parse().map_err(|_| ConfigError::InvalidField {
        field,
        value: raw.to_string(),
        reason: "expected an integer",
    })
}

fn positive_duration(field: &'static str, raw: &str, value: Duration) -> ConfigResult<Duration> {
    if value.is_zero() {
        return Err(ConfigError::InvalidField {
            field,
            value: raw.to_string(),
            reason: "must be greater than zero",
        });
    }
    Ok(value)
}

fn optional_number(field: &'static str, raw: Option<String>) -> ConfigResult<Option<i64>> {
    raw.map(|value| parse_number(field, &value)).transpose()
}

fn optional_flag(field: &'static str, raw: Option<String>) -> ConfigResult<Option<bool>> {
    let Some(value) = raw else {
        return Ok(None);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidField {
            field,
            value,
            reason: "expected a boolean",
        }),
    }
}
