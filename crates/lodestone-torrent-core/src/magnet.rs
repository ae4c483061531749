//! Magnet URI parsing.
//!
//! Only BitTorrent v1 topics (`xt=urn:btih:`) are recognised. The hash may be 40 hex
//! characters or 32 base32 characters.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use data_encoding::BASE32;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MagnetError, MagnetResult};
use crate::model::InfoHash;

const MAGNET_SCHEME: &str = "magnet";
const BTIH_PREFIX: &str = "urn:btih:";

/// Parsed magnet link, ready to be handed to an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagnetLink {
    /// Identifier of the torrent.
    pub info_hash: InfoHash,
    /// Optional display name (`dn`).
    pub display_name: Option<String>,
    /// Tracker announce URLs (`tr`), in URI order.
    pub trackers: Vec<String>,
    /// Web seed URLs (`ws`), in URI order.
    pub web_seeds: Vec<String>,
}

impl MagnetLink {
    /// Parse and validate a magnet URI.
    ///
    /// # Errors
    ///
    /// Returns `MagnetError` when the URI is empty, malformed, uses another scheme, or
    /// carries no valid `btih` topic.
    pub fn parse(uri: &str) -> MagnetResult<Self> {
        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return Err(MagnetError::Empty);
        }

        let url = Url::parse(trimmed).map_err(|err| MagnetError::Malformed {
            detail: err.to_string(),
        })?;
        if url.scheme() != MAGNET_SCHEME {
            return Err(MagnetError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
            });
        }

        let mut info_hash = None;
        let mut display_name = None;
        let mut trackers = Vec::new();
        let mut web_seeds = Vec::new();

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "xt" => {
                    if info_hash.is_some() {
                        continue;
                    }
                    if let Some(hash) = strip_prefix_ignore_case(&value, BTIH_PREFIX) {
                        info_hash = Some(parse_info_hash(hash)?);
                    }
                }
                "dn" if display_name.is_none() && !value.trim().is_empty() => {
                    display_name = Some(value.trim().to_string());
                }
                "tr" if !value.is_empty() => trackers.push(value.into_owned()),
                "ws" if !value.is_empty() => web_seeds.push(value.into_owned()),
                _ => {}
            }
        }

        let info_hash = info_hash.ok_or(MagnetError::MissingInfoHash)?;
        Ok(Self {
            info_hash,
            display_name,
            trackers,
            web_seeds,
        })
    }

    /// Name to show before metadata arrives: the display name, or the info hash.
    #[must_use]
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.info_hash.to_string())
    }
}

impl FromStr for MagnetLink {
    type Err = MagnetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Display for MagnetLink {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "magnet:?xt=urn:btih:{}", self.info_hash)
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

fn parse_info_hash(value: &str) -> MagnetResult<InfoHash> {
    let invalid = || MagnetError::InvalidInfoHash {
        value: value.to_string(),
    };
    match value.len() {
        40 => {
            let mut bytes = [0u8; 20];
            hex::decode_to_slice(value, &mut bytes).map_err(|_| invalid())?;
            Ok(InfoHash::new(bytes))
        }
        32 => {
            let decoded = BASE32
                .decode(value.to_ascii_uppercase().as_bytes())
                .map_err(|_| invalid())?;
            let bytes: [u8; 20] = decoded.try_into().map_err(|_| invalid())?;
            Ok(InfoHash::new(bytes))
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX_HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn parses_hex_hash_with_name_and_trackers() {
        let uri = format!(
            "magnet:?xt=urn:btih:{HEX_HASH}&dn=Ubuntu+24.04&tr=udp%3A%2F%2Ftracker.example%3A1337&tr=http%3A%2F%2Falt.example%2Fannounce"
        );
        let link = MagnetLink::parse(&uri).expect("valid magnet");
        assert_eq!(link.info_hash.to_string(), HEX_HASH);
        assert_eq!(link.display_name.as_deref(), Some("Ubuntu 24.04"));
        assert_eq!(
            link.trackers,
            vec![
                "udp://tracker.example:1337".to_string(),
                "http://alt.example/announce".to_string()
            ]
        );
        assert!(link.web_seeds.is_empty());
        assert_eq!(link.label(), "Ubuntu 24.04");
    }

    #[test]
    fn parses_base32_hash() {
        let link = MagnetLink::parse("magnet:?xt=urn:btih:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")
            .expect("base32 magnet");
        assert_eq!(link.info_hash.as_bytes(), &[0u8; 20]);
        assert_eq!(link.label(), "0".repeat(40));
    }

    #[test]
    fn base32_hash_matches_its_hex_form() {
        let upper = MagnetLink::parse("magnet:?xt=urn:btih:AERUKZ4JVPG66AJDIVTYTK6N54ASGRLH")
            .expect("base32 magnet");
        assert_eq!(upper.info_hash.to_string(), HEX_HASH);
        let lower = MagnetLink::parse("magnet:?xt=urn:btih:aerukz4jvpg66ajdivtytk6n54asgrlh")
            .expect("lowercase base32 magnet");
        assert_eq!(lower.info_hash, upper.info_hash);
        assert!(matches!(
            MagnetLink::parse("magnet:?xt=urn:btih:AERUKZ4JVPG66AJDIVTYTK6N54ASGRL1"),
            Err(MagnetError::InvalidInfoHash { .. })
        ));
    }

    #[test]
    fn uppercase_prefix_and_hex_are_accepted() {
        let uri = format!("magnet:?xt=URN:BTIH:{}", HEX_HASH.to_uppercase());
        let link = MagnetLink::parse(&uri).expect("uppercase magnet");
        assert_eq!(link.info_hash.to_string(), HEX_HASH);
    }

    #[test]
    fn rejects_invalid_inputs() {
        assert_eq!(MagnetLink::parse("   "), Err(MagnetError::Empty));
        assert!(matches!(
            MagnetLink::parse("not a uri"),
            Err(MagnetError::Malformed { .. })
        ));
        assert!(matches!(
            MagnetLink::parse("https://example.com/file.torrent"),
            Err(MagnetError::UnsupportedScheme { scheme }) if scheme == "https"
        ));
        assert_eq!(
            MagnetLink::parse("magnet:?dn=nothing"),
            Err(MagnetError::MissingInfoHash)
        );
        assert!(matches!(
            MagnetLink::parse("magnet:?xt=urn:btih:1234"),
            Err(MagnetError::InvalidInfoHash { .. })
        ));
        assert!(matches!(
            MagnetLink::parse("magnet:?xt=urn:btih:zz23456789abcdef0123456789abcdef01234567"),
            Err(MagnetError::InvalidInfoHash { .. })
        ));
    }

    #[test]
    fn display_renders_canonical_topic() {
        let link: MagnetLink = format!("magnet:?xt=urn:btih:{HEX_HASH}&dn=x")
            .parse()
            .expect("valid magnet");
        assert_eq!(link.to_string(), format!("magnet:?xt=urn:btih:{HEX_HASH}"));
    }
}
