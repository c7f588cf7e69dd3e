//! Runtime configuration, loaded from a flat `toml` key/value table.

use serde::Deserialize;

use crate::error::CoreError;
use crate::identity::parse_app_identifier;

pub const DEFAULT_MAXIMUM_HOP_COUNT: u8 = 4;
pub const DEFAULT_HOP_COUNT_INFINITY: u8 = 255;
pub const DEFAULT_MTU: usize = 20;
pub const DEFAULT_MAXIMUM_MTU: usize = 512;
pub const DEFAULT_INTERNET_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_INTERNET_READ_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Deserialize)]
struct RawMeshConfig {
    app_identifier: String,
    #[serde(default = "default_maximum_hop_count")]
    maximum_hop_count: u8,
    #[serde(default = "default_hop_count_infinity")]
    hop_count_infinity: u8,
    #[serde(default = "default_mtu")]
    default_mtu: usize,
    #[serde(default = "default_maximum_mtu")]
    maximum_mtu: usize,
    #[serde(default = "default_internet_connect_timeout_ms")]
    internet_connect_timeout_ms: u64,
    #[serde(default = "default_internet_read_timeout_ms")]
    internet_read_timeout_ms: u64,
}

fn default_maximum_hop_count() -> u8 {
    DEFAULT_MAXIMUM_HOP_COUNT
}
fn default_hop_count_infinity() -> u8 {
    DEFAULT_HOP_COUNT_INFINITY
}
fn default_mtu() -> usize {
    DEFAULT_MTU
}
fn default_maximum_mtu() -> usize {
    DEFAULT_MAXIMUM_MTU
}
fn default_internet_connect_timeout_ms() -> u64 {
    DEFAULT_INTERNET_CONNECT_TIMEOUT_MS
}
fn default_internet_read_timeout_ms() -> u64 {
    DEFAULT_INTERNET_READ_TIMEOUT_MS
}

/// Runtime configuration for a [`crate::network::NetworkController`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshConfig {
    pub app_tag: [u8; 4],
    pub maximum_hop_count: u8,
    pub hop_count_infinity: u8,
    pub default_mtu: usize,
    pub maximum_mtu: usize,
    pub internet_connect_timeout_ms: u64,
    pub internet_read_timeout_ms: u64,
}

impl MeshConfig {
    pub fn new(app_tag: [u8; 4]) -> Self {
        Self {
            app_tag,
            maximum_hop_count: DEFAULT_MAXIMUM_HOP_COUNT,
            hop_count_infinity: DEFAULT_HOP_COUNT_INFINITY,
            default_mtu: DEFAULT_MTU,
            maximum_mtu: DEFAULT_MAXIMUM_MTU,
            internet_connect_timeout_ms: DEFAULT_INTERNET_CONNECT_TIMEOUT_MS,
            internet_read_timeout_ms: DEFAULT_INTERNET_READ_TIMEOUT_MS,
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, CoreError> {
        let raw: RawMeshConfig =
            toml::from_str(text).map_err(|err| CoreError::InvalidConfig(err.to_string()))?;

        let app_tag = parse_app_identifier(&raw.app_identifier)?;

        Ok(Self {
            app_tag,
            maximum_hop_count: raw.maximum_hop_count,
            hop_count_infinity: raw.hop_count_infinity,
            default_mtu: raw.default_mtu,
            maximum_mtu: raw.maximum_mtu,
            internet_connect_timeout_ms: raw.internet_connect_timeout_ms,
            internet_read_timeout_ms: raw.internet_read_timeout_ms,
        })
    }

    /// Clips a write to `max(DEFAULT_MTU, floor(0.99 * mtu))` bytes.
    pub fn clipped_mtu(&self, negotiated_mtu: usize) -> usize {
        let scaled = (negotiated_mtu as f64 * 0.99).floor() as usize;
        scaled.max(self.default_mtu)
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self::new(*b"\0\0\0\0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_toml_parses_app_identifier_and_defaults() {
        let config = MeshConfig::from_toml("app_identifier = \"deadbeef\"\n").unwrap();
        assert_eq!(config.app_tag, [0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(config.maximum_hop_count, DEFAULT_MAXIMUM_HOP_COUNT);
        assert_eq!(config.default_mtu, DEFAULT_MTU);
    }

    #[test]
    fn from_toml_rejects_bad_app_identifier() {
        assert!(MeshConfig::from_toml("app_identifier = \"nothex!!\"\n").is_err());
    }

    #[test]
    fn clipped_mtu_matches_scenario_f() {
        let config = MeshConfig::default();
        assert_eq!(config.clipped_mtu(100), 99);
    }

    #[test]
    fn clipped_mtu_never_drops_below_default() {
        let config = MeshConfig::default();
        assert_eq!(config.clipped_mtu(5), DEFAULT_MTU);
    }
}
