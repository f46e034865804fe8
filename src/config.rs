//! Interface configuration

use crate::error::{InterfaceError, Result};
use crate::registry::{is_known_preset, DEFAULT_MAX_ALIAS_HOPS, DEFAULT_PRESET};
use crate::types::AddressType;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_type_registry_preset() -> String {
    DEFAULT_PRESET.to_string()
}

fn default_era_period() -> u64 {
    64
}

fn default_inclusion_timeout_secs() -> u64 {
    120
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_alias_hops() -> usize {
    DEFAULT_MAX_ALIAS_HOPS
}

/// Settings for a [`crate::SubstrateInterface`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceConfig {
    /// SS58 format for addresses; falls back to the chain's properties, then 42
    #[serde(default)]
    pub ss58_format: Option<u16>,
    /// Bundled preset layered over the default one
    #[serde(default = "default_type_registry_preset")]
    pub type_registry_preset: String,
    /// Mortal era length in blocks
    #[serde(default = "default_era_period")]
    pub era_period: u64,
    /// Bound on inclusion/finalization waits
    #[serde(default = "default_inclusion_timeout_secs")]
    pub inclusion_timeout_secs: u64,
    /// Bound on each single transport request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_alias_hops")]
    pub max_alias_hops: usize,
    #[serde(default)]
    pub address_type: AddressType,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            ss58_format: None,
            type_registry_preset: default_type_registry_preset(),
            era_period: default_era_period(),
            inclusion_timeout_secs: default_inclusion_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_alias_hops: default_max_alias_hops(),
            address_type: AddressType::default(),
        }
    }
}

impl InterfaceConfig {
    /// Parse and validate a JSON config; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !is_known_preset(&self.type_registry_preset) {
            return Err(InterfaceError::Config(format!(
                "Unknown type registry preset: {}",
                self.type_registry_preset
            )));
        }
        if self.era_period == 0 {
            return Err(InterfaceError::Config("eraPeriod must be positive".into()));
        }
        if self.inclusion_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(InterfaceError::Config("Timeouts must be positive".into()));
        }
        if self.max_alias_hops == 0 {
            return Err(InterfaceError::Config("maxAliasHops must be positive".into()));
        }
        Ok(())
    }

    pub fn inclusion_timeout(&self) -> Duration {
        Duration::from_secs(self.inclusion_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = InterfaceConfig::from_json("{}").unwrap();
        assert_eq!(config, InterfaceConfig::default());
        assert_eq!(config.era_period, 64);
        assert_eq!(config.inclusion_timeout(), Duration::from_secs(120));
        assert_eq!(config.address_type, AddressType::MultiAddress);
        assert_eq!(config.ss58_format, None);
    }

    #[test]
    fn test_camel_case_fields() {
        let config = InterfaceConfig::from_json(
            r#"{
                "ss58Format": 42,
                "typeRegistryPreset": "reef",
                "eraPeriod": 128,
                "requestTimeoutSecs": 5,
                "addressType": "accountId"
            }"#,
        )
        .unwrap();
        assert_eq!(config.ss58_format, Some(42));
        assert_eq!(config.type_registry_preset, "reef");
        assert_eq!(config.era_period, 128);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.address_type, AddressType::AccountId);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            InterfaceConfig::from_json(r#"{"typeRegistryPreset": "nope"}"#),
            Err(InterfaceError::Config(_))
        ));
        assert!(InterfaceConfig::from_json(r#"{"eraPeriod": 0}"#).is_err());
        assert!(InterfaceConfig::from_json(r#"{"inclusionTimeoutSecs": 0}"#).is_err());
        assert!(InterfaceConfig::from_json("not json").is_err());
    }
}
