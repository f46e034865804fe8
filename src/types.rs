//! Shared types for chain interaction

use crate::error::{InterfaceError, Result};
use parity_scale_codec::{Decode, Encode, Input, Output};
use serde::{Deserialize, Serialize};

/// 32-byte block or extrinsic hash
pub type Hash = [u8; 32];

/// Render bytes as a `0x`-prefixed hex string
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse a `0x`-prefixed (or bare) hex string
pub fn from_hex(hex_str: &str) -> Result<Vec<u8>> {
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(hex_str).map_err(|e| InterfaceError::InvalidInput(format!("Invalid hex: {}", e)))
}

/// Runtime version as reported by the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeVersion {
    /// Runtime spec name (e.g., "reef")
    pub spec_name: String,
    /// Runtime spec version; metadata is cached per value
    pub spec_version: u32,
    /// Transaction format version
    pub transaction_version: u32,
}

/// Chain properties (`system_properties`)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainProperties {
    /// SS58 address format
    #[serde(default)]
    pub ss58_format: Option<u16>,
    /// Number of decimals of the native token
    #[serde(default)]
    pub token_decimals: Option<u8>,
    /// Symbol of the native token
    #[serde(default)]
    pub token_symbol: Option<String>,
}

/// Fee and weight estimate for an extrinsic (`payment_queryInfo`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    /// Dispatch weight
    pub weight: u64,
    /// Dispatch class (Normal, Operational, Mandatory)
    pub class: String,
    /// Fee excluding tip
    pub partial_fee: u128,
}

/// Requested lifetime of an extrinsic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Mortality {
    /// Valid for `period` blocks from the current chain head
    Mortal { period: u64 },
    /// Valid forever
    Immortal,
}

/// Transaction era (mortal or immortal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Era {
    /// Immortal transaction (never expires)
    Immortal,
    /// Mortal transaction with period and phase
    Mortal { period: u64, phase: u64 },
}

impl Era {
    /// Mortal era valid for `period` blocks starting around `current`.
    ///
    /// The period is rounded up to a power of two in `[4, 65536]` and the phase
    /// is quantized so that it survives the two-byte encoding.
    pub fn mortal(period: u64, current: u64) -> Self {
        let period = period
            .checked_next_power_of_two()
            .unwrap_or(1 << 16)
            .clamp(4, 1 << 16);
        let phase = current % period;
        let quantize_factor = (period >> 12).max(1);
        let quantized_phase = phase / quantize_factor * quantize_factor;
        Era::Mortal {
            period,
            phase: quantized_phase,
        }
    }

    /// Check if this is an immortal era
    pub fn is_immortal(&self) -> bool {
        matches!(self, Era::Immortal)
    }

    /// First block in which an extrinsic with this era is valid, given a block
    /// `current` inside the validity window.
    pub fn birth(&self, current: u64) -> u64 {
        match *self {
            Era::Immortal => 0,
            Era::Mortal { period, phase } => (current.max(phase) - phase) / period * period + phase,
        }
    }
}

impl Encode for Era {
    fn encode_to<T: Output + ?Sized>(&self, dest: &mut T) {
        match *self {
            Era::Immortal => dest.push_byte(0),
            Era::Mortal { period, phase } => {
                let quantize_factor = (period >> 12).max(1);
                let encoded = (period.trailing_zeros().saturating_sub(1)).clamp(1, 15) as u16
                    | (((phase / quantize_factor) << 4) as u16);
                encoded.encode_to(dest);
            }
        }
    }
}

impl Decode for Era {
    fn decode<I: Input>(input: &mut I) -> std::result::Result<Self, parity_scale_codec::Error> {
        let first = input.read_byte()?;
        if first == 0 {
            return Ok(Era::Immortal);
        }
        let encoded = first as u64 + ((input.read_byte()? as u64) << 8);
        let period = 2 << (encoded % (1 << 4));
        let quantize_factor = (period >> 12).max(1);
        let phase = (encoded >> 4) * quantize_factor;
        if period >= 4 && phase < period {
            Ok(Era::Mortal { period, phase })
        } else {
            Err("Invalid period and phase".into())
        }
    }
}

/// Chain material bound into every signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Material {
    pub genesis_hash: Hash,
    pub spec_version: u32,
    pub transaction_version: u32,
}

/// How the signer is encoded in the extrinsic envelope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AddressType {
    /// `MultiAddress::Id` (variant byte + 32 bytes)
    #[default]
    MultiAddress,
    /// Bare 32-byte account id
    AccountId,
}

/// SS58 address format prefixes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFormat {
    /// Polkadot mainnet (prefix 0, addresses start with '1')
    Polkadot = 0,
    /// Kusama (prefix 2)
    Kusama = 2,
    /// Substrate generic (prefix 42, addresses start with '5'); also used by Reef
    Substrate = 42,
}

impl AddressFormat {
    /// Get the prefix value
    pub fn prefix(self) -> u16 {
        self as u16
    }
}
