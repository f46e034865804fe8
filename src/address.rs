//! SS58 address encoding and decoding
//!
//! Public keys are rendered as base58 strings carrying a network format
//! identifier and a two-byte blake2b-512 checksum.
//! See: https://docs.substrate.io/reference/address-formats/

use crate::error::{InterfaceError, Result};
use blake2::{Blake2b512, Digest};

/// Domain separator hashed in front of the payload for the checksum
const SS58_PREFIX: &[u8] = b"SS58PRE";

/// Checksum length used for 32-byte account ids
const CHECKSUM_LEN: usize = 2;

/// Encode a 32-byte public key as an SS58 address for `format`
pub fn encode_ss58(public_key: &[u8], format: u16) -> Result<String> {
    if public_key.len() != 32 {
        return Err(InterfaceError::InvalidAddress(format!(
            "Public key must be 32 bytes, got {}",
            public_key.len()
        )));
    }

    let mut payload = encode_format(format)?;
    payload.extend_from_slice(public_key);

    let checksum = ss58_checksum(&payload);
    payload.extend_from_slice(&checksum[..CHECKSUM_LEN]);

    Ok(bs58::encode(&payload).into_string())
}

/// Decode an SS58 address into its public key and network format
pub fn decode_ss58(address: &str) -> Result<([u8; 32], u16)> {
    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|e| InterfaceError::InvalidAddress(format!("Invalid base58: {}", e)))?;

    if decoded.len() < 1 + 32 + CHECKSUM_LEN {
        return Err(InterfaceError::InvalidAddress(
            "Address too short".to_string(),
        ));
    }

    let (format, format_len) = decode_format(&decoded)?;

    let checksum_start = decoded.len() - CHECKSUM_LEN;
    let public_key: [u8; 32] = decoded[format_len..checksum_start]
        .try_into()
        .map_err(|_| {
            InterfaceError::InvalidAddress(format!(
                "Invalid public key length: {}",
                checksum_start - format_len
            ))
        })?;

    let expected = ss58_checksum(&decoded[..checksum_start]);
    if decoded[checksum_start..] != expected[..CHECKSUM_LEN] {
        return Err(InterfaceError::InvalidAddress("Invalid checksum".to_string()));
    }

    Ok((public_key, format))
}

/// Decode an SS58 address, rejecting any network format other than `expected`
pub fn decode_ss58_for_format(address: &str, expected: u16) -> Result<[u8; 32]> {
    let (public_key, format) = decode_ss58(address)?;
    if format != expected {
        return Err(InterfaceError::InvalidAddress(format!(
            "Address format {} does not match expected {}",
            format, expected
        )));
    }
    Ok(public_key)
}

/// Check that `address` is well-formed and, if given, uses `expected_format`
pub fn is_valid_ss58_address(address: &str, expected_format: Option<u16>) -> bool {
    match decode_ss58(address) {
        Ok((_, format)) => expected_format.map_or(true, |expected| format == expected),
        Err(_) => false,
    }
}

/// Single-byte formats below 64, two-byte formats below 16384
fn encode_format(format: u16) -> Result<Vec<u8>> {
    match format {
        0..=63 => Ok(vec![format as u8]),
        64..=16383 => {
            let first = ((format & 0b0000_0000_1111_1100) as u8) >> 2 | 0b0100_0000;
            let second = ((format >> 8) as u8) | ((format & 0b0000_0000_0000_0011) as u8) << 6;
            Ok(vec![first, second])
        }
        _ => Err(InterfaceError::InvalidAddress(format!(
            "Invalid address format: {}",
            format
        ))),
    }
}

fn decode_format(data: &[u8]) -> Result<(u16, usize)> {
    match data[0] {
        0..=63 => Ok((data[0] as u16, 1)),
        64..=127 => {
            let lower = (data[0] & 0b0011_1111) << 2 | (data[1] >> 6);
            let upper = data[1] & 0b0011_1111;
            Ok((((upper as u16) << 8) | (lower as u16), 2))
        }
        other => Err(InterfaceError::InvalidAddress(format!(
            "Invalid format byte: {}",
            other
        ))),
    }
}

fn ss58_checksum(payload: &[u8]) -> [u8; 64] {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_PREFIX);
    hasher.update(payload);
    let mut checksum = [0u8; 64];
    checksum.copy_from_slice(&hasher.finalize());
    checksum
}
