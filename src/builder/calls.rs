//! Parameter helpers for common calls
//!
//! Thin constructors over [`CallParams`] so callers can write
//! `balances_transfer(dest, amount)` instead of building values by hand.

use super::CallParams;
use crate::address::decode_ss58;
use crate::error::Result;
use scale_value::Value;

/// Build call parameters from name/value pairs
pub fn params<const N: usize>(fields: [(&str, Value); N]) -> CallParams {
    fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// `MultiAddress::Id` value for an SS58 address
pub fn multi_address(address: &str) -> Result<Value> {
    Ok(Value::unnamed_variant("Id", [account_id(address)?]))
}

/// AccountId32 bytes value for an SS58 address
pub fn account_id(address: &str) -> Result<Value> {
    let (pubkey, _) = decode_ss58(address)?;
    Ok(Value::from_bytes(pubkey))
}

/// Parameters for `Balances.transfer`
pub fn balances_transfer(dest: &str, value: u128) -> Result<CallParams> {
    Ok(params([
        ("dest", multi_address(dest)?),
        ("value", Value::u128(value)),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::BOB;
    use scale_value::ValueDef;

    #[test]
    fn test_params_helper() {
        let params = params([("foo", Value::u128(42)), ("bar", Value::bool(true))]);
        assert_eq!(params.len(), 2);
        assert_eq!(params["foo"], Value::u128(42));
    }

    #[test]
    fn test_multi_address() {
        let value = multi_address(BOB).unwrap();
        match value.value {
            ValueDef::Variant(variant) => assert_eq!(variant.name, "Id"),
            other => panic!("Expected variant, got {:?}", other),
        }
        assert!(multi_address("not-an-address").is_err());
    }

    #[test]
    fn test_balances_transfer_params() {
        let params = balances_transfer(BOB, 10).unwrap();
        let names: Vec<_> = params.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["dest", "value"]);
    }
}
