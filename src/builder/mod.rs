//! Call composition
//!
//! Build encoded calls from a module name, a function name and named
//! parameter values, validated against the call's metadata schema.

pub mod calls;

pub use calls::{account_id, balances_transfer, multi_address, params};

use crate::codec::ScaleCodec;
use crate::error::{InterfaceError, Result};
use crate::metadata::CallSpec;
use scale_value::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Parameter name to value; ordering comes from the schema, not the map
pub type CallParams = BTreeMap<String, Value>;

/// An encoded call: `module index ‖ call index ‖ params in schema order`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    module: String,
    function: String,
    module_index: u8,
    call_index: u8,
    args: Vec<(String, Vec<u8>)>,
    bytes: Vec<u8>,
}

impl Call {
    fn new(spec: &CallSpec, args: Vec<(String, Vec<u8>)>) -> Self {
        let mut bytes = vec![spec.module_index, spec.call_index];
        for (_, encoded) in &args {
            bytes.extend_from_slice(encoded);
        }
        Self {
            module: spec.module.clone(),
            function: spec.function.clone(),
            module_index: spec.module_index,
            call_index: spec.call_index,
            args,
            bytes,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    /// `[module index, call index]`
    pub fn call_index(&self) -> [u8; 2] {
        [self.module_index, self.call_index]
    }

    /// Encoded parameters, in schema order
    pub fn args(&self) -> &[(String, Vec<u8>)] {
        &self.args
    }

    /// Wire bytes of the call
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Compose a call against `spec`.
///
/// Every schema parameter must be supplied and nothing else may be; all
/// validation and encoding happens here, before anything is signed or sent.
pub fn compose_call(spec: &CallSpec, params: &CallParams, codec: &ScaleCodec<'_>) -> Result<Call> {
    let call_name = spec.qualified_name();

    if let Some(missing) = spec.params.iter().find(|p| !params.contains_key(&p.name)) {
        return Err(InterfaceError::MissingParameter {
            call: call_name,
            param: missing.name.clone(),
        });
    }
    if let Some(extra) = params
        .keys()
        .find(|name| !spec.params.iter().any(|p| p.name == **name))
    {
        return Err(InterfaceError::ExtraParameter {
            call: call_name,
            param: extra.clone(),
        });
    }

    let args = spec
        .params
        .iter()
        .map(|param| {
            // Presence checked above
            let value = &params[&param.name];
            let encoded = codec
                .registry()
                .check_nested(&param.descriptor)
                .and_then(|()| codec.encode(&param.descriptor, value))
                .map_err(|e| e.for_param(&param.name))?;
            Ok((param.name.clone(), encoded))
        })
        .collect::<Result<Vec<_>>>()?;

    let call = Call::new(spec, args);
    debug!(call = %call_name, len = call.bytes.len(), "Composed call");
    Ok(call)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::CallParam;
    use crate::registry::{parse_type_string, TypeRegistry, DEFAULT_MAX_ALIAS_HOPS};
    use crate::testing::{fixture_metadata, BOB};

    fn compose(module: &str, function: &str, params: &CallParams) -> Result<Call> {
        let registry = TypeRegistry::new("test", DEFAULT_MAX_ALIAS_HOPS).unwrap();
        let snapshot = registry.snapshot();
        let codec = ScaleCodec::new(&snapshot, Some(42));
        let spec = fixture_metadata().call_spec(module, function)?;
        compose_call(&spec, params, &codec)
    }

    fn transfer_params(value: u128) -> CallParams {
        params([("dest", Value::string(BOB)), ("value", Value::u128(value))])
    }

    #[test]
    fn test_transfer_call_layout() {
        let call = compose("Balances", "transfer", &transfer_params(1_000_000_000_000_000_000)).unwrap();
        let bytes = call.as_bytes();
        // Balances is module 6, transfer is call 0
        assert_eq!(&bytes[..2], &[6, 0]);
        // MultiAddress::Id
        assert_eq!(bytes[2], 0x00);
        assert_eq!(
            hex::encode(&bytes[3..35]),
            "5c768c4f5f8dca76bc5c20cbdb3f42299fab50107ce6386f581b7800d603067a"
        );
        // Compact(10^18) uses the big-integer mode: 8 bytes
        assert_eq!(bytes[35], 0b0001_0011);
        assert_eq!(&bytes[36..], &1_000_000_000_000_000_000u128.to_le_bytes()[..8]);
        assert_eq!(call.args().len(), 2);
        assert_eq!(call.args()[0].0, "dest");
        assert_eq!(call.call_index(), [6, 0]);
    }

    #[test]
    fn test_call_bytes_are_deterministic() {
        let first = compose("Balances", "transfer", &transfer_params(42)).unwrap();
        let second = compose("Balances", "transfer", &transfer_params(42)).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_parameter() {
        let params = params([("dest", Value::string(BOB))]);
        match compose("Balances", "transfer", &params) {
            Err(InterfaceError::MissingParameter { call, param }) => {
                assert_eq!(call, "Balances.transfer");
                assert_eq!(param, "value");
            }
            other => panic!("Expected MissingParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_extra_parameter() {
        let mut params = transfer_params(1);
        params.insert("memo".to_string(), Value::string("hi"));
        match compose("Balances", "transfer", &params) {
            Err(InterfaceError::ExtraParameter { param, .. }) => assert_eq!(param, "memo"),
            other => panic!("Expected ExtraParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_encoding_error_names_parameter() {
        let params = params([("dest", Value::string(BOB)), ("value", Value::i128(-5))]);
        match compose("Balances", "transfer", &params) {
            Err(InterfaceError::Encoding { param, .. }) => assert_eq!(param, "value"),
            other => panic!("Expected Encoding, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_call() {
        assert!(matches!(
            compose("Balances", "burn", &CallParams::new()),
            Err(InterfaceError::UnknownCall { .. })
        ));
    }

    #[test]
    fn test_bytes_param() {
        let call = compose("System", "remark", &params([("remark", Value::string("0x00"))])).unwrap();
        assert_eq!(call.as_bytes(), &[0, 0, 0x04, 0x00]);
    }

    #[test]
    fn test_unresolvable_param_type_names_parameter() {
        let registry = TypeRegistry::new("test", DEFAULT_MAX_ALIAS_HOPS).unwrap();
        let snapshot = registry.snapshot();
        let codec = ScaleCodec::new(&snapshot, Some(42));
        let spec = CallSpec {
            module: "Assets".to_string(),
            function: "mint".to_string(),
            module_index: 9,
            call_index: 1,
            params: vec![CallParam {
                name: "amount".to_string(),
                type_name: "Compact<FooBalance>".to_string(),
                descriptor: parse_type_string("Compact<FooBalance>").unwrap(),
            }],
        };
        let err = compose_call(&spec, &params([("amount", Value::u128(1))]), &codec).unwrap_err();
        match &err {
            InterfaceError::Encoding { param, type_name, .. } => {
                assert_eq!(param, "amount");
                assert_eq!(type_name, "foobalance");
            }
            other => panic!("Expected Encoding, got {:?}", other),
        }
        assert!(err.to_string().contains("amount"));
    }
}
