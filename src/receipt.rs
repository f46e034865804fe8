//! Extrinsic receipts and outcome classification

use crate::codec::primitive::value_as_u128;
use crate::codec::value_to_bytes;
use crate::error::{InterfaceError, Result};
use crate::events::EventRecord;
use crate::metadata::RuntimeMetadata;
use crate::types::{to_hex, Hash};
use scale_value::{Composite, Value, ValueDef};
use std::fmt;

/// Chain-reported reason an extrinsic failed to dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchFailure {
    /// Error raised by a module, resolved against metadata where possible
    Module {
        module_index: u8,
        error_index: u8,
        module: Option<String>,
        error: Option<String>,
        docs: Option<String>,
    },
    /// Any other `DispatchError` variant, e.g. `BadOrigin` or `Token(NoFunds)`
    Other(String),
}

impl DispatchFailure {
    /// Interpret a decoded `DispatchError` value.
    pub fn from_value(value: &Value, metadata: &RuntimeMetadata) -> Self {
        let Some((name, payload)) = variant_parts(value) else {
            return DispatchFailure::Other(format!("{:?}", value.value));
        };

        if name == "Module" {
            let fields = payload.first().copied();
            let index = fields.and_then(|f| field_u8(f, "index", 0));
            let error = fields.and_then(|f| field_u8(f, "error", 1));
            if let (Some(module_index), Some(error_index)) = (index, error) {
                let resolved = metadata.error(module_index, error_index);
                return DispatchFailure::Module {
                    module_index,
                    error_index,
                    module: resolved.map(|(m, _)| m.name.clone()),
                    error: resolved.map(|(_, e)| e.name.clone()),
                    docs: resolved
                        .map(|(_, e)| e.description())
                        .filter(|d| !d.is_empty()),
                };
            }
        }

        match payload.first().and_then(|inner| variant_parts(inner)) {
            Some((inner, _)) => DispatchFailure::Other(format!("{}({})", name, inner)),
            None => DispatchFailure::Other(name.to_string()),
        }
    }
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchFailure::Module {
                module: Some(module),
                error: Some(error),
                docs,
                ..
            } => {
                write!(f, "{}.{}", module, error)?;
                if let Some(docs) = docs {
                    write!(f, ": {}", docs)?;
                }
                Ok(())
            }
            DispatchFailure::Module {
                module_index,
                error_index,
                ..
            } => write!(
                f,
                "Module error (module {}, error {})",
                module_index, error_index
            ),
            DispatchFailure::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtrinsicOutcome {
    Success,
    Failed(DispatchFailure),
}

/// Record of a submitted extrinsic.
///
/// A receipt returned without waiting carries only the hash. Once inclusion
/// is confirmed it carries the block, the extrinsic's events and exactly one
/// outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtrinsicReceipt {
    extrinsic_hash: Hash,
    signer: Option<[u8; 32]>,
    block_hash: Option<Hash>,
    extrinsic_index: Option<u32>,
    finalized: bool,
    triggered_events: Vec<EventRecord>,
    outcome: Option<ExtrinsicOutcome>,
}

impl ExtrinsicReceipt {
    /// Receipt for an extrinsic accepted into the pool but not awaited
    pub fn pending(extrinsic_hash: Hash, signer: Option<[u8; 32]>) -> Self {
        Self {
            extrinsic_hash,
            signer,
            block_hash: None,
            extrinsic_index: None,
            finalized: false,
            triggered_events: Vec::new(),
            outcome: None,
        }
    }

    /// Receipt for an included extrinsic.
    ///
    /// `events` must already be filtered to this extrinsic's index. The
    /// outcome is `Failed` iff one of them is `System.ExtrinsicFailed`.
    pub fn included(
        pending: Self,
        block_hash: Hash,
        extrinsic_index: u32,
        events: Vec<EventRecord>,
        finalized: bool,
        metadata: &RuntimeMetadata,
    ) -> Self {
        let outcome = match events
            .iter()
            .find(|record| record.event.is("System", "ExtrinsicFailed"))
        {
            Some(record) => ExtrinsicOutcome::Failed(match record.event.values.first() {
                Some(error) => DispatchFailure::from_value(error, metadata),
                None => DispatchFailure::Other("Unknown".to_string()),
            }),
            None => ExtrinsicOutcome::Success,
        };

        Self {
            block_hash: Some(block_hash),
            extrinsic_index: Some(extrinsic_index),
            finalized,
            triggered_events: events,
            outcome: Some(outcome),
            ..pending
        }
    }

    pub fn extrinsic_hash(&self) -> Hash {
        self.extrinsic_hash
    }

    pub fn extrinsic_hash_hex(&self) -> String {
        to_hex(&self.extrinsic_hash)
    }

    pub fn block_hash(&self) -> Option<Hash> {
        self.block_hash
    }

    pub fn extrinsic_index(&self) -> Option<u32> {
        self.extrinsic_index
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// No inclusion observed yet
    pub fn is_pending(&self) -> bool {
        self.outcome.is_none()
    }

    pub fn outcome(&self) -> Option<&ExtrinsicOutcome> {
        self.outcome.as_ref()
    }

    /// True only for an included extrinsic without an `ExtrinsicFailed` event
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Some(ExtrinsicOutcome::Success))
    }

    pub fn triggered_events(&self) -> &[EventRecord] {
        &self.triggered_events
    }

    pub fn error_message(&self) -> Option<String> {
        match &self.outcome {
            Some(ExtrinsicOutcome::Failed(failure)) => Some(failure.to_string()),
            _ => None,
        }
    }

    /// Dispatch weight from `ExtrinsicSuccess` or `ExtrinsicFailed`
    pub fn weight(&self) -> Option<u64> {
        self.triggered_events.iter().find_map(|record| {
            let info = match (record.event.module.as_str(), record.event.name.as_str()) {
                ("System", "ExtrinsicSuccess") => record.event.values.first(),
                ("System", "ExtrinsicFailed") => record.event.values.get(1),
                _ => None,
            }?;
            let weight = field(info, "weight", 0)?;
            value_as_u128(weight).ok().and_then(|w| u64::try_from(w).ok())
        })
    }

    /// Fees withdrawn from the signer (`Balances.Withdraw`).
    ///
    /// `None` when nothing was withdrawn or the amounts overflow a u128.
    pub fn total_fee_amount(&self) -> Option<u128> {
        let signer = self.signer?;
        let withdrawn: Vec<u128> = self
            .triggered_events
            .iter()
            .filter(|record| record.event.is("Balances", "Withdraw"))
            .filter(|record| {
                record
                    .event
                    .values
                    .first()
                    .and_then(value_to_bytes)
                    .is_some_and(|who| who == signer)
            })
            .filter_map(|record| record.event.values.get(1))
            .filter_map(|amount| value_as_u128(amount).ok())
            .collect();
        if withdrawn.is_empty() {
            None
        } else {
            withdrawn
                .iter()
                .try_fold(0u128, |total, amount| total.checked_add(*amount))
        }
    }

    /// Turn a failed outcome into an error
    pub fn ensure_success(&self) -> Result<&Self> {
        match &self.outcome {
            Some(ExtrinsicOutcome::Success) => Ok(self),
            Some(ExtrinsicOutcome::Failed(failure)) => {
                Err(InterfaceError::ExtrinsicFailed(failure.clone()))
            }
            None => Err(InterfaceError::InvalidInput(format!(
                "Extrinsic {} has no outcome yet",
                self.extrinsic_hash_hex()
            ))),
        }
    }
}

fn variant_parts(value: &Value) -> Option<(&str, Vec<&Value>)> {
    match &value.value {
        ValueDef::Variant(variant) => {
            let values = match &variant.values {
                Composite::Named(fields) => fields.iter().map(|(_, v)| v).collect(),
                Composite::Unnamed(values) => values.iter().collect(),
            };
            Some((variant.name.as_str(), values))
        }
        _ => None,
    }
}

/// Named field of a composite, or the `position`th of an unnamed one
fn field<'a>(value: &'a Value, name: &str, position: usize) -> Option<&'a Value> {
    match &value.value {
        ValueDef::Composite(Composite::Named(fields)) => {
            fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
        }
        ValueDef::Composite(Composite::Unnamed(values)) => values.get(position),
        _ => None,
    }
}

fn field_u8(value: &Value, name: &str, position: usize) -> Option<u8> {
    let raw = value_as_u128(field(value, name, position)?).ok()?;
    u8::try_from(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Phase;
    use crate::testing::{
        alice, balances_event, dispatch_info, fixture_metadata, module_error, system_event,
    };

    fn included(events: Vec<EventRecord>) -> ExtrinsicReceipt {
        ExtrinsicReceipt::included(
            ExtrinsicReceipt::pending([1; 32], Some(*alice().public_key())),
            [2; 32],
            1,
            events,
            false,
            &fixture_metadata(),
        )
    }

    #[test]
    fn test_pending_receipt() {
        let receipt = ExtrinsicReceipt::pending([1; 32], None);
        assert!(receipt.is_pending());
        assert!(!receipt.is_success());
        assert_eq!(receipt.block_hash(), None);
        assert!(receipt.triggered_events().is_empty());
        assert!(receipt.ensure_success().is_err());
    }

    #[test]
    fn test_success_classification() {
        let receipt = included(vec![system_event(1, "ExtrinsicSuccess", vec![dispatch_info(161_000)])]);
        assert!(receipt.is_success());
        assert_eq!(receipt.error_message(), None);
        assert_eq!(receipt.weight(), Some(161_000));
        assert_eq!(receipt.block_hash(), Some([2; 32]));
        assert!(receipt.ensure_success().is_ok());
    }

    #[test]
    fn test_module_error_classification() {
        let receipt = included(vec![system_event(
            1,
            "ExtrinsicFailed",
            vec![module_error(6, 3), dispatch_info(5)],
        )]);
        assert!(!receipt.is_success());
        assert_eq!(
            receipt.error_message().as_deref(),
            Some("Balances.InsufficientBalance: Balance too low to send value")
        );
        assert_eq!(receipt.weight(), Some(5));
        match receipt.ensure_success() {
            Err(InterfaceError::ExtrinsicFailed(DispatchFailure::Module {
                module_index,
                error_index,
                ..
            })) => assert_eq!((module_index, error_index), (6, 3)),
            other => panic!("Expected ExtrinsicFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolvable_module_error() {
        let failure = DispatchFailure::from_value(&module_error(42, 7), &fixture_metadata());
        assert_eq!(failure.to_string(), "Module error (module 42, error 7)");
    }

    #[test]
    fn test_other_dispatch_errors() {
        let metadata = fixture_metadata();
        let bad_origin = Value::unnamed_variant("BadOrigin", []);
        assert_eq!(
            DispatchFailure::from_value(&bad_origin, &metadata).to_string(),
            "BadOrigin"
        );
        let token = Value::unnamed_variant("Token", [Value::unnamed_variant("NoFunds", [])]);
        assert_eq!(
            DispatchFailure::from_value(&token, &metadata).to_string(),
            "Token(NoFunds)"
        );
    }

    #[test]
    fn test_total_fee_amount() {
        let alice_key = *alice().public_key();
        let receipt = included(vec![
            balances_event(1, "Withdraw", vec![Value::from_bytes(alice_key), Value::u128(125)]),
            balances_event(1, "Withdraw", vec![Value::from_bytes([9u8; 32]), Value::u128(1000)]),
            system_event(1, "ExtrinsicSuccess", vec![dispatch_info(1)]),
        ]);
        assert_eq!(receipt.total_fee_amount(), Some(125));

        let no_fee = included(vec![system_event(1, "ExtrinsicSuccess", vec![dispatch_info(1)])]);
        assert_eq!(no_fee.total_fee_amount(), None);
    }

    #[test]
    fn test_total_fee_amount_sums_without_overflow() {
        let alice_key = *alice().public_key();
        let withdraw = |amount: u128| {
            balances_event(1, "Withdraw", vec![Value::from_bytes(alice_key), Value::u128(amount)])
        };
        let two = included(vec![withdraw(100), withdraw(25)]);
        assert_eq!(two.total_fee_amount(), Some(125));

        let overflowing = included(vec![withdraw(u128::MAX), withdraw(1)]);
        assert_eq!(overflowing.total_fee_amount(), None);
    }

    #[test]
    fn test_events_outside_extrinsic_are_ignored_by_caller() {
        let record = system_event(1, "ExtrinsicSuccess", vec![dispatch_info(1)]);
        assert_eq!(record.phase, Phase::ApplyExtrinsic(1));
    }
}
