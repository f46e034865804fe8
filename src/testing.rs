//! Fixtures and an in-memory transport for tests

use crate::builder::{balances_transfer, compose_call, Call};
use crate::codec::{blake2_256, ScaleCodec};
use crate::error::{InterfaceError, Result};
use crate::events::{encode_events, Event, EventRecord, Phase};
use crate::keypair::{CryptoType, Keypair};
use crate::metadata::{
    ErrorMetadata, EventMetadata, FunctionArgument, FunctionMetadata, ModuleMetadata,
    RuntimeMetadata,
};
use crate::registry::{NamedType, TypeDefinition, TypeRegistry, DEFAULT_MAX_ALIAS_HOPS};
use crate::transport::{StatusStream, TransactionStatus, Transport};
use crate::types::{ChainProperties, Hash, PaymentInfo, RuntimeVersion};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use scale_value::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
pub const BOB: &str = "5E9wUiZwxSSjL6phrr7tc6UznqPRg2cbeWTE4WUUrprP738t";

pub fn alice() -> Keypair {
    Keypair::from_uri("//Alice", CryptoType::Sr25519).unwrap()
}

fn docs(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| line.to_string()).collect()
}

fn call(name: &str, args: &[(&str, &str)]) -> FunctionMetadata {
    FunctionMetadata {
        name: name.to_string(),
        args: args
            .iter()
            .map(|(name, ty)| FunctionArgument {
                name: name.to_string(),
                ty: ty.to_string(),
            })
            .collect(),
        docs: Vec::new(),
    }
}

fn event(name: &str, args: &[&str]) -> EventMetadata {
    EventMetadata {
        name: name.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
        docs: Vec::new(),
    }
}

fn error(name: &str, doc: &[&str]) -> ErrorMetadata {
    ErrorMetadata {
        name: name.to_string(),
        docs: docs(doc),
    }
}

/// A small runtime: `System` at index 0 and `Balances` at index 6
pub fn fixture_metadata() -> RuntimeMetadata {
    RuntimeMetadata {
        modules: vec![
            ModuleMetadata {
                name: "System".to_string(),
                index: 0,
                calls: vec![call("remark", &[("remark", "Bytes")])],
                events: vec![
                    event("ExtrinsicSuccess", &["DispatchInfo"]),
                    event("ExtrinsicFailed", &["DispatchError", "DispatchInfo"]),
                ],
                errors: vec![
                    error("InvalidSpecName", &[" The name of specification does not match."]),
                    error("SpecVersionNeedsToIncrease", &[]),
                ],
            },
            ModuleMetadata {
                name: "Balances".to_string(),
                index: 6,
                calls: vec![
                    call(
                        "transfer",
                        &[
                            ("dest", "<T::Lookup as StaticLookup>::Source"),
                            ("value", "Compact<T::Balance>"),
                        ],
                    ),
                    call(
                        "transfer_keep_alive",
                        &[
                            ("dest", "<T::Lookup as StaticLookup>::Source"),
                            ("value", "Compact<T::Balance>"),
                        ],
                    ),
                ],
                events: vec![
                    event("Endowed", &["AccountId", "Balance"]),
                    event("Transfer", &["AccountId", "AccountId", "Balance"]),
                    event("Withdraw", &["AccountId", "Balance"]),
                ],
                errors: vec![
                    error("VestingBalance", &[" Vesting balance too high to send value"]),
                    error("LiquidityRestrictions", &[" Account liquidity restrictions prevent withdrawal"]),
                    error("Overflow", &[" Got an overflow after adding"]),
                    error("InsufficientBalance", &[" Balance too low to send value"]),
                    error("ExistentialDeposit", &[" Value too low to create account due to existential deposit"]),
                    error("KeepAlive", &[" Transfer/payment would kill account"]),
                ],
            },
        ],
        types: vec![
            NamedType::new("ReferendumIndex", TypeDefinition::Alias("u32".to_string())),
            NamedType::new("ProposalIndex", TypeDefinition::Alias("u32".to_string())),
        ],
        extrinsic_version: 4,
    }
}

/// `Balances.transfer` composed against the fixture runtime
pub fn transfer_call(dest: &str, value: u128) -> Call {
    let registry = TypeRegistry::new("default", DEFAULT_MAX_ALIAS_HOPS).unwrap();
    let snapshot = registry.snapshot();
    let codec = ScaleCodec::new(&snapshot, Some(42));
    let spec = fixture_metadata().call_spec("Balances", "transfer").unwrap();
    compose_call(&spec, &balances_transfer(dest, value).unwrap(), &codec).unwrap()
}

/// `DispatchInfo` value as the codec decodes it
pub fn dispatch_info(weight: u64) -> Value {
    Value::named_composite([
        ("weight", Value::u128(weight as u128)),
        ("class", Value::unnamed_variant("Normal", [])),
        ("paysFee", Value::unnamed_variant("Yes", [])),
    ])
}

/// `DispatchError::Module { index, error }`
pub fn module_error(index: u8, error: u8) -> Value {
    Value::unnamed_variant(
        "Module",
        [Value::named_composite([
            ("index", Value::u128(index as u128)),
            ("error", Value::u128(error as u128)),
        ])],
    )
}

fn module_event(module: &str, extrinsic_index: u32, name: &str, values: Vec<Value>) -> EventRecord {
    let metadata = fixture_metadata();
    let module = metadata.module(module).unwrap();
    let event_index = module
        .events
        .iter()
        .position(|event| event.name == name)
        .unwrap();
    EventRecord {
        phase: Phase::ApplyExtrinsic(extrinsic_index),
        event: Event {
            module_index: module.index,
            event_index: event_index as u8,
            module: module.name.clone(),
            name: name.to_string(),
            values,
        },
        topics: Vec::new(),
    }
}

pub fn system_event(extrinsic_index: u32, name: &str, values: Vec<Value>) -> EventRecord {
    module_event("System", extrinsic_index, name, values)
}

pub fn balances_event(extrinsic_index: u32, name: &str, values: Vec<Value>) -> EventRecord {
    module_event("Balances", extrinsic_index, name, values)
}

/// Encode records as a block's `System.Events` storage
pub fn encode_block_events(records: &[EventRecord]) -> Vec<u8> {
    let registry = TypeRegistry::new("default", DEFAULT_MAX_ALIAS_HOPS).unwrap();
    let snapshot = registry.snapshot();
    let codec = ScaleCodec::new(&snapshot, None);
    encode_events(&codec, &fixture_metadata(), records).unwrap()
}

/// Deterministic hash of the mock chain's block `number`
pub fn number_hash(number: u64) -> Hash {
    blake2_256(&number.to_le_bytes())
}

struct MockState {
    /// One script per subscription; the last one never closes
    scripts: VecDeque<Vec<TransactionStatus>>,
    blocks: HashMap<Hash, Vec<Vec<u8>>>,
    events: HashMap<Hash, Vec<u8>>,
    include_on_submit: Option<Hash>,
    submit_error: Option<String>,
    runtime_version: RuntimeVersion,
    metadata: Vec<u8>,
    nonce: u32,
    fee: PaymentInfo,
    head: u64,
    genesis: Hash,
    properties: ChainProperties,
    submitted: Vec<Vec<u8>>,
    fee_queries: Vec<Vec<u8>>,
    subscriptions: usize,
    metadata_fetches: usize,
    nonce_queries: usize,
}

/// Scripted in-memory chain
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                scripts: VecDeque::new(),
                blocks: HashMap::new(),
                events: HashMap::new(),
                include_on_submit: None,
                submit_error: None,
                runtime_version: RuntimeVersion {
                    spec_name: "reef".to_string(),
                    spec_version: 8,
                    transaction_version: 1,
                },
                metadata: fixture_metadata().to_bytes(),
                nonce: 0,
                fee: PaymentInfo {
                    weight: 195_000_000,
                    class: "normal".to_string(),
                    partial_fee: 125,
                },
                head: 1000,
                genesis: [0x11; 32],
                properties: ChainProperties {
                    ss58_format: Some(42),
                    token_decimals: Some(18),
                    token_symbol: Some("REEF".to_string()),
                },
                submitted: Vec::new(),
                fee_queries: Vec::new(),
                subscriptions: 0,
                metadata_fetches: 0,
                nonce_queries: 0,
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Statuses served to the next subscription
    pub fn with_status_script(self, statuses: Vec<TransactionStatus>) -> Self {
        self.state().scripts.push_back(statuses);
        self
    }

    pub fn with_block(self, block: Hash, extrinsics: Vec<Vec<u8>>) -> Self {
        self.state().blocks.insert(block, extrinsics);
        self
    }

    pub fn with_block_events(self, block: Hash, events: Vec<u8>) -> Self {
        self.state().events.insert(block, events);
        self
    }

    /// Append every submitted extrinsic to `block`
    pub fn include_on_submit(self, block: Hash) -> Self {
        self.state().include_on_submit = Some(block);
        self
    }

    pub fn with_nonce(self, nonce: u32) -> Self {
        self.state().nonce = nonce;
        self
    }

    pub fn with_properties(self, properties: ChainProperties) -> Self {
        self.state().properties = properties;
        self
    }

    pub fn failing_submit(self, message: &str) -> Self {
        self.state().submit_error = Some(message.to_string());
        self
    }

    /// Simulate a runtime upgrade
    pub fn set_spec_version(&self, spec_version: u32) {
        self.state().runtime_version.spec_version = spec_version;
    }

    pub fn genesis(&self) -> Hash {
        self.state().genesis
    }

    pub fn submitted(&self) -> Vec<Vec<u8>> {
        self.state().submitted.clone()
    }

    pub fn fee_queries(&self) -> Vec<Vec<u8>> {
        self.state().fee_queries.clone()
    }

    pub fn subscriptions(&self) -> usize {
        self.state().subscriptions
    }

    pub fn metadata_fetches(&self) -> usize {
        self.state().metadata_fetches
    }

    pub fn nonce_queries(&self) -> usize {
        self.state().nonce_queries
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn submit(&self, extrinsic: &[u8]) -> Result<Hash> {
        let mut state = self.state();
        if let Some(message) = &state.submit_error {
            return Err(InterfaceError::Transport(message.clone()));
        }
        state.submitted.push(extrinsic.to_vec());
        if let Some(block) = state.include_on_submit {
            state.blocks.entry(block).or_default().push(extrinsic.to_vec());
        }
        Ok(blake2_256(extrinsic))
    }

    async fn subscribe_status(&self, _extrinsic_hash: Hash) -> Result<StatusStream> {
        let mut state = self.state();
        state.subscriptions += 1;
        let statuses = state.scripts.pop_front().unwrap_or_default();
        let updates = stream::iter(statuses.into_iter().map(Ok));
        if state.scripts.is_empty() {
            Ok(updates.chain(stream::pending()).boxed())
        } else {
            // Closing mid-lifecycle stands in for a dropped connection
            Ok(updates.boxed())
        }
    }

    async fn block_events(&self, block_hash: Hash) -> Result<Vec<u8>> {
        self.state()
            .events
            .get(&block_hash)
            .cloned()
            .ok_or_else(|| InterfaceError::Transport("Unknown block".to_string()))
    }

    async fn block_extrinsics(&self, block_hash: Hash) -> Result<Vec<Vec<u8>>> {
        self.state()
            .blocks
            .get(&block_hash)
            .cloned()
            .ok_or_else(|| InterfaceError::Transport("Unknown block".to_string()))
    }

    async fn metadata(&self, _spec_version: u32) -> Result<Vec<u8>> {
        let mut state = self.state();
        state.metadata_fetches += 1;
        Ok(state.metadata.clone())
    }

    async fn runtime_version(&self) -> Result<RuntimeVersion> {
        Ok(self.state().runtime_version.clone())
    }

    async fn account_nonce(&self, _address: &str) -> Result<u32> {
        let mut state = self.state();
        state.nonce_queries += 1;
        Ok(state.nonce)
    }

    async fn query_fee(&self, extrinsic: &[u8]) -> Result<PaymentInfo> {
        let mut state = self.state();
        state.fee_queries.push(extrinsic.to_vec());
        Ok(state.fee.clone())
    }

    async fn block_hash(&self, number: u64) -> Result<Option<Hash>> {
        let head = self.state().head;
        Ok((number <= head).then(|| number_hash(number)))
    }

    async fn block_number(&self, block_hash: Hash) -> Result<Option<u64>> {
        let head = self.state().head;
        Ok((0..=head).find(|n| number_hash(*n) == block_hash))
    }

    async fn chain_head(&self) -> Result<u64> {
        Ok(self.state().head)
    }

    async fn genesis_hash(&self) -> Result<Hash> {
        Ok(self.state().genesis)
    }

    async fn system_chain(&self) -> Result<String> {
        Ok("Development".to_string())
    }

    async fn system_properties(&self) -> Result<ChainProperties> {
        Ok(self.state().properties.clone())
    }
}
