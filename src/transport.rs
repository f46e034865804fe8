//! Transport boundary
//!
//! The RPC connection itself lives outside this crate. Anything that can
//! answer these requests (a websocket client, an HTTP client plus a poller, an
//! in-memory mock) can drive a [`crate::SubstrateInterface`].

use crate::error::Result;
use crate::types::{ChainProperties, Hash, PaymentInfo, RuntimeVersion};
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Pool status of a watched extrinsic (`author_submitAndWatchExtrinsic`).
///
/// `Retracted` blocks may be followed by an `InBlock` for another block.
/// `Finalized`, `Usurped`, `Dropped`, `Invalid` and `FinalityTimeout` end
/// the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionStatus {
    /// Part of the future queue
    Future,
    /// Part of the ready queue
    Ready,
    /// Broadcast to the given peers
    Broadcast(Vec<String>),
    /// Included in the block with this hash
    InBlock(Hash),
    /// The including block was retracted by a reorg
    Retracted(Hash),
    /// Finality watchers were exhausted before the block finalized
    FinalityTimeout(Hash),
    /// Included block finalized
    Finalized(Hash),
    /// Replaced in the pool by the extrinsic with this hash
    Usurped(Hash),
    /// Removed from the pool because of the limit
    Dropped,
    /// No longer valid in the current state
    Invalid,
}

impl TransactionStatus {
    /// Whether the pool will send nothing further after this status
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Finalized(_)
                | TransactionStatus::FinalityTimeout(_)
                | TransactionStatus::Usurped(_)
                | TransactionStatus::Dropped
                | TransactionStatus::Invalid
        )
    }
}

/// Status updates for one extrinsic. Dropping the stream unsubscribes.
///
/// The stream ends without a final status when the connection is lost; the
/// subscriber then asks for a new one.
pub type StatusStream = Pin<Box<dyn Stream<Item = Result<TransactionStatus>> + Send>>;

/// Requests the client needs from a chain node
#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand signed extrinsic bytes to the pool; returns the extrinsic hash
    async fn submit(&self, extrinsic: &[u8]) -> Result<Hash>;

    /// Subscribe to status updates of a submitted extrinsic.
    ///
    /// Re-subscribing after a reconnect replays the current status, so a
    /// subscriber may see the same `InBlock` twice.
    async fn subscribe_status(&self, extrinsic_hash: Hash) -> Result<StatusStream>;

    /// Raw `System.Events` storage of a block
    async fn block_events(&self, block_hash: Hash) -> Result<Vec<u8>>;

    /// Encoded extrinsics of a block, in block order
    async fn block_extrinsics(&self, block_hash: Hash) -> Result<Vec<Vec<u8>>>;

    /// Magic-prefixed runtime metadata for a spec version
    async fn metadata(&self, spec_version: u32) -> Result<Vec<u8>>;

    async fn runtime_version(&self) -> Result<RuntimeVersion>;

    /// Next nonce of an SS58 account
    async fn account_nonce(&self, address: &str) -> Result<u32>;

    /// Fee estimate for encoded extrinsic bytes; never broadcasts
    async fn query_fee(&self, extrinsic: &[u8]) -> Result<PaymentInfo>;

    /// Hash of a block by number, or `None` if the chain has no such block
    async fn block_hash(&self, number: u64) -> Result<Option<Hash>>;

    /// Number of a block by hash, or `None` if the hash is unknown
    async fn block_number(&self, block_hash: Hash) -> Result<Option<u64>>;

    /// Number of the current best block
    async fn chain_head(&self) -> Result<u64>;

    async fn genesis_hash(&self) -> Result<Hash>;

    /// Chain name (`system_chain`)
    async fn system_chain(&self) -> Result<String>;

    async fn system_properties(&self) -> Result<ChainProperties>;
}
