//! Extrinsic lifecycle tracking
//!
//! `Submitted → InBlock → Finalized`, with `Retracted` moving an extrinsic
//! back to submitted and `Dropped`/`Invalid`/`Usurped` ending it. The state
//! machine is kept apart from the subscription loop so it survives
//! reconnects: a replayed `InBlock` for the block already seen is not
//! reported again.

use crate::codec::{blake2_256, ScaleCodec};
use crate::error::{InterfaceError, Result};
use crate::events::decode_events;
use crate::metadata::RuntimeMetadata;
use crate::receipt::ExtrinsicReceipt;
use crate::transport::{TransactionStatus, Transport};
use crate::types::{to_hex, Hash};
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Pause before re-subscribing after a status stream closes
const RESUBSCRIBE_DELAY: Duration = Duration::from_millis(500);

/// How long `submit_extrinsic` suspends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    pub wait_for_inclusion: bool,
    /// Implies `wait_for_inclusion`
    pub wait_for_finalization: bool,
}

impl SubmitOptions {
    pub fn inclusion() -> Self {
        Self {
            wait_for_inclusion: true,
            wait_for_finalization: false,
        }
    }

    pub fn finalization() -> Self {
        Self {
            wait_for_inclusion: true,
            wait_for_finalization: true,
        }
    }

    pub fn waits(&self) -> bool {
        self.wait_for_inclusion || self.wait_for_finalization
    }
}

/// Effect of one status update on the tracked extrinsic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing new (pool bookkeeping or a replayed status)
    Unchanged,
    Included(Hash),
    /// The including block was orphaned; the extrinsic is back in the pool
    Retracted(Hash),
    Finalized(Hash),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleTracker {
    included: Option<Hash>,
    finalized: Option<Hash>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block currently holding the extrinsic, if any
    pub fn included_in(&self) -> Option<Hash> {
        self.included
    }

    pub fn finalized_in(&self) -> Option<Hash> {
        self.finalized
    }

    /// Apply a status update.
    ///
    /// Pool rejections end the lifecycle with `ExtrinsicRejected`.
    pub fn observe(&mut self, status: &TransactionStatus) -> Result<Transition> {
        if let Some(block) = self.finalized {
            return match status {
                TransactionStatus::Finalized(hash) if *hash == block => Ok(Transition::Unchanged),
                _ => Err(InterfaceError::InvalidInput(format!(
                    "Status {:?} after finalization in {}",
                    status,
                    to_hex(&block)
                ))),
            };
        }

        match status {
            TransactionStatus::Future
            | TransactionStatus::Ready
            | TransactionStatus::Broadcast(_) => Ok(Transition::Unchanged),
            TransactionStatus::InBlock(block) => {
                if self.included == Some(*block) {
                    Ok(Transition::Unchanged)
                } else {
                    self.included = Some(*block);
                    Ok(Transition::Included(*block))
                }
            }
            TransactionStatus::Retracted(block) => {
                if self.included == Some(*block) {
                    self.included = None;
                    Ok(Transition::Retracted(*block))
                } else {
                    Ok(Transition::Unchanged)
                }
            }
            TransactionStatus::Finalized(block) => {
                self.included = Some(*block);
                self.finalized = Some(*block);
                Ok(Transition::Finalized(*block))
            }
            TransactionStatus::FinalityTimeout(block) => Err(InterfaceError::ExtrinsicRejected(
                format!("Finality timeout for block {}", to_hex(block)),
            )),
            TransactionStatus::Usurped(by) => Err(InterfaceError::ExtrinsicRejected(format!(
                "Usurped by {}",
                to_hex(by)
            ))),
            TransactionStatus::Dropped => Err(InterfaceError::ExtrinsicRejected(
                "Dropped from the pool".to_string(),
            )),
            TransactionStatus::Invalid => Err(InterfaceError::ExtrinsicRejected(
                "Invalid in the current state".to_string(),
            )),
        }
    }
}

/// Await `future` for at most `limit`
pub(crate) async fn request<F, T>(name: &'static str, limit: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| InterfaceError::RequestTimeout(name))?
}

/// Follow the status subscription until the extrinsic is in a block (or in a
/// finalized block when `finalized` is set). Returns the block hash.
///
/// A closed stream is treated as a lost connection and re-subscribed. The
/// whole wait, re-subscriptions included, is bounded by `limit`.
pub async fn wait_for_block<T>(
    transport: &T,
    extrinsic_hash: Hash,
    finalized: bool,
    limit: Duration,
) -> Result<Hash>
where
    T: Transport + ?Sized,
{
    let deadline = Instant::now() + limit;
    let timed_out = |_| InterfaceError::SubscriptionTimeout(limit);
    let mut tracker = LifecycleTracker::new();

    loop {
        let mut statuses = timeout_at(deadline, transport.subscribe_status(extrinsic_hash))
            .await
            .map_err(timed_out)??;

        while let Some(status) = timeout_at(deadline, statuses.next())
            .await
            .map_err(timed_out)?
        {
            let status = status?;
            match tracker.observe(&status)? {
                Transition::Unchanged => debug!(?status, "Extrinsic status"),
                Transition::Included(block) => {
                    info!(block = %to_hex(&block), "Extrinsic included");
                    if !finalized {
                        return Ok(block);
                    }
                }
                Transition::Retracted(block) => {
                    warn!(block = %to_hex(&block), "Including block retracted, waiting for re-inclusion");
                }
                Transition::Finalized(block) => {
                    info!(block = %to_hex(&block), "Extrinsic finalized");
                    return Ok(block);
                }
            }
        }

        warn!(
            included = ?tracker.included_in().map(|b| to_hex(&b)),
            "Status subscription closed, re-subscribing"
        );
        let resume = (Instant::now() + RESUBSCRIBE_DELAY).min(deadline);
        tokio::time::sleep_until(resume).await;
        if Instant::now() >= deadline {
            return Err(InterfaceError::SubscriptionTimeout(limit));
        }
    }
}

/// Position of an extrinsic within a block's extrinsic list
pub fn locate_extrinsic(extrinsics: &[Vec<u8>], extrinsic_hash: &Hash) -> Option<u32> {
    extrinsics
        .iter()
        .position(|bytes| blake2_256(bytes) == *extrinsic_hash)
        .and_then(|index| u32::try_from(index).ok())
}

/// Build the receipt for an extrinsic included in `block`.
///
/// Only events emitted while applying this extrinsic are kept.
pub async fn fetch_receipt<T>(
    transport: &T,
    pending: ExtrinsicReceipt,
    block: Hash,
    finalized: bool,
    metadata: &RuntimeMetadata,
    codec: &ScaleCodec<'_>,
    request_timeout: Duration,
) -> Result<ExtrinsicReceipt>
where
    T: Transport + ?Sized,
{
    let extrinsic_hash = pending.extrinsic_hash();
    let extrinsics = request(
        "block_extrinsics",
        request_timeout,
        transport.block_extrinsics(block),
    )
    .await?;
    let index = locate_extrinsic(&extrinsics, &extrinsic_hash).ok_or_else(|| {
        InterfaceError::ExtrinsicNotFound {
            extrinsic: to_hex(&extrinsic_hash),
            block: to_hex(&block),
        }
    })?;

    let raw_events = request("block_events", request_timeout, transport.block_events(block)).await?;
    let events: Vec<_> = decode_events(codec, metadata, &raw_events)?
        .into_iter()
        .filter(|record| record.extrinsic_index() == Some(index))
        .collect();
    debug!(index, events = events.len(), "Decoded extrinsic events");

    Ok(ExtrinsicReceipt::included(
        pending, block, index, events, finalized, metadata,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{TypeRegistry, DEFAULT_MAX_ALIAS_HOPS};
    use crate::testing::{
        balances_event, dispatch_info, encode_block_events, fixture_metadata, module_error,
        system_event, MockTransport,
    };
    use scale_value::Value;

    const XT: Hash = [0xaa; 32];
    const BLOCK_A: Hash = [0x0a; 32];
    const BLOCK_B: Hash = [0x0b; 32];

    #[test]
    fn test_tracker_ignores_replayed_inclusion() {
        let mut tracker = LifecycleTracker::new();
        assert_eq!(
            tracker.observe(&TransactionStatus::Ready).unwrap(),
            Transition::Unchanged
        );
        assert_eq!(
            tracker.observe(&TransactionStatus::InBlock(BLOCK_A)).unwrap(),
            Transition::Included(BLOCK_A)
        );
        assert_eq!(
            tracker.observe(&TransactionStatus::InBlock(BLOCK_A)).unwrap(),
            Transition::Unchanged
        );
        assert_eq!(tracker.included_in(), Some(BLOCK_A));
    }

    #[test]
    fn test_tracker_retraction() {
        let mut tracker = LifecycleTracker::new();
        tracker.observe(&TransactionStatus::InBlock(BLOCK_A)).unwrap();
        // Retraction of a block we never saw is noise
        assert_eq!(
            tracker.observe(&TransactionStatus::Retracted(BLOCK_B)).unwrap(),
            Transition::Unchanged
        );
        assert_eq!(
            tracker.observe(&TransactionStatus::Retracted(BLOCK_A)).unwrap(),
            Transition::Retracted(BLOCK_A)
        );
        assert_eq!(tracker.included_in(), None);
        assert_eq!(
            tracker.observe(&TransactionStatus::InBlock(BLOCK_B)).unwrap(),
            Transition::Included(BLOCK_B)
        );
        assert_eq!(
            tracker.observe(&TransactionStatus::Finalized(BLOCK_B)).unwrap(),
            Transition::Finalized(BLOCK_B)
        );
        assert_eq!(tracker.finalized_in(), Some(BLOCK_B));
    }

    #[test]
    fn test_tracker_rejections() {
        for status in [
            TransactionStatus::Dropped,
            TransactionStatus::Invalid,
            TransactionStatus::Usurped([1; 32]),
            TransactionStatus::FinalityTimeout(BLOCK_A),
        ] {
            let mut tracker = LifecycleTracker::new();
            assert!(matches!(
                tracker.observe(&status),
                Err(InterfaceError::ExtrinsicRejected(_))
            ));
        }
    }

    #[test]
    fn test_tracker_finalization_is_terminal() {
        let mut tracker = LifecycleTracker::new();
        tracker.observe(&TransactionStatus::Finalized(BLOCK_A)).unwrap();
        assert_eq!(
            tracker.observe(&TransactionStatus::Finalized(BLOCK_A)).unwrap(),
            Transition::Unchanged
        );
        assert!(tracker.observe(&TransactionStatus::InBlock(BLOCK_B)).is_err());
    }

    #[tokio::test]
    async fn test_wait_for_inclusion() {
        let transport = MockTransport::new().with_status_script(vec![
            TransactionStatus::Ready,
            TransactionStatus::InBlock(BLOCK_A),
        ]);
        let block = wait_for_block(&transport, XT, false, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(block, BLOCK_A);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalization_survives_reorg() {
        let transport = MockTransport::new().with_status_script(vec![
            TransactionStatus::Ready,
            TransactionStatus::InBlock(BLOCK_A),
            TransactionStatus::Retracted(BLOCK_A),
            TransactionStatus::InBlock(BLOCK_B),
            TransactionStatus::Finalized(BLOCK_B),
        ]);
        let block = wait_for_block(&transport, XT, true, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(block, BLOCK_B);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribes_after_disconnect() {
        let transport = MockTransport::new()
            .with_status_script(vec![
                TransactionStatus::Ready,
                TransactionStatus::InBlock(BLOCK_A),
            ])
            // Reconnected subscription replays the inclusion
            .with_status_script(vec![
                TransactionStatus::InBlock(BLOCK_A),
                TransactionStatus::Finalized(BLOCK_A),
            ]);
        let block = wait_for_block(&transport, XT, true, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(block, BLOCK_A);
        assert_eq!(transport.subscriptions(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let transport =
            MockTransport::new().with_status_script(vec![TransactionStatus::Ready]);
        let limit = Duration::from_secs(30);
        assert_eq!(
            wait_for_block(&transport, XT, false, limit).await,
            Err(InterfaceError::SubscriptionTimeout(limit))
        );
    }

    #[tokio::test]
    async fn test_wait_surfaces_rejection() {
        let transport = MockTransport::new().with_status_script(vec![
            TransactionStatus::Ready,
            TransactionStatus::Invalid,
        ]);
        assert!(matches!(
            wait_for_block(&transport, XT, false, Duration::from_secs(10)).await,
            Err(InterfaceError::ExtrinsicRejected(_))
        ));
    }

    #[test]
    fn test_locate_extrinsic() {
        let extrinsics = vec![vec![1, 2, 3], vec![4, 5, 6]];
        let hash = blake2_256(&[4, 5, 6]);
        assert_eq!(locate_extrinsic(&extrinsics, &hash), Some(1));
        assert_eq!(locate_extrinsic(&extrinsics, &[0; 32]), None);
    }

    #[tokio::test]
    async fn test_fetch_receipt_filters_by_index() {
        let ours = vec![9, 9, 9];
        let hash = blake2_256(&ours);
        let transport = MockTransport::new()
            .with_block(BLOCK_A, vec![vec![1], ours])
            .with_block_events(
                BLOCK_A,
                encode_block_events(&[
                    system_event(0, "ExtrinsicSuccess", vec![dispatch_info(10)]),
                    balances_event(1, "Withdraw", vec![Value::from_bytes([3u8; 32]), Value::u128(7)]),
                    system_event(
                        1,
                        "ExtrinsicFailed",
                        vec![module_error(6, 3), dispatch_info(20)],
                    ),
                ]),
            );

        let registry = TypeRegistry::new("default", DEFAULT_MAX_ALIAS_HOPS).unwrap();
        let snapshot = registry.snapshot();
        let codec = ScaleCodec::new(&snapshot, None);
        let receipt = fetch_receipt(
            &transport,
            ExtrinsicReceipt::pending(hash, Some([3u8; 32])),
            BLOCK_A,
            false,
            &fixture_metadata(),
            &codec,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(receipt.extrinsic_index(), Some(1));
        assert_eq!(receipt.triggered_events().len(), 2);
        assert!(!receipt.is_success());
        assert_eq!(receipt.weight(), Some(20));
        assert_eq!(receipt.total_fee_amount(), Some(7));
    }

    #[tokio::test]
    async fn test_fetch_receipt_missing_extrinsic() {
        let transport = MockTransport::new().with_block(BLOCK_A, vec![vec![1]]);
        let registry = TypeRegistry::new("default", DEFAULT_MAX_ALIAS_HOPS).unwrap();
        let snapshot = registry.snapshot();
        let codec = ScaleCodec::new(&snapshot, None);
        let result = fetch_receipt(
            &transport,
            ExtrinsicReceipt::pending(XT, None),
            BLOCK_A,
            false,
            &fixture_metadata(),
            &codec,
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(result, Err(InterfaceError::ExtrinsicNotFound { .. })));
    }
}
