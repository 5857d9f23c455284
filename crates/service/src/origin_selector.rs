//! The proposer's L1 origin selector.

use async_trait::async_trait;
use kanvas_derive::ChainProvider;
use kanvas_genesis::RollupConfig;
use kanvas_protocol::{BlockInfo, L2BlockInfo};
use kanvas_sources::SourceProviderError;
use std::{fmt::Debug, sync::Arc};

/// An error selecting the next L1 origin.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OriginSelectorError {
    /// The provider failed; retried on the next tick.
    #[error("provider error: {0}")]
    Provider(#[from] SourceProviderError),
    /// The unsafe head's L1 origin is no longer canonical.
    #[error("unsafe head L1 origin {0} is no longer canonical")]
    ReorgedOrigin(u64),
    /// The drift window is exhausted but the next origin is not yet
    /// sufficiently confirmed.
    #[error("sequencer drift exhausted at origin {0}, waiting for its successor")]
    DriftExhausted(u64),
}

/// Chooses the L1 origin of the next proposed L2 block.
#[async_trait]
pub trait OriginSelector: Debug + Send {
    /// Returns the L1 origin the block after `unsafe_head` should use.
    async fn next_l1_origin(
        &mut self,
        unsafe_head: L2BlockInfo,
    ) -> Result<BlockInfo, OriginSelectorError>;
}

/// The standard selector: keeps the current origin while the drift window
/// allows it and the origin's successor has not yet cleared the proposer's
/// confirmation depth; advances by exactly one block otherwise.
#[derive(Debug)]
pub struct L1OriginSelector<P>
where
    P: ChainProvider<Error = SourceProviderError>,
{
    /// The rollup configuration.
    cfg: Arc<RollupConfig>,
    /// The L1 provider, wrapped in the proposer's confirmation-depth view.
    provider: P,
}

impl<P> L1OriginSelector<P>
where
    P: ChainProvider<Error = SourceProviderError>,
{
    /// Creates a new origin selector.
    pub const fn new(cfg: Arc<RollupConfig>, provider: P) -> Self {
        Self { cfg, provider }
    }
}

#[async_trait]
impl<P> OriginSelector for L1OriginSelector<P>
where
    P: ChainProvider<Error = SourceProviderError> + Send,
{
    async fn next_l1_origin(
        &mut self,
        unsafe_head: L2BlockInfo,
    ) -> Result<BlockInfo, OriginSelectorError> {
        let current = self
            .provider
            .block_info_by_number(unsafe_head.l1_origin.number)
            .await
            .map_err(OriginSelectorError::Provider)?;
        if current.hash != unsafe_head.l1_origin.hash {
            return Err(OriginSelectorError::ReorgedOrigin(unsafe_head.l1_origin.number));
        }

        let next_timestamp = unsafe_head.block_info.timestamp + self.cfg.block_time;

        match self.provider.block_info_by_number(current.number + 1).await {
            // Never skip an origin: the successor is adopted only once the L2
            // time has caught up to it.
            Ok(next) if next_timestamp >= next.timestamp => {
                debug!(
                    target: "origin_selector",
                    current = current.number,
                    next = next.number,
                    "Advancing to the next L1 origin"
                );
                Ok(next)
            }
            Ok(_) => Ok(current),
            Err(
                SourceProviderError::NotYetConfirmed(_, _) | SourceProviderError::BlockNotFound(_),
            ) => {
                // The successor has not cleared the confirmation depth. The
                // current origin remains usable only inside the drift window.
                if next_timestamp > current.timestamp + self.cfg.max_sequencer_drift {
                    return Err(OriginSelectorError::DriftExhausted(current.number));
                }
                Ok(current)
            }
            Err(err) => Err(OriginSelectorError::Provider(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_eips::eip1898::BlockNumHash;
    use alloy_primitives::B256;
    use async_trait::async_trait;

    #[derive(Debug, Default)]
    struct FakeProvider {
        blocks: Vec<BlockInfo>,
        confirmed_up_to: u64,
    }

    #[async_trait]
    impl ChainProvider for FakeProvider {
        type Error = SourceProviderError;

        async fn header_by_hash(
            &mut self,
            hash: B256,
        ) -> Result<alloy_consensus::Header, Self::Error> {
            Err(SourceProviderError::HashNotFound(hash))
        }

        async fn block_info_by_number(&mut self, number: u64) -> Result<BlockInfo, Self::Error> {
            if number > self.confirmed_up_to {
                return Err(SourceProviderError::NotYetConfirmed(number, 4));
            }
            self.blocks
                .iter()
                .find(|b| b.number == number)
                .copied()
                .ok_or(SourceProviderError::BlockNotFound(number))
        }

        async fn receipts_by_hash(
            &mut self,
            hash: B256,
        ) -> Result<Vec<alloy_consensus::Receipt>, Self::Error> {
            Err(SourceProviderError::HashNotFound(hash))
        }

        async fn block_info_and_transactions_by_hash(
            &mut self,
            hash: B256,
        ) -> Result<(BlockInfo, Vec<alloy_consensus::TxEnvelope>), Self::Error> {
            Err(SourceProviderError::HashNotFound(hash))
        }
    }

    fn l1_block(number: u64, timestamp: u64) -> BlockInfo {
        BlockInfo {
            hash: B256::with_last_byte(0x10 + number as u8),
            number,
            parent_hash: B256::with_last_byte(0x0F + number as u8),
            timestamp,
        }
    }

    fn head_on(origin: &BlockInfo, timestamp: u64) -> L2BlockInfo {
        L2BlockInfo::new(
            BlockInfo { timestamp, ..Default::default() },
            BlockNumHash { number: origin.number, hash: origin.hash },
            0,
        )
    }

    fn selector(blocks: Vec<BlockInfo>, confirmed_up_to: u64) -> L1OriginSelector<FakeProvider> {
        let cfg = Arc::new(kanvas_derive::test_utils::test_rollup_config());
        L1OriginSelector::new(cfg, FakeProvider { blocks, confirmed_up_to })
    }

    #[tokio::test]
    async fn test_keeps_origin_when_successor_unconfirmed() {
        let origin = l1_block(5, 60);
        let mut selector = selector(vec![origin, l1_block(6, 72)], 5);
        // Within the drift window and the successor is not yet confirmed.
        let next = selector.next_l1_origin(head_on(&origin, 70)).await.unwrap();
        assert_eq!(next, origin);
    }

    #[tokio::test]
    async fn test_advances_when_l2_time_reaches_successor() {
        let origin = l1_block(5, 60);
        let successor = l1_block(6, 72);
        let mut selector = selector(vec![origin, successor], 6);
        let next = selector.next_l1_origin(head_on(&origin, 70)).await.unwrap();
        assert_eq!(next, successor);
    }

    #[tokio::test]
    async fn test_keeps_origin_when_successor_is_in_the_future() {
        let origin = l1_block(5, 60);
        let successor = l1_block(6, 120);
        let mut selector = selector(vec![origin, successor], 6);
        // next L2 timestamp (72) is before the successor's timestamp.
        let next = selector.next_l1_origin(head_on(&origin, 70)).await.unwrap();
        assert_eq!(next, origin);
    }

    #[tokio::test]
    async fn test_drift_exhausted_without_successor() {
        let origin = l1_block(5, 60);
        let mut selector = selector(vec![origin], 5);
        let head = head_on(&origin, 60 + 600);
        assert_eq!(
            selector.next_l1_origin(head).await.unwrap_err(),
            OriginSelectorError::DriftExhausted(5)
        );
    }

    #[tokio::test]
    async fn test_reorged_origin_detected() {
        let origin = l1_block(5, 60);
        let mut reorged = origin;
        reorged.hash = B256::with_last_byte(0xEE);
        let mut selector = selector(vec![reorged], 6);
        assert_eq!(
            selector.next_l1_origin(head_on(&origin, 62)).await.unwrap_err(),
            OriginSelectorError::ReorgedOrigin(5)
        );
    }
}
