//! The confirmation-depth view over an L1 provider.

use crate::SourceProviderError;
use alloy_consensus::{Header, Receipt, TxEnvelope};
use alloy_primitives::B256;
use async_trait::async_trait;
use kanvas_derive::ChainProvider;
use kanvas_protocol::BlockInfo;
use tokio::sync::watch;

/// Serves `block_info_by_number` only once the block is `depth` confirmations
/// behind the live L1 head, insulating readers from short reorgs. All other
/// reads pass through unchanged.
#[derive(Debug, Clone)]
pub struct ConfDepthProvider<P>
where
    P: ChainProvider<Error = SourceProviderError>,
{
    /// The wrapped provider.
    inner: P,
    /// The confirmation depth. Zero reads at the head.
    depth: u64,
    /// A live view of the L1 head.
    l1_head: watch::Receiver<Option<BlockInfo>>,
}

impl<P> ConfDepthProvider<P>
where
    P: ChainProvider<Error = SourceProviderError>,
{
    /// Creates a new confirmation-depth view.
    pub const fn new(inner: P, depth: u64, l1_head: watch::Receiver<Option<BlockInfo>>) -> Self {
        Self { inner, depth, l1_head }
    }
}

#[async_trait]
impl<P> ChainProvider for ConfDepthProvider<P>
where
    P: ChainProvider<Error = SourceProviderError> + Send,
{
    type Error = SourceProviderError;

    async fn header_by_hash(&mut self, hash: B256) -> Result<Header, Self::Error> {
        self.inner.header_by_hash(hash).await
    }

    async fn block_info_by_number(&mut self, number: u64) -> Result<BlockInfo, Self::Error> {
        if self.depth > 0 {
            let head = *self.l1_head.borrow();
            let head_number = head.map(|h| h.number).unwrap_or_default();
            // `number + depth <= head` keeps `depth` blocks between the read
            // and the head; depth 0 is a pass-through.
            if number + self.depth > head_number {
                return Err(SourceProviderError::NotYetConfirmed(number, self.depth));
            }
        }
        self.inner.block_info_by_number(number).await
    }

    async fn receipts_by_hash(&mut self, hash: B256) -> Result<Vec<Receipt>, Self::Error> {
        self.inner.receipts_by_hash(hash).await
    }

    async fn block_info_and_transactions_by_hash(
        &mut self,
        hash: B256,
    ) -> Result<(BlockInfo, Vec<TxEnvelope>), Self::Error> {
        self.inner.block_info_and_transactions_by_hash(hash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct StaticProvider {
        blocks: Vec<BlockInfo>,
    }

    #[async_trait]
    impl ChainProvider for StaticProvider {
        type Error = SourceProviderError;

        async fn header_by_hash(&mut self, hash: B256) -> Result<Header, Self::Error> {
            Err(SourceProviderError::HashNotFound(hash))
        }

        async fn block_info_by_number(&mut self, number: u64) -> Result<BlockInfo, Self::Error> {
            self.blocks
                .iter()
                .find(|b| b.number == number)
                .copied()
                .ok_or(SourceProviderError::BlockNotFound(number))
        }

        async fn receipts_by_hash(&mut self, hash: B256) -> Result<Vec<Receipt>, Self::Error> {
            Err(SourceProviderError::HashNotFound(hash))
        }

        async fn block_info_and_transactions_by_hash(
            &mut self,
            hash: B256,
        ) -> Result<(BlockInfo, Vec<TxEnvelope>), Self::Error> {
            Err(SourceProviderError::HashNotFound(hash))
        }
    }

    fn block(number: u64) -> BlockInfo {
        BlockInfo { number, ..Default::default() }
    }

    #[tokio::test]
    async fn test_depth_holds_back_recent_blocks() {
        let provider = StaticProvider { blocks: (0..=10).map(block).collect() };
        let (head_tx, head_rx) = watch::channel(Some(block(10)));
        let mut view = ConfDepthProvider::new(provider, 4, head_rx);

        assert_eq!(view.block_info_by_number(6).await.unwrap().number, 6);
        assert!(matches!(
            view.block_info_by_number(7).await.unwrap_err(),
            SourceProviderError::NotYetConfirmed(7, 4)
        ));

        // The head advancing releases the next block.
        head_tx.send(Some(block(11))).unwrap();
        assert_eq!(view.block_info_by_number(7).await.unwrap().number, 7);
    }

    #[tokio::test]
    async fn test_zero_depth_passes_through() {
        let provider = StaticProvider { blocks: (0..=10).map(block).collect() };
        let (_head_tx, head_rx) = watch::channel(None);
        let mut view = ConfDepthProvider::new(provider, 0, head_rx);
        assert_eq!(view.block_info_by_number(10).await.unwrap().number, 10);
    }
}
