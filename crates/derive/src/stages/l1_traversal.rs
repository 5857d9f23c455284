//! The L1 traversal stage.

use crate::{
    ChainProvider, OriginAdvancer, OriginProvider, PipelineError, PipelineResult, ResetError,
    Signal, SignalReceiver,
};
use async_trait::async_trait;
use kanvas_protocol::BlockInfo;

/// Yields the current L1 block to the retrieval stage exactly once per origin.
pub trait L1RetrievalProvider {
    /// Returns the current L1 block, or `None` if it was already consumed.
    /// Exhausted origins surface as `Eof` until [`OriginAdvancer::advance_origin`]
    /// succeeds.
    fn next_l1_block(&mut self) -> PipelineResult<Option<BlockInfo>>;
}

/// The source stage: walks the L1 chain block by block above the reset origin,
/// detecting reorgs by parent-hash mismatch.
#[derive(Debug, Clone)]
pub struct L1Traversal<P: ChainProvider> {
    /// The L1 provider, typically wrapped in a confirmation-depth view.
    pub provider: P,
    /// The current L1 block.
    block: Option<BlockInfo>,
    /// Whether the current block was already handed to the next stage.
    done: bool,
}

impl<P: ChainProvider> L1Traversal<P> {
    /// Creates a new traversal stage starting at `origin`.
    pub const fn new(provider: P, origin: BlockInfo) -> Self {
        Self { provider, block: Some(origin), done: false }
    }
}

impl<P: ChainProvider> L1RetrievalProvider for L1Traversal<P> {
    fn next_l1_block(&mut self) -> PipelineResult<Option<BlockInfo>> {
        if self.done {
            Err(PipelineError::Eof.temp())
        } else {
            self.done = true;
            Ok(self.block)
        }
    }
}

impl<P: ChainProvider> OriginProvider for L1Traversal<P> {
    fn origin(&self) -> Option<BlockInfo> {
        self.block
    }
}

#[async_trait]
impl<P: ChainProvider> OriginAdvancer for L1Traversal<P> {
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        let current = self.block.ok_or(PipelineError::MissingOrigin.crit())?;
        let next =
            self.provider.block_info_by_number(current.number + 1).await.map_err(Into::into)?;

        if next.parent_hash != current.hash {
            warn!(
                target: "l1_traversal",
                expected = %current.hash,
                got = %next.parent_hash,
                "Detected L1 reorg"
            );
            return Err(ResetError::ReorgDetected(current.hash, next.parent_hash).reset());
        }

        self.block = Some(next);
        self.done = false;
        Ok(())
    }
}

#[async_trait]
impl<P: ChainProvider> SignalReceiver for L1Traversal<P> {
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        match signal {
            Signal::Reset(reset) => {
                self.block = Some(reset.l1_origin);
                self.done = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_utils::TestChainProvider, PipelineErrorKind, ResetSignal};
    use alloy_primitives::B256;

    fn block(number: u64, parent_hash: B256) -> BlockInfo {
        BlockInfo {
            hash: B256::with_last_byte(number as u8 + 1),
            number,
            parent_hash,
            timestamp: number * 12,
        }
    }

    #[tokio::test]
    async fn test_next_l1_block_consumed_once() {
        let origin = block(1, B256::ZERO);
        let mut stage = L1Traversal::new(TestChainProvider::default(), origin);
        assert_eq!(stage.next_l1_block().unwrap(), Some(origin));
        assert!(matches!(
            stage.next_l1_block().unwrap_err(),
            PipelineErrorKind::Temporary(PipelineError::Eof)
        ));
    }

    #[tokio::test]
    async fn test_advance_origin() {
        let origin = block(1, B256::ZERO);
        let next = block(2, origin.hash);
        let mut provider = TestChainProvider::default();
        provider.insert_block(2, next);
        let mut stage = L1Traversal::new(provider, origin);
        let _ = stage.next_l1_block().unwrap();
        stage.advance_origin().await.unwrap();
        assert_eq!(stage.origin(), Some(next));
        assert_eq!(stage.next_l1_block().unwrap(), Some(next));
    }

    #[tokio::test]
    async fn test_advance_origin_detects_reorg() {
        let origin = block(1, B256::ZERO);
        // A block 2 that does not build on the current origin.
        let reorged = block(2, B256::with_last_byte(0xAA));
        let mut provider = TestChainProvider::default();
        provider.insert_block(2, reorged);
        let mut stage = L1Traversal::new(provider, origin);
        assert!(matches!(
            stage.advance_origin().await.unwrap_err(),
            PipelineErrorKind::Reset(ResetError::ReorgDetected(_, _))
        ));
    }

    #[tokio::test]
    async fn test_advance_origin_missing_block_is_temporary() {
        let mut stage = L1Traversal::new(TestChainProvider::default(), block(1, B256::ZERO));
        assert!(matches!(
            stage.advance_origin().await.unwrap_err(),
            PipelineErrorKind::Temporary(_)
        ));
    }

    #[tokio::test]
    async fn test_reset_signal_reopens_stage() {
        let origin = block(1, B256::ZERO);
        let mut stage = L1Traversal::new(TestChainProvider::default(), origin);
        let _ = stage.next_l1_block().unwrap();

        let new_origin = block(7, B256::with_last_byte(0x07));
        stage
            .signal(ResetSignal { l1_origin: new_origin, ..Default::default() }.signal())
            .await
            .unwrap();
        assert_eq!(stage.next_l1_block().unwrap(), Some(new_origin));
    }
}
