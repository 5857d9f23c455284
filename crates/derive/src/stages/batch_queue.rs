//! The batch queue stage.

use crate::{
    stages::BatchQueueProvider, AttributesProvider, OriginAdvancer, OriginProvider, PipelineError,
    PipelineErrorKind, PipelineResult, Signal, SignalReceiver,
};
use async_trait::async_trait;
use kanvas_genesis::RollupConfig;
use kanvas_protocol::{BatchValidity, BlockInfo, L2BlockInfo, SingleBatch};
use std::sync::Arc;

/// Validates decoded batches against the safe head and fills empty L2 slots
/// with deposits-only batches once the sequencing window expires.
#[derive(Debug)]
pub struct BatchQueue<P>
where
    P: BatchQueueProvider + OriginAdvancer,
{
    /// The previous stage.
    pub prev: P,
    /// The rollup configuration.
    cfg: Arc<RollupConfig>,
    /// The stage's view of the current L1 origin.
    origin: Option<BlockInfo>,
    /// The window of L1 blocks seen since the last reset, `l1_blocks[0]` being
    /// the current epoch.
    l1_blocks: Vec<BlockInfo>,
    /// Decoded batches awaiting validation, with their inclusion block.
    batches: Vec<(SingleBatch, BlockInfo)>,
}

impl<P> BatchQueue<P>
where
    P: BatchQueueProvider + OriginAdvancer,
{
    /// Creates a new batch queue.
    pub const fn new(prev: P, cfg: Arc<RollupConfig>) -> Self {
        Self { prev, cfg, origin: None, l1_blocks: Vec::new(), batches: Vec::new() }
    }

    /// Selects the next batch for the slot after `parent`, synthesizing a
    /// deposits-only batch once the sequencing window has expired with no
    /// valid batch in sight.
    fn derive_next_batch(&mut self, parent: L2BlockInfo) -> PipelineResult<SingleBatch> {
        let next_timestamp = parent.block_info.timestamp + self.cfg.block_time;

        loop {
            // Validate buffered batches against the parent, dropping invalid
            // ones and keeping future/undecided ones for later.
            let cfg = &self.cfg;
            let l1_blocks = &self.l1_blocks;
            let mut candidate = None;
            self.batches.retain(|(batch, inclusion)| {
                if candidate.is_some() {
                    return true;
                }
                match batch.check_batch(cfg, l1_blocks, parent, inclusion) {
                    BatchValidity::Accept => {
                        candidate = Some(batch.clone());
                        false
                    }
                    BatchValidity::Drop => {
                        warn!(
                            target: "batch_queue",
                            timestamp = batch.timestamp,
                            epoch = batch.epoch_num,
                            "Dropping invalid batch"
                        );
                        kanvas_macros::inc!(counter, crate::Metrics::PIPELINE_BATCHES_DROPPED);
                        false
                    }
                    BatchValidity::Undecided | BatchValidity::Future => true,
                }
            });
            if let Some(batch) = candidate {
                return Ok(batch);
            }

            let epoch = *self.l1_blocks.first().ok_or(PipelineError::Eof.temp())?;
            let origin = self.origin.ok_or(PipelineError::MissingOrigin.crit())?;

            // Only force empty batches once the sequencing window has expired;
            // before that, more batch data may still arrive.
            if origin.number <= epoch.number + self.cfg.seq_window_size {
                return Err(PipelineError::Eof.temp());
            }
            // Without visibility of the next L1 origin the epoch cannot be
            // advanced nor an empty batch anchored.
            if self.l1_blocks.len() < 2 {
                return Err(PipelineError::Eof.temp());
            }

            let next_epoch = self.l1_blocks[1];
            if next_timestamp < next_epoch.timestamp {
                info!(
                    target: "batch_queue",
                    timestamp = next_timestamp,
                    epoch = epoch.number,
                    "Generating deposits-only batch for empty slot"
                );
                kanvas_macros::inc!(counter, crate::Metrics::PIPELINE_EMPTY_BATCHES);
                return Ok(SingleBatch {
                    parent_hash: parent.block_info.hash,
                    epoch_num: epoch.number,
                    epoch_hash: epoch.hash,
                    timestamp: next_timestamp,
                    transactions: Vec::new(),
                });
            }

            // The current epoch is exhausted; move to the next one.
            self.l1_blocks.remove(0);
        }
    }
}

#[async_trait]
impl<P> AttributesProvider for BatchQueue<P>
where
    P: BatchQueueProvider + OriginAdvancer + SignalReceiver + Send,
{
    async fn next_batch(&mut self, parent: L2BlockInfo) -> PipelineResult<SingleBatch> {
        // Adopt the initial origin on first use and after resets.
        if self.origin.is_none() {
            self.origin = self.prev.origin();
            if let Some(origin) = self.origin {
                self.l1_blocks.push(origin);
            }
        }

        // Drop epochs the safe head has moved past.
        while self.l1_blocks.first().is_some_and(|f| f.number < parent.l1_origin.number) {
            self.l1_blocks.remove(0);
        }

        // Pull every batch currently available from the channel reader.
        loop {
            match self.prev.next_batch().await {
                Ok(batch) => {
                    let origin = self.origin.ok_or(PipelineError::MissingOrigin.crit())?;
                    self.batches.push((batch, origin));
                }
                Err(PipelineErrorKind::Temporary(PipelineError::Eof)) => break,
                Err(err) => return Err(err),
            }
        }

        self.derive_next_batch(parent)
    }
}

impl<P> OriginProvider for BatchQueue<P>
where
    P: BatchQueueProvider + OriginAdvancer,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> OriginAdvancer for BatchQueue<P>
where
    P: BatchQueueProvider + OriginAdvancer + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await?;
        if let Some(origin) = self.prev.origin() {
            self.origin = Some(origin);
            self.l1_blocks.push(origin);
        }
        Ok(())
    }
}

#[async_trait]
impl<P> SignalReceiver for BatchQueue<P>
where
    P: BatchQueueProvider + OriginAdvancer + SignalReceiver + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        self.origin = None;
        self.l1_blocks.clear();
        self.batches.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_rollup_config, TestBatchQueueProvider};
    use alloy_eips::eip1898::BlockNumHash;
    use alloy_primitives::{Bytes, B256};

    fn l1_block(number: u64) -> BlockInfo {
        BlockInfo {
            hash: B256::with_last_byte(0x10 + number as u8),
            number,
            parent_hash: B256::with_last_byte(0x0F + number as u8),
            timestamp: number * 12,
        }
    }

    fn parent_at(epoch: &BlockInfo, timestamp: u64) -> L2BlockInfo {
        L2BlockInfo::new(
            BlockInfo {
                hash: B256::with_last_byte(0xA0),
                number: 10,
                parent_hash: B256::with_last_byte(0x9F),
                timestamp,
            },
            BlockNumHash { number: epoch.number, hash: epoch.hash },
            0,
        )
    }

    #[tokio::test]
    async fn test_valid_batch_selected() {
        let cfg = Arc::new(test_rollup_config());
        let epoch = l1_block(1);
        let parent = parent_at(&epoch, 12);
        let batch = SingleBatch {
            parent_hash: parent.block_info.hash,
            epoch_num: epoch.number,
            epoch_hash: epoch.hash,
            timestamp: 12 + cfg.block_time,
            transactions: vec![Bytes::from_static(&[0x02])],
        };
        let provider = TestBatchQueueProvider::new(vec![batch.clone()], epoch);
        let mut stage = BatchQueue::new(provider, cfg);
        assert_eq!(stage.next_batch(parent).await.unwrap(), batch);
    }

    #[tokio::test]
    async fn test_invalid_batch_dropped_then_eof() {
        let cfg = Arc::new(test_rollup_config());
        let epoch = l1_block(1);
        let parent = parent_at(&epoch, 12);
        // Wrong parent hash: dropped by validation.
        let bad = SingleBatch {
            parent_hash: B256::with_last_byte(0xBB),
            epoch_num: epoch.number,
            epoch_hash: epoch.hash,
            timestamp: 12 + cfg.block_time,
            transactions: vec![Bytes::from_static(&[0x02])],
        };
        let provider = TestBatchQueueProvider::new(vec![bad], epoch);
        let mut stage = BatchQueue::new(provider, cfg);
        assert!(matches!(
            stage.next_batch(parent).await.unwrap_err(),
            PipelineErrorKind::Temporary(PipelineError::Eof)
        ));
        assert!(stage.batches.is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_synthesized_after_window_expiry() {
        let cfg = Arc::new(test_rollup_config());
        let epoch = l1_block(1);
        let parent = parent_at(&epoch, 12);

        let mut provider = TestBatchQueueProvider::new(vec![], epoch);
        provider.origin = l1_block(2 + cfg.seq_window_size);
        let mut stage = BatchQueue::new(provider, cfg.clone());

        // Window of visible origins: the epoch and its successor.
        stage.origin = Some(l1_block(2 + cfg.seq_window_size));
        stage.l1_blocks = vec![epoch, l1_block(2)];

        let batch = stage.derive_next_batch(parent).unwrap();
        assert_eq!(batch.parent_hash, parent.block_info.hash);
        assert_eq!(batch.epoch_num, epoch.number);
        assert_eq!(batch.timestamp, 12 + cfg.block_time);
        assert!(batch.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_no_empty_batch_before_window_expiry() {
        let cfg = Arc::new(test_rollup_config());
        let epoch = l1_block(1);
        let parent = parent_at(&epoch, 12);
        let mut stage = BatchQueue::new(TestBatchQueueProvider::new(vec![], epoch), cfg);
        stage.origin = Some(l1_block(3));
        stage.l1_blocks = vec![epoch, l1_block(2)];
        assert!(matches!(
            stage.derive_next_batch(parent).unwrap_err(),
            PipelineErrorKind::Temporary(PipelineError::Eof)
        ));
    }
}
