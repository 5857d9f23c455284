//! The assembled derivation pipeline.

use crate::{
    AttributesQueue, BatchQueue, CalldataSource, ChainProvider, ChannelBank, ChannelReader,
    FrameQueue, L1Retrieval, L1Traversal, NextAttributes, OriginProvider, Pipeline, PipelineError,
    PipelineErrorKind, PipelineResult, Signal, StatefulAttributesBuilder, StepResult,
};
use async_trait::async_trait;
use kanvas_genesis::RollupConfig;
use kanvas_protocol::{BlockInfo, KanvasAttributesWithParent, L2BlockInfo};
use std::{collections::VecDeque, sync::Arc};

/// The derivation pipeline: drives the stage chain and buffers the attributes
/// it produces until the driver consumes them.
#[derive(Debug)]
pub struct DerivationPipeline<S>
where
    S: NextAttributes + OriginProvider + Send,
{
    /// The sink stage of the pipeline.
    pub attributes: S,
    /// Attributes prepared but not yet consumed.
    prepared: VecDeque<KanvasAttributesWithParent>,
}

impl<S> DerivationPipeline<S>
where
    S: NextAttributes + OriginProvider + Send,
{
    /// Creates a new pipeline over the given sink stage.
    pub const fn new(attributes: S) -> Self {
        Self { attributes, prepared: VecDeque::new() }
    }
}

impl<S> OriginProvider for DerivationPipeline<S>
where
    S: NextAttributes + OriginProvider + Send,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.attributes.origin()
    }
}

#[async_trait]
impl<S> Pipeline for DerivationPipeline<S>
where
    S: NextAttributes + OriginProvider + Send + std::fmt::Debug,
{
    fn next(&mut self) -> Option<KanvasAttributesWithParent> {
        self.prepared.pop_front()
    }

    async fn step(&mut self, l2_safe_head: L2BlockInfo) -> StepResult {
        match self.attributes.next_attributes(l2_safe_head).await {
            Ok(attrs) => {
                trace!(target: "pipeline", "Prepared attributes");
                self.prepared.push_back(attrs);
                StepResult::PreparedAttributes
            }
            Err(PipelineErrorKind::Temporary(PipelineError::Eof)) => {
                match self.attributes.advance_origin().await {
                    Ok(()) => {
                        if let Some(origin) = self.attributes.origin() {
                            kanvas_macros::set!(
                                gauge,
                                crate::Metrics::PIPELINE_L1_ORIGIN,
                                origin.number
                            );
                        }
                        StepResult::AdvancedOrigin
                    }
                    Err(err) => StepResult::OriginAdvanceErr(err),
                }
            }
            Err(err) => StepResult::StepFailed(err),
        }
    }

    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prepared.clear();
        self.attributes.signal(signal).await
    }
}

/// The full derivation pipeline over calldata batcher data, generic only over
/// the L1 provider.
pub type KanvasDerivationPipeline<P> = DerivationPipeline<
    AttributesQueue<
        BatchQueue<
            ChannelReader<
                ChannelBank<FrameQueue<L1Retrieval<CalldataSource<P>, L1Traversal<P>>>>,
            >,
        >,
        StatefulAttributesBuilder<P>,
    >,
>;

/// Assembles a [`KanvasDerivationPipeline`] reading L1 data from `provider`,
/// opened at `origin`.
pub fn new_derivation_pipeline<P>(
    cfg: Arc<RollupConfig>,
    provider: P,
    origin: BlockInfo,
) -> KanvasDerivationPipeline<P>
where
    P: ChainProvider + Clone + Send,
{
    let traversal = L1Traversal::new(provider.clone(), origin);
    let dap = CalldataSource::new(provider.clone(), cfg.batch_inbox_address);
    let retrieval = L1Retrieval::new(traversal, dap, cfg.clone());
    let frame_queue = FrameQueue::new(retrieval);
    let channel_bank = ChannelBank::new(frame_queue, cfg.clone());
    let channel_reader = ChannelReader::new(channel_bank);
    let batch_queue = BatchQueue::new(channel_reader, cfg.clone());
    let builder = StatefulAttributesBuilder::new(cfg, provider);
    let attributes_queue = AttributesQueue::new(batch_queue, builder);
    DerivationPipeline::new(attributes_queue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_rollup_config, TestChainProvider};
    use alloy_consensus::{transaction::SignerRecoverable, Header, Signed, TxEnvelope, TxLegacy};
    use alloy_eips::eip1898::BlockNumHash;
    use alloy_primitives::{Bytes, Signature, TxKind, B256};
    use kanvas_protocol::{Frame, L2BlockInfo, SingleBatch, DERIVATION_VERSION_0};

    fn channel_payload(batch: &SingleBatch) -> Bytes {
        let mut raw = Vec::new();
        batch.encode_channel_entry(&mut raw);
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&raw, 9);
        let frame = Frame { id: [0x11; 16], number: 0, data: compressed, is_last: true };
        let mut payload = vec![DERIVATION_VERSION_0];
        payload.extend_from_slice(&frame.encode());
        payload.into()
    }

    /// Derives one L2 block end to end: an L1 block carrying a batcher
    /// transaction flows through every stage into payload attributes.
    #[tokio::test]
    async fn test_full_pipeline_derives_attributes() {
        let mut cfg = test_rollup_config();

        let origin = BlockInfo {
            hash: cfg.genesis.l1.hash,
            number: 0,
            parent_hash: B256::ZERO,
            timestamp: 0,
        };
        let parent = L2BlockInfo::new(
            BlockInfo {
                hash: cfg.genesis.l2.hash,
                number: 0,
                parent_hash: B256::ZERO,
                timestamp: 0,
            },
            BlockNumHash { number: 0, hash: origin.hash },
            0,
        );

        let user_tx = Bytes::from_static(&[0x02, 0xAA]);
        let batch = SingleBatch {
            parent_hash: parent.block_info.hash,
            epoch_num: 0,
            epoch_hash: origin.hash,
            timestamp: cfg.block_time,
            transactions: vec![user_tx.clone()],
        };
        let batcher_tx = TxEnvelope::Legacy(Signed::new_unchecked(
            TxLegacy {
                to: TxKind::Call(cfg.batch_inbox_address),
                input: channel_payload(&batch),
                ..Default::default()
            },
            Signature::test_signature(),
            Default::default(),
        ));
        cfg.genesis.system_config.batcher_addr = batcher_tx.recover_signer().unwrap();

        let data_block = BlockInfo {
            hash: B256::with_last_byte(0x02),
            number: 1,
            parent_hash: origin.hash,
            timestamp: 12,
        };
        let mut provider = TestChainProvider::default();
        provider.insert_block_with_transactions(0, origin, vec![]);
        provider.insert_block_with_transactions(1, data_block, vec![batcher_tx]);
        provider.insert_header(
            origin.hash,
            Header {
                number: 0,
                parent_hash: B256::ZERO,
                timestamp: 0,
                mix_hash: B256::with_last_byte(0x99),
                base_fee_per_gas: Some(7),
                ..Default::default()
            },
        );

        let mut pipeline = new_derivation_pipeline(Arc::new(cfg), provider, origin);

        let mut attributes = None;
        for _ in 0..32 {
            if let Some(prepared) = pipeline.next() {
                attributes = Some(prepared);
                break;
            }
            match pipeline.step(parent).await {
                StepResult::PreparedAttributes
                | StepResult::AdvancedOrigin => {}
                StepResult::OriginAdvanceErr(err) | StepResult::StepFailed(err) => {
                    assert!(
                        matches!(err, PipelineErrorKind::Temporary(_)),
                        "unexpected pipeline error: {err}"
                    );
                }
            }
        }

        let attributes = attributes.expect("pipeline derived no attributes");
        assert_eq!(attributes.parent, parent);
        assert_eq!(attributes.inner.timestamp(), 2);
        assert_eq!(attributes.inner.no_tx_pool, Some(true));
        // The L1-info deposit leads, the batch transaction follows.
        let txs = attributes.inner.transactions.as_ref().unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0][0], kanvas_protocol::DEPOSIT_TX_TYPE);
        assert_eq!(txs[1], user_tx);
    }
}

