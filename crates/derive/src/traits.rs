//! Capability traits at the seams of the pipeline.

use crate::{PipelineErrorKind, PipelineResult, Signal, StepResult};
use alloy_consensus::{Header, Receipt, TxEnvelope};
use alloy_eips::eip1898::BlockNumHash;
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use kanvas_protocol::{
    BlockInfo, KanvasAttributesWithParent, KanvasPayloadAttributes, L2BlockInfo, SingleBatch,
};
use std::fmt::Debug;

/// A read view of the L1 chain.
#[async_trait]
pub trait ChainProvider: Debug + Send {
    /// The provider error, tagged with a pipeline error kind.
    type Error: Into<PipelineErrorKind> + std::error::Error + Send + Sync + 'static;

    /// Fetches a header by block hash.
    async fn header_by_hash(&mut self, hash: B256) -> Result<Header, Self::Error>;

    /// Fetches a block ref by number.
    async fn block_info_by_number(&mut self, number: u64) -> Result<BlockInfo, Self::Error>;

    /// Fetches the receipts of a block by hash.
    async fn receipts_by_hash(&mut self, hash: B256) -> Result<Vec<Receipt>, Self::Error>;

    /// Fetches a block ref and its transactions by hash.
    async fn block_info_and_transactions_by_hash(
        &mut self,
        hash: B256,
    ) -> Result<(BlockInfo, Vec<TxEnvelope>), Self::Error>;
}

/// A read view of the L2 chain.
#[async_trait]
pub trait L2ChainProvider: Debug + Send {
    /// The provider error, tagged with a pipeline error kind.
    type Error: Into<PipelineErrorKind> + std::error::Error + Send + Sync + 'static;

    /// Fetches an [`L2BlockInfo`] by block number.
    async fn l2_block_info_by_number(&mut self, number: u64) -> Result<L2BlockInfo, Self::Error>;
}

/// A source of data-availability bytes for a given L1 block.
#[async_trait]
pub trait DataAvailabilityProvider: Debug + Send {
    /// The item yielded per batcher transaction.
    type Item: Send + Sync;

    /// Returns the next item for the given block, or `Eof` once exhausted.
    async fn next(
        &mut self,
        block_ref: &BlockInfo,
        batcher_address: Address,
    ) -> PipelineResult<Self::Item>;

    /// Clears any per-block state.
    fn clear(&mut self);
}

/// Exposes the L1 origin a stage is currently reading from.
pub trait OriginProvider {
    /// Returns the current L1 origin, if set.
    fn origin(&self) -> Option<BlockInfo>;
}

/// Advances a stage (and its predecessors) to the next L1 origin.
#[async_trait]
pub trait OriginAdvancer: OriginProvider + Debug + Send {
    /// Advances the internal state of this stage and all previous stages to
    /// the next L1 origin.
    async fn advance_origin(&mut self) -> PipelineResult<()>;
}

/// Receives control signals that propagate down the stage chain.
#[async_trait]
pub trait SignalReceiver: Debug + Send {
    /// Applies the signal to this stage and forwards it to its predecessor.
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()>;
}

/// Builds deterministic payload attributes for an L2 block.
#[async_trait]
pub trait AttributesBuilder: Debug + Send {
    /// Builds the attributes of the block after `parent`, anchored at the
    /// given L1 `epoch`.
    async fn prepare_payload_attributes(
        &mut self,
        parent: L2BlockInfo,
        epoch: BlockNumHash,
    ) -> PipelineResult<KanvasPayloadAttributes>;
}

/// Yields validated batches for the block after `parent`.
#[async_trait]
pub trait AttributesProvider: OriginAdvancer + SignalReceiver {
    /// Returns the next valid batch extending `parent`.
    async fn next_batch(&mut self, parent: L2BlockInfo) -> PipelineResult<SingleBatch>;
}

/// Yields full payload attributes for the block after `parent`.
#[async_trait]
pub trait NextAttributes: OriginAdvancer + SignalReceiver {
    /// Returns the attributes of the next block.
    async fn next_attributes(
        &mut self,
        parent: L2BlockInfo,
    ) -> PipelineResult<KanvasAttributesWithParent>;
}

/// The assembled derivation pipeline, as consumed by the driver.
#[async_trait]
pub trait Pipeline: OriginProvider + Debug + Send {
    /// Pops the next prepared attributes, if any.
    fn next(&mut self) -> Option<KanvasAttributesWithParent>;

    /// Steps the pipeline once against the current L2 safe head.
    async fn step(&mut self, l2_safe_head: L2BlockInfo) -> StepResult;

    /// Applies a control signal to every stage.
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()>;
}
