//! In-memory fakes for pipeline tests.

use crate::{
    stages::BatchQueueProvider, AttributesBuilder, AttributesProvider, ChainProvider,
    ChannelBankProvider, ChannelReaderProvider, FrameQueueProvider, L2ChainProvider,
    OriginAdvancer, OriginProvider, PipelineError, PipelineErrorKind, PipelineResult, Signal,
    SignalReceiver,
};
use alloy_consensus::{Header, Receipt, TxEnvelope};
use alloy_eips::eip1898::BlockNumHash;
use alloy_primitives::{map::HashMap, Address, Bytes, B256, U256};
use async_trait::async_trait;
use kanvas_genesis::{ChainGenesis, RollupConfig, SystemConfig};
use kanvas_protocol::{BlockInfo, Frame, KanvasPayloadAttributes, L2BlockInfo, SingleBatch};
use std::collections::VecDeque;

/// A rollup config with small, test-friendly windows.
pub fn test_rollup_config() -> RollupConfig {
    RollupConfig {
        genesis: ChainGenesis {
            l1: BlockNumHash { number: 0, hash: B256::with_last_byte(0x01) },
            l2: BlockNumHash { number: 0, hash: B256::with_last_byte(0x02) },
            l2_time: 0,
            system_config: SystemConfig {
                batcher_addr: Address::with_last_byte(0x42),
                overhead: U256::from(2100u64),
                scalar: U256::from(1_000_000u64),
                gas_limit: 30_000_000,
            },
        },
        block_time: 2,
        max_sequencer_drift: 600,
        seq_window_size: 100,
        channel_timeout: 10,
        l1_chain_id: 1,
        l2_chain_id: 255,
        batch_inbox_address: Address::with_last_byte(0xff),
        deposit_contract_address: Address::with_last_byte(0xee),
        p2p_proposer_address: Some(Address::with_last_byte(0xaa)),
    }
}

/// An error returned by the test providers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TestProviderError {
    /// The block is not in the provider.
    #[error("block not found: {0}")]
    BlockNotFound(u64),
    /// The hash is not in the provider.
    #[error("hash not found: {0}")]
    HashNotFound(B256),
}

impl From<TestProviderError> for PipelineErrorKind {
    fn from(err: TestProviderError) -> Self {
        PipelineError::Provider(err.to_string()).temp()
    }
}

/// An in-memory [`ChainProvider`].
#[derive(Debug, Clone, Default)]
pub struct TestChainProvider {
    /// Blocks by number.
    pub blocks: Vec<(u64, BlockInfo)>,
    /// Headers by hash.
    pub headers: HashMap<B256, Header>,
    /// Receipts by block hash.
    pub receipts: HashMap<B256, Vec<Receipt>>,
    /// Transactions by block hash.
    pub transactions: HashMap<B256, Vec<TxEnvelope>>,
}

impl TestChainProvider {
    /// Inserts a block by number.
    pub fn insert_block(&mut self, number: u64, block: BlockInfo) {
        self.blocks.push((number, block));
    }

    /// Inserts a block along with its transactions.
    pub fn insert_block_with_transactions(
        &mut self,
        number: u64,
        block: BlockInfo,
        txs: Vec<TxEnvelope>,
    ) {
        self.blocks.push((number, block));
        self.transactions.insert(block.hash, txs);
    }

    /// Inserts a header by hash.
    pub fn insert_header(&mut self, hash: B256, header: Header) {
        self.headers.insert(hash, header);
    }

    /// Inserts receipts by block hash.
    pub fn insert_receipts(&mut self, hash: B256, receipts: Vec<Receipt>) {
        self.receipts.insert(hash, receipts);
    }
}

#[async_trait]
impl ChainProvider for TestChainProvider {
    type Error = TestProviderError;

    async fn header_by_hash(&mut self, hash: B256) -> Result<Header, Self::Error> {
        self.headers.get(&hash).cloned().ok_or(TestProviderError::HashNotFound(hash))
    }

    async fn block_info_by_number(&mut self, number: u64) -> Result<BlockInfo, Self::Error> {
        self.blocks
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, b)| *b)
            .ok_or(TestProviderError::BlockNotFound(number))
    }

    async fn receipts_by_hash(&mut self, hash: B256) -> Result<Vec<Receipt>, Self::Error> {
        self.receipts.get(&hash).cloned().ok_or(TestProviderError::HashNotFound(hash))
    }

    async fn block_info_and_transactions_by_hash(
        &mut self,
        hash: B256,
    ) -> Result<(BlockInfo, Vec<TxEnvelope>), Self::Error> {
        let block = self
            .blocks
            .iter()
            .find(|(_, b)| b.hash == hash)
            .map(|(_, b)| *b)
            .ok_or(TestProviderError::HashNotFound(hash))?;
        Ok((block, self.transactions.get(&hash).cloned().unwrap_or_default()))
    }
}

/// An in-memory [`L2ChainProvider`].
#[derive(Debug, Clone, Default)]
pub struct TestL2ChainProvider {
    /// L2 blocks by number.
    pub blocks: Vec<L2BlockInfo>,
}

impl TestL2ChainProvider {
    /// Inserts an L2 block.
    pub fn insert_l2_block(&mut self, block: L2BlockInfo) {
        self.blocks.push(block);
    }
}

#[async_trait]
impl L2ChainProvider for TestL2ChainProvider {
    type Error = TestProviderError;

    async fn l2_block_info_by_number(&mut self, number: u64) -> Result<L2BlockInfo, Self::Error> {
        self.blocks
            .iter()
            .find(|b| b.block_info.number == number)
            .copied()
            .ok_or(TestProviderError::BlockNotFound(number))
    }
}

macro_rules! impl_static_origin_stage {
    ($name:ident) => {
        impl OriginProvider for $name {
            fn origin(&self) -> Option<BlockInfo> {
                Some(self.origin)
            }
        }

        #[async_trait]
        impl OriginAdvancer for $name {
            async fn advance_origin(&mut self) -> PipelineResult<()> {
                Ok(())
            }
        }

        #[async_trait]
        impl SignalReceiver for $name {
            async fn signal(&mut self, _: Signal) -> PipelineResult<()> {
                Ok(())
            }
        }
    };
}

/// A [`FrameQueueProvider`] yielding fixed payloads.
#[derive(Debug, Default)]
pub struct TestFrameQueueProvider {
    /// The payloads to yield.
    pub data: VecDeque<Bytes>,
    /// The static origin.
    pub origin: BlockInfo,
}

impl TestFrameQueueProvider {
    /// Creates a new provider over the given payloads.
    pub fn new(data: Vec<Bytes>) -> Self {
        Self { data: data.into(), origin: BlockInfo::default() }
    }
}

#[async_trait]
impl FrameQueueProvider for TestFrameQueueProvider {
    async fn next_data(&mut self) -> PipelineResult<Bytes> {
        self.data.pop_front().ok_or(PipelineError::Eof.temp())
    }
}

impl_static_origin_stage!(TestFrameQueueProvider);

/// A [`ChannelBankProvider`] yielding fixed frames.
#[derive(Debug, Default)]
pub struct TestChannelBankProvider {
    /// The frames to yield.
    pub frames: VecDeque<Frame>,
    /// The static origin.
    pub origin: BlockInfo,
}

impl TestChannelBankProvider {
    /// Creates a new provider over the given frames.
    pub fn new(frames: Vec<Frame>, origin: BlockInfo) -> Self {
        Self { frames: frames.into(), origin }
    }
}

#[async_trait]
impl ChannelBankProvider for TestChannelBankProvider {
    async fn next_frame(&mut self) -> PipelineResult<Frame> {
        self.frames.pop_front().ok_or(PipelineError::Eof.temp())
    }
}

impl_static_origin_stage!(TestChannelBankProvider);

/// A [`ChannelReaderProvider`] yielding fixed channel data.
#[derive(Debug, Default)]
pub struct TestChannelReaderProvider {
    /// The channel payloads to yield.
    pub data: VecDeque<Bytes>,
    /// The static origin.
    pub origin: BlockInfo,
}

impl TestChannelReaderProvider {
    /// Creates a new provider over the given channel payloads.
    pub fn new(data: Vec<Bytes>) -> Self {
        Self { data: data.into(), origin: BlockInfo::default() }
    }
}

#[async_trait]
impl ChannelReaderProvider for TestChannelReaderProvider {
    async fn next_channel_data(&mut self) -> PipelineResult<Bytes> {
        self.data.pop_front().ok_or(PipelineError::Eof.temp())
    }
}

impl_static_origin_stage!(TestChannelReaderProvider);

/// A [`BatchQueueProvider`] yielding fixed batches.
#[derive(Debug, Default)]
pub struct TestBatchQueueProvider {
    /// The batches to yield.
    pub batches: VecDeque<SingleBatch>,
    /// The static origin.
    pub origin: BlockInfo,
}

impl TestBatchQueueProvider {
    /// Creates a new provider over the given batches.
    pub fn new(batches: Vec<SingleBatch>, origin: BlockInfo) -> Self {
        Self { batches: batches.into(), origin }
    }
}

#[async_trait]
impl BatchQueueProvider for TestBatchQueueProvider {
    async fn next_batch(&mut self) -> PipelineResult<SingleBatch> {
        self.batches.pop_front().ok_or(PipelineError::Eof.temp())
    }
}

impl_static_origin_stage!(TestBatchQueueProvider);

/// An [`AttributesProvider`] yielding fixed batches, ignoring the parent.
#[derive(Debug, Default)]
pub struct TestBatchProvider {
    /// The batches to yield.
    pub batches: VecDeque<SingleBatch>,
    /// The static origin.
    pub origin: BlockInfo,
}

impl TestBatchProvider {
    /// Creates a new provider over the given batches.
    pub fn new(batches: Vec<SingleBatch>) -> Self {
        Self { batches: batches.into(), origin: BlockInfo::default() }
    }
}

#[async_trait]
impl AttributesProvider for TestBatchProvider {
    async fn next_batch(&mut self, _: L2BlockInfo) -> PipelineResult<SingleBatch> {
        self.batches.pop_front().ok_or(PipelineError::Eof.temp())
    }
}

impl_static_origin_stage!(TestBatchProvider);

/// An [`AttributesBuilder`] returning canned results.
#[derive(Debug, Default)]
pub struct TestAttributesBuilder {
    /// The results to return, in order.
    pub results: VecDeque<PipelineResult<KanvasPayloadAttributes>>,
}

impl TestAttributesBuilder {
    /// Creates a new builder over the given results.
    pub fn new(results: Vec<PipelineResult<KanvasPayloadAttributes>>) -> Self {
        Self { results: results.into() }
    }
}

#[async_trait]
impl AttributesBuilder for TestAttributesBuilder {
    async fn prepare_payload_attributes(
        &mut self,
        _: L2BlockInfo,
        _: BlockNumHash,
    ) -> PipelineResult<KanvasPayloadAttributes> {
        self.results.pop_front().unwrap_or(Err(PipelineError::Eof.temp()))
    }
}
