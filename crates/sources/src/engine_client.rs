//! The alloy-backed engine client.

use crate::SourceProviderError;
use alloy_eips::{eip2718::Encodable2718, BlockNumberOrTag};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types_engine::{
    ExecutionPayloadV1, ForkchoiceState, ForkchoiceUpdated, PayloadId, PayloadStatus,
};
use async_trait::async_trait;
use kanvas_engine::{EngineApi, EngineApiError};
use kanvas_genesis::RollupConfig;
use kanvas_protocol::{KanvasPayloadAttributes, L2BlockInfo};
use std::sync::Arc;

/// The engine-API methods driven by the node.
const FORKCHOICE_UPDATED: &str = "engine_forkchoiceUpdatedV1";
const GET_PAYLOAD: &str = "engine_getPayloadV1";
const NEW_PAYLOAD: &str = "engine_newPayloadV1";

/// An [`EngineApi`] implementation over the L2 engine JSON-RPC endpoint.
///
/// The same endpoint also serves the eth namespace, which backs the L2 chain
/// reads (`payload_by_number`, sync-start label queries).
#[derive(Debug, Clone)]
pub struct AlloyEngineClient {
    /// The engine endpoint provider.
    inner: RootProvider,
    /// The rollup config.
    cfg: Arc<RollupConfig>,
}

impl AlloyEngineClient {
    /// Creates a new engine client.
    pub const fn new(inner: RootProvider, cfg: Arc<RollupConfig>) -> Self {
        Self { inner, cfg }
    }

    fn map_rpc_err(err: impl std::fmt::Display) -> EngineApiError {
        let msg = err.to_string();
        // A refused connection means the engine process is gone; transport
        // hiccups and timeouts are retried.
        if msg.contains("connection refused") {
            EngineApiError::Unavailable(msg)
        } else {
            EngineApiError::Transport(msg)
        }
    }

    async fn block_payload(
        &self,
        tag: BlockNumberOrTag,
    ) -> Result<Option<ExecutionPayloadV1>, SourceProviderError> {
        let block = self
            .inner
            .get_block_by_number(tag)
            .full()
            .await
            .map_err(|e| SourceProviderError::Rpc(e.to_string()))?;
        let Some(block) = block else { return Ok(None) };

        let header = &block.header.inner;
        let transactions = block
            .transactions
            .clone()
            .into_transactions()
            .map(|tx| tx.into_inner().encoded_2718().into())
            .collect();
        Ok(Some(ExecutionPayloadV1 {
            parent_hash: header.parent_hash,
            fee_recipient: header.beneficiary,
            state_root: header.state_root,
            receipts_root: header.receipts_root,
            logs_bloom: header.logs_bloom,
            prev_randao: header.mix_hash,
            block_number: header.number,
            gas_limit: header.gas_limit,
            gas_used: header.gas_used,
            timestamp: header.timestamp,
            extra_data: header.extra_data.clone(),
            base_fee_per_gas: alloy_primitives::U256::from(
                header.base_fee_per_gas.unwrap_or_default(),
            ),
            block_hash: block.header.hash,
            transactions,
        }))
    }

    /// Fetches the [`L2BlockInfo`] at the given label, if the block exists.
    pub async fn l2_block_info_by_label(
        &self,
        tag: BlockNumberOrTag,
    ) -> Result<Option<L2BlockInfo>, SourceProviderError> {
        let Some(payload) = self.block_payload(tag).await? else { return Ok(None) };
        L2BlockInfo::from_payload_and_genesis(&payload, &self.cfg.genesis)
            .map(Some)
            .map_err(|e| SourceProviderError::MalformedBlock(e.to_string()))
    }
}

#[async_trait]
impl EngineApi for AlloyEngineClient {
    async fn forkchoice_updated(
        &self,
        state: ForkchoiceState,
        attributes: Option<KanvasPayloadAttributes>,
    ) -> Result<ForkchoiceUpdated, EngineApiError> {
        self.inner
            .client()
            .request(FORKCHOICE_UPDATED, (state, attributes))
            .await
            .map_err(Self::map_rpc_err)
    }

    async fn get_payload(
        &self,
        payload_id: PayloadId,
    ) -> Result<ExecutionPayloadV1, EngineApiError> {
        self.inner.client().request(GET_PAYLOAD, (payload_id,)).await.map_err(Self::map_rpc_err)
    }

    async fn new_payload(
        &self,
        payload: ExecutionPayloadV1,
    ) -> Result<PayloadStatus, EngineApiError> {
        self.inner.client().request(NEW_PAYLOAD, (payload,)).await.map_err(Self::map_rpc_err)
    }

    async fn payload_by_number(&self, number: u64) -> Result<ExecutionPayloadV1, EngineApiError> {
        self.block_payload(number.into())
            .await
            .map_err(EngineApiError::from)?
            .ok_or(EngineApiError::BlockNotFound(number))
    }
}

#[async_trait]
impl kanvas_derive::L2ChainProvider for AlloyEngineClient {
    type Error = SourceProviderError;

    async fn l2_block_info_by_number(&mut self, number: u64) -> Result<L2BlockInfo, Self::Error> {
        let payload = self
            .block_payload(number.into())
            .await?
            .ok_or(SourceProviderError::BlockNotFound(number))?;
        L2BlockInfo::from_payload_and_genesis(&payload, &self.cfg.genesis)
            .map_err(|e| SourceProviderError::MalformedBlock(e.to_string()))
    }
}

#[async_trait]
impl kanvas_rpc::L2EthClient for AlloyEngineClient {
    async fn state_root_by_hash(
        &self,
        hash: alloy_primitives::B256,
    ) -> Result<alloy_primitives::B256, kanvas_rpc::L2EthClientError> {
        let block = self
            .inner
            .get_block_by_hash(hash)
            .await
            .map_err(|e| kanvas_rpc::L2EthClientError::Rpc(e.to_string()))?
            .ok_or(kanvas_rpc::L2EthClientError::BlockNotFound(hash))?;
        Ok(block.header.inner.state_root)
    }

    async fn get_proof(
        &self,
        address: alloy_primitives::Address,
        block_hash: alloy_primitives::B256,
    ) -> Result<alloy_rpc_types_eth::EIP1186AccountProofResponse, kanvas_rpc::L2EthClientError>
    {
        self.inner
            .get_proof(address, vec![])
            .block_id(block_hash.into())
            .await
            .map_err(|e| kanvas_rpc::L2EthClientError::Rpc(e.to_string()))
    }
}

#[async_trait]
impl crate::L2SyncProvider for AlloyEngineClient {
    async fn latest_l2_block(&mut self) -> Result<L2BlockInfo, SourceProviderError> {
        self.l2_block_info_by_label(BlockNumberOrTag::Latest)
            .await?
            .ok_or(SourceProviderError::BlockNotFound(0))
    }

    async fn finalized_l2_block(&mut self) -> Result<Option<L2BlockInfo>, SourceProviderError> {
        match self.l2_block_info_by_label(BlockNumberOrTag::Finalized).await {
            Ok(block) => Ok(block),
            // Nodes without a finalized block report an error for the tag.
            Err(SourceProviderError::Rpc(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
