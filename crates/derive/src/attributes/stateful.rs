//! The stateful attributes builder.

use crate::{
    AttributesBuilder, ChainProvider, PipelineError, PipelineResult, ResetError,
};
use alloy_eips::eip1898::BlockNumHash;
use alloy_primitives::{Bytes, U256};
use alloy_rpc_types_engine::PayloadAttributes;
use async_trait::async_trait;
use kanvas_genesis::{Predeploys, RollupConfig};
use kanvas_protocol::{derive_deposits, BlockInfo, KanvasPayloadAttributes, L1BlockInfoTx, L2BlockInfo};
use std::sync::Arc;

/// Builds the deterministic payload attributes of an L2 block from its parent
/// and L1 epoch, fetching receipts and headers through a [`ChainProvider`].
#[derive(Debug, Clone)]
pub struct StatefulAttributesBuilder<P>
where
    P: ChainProvider,
{
    /// The rollup configuration.
    rollup_cfg: Arc<RollupConfig>,
    /// The L1 provider headers and receipts are read through.
    provider: P,
}

impl<P> StatefulAttributesBuilder<P>
where
    P: ChainProvider,
{
    /// Creates a new builder.
    pub const fn new(rollup_cfg: Arc<RollupConfig>, provider: P) -> Self {
        Self { rollup_cfg, provider }
    }
}

#[async_trait]
impl<P> AttributesBuilder for StatefulAttributesBuilder<P>
where
    P: ChainProvider + Send,
{
    async fn prepare_payload_attributes(
        &mut self,
        parent: L2BlockInfo,
        epoch: BlockNumHash,
    ) -> PipelineResult<KanvasPayloadAttributes> {
        let header = self.provider.header_by_hash(epoch.hash).await.map_err(Into::into)?;
        let origin = BlockInfo {
            hash: epoch.hash,
            number: header.number,
            parent_hash: header.parent_hash,
            timestamp: header.timestamp,
        };

        let (deposits, sequence_number) = if parent.l1_origin.number == epoch.number {
            // Staying within the epoch: no new deposits, the sequence advances.
            if parent.l1_origin.hash != epoch.hash {
                return Err(ResetError::ReorgDetected(parent.l1_origin.hash, epoch.hash).reset());
            }
            (Vec::new(), parent.seq_num + 1)
        } else if epoch.number == parent.l1_origin.number + 1 {
            // Epoch advance: the new origin must build on the parent's origin.
            if header.parent_hash != parent.l1_origin.hash {
                return Err(
                    ResetError::ReorgDetected(parent.l1_origin.hash, header.parent_hash).reset()
                );
            }
            let receipts = self.provider.receipts_by_hash(epoch.hash).await.map_err(Into::into)?;
            let deposits = derive_deposits(
                epoch.hash,
                &receipts,
                self.rollup_cfg.deposit_contract_address,
            )
            .map_err(|e| PipelineError::BadDeposits(e).crit())?;
            (deposits, 0)
        } else {
            return Err(
                ResetError::NonContiguousEpoch(epoch.number, parent.l1_origin.number).reset()
            );
        };

        let next_timestamp = parent.block_info.timestamp + self.rollup_cfg.block_time;
        if next_timestamp < origin.timestamp {
            return Err(ResetError::TimestampUnderflow(next_timestamp, origin.timestamp).reset());
        }
        let drift_deadline = origin.timestamp + self.rollup_cfg.max_sequencer_drift;
        if next_timestamp > drift_deadline {
            return Err(ResetError::TimestampDrift(next_timestamp, drift_deadline).reset());
        }

        let base_fee = U256::from(header.base_fee_per_gas.unwrap_or_default());
        let info = L1BlockInfoTx::new(
            &self.rollup_cfg.genesis.system_config,
            &origin,
            base_fee,
            sequence_number,
        );
        let mut transactions: Vec<Bytes> = Vec::with_capacity(1 + deposits.len());
        transactions.push(info.to_deposit_tx().encoded_2718());
        transactions.extend(deposits);

        Ok(KanvasPayloadAttributes {
            payload_attributes: PayloadAttributes {
                timestamp: next_timestamp,
                prev_randao: header.mix_hash,
                suggested_fee_recipient: Predeploys::PROPOSER_FEE_VAULT,
                withdrawals: None,
                parent_beacon_block_root: None,
            },
            transactions: Some(transactions),
            no_tx_pool: Some(sequence_number == 0),
            gas_limit: Some(self.rollup_cfg.gas_limit()),
        })
    }
}
