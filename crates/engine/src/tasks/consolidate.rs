//! A task to consolidate derived attributes against the existing unsafe chain.

use crate::{
    BuildTask, EngineApi, EngineApiError, EngineState, EngineSyncStateUpdate, EngineTaskError,
    EngineTaskExt, Metrics, SynchronizeTask,
};
use async_trait::async_trait;
use kanvas_genesis::RollupConfig;
use kanvas_protocol::{KanvasAttributesWithParent, L2BlockInfo};
use std::sync::Arc;

/// The result of matching derived attributes against an unsafe block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributesMatch {
    /// The unsafe block is exactly the block the attributes describe.
    Match,
    /// The unsafe block differs from the attributes.
    Mismatch(String),
}

impl AttributesMatch {
    /// Returns whether the attributes match.
    pub const fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Checks whether an unsafe payload is the block described by derived
/// attributes. Every consensus field must agree for the payload to be adopted
/// as safe.
pub fn attributes_match(
    attributes: &KanvasAttributesWithParent,
    payload: &alloy_rpc_types_engine::ExecutionPayloadV1,
) -> AttributesMatch {
    if payload.parent_hash != attributes.parent.block_info.hash {
        return AttributesMatch::Mismatch(format!(
            "parent hash: {} != {}",
            payload.parent_hash, attributes.parent.block_info.hash
        ));
    }
    if payload.timestamp != attributes.inner.timestamp() {
        return AttributesMatch::Mismatch(format!(
            "timestamp: {} != {}",
            payload.timestamp,
            attributes.inner.timestamp()
        ));
    }
    if payload.prev_randao != attributes.inner.payload_attributes.prev_randao {
        return AttributesMatch::Mismatch("prev randao".to_string());
    }
    if payload.fee_recipient != attributes.inner.payload_attributes.suggested_fee_recipient {
        return AttributesMatch::Mismatch("fee recipient".to_string());
    }
    if let Some(gas_limit) = attributes.inner.gas_limit {
        if payload.gas_limit != gas_limit {
            return AttributesMatch::Mismatch(format!(
                "gas limit: {} != {gas_limit}",
                payload.gas_limit
            ));
        }
    }
    let attr_txs = attributes.inner.transactions.as_deref().unwrap_or_default();
    if payload.transactions.len() != attr_txs.len() {
        return AttributesMatch::Mismatch(format!(
            "transaction count: {} != {}",
            payload.transactions.len(),
            attr_txs.len()
        ));
    }
    for (i, (got, expected)) in payload.transactions.iter().zip(attr_txs).enumerate() {
        if got != expected {
            return AttributesMatch::Mismatch(format!("transaction {i}"));
        }
    }
    AttributesMatch::Match
}

/// Consolidates derived attributes with the unsafe chain: when the unsafe
/// block at the attributes' height matches, only the safe head advances; when
/// it differs, the unsafe chain is reorged onto the derived block.
#[derive(Debug, Clone)]
pub struct ConsolidateTask<C: EngineApi> {
    /// The engine client.
    client: Arc<C>,
    /// The rollup config.
    cfg: Arc<RollupConfig>,
    /// The derived attributes.
    attributes: KanvasAttributesWithParent,
}

impl<C: EngineApi> ConsolidateTask<C> {
    /// Creates a new consolidate task.
    pub const fn new(
        client: Arc<C>,
        cfg: Arc<RollupConfig>,
        attributes: KanvasAttributesWithParent,
    ) -> Self {
        Self { client, cfg, attributes }
    }
}

#[async_trait]
impl<C: EngineApi> EngineTaskExt for ConsolidateTask<C> {
    type Output = L2BlockInfo;

    async fn execute(&self, state: &mut EngineState) -> Result<L2BlockInfo, EngineTaskError> {
        let block_number = self.attributes.block_number();

        let payload = match self.client.payload_by_number(block_number).await {
            Ok(payload) => payload,
            Err(EngineApiError::BlockNotFound(_)) => {
                // The unsafe chain does not reach this height; build directly.
                return BuildTask::new(
                    Arc::clone(&self.client),
                    Arc::clone(&self.cfg),
                    self.attributes.clone(),
                    true,
                )
                .execute(state)
                .await;
            }
            Err(err) => return Err(err.into()),
        };

        match attributes_match(&self.attributes, &payload) {
            AttributesMatch::Match => {
                let new_safe = L2BlockInfo::from_payload_and_genesis(&payload, &self.cfg.genesis)?;
                SynchronizeTask::new(
                    Arc::clone(&self.client),
                    EngineSyncStateUpdate { safe_head: Some(new_safe), ..Default::default() },
                )
                .execute(state)
                .await?;
                debug!(
                    target: "engine",
                    number = new_safe.block_info.number,
                    hash = %new_safe.block_info.hash,
                    "Consolidated unsafe block as safe"
                );
                kanvas_macros::inc!(counter, Metrics::ENGINE_CONSOLIDATIONS);
                Ok(new_safe)
            }
            AttributesMatch::Mismatch(reason) => {
                warn!(
                    target: "engine",
                    number = block_number,
                    reason,
                    "Unsafe block does not match derived attributes, reorging"
                );
                kanvas_macros::inc!(counter, Metrics::ENGINE_UNSAFE_REORGS);
                // Rebuilding from the derived attributes rewinds the unsafe
                // head onto the safe chain.
                BuildTask::new(
                    Arc::clone(&self.client),
                    Arc::clone(&self.cfg),
                    self.attributes.clone(),
                    true,
                )
                .execute(state)
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_engine_setup, TestEngineApi};

    #[tokio::test]
    async fn test_consolidation_promotes_safe_without_new_payload() {
        let (cfg, state0, attrs, payload) = test_engine_setup();
        // The unsafe chain already holds exactly the derived block.
        let client =
            Arc::new(TestEngineApi::with_payload(payload.clone()).with_canonical(payload));
        let mut state = state0;
        let unsafe_before = state.sync_state.unsafe_head();

        // Pretend gossip advanced the unsafe head to the derived height.
        state.sync_state = state
            .sync_state
            .apply_update(EngineSyncStateUpdate {
                unsafe_head: Some(L2BlockInfo {
                    block_info: kanvas_protocol::BlockInfo {
                        number: unsafe_before.block_info.number + 1,
                        ..unsafe_before.block_info
                    },
                    ..unsafe_before
                }),
                ..Default::default()
            })
            .unwrap();

        let task = ConsolidateTask::new(client.clone(), cfg, attrs);
        let new_safe = task.execute(&mut state).await.unwrap();

        assert_eq!(state.sync_state.safe_head(), new_safe);
        // Consolidation must not execute a payload.
        assert_eq!(client.new_payload_calls(), 0);
    }

    #[tokio::test]
    async fn test_mismatch_triggers_reorg_build() {
        let (cfg, state0, attrs, payload) = test_engine_setup();
        // The canonical unsafe block at that height differs from the attributes.
        let mut mismatched = payload.clone();
        mismatched.fee_recipient = alloy_primitives::Address::with_last_byte(0xEE);
        let client =
            Arc::new(TestEngineApi::with_payload(payload).with_canonical(mismatched));
        let mut state = state0;

        let task = ConsolidateTask::new(client.clone(), cfg, attrs);
        let new_safe = task.execute(&mut state).await.unwrap();

        // The reorg path executes the derived payload.
        assert!(client.new_payload_calls() > 0);
        assert_eq!(state.sync_state.safe_head(), new_safe);
        assert_eq!(state.sync_state.unsafe_head(), new_safe);
    }

    #[test]
    fn test_attributes_match_detects_tx_differences() {
        let (_, _, attrs, mut payload) = test_engine_setup();
        assert!(attributes_match(&attrs, &payload).is_match());
        payload.transactions.push(alloy_primitives::Bytes::from_static(&[0x02]));
        assert!(!attributes_match(&attrs, &payload).is_match());
    }
}
