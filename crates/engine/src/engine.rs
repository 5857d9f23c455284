//! The engine controller facade.

use crate::{
    BuildTask, ConsolidateTask, EngineApi, EngineState, EngineSyncState, EngineSyncStateUpdate,
    EngineTaskError, EngineTaskExt, FinalizeTask, InsertTask, Metrics, SynchronizeTask,
};
use alloy_rpc_types_engine::{ExecutionPayloadV1, PayloadId};
use kanvas_genesis::RollupConfig;
use kanvas_protocol::{KanvasAttributesWithParent, L2BlockInfo, PayloadEnvelope};
use std::sync::Arc;

/// The engine controller: the single owner of the local forkchoice state.
///
/// All mutations run as [`EngineTaskExt`] tasks executed one at a time by the
/// driver, making each an atomic operation over the state.
#[derive(Debug)]
pub struct Engine<C: EngineApi> {
    /// The engine client.
    client: Arc<C>,
    /// The rollup config.
    cfg: Arc<RollupConfig>,
    /// The local engine state.
    state: EngineState,
}

impl<C: EngineApi> Engine<C> {
    /// Creates a new engine controller with a default (uninitialized) state.
    pub fn new(client: Arc<C>, cfg: Arc<RollupConfig>) -> Self {
        Self { client, cfg, state: EngineState::default() }
    }

    /// Returns the current engine state.
    pub const fn state(&self) -> &EngineState {
        &self.state
    }

    /// Returns the current sync state.
    pub const fn sync_state(&self) -> EngineSyncState {
        self.state.sync_state
    }

    /// Applies derivation-produced attributes: consolidates against the
    /// existing unsafe chain when it is ahead of the safe head, builds the
    /// block otherwise. Returns the new safe head.
    pub async fn process_derived_attributes(
        &mut self,
        attributes: KanvasAttributesWithParent,
    ) -> Result<L2BlockInfo, EngineTaskError> {
        if self.state.needs_consolidation() {
            ConsolidateTask::new(Arc::clone(&self.client), Arc::clone(&self.cfg), attributes)
                .execute(&mut self.state)
                .await
        } else {
            BuildTask::new(Arc::clone(&self.client), Arc::clone(&self.cfg), attributes, true)
                .execute(&mut self.state)
                .await
        }
    }

    /// Inserts a gossiped unsafe payload whose parent is the unsafe head.
    pub async fn insert_unsafe_payload(
        &mut self,
        envelope: PayloadEnvelope,
    ) -> Result<L2BlockInfo, EngineTaskError> {
        InsertTask::new(Arc::clone(&self.client), Arc::clone(&self.cfg), envelope)
            .execute(&mut self.state)
            .await
    }

    /// Finalizes an already-safe L2 block.
    pub async fn finalize(&mut self, block: L2BlockInfo) -> Result<(), EngineTaskError> {
        FinalizeTask::new(Arc::clone(&self.client), block).execute(&mut self.state).await
    }

    /// Starts a proposer build job on top of the attributes' parent.
    pub async fn start_build(
        &mut self,
        attributes: &KanvasAttributesWithParent,
    ) -> Result<PayloadId, EngineTaskError> {
        BuildTask::start_build(&*self.client, &self.state, attributes).await
    }

    /// Seals a proposer build job, promoting the block to the unsafe head.
    pub async fn seal_build(
        &mut self,
        payload_id: PayloadId,
    ) -> Result<(ExecutionPayloadV1, L2BlockInfo), EngineTaskError> {
        BuildTask::seal(&*self.client, &self.cfg, &mut self.state, payload_id, false).await
    }

    /// Resets the engine to the given forkchoice, advertising it to the
    /// execution layer.
    pub async fn reset(
        &mut self,
        unsafe_head: L2BlockInfo,
        safe_head: L2BlockInfo,
        finalized_head: L2BlockInfo,
    ) -> Result<(), EngineTaskError> {
        SynchronizeTask::new(
            Arc::clone(&self.client),
            EngineSyncStateUpdate {
                unsafe_head: Some(unsafe_head),
                safe_head: Some(safe_head),
                finalized_head: Some(finalized_head),
            },
        )
        .execute(&mut self.state)
        .await?;
        info!(
            target: "engine",
            unsafe_head = unsafe_head.block_info.number,
            safe_head = safe_head.block_info.number,
            finalized_head = finalized_head.block_info.number,
            "Reset engine forkchoice"
        );
        kanvas_macros::inc!(counter, Metrics::ENGINE_RESET_COUNT);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_engine_setup, TestEngineApi};
    use kanvas_protocol::BlockInfo;

    #[tokio::test]
    async fn test_reset_sets_all_heads() {
        let (cfg, _, _, payload) = test_engine_setup();
        let client = Arc::new(TestEngineApi::with_payload(payload));
        let mut engine = Engine::new(client, cfg);

        let head = |n: u64| L2BlockInfo {
            block_info: BlockInfo { number: n, ..Default::default() },
            ..Default::default()
        };
        engine.reset(head(10), head(8), head(5)).await.unwrap();
        assert_eq!(engine.sync_state().unsafe_head().block_info.number, 10);
        assert_eq!(engine.sync_state().safe_head().block_info.number, 8);
        assert_eq!(engine.sync_state().finalized_head().block_info.number, 5);
    }

    #[tokio::test]
    async fn test_derived_attributes_build_when_heads_equal() {
        let (cfg, state0, attrs, payload) = test_engine_setup();
        let client = Arc::new(TestEngineApi::with_payload(payload));
        let mut engine = Engine::new(client, cfg);
        engine.state = state0;
        assert!(!engine.state().needs_consolidation());

        let new_safe = engine.process_derived_attributes(attrs).await.unwrap();
        assert_eq!(engine.sync_state().safe_head(), new_safe);
        assert_eq!(engine.sync_state().unsafe_head(), new_safe);
    }
}
