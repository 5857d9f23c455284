//! A task for finalizing an L2 block.

use crate::{
    EngineApi, EngineState, EngineSyncStateUpdate, EngineTaskError, EngineTaskExt, Metrics,
    SynchronizeTask,
};
use async_trait::async_trait;
use kanvas_protocol::L2BlockInfo;
use std::sync::Arc;

/// Promotes an already-safe L2 block to finalized via a forkchoice update.
#[derive(Debug, Clone)]
pub struct FinalizeTask<C: EngineApi> {
    /// The engine client.
    client: Arc<C>,
    /// The block to finalize.
    block: L2BlockInfo,
}

impl<C: EngineApi> FinalizeTask<C> {
    /// Creates a new finalize task.
    pub const fn new(client: Arc<C>, block: L2BlockInfo) -> Self {
        Self { client, block }
    }
}

#[async_trait]
impl<C: EngineApi> EngineTaskExt for FinalizeTask<C> {
    type Output = ();

    async fn execute(&self, state: &mut EngineState) -> Result<(), EngineTaskError> {
        // Only blocks derived from L1 may finalize.
        if state.sync_state.safe_head().block_info.number < self.block.block_info.number {
            return Err(EngineTaskError::BlockNotSafe(self.block.block_info.number));
        }

        SynchronizeTask::new(
            Arc::clone(&self.client),
            EngineSyncStateUpdate { finalized_head: Some(self.block), ..Default::default() },
        )
        .execute(state)
        .await?;

        info!(
            target: "engine",
            hash = %self.block.block_info.hash,
            number = self.block.block_info.number,
            "Updated finalized head"
        );
        kanvas_macros::set!(
            counter,
            Metrics::ENGINE_FINALIZED_BLOCK,
            self.block.block_info.number
        );

        Ok(())
    }
}
