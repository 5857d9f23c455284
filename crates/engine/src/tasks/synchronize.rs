//! A task to synchronize the engine's forkchoice with the local state.

use crate::{
    EngineApi, EngineState, EngineSyncStateUpdate, EngineTaskError, EngineTaskExt, Metrics,
};
use alloy_rpc_types_engine::PayloadStatusEnum;
use async_trait::async_trait;
use std::sync::Arc;

/// Applies a sync-state update and advertises the resulting forkchoice to the
/// engine. The local state only changes once the engine accepts the update.
#[derive(Debug, Clone)]
pub struct SynchronizeTask<C: EngineApi> {
    /// The engine client.
    client: Arc<C>,
    /// The state update to apply.
    update: EngineSyncStateUpdate,
}

impl<C: EngineApi> SynchronizeTask<C> {
    /// Creates a new synchronize task.
    pub const fn new(client: Arc<C>, update: EngineSyncStateUpdate) -> Self {
        Self { client, update }
    }
}

#[async_trait]
impl<C: EngineApi> EngineTaskExt for SynchronizeTask<C> {
    type Output = ();

    async fn execute(&self, state: &mut EngineState) -> Result<(), EngineTaskError> {
        let new_sync_state = state.sync_state.apply_update(self.update)?;
        let forkchoice = new_sync_state.create_forkchoice_state();

        let response = self.client.forkchoice_updated(forkchoice, None).await?;
        match response.payload_status.status {
            PayloadStatusEnum::Valid => {
                state.el_sync_finished = true;
            }
            PayloadStatusEnum::Syncing => {
                debug!(target: "engine", "Forkchoice accepted while EL is syncing");
            }
            PayloadStatusEnum::Invalid { validation_error } => {
                return Err(EngineTaskError::InvalidPayload(validation_error));
            }
            status => {
                return Err(EngineTaskError::UnexpectedPayloadStatus(format!("{status:?}")));
            }
        }

        state.sync_state = new_sync_state;
        kanvas_macros::inc!(counter, Metrics::ENGINE_FORKCHOICE_UPDATES);
        Ok(())
    }
}
