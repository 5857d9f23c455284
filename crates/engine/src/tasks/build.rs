//! A task for building a new block and importing it.

use crate::{
    EngineApi, EngineState, EngineSyncStateUpdate, EngineTaskError, EngineTaskExt, Metrics,
};
use alloy_rpc_types_engine::{ExecutionPayloadV1, PayloadId, PayloadStatusEnum};
use async_trait::async_trait;
use kanvas_genesis::RollupConfig;
use kanvas_protocol::{KanvasAttributesWithParent, L2BlockInfo};
use std::{sync::Arc, time::Instant};

/// Builds a block from payload attributes and canonicalizes it.
///
/// The full workflow is `engine_forkchoiceUpdated` with attributes to start
/// the job, `engine_getPayload` to fetch the result, `engine_newPayload` to
/// execute it, and a final forkchoice update to promote it. The proposer
/// splits the workflow across ticks via [`BuildTask::start_build`] and
/// [`BuildTask::seal`]; derivation executes it in one shot.
#[derive(Debug, Clone)]
pub struct BuildTask<C: EngineApi> {
    /// The engine client.
    client: Arc<C>,
    /// The rollup config.
    cfg: Arc<RollupConfig>,
    /// The attributes to build.
    attributes: KanvasAttributesWithParent,
    /// Whether the attributes were derived from L1 (safe) or proposed
    /// (unsafe only).
    is_attributes_derived: bool,
}

impl<C: EngineApi> BuildTask<C> {
    /// Creates a new build task.
    pub const fn new(
        client: Arc<C>,
        cfg: Arc<RollupConfig>,
        attributes: KanvasAttributesWithParent,
        is_attributes_derived: bool,
    ) -> Self {
        Self { client, cfg, attributes, is_attributes_derived }
    }

    /// Starts a build job on the engine, advertising the attributes' parent as
    /// the head so that a build below the unsafe head rewinds it.
    pub async fn start_build(
        client: &C,
        state: &EngineState,
        attributes: &KanvasAttributesWithParent,
    ) -> Result<PayloadId, EngineTaskError> {
        let forkchoice = state
            .sync_state
            .apply_update(EngineSyncStateUpdate {
                unsafe_head: Some(attributes.parent),
                ..Default::default()
            })?
            .create_forkchoice_state();

        let update =
            client.forkchoice_updated(forkchoice, Some(attributes.inner.clone())).await?;
        match update.payload_status.status {
            PayloadStatusEnum::Valid => {}
            PayloadStatusEnum::Invalid { validation_error } => {
                return Err(EngineTaskError::InvalidPayload(validation_error));
            }
            PayloadStatusEnum::Syncing => {
                warn!(target: "engine", "Cannot start build: EL is syncing");
                return Err(EngineTaskError::Api(crate::EngineApiError::Transport(
                    "EL syncing".to_string(),
                )));
            }
            status => {
                return Err(EngineTaskError::UnexpectedPayloadStatus(format!("{status:?}")));
            }
        }

        update.payload_id.ok_or(EngineTaskError::MissingPayloadId)
    }

    /// Fetches a finished build job, executes it, and promotes it to the
    /// unsafe head (and the safe head, for derived attributes).
    pub async fn seal(
        client: &C,
        cfg: &RollupConfig,
        state: &mut EngineState,
        payload_id: PayloadId,
        is_attributes_derived: bool,
    ) -> Result<(ExecutionPayloadV1, L2BlockInfo), EngineTaskError> {
        let seal_start = Instant::now();
        let payload = client.get_payload(payload_id).await?;

        let status = client.new_payload(payload.clone()).await?;
        match status.status {
            PayloadStatusEnum::Valid | PayloadStatusEnum::Syncing => {}
            PayloadStatusEnum::Invalid { validation_error } => {
                return Err(EngineTaskError::InvalidPayload(validation_error));
            }
            status => {
                return Err(EngineTaskError::UnexpectedPayloadStatus(format!("{status:?}")));
            }
        }

        // Promote the imported block with a final forkchoice update. The local
        // state only changes once the engine accepts it.
        let new_ref = L2BlockInfo::from_payload_and_genesis(&payload, &cfg.genesis)?;
        let new_sync_state = state.sync_state.apply_update(EngineSyncStateUpdate {
            unsafe_head: Some(new_ref),
            safe_head: is_attributes_derived.then_some(new_ref),
            ..Default::default()
        })?;
        let response =
            client.forkchoice_updated(new_sync_state.create_forkchoice_state(), None).await?;
        match response.payload_status.status {
            PayloadStatusEnum::Valid | PayloadStatusEnum::Syncing => {}
            PayloadStatusEnum::Invalid { validation_error } => {
                return Err(EngineTaskError::InvalidPayload(validation_error));
            }
            status => {
                return Err(EngineTaskError::UnexpectedPayloadStatus(format!("{status:?}")));
            }
        }
        state.sync_state = new_sync_state;

        info!(
            target: "engine",
            hash = %new_ref.block_info.hash,
            number = new_ref.block_info.number,
            seal_duration = ?seal_start.elapsed(),
            "Imported new {} block",
            if is_attributes_derived { "safe" } else { "unsafe" },
        );
        kanvas_macros::record!(Metrics::ENGINE_SEAL_DURATION, seal_start);

        Ok((payload, new_ref))
    }
}

#[async_trait]
impl<C: EngineApi> EngineTaskExt for BuildTask<C> {
    type Output = L2BlockInfo;

    async fn execute(&self, state: &mut EngineState) -> Result<L2BlockInfo, EngineTaskError> {
        let payload_id = Self::start_build(&self.client, state, &self.attributes).await?;
        let (_, new_ref) =
            Self::seal(&*self.client, &self.cfg, state, payload_id, self.is_attributes_derived)
                .await?;
        Ok(new_ref)
    }
}
