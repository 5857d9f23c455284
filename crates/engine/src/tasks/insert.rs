//! A task to insert a gossiped unsafe payload into the execution engine.

use crate::{
    EngineApi, EngineState, EngineSyncStateUpdate, EngineTaskError, EngineTaskExt, Metrics,
    SynchronizeTask,
};
use alloy_rpc_types_engine::PayloadStatusEnum;
use async_trait::async_trait;
use kanvas_genesis::RollupConfig;
use kanvas_protocol::{L2BlockInfo, PayloadEnvelope};
use std::{sync::Arc, time::Instant};

/// Inserts an unsafe payload received over gossip.
///
/// The payload must extend the current unsafe head; gapped or stale payloads
/// are the caller's problem (the unsafe payload queue holds them back).
#[derive(Debug, Clone)]
pub struct InsertTask<C: EngineApi> {
    /// The engine client.
    client: Arc<C>,
    /// The rollup config.
    cfg: Arc<RollupConfig>,
    /// The payload envelope to insert.
    envelope: PayloadEnvelope,
}

impl<C: EngineApi> InsertTask<C> {
    /// Creates a new insert task.
    pub const fn new(client: Arc<C>, cfg: Arc<RollupConfig>, envelope: PayloadEnvelope) -> Self {
        Self { client, cfg, envelope }
    }
}

#[async_trait]
impl<C: EngineApi> EngineTaskExt for InsertTask<C> {
    type Output = L2BlockInfo;

    async fn execute(&self, state: &mut EngineState) -> Result<L2BlockInfo, EngineTaskError> {
        let time_start = Instant::now();
        let payload = &self.envelope.payload;

        let unsafe_head = state.sync_state.unsafe_head();
        if payload.parent_hash != unsafe_head.block_info.hash {
            return Err(EngineTaskError::ParentMismatch {
                expected: unsafe_head.block_info.hash,
                got: payload.parent_hash,
            });
        }

        let status = self.client.new_payload(payload.clone()).await?;
        match status.status {
            PayloadStatusEnum::Valid | PayloadStatusEnum::Syncing => {}
            PayloadStatusEnum::Invalid { validation_error } => {
                return Err(EngineTaskError::InvalidPayload(validation_error));
            }
            status => {
                return Err(EngineTaskError::UnexpectedPayloadStatus(format!("{status:?}")));
            }
        }

        let new_ref = L2BlockInfo::from_payload_and_genesis(payload, &self.cfg.genesis)?;
        SynchronizeTask::new(
            Arc::clone(&self.client),
            EngineSyncStateUpdate { unsafe_head: Some(new_ref), ..Default::default() },
        )
        .execute(state)
        .await?;

        info!(
            target: "engine",
            hash = %new_ref.block_info.hash,
            number = new_ref.block_info.number,
            duration = ?time_start.elapsed(),
            "Inserted new unsafe block"
        );
        kanvas_macros::inc!(counter, Metrics::ENGINE_UNSAFE_INSERTS);

        Ok(new_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_engine_setup, TestEngineApi};
    use alloy_primitives::{Signature, B256};

    #[tokio::test]
    async fn test_insert_advances_unsafe_head() {
        let (cfg, state0, _, payload) = test_engine_setup();
        let client = Arc::new(TestEngineApi::with_payload(payload.clone()));
        let mut state = state0;
        let envelope = PayloadEnvelope { signature: Signature::test_signature(), payload };

        let new_ref =
            InsertTask::new(client, cfg, envelope).execute(&mut state).await.unwrap();
        assert_eq!(state.sync_state.unsafe_head(), new_ref);
    }

    #[tokio::test]
    async fn test_insert_rejects_parent_mismatch() {
        let (cfg, state0, _, mut payload) = test_engine_setup();
        payload.parent_hash = B256::with_last_byte(0xDD);
        let client = Arc::new(TestEngineApi::with_payload(payload.clone()));
        let mut state = state0;
        let envelope = PayloadEnvelope { signature: Signature::test_signature(), payload };

        let err =
            InsertTask::new(client, cfg, envelope).execute(&mut state).await.unwrap_err();
        assert!(matches!(err, EngineTaskError::ParentMismatch { .. }));
    }
}
