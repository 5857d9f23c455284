//! The network publish capability.

use alloy_rpc_types_engine::ExecutionPayloadV1;
use async_trait::async_trait;
use std::fmt::Debug;

/// An error publishing a payload to the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// The publish failed; the proposer records it and keeps going.
    #[error("failed to publish payload: {0}")]
    PublishFailed(String),
}

/// Publishes proposer-built payloads to the gossip network.
///
/// The implementation signs the payload with the proposer key before handing
/// it to the transport; the driver only supplies the raw payload.
#[async_trait]
pub trait Network: Debug + Send + Sync {
    /// Signs and publishes a newly sealed L2 payload.
    async fn publish_l2_payload(&self, payload: ExecutionPayloadV1) -> Result<(), NetworkError>;
}

/// A [`Network`] for nodes running without a gossip transport: publishes are
/// logged and discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNetwork;

#[async_trait]
impl Network for NoopNetwork {
    async fn publish_l2_payload(&self, payload: ExecutionPayloadV1) -> Result<(), NetworkError> {
        debug!(
            target: "gossip",
            number = payload.block_number,
            hash = %payload.block_hash,
            "No gossip transport configured, dropping published payload"
        );
        Ok(())
    }
}
