//! Sync status types.

use crate::{BlockInfo, L2BlockInfo};

/// A snapshot of the node's view of both chains, served by `kanvas_syncStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// The L1 block the derivation pipeline is currently reading from.
    pub current_l1: BlockInfo,
    /// The latest L1 head.
    pub head_l1: BlockInfo,
    /// The L1 safe head.
    pub safe_l1: BlockInfo,
    /// The finalized L1 block.
    pub finalized_l1: BlockInfo,
    /// The L2 unsafe head.
    pub unsafe_l2: L2BlockInfo,
    /// The L2 safe head, derived from L1 data.
    pub safe_l2: L2BlockInfo,
    /// The finalized L2 block, derived from finalized L1 data.
    pub finalized_l2: L2BlockInfo,
}
