//! The engine controller's local forkchoice state.

use crate::Metrics;
use alloy_rpc_types_engine::ForkchoiceState;
use kanvas_protocol::L2BlockInfo;
use thiserror::Error;

/// An invalid [`EngineSyncState`] update.
///
/// The heads must maintain `finalized <= safe <= unsafe` by block number; any
/// update that would violate the ordering is rejected wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid sync state: expected finalized ({finalized}) <= safe ({safe}) <= unsafe ({unsafe_head})")]
pub struct InvalidEngineSyncStateError {
    /// The state before the rejected update.
    pub previous_state: EngineSyncState,
    /// The rejected update.
    pub update: EngineSyncStateUpdate,
    /// The resulting finalized head number.
    pub finalized: u64,
    /// The resulting safe head number.
    pub safe: u64,
    /// The resulting unsafe head number.
    pub unsafe_head: u64,
}

/// The three L2 heads tracked by the engine controller.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct EngineSyncState {
    /// The latest L2 block, possibly only seen over gossip.
    unsafe_head: L2BlockInfo,
    /// The latest L2 block derived from L1 data.
    safe_head: L2BlockInfo,
    /// The latest L2 block derived from finalized L1 data.
    finalized_head: L2BlockInfo,
}

impl EngineSyncState {
    /// Returns the current unsafe head.
    pub const fn unsafe_head(&self) -> L2BlockInfo {
        self.unsafe_head
    }

    /// Returns the current safe head.
    pub const fn safe_head(&self) -> L2BlockInfo {
        self.safe_head
    }

    /// Returns the current finalized head.
    pub const fn finalized_head(&self) -> L2BlockInfo {
        self.finalized_head
    }

    /// Builds the [`ForkchoiceState`] advertised to the engine.
    pub const fn create_forkchoice_state(&self) -> ForkchoiceState {
        ForkchoiceState {
            head_block_hash: self.unsafe_head.block_info.hash,
            safe_block_hash: self.safe_head.block_info.hash,
            finalized_block_hash: self.finalized_head.block_info.hash,
        }
    }

    /// Applies the update, keeping current values where the update is `None`.
    ///
    /// # Errors
    ///
    /// Rejects updates that would violate `finalized <= safe <= unsafe`.
    pub fn apply_update(
        self,
        update: EngineSyncStateUpdate,
    ) -> Result<Self, Box<InvalidEngineSyncStateError>> {
        let new_state = Self {
            unsafe_head: update.unsafe_head.unwrap_or(self.unsafe_head),
            safe_head: update.safe_head.unwrap_or(self.safe_head),
            finalized_head: update.finalized_head.unwrap_or(self.finalized_head),
        };

        let finalized = new_state.finalized_head.block_info.number;
        let safe = new_state.safe_head.block_info.number;
        let unsafe_head = new_state.unsafe_head.block_info.number;

        if !(finalized <= safe && safe <= unsafe_head) {
            return Err(Box::new(InvalidEngineSyncStateError {
                previous_state: self,
                update,
                finalized,
                safe,
                unsafe_head,
            }));
        }

        if update.unsafe_head.is_some() {
            Self::update_block_label_metric(Metrics::UNSAFE_BLOCK_LABEL, unsafe_head);
        }
        if update.safe_head.is_some() {
            Self::update_block_label_metric(Metrics::SAFE_BLOCK_LABEL, safe);
        }
        if update.finalized_head.is_some() {
            Self::update_block_label_metric(Metrics::FINALIZED_BLOCK_LABEL, finalized);
        }

        Ok(new_state)
    }

    #[inline]
    #[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
    fn update_block_label_metric(label: &'static str, number: u64) {
        kanvas_macros::set!(gauge, Metrics::BLOCK_LABELS, "label", label, number as f64);
    }
}

/// A partial update to the [`EngineSyncState`].
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct EngineSyncStateUpdate {
    /// The new unsafe head, if any.
    pub unsafe_head: Option<L2BlockInfo>,
    /// The new safe head, if any.
    pub safe_head: Option<L2BlockInfo>,
    /// The new finalized head, if any.
    pub finalized_head: Option<L2BlockInfo>,
}

/// The chain state viewed by the engine controller.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct EngineState {
    /// The sync state of the engine.
    pub sync_state: EngineSyncState,
    /// Whether the execution layer has finished its own sync.
    pub el_sync_finished: bool,
}

impl EngineState {
    /// Returns whether derived attributes must be consolidated against an
    /// existing unsafe block instead of building a new one.
    ///
    /// Consolidation applies whenever the unsafe head is ahead of the safe
    /// head; when the two are equal the derived block is simply built.
    pub fn needs_consolidation(&self) -> bool {
        self.sync_state.safe_head() != self.sync_state.unsafe_head()
    }
}
