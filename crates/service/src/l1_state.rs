//! The L1 state tracker.

use kanvas_protocol::BlockInfo;

/// Tracks the latest head, safe, and finalized L1 blocks as reported by the
/// L1 watcher.
///
/// The head may move backwards across reorgs; the derivation pipeline reacts
/// to that. The finalized block, however, may only advance.
#[derive(Debug, Default, Clone, Copy)]
pub struct L1State {
    /// The latest L1 head.
    head: Option<BlockInfo>,
    /// The latest L1 safe block.
    safe: Option<BlockInfo>,
    /// The latest finalized L1 block.
    finalized: Option<BlockInfo>,
}

impl L1State {
    /// Returns the current L1 head.
    pub const fn l1_head(&self) -> Option<BlockInfo> {
        self.head
    }

    /// Returns the current L1 safe block.
    pub const fn l1_safe(&self) -> Option<BlockInfo> {
        self.safe
    }

    /// Returns the current finalized L1 block.
    pub const fn l1_finalized(&self) -> Option<BlockInfo> {
        self.finalized
    }

    /// Records a new L1 head, returning the previous one.
    pub fn handle_new_head_block(&mut self, head: BlockInfo) -> Option<BlockInfo> {
        self.head.replace(head)
    }

    /// Records a new L1 safe block.
    pub fn handle_new_safe_block(&mut self, safe: BlockInfo) {
        self.safe = Some(safe);
    }

    /// Records a new finalized L1 block. Finality cannot rewind: regressions
    /// are rejected and logged.
    pub fn handle_new_finalized_block(&mut self, finalized: BlockInfo) -> bool {
        if let Some(current) = self.finalized {
            if finalized.number < current.number {
                warn!(
                    target: "l1_state",
                    current = current.number,
                    got = finalized.number,
                    "Ignoring finalized L1 block behind the current one"
                );
                return false;
            }
        }
        self.finalized = Some(finalized);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    fn block(number: u64) -> BlockInfo {
        BlockInfo { number, hash: B256::with_last_byte(number as u8), ..Default::default() }
    }

    #[test]
    fn test_head_may_rewind() {
        let mut state = L1State::default();
        state.handle_new_head_block(block(10));
        let prev = state.handle_new_head_block(block(8));
        assert_eq!(prev, Some(block(10)));
        assert_eq!(state.l1_head(), Some(block(8)));
    }

    #[test]
    fn test_finalized_only_advances() {
        let mut state = L1State::default();
        assert!(state.handle_new_finalized_block(block(5)));
        assert!(!state.handle_new_finalized_block(block(3)));
        assert_eq!(state.l1_finalized(), Some(block(5)));
        assert!(state.handle_new_finalized_block(block(5)));
        assert!(state.handle_new_finalized_block(block(9)));
        assert_eq!(state.l1_finalized(), Some(block(9)));
    }
}
