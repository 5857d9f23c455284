//! Addresses of the Kanvas predeploy contracts touched by the rollup node.

use alloy_primitives::{address, Address};

/// Container for the predeploy contract addresses.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Predeploys;

impl Predeploys {
    /// The `L2ToL1MessagePasser` contract, which stores commitments to withdrawal
    /// transactions. Its storage root is folded into every L2 output root.
    pub const L2_TO_L1_MESSAGE_PASSER: Address =
        address!("0x4200000000000000000000000000000000000003");

    /// The `L1Block` contract, updated by the L1-info deposit at the start of every
    /// L2 block.
    pub const L1_BLOCK_INFO: Address = address!("0x4200000000000000000000000000000000000002");

    /// The proposer fee vault, used as the suggested fee recipient of derived blocks.
    pub const PROPOSER_FEE_VAULT: Address = address!("0x4200000000000000000000000000000000000006");
}
