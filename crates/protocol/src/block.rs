//! Block reference types.

use crate::{L1BlockInfoTx, L1InfoDecodingError, TxDeposit, TxDepositDecodingError};
use alloy_eips::eip1898::BlockNumHash;
use alloy_primitives::B256;
use alloy_rpc_types_engine::ExecutionPayloadV1;
use kanvas_genesis::ChainGenesis;

/// A reference to an L1 block.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    /// The block hash.
    pub hash: B256,
    /// The block number.
    #[serde(with = "alloy_serde::quantity")]
    pub number: u64,
    /// The parent block hash.
    pub parent_hash: B256,
    /// The block timestamp.
    #[serde(with = "alloy_serde::quantity")]
    pub timestamp: u64,
}

impl BlockInfo {
    /// Instantiates a new [`BlockInfo`].
    pub const fn new(hash: B256, number: u64, parent_hash: B256, timestamp: u64) -> Self {
        Self { hash, number, parent_hash, timestamp }
    }

    /// Returns the block number and hash pair.
    pub const fn id(&self) -> BlockNumHash {
        BlockNumHash { hash: self.hash, number: self.number }
    }

    /// Returns whether this block is the parent of `child`.
    pub fn is_parent_of(&self, child: &Self) -> bool {
        self.hash == child.parent_hash && self.number + 1 == child.number
    }
}

impl core::fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.number, self.hash)
    }
}

/// A reference to an L2 block, carrying its L1 origin and the count of L2 blocks
/// since the origin last changed.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L2BlockInfo {
    /// The base block reference.
    #[serde(flatten)]
    pub block_info: BlockInfo,
    /// The L1 origin of this L2 block.
    pub l1_origin: BlockNumHash,
    /// The number of L2 blocks since the L1 origin last changed. Zero for the
    /// first block of an epoch.
    #[serde(with = "alloy_serde::quantity")]
    pub seq_num: u64,
}

/// An error recovering an [`L2BlockInfo`] from an execution payload.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FromPayloadError {
    /// The genesis block hash does not match the configured genesis.
    #[error("invalid genesis hash: {0}")]
    InvalidGenesisHash(B256),
    /// The payload has no transactions, so the L1-info deposit is missing.
    #[error("L2 block {0} is missing the L1-info deposit transaction")]
    MissingL1InfoDeposit(B256),
    /// The first transaction of the payload is not a deposit.
    #[error("first payload transaction has type {0}, expected a deposit")]
    FirstTxNonDeposit(u8),
    /// The first transaction could not be decoded as a deposit.
    #[error("failed to decode deposit transaction: {0}")]
    TxDepositDecode(#[from] TxDepositDecodingError),
    /// The L1-info calldata could not be decoded.
    #[error("failed to decode L1-info transaction: {0}")]
    L1InfoDecode(#[from] L1InfoDecodingError),
}

impl L2BlockInfo {
    /// Instantiates a new [`L2BlockInfo`].
    pub const fn new(block_info: BlockInfo, l1_origin: BlockNumHash, seq_num: u64) -> Self {
        Self { block_info, l1_origin, seq_num }
    }

    /// Returns the L2 block hash.
    pub const fn hash(&self) -> B256 {
        self.block_info.hash
    }

    /// Returns the L2 block number.
    pub const fn number(&self) -> u64 {
        self.block_info.number
    }

    /// Recovers an [`L2BlockInfo`] from an execution payload, reading the L1
    /// origin and sequence number out of the leading L1-info deposit.
    pub fn from_payload_and_genesis(
        payload: &ExecutionPayloadV1,
        genesis: &ChainGenesis,
    ) -> Result<Self, FromPayloadError> {
        let block_info = BlockInfo {
            hash: payload.block_hash,
            number: payload.block_number,
            parent_hash: payload.parent_hash,
            timestamp: payload.timestamp,
        };

        let (l1_origin, seq_num) = if block_info.number == genesis.l2.number {
            if block_info.hash != genesis.l2.hash {
                return Err(FromPayloadError::InvalidGenesisHash(block_info.hash));
            }
            (genesis.l1, 0)
        } else {
            let first_tx = payload
                .transactions
                .first()
                .ok_or(FromPayloadError::MissingL1InfoDeposit(block_info.hash))?;
            let deposit = TxDeposit::decode_2718(first_tx.as_ref())?;
            let info = L1BlockInfoTx::decode_calldata(deposit.input.as_ref())?;
            (BlockNumHash { number: info.number, hash: info.block_hash }, info.sequence_number)
        };

        Ok(Self { block_info, l1_origin, seq_num })
    }
}

impl core::fmt::Display for L2BlockInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}:{} (origin {}:{})",
            self.block_info.number, self.block_info.hash, self.l1_origin.number, self.l1_origin.hash
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn test_block_info_id() {
        let info = BlockInfo::new(
            b256!("f2e17f6e6e2e9b56b7a7bd47cb8cb9b0ed20d8b563964c4a632bd0e5bbf4bb10"),
            7,
            B256::ZERO,
            1700000000,
        );
        assert_eq!(info.id().number, 7);
        assert_eq!(info.id().hash, info.hash);
    }

    #[test]
    fn test_is_parent_of() {
        let parent = BlockInfo::new(B256::with_last_byte(1), 1, B256::ZERO, 0);
        let child = BlockInfo::new(B256::with_last_byte(2), 2, B256::with_last_byte(1), 2);
        assert!(parent.is_parent_of(&child));
        assert!(!child.is_parent_of(&parent));
    }

    #[test]
    fn test_l2_block_info_serde_camel_case() {
        let info = L2BlockInfo::new(
            BlockInfo::new(B256::with_last_byte(9), 9, B256::with_last_byte(8), 18),
            BlockNumHash { number: 4, hash: B256::with_last_byte(4) },
            1,
        );
        let raw = serde_json::to_value(&info).unwrap();
        assert!(raw.get("parentHash").is_some());
        assert!(raw.get("l1Origin").is_some());
        assert!(raw.get("seqNum").is_some());
        let decoded: L2BlockInfo = serde_json::from_value(raw).unwrap();
        assert_eq!(info, decoded);
    }
}
