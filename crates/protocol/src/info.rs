//! The L1-info system transaction.

use crate::{BlockInfo, L1InfoDepositSource, TxDeposit};
use alloy_primitives::{address, Address, Bytes, TxKind, B256, U256};
use kanvas_genesis::{Predeploys, SystemConfig};

/// The sender of every L1-info deposit.
pub const DEPOSITOR_ACCOUNT: Address = address!("0xDeaDDEaDDeAdDeAdDEAdDEaddeAddEAdDEAd0001");

/// The gas allotted to the L1-info system transaction.
pub const REGOLITH_SYSTEM_TX_GAS: u64 = 1_000_000;

/// `setL1BlockValues(uint64,uint64,uint256,bytes32,uint64,bytes32,bytes32,bytes32)`.
const SET_L1_BLOCK_VALUES_SELECTOR: [u8; 4] = [0x01, 0x5d, 0x8e, 0xb9];

/// Selector plus eight abi-encoded words.
const L1_INFO_LEN: usize = 4 + 32 * 8;

/// An error decoding an [`L1BlockInfoTx`] from calldata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum L1InfoDecodingError {
    /// The calldata length is wrong.
    #[error("unexpected L1-info calldata length: {0}")]
    UnexpectedLength(usize),
    /// The selector does not match `setL1BlockValues`.
    #[error("invalid L1-info selector")]
    InvalidSelector,
}

/// The contents of the L1-info transaction: the first transaction of every L2
/// block, recording the block's L1 origin on L2.
///
/// Encoded as `setL1BlockValues` calldata: the 4-byte selector followed by
/// `number(u64) || time(u64) || base_fee(u256) || hash(b256) ||
/// sequence_number(u64) || batcher_hash(b256) || overhead(u256) ||
/// scalar(u256)`, each padded to a 32-byte word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct L1BlockInfoTx {
    /// The L1 origin block number.
    pub number: u64,
    /// The L1 origin block timestamp.
    pub time: u64,
    /// The L1 origin base fee.
    pub base_fee: U256,
    /// The L1 origin block hash.
    pub block_hash: B256,
    /// The number of L2 blocks since the origin last changed.
    pub sequence_number: u64,
    /// The authorized batcher address, left-padded into a word.
    pub batcher_addr: Address,
    /// The L1 fee overhead.
    pub l1_fee_overhead: U256,
    /// The L1 fee scalar.
    pub l1_fee_scalar: U256,
}

impl L1BlockInfoTx {
    /// Constructs the L1-info for the L2 block at `sequence_number` within the
    /// epoch of `l1_origin`.
    pub fn new(
        system_config: &SystemConfig,
        l1_origin: &BlockInfo,
        l1_base_fee: U256,
        sequence_number: u64,
    ) -> Self {
        Self {
            number: l1_origin.number,
            time: l1_origin.timestamp,
            base_fee: l1_base_fee,
            block_hash: l1_origin.hash,
            sequence_number,
            batcher_addr: system_config.batcher_addr,
            l1_fee_overhead: system_config.overhead,
            l1_fee_scalar: system_config.scalar,
        }
    }

    /// Encodes the `setL1BlockValues` calldata.
    pub fn encode_calldata(&self) -> Bytes {
        let mut out = Vec::with_capacity(L1_INFO_LEN);
        out.extend_from_slice(&SET_L1_BLOCK_VALUES_SELECTOR);
        out.extend_from_slice(&U256::from(self.number).to_be_bytes::<32>());
        out.extend_from_slice(&U256::from(self.time).to_be_bytes::<32>());
        out.extend_from_slice(&self.base_fee.to_be_bytes::<32>());
        out.extend_from_slice(self.block_hash.as_slice());
        out.extend_from_slice(&U256::from(self.sequence_number).to_be_bytes::<32>());
        out.extend_from_slice(self.batcher_addr.into_word().as_slice());
        out.extend_from_slice(&self.l1_fee_overhead.to_be_bytes::<32>());
        out.extend_from_slice(&self.l1_fee_scalar.to_be_bytes::<32>());
        out.into()
    }

    /// Decodes `setL1BlockValues` calldata.
    pub fn decode_calldata(data: &[u8]) -> Result<Self, L1InfoDecodingError> {
        if data.len() != L1_INFO_LEN {
            return Err(L1InfoDecodingError::UnexpectedLength(data.len()));
        }
        if data[..4] != SET_L1_BLOCK_VALUES_SELECTOR {
            return Err(L1InfoDecodingError::InvalidSelector);
        }
        let word = |i: usize| &data[4 + 32 * i..4 + 32 * (i + 1)];
        let u64_word = |i: usize| {
            u64::from_be_bytes(word(i)[24..32].try_into().expect("8 byte slice"))
        };
        Ok(Self {
            number: u64_word(0),
            time: u64_word(1),
            base_fee: U256::from_be_slice(word(2)),
            block_hash: B256::from_slice(word(3)),
            sequence_number: u64_word(4),
            batcher_addr: Address::from_slice(&word(5)[12..]),
            l1_fee_overhead: U256::from_be_slice(word(6)),
            l1_fee_scalar: U256::from_be_slice(word(7)),
        })
    }

    /// Builds the system deposit transaction carrying this L1-info.
    pub fn to_deposit_tx(&self) -> TxDeposit {
        let source = L1InfoDepositSource::new(self.block_hash, self.sequence_number);
        TxDeposit {
            source_hash: source.source_hash(),
            from: DEPOSITOR_ACCOUNT,
            to: TxKind::Call(Predeploys::L1_BLOCK_INFO),
            mint: 0,
            value: U256::ZERO,
            gas_limit: REGOLITH_SYSTEM_TX_GAS,
            is_system_transaction: true,
            input: self.encode_calldata(),
        }
    }
}
