//! Deposit transaction derivation from L1 logs.

use crate::TxDeposit;
use alloy_consensus::Receipt;
use alloy_primitives::{b256, keccak256, Address, Bytes, Log, TxKind, B256, U256};

/// The deposit event ABI signature.
pub const DEPOSIT_EVENT_ABI: &str = "TransactionDeposited(address,address,uint256,bytes)";

/// `keccak256(DEPOSIT_EVENT_ABI)`.
pub const DEPOSIT_EVENT_ABI_HASH: B256 =
    b256!("b3813568d9991fc951961fcb4c784893574240a28925604d09fc577c55bb7c32");

/// The only deposit event version understood by this node.
pub const DEPOSIT_EVENT_VERSION_0: B256 = B256::ZERO;

/// An error deriving a deposit transaction from a log.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DepositError {
    /// Unexpected number of topics on the deposit event.
    #[error("unexpected number of deposit event topics: {0}")]
    UnexpectedTopicsLen(usize),
    /// The first topic is not the deposit event selector.
    #[error("invalid deposit event selector: {0}, expected {DEPOSIT_EVENT_ABI_HASH}")]
    InvalidSelector(B256),
    /// The log data is too short to hold the opaque-data header.
    #[error("incomplete opaque data header, log data length: {0}")]
    IncompleteOpaqueData(usize),
    /// The log data is not 32-byte aligned.
    #[error("unaligned log data, expected a multiple of 32 bytes, got: {0}")]
    UnalignedData(usize),
    /// The abi offset of the opaque data is not 32.
    #[error("invalid opaque data content offset: {0}")]
    InvalidOpaqueDataOffset(u64),
    /// The declared opaque data length overflows the log data.
    #[error("opaque data length {1} exceeds the log data length {0}")]
    OpaqueDataOverflow(usize, usize),
    /// An unknown deposit event version.
    #[error("invalid deposit version: {0}")]
    InvalidVersion(B256),
    /// The opaque data is too short to hold the packed fields.
    #[error("unexpected opaque data length: {0}")]
    UnexpectedOpaqueDataLen(usize),
}

/// The source of a user deposit, hashed into the deposit's `source_hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserDepositSource {
    /// The L1 block the deposit event was emitted in.
    pub l1_block_hash: B256,
    /// The index of the deposit log within the block.
    pub log_index: u64,
}

const USER_DEPOSIT_SOURCE_DOMAIN: u64 = 0;
const L1_INFO_DEPOSIT_SOURCE_DOMAIN: u64 = 1;

fn domain_hash(domain: u64, inner: B256) -> B256 {
    let mut input = [0u8; 64];
    input[24..32].copy_from_slice(&domain.to_be_bytes());
    input[32..].copy_from_slice(inner.as_slice());
    keccak256(input)
}

impl UserDepositSource {
    /// Creates a new [`UserDepositSource`].
    pub const fn new(l1_block_hash: B256, log_index: u64) -> Self {
        Self { l1_block_hash, log_index }
    }

    /// Returns the deposit source hash.
    pub fn source_hash(&self) -> B256 {
        let mut input = [0u8; 64];
        input[..32].copy_from_slice(self.l1_block_hash.as_slice());
        input[56..].copy_from_slice(&self.log_index.to_be_bytes());
        domain_hash(USER_DEPOSIT_SOURCE_DOMAIN, keccak256(input))
    }
}

/// The source of an L1-info system deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct L1InfoDepositSource {
    /// The L1 origin block hash.
    pub l1_block_hash: B256,
    /// The sequence number of the L2 block within its epoch.
    pub seq_number: u64,
}

impl L1InfoDepositSource {
    /// Creates a new [`L1InfoDepositSource`].
    pub const fn new(l1_block_hash: B256, seq_number: u64) -> Self {
        Self { l1_block_hash, seq_number }
    }

    /// Returns the deposit source hash.
    pub fn source_hash(&self) -> B256 {
        let mut input = [0u8; 64];
        input[..32].copy_from_slice(self.l1_block_hash.as_slice());
        input[56..].copy_from_slice(&self.seq_number.to_be_bytes());
        domain_hash(L1_INFO_DEPOSIT_SOURCE_DOMAIN, keccak256(input))
    }
}

/// Derives a deposit transaction from a `TransactionDeposited` log.
///
/// The event is emitted as:
/// ```solidity
/// event TransactionDeposited(
///     address indexed from,
///     address indexed to,
///     uint256 indexed version,
///     bytes opaqueData
/// );
/// ```
/// where `opaqueData` packs `mint(u256) || value(u256) || gas_limit(u64) ||
/// is_creation(u8) || data`.
pub fn decode_deposit(block_hash: B256, index: usize, log: &Log) -> Result<Bytes, DepositError> {
    let topics = log.data.topics();
    if topics.len() != 4 {
        return Err(DepositError::UnexpectedTopicsLen(topics.len()));
    }
    if topics[0] != DEPOSIT_EVENT_ABI_HASH {
        return Err(DepositError::InvalidSelector(topics[0]));
    }
    let data = log.data.data.as_ref();
    if data.len() < 64 {
        return Err(DepositError::IncompleteOpaqueData(data.len()));
    }
    if data.len() % 32 != 0 {
        return Err(DepositError::UnalignedData(data.len()));
    }

    let from = Address::from_slice(&topics[1].as_slice()[12..]);
    let to = Address::from_slice(&topics[2].as_slice()[12..]);
    let version = topics[3];
    if version != DEPOSIT_EVENT_VERSION_0 {
        return Err(DepositError::InvalidVersion(version));
    }

    // abi.encode(bytes) header: a 32-byte offset (always 32) then a 32-byte
    // content length.
    let offset = u64::from_be_bytes(data[24..32].try_into().expect("8 byte slice"));
    if offset != 32 {
        return Err(DepositError::InvalidOpaqueDataOffset(offset));
    }
    let opaque_len = u64::from_be_bytes(data[56..64].try_into().expect("8 byte slice")) as usize;
    if opaque_len > data.len() - 64 {
        return Err(DepositError::OpaqueDataOverflow(data.len() - 64, opaque_len));
    }

    let opaque = &data[64..64 + opaque_len];
    if opaque.len() < 32 + 32 + 8 + 1 {
        return Err(DepositError::UnexpectedOpaqueDataLen(opaque.len()));
    }

    // The leading 16 bytes of the mint word must be zero for the value to fit
    // a u128.
    let mint = u128::from_be_bytes(opaque[16..32].try_into().expect("16 byte slice"));
    let value = U256::from_be_slice(&opaque[32..64]);
    let gas_limit = u64::from_be_bytes(opaque[64..72].try_into().expect("8 byte slice"));
    let is_creation = opaque[72] != 0;
    let input = Bytes::copy_from_slice(&opaque[73..]);

    let source = UserDepositSource::new(block_hash, index as u64);
    let tx = TxDeposit {
        source_hash: source.source_hash(),
        from,
        to: if is_creation { TxKind::Create } else { TxKind::Call(to) },
        mint,
        value,
        gas_limit,
        is_system_transaction: false,
        input,
    };

    Ok(tx.encoded_2718())
}

/// Derives all deposit transactions from the receipts of an L1 block, in log
/// order, filtered to events emitted by `deposit_contract`.
pub fn derive_deposits(
    block_hash: B256,
    receipts: &[Receipt],
    deposit_contract: Address,
) -> Result<Vec<Bytes>, DepositError> {
    let mut deposits = Vec::new();
    let mut global_index = 0usize;
    for receipt in receipts {
        // Logs of reverted transactions are not present in receipts; anything
        // here was emitted by a successful transaction.
        for log in &receipt.logs {
            let index = global_index;
            global_index += 1;
            if log.address != deposit_contract {
                continue;
            }
            deposits.push(decode_deposit(block_hash, index, log)?);
        }
    }
    Ok(deposits)
}
