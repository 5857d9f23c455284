//! The signed execution payload envelope gossiped between nodes.

use alloy_primitives::{keccak256, Address, Bloom, Bytes, Signature, B256, U256};
use alloy_rpc_types_engine::ExecutionPayloadV1;

/// The fixed-size prefix of an SSZ-encoded execution payload.
const PAYLOAD_FIXED_PART: usize = 32 + 20 + 32 + 32 + 256 + 32 + 8 + 8 + 8 + 8 + 4 + 32 + 32 + 4;

/// The maximum accepted `extra_data` length.
const MAX_EXTRA_DATA_LEN: usize = 32;

/// The maximum accepted transaction count.
const MAX_TRANSACTIONS: usize = 1 << 20;

/// An error decoding an SSZ execution payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SszDecodingError {
    /// The payload is shorter than the fixed part.
    #[error("ssz payload too short: {0} bytes")]
    TooShort(usize),
    /// A dynamic-field offset is out of bounds or out of order.
    #[error("invalid ssz offset")]
    InvalidOffset,
    /// The extra data exceeds [`MAX_EXTRA_DATA_LEN`].
    #[error("extra data too long: {0} bytes")]
    ExtraDataTooLong(usize),
    /// The transaction count exceeds [`MAX_TRANSACTIONS`].
    #[error("too many transactions: {0}")]
    TooManyTransactions(usize),
}

/// An error decoding a [`PayloadEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PayloadEnvelopeError {
    /// The envelope is shorter than a signature.
    #[error("envelope too short: {0} bytes")]
    TooShort(usize),
    /// The signature bytes are malformed.
    #[error("invalid signature")]
    InvalidSignature,
    /// The payload failed to decode.
    #[error(transparent)]
    Ssz(#[from] SszDecodingError),
}

/// A signed execution payload, as gossiped over the proposer's p2p topic.
///
/// Wire format: `signature(65) || ssz(payload)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEnvelope {
    /// The proposer's signature over the payload hash.
    pub signature: Signature,
    /// The execution payload.
    pub payload: ExecutionPayloadV1,
}

impl PayloadEnvelope {
    /// Encodes the envelope for gossip.
    pub fn encode(&self) -> Bytes {
        let payload = encode_payload_ssz(&self.payload);
        let mut out = Vec::with_capacity(65 + payload.len());
        out.extend_from_slice(&self.signature.as_bytes());
        out.extend_from_slice(&payload);
        out.into()
    }

    /// Decodes a gossiped envelope.
    pub fn decode(data: &[u8]) -> Result<Self, PayloadEnvelopeError> {
        if data.len() < 65 {
            return Err(PayloadEnvelopeError::TooShort(data.len()));
        }
        let signature = Signature::from_raw(&data[..65])
            .map_err(|_| PayloadEnvelopeError::InvalidSignature)?;
        let payload = decode_payload_ssz(&data[65..])?;
        Ok(Self { signature, payload })
    }

    /// Returns the hash the proposer signs: the keccak of the SSZ payload.
    pub fn payload_hash(&self) -> B256 {
        keccak256(encode_payload_ssz(&self.payload))
    }

    /// Returns the SSZ encoding of the inner payload.
    pub fn ssz_payload(&self) -> Vec<u8> {
        encode_payload_ssz(&self.payload)
    }
}

/// SSZ-encodes an execution payload.
///
/// The layout is the fixed 508-byte prefix with 4-byte offsets for the two
/// dynamic fields (`extra_data` and `transactions`), integers little-endian.
pub(crate) fn encode_payload_ssz(payload: &ExecutionPayloadV1) -> Vec<u8> {
    let txs_len: usize = payload.transactions.iter().map(|tx| 4 + tx.len()).sum();
    let mut out = Vec::with_capacity(PAYLOAD_FIXED_PART + payload.extra_data.len() + txs_len);

    out.extend_from_slice(payload.parent_hash.as_slice());
    out.extend_from_slice(payload.fee_recipient.as_slice());
    out.extend_from_slice(payload.state_root.as_slice());
    out.extend_from_slice(payload.receipts_root.as_slice());
    out.extend_from_slice(payload.logs_bloom.as_slice());
    out.extend_from_slice(payload.prev_randao.as_slice());
    out.extend_from_slice(&payload.block_number.to_le_bytes());
    out.extend_from_slice(&payload.gas_limit.to_le_bytes());
    out.extend_from_slice(&payload.gas_used.to_le_bytes());
    out.extend_from_slice(&payload.timestamp.to_le_bytes());
    out.extend_from_slice(&(PAYLOAD_FIXED_PART as u32).to_le_bytes());
    out.extend_from_slice(&payload.base_fee_per_gas.to_le_bytes::<32>());
    out.extend_from_slice(payload.block_hash.as_slice());
    let txs_offset = PAYLOAD_FIXED_PART + payload.extra_data.len();
    out.extend_from_slice(&(txs_offset as u32).to_le_bytes());

    out.extend_from_slice(&payload.extra_data);

    // Transactions: an offset table followed by the concatenated tx bytes.
    let mut tx_offset = 4 * payload.transactions.len();
    for tx in &payload.transactions {
        out.extend_from_slice(&(tx_offset as u32).to_le_bytes());
        tx_offset += tx.len();
    }
    for tx in &payload.transactions {
        out.extend_from_slice(tx);
    }

    out
}

/// SSZ-decodes an execution payload.
pub(crate) fn decode_payload_ssz(data: &[u8]) -> Result<ExecutionPayloadV1, SszDecodingError> {
    if data.len() < PAYLOAD_FIXED_PART {
        return Err(SszDecodingError::TooShort(data.len()));
    }

    let mut at = 0usize;
    let mut take = |n: usize| {
        let slice = &data[at..at + n];
        at += n;
        slice
    };

    let parent_hash = B256::from_slice(take(32));
    let fee_recipient = Address::from_slice(take(20));
    let state_root = B256::from_slice(take(32));
    let receipts_root = B256::from_slice(take(32));
    let logs_bloom = Bloom::from_slice(take(256));
    let prev_randao = B256::from_slice(take(32));
    let block_number = u64::from_le_bytes(take(8).try_into().expect("8 byte slice"));
    let gas_limit = u64::from_le_bytes(take(8).try_into().expect("8 byte slice"));
    let gas_used = u64::from_le_bytes(take(8).try_into().expect("8 byte slice"));
    let timestamp = u64::from_le_bytes(take(8).try_into().expect("8 byte slice"));
    let extra_data_offset =
        u32::from_le_bytes(take(4).try_into().expect("4 byte slice")) as usize;
    let base_fee_per_gas = U256::from_le_slice(take(32));
    let block_hash = B256::from_slice(take(32));
    let txs_offset = u32::from_le_bytes(take(4).try_into().expect("4 byte slice")) as usize;

    if extra_data_offset != PAYLOAD_FIXED_PART
        || txs_offset < extra_data_offset
        || txs_offset > data.len()
    {
        return Err(SszDecodingError::InvalidOffset);
    }
    let extra_data_len = txs_offset - extra_data_offset;
    if extra_data_len > MAX_EXTRA_DATA_LEN {
        return Err(SszDecodingError::ExtraDataTooLong(extra_data_len));
    }
    let extra_data = Bytes::copy_from_slice(&data[extra_data_offset..txs_offset]);

    let txs_section = &data[txs_offset..];
    let transactions = decode_tx_list(txs_section)?;

    Ok(ExecutionPayloadV1 {
        parent_hash,
        fee_recipient,
        state_root,
        receipts_root,
        logs_bloom,
        prev_randao,
        block_number,
        gas_limit,
        gas_used,
        timestamp,
        extra_data,
        base_fee_per_gas,
        block_hash,
        transactions,
    })
}

fn decode_tx_list(section: &[u8]) -> Result<Vec<Bytes>, SszDecodingError> {
    if section.is_empty() {
        return Ok(Vec::new());
    }
    if section.len() < 4 {
        return Err(SszDecodingError::InvalidOffset);
    }
    let first_offset =
        u32::from_le_bytes(section[..4].try_into().expect("4 byte slice")) as usize;
    if first_offset % 4 != 0 || first_offset > section.len() {
        return Err(SszDecodingError::InvalidOffset);
    }
    let count = first_offset / 4;
    if count > MAX_TRANSACTIONS {
        return Err(SszDecodingError::TooManyTransactions(count));
    }

    let mut offsets = Vec::with_capacity(count + 1);
    for i in 0..count {
        let raw = &section[4 * i..4 * (i + 1)];
        offsets.push(u32::from_le_bytes(raw.try_into().expect("4 byte slice")) as usize);
    }
    offsets.push(section.len());

    let mut transactions = Vec::with_capacity(count);
    for window in offsets.windows(2) {
        let (start, end) = (window[0], window[1]);
        if start > end || end > section.len() {
            return Err(SszDecodingError::InvalidOffset);
        }
        transactions.push(Bytes::copy_from_slice(&section[start..end]));
    }
    Ok(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn test_payload() -> ExecutionPayloadV1 {
        ExecutionPayloadV1 {
            parent_hash: B256::with_last_byte(0x01),
            fee_recipient: Address::with_last_byte(0x02),
            state_root: B256::with_last_byte(0x03),
            receipts_root: B256::with_last_byte(0x04),
            logs_bloom: Bloom::default(),
            prev_randao: B256::with_last_byte(0x05),
            block_number: 42,
            gas_limit: 30_000_000,
            gas_used: 21_000,
            timestamp: 1_700_000_084,
            extra_data: Bytes::from_static(b"kanvas"),
            base_fee_per_gas: U256::from(7u64),
            block_hash: B256::with_last_byte(0x06),
            transactions: vec![
                Bytes::from_static(&[0x7E, 0x01, 0x02]),
                Bytes::from_static(&[0x02, 0xFF]),
            ],
        }
    }

    #[test]
    fn test_ssz_roundtrip() {
        let payload = test_payload();
        let encoded = encode_payload_ssz(&payload);
        assert_eq!(decode_payload_ssz(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_ssz_roundtrip_no_transactions() {
        let payload = ExecutionPayloadV1 {
            transactions: vec![],
            extra_data: Bytes::new(),
            ..test_payload()
        };
        let encoded = encode_payload_ssz(&payload);
        assert_eq!(encoded.len(), PAYLOAD_FIXED_PART);
        assert_eq!(decode_payload_ssz(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_ssz_rejects_truncated() {
        let encoded = encode_payload_ssz(&test_payload());
        assert!(matches!(
            decode_payload_ssz(&encoded[..100]),
            Err(SszDecodingError::TooShort(100))
        ));
    }

    #[test]
    fn test_ssz_rejects_oversized_extra_data() {
        let payload =
            ExecutionPayloadV1 { extra_data: Bytes::from(vec![0u8; 33]), ..test_payload() };
        let encoded = encode_payload_ssz(&payload);
        assert_eq!(
            decode_payload_ssz(&encoded).unwrap_err(),
            SszDecodingError::ExtraDataTooLong(33)
        );
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = PayloadEnvelope {
            signature: Signature::test_signature(),
            payload: test_payload(),
        };
        let encoded = envelope.encode();
        let decoded = PayloadEnvelope::decode(&encoded).unwrap();
        assert_eq!(envelope, decoded);
        assert_eq!(envelope.payload_hash(), decoded.payload_hash());
    }

    #[test]
    fn test_envelope_rejects_short_input() {
        assert_eq!(
            PayloadEnvelope::decode(&[0u8; 10]).unwrap_err(),
            PayloadEnvelopeError::TooShort(10)
        );
    }
}
