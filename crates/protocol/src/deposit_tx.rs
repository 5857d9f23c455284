//! The Kanvas deposit transaction type.

use alloy_primitives::{keccak256, Address, Bytes, TxKind, B256, U256};
use alloy_rlp::{Decodable, Encodable, RlpDecodable, RlpEncodable};

/// The EIP-2718 identifier of a deposit transaction.
pub const DEPOSIT_TX_TYPE: u8 = 0x7E;

/// An error decoding a [`TxDeposit`] from its EIP-2718 envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxDepositDecodingError {
    /// The envelope is empty.
    #[error("empty transaction envelope")]
    Empty,
    /// The type byte is not [`DEPOSIT_TX_TYPE`].
    #[error("unexpected transaction type: {0:#x}")]
    UnexpectedType(u8),
    /// The RLP body failed to decode.
    #[error("invalid deposit rlp: {0}")]
    InvalidRlp(alloy_rlp::Error),
}

/// A deposit transaction: an L2 transaction derived from an L1 deposit event or
/// synthesized by the protocol (the L1-info transaction).
///
/// RLP body: `[source_hash, from, to, mint, value, gas_limit, is_system_tx, input]`,
/// wrapped in an EIP-2718 envelope with type byte [`DEPOSIT_TX_TYPE`].
#[derive(Debug, Clone, PartialEq, Eq, Default, RlpEncodable, RlpDecodable)]
pub struct TxDeposit {
    /// Uniquely identifies the origin of the deposit.
    pub source_hash: B256,
    /// The address of the sender on L2.
    pub from: Address,
    /// The recipient, or create.
    pub to: TxKind,
    /// The ETH value to mint on L2.
    pub mint: u128,
    /// The ETH value to send to the recipient.
    pub value: U256,
    /// The gas limit of the L2 transaction.
    pub gas_limit: u64,
    /// Whether this is a system transaction (exempt from gas metering).
    pub is_system_transaction: bool,
    /// The calldata.
    pub input: Bytes,
}

impl TxDeposit {
    /// Encodes the transaction as an EIP-2718 typed envelope.
    pub fn encoded_2718(&self) -> Bytes {
        let mut out = Vec::with_capacity(1 + self.length());
        out.push(DEPOSIT_TX_TYPE);
        self.encode(&mut out);
        out.into()
    }

    /// Decodes an EIP-2718 typed envelope into a [`TxDeposit`].
    pub fn decode_2718(data: &[u8]) -> Result<Self, TxDepositDecodingError> {
        let (ty, mut body) = data.split_first().ok_or(TxDepositDecodingError::Empty)?;
        if *ty != DEPOSIT_TX_TYPE {
            return Err(TxDepositDecodingError::UnexpectedType(*ty));
        }
        Self::decode(&mut body).map_err(TxDepositDecodingError::InvalidRlp)
    }

    /// Returns the transaction hash of the encoded envelope.
    pub fn tx_hash(&self) -> B256 {
        keccak256(self.encoded_2718())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_deposit() -> TxDeposit {
        TxDeposit {
            source_hash: B256::with_last_byte(0xAA),
            from: Address::with_last_byte(0x01),
            to: TxKind::Call(Address::with_last_byte(0x02)),
            mint: 1_000_000,
            value: U256::from(42u64),
            gas_limit: 100_000,
            is_system_transaction: false,
            input: Bytes::from_static(&[0xde, 0xad]),
        }
    }

    #[test]
    fn test_deposit_2718_roundtrip() {
        let tx = test_deposit();
        let encoded = tx.encoded_2718();
        assert_eq!(encoded[0], DEPOSIT_TX_TYPE);
        assert_eq!(TxDeposit::decode_2718(&encoded).unwrap(), tx);
    }

    #[test]
    fn test_deposit_create_roundtrip() {
        let tx = TxDeposit { to: TxKind::Create, ..test_deposit() };
        assert_eq!(TxDeposit::decode_2718(&tx.encoded_2718()).unwrap(), tx);
    }

    #[test]
    fn test_decode_rejects_wrong_type() {
        let mut encoded = test_deposit().encoded_2718().to_vec();
        encoded[0] = 0x02;
        assert_eq!(
            TxDeposit::decode_2718(&encoded).unwrap_err(),
            TxDepositDecodingError::UnexpectedType(0x02)
        );
    }

    #[test]
    fn test_decode_rejects_empty() {
        assert_eq!(TxDeposit::decode_2718(&[]).unwrap_err(), TxDepositDecodingError::Empty);
    }
}
