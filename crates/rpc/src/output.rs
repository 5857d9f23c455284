//! L2 output roots and proof verification.

use alloy_primitives::{keccak256, B256, U256};
use alloy_rlp::RlpEncodable;
use alloy_rpc_types_eth::EIP1186AccountProofResponse;
use alloy_trie::{proof::verify_proof, Nibbles};
use kanvas_protocol::{L2BlockInfo, SyncStatus};

/// Version 0 of the output root pre-image.
pub const OUTPUT_ROOT_VERSION_V0: B256 = B256::ZERO;

/// The response of `kanvas_outputAtBlock`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputResponse {
    /// The output root version.
    pub version: B256,
    /// The output root committing to the L2 state at the block.
    pub output_root: B256,
    /// The L2 block the output was computed at.
    pub block_ref: L2BlockInfo,
    /// The storage root of the message passer contract.
    pub withdrawal_storage_root: B256,
    /// The state root of the block.
    pub state_root: B256,
    /// The sync status observed when the output was computed.
    pub sync_status: SyncStatus,
}

/// Computes the L2 output root:
/// `keccak256(version || state_root || withdrawal_storage_root || block_hash)`.
pub fn compute_l2_output_root(
    version: B256,
    state_root: B256,
    withdrawal_storage_root: B256,
    block_hash: B256,
) -> B256 {
    let mut input = [0u8; 128];
    input[..32].copy_from_slice(version.as_slice());
    input[32..64].copy_from_slice(state_root.as_slice());
    input[64..96].copy_from_slice(withdrawal_storage_root.as_slice());
    input[96..].copy_from_slice(block_hash.as_slice());
    keccak256(input)
}

/// An error verifying an account proof.
#[derive(Debug, thiserror::Error)]
pub enum ProofVerificationError {
    /// The Merkle proof does not connect the account to the state root.
    #[error("invalid account proof: {0}")]
    InvalidProof(String),
}

#[derive(RlpEncodable)]
struct TrieAccount {
    nonce: u64,
    balance: U256,
    storage_root: B256,
    code_hash: B256,
}

/// Verifies that the account contents of an `eth_getProof` response (including
/// its storage hash) are committed to by `state_root`.
pub fn verify_account_proof(
    proof: &EIP1186AccountProofResponse,
    state_root: B256,
) -> Result<(), ProofVerificationError> {
    let key = Nibbles::unpack(keccak256(proof.address));
    let account = TrieAccount {
        nonce: proof.nonce,
        balance: proof.balance,
        storage_root: proof.storage_hash,
        code_hash: proof.code_hash,
    };
    let expected = alloy_rlp::encode(&account);
    verify_proof(state_root, key, Some(expected), proof.account_proof.iter())
        .map_err(|e| ProofVerificationError::InvalidProof(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn test_output_root_version_prefix() {
        let state_root = B256::with_last_byte(0x01);
        let storage_root = B256::with_last_byte(0x02);
        let block_hash = B256::with_last_byte(0x03);

        let root =
            compute_l2_output_root(OUTPUT_ROOT_VERSION_V0, state_root, storage_root, block_hash);

        // Recompute by hand over the concatenated pre-image.
        let mut raw = Vec::new();
        raw.extend_from_slice(&[0u8; 32]);
        raw.extend_from_slice(state_root.as_slice());
        raw.extend_from_slice(storage_root.as_slice());
        raw.extend_from_slice(block_hash.as_slice());
        assert_eq!(root, keccak256(&raw));
    }

    #[test]
    fn test_output_root_sensitive_to_every_field() {
        let base = compute_l2_output_root(
            OUTPUT_ROOT_VERSION_V0,
            B256::with_last_byte(1),
            B256::with_last_byte(2),
            B256::with_last_byte(3),
        );
        assert_ne!(
            base,
            compute_l2_output_root(
                OUTPUT_ROOT_VERSION_V0,
                B256::with_last_byte(9),
                B256::with_last_byte(2),
                B256::with_last_byte(3),
            )
        );
        assert_ne!(
            base,
            compute_l2_output_root(
                b256!("0000000000000000000000000000000000000000000000000000000000000001"),
                B256::with_last_byte(1),
                B256::with_last_byte(2),
                B256::with_last_byte(3),
            )
        );
    }

    #[test]
    fn test_account_proof_rejects_garbage() {
        let proof = EIP1186AccountProofResponse {
            address: alloy_primitives::Address::with_last_byte(0x03),
            balance: U256::ZERO,
            code_hash: B256::ZERO,
            nonce: 0,
            storage_hash: B256::with_last_byte(0x44),
            account_proof: vec![alloy_primitives::Bytes::from_static(&[0x80])],
            storage_proof: vec![],
        };
        assert!(verify_account_proof(&proof, B256::with_last_byte(0x55)).is_err());
    }
}
