//! Block signing.

use alloy_primitives::{keccak256, Address, Signature, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;

/// The domain string of v1 block signatures.
pub const SIGNING_DOMAIN_BLOCKS_V1: &[u8] = b"kanvas_block_signing_v1";

/// Computes the hash a proposer signs over a gossiped payload:
/// `keccak256(domain || chain_id(32B BE) || keccak256(ssz_payload))`.
pub fn signing_hash(chain_id: u64, ssz_payload: &[u8]) -> B256 {
    let mut input =
        Vec::with_capacity(SIGNING_DOMAIN_BLOCKS_V1.len() + 32 + 32);
    input.extend_from_slice(SIGNING_DOMAIN_BLOCKS_V1);
    input.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
    input.extend_from_slice(keccak256(ssz_payload).as_slice());
    keccak256(input)
}

/// An error signing a payload.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// The underlying signer failed.
    #[error("signer error: {0}")]
    Signer(#[from] alloy_signer::Error),
}

/// Signs gossiped payloads with a local proposer key.
#[derive(Debug, Clone)]
pub struct BlockSigner {
    /// The proposer key.
    key: PrivateKeySigner,
    /// The L2 chain id bound into every signature.
    chain_id: u64,
}

impl BlockSigner {
    /// Creates a new signer.
    pub const fn new(key: PrivateKeySigner, chain_id: u64) -> Self {
        Self { key, chain_id }
    }

    /// Returns the signing address.
    pub fn address(&self) -> Address {
        self.key.address()
    }

    /// Signs the SSZ encoding of a payload.
    pub fn sign_payload(&self, ssz_payload: &[u8]) -> Result<Signature, SignerError> {
        let hash = signing_hash(self.chain_id, ssz_payload);
        Ok(self.key.sign_hash_sync(&hash)?)
    }
}
