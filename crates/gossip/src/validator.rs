//! Inbound gossip validation.

use crate::signing_hash;
use kanvas_genesis::RollupConfig;
use kanvas_protocol::PayloadEnvelope;
use std::{panic::AssertUnwindSafe, sync::Arc};

/// The outcome of validating a gossiped message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The message is valid and should be processed and propagated.
    Accept,
    /// The message is invalid; penalize the sender.
    Reject,
    /// The message cannot be judged; drop it without penalty.
    Ignore,
}

/// Validates gossiped payload envelopes against the configured proposer
/// address.
#[derive(Debug, Clone)]
pub struct BlockValidator {
    /// The rollup configuration.
    cfg: Arc<RollupConfig>,
}

impl BlockValidator {
    /// Creates a new validator.
    pub const fn new(cfg: Arc<RollupConfig>) -> Self {
        Self { cfg }
    }

    /// Validates the raw bytes of a gossiped block message.
    ///
    /// The recovered signer must equal the configured proposer p2p address.
    /// Without a configured proposer the message is ignored rather than
    /// rejected, since it cannot be judged.
    pub fn validate_block(&self, data: &[u8]) -> (ValidationOutcome, Option<PayloadEnvelope>) {
        let envelope = match PayloadEnvelope::decode(data) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!(target: "gossip", %err, "Rejecting undecodable payload envelope");
                return (ValidationOutcome::Reject, None);
            }
        };

        let Some(proposer) = self.cfg.p2p_proposer_address else {
            return (ValidationOutcome::Ignore, None);
        };

        let hash = signing_hash(self.cfg.l2_chain_id, &data[65..]);
        match envelope.signature.recover_address_from_prehash(&hash) {
            Ok(addr) if addr == proposer => (ValidationOutcome::Accept, Some(envelope)),
            Ok(addr) => {
                debug!(target: "gossip", recovered = %addr, expected = %proposer, "Rejecting payload from unexpected signer");
                (ValidationOutcome::Reject, None)
            }
            Err(err) => {
                debug!(target: "gossip", %err, "Rejecting payload with unrecoverable signature");
                (ValidationOutcome::Reject, None)
            }
        }
    }
}

/// Wraps a validator so that a panic inside it rejects the message instead of
/// tearing down the gossip task.
pub fn guard_validator<F, T>(validator: F) -> impl Fn(T) -> ValidationOutcome
where
    F: Fn(T) -> ValidationOutcome,
{
    move |input| {
        match std::panic::catch_unwind(AssertUnwindSafe(|| validator(input))) {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(target: "gossip", "Gossip validator panicked, rejecting message");
                ValidationOutcome::Reject
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlockSigner;
    use alloy_signer_local::PrivateKeySigner;
    use kanvas_protocol::PayloadEnvelope;

    fn test_cfg(proposer: Option<alloy_primitives::Address>) -> Arc<RollupConfig> {
        let mut cfg = crate::test_utils::test_rollup_config();
        cfg.p2p_proposer_address = proposer;
        Arc::new(cfg)
    }

    fn signed_envelope_bytes(signer: &BlockSigner) -> Vec<u8> {
        let payload = crate::test_utils::test_payload();
        let ssz = kanvas_protocol::PayloadEnvelope {
            signature: alloy_primitives::Signature::test_signature(),
            payload: payload.clone(),
        }
        .ssz_payload();
        let signature = signer.sign_payload(&ssz).unwrap();
        PayloadEnvelope { signature, payload }.encode().to_vec()
    }

    #[test]
    fn test_valid_signature_accepted() {
        let key = PrivateKeySigner::random();
        let signer = BlockSigner::new(key, 255);
        let cfg = test_cfg(Some(signer.address()));
        let validator = BlockValidator::new(cfg);

        let (outcome, envelope) = validator.validate_block(&signed_envelope_bytes(&signer));
        assert_eq!(outcome, ValidationOutcome::Accept);
        assert!(envelope.is_some());
    }

    #[test]
    fn test_wrong_signer_rejected() {
        let signer = BlockSigner::new(PrivateKeySigner::random(), 255);
        let cfg = test_cfg(Some(alloy_primitives::Address::with_last_byte(0x12)));
        let validator = BlockValidator::new(cfg);

        let (outcome, _) = validator.validate_block(&signed_envelope_bytes(&signer));
        assert_eq!(outcome, ValidationOutcome::Reject);
    }

    #[test]
    fn test_zero_signature_rejected() {
        let signer = BlockSigner::new(PrivateKeySigner::random(), 255);
        let cfg = test_cfg(Some(signer.address()));
        let validator = BlockValidator::new(cfg);

        let mut data = signed_envelope_bytes(&signer);
        data[..65].fill(0);
        let (outcome, _) = validator.validate_block(&data);
        assert_eq!(outcome, ValidationOutcome::Reject);
    }

    #[test]
    fn test_missing_proposer_config_ignored() {
        let signer = BlockSigner::new(PrivateKeySigner::random(), 255);
        let cfg = test_cfg(None);
        let validator = BlockValidator::new(cfg);

        let (outcome, _) = validator.validate_block(&signed_envelope_bytes(&signer));
        assert_eq!(outcome, ValidationOutcome::Ignore);
    }

    #[test]
    fn test_guard_recovers_from_panics() {
        let guarded = guard_validator(|peer: &str| {
            if peer == "mallory" {
                panic!("mallory was here");
            }
            if peer == "bob" {
                return ValidationOutcome::Ignore;
            }
            ValidationOutcome::Accept
        });

        // Panics are recovered and rejected; other peers are unaffected.
        assert_eq!(guarded("alice"), ValidationOutcome::Accept);
        assert_eq!(guarded("mallory"), ValidationOutcome::Reject);
        assert_eq!(guarded("bob"), ValidationOutcome::Ignore);
        assert_eq!(guarded("mallory"), ValidationOutcome::Reject);
        assert_eq!(guarded("alice"), ValidationOutcome::Accept);
        assert_eq!(guarded("bob"), ValidationOutcome::Ignore);
    }
}
