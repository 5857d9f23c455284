//! Gossip payload signing and validation.
//!
//! The gossip transport itself lives outside the node core; this crate holds
//! the signing domain, the proposer's block signer, the inbound payload
//! validator, and the [`Network`] publish capability the driver talks to.

#![doc(issue_tracker_base_url = "https://github.com/kanvas-network/kanvas-node/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

mod signer;
pub use signer::{signing_hash, BlockSigner, SignerError, SIGNING_DOMAIN_BLOCKS_V1};

mod validator;
pub use validator::{guard_validator, BlockValidator, ValidationOutcome};

mod net;
pub use net::{Network, NetworkError, NoopNetwork};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
