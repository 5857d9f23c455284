//! RPC-backed chain providers for the Kanvas node.
//!
//! Alloy providers for L1 and the L2 engine endpoint, the confirmation-depth
//! view over L1, and sync-start discovery.

#![doc(issue_tracker_base_url = "https://github.com/kanvas-network/kanvas-node/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

mod errors;
pub use errors::SourceProviderError;

mod l1_provider;
pub use l1_provider::AlloyChainProvider;

mod engine_client;
pub use engine_client::AlloyEngineClient;

mod conf_depth;
pub use conf_depth::ConfDepthProvider;

mod sync_start;
pub use sync_start::{find_starting_forkchoice, L2SyncProvider, SyncStart, SyncStartError};
