//! JSON-RPC APIs of the Kanvas node.
//!
//! The handlers never touch driver state directly: every request is forwarded
//! over a bounded channel and answered through a oneshot reply, keeping the
//! driver loop the single writer.

#![doc(issue_tracker_base_url = "https://github.com/kanvas-network/kanvas-node/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

mod api;
pub use api::{AdminApiServer, RollupNodeApiServer};

mod request;
pub use request::{DriverAdminError, DriverRpcRequest};

mod output;
pub use output::{
    compute_l2_output_root, verify_account_proof, OutputResponse, ProofVerificationError,
    OUTPUT_ROOT_VERSION_V0,
};

mod client;
pub use client::{L2EthClient, L2EthClientError};

mod server;
pub use server::{launch_rpc_server, AdminRpc, RollupRpc, RpcConfig, RpcServerError};
