//! Genesis and rollup configuration types for the Kanvas network.

#![doc(issue_tracker_base_url = "https://github.com/kanvas-network/kanvas-node/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod genesis;
pub use genesis::{ChainGenesis, SystemConfig};

mod rollup;
pub use rollup::{RollupConfig, RollupConfigError};

mod predeploys;
pub use predeploys::Predeploys;
