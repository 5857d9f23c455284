//! The Kanvas rollup node driver.
//!
//! The [`Driver`] event loop is the sole owner of mutable node state: it
//! serializes L1 signals, derivation steps, proposer actions, gossiped unsafe
//! payloads, and control RPCs into a single cooperative loop.

#![doc(issue_tracker_base_url = "https://github.com/kanvas-network/kanvas-node/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

mod actors;
pub use actors::{L1BlockRefFetcher, L1Signal, L1WatcherActor, NodeActor};

mod clock;
pub use clock::{Clock, SystemClock};

mod l1_state;
pub use l1_state::L1State;

mod origin_selector;
pub use origin_selector::{L1OriginSelector, OriginSelector, OriginSelectorError};

mod payloads;
pub use payloads::UnsafePayloadQueue;

mod proposer;
pub use proposer::{BuildingBlock, Proposer, ProposerError, ProposerState};

mod driver;
pub use driver::{Driver, DriverChannels, DriverConfig, DriverError};

mod service;
pub use service::{NodeExit, ProposerSetup, RollupNodeService};

mod metrics;
pub use metrics::Metrics;
