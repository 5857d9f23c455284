//! The rollup node service: wiring and lifecycle.

use crate::{
    Driver, DriverConfig, DriverError, L1WatcherActor, NodeActor, Proposer, SystemClock,
    L1OriginSelector,
};
use crate::driver::DriverChannels;
use alloy_provider::RootProvider;
use kanvas_derive::{new_derivation_pipeline, ChainProvider, StatefulAttributesBuilder};
use kanvas_engine::Engine;
use kanvas_genesis::RollupConfig;
use kanvas_gossip::Network;
use kanvas_rpc::{launch_rpc_server, AdminRpc, RollupRpc, RpcConfig};
use kanvas_sources::{AlloyChainProvider, AlloyEngineClient, ConfDepthProvider};
use std::{sync::Arc, time::Duration};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use url::Url;

/// The capacity of the L1 signal and unsafe payload channels.
const SIGNAL_CHANNEL_CAPACITY: usize = 10;

/// Proposer configuration.
#[derive(Debug, Clone)]
pub struct ProposerSetup {
    /// Whether this node proposes blocks at all.
    pub enabled: bool,
    /// Whether the proposer starts stopped, awaiting `admin_startProposer`.
    pub stopped: bool,
    /// The confirmation depth used when selecting L1 origins.
    pub conf_depth: u64,
}

/// How the node exited, mapped onto the process exit code.
#[derive(Debug)]
pub enum NodeExit {
    /// Clean shutdown.
    Clean,
    /// Initialization failed.
    FatalInit(String),
    /// The execution engine was lost.
    LostEngine(String),
    /// The L1 chain was lost.
    LostL1(String),
}

impl NodeExit {
    /// Returns the process exit code.
    pub const fn code(&self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::FatalInit(_) => 1,
            Self::LostEngine(_) => 2,
            Self::LostL1(_) => 3,
        }
    }
}

/// Assembles and runs the whole node: providers, pipeline, engine, proposer,
/// RPC server, L1 watcher, and the driver loop.
#[derive(Debug)]
pub struct RollupNodeService {
    /// The rollup config.
    pub cfg: Arc<RollupConfig>,
    /// The L1 JSON-RPC endpoint.
    pub l1_rpc_url: Url,
    /// The L2 engine JSON-RPC endpoint.
    pub l2_engine_url: Url,
    /// RPC server configuration.
    pub rpc: RpcConfig,
    /// The derivation confirmation depth.
    pub syncer_conf_depth: u64,
    /// The proposer configuration.
    pub proposer: ProposerSetup,
    /// The L1 head poll interval.
    pub l1_head_poll_interval: Duration,
    /// The L1 safe/finalized poll interval.
    pub l1_epoch_poll_interval: Duration,
    /// The network publish capability.
    pub network: Arc<dyn Network>,
    /// The node version string.
    pub version: String,
    /// The cancellation token tied to process shutdown.
    pub cancellation: CancellationToken,
}

impl RollupNodeService {
    /// Runs the node to completion.
    pub async fn start(self) -> NodeExit {
        let l1_root = RootProvider::new_http(self.l1_rpc_url.clone());
        let l2_root = RootProvider::new_http(self.l2_engine_url.clone());

        let mut l1_provider = AlloyChainProvider::new(l1_root.clone());
        let engine_client = Arc::new(AlloyEngineClient::new(l2_root, self.cfg.clone()));

        // The pipeline needs a concrete L1 origin to open at; the driver's
        // initial reset immediately re-points it, so the genesis anchor is
        // only a placeholder that must exist on L1.
        let genesis_origin =
            match l1_provider.block_info_by_number(self.cfg.genesis.l1.number).await {
                Ok(origin) if origin.hash == self.cfg.genesis.l1.hash => origin,
                Ok(origin) => {
                    return NodeExit::FatalInit(format!(
                        "genesis L1 block mismatch: expected {}, L1 has {}",
                        self.cfg.genesis.l1.hash, origin.hash
                    ));
                }
                Err(err) => {
                    return NodeExit::FatalInit(format!("failed to fetch genesis L1 block: {err}"));
                }
            };

        let (l1_head_tx, l1_head_rx) = watch::channel(None);
        let (l1_signal_tx, l1_signal_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let (unsafe_payload_tx, unsafe_payload_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let (rpc_tx, rpc_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        // Keep the gossip sender alive even without a transport wired in.
        let _unsafe_payload_tx = unsafe_payload_tx;

        let syncer_view = ConfDepthProvider::new(
            AlloyChainProvider::new(l1_root.clone()),
            self.syncer_conf_depth,
            l1_head_rx.clone(),
        );
        let pipeline = new_derivation_pipeline(self.cfg.clone(), syncer_view, genesis_origin);

        let engine = Engine::new(engine_client.clone(), self.cfg.clone());

        let proposer_view = ConfDepthProvider::new(
            AlloyChainProvider::new(l1_root.clone()),
            self.proposer.conf_depth,
            l1_head_rx,
        );
        let proposer = Proposer::new(
            Box::new(L1OriginSelector::new(self.cfg.clone(), proposer_view)),
            Box::new(StatefulAttributesBuilder::new(
                self.cfg.clone(),
                AlloyChainProvider::new(l1_root.clone()),
            )),
            self.network,
            Arc::new(SystemClock),
            self.proposer.enabled,
            self.proposer.stopped,
        );

        let rollup_rpc = RollupRpc::new(
            self.cfg.clone(),
            rpc_tx.clone(),
            engine_client.clone(),
            self.version.clone(),
        );
        let admin_rpc = AdminRpc::new(rpc_tx);
        let rpc_handle = match launch_rpc_server(self.rpc.clone(), rollup_rpc, admin_rpc).await {
            Ok(handle) => handle,
            Err(err) => return NodeExit::FatalInit(format!("failed to start rpc server: {err}")),
        };

        let watcher = L1WatcherActor::new(
            AlloyChainProvider::new(l1_root),
            self.l1_head_poll_interval,
            self.l1_epoch_poll_interval,
            l1_signal_tx,
            self.cancellation.clone(),
        );
        let watcher_handle = tokio::spawn(watcher.start());

        let driver = Driver::new(
            self.cfg,
            DriverConfig::default(),
            pipeline,
            engine,
            proposer,
            l1_provider,
            (*engine_client).clone(),
            DriverChannels { l1_signal_rx, unsafe_payload_rx, rpc_rx, l1_head_tx },
            self.cancellation.clone(),
        );

        let exit = match driver.start().await {
            Ok(()) => NodeExit::Clean,
            Err(err @ DriverError::Engine(_)) => NodeExit::LostEngine(err.to_string()),
            Err(err @ DriverError::Panicked) => NodeExit::LostEngine(err.to_string()),
            Err(err @ DriverError::Pipeline(_)) => NodeExit::LostL1(err.to_string()),
            Err(err @ DriverError::ChannelClosed) => NodeExit::LostL1(err.to_string()),
        };

        // Tear everything down before reporting the exit.
        self.cancellation.cancel();
        let _ = rpc_handle.stop();
        let _ = watcher_handle.await;

        exit
    }
}
