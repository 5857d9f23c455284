//! The Kanvas rollup node binary.

mod cli;
mod telemetry;
mod version;

use clap::Parser;
use cli::Cli;
use kanvas_gossip::NoopNetwork;
use kanvas_service::{NodeExit, ProposerSetup, RollupNodeService};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use version::KANVAS_NODE_VERSION;

fn main() {
    let cli = Cli::parse();

    if let Err(err) = telemetry::init_tracing(&cli.log_level) {
        eprintln!("failed to initialize logging: {err:#}");
        std::process::exit(1);
    }

    let exit = run(cli);
    match &exit {
        NodeExit::Clean => info!(target: "node", "Shutdown complete"),
        NodeExit::FatalInit(reason) => error!(target: "node", reason, "Initialization failed"),
        NodeExit::LostEngine(reason) => error!(target: "node", reason, "Lost the execution engine"),
        NodeExit::LostL1(reason) => error!(target: "node", reason, "Lost the L1 chain"),
    }
    std::process::exit(exit.code());
}

fn run(cli: Cli) -> NodeExit {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => return NodeExit::FatalInit(format!("failed to build runtime: {err}")),
    };

    let rollup_config = match cli.load_rollup_config() {
        Ok(config) => Arc::new(config),
        Err(err) => return NodeExit::FatalInit(format!("{err:#}")),
    };

    if let Some(addr) = cli.metrics_addr() {
        if let Err(err) = telemetry::init_metrics(addr) {
            return NodeExit::FatalInit(format!("{err:#}"));
        }
        info!(target: "node", %addr, "Metrics server started");
    }

    info!(
        target: "node",
        version = KANVAS_NODE_VERSION,
        l2_chain_id = rollup_config.l2_chain_id,
        "Starting Kanvas rollup node"
    );

    let cancellation = CancellationToken::new();
    let service = RollupNodeService {
        cfg: rollup_config,
        l1_rpc_url: cli.l1_eth_rpc.clone(),
        l2_engine_url: cli.l2_engine_rpc.clone(),
        rpc: cli.rpc_config(),
        syncer_conf_depth: cli.syncer_l1_confs,
        proposer: ProposerSetup {
            enabled: cli.proposer_enabled,
            stopped: cli.proposer_stopped,
            conf_depth: cli.proposer_l1_confs,
        },
        l1_head_poll_interval: cli.l1_head_poll_interval(),
        l1_epoch_poll_interval: cli.l1_epoch_interval(),
        network: Arc::new(NoopNetwork),
        version: KANVAS_NODE_VERSION.to_string(),
        cancellation: cancellation.clone(),
    };

    runtime.block_on(async move {
        let shutdown = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!(target: "node", "Received interrupt, shutting down");
                shutdown.cancel();
            }
        });

        service.start().await
    })
}
