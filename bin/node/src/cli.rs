//! Command-line interface of the node.
//!
//! Every flag mirrors an environment variable prefixed with `NODE_`;
//! precedence is CLI over environment over default.

use anyhow::{bail, Context, Result};
use clap::Parser;
use kanvas_genesis::RollupConfig;
use kanvas_rpc::RpcConfig;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    time::Duration,
};
use url::Url;

/// The Kanvas rollup node.
#[derive(Parser, Debug, Clone)]
#[command(name = "kanvas-node", version, about)]
pub struct Cli {
    /// Address of the L1 JSON-RPC endpoint to use (eth namespace required).
    #[arg(long = "l1", env = "NODE_L1_ETH_RPC")]
    pub l1_eth_rpc: Url,

    /// Address of the L2 engine JSON-RPC endpoint to use (engine and eth
    /// namespaces required).
    #[arg(long = "l2", env = "NODE_L2_ENGINE_RPC")]
    pub l2_engine_rpc: Url,

    /// Path to the rollup chain parameters.
    #[arg(long = "rollup.config", env = "NODE_ROLLUP_CONFIG")]
    pub rollup_config: PathBuf,

    /// RPC listening address.
    #[arg(long = "rpc.addr", env = "NODE_RPC_ADDR", default_value = "127.0.0.1")]
    pub rpc_addr: IpAddr,

    /// RPC listening port.
    #[arg(long = "rpc.port", env = "NODE_RPC_PORT", default_value_t = 9545)]
    pub rpc_port: u16,

    /// Enable the admin API.
    #[arg(long = "rpc.enable-admin", env = "NODE_RPC_ENABLE_ADMIN")]
    pub rpc_enable_admin: bool,

    /// Number of L1 blocks to keep distance from the L1 head before deriving
    /// L2 data from. Reorgs are supported, but may be slow to perform.
    #[arg(long = "syncer.l1-confs", env = "NODE_SYNCER_L1_CONFS", default_value_t = 0)]
    pub syncer_l1_confs: u64,

    /// Enable proposing of new L2 blocks. A separate batch submitter has to be
    /// deployed to publish the data for syncers.
    #[arg(long = "proposer.enabled", env = "NODE_PROPOSER_ENABLED")]
    pub proposer_enabled: bool,

    /// Initialize the proposer in a stopped state. The proposer can be
    /// started using the admin_startProposer RPC.
    #[arg(long = "proposer.stopped", env = "NODE_PROPOSER_STOPPED")]
    pub proposer_stopped: bool,

    /// Number of L1 blocks to keep distance from the L1 head as a proposer
    /// for picking an L1 origin.
    #[arg(long = "proposer.l1-confs", env = "NODE_PROPOSER_L1_CONFS", default_value_t = 4)]
    pub proposer_l1_confs: u64,

    /// Poll interval for the L1 head, in seconds.
    #[arg(long = "l1.poll-interval", env = "NODE_L1_POLL_INTERVAL", default_value_t = 6)]
    pub l1_poll_interval: u64,

    /// Poll interval for L1 epoch updates such as safe and finalized block
    /// changes, in seconds.
    #[arg(
        long = "l1.epoch-poll-interval",
        env = "NODE_L1_EPOCH_POLL_INTERVAL",
        default_value_t = 384
    )]
    pub l1_epoch_poll_interval: u64,

    /// Enable the metrics server.
    #[arg(long = "metrics.enabled", env = "NODE_METRICS_ENABLED")]
    pub metrics_enabled: bool,

    /// Metrics listening address.
    #[arg(long = "metrics.addr", env = "NODE_METRICS_ADDR", default_value = "0.0.0.0")]
    pub metrics_addr: IpAddr,

    /// Metrics listening port.
    #[arg(long = "metrics.port", env = "NODE_METRICS_PORT", default_value_t = 7300)]
    pub metrics_port: u16,

    /// Log filter directives, e.g. `info` or `kanvas=debug`.
    #[arg(long = "log.level", env = "NODE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Loads and validates the rollup config from disk.
    pub fn load_rollup_config(&self) -> Result<RollupConfig> {
        let raw = std::fs::read_to_string(&self.rollup_config).with_context(|| {
            format!("failed to read rollup config at {}", self.rollup_config.display())
        })?;
        let config: RollupConfig =
            serde_json::from_str(&raw).context("failed to parse rollup config")?;
        config.validate().context("invalid rollup config")?;

        if self.l1_poll_interval == 0 {
            bail!("l1.poll-interval must be non-zero");
        }
        if self.l1_epoch_poll_interval == 0 {
            bail!("l1.epoch-poll-interval must be non-zero");
        }
        Ok(config)
    }

    /// Returns the RPC server configuration.
    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig {
            listen_addr: SocketAddr::new(self.rpc_addr, self.rpc_port),
            enable_admin: self.rpc_enable_admin,
        }
    }

    /// Returns the metrics listen address, if metrics are enabled.
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_enabled.then(|| SocketAddr::new(self.metrics_addr, self.metrics_port))
    }

    /// Returns the L1 head poll interval.
    pub fn l1_head_poll_interval(&self) -> Duration {
        Duration::from_secs(self.l1_poll_interval)
    }

    /// Returns the L1 safe/finalized poll interval.
    pub fn l1_epoch_interval(&self) -> Duration {
        Duration::from_secs(self.l1_epoch_poll_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec![
            "kanvas-node",
            "--l1",
            "http://127.0.0.1:8545",
            "--l2",
            "http://127.0.0.1:8551",
            "--rollup.config",
            "/tmp/rollup.json",
        ]
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(base_args()).unwrap();
        assert_eq!(cli.syncer_l1_confs, 0);
        assert_eq!(cli.proposer_l1_confs, 4);
        assert!(!cli.rpc_enable_admin);
        assert!(!cli.proposer_enabled);
        assert!(cli.metrics_addr().is_none());
    }

    #[test]
    fn test_missing_required_flags_rejected() {
        assert!(Cli::try_parse_from(["kanvas-node"]).is_err());
        assert!(Cli::try_parse_from(["kanvas-node", "--l1", "http://127.0.0.1:8545"]).is_err());
    }

    #[test]
    fn test_env_fallback_and_cli_precedence() {
        std::env::set_var("NODE_RPC_PORT", "7000");

        // The environment fills in missing flags.
        let cli = Cli::try_parse_from(base_args()).unwrap();
        assert_eq!(cli.rpc_port, 7000);

        // An explicit flag wins over the environment.
        let mut args = base_args();
        args.extend(["--rpc.port", "8000"]);
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.rpc_port, 8000);

        std::env::remove_var("NODE_RPC_PORT");
    }

    #[test]
    fn test_negative_conf_depth_rejected_at_parse() {
        let mut args = base_args();
        args.extend(["--syncer.l1-confs", "-1"]);
        assert!(Cli::try_parse_from(args).is_err());
    }
}
