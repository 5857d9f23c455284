//! Metrics for the engine controller.

/// Container for the engine metric names.
#[derive(Debug, Clone, Copy)]
pub struct Metrics;

impl Metrics {
    /// Gauge (labeled): block numbers of the tracked heads.
    pub const BLOCK_LABELS: &'static str = "kanvas_node_block_labels";
    /// The label of the unsafe head.
    pub const UNSAFE_BLOCK_LABEL: &'static str = "unsafe";
    /// The label of the safe head.
    pub const SAFE_BLOCK_LABEL: &'static str = "safe";
    /// The label of the finalized head.
    pub const FINALIZED_BLOCK_LABEL: &'static str = "finalized";

    /// Counter: accepted forkchoice updates.
    pub const ENGINE_FORKCHOICE_UPDATES: &'static str = "kanvas_node_engine_forkchoice_updates";
    /// Counter: unsafe payload insertions.
    pub const ENGINE_UNSAFE_INSERTS: &'static str = "kanvas_node_engine_unsafe_inserts";
    /// Counter: consolidations of unsafe blocks into the safe chain.
    pub const ENGINE_CONSOLIDATIONS: &'static str = "kanvas_node_engine_consolidations";
    /// Counter: unsafe-chain reorgs onto derived blocks.
    pub const ENGINE_UNSAFE_REORGS: &'static str = "kanvas_node_engine_unsafe_reorgs";
    /// Counter: engine forkchoice resets.
    pub const ENGINE_RESET_COUNT: &'static str = "kanvas_node_engine_resets";
    /// Counter: the latest finalized block number.
    pub const ENGINE_FINALIZED_BLOCK: &'static str = "kanvas_node_engine_finalized_block";
    /// Gauge: seconds spent sealing the latest block.
    pub const ENGINE_SEAL_DURATION: &'static str = "kanvas_node_engine_seal_duration_seconds";

    /// Describes the engine metrics, if the `metrics` feature is enabled.
    pub fn init() {
        #[cfg(feature = "metrics")]
        {
            metrics::describe_gauge!(Self::BLOCK_LABELS, "Block numbers of the tracked L2 heads");
            metrics::describe_counter!(
                Self::ENGINE_FORKCHOICE_UPDATES,
                "Forkchoice updates accepted by the engine"
            );
            metrics::describe_counter!(
                Self::ENGINE_UNSAFE_INSERTS,
                "Unsafe payloads inserted into the engine"
            );
            metrics::describe_counter!(
                Self::ENGINE_CONSOLIDATIONS,
                "Unsafe blocks consolidated into the safe chain"
            );
            metrics::describe_counter!(
                Self::ENGINE_UNSAFE_REORGS,
                "Unsafe chain reorgs onto derived blocks"
            );
            metrics::describe_counter!(Self::ENGINE_RESET_COUNT, "Engine forkchoice resets");
            metrics::describe_counter!(
                Self::ENGINE_FINALIZED_BLOCK,
                "The latest finalized L2 block number"
            );
            metrics::describe_gauge!(
                Self::ENGINE_SEAL_DURATION,
                "Seconds spent sealing the latest block"
            );
        }
    }
}
