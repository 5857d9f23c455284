//! Metrics for the driver and proposer.

/// Container for the service metric names.
#[derive(Debug, Clone, Copy)]
pub struct Metrics;

impl Metrics {
    /// Gauge: the depth of the most recent observed L1 reorg.
    pub const L1_REORG_DEPTH: &'static str = "kanvas_node_l1_reorg_depth";
    /// Counter: derivation pipeline resets.
    pub const PIPELINE_RESETS: &'static str = "kanvas_node_pipeline_resets";
    /// Gauge: buffered unsafe payloads.
    pub const UNSAFE_PAYLOAD_QUEUE_LEN: &'static str = "kanvas_node_unsafe_payload_queue_len";
    /// Counter: blocks built by the proposer.
    pub const PROPOSER_BUILT_BLOCKS: &'static str = "kanvas_node_proposer_built_blocks";
    /// Counter: publish failures of proposed blocks.
    pub const PROPOSER_PUBLISHING_ERRORS: &'static str = "kanvas_node_proposer_publishing_errors";

    /// Describes the metrics of the driver and its subsystems, if the
    /// `metrics` feature is enabled.
    pub fn init() {
        kanvas_derive::Metrics::init();
        kanvas_engine::Metrics::init();
        #[cfg(feature = "metrics")]
        {
            metrics::describe_gauge!(
                Self::L1_REORG_DEPTH,
                "Depth of the most recent observed L1 reorg"
            );
            metrics::describe_counter!(Self::PIPELINE_RESETS, "Derivation pipeline resets");
            metrics::describe_gauge!(
                Self::UNSAFE_PAYLOAD_QUEUE_LEN,
                "Unsafe payloads buffered for insertion"
            );
            metrics::describe_counter!(
                Self::PROPOSER_BUILT_BLOCKS,
                "Blocks built and sealed by the proposer"
            );
            metrics::describe_counter!(
                Self::PROPOSER_PUBLISHING_ERRORS,
                "Failures publishing proposed blocks to the network"
            );
        }
    }
}
