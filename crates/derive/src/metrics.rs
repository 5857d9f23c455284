//! Metrics for the derivation pipeline.

/// Container for the pipeline metric names.
#[derive(Debug, Clone, Copy)]
pub struct Metrics;

impl Metrics {
    /// Gauge: the L1 origin the pipeline is reading from.
    pub const PIPELINE_L1_ORIGIN: &'static str = "kanvas_node_pipeline_l1_origin";
    /// Counter: batches dropped by validation.
    pub const PIPELINE_BATCHES_DROPPED: &'static str = "kanvas_node_pipeline_batches_dropped";
    /// Counter: channels dropped by timeout.
    pub const PIPELINE_CHANNEL_TIMEOUTS: &'static str = "kanvas_node_pipeline_channel_timeouts";
    /// Counter: deposits-only batches synthesized for empty slots.
    pub const PIPELINE_EMPTY_BATCHES: &'static str = "kanvas_node_pipeline_empty_batches_derived";

    /// Describes the pipeline metrics, if the `metrics` feature is enabled.
    pub fn init() {
        #[cfg(feature = "metrics")]
        {
            metrics::describe_gauge!(
                Self::PIPELINE_L1_ORIGIN,
                "The L1 origin the derivation pipeline is reading from"
            );
            metrics::describe_counter!(
                Self::PIPELINE_BATCHES_DROPPED,
                "Batches dropped by batch validation"
            );
            metrics::describe_counter!(
                Self::PIPELINE_CHANNEL_TIMEOUTS,
                "Channels dropped after exceeding the channel timeout"
            );
            metrics::describe_counter!(
                Self::PIPELINE_EMPTY_BATCHES,
                "Deposits-only batches synthesized for empty L2 slots"
            );
        }
    }
}
