//! The Kanvas derivation pipeline.
//!
//! A chain of pull-iterator stages turning L1 blocks into L2 payload
//! attributes: traversal, retrieval, frame parsing, channel assembly, batch
//! decoding, batch validation, and attributes building.

#![doc(issue_tracker_base_url = "https://github.com/kanvas-network/kanvas-node/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

mod errors;
pub use errors::{PipelineError, PipelineErrorKind, PipelineResult, ResetError};

mod traits;
pub use traits::{
    AttributesBuilder, AttributesProvider, ChainProvider, DataAvailabilityProvider,
    L2ChainProvider, NextAttributes, OriginAdvancer, OriginProvider, Pipeline, SignalReceiver,
};

mod signals;
pub use signals::{ResetSignal, Signal, StepResult};

mod sources;
pub use sources::CalldataSource;

mod stages;
pub use stages::{
    AttributesQueue, BatchQueue, ChannelBank, ChannelBankProvider, ChannelReader,
    ChannelReaderProvider, FrameQueue, FrameQueueProvider, L1Retrieval, L1RetrievalProvider,
    L1Traversal, MAX_CHANNEL_BANK_SIZE,
};

mod attributes;
pub use attributes::StatefulAttributesBuilder;

mod pipeline;
pub use pipeline::{new_derivation_pipeline, DerivationPipeline, KanvasDerivationPipeline};

mod metrics;
pub use metrics::Metrics;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
