//! Control signals and step results.

use crate::PipelineErrorKind;
use kanvas_protocol::{BlockInfo, L2BlockInfo};

/// A control signal propagated down the stage chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Re-open every stage at a known-good L2 ref and L1 origin.
    Reset(ResetSignal),
}

/// The payload of a [`Signal::Reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResetSignal {
    /// The L2 safe head derivation resumes from.
    pub l2_safe_head: L2BlockInfo,
    /// The L1 origin the pipeline re-opens at.
    pub l1_origin: BlockInfo,
}

impl ResetSignal {
    /// Wraps the reset into a [`Signal`].
    pub const fn signal(self) -> Signal {
        Signal::Reset(self)
    }
}

/// The outcome of one pipeline step.
#[derive(Debug)]
pub enum StepResult {
    /// New payload attributes were prepared.
    PreparedAttributes,
    /// The pipeline advanced to the next L1 origin.
    AdvancedOrigin,
    /// Advancing the origin failed.
    OriginAdvanceErr(PipelineErrorKind),
    /// The step failed.
    StepFailed(PipelineErrorKind),
}
