//! Engine tasks.

mod synchronize;
pub use synchronize::SynchronizeTask;

mod build;
pub use build::BuildTask;

mod insert;
pub use insert::InsertTask;

mod consolidate;
pub use consolidate::{attributes_match, AttributesMatch, ConsolidateTask};

mod finalize;
pub use finalize::FinalizeTask;
