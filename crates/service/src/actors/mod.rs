//! The node's long-running actors.

mod traits;
pub use traits::NodeActor;

mod l1_watcher;
pub use l1_watcher::{L1BlockRefFetcher, L1Signal, L1WatcherActor};
