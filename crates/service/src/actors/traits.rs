//! The [`NodeActor`] trait.

use async_trait::async_trait;

/// An actor-like long-running service of the node.
///
/// Actors receive their dependencies at construction and run to completion in
/// [`NodeActor::start`], exiting when their cancellation token fires.
#[async_trait]
pub trait NodeActor: Send + 'static {
    /// The error type for the actor.
    type Error: std::fmt::Debug;

    /// Starts the actor.
    async fn start(self) -> Result<(), Self::Error>;
}
