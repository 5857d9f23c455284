//! The proposer state machine.

use crate::{Clock, Metrics, OriginSelector, OriginSelectorError};
use alloy_primitives::B256;
use alloy_rpc_types_engine::PayloadId;
use kanvas_derive::{AttributesBuilder, PipelineErrorKind};
use kanvas_engine::{Engine, EngineApi, EngineTaskError, EngineTaskErrorSeverity};
use kanvas_gossip::Network;
use kanvas_protocol::{KanvasAttributesWithParent, L2BlockInfo};
use kanvas_rpc::DriverAdminError;
use std::{sync::Arc, time::Duration};

/// A block building job in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingBlock {
    /// The engine's build job id.
    pub payload_id: PayloadId,
    /// The block being built on.
    pub parent: L2BlockInfo,
    /// The unix time at which the block is sealed: its own timestamp.
    pub deadline: u64,
}

/// The proposer's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposerState {
    /// Not proposing. Entered at startup (when configured stopped) and via
    /// `admin_stopProposer`.
    Stopped,
    /// Waiting for the next block slot.
    Ready,
    /// A build job is running on the engine.
    Building(BuildingBlock),
    /// The built block is being sealed and published.
    Sealing,
}

/// An error from a proposer action.
#[derive(Debug, thiserror::Error)]
pub enum ProposerError {
    /// The engine failed fatally.
    #[error(transparent)]
    Engine(#[from] EngineTaskError),
    /// The attributes builder failed fatally.
    #[error(transparent)]
    Pipeline(PipelineErrorKind),
    /// The proposer's view of L1 diverged; the driver must reset.
    #[error("proposer requires a pipeline reset")]
    ResetRequired,
}

/// Builds and publishes new unsafe L2 blocks while this node is the leader.
///
/// Driven entirely by the driver loop: [`Proposer::plan_next_action`] yields
/// the delay until the next action, and [`Proposer::run_next_action`] performs
/// it. Actions never interleave with derivation steps.
#[derive(Debug)]
pub struct Proposer {
    /// Chooses the L1 origin of each new block.
    origin_selector: Box<dyn OriginSelector>,
    /// Builds the deterministic part of each block's attributes.
    attributes_builder: Box<dyn AttributesBuilder>,
    /// Publishes sealed blocks.
    network: Arc<dyn Network>,
    /// The time source.
    clock: Arc<dyn Clock>,
    /// The current state.
    state: ProposerState,
    /// Whether proposing is enabled on this node at all.
    enabled: bool,
}

impl Proposer {
    /// Creates a new proposer.
    pub fn new(
        origin_selector: Box<dyn OriginSelector>,
        attributes_builder: Box<dyn AttributesBuilder>,
        network: Arc<dyn Network>,
        clock: Arc<dyn Clock>,
        enabled: bool,
        stopped: bool,
    ) -> Self {
        let state = if enabled && !stopped { ProposerState::Ready } else { ProposerState::Stopped };
        Self { origin_selector, attributes_builder, network, clock, state, enabled }
    }

    /// Returns the current state.
    pub const fn state(&self) -> &ProposerState {
        &self.state
    }

    /// Returns whether the proposer is actively producing blocks.
    pub const fn is_running(&self) -> bool {
        self.enabled && !matches!(self.state, ProposerState::Stopped)
    }

    /// Starts proposing on top of `unsafe_head`. The caller-supplied hash must
    /// name that head exactly.
    pub fn start(
        &mut self,
        block_hash: B256,
        unsafe_head: L2BlockInfo,
    ) -> Result<(), DriverAdminError> {
        if !self.enabled {
            return Err(DriverAdminError::ProposerNotEnabled);
        }
        if !matches!(self.state, ProposerState::Stopped) {
            return Err(DriverAdminError::ProposerAlreadyRunning);
        }
        if block_hash != unsafe_head.block_info.hash {
            return Err(DriverAdminError::HeadMismatch {
                expected: unsafe_head.block_info.hash,
                got: block_hash,
            });
        }
        info!(target: "proposer", %block_hash, "Proposer started");
        self.state = ProposerState::Ready;
        Ok(())
    }

    /// Stops proposing, abandoning any in-flight build. Returns the hash of
    /// the last unsafe head.
    pub fn stop(&mut self, unsafe_head: L2BlockInfo) -> Result<B256, DriverAdminError> {
        if matches!(self.state, ProposerState::Stopped) {
            return Err(DriverAdminError::ProposerNotRunning);
        }
        info!(target: "proposer", head = %unsafe_head.block_info.hash, "Proposer stopped");
        self.state = ProposerState::Stopped;
        Ok(unsafe_head.block_info.hash)
    }

    /// Returns the delay until the next scheduler tick.
    pub fn plan_next_action(&self, unsafe_head: L2BlockInfo) -> Duration {
        let now = self.clock.now();
        match &self.state {
            ProposerState::Stopped => Duration::from_secs(3600),
            // Building starts right after the parent's timestamp, leaving the
            // engine a full block time to assemble the block.
            ProposerState::Ready => {
                Duration::from_secs(unsafe_head.block_info.timestamp.saturating_sub(now))
            }
            ProposerState::Building(job) => {
                Duration::from_secs(job.deadline.saturating_sub(now))
            }
            ProposerState::Sealing => Duration::ZERO,
        }
    }

    /// Runs the next scheduled action against the engine.
    pub async fn run_next_action<E: EngineApi>(
        &mut self,
        engine: &mut Engine<E>,
    ) -> Result<(), ProposerError> {
        match self.state.clone() {
            ProposerState::Stopped => Ok(()),
            ProposerState::Ready => self.start_building(engine).await,
            ProposerState::Building(job) => {
                if self.clock.now() < job.deadline {
                    return Ok(());
                }
                self.seal(engine, job).await
            }
            // Sealing is transient within `seal`; a tick observing it is a
            // leftover after an error path and simply re-arms.
            ProposerState::Sealing => {
                self.state = ProposerState::Ready;
                Ok(())
            }
        }
    }

    async fn start_building<E: EngineApi>(
        &mut self,
        engine: &mut Engine<E>,
    ) -> Result<(), ProposerError> {
        let unsafe_head = engine.sync_state().unsafe_head();

        let origin = match self.origin_selector.next_l1_origin(unsafe_head).await {
            Ok(origin) => origin,
            Err(OriginSelectorError::ReorgedOrigin(_)) => return Err(ProposerError::ResetRequired),
            Err(err) => {
                warn!(target: "proposer", %err, "Could not select the next L1 origin, retrying next tick");
                return Ok(());
            }
        };

        // The chosen origin must connect to the chain being extended.
        if unsafe_head.l1_origin.hash != origin.hash
            && unsafe_head.l1_origin.hash != origin.parent_hash
        {
            warn!(
                target: "proposer",
                origin = %origin,
                head_origin = %unsafe_head.l1_origin.hash,
                "Cannot build on inconsistent L1 origin, requesting reset"
            );
            return Err(ProposerError::ResetRequired);
        }

        let attributes = match self
            .attributes_builder
            .prepare_payload_attributes(unsafe_head, origin.id())
            .await
        {
            Ok(attributes) => attributes,
            Err(PipelineErrorKind::Temporary(err)) => {
                warn!(target: "proposer", %err, "Attributes builder failed temporarily");
                return Ok(());
            }
            Err(PipelineErrorKind::Reset(_)) => return Err(ProposerError::ResetRequired),
            Err(err) => return Err(ProposerError::Pipeline(err)),
        };

        let attributes = KanvasAttributesWithParent::new(attributes, unsafe_head);
        let deadline = attributes.inner.timestamp();

        match engine.start_build(&attributes).await {
            Ok(payload_id) => {
                info!(
                    target: "proposer",
                    parent = unsafe_head.block_info.number,
                    l1_origin = origin.number,
                    "Started proposing new block"
                );
                self.state =
                    ProposerState::Building(BuildingBlock { payload_id, parent: unsafe_head, deadline });
                Ok(())
            }
            Err(err) => self.handle_engine_error(err),
        }
    }

    async fn seal<E: EngineApi>(
        &mut self,
        engine: &mut Engine<E>,
        job: BuildingBlock,
    ) -> Result<(), ProposerError> {
        self.state = ProposerState::Sealing;

        let (payload, new_ref) = match engine.seal_build(job.payload_id).await {
            Ok(sealed) => sealed,
            Err(err) => {
                self.state = ProposerState::Ready;
                return self.handle_engine_error(err);
            }
        };

        info!(
            target: "proposer",
            number = new_ref.block_info.number,
            hash = %new_ref.block_info.hash,
            "Sealed new unsafe block"
        );
        kanvas_macros::inc!(counter, Metrics::PROPOSER_BUILT_BLOCKS);

        if let Err(err) = self.network.publish_l2_payload(payload).await {
            // Publishing failures do not stall block production; the block is
            // already canonical locally.
            warn!(target: "proposer", %err, "Failed to publish sealed block");
            kanvas_macros::inc!(counter, Metrics::PROPOSER_PUBLISHING_ERRORS);
        }

        self.state = ProposerState::Ready;
        Ok(())
    }

    fn handle_engine_error(&mut self, err: EngineTaskError) -> Result<(), ProposerError> {
        match err.severity() {
            EngineTaskErrorSeverity::Temporary => {
                warn!(target: "proposer", %err, "Engine error, retrying next tick");
                Ok(())
            }
            EngineTaskErrorSeverity::Reset => Err(ProposerError::ResetRequired),
            EngineTaskErrorSeverity::Critical => Err(ProposerError::Engine(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kanvas_derive::{test_utils::TestAttributesBuilder, PipelineResult};
    use kanvas_engine::test_utils::{test_engine_setup, TestEngineApi};
    use kanvas_gossip::test_utils::TestNetwork;
    use kanvas_protocol::{BlockInfo, KanvasPayloadAttributes};

    #[derive(Debug, Clone, Copy, Default)]
    struct TestClock(u64);

    impl Clock for TestClock {
        fn now(&self) -> u64 {
            self.0
        }
    }

    #[derive(Debug)]
    struct FixedOriginSelector(BlockInfo);

    #[async_trait]
    impl OriginSelector for FixedOriginSelector {
        async fn next_l1_origin(
            &mut self,
            _: L2BlockInfo,
        ) -> Result<BlockInfo, OriginSelectorError> {
            Ok(self.0)
        }
    }

    fn test_proposer(
        attrs: Vec<PipelineResult<KanvasPayloadAttributes>>,
        network: Arc<TestNetwork>,
        now: u64,
        stopped: bool,
    ) -> Proposer {
        let (_, _, test_attrs, _) = test_engine_setup();
        // The origin the fixture parent block sits on.
        let origin = BlockInfo {
            hash: test_attrs.parent.l1_origin.hash,
            number: test_attrs.parent.l1_origin.number,
            parent_hash: alloy_primitives::B256::with_last_byte(0x43),
            timestamp: 8,
        };
        Proposer::new(
            Box::new(FixedOriginSelector(origin)),
            Box::new(TestAttributesBuilder::new(attrs)),
            network,
            Arc::new(TestClock(now)),
            true,
            stopped,
        )
    }

    #[tokio::test]
    async fn test_full_block_production_cycle() {
        let (_, state0, attrs, payload) = test_engine_setup();
        let network = Arc::new(TestNetwork::default());
        let mut proposer =
            test_proposer(vec![Ok(attrs.inner.clone())], network.clone(), 100, false);

        let client = Arc::new(TestEngineApi::with_payload(payload));
        let (cfg, ..) = test_engine_setup();
        let mut engine = Engine::new(client, cfg);
        engine.reset(
            state0.sync_state.unsafe_head(),
            state0.sync_state.safe_head(),
            state0.sync_state.finalized_head(),
        )
        .await
        .unwrap();

        // Ready -> Building.
        proposer.run_next_action(&mut engine).await.unwrap();
        assert!(matches!(proposer.state(), ProposerState::Building(_)));

        // Building -> sealed -> published -> Ready.
        proposer.run_next_action(&mut engine).await.unwrap();
        assert!(matches!(proposer.state(), ProposerState::Ready));
        assert_eq!(network.published_count(), 1);
        assert_eq!(engine.sync_state().unsafe_head().block_info.number, 11);
    }

    #[tokio::test]
    async fn test_publish_failure_recorded_not_fatal() {
        let (_, state0, attrs, payload) = test_engine_setup();
        let network = Arc::new(TestNetwork::failing());
        let mut proposer =
            test_proposer(vec![Ok(attrs.inner.clone())], network.clone(), 100, false);

        let client = Arc::new(TestEngineApi::with_payload(payload));
        let (cfg, ..) = test_engine_setup();
        let mut engine = Engine::new(client, cfg);
        engine.reset(
            state0.sync_state.unsafe_head(),
            state0.sync_state.safe_head(),
            state0.sync_state.finalized_head(),
        )
        .await
        .unwrap();

        proposer.run_next_action(&mut engine).await.unwrap();
        proposer.run_next_action(&mut engine).await.unwrap();

        // The block exists locally even though publishing failed.
        assert!(matches!(proposer.state(), ProposerState::Ready));
        assert_eq!(engine.sync_state().unsafe_head().block_info.number, 11);
    }

    #[tokio::test]
    async fn test_start_requires_matching_head() {
        let (_, state0, ..) = test_engine_setup();
        let head = state0.sync_state.unsafe_head();
        let mut proposer = test_proposer(vec![], Arc::new(TestNetwork::default()), 0, true);

        let err = proposer.start(alloy_primitives::B256::with_last_byte(0x99), head).unwrap_err();
        assert!(matches!(err, DriverAdminError::HeadMismatch { .. }));

        proposer.start(head.block_info.hash, head).unwrap();
        assert!(proposer.is_running());
        assert!(matches!(
            proposer.start(head.block_info.hash, head).unwrap_err(),
            DriverAdminError::ProposerAlreadyRunning
        ));
    }

    #[tokio::test]
    async fn test_stop_returns_head_hash_and_halts() {
        let (_, state0, ..) = test_engine_setup();
        let head = state0.sync_state.unsafe_head();
        let mut proposer = test_proposer(vec![], Arc::new(TestNetwork::default()), 0, false);

        assert_eq!(proposer.stop(head).unwrap(), head.block_info.hash);
        assert!(!proposer.is_running());
        assert!(matches!(proposer.stop(head).unwrap_err(), DriverAdminError::ProposerNotRunning));
    }

    #[tokio::test]
    async fn test_plan_waits_for_deadline_while_building() {
        let (_, state0, attrs, payload) = test_engine_setup();
        let head = state0.sync_state.unsafe_head();
        let mut proposer =
            test_proposer(vec![Ok(attrs.inner.clone())], Arc::new(TestNetwork::default()), 20, false);

        let client = Arc::new(TestEngineApi::with_payload(payload));
        let (cfg, ..) = test_engine_setup();
        let mut engine = Engine::new(client, cfg);
        engine.reset(head, head, head).await.unwrap();

        // Ready at the parent's timestamp: act immediately.
        assert_eq!(proposer.plan_next_action(head), Duration::ZERO);
        proposer.run_next_action(&mut engine).await.unwrap();

        // Building: wait until the block's timestamp (22).
        assert_eq!(proposer.plan_next_action(head), Duration::from_secs(2));
    }
}
