//! The driver event loop.

use crate::{
    L1Signal, L1State, Metrics, Proposer, ProposerError, UnsafePayloadQueue,
};
use futures::FutureExt;
use kanvas_derive::{
    ChainProvider, Pipeline, PipelineError, PipelineErrorKind, ResetError, ResetSignal,
    StepResult,
};
use kanvas_engine::{Engine, EngineApi, EngineTaskError, EngineTaskErrorSeverity};
use kanvas_genesis::RollupConfig;
use kanvas_protocol::{
    BlockInfo, KanvasAttributesWithParent, L2BlockInfo, PayloadEnvelope, SyncStatus,
};
use kanvas_rpc::DriverRpcRequest;
use kanvas_sources::{find_starting_forkchoice, L2SyncProvider, SourceProviderError};
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::{
    select,
    sync::{mpsc, watch},
};
use tokio_util::sync::CancellationToken;

/// How long the loop sleeps between derivation attempts while the pipeline is
/// idle (no new L1 data).
const IDLE_STEP_INTERVAL: Duration = Duration::from_secs(10);

/// Reset failures are expected while L1 is unstable; past this many
/// consecutive attempts they are escalated to error logs.
const QUIET_RESET_ATTEMPTS: u32 = 3;

/// The bound kept on the derived-block finality lookup.
const FINALITY_LOOKUP_LEN: usize = 1000;

/// Driver tuning knobs.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// The sleep between derivation attempts while idle.
    pub idle_step_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { idle_step_interval: IDLE_STEP_INTERVAL }
    }
}

/// A fatal driver error. Maps to the process exit code.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The engine failed fatally.
    #[error("critical engine error: {0}")]
    Engine(#[from] EngineTaskError),
    /// The pipeline failed fatally.
    #[error("critical pipeline error: {0}")]
    Pipeline(PipelineErrorKind),
    /// An input channel closed unexpectedly.
    #[error("driver input channel closed")]
    ChannelClosed,
    /// A driver step panicked.
    #[error("driver step panicked")]
    Panicked,
}

/// The channels feeding the driver loop.
#[derive(Debug)]
pub struct DriverChannels {
    /// L1 signals from the watcher.
    pub l1_signal_rx: mpsc::Receiver<L1Signal>,
    /// Validated unsafe payloads from gossip.
    pub unsafe_payload_rx: mpsc::Receiver<PayloadEnvelope>,
    /// Control and query requests from the RPC server.
    pub rpc_rx: mpsc::Receiver<DriverRpcRequest>,
    /// The live L1 head view handed to confirmation-depth readers.
    pub l1_head_tx: watch::Sender<Option<BlockInfo>>,
}

/// The rollup node driver: a single cooperative loop that owns every piece of
/// mutable node state and serializes all mutations.
///
/// At most one action runs at a time; derivation steps and proposer actions
/// never interleave. All suspension points are engine or L1 RPC calls.
#[derive(Debug)]
pub struct Driver<P, E, L1P, L2P>
where
    P: Pipeline,
    E: EngineApi,
    L1P: ChainProvider<Error = SourceProviderError> + Send,
    L2P: L2SyncProvider + Send,
{
    /// The rollup config.
    cfg: Arc<RollupConfig>,
    /// Driver tuning.
    driver_cfg: DriverConfig,
    /// The derivation pipeline.
    pipeline: P,
    /// The engine controller.
    engine: Engine<E>,
    /// The proposer state machine.
    proposer: Proposer,
    /// The L1 provider used for reset and reorg checks.
    l1_provider: L1P,
    /// The L2 provider used for sync-start discovery and RPC block lookups.
    l2_provider: L2P,
    /// The L1 state tracker.
    l1_state: L1State,
    /// The buffered unsafe payloads.
    payloads: UnsafePayloadQueue,
    /// The input channels.
    channels: DriverChannels,
    /// The cancellation token, shared between all tasks.
    cancellation: CancellationToken,
    /// Attributes held across temporary engine failures.
    pending_attributes: Option<KanvasAttributesWithParent>,
    /// Whether the pipeline has exhausted the available L1 data.
    derivation_idle: bool,
    /// Whether a pipeline reset is pending.
    reset_requested: bool,
    /// Consecutive failed reset attempts.
    reset_attempts: u32,
    /// `(derived-from L1 number, L2 block)` pairs for finalization.
    finality_lookup: VecDeque<(u64, L2BlockInfo)>,
}

impl<P, E, L1P, L2P> Driver<P, E, L1P, L2P>
where
    P: Pipeline,
    E: EngineApi,
    L1P: ChainProvider<Error = SourceProviderError> + Send,
    L2P: L2SyncProvider + Send,
{
    /// Creates a new driver.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: Arc<RollupConfig>,
        driver_cfg: DriverConfig,
        pipeline: P,
        engine: Engine<E>,
        proposer: Proposer,
        l1_provider: L1P,
        l2_provider: L2P,
        channels: DriverChannels,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            driver_cfg,
            pipeline,
            engine,
            proposer,
            l1_provider,
            l2_provider,
            l1_state: L1State::default(),
            payloads: UnsafePayloadQueue::default(),
            channels,
            cancellation,
            pending_attributes: None,
            derivation_idle: false,
            reset_requested: true,
            reset_attempts: 0,
            finality_lookup: VecDeque::new(),
        }
    }

    /// Runs the loop until shutdown or a fatal error.
    pub async fn start(mut self) -> Result<(), DriverError> {
        info!(target: "driver", "Starting rollup node driver");

        loop {
            let derivation_delay = if self.derivation_idle {
                self.driver_cfg.idle_step_interval
            } else {
                Duration::ZERO
            };
            let proposer_delay =
                self.proposer.plan_next_action(self.engine.sync_state().unsafe_head());
            let proposer_active = self.proposer.is_running();

            select! {
                biased;

                _ = self.cancellation.cancelled() => {
                    info!(target: "driver", "Received shutdown signal. Exiting driver loop.");
                    return Ok(());
                }
                req = self.channels.rpc_rx.recv() => {
                    let req = req.ok_or(DriverError::ChannelClosed)?;
                    self.handle_rpc_request(req).await?;
                }
                signal = self.channels.l1_signal_rx.recv() => {
                    let signal = signal.ok_or(DriverError::ChannelClosed)?;
                    self.handle_l1_signal(signal).await?;
                }
                envelope = self.channels.unsafe_payload_rx.recv() => {
                    let envelope = envelope.ok_or(DriverError::ChannelClosed)?;
                    self.handle_unsafe_payload(envelope).await?;
                }
                _ = tokio::time::sleep(proposer_delay), if proposer_active => {
                    let result =
                        std::panic::AssertUnwindSafe(self.proposer_step()).catch_unwind().await;
                    Self::contain_panic(result)?;
                }
                _ = tokio::time::sleep(derivation_delay) => {
                    let result =
                        std::panic::AssertUnwindSafe(self.derivation_step()).catch_unwind().await;
                    Self::contain_panic(result)?;
                }
            }
        }
    }

    /// Surfaces a panic caught inside a step as a critical error instead of
    /// unwinding through the loop.
    fn contain_panic(
        result: Result<Result<(), DriverError>, Box<dyn std::any::Any + Send>>,
    ) -> Result<(), DriverError> {
        match result {
            Ok(result) => result,
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(target: "driver", %msg, "Driver step panicked");
                Err(DriverError::Panicked)
            }
        }
    }

    fn sync_status(&self) -> SyncStatus {
        let sync_state = self.engine.sync_state();
        SyncStatus {
            current_l1: self.pipeline.origin().unwrap_or_default(),
            head_l1: self.l1_state.l1_head().unwrap_or_default(),
            safe_l1: self.l1_state.l1_safe().unwrap_or_default(),
            finalized_l1: self.l1_state.l1_finalized().unwrap_or_default(),
            unsafe_l2: sync_state.unsafe_head(),
            safe_l2: sync_state.safe_head(),
            finalized_l2: sync_state.finalized_head(),
        }
    }

    async fn handle_rpc_request(&mut self, req: DriverRpcRequest) -> Result<(), DriverError> {
        match req {
            DriverRpcRequest::SyncStatus(tx) => {
                let _ = tx.send(self.sync_status());
            }
            DriverRpcRequest::BlockRefWithStatus { number, tx } => {
                let status = self.sync_status();
                let reply = if number > status.unsafe_l2.block_info.number {
                    None
                } else {
                    self.l2_provider
                        .l2_block_info_by_number(number)
                        .await
                        .ok()
                        .map(|block| (block, status))
                };
                let _ = tx.send(reply);
            }
            DriverRpcRequest::ResetPipeline(tx) => {
                self.reset_requested = true;
                self.reset().await?;
                let _ = tx.send(());
            }
            DriverRpcRequest::StartProposer { block_hash, tx } => {
                let head = self.engine.sync_state().unsafe_head();
                let _ = tx.send(self.proposer.start(block_hash, head));
            }
            DriverRpcRequest::StopProposer(tx) => {
                let head = self.engine.sync_state().unsafe_head();
                let _ = tx.send(self.proposer.stop(head));
            }
        }
        Ok(())
    }

    async fn handle_l1_signal(&mut self, signal: L1Signal) -> Result<(), DriverError> {
        match signal {
            L1Signal::Head(head) => {
                let previous = self.l1_state.handle_new_head_block(head);
                self.channels.l1_head_tx.send_replace(Some(head));
                self.derivation_idle = false;

                // A head that does not extend the previous one is a reorg; if
                // it cuts below the safe head's origin, derivation state is
                // invalid and must reset.
                if let Some(previous) = previous {
                    if head.parent_hash != previous.hash {
                        let depth = previous.number.saturating_sub(head.number) + 1;
                        info!(target: "driver", depth, "L1 reorg observed");
                        kanvas_macros::set!(gauge, Metrics::L1_REORG_DEPTH, depth as f64);
                        self.check_safe_origin_canonical().await;
                    }
                }
            }
            L1Signal::Safe(safe) => {
                self.l1_state.handle_new_safe_block(safe);
            }
            L1Signal::Finalized(finalized) => {
                if self.l1_state.handle_new_finalized_block(finalized) {
                    self.try_finalize(finalized).await?;
                }
            }
        }
        Ok(())
    }

    /// Verifies that the safe head's L1 origin is still canonical, requesting
    /// a reset if it is not.
    async fn check_safe_origin_canonical(&mut self) {
        let safe = self.engine.sync_state().safe_head();
        if safe.block_info.hash.is_zero() {
            return;
        }
        match self.l1_provider.block_info_by_number(safe.l1_origin.number).await {
            Ok(block) if block.hash == safe.l1_origin.hash => {}
            Ok(_) | Err(SourceProviderError::BlockNotFound(_)) => {
                warn!(
                    target: "driver",
                    origin = safe.l1_origin.number,
                    "Safe head L1 origin is no longer canonical, requesting reset"
                );
                self.reset_requested = true;
            }
            Err(err) => {
                warn!(target: "driver", %err, "Could not verify safe head origin");
            }
        }
    }

    /// Finalizes the highest L2 block derived from L1 data at or below the
    /// finalized L1 block.
    async fn try_finalize(&mut self, finalized_l1: BlockInfo) -> Result<(), DriverError> {
        let target = self
            .finality_lookup
            .iter()
            .rev()
            .find(|(l1_number, _)| *l1_number <= finalized_l1.number)
            .map(|(_, block)| *block);
        let Some(target) = target else { return Ok(()) };

        match self.engine.finalize(target).await {
            Ok(()) => {
                self.finality_lookup
                    .retain(|(_, block)| block.block_info.number > target.block_info.number);
                Ok(())
            }
            Err(err) => match err.severity() {
                EngineTaskErrorSeverity::Critical => Err(err.into()),
                _ => {
                    warn!(target: "driver", %err, "Failed to finalize, retrying on the next signal");
                    Ok(())
                }
            },
        }
    }

    async fn handle_unsafe_payload(
        &mut self,
        envelope: PayloadEnvelope,
    ) -> Result<(), DriverError> {
        let unsafe_head = self.engine.sync_state().unsafe_head();
        self.payloads.push(envelope, unsafe_head);
        self.drain_unsafe_payloads().await
    }

    /// Inserts buffered payloads while each directly extends the unsafe head.
    async fn drain_unsafe_payloads(&mut self) -> Result<(), DriverError> {
        loop {
            let unsafe_head = self.engine.sync_state().unsafe_head();
            let Some(envelope) = self.payloads.pop_next(unsafe_head) else { return Ok(()) };

            match self.engine.insert_unsafe_payload(envelope.clone()).await {
                Ok(new_head) => {
                    debug!(
                        target: "driver",
                        number = new_head.block_info.number,
                        "Applied gossiped unsafe payload"
                    );
                }
                Err(EngineTaskError::ParentMismatch { expected, got }) => {
                    // Same height, different history: drop the payload and let
                    // derivation settle the fork.
                    warn!(target: "driver", %expected, %got, "Dropping unsafe payload on mismatched parent");
                    return Ok(());
                }
                Err(err) => match err.severity() {
                    EngineTaskErrorSeverity::Critical => return Err(err.into()),
                    EngineTaskErrorSeverity::Reset => {
                        self.reset_requested = true;
                        return Ok(());
                    }
                    EngineTaskErrorSeverity::Temporary => {
                        // Re-buffer and retry on the next ingress or tick.
                        let head = self.engine.sync_state().unsafe_head();
                        self.payloads.push(envelope, head);
                        return Ok(());
                    }
                },
            }
        }
    }

    async fn proposer_step(&mut self) -> Result<(), DriverError> {
        match self.proposer.run_next_action(&mut self.engine).await {
            Ok(()) => Ok(()),
            Err(ProposerError::ResetRequired) => {
                self.reset_requested = true;
                Ok(())
            }
            Err(ProposerError::Engine(err)) => Err(err.into()),
            Err(ProposerError::Pipeline(err)) => Err(DriverError::Pipeline(err)),
        }
    }

    async fn derivation_step(&mut self) -> Result<(), DriverError> {
        if self.reset_requested {
            return self.reset().await;
        }

        // Apply attributes that are already prepared before stepping further.
        if let Some(attributes) =
            self.pending_attributes.take().or_else(|| self.pipeline.next())
        {
            return self.apply_attributes(attributes).await;
        }

        let safe_head = self.engine.sync_state().safe_head();
        match self.pipeline.step(safe_head).await {
            StepResult::PreparedAttributes | StepResult::AdvancedOrigin => {
                self.derivation_idle = false;
            }
            StepResult::OriginAdvanceErr(err) | StepResult::StepFailed(err) => match err {
                PipelineErrorKind::Temporary(PipelineError::NotEnoughData) => {
                    self.derivation_idle = false;
                }
                PipelineErrorKind::Temporary(_) => {
                    trace!(target: "driver", "Derivation exhausted available data, yielding");
                    self.derivation_idle = true;
                }
                PipelineErrorKind::Reset(reset) => {
                    if let ResetError::ReorgDetected(expected, got) = &reset {
                        warn!(target: "driver", %expected, %got, "L1 reorg detected by pipeline");
                    }
                    kanvas_macros::inc!(counter, Metrics::PIPELINE_RESETS);
                    self.reset_requested = true;
                }
                err @ PipelineErrorKind::Critical(_) => {
                    return Err(DriverError::Pipeline(err));
                }
            },
        }
        Ok(())
    }

    async fn apply_attributes(
        &mut self,
        attributes: KanvasAttributesWithParent,
    ) -> Result<(), DriverError> {
        let derived_from = self.pipeline.origin().map(|o| o.number).unwrap_or_default();
        match self.engine.process_derived_attributes(attributes.clone()).await {
            Ok(new_safe) => {
                self.finality_lookup.push_back((derived_from, new_safe));
                while self.finality_lookup.len() > FINALITY_LOOKUP_LEN {
                    self.finality_lookup.pop_front();
                }
                self.derivation_idle = false;
                Ok(())
            }
            Err(err) => match err.severity() {
                EngineTaskErrorSeverity::Temporary => {
                    self.pending_attributes = Some(attributes);
                    self.derivation_idle = true;
                    Ok(())
                }
                EngineTaskErrorSeverity::Reset => {
                    warn!(target: "driver", %err, "Engine rejected derived attributes, resetting");
                    self.reset_requested = true;
                    Ok(())
                }
                EngineTaskErrorSeverity::Critical => Err(err.into()),
            },
        }
    }

    /// The reset procedure: discover a starting forkchoice, re-point the
    /// engine, and re-open the pipeline at an origin a channel window behind
    /// the safe head.
    async fn reset(&mut self) -> Result<(), DriverError> {
        self.pending_attributes = None;

        let start = match find_starting_forkchoice(
            &self.cfg,
            &mut self.l1_provider,
            &mut self.l2_provider,
        )
        .await
        {
            Ok(start) => start,
            Err(err) => {
                self.note_reset_failure(&err.to_string());
                return Ok(());
            }
        };

        if let Err(err) = self.engine.reset(start.un_safe, start.safe, start.finalized).await {
            if err.severity() == EngineTaskErrorSeverity::Critical {
                return Err(err.into());
            }
            self.note_reset_failure(&err.to_string());
            return Ok(());
        }

        // Re-open the pipeline a full channel window behind the safe head's
        // origin, so in-flight channels can be rebuilt.
        let origin_number = start
            .safe
            .l1_origin
            .number
            .saturating_sub(self.cfg.channel_timeout)
            .max(self.cfg.genesis.l1.number);
        let origin = match self.l1_provider.block_info_by_number(origin_number).await {
            Ok(origin) => origin,
            Err(err) => {
                self.note_reset_failure(&err.to_string());
                return Ok(());
            }
        };

        if let Err(err) = self
            .pipeline
            .signal(ResetSignal { l2_safe_head: start.safe, l1_origin: origin }.signal())
            .await
        {
            if matches!(err, PipelineErrorKind::Critical(_)) {
                return Err(DriverError::Pipeline(err));
            }
            self.note_reset_failure("pipeline rejected reset signal");
            return Ok(());
        }

        info!(
            target: "driver",
            l1_origin = origin.number,
            safe = start.safe.block_info.number,
            "Derivation pipeline reset"
        );
        self.finality_lookup.clear();
        self.reset_requested = false;
        self.reset_attempts = 0;
        self.derivation_idle = false;
        Ok(())
    }

    fn note_reset_failure(&mut self, reason: &str) {
        self.reset_attempts += 1;
        self.reset_requested = true;
        // Back off to the idle cadence instead of spinning against a failing
        // provider.
        self.derivation_idle = true;
        if self.reset_attempts > QUIET_RESET_ATTEMPTS {
            error!(target: "driver", attempts = self.reset_attempts, reason, "Pipeline reset keeps failing");
        } else {
            debug!(target: "driver", reason, "Pipeline reset attempt failed, will retry");
        }
    }
}
