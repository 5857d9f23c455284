//! The attributes queue stage.

use crate::{
    AttributesBuilder, AttributesProvider, NextAttributes, OriginAdvancer, OriginProvider,
    PipelineError, PipelineResult, Signal, SignalReceiver,
};
use async_trait::async_trait;
use kanvas_protocol::{BlockInfo, KanvasAttributesWithParent, L2BlockInfo, SingleBatch};

/// Combines validated batches with builder output to produce the full payload
/// attributes of derived blocks.
#[derive(Debug)]
pub struct AttributesQueue<P, AB>
where
    P: AttributesProvider + OriginAdvancer,
    AB: AttributesBuilder,
{
    /// The previous stage.
    pub prev: P,
    /// The attributes builder.
    pub builder: AB,
    /// A batch held across failed build attempts, so a temporary builder error
    /// does not lose it.
    batch: Option<SingleBatch>,
}

impl<P, AB> AttributesQueue<P, AB>
where
    P: AttributesProvider + OriginAdvancer,
    AB: AttributesBuilder,
{
    /// Creates a new attributes queue.
    pub const fn new(prev: P, builder: AB) -> Self {
        Self { prev, builder, batch: None }
    }
}

#[async_trait]
impl<P, AB> NextAttributes for AttributesQueue<P, AB>
where
    P: AttributesProvider + OriginAdvancer + Send,
    AB: AttributesBuilder + Send,
{
    async fn next_attributes(
        &mut self,
        parent: L2BlockInfo,
    ) -> PipelineResult<KanvasAttributesWithParent> {
        let batch = match self.batch.take() {
            Some(batch) => batch,
            None => self.prev.next_batch(parent).await?,
        };

        let mut attrs =
            match self.builder.prepare_payload_attributes(parent, batch.epoch()).await {
                Ok(attrs) => attrs,
                Err(err) => {
                    // Hold the batch for the retry.
                    self.batch = Some(batch);
                    return Err(err);
                }
            };

        if attrs.timestamp() != batch.timestamp {
            return Err(PipelineError::AttributesTimestampMismatch(
                attrs.timestamp(),
                batch.timestamp,
            )
            .crit());
        }

        // Derived blocks never read from the tx pool; the batch transactions
        // follow the deposits the builder placed first.
        let mut txs = attrs.transactions.take().unwrap_or_default();
        txs.extend(batch.transactions);
        attrs.transactions = Some(txs);
        attrs.no_tx_pool = Some(true);

        info!(
            target: "attributes_queue",
            number = parent.block_info.number + 1,
            timestamp = attrs.timestamp(),
            "Generated attributes for derived block"
        );

        Ok(KanvasAttributesWithParent::new(attrs, parent))
    }
}

impl<P, AB> OriginProvider for AttributesQueue<P, AB>
where
    P: AttributesProvider + OriginAdvancer,
    AB: AttributesBuilder,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P, AB> OriginAdvancer for AttributesQueue<P, AB>
where
    P: AttributesProvider + OriginAdvancer + Send,
    AB: AttributesBuilder + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

#[async_trait]
impl<P, AB> SignalReceiver for AttributesQueue<P, AB>
where
    P: AttributesProvider + OriginAdvancer + SignalReceiver + Send,
    AB: AttributesBuilder + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        self.batch = None;
        Ok(())
    }
}
