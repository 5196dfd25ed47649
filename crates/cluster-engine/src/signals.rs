//! Outbound stage channel
//!
//! Each orchestrator and scheduler owns its own bus. A receiver is a
//! subscription; dropping it unsubscribes.

use cluster_stage::{Stage, StageEvent};
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Buffered events per subscriber before the slowest one lags
pub const BUS_CAPACITY: usize = 256;

/// Typed broadcast channel of stage events
#[derive(Debug)]
pub struct StageBus {
    tx: broadcast::Sender<StageEvent>,
    origin: Instant,
}

impl StageBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            tx,
            origin: Instant::now(),
        }
    }

    /// Publish a stage. Having no subscribers is not an error.
    pub fn emit(&self, stage: Stage, spin_index: u64) {
        let timestamp_ms = self.origin.elapsed().as_secs_f64() * 1000.0;
        log::trace!("[Signals] {} (spin {})", stage.type_name(), spin_index);
        let _ = self.tx.send(StageEvent::new(stage, spin_index, timestamp_ms));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for StageBus {
    fn default() -> Self {
        Self::new()
    }
}
