//! StageEvent — A stage occurrence with metadata
//!
//! Wraps a Stage with the spin it belongs to and its time offset.

use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// A stage event with full metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    /// The canonical stage
    pub stage: Stage,

    /// Spin counter at emission (0 before the first spin)
    pub spin_index: u64,

    /// Milliseconds since the emitting engine was created
    pub timestamp_ms: f64,
}

impl StageEvent {
    /// Create a new stage event
    pub fn new(stage: Stage, spin_index: u64, timestamp_ms: f64) -> Self {
        Self {
            stage,
            spin_index,
            timestamp_ms,
        }
    }

    /// Get stage type name
    pub fn type_name(&self) -> &'static str {
        self.stage.type_name()
    }
}
