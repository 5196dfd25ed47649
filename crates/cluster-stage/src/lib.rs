//! # cluster-stage — Cluster-Pays Stage Vocabulary
//!
//! Defines the typed signals the game core emits toward presentation.
//! Presentation never sees engine internals, only STAGES.
//!
//! ## Philosophy
//!
//! Every round of a cluster-pays game passes through the same phases:
//! - Spin starts → Tumbles resolve → Spin settles → Bonus enters/ends
//!
//! This crate defines those phases plus a trace type for recording them.

pub mod event;
pub mod stage;
pub mod taxonomy;
pub mod trace;

pub use event::*;
pub use stage::*;
pub use taxonomy::*;
pub use trace::*;
