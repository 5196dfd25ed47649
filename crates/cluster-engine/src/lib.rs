//! # cluster-engine — Cluster-Pays Slot Core
//!
//! Owns the symbol grid, detects winning clusters, resolves tumble
//! sequences, drives scatter-triggered bonus rounds and schedules
//! autoplay. Animation and wallet concerns are collaborators behind
//! traits; the engine requests an animation and awaits its completion
//! signal.
//!
//! ## Features
//!
//! - **Cluster pays**: a symbol wins by total count anywhere on the grid
//! - **Tumbles**: remove, drop, refill, re-evaluate, with a step ceiling
//! - **Bonus round**: scatter entry, retriggers, multiplier symbols
//! - **Spin modes**: standard, enhanced bet, feature buy
//! - **Autoplay**: event-driven readiness with timeout resync
//! - **Stage events**: typed broadcast channels per component
//!
//! ## Architecture
//!
//! ```text
//! AutoplayScheduler
//!     │
//!     v
//! SpinOrchestrator ──► AccountService / Presentation
//!     │
//!     ├── SymbolGenerator (populate, scatters, multipliers)
//!     ├── CascadeResolver ⇄ MatchDetector (tumble loop)
//!     ├── BonusRound (BASE ⇄ BONUS, free-spin counter)
//!     └── WinAccumulator
//!           │
//!           v
//!     StageBus → StageEvent
//! ```

pub mod account;
pub mod accumulator;
pub mod autoplay;
pub mod bonus;
pub mod cascade;
pub mod config;
pub mod context;
pub mod detector;
pub mod generator;
pub mod grid;
pub mod orchestrator;
pub mod paytable;
pub mod presentation;
pub mod signals;
pub mod stats;
pub mod symbols;
pub mod timing;

pub use account::*;
pub use accumulator::*;
pub use autoplay::*;
pub use bonus::*;
pub use cascade::*;
pub use config::*;
pub use context::*;
pub use detector::*;
pub use generator::*;
pub use grid::*;
pub use orchestrator::*;
pub use paytable::*;
pub use presentation::*;
pub use signals::*;
pub use stats::*;
pub use symbols::*;
pub use timing::*;

pub use cluster_stage;
