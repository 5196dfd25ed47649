//! Stage Taxonomy — Enums for game elements
//!
//! These types classify the things stages talk about: grid cells,
//! celebration tiers, spin kinds, scenes and autoplay outcomes.

use serde::{Deserialize, Serialize};

/// A grid coordinate. Row 0 is the top row, column 0 the leftmost column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub column: usize,
}

impl Cell {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

/// Win celebration tier
///
/// Tiers are based on win-to-bet ratio; the thresholds themselves are
/// configured by the engine:
/// - Big: default 10x+
/// - Mega: default 25x+
/// - Epic: default 50x+
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinTier {
    Big,
    Mega,
    Epic,
}

impl WinTier {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Big => "BIG WIN",
            Self::Mega => "MEGA WIN",
            Self::Epic => "EPIC WIN",
        }
    }
}

/// How a spin was paid for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinKind {
    /// Regular paid spin at the base bet
    Standard,
    /// Paid spin at the enhanced (ante) price
    EnhancedBet,
    /// Direct purchase of bonus entry
    FeatureBuy,
    /// Free spin inside the bonus round (no debit)
    Free,
}

impl SpinKind {
    /// Free spins skip the balance debit
    pub fn is_paid(&self) -> bool {
        !matches!(self, Self::Free)
    }
}

/// Background/music scene requested from presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scene {
    Base,
    Bonus,
}

/// Why an autoplay session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoplayStopReason {
    /// Explicit stop call
    Stopped,
    /// Remaining spin count reached zero
    Exhausted,
    /// Not enough balance for the next paid spin
    InsufficientBalance,
    /// Free spins ran out with no retrigger
    FreeSpinsEnded,
    /// Orchestrator signal channel closed
    Disconnected,
}

impl AutoplayStopReason {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Exhausted => "Completed",
            Self::InsufficientBalance => "Insufficient balance",
            Self::FreeSpinsEnded => "Free spins ended",
            Self::Disconnected => "Disconnected",
        }
    }
}
