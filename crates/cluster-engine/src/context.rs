//! Spin mode and the per-session spin context

use cluster_stage::SpinKind;
use serde::{Deserialize, Serialize};

use crate::config::ScatterPlacement;

/// How the player asked to spin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinMode {
    #[default]
    Standard,
    /// Higher stake, doubled scatter chance
    EnhancedBet,
    /// Buy bonus entry directly
    FeatureBuy,
}

impl SpinMode {
    /// Paid kind for this mode in the base game
    pub fn paid_kind(&self) -> SpinKind {
        match self {
            Self::Standard => SpinKind::Standard,
            Self::EnhancedBet => SpinKind::EnhancedBet,
            Self::FeatureBuy => SpinKind::FeatureBuy,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().replace('-', "_").as_str() {
            "standard" | "base" => Some(Self::Standard),
            "enhanced_bet" | "enhanced" | "ante" => Some(Self::EnhancedBet),
            "feature_buy" | "buy" => Some(Self::FeatureBuy),
            _ => None,
        }
    }
}

/// Read-only view of the session's spin state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinContext {
    /// Base bet
    pub bet: f64,
    /// Last spin was a feature buy
    pub feature_buy: bool,
    /// Last spin used the enhanced bet
    pub enhanced_bet: bool,
    pub is_bonus_round: bool,
    /// Free spins remaining
    pub free_spins: u32,
    pub turbo: bool,
    /// A spin is in flight (overlay included)
    pub is_spinning: bool,
    /// Scatter placement used by the last spin
    pub min_scatter: usize,
    pub max_scatter: usize,
    pub scatter_chance: f64,
}

impl SpinContext {
    pub fn new(bet: f64, placement: ScatterPlacement) -> Self {
        Self {
            bet,
            feature_buy: false,
            enhanced_bet: false,
            is_bonus_round: false,
            free_spins: 0,
            turbo: false,
            is_spinning: false,
            min_scatter: placement.min_scatter,
            max_scatter: placement.max_scatter,
            scatter_chance: placement.scatter_chance,
        }
    }

    /// Record the mode and placement a spin started with
    pub fn begin(&mut self, kind: SpinKind, placement: ScatterPlacement) {
        self.feature_buy = kind == SpinKind::FeatureBuy;
        self.enhanced_bet = kind == SpinKind::EnhancedBet;
        self.min_scatter = placement.min_scatter;
        self.max_scatter = placement.max_scatter;
        self.scatter_chance = placement.scatter_chance;
    }
}
