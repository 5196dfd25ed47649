//! Stage — The core enum defining all signals toward presentation
//!
//! A Stage is NOT an animation request. Animation requests go through the
//! engine's presentation trait and come back as completion signals.
//! A Stage is the SEMANTIC MEANING of a moment in the game flow.

use serde::{Deserialize, Serialize};

use crate::taxonomy::{AutoplayStopReason, Cell, SpinKind, WinTier};

/// Canonical game stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    // ═══════════════════════════════════════════════════════════════════════
    // SPIN LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════
    /// Spin accepted, grid populated
    SpinStart {
        /// How the spin was paid for
        kind: SpinKind,
        /// Base bet
        bet: f64,
        /// Amount actually debited (0 for free spins)
        #[serde(default)]
        cost: f64,
        /// Populated grid, column-major (columns × rows, top to bottom)
        grid: Vec<Vec<u32>>,
    },

    /// Spin finished resolving; final win known
    SpinSettled {
        /// Total win for this spin
        total_win: f64,
        /// Win-to-bet ratio
        #[serde(default)]
        win_ratio: f64,
        /// Celebration tier (an overlay follows when set)
        #[serde(default)]
        tier: Option<WinTier>,
    },

    /// Spin could not run and the engine returned to idle
    SpinAborted {
        /// Short reason for observability
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // TUMBLE
    // ═══════════════════════════════════════════════════════════════════════
    /// One tumble: cluster removed, columns dropped, gaps refilled
    TumbleStep {
        /// Step number within this spin (0-based)
        step_index: u32,
        /// Winning symbol
        symbol_id: u32,
        /// Cells removed this step
        removed: Vec<Cell>,
        /// Cells holding freshly generated symbols after the drop
        added: Vec<Cell>,
        /// Win contributed by this step
        step_win: f64,
        /// Running win for the spin so far
        running_win: f64,
    },

    /// Bonus multiplier symbols applied to the tumble sequence win
    MultiplierApply {
        /// Sum of multiplier values on the grid
        multiplier: u32,
        /// Sequence win before the multiplier
        base_win: f64,
        /// Sequence win after the multiplier
        total_win: f64,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // WIN PRESENTATION
    // ═══════════════════════════════════════════════════════════════════════
    /// Win overlay requested
    WinOverlayShown {
        total_win: f64,
        /// Win-to-bet ratio
        multiplier: f64,
        tier: WinTier,
    },

    /// Win overlay dismissed
    WinOverlayClosed,

    // ═══════════════════════════════════════════════════════════════════════
    // BONUS ROUND
    // ═══════════════════════════════════════════════════════════════════════
    /// Base game transitioned into the bonus round
    BonusEntered {
        /// Free spins awarded on entry
        free_spins: u32,
        /// Scatters that triggered the entry
        #[serde(default)]
        scatter_count: u8,
    },

    /// Retrigger inside the bonus round
    FreeSpinsAwarded {
        /// Spins added
        added: u32,
        /// Remaining after the award
        remaining: u32,
    },

    /// Initial scatter award credited on the first free spin
    ScatterAwardCredited { amount: f64 },

    /// Bonus round finished
    BonusEnded {
        /// Total win accumulated inside the bonus round
        #[serde(default)]
        bonus_win: f64,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // AUTOPLAY
    // ═══════════════════════════════════════════════════════════════════════
    /// Autoplay session opened
    AutoplayStart {
        remaining: u32,
        /// Session drives bonus free spins
        #[serde(default)]
        free_spins: bool,
    },

    /// Autoplay issued a spin
    AutoplaySpin {
        /// Remaining after this spin
        remaining: u32,
    },

    /// Autoplay session closed
    AutoplayStop {
        reason: AutoplayStopReason,
        /// Spins issued by the session
        #[serde(default)]
        spins_played: u32,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // NOTICES
    // ═══════════════════════════════════════════════════════════════════════
    /// Blocking notice: balance cannot cover the requested action
    InsufficientBalance { required: f64, available: f64 },
}

/// Stage category for grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCategory {
    SpinLifecycle,
    Tumble,
    WinPresentation,
    Bonus,
    Autoplay,
    Notice,
}

impl Stage {
    /// Get the category of this stage
    pub fn category(&self) -> StageCategory {
        match self {
            Stage::SpinStart { .. } | Stage::SpinSettled { .. } | Stage::SpinAborted { .. } => {
                StageCategory::SpinLifecycle
            }

            Stage::TumbleStep { .. } | Stage::MultiplierApply { .. } => StageCategory::Tumble,

            Stage::WinOverlayShown { .. } | Stage::WinOverlayClosed => {
                StageCategory::WinPresentation
            }

            Stage::BonusEntered { .. }
            | Stage::FreeSpinsAwarded { .. }
            | Stage::ScatterAwardCredited { .. }
            | Stage::BonusEnded { .. } => StageCategory::Bonus,

            Stage::AutoplayStart { .. } | Stage::AutoplaySpin { .. } | Stage::AutoplayStop { .. } => {
                StageCategory::Autoplay
            }

            Stage::InsufficientBalance { .. } => StageCategory::Notice,
        }
    }

    /// Get stage type name (for routing and trace queries)
    pub fn type_name(&self) -> &'static str {
        match self {
            Stage::SpinStart { .. } => "spin_start",
            Stage::SpinSettled { .. } => "spin_settled",
            Stage::SpinAborted { .. } => "spin_aborted",
            Stage::TumbleStep { .. } => "tumble_step",
            Stage::MultiplierApply { .. } => "multiplier_apply",
            Stage::WinOverlayShown { .. } => "win_overlay_shown",
            Stage::WinOverlayClosed => "win_overlay_closed",
            Stage::BonusEntered { .. } => "bonus_entered",
            Stage::FreeSpinsAwarded { .. } => "free_spins_awarded",
            Stage::ScatterAwardCredited { .. } => "scatter_award_credited",
            Stage::BonusEnded { .. } => "bonus_ended",
            Stage::AutoplayStart { .. } => "autoplay_start",
            Stage::AutoplaySpin { .. } => "autoplay_spin",
            Stage::AutoplayStop { .. } => "autoplay_stop",
            Stage::InsufficientBalance { .. } => "insufficient_balance",
        }
    }

    /// Stages after which presentation is expected to be quiet
    /// (no spin, tumble or overlay in flight)
    pub fn ends_round(&self) -> bool {
        matches!(
            self,
            Stage::SpinSettled { tier: None, .. } | Stage::WinOverlayClosed | Stage::SpinAborted { .. }
        )
    }
}

impl StageCategory {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SpinLifecycle => "Spin Lifecycle",
            Self::Tumble => "Tumble",
            Self::WinPresentation => "Win Presentation",
            Self::Bonus => "Bonus Round",
            Self::Autoplay => "Autoplay",
            Self::Notice => "Notice",
        }
    }
}
