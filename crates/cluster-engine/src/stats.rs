//! Session statistics

use serde::{Deserialize, Serialize};

/// Running totals for one orchestrator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_spins: u64,
    pub paid_spins: u64,
    pub free_spins_played: u64,
    pub total_staked: f64,
    pub total_won: f64,
    /// Spins with a non-zero win
    pub hits: u64,
    pub bonus_triggers: u64,
    pub retriggers: u64,
    pub max_win_ratio: f64,
    pub longest_tumble_chain: u32,
    /// Spins stopped by the tumble safety ceiling
    pub tumble_ceiling_hits: u64,
}

impl SessionStats {
    /// Return to player, percent
    pub fn rtp(&self) -> f64 {
        if self.total_staked > 0.0 {
            (self.total_won / self.total_staked) * 100.0
        } else {
            0.0
        }
    }

    /// Winning spins, percent
    pub fn hit_rate(&self) -> f64 {
        if self.total_spins > 0 {
            (self.hits as f64 / self.total_spins as f64) * 100.0
        } else {
            0.0
        }
    }

    pub(crate) fn record(&mut self, record: SpinRecord) {
        self.total_spins += 1;
        if record.cost > 0.0 {
            self.paid_spins += 1;
            self.total_staked += record.cost;
        } else {
            self.free_spins_played += 1;
        }
        self.total_won += record.win;
        if record.win > 0.0 {
            self.hits += 1;
        }
        if record.win_ratio > self.max_win_ratio {
            self.max_win_ratio = record.win_ratio;
        }
        self.longest_tumble_chain = self.longest_tumble_chain.max(record.tumble_steps);
        if record.hit_ceiling {
            self.tumble_ceiling_hits += 1;
        }
    }
}

/// What one settled spin contributes
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SpinRecord {
    pub cost: f64,
    pub win: f64,
    pub win_ratio: f64,
    pub tumble_steps: u32,
    pub hit_ceiling: bool,
}
