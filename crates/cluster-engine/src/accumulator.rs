//! Win Accumulator — running win bookkeeping
//!
//! Four nested scopes:
//! - `sequence_win`: the current tumble sequence (multipliers apply here)
//! - `spin_win`: everything credited to the current spin
//! - `bonus_win`: the current bonus round, reset on entry
//! - `session_win`: everything since construction

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WinAccumulator {
    spin_win: f64,
    sequence_win: f64,
    bonus_win: f64,
    session_win: f64,
}

impl WinAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the per-spin scopes
    pub fn begin_spin(&mut self) {
        self.spin_win = 0.0;
        self.sequence_win = 0.0;
    }

    /// Add one tumble step's win. Returns the running spin win.
    pub fn add_tumble(&mut self, win: f64) -> f64 {
        self.sequence_win += win;
        self.spin_win += win;
        self.spin_win
    }

    /// Multiply the tumble sequence win. Returns the sequence win after
    /// the multiplier; zero sequences and a multiplier of 1 are no-ops.
    pub fn apply_sequence_multiplier(&mut self, multiplier: u32) -> f64 {
        if self.sequence_win > 0.0 && multiplier > 1 {
            let boosted = self.sequence_win * multiplier as f64;
            self.spin_win += boosted - self.sequence_win;
            self.sequence_win = boosted;
        }
        self.sequence_win
    }

    /// Add a non-tumble award (scatter pay, initial bonus award)
    pub fn add_award(&mut self, amount: f64) -> f64 {
        self.spin_win += amount;
        self.spin_win
    }

    /// Close the spin. Bonus spins also feed the bonus scope.
    /// Returns the spin total.
    pub fn settle(&mut self, in_bonus: bool) -> f64 {
        if in_bonus {
            self.bonus_win += self.spin_win;
        }
        self.session_win += self.spin_win;
        self.spin_win
    }

    /// Zero the bonus scope (bonus entry)
    pub fn reset_bonus(&mut self) {
        self.bonus_win = 0.0;
    }

    pub fn spin_win(&self) -> f64 {
        self.spin_win
    }

    pub fn sequence_win(&self) -> f64 {
        self.sequence_win
    }

    pub fn bonus_win(&self) -> f64 {
        self.bonus_win
    }

    pub fn session_win(&self) -> f64 {
        self.session_win
    }
}
