//! Scatter/Bonus Trigger — BASE ⇄ BONUS state machine
//!
//! One authoritative free-spin counter. In `Local` mode the engine awards
//! and consumes spins itself; in `External` mode an outside authority owns
//! the count and the engine only reads it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::detector::ScatterTrigger;

/// Game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    #[default]
    Base,
    Bonus,
}

/// Externally owned free-spin count (e.g. a server-side round)
pub trait FreeSpinAuthority: Send + Sync {
    /// Free spins left, as the authority sees them
    fn remaining(&self) -> u32;
}

/// The single free-spin counter
#[derive(Clone)]
pub enum FreeSpinCounter {
    Local { remaining: u32 },
    External(Arc<dyn FreeSpinAuthority>),
}

impl FreeSpinCounter {
    pub fn local() -> Self {
        Self::Local { remaining: 0 }
    }

    pub fn external(authority: Arc<dyn FreeSpinAuthority>) -> Self {
        Self::External(authority)
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }

    pub fn remaining(&self) -> u32 {
        match self {
            Self::Local { remaining } => *remaining,
            Self::External(authority) => authority.remaining(),
        }
    }

    /// Add spins. Read-only in external mode.
    pub fn award(&mut self, spins: u32) -> u32 {
        if let Self::Local { remaining } = self {
            *remaining = remaining.saturating_add(spins);
        }
        self.remaining()
    }

    /// Use one spin. Read-only in external mode.
    pub fn consume(&mut self) -> u32 {
        if let Self::Local { remaining } = self {
            *remaining = remaining.saturating_sub(1);
        }
        self.remaining()
    }
}

impl Default for FreeSpinCounter {
    fn default() -> Self {
        Self::local()
    }
}

impl fmt::Debug for FreeSpinCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { remaining } => f.debug_struct("Local").field("remaining", remaining).finish(),
            Self::External(authority) => f
                .debug_struct("External")
                .field("remaining", &authority.remaining())
                .finish(),
        }
    }
}

/// What a scatter result did to the bonus state
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerEffect {
    None,
    /// BASE → BONUS
    Entered {
        free_spins: u32,
        scatter_count: usize,
        /// Scatter pay held until the first free spin
        award: f64,
    },
    /// Extra spins inside BONUS
    Retriggered {
        added: u32,
        remaining: u32,
        /// Scatter pay credited to the current spin
        pay: f64,
    },
}

/// Bonus round state
#[derive(Debug, Clone, Default)]
pub struct BonusRound {
    phase: GamePhase,
    counter: FreeSpinCounter,
    initial_award: f64,
    initial_award_applied: bool,
    free_spins_played: u32,
}

impl BonusRound {
    pub fn new(counter: FreeSpinCounter) -> Self {
        Self {
            counter,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn in_bonus(&self) -> bool {
        self.phase == GamePhase::Bonus
    }

    pub fn remaining(&self) -> u32 {
        self.counter.remaining()
    }

    pub fn counter(&self) -> &FreeSpinCounter {
        &self.counter
    }

    /// Swap the counter; only allowed outside the bonus round
    pub fn set_counter(&mut self, counter: FreeSpinCounter) -> bool {
        if self.in_bonus() {
            return false;
        }
        self.counter = counter;
        true
    }

    /// Free spins played in the current round
    pub fn free_spins_played(&self) -> u32 {
        self.free_spins_played
    }

    /// Interpret the terminal scatter result of a spin
    pub fn apply(&mut self, trigger: Option<&ScatterTrigger>) -> TriggerEffect {
        let Some(trigger) = trigger else {
            return TriggerEffect::None;
        };

        match (self.phase, trigger.retrigger) {
            (GamePhase::Base, false) => {
                self.phase = GamePhase::Bonus;
                self.initial_award = trigger.pay;
                self.initial_award_applied = false;
                self.free_spins_played = 0;
                let free_spins = self.counter.award(trigger.free_spins);
                log::info!(
                    "[Bonus] Entered: {} scatters, {} free spins, initial award {:.2}",
                    trigger.count,
                    free_spins,
                    trigger.pay
                );
                TriggerEffect::Entered {
                    free_spins,
                    scatter_count: trigger.count,
                    award: trigger.pay,
                }
            }
            (GamePhase::Bonus, true) => {
                let remaining = self.counter.award(trigger.free_spins);
                log::info!(
                    "[Bonus] Retrigger: +{} free spins ({} remaining)",
                    trigger.free_spins,
                    remaining
                );
                TriggerEffect::Retriggered {
                    added: trigger.free_spins,
                    remaining,
                    pay: trigger.pay,
                }
            }
            _ => {
                log::debug!("[Bonus] Ignoring scatter result evaluated for another phase");
                TriggerEffect::None
            }
        }
    }

    /// Initial scatter award, handed out once per bonus round
    pub fn take_initial_award(&mut self) -> Option<f64> {
        if !self.in_bonus() || self.initial_award_applied {
            return None;
        }
        self.initial_award_applied = true;
        (self.initial_award > 0.0).then_some(self.initial_award)
    }

    /// Close a spin. Free spins consume one from the counter; the round
    /// ends when nothing is left and this spin did not retrigger.
    /// Returns `true` when the round ended.
    pub fn settle_spin(&mut self, was_free: bool, retriggered: bool) -> bool {
        if !self.in_bonus() || !was_free {
            return false;
        }
        self.free_spins_played += 1;
        let remaining = self.counter.consume();
        if remaining == 0 && !retriggered {
            self.phase = GamePhase::Base;
            self.initial_award = 0.0;
            log::info!("[Bonus] Ended after {} free spins", self.free_spins_played);
            return true;
        }
        false
    }
}
