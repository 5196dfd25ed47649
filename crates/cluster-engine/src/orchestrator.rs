//! Spin Orchestrator — the per-spin state machine
//!
//! ```text
//! Idle → Spinning → Resolving → Settled → Idle
//!                                  │
//!                                  └─ (overlay) waits for dismissal
//! ```
//!
//! Exactly one spin runs at a time. A request while not Idle is ignored,
//! never queued. Any failure returns the orchestrator to Idle.

use std::sync::Arc;
use std::time::Duration;

use cluster_stage::{Scene, SpinKind, Stage, StageEvent, WinTier};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, broadcast};

use crate::account::{AccountError, AccountService};
use crate::accumulator::WinAccumulator;
use crate::bonus::{BonusRound, FreeSpinAuthority, FreeSpinCounter, GamePhase, TriggerEffect};
use crate::cascade::{CascadeEnv, CascadeResolver};
use crate::config::{ConfigError, SlotConfig};
use crate::context::{SpinContext, SpinMode};
use crate::detector::MatchDetector;
use crate::generator::SymbolGenerator;
use crate::grid::{Grid, GridError};
use crate::presentation::{CompletionSignal, Presentation};
use crate::signals::StageBus;
use crate::stats::{SessionStats, SpinRecord};
use crate::symbols::FIRST_REGULAR;

// ═══════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════

/// Where the current spin is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinPhase {
    #[default]
    Idle,
    /// Debited, grid populated, reel drop in progress
    Spinning,
    /// Tumble loop and bonus evaluation
    Resolving,
    /// Win known, celebration overlay still open
    Settled,
}

/// Spin failures. All of them leave the orchestrator Idle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpinError {
    #[error("Insufficient balance: required {required:.2}, available {available:.2}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("Invalid grid state: {0}")]
    InvalidGridState(#[from] GridError),

    #[error("Feature buy is not available during the bonus round")]
    FeatureBuyNotAllowed,

    #[error("Account error: {0}")]
    Account(AccountError),
}

/// Result of a spin request
#[derive(Debug, Clone, PartialEq)]
pub enum SpinAttempt {
    /// The spin ran to settlement
    Settled(SpinSummary),
    /// Another spin was in progress; nothing happened
    Ignored,
}

impl SpinAttempt {
    pub fn summary(&self) -> Option<&SpinSummary> {
        match self {
            Self::Settled(summary) => Some(summary),
            Self::Ignored => None,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored)
    }
}

/// Everything a settled spin produced
#[derive(Debug, Clone, PartialEq)]
pub struct SpinSummary {
    pub spin_index: u64,
    pub kind: SpinKind,
    /// Amount debited
    pub cost: f64,
    pub total_win: f64,
    pub win_ratio: f64,
    pub tier: Option<WinTier>,
    pub tumble_steps: u32,
    pub hit_ceiling: bool,
    /// Bonus multiplier applied to the tumble sequence
    pub multiplier: Option<u32>,
    pub bonus: TriggerEffect,
    pub bonus_ended: bool,
    pub free_spins_remaining: u32,
    pub balance: f64,
    /// Grid after the last tumble
    pub grid: Grid,
}

/// Point-in-time view used by the scheduler and UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorSnapshot {
    pub phase: SpinPhase,
    pub overlay_active: bool,
    pub game_phase: GamePhase,
    pub free_spins: u32,
    pub spin_index: u64,
    pub bet: f64,
    pub balance: f64,
}

impl OrchestratorSnapshot {
    /// Not idle, or an overlay is still up
    pub fn is_spinning(&self) -> bool {
        self.phase != SpinPhase::Idle || self.overlay_active
    }

    pub fn in_bonus(&self) -> bool {
        self.game_phase == GamePhase::Bonus
    }
}

struct SessionState {
    phase: SpinPhase,
    overlay_active: bool,
    ctx: SpinContext,
    bonus: BonusRound,
    stats: SessionStats,
    spin_index: u64,
}

struct RoundState {
    grid: Grid,
    generator: SymbolGenerator,
    wins: WinAccumulator,
}

/// Accepted spin request
struct SpinTicket {
    spin_index: u64,
    kind: SpinKind,
    bet: f64,
    turbo: bool,
    game_phase: GamePhase,
}

/// Returns the orchestrator to Idle if a spin exits early or is dropped
struct SpinGuard<'a> {
    state: &'a Mutex<SessionState>,
    armed: bool,
}

impl<'a> SpinGuard<'a> {
    fn new(state: &'a Mutex<SessionState>) -> Self {
        Self { state, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock();
            state.phase = SpinPhase::Idle;
            state.overlay_active = false;
            state.ctx.is_spinning = false;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ORCHESTRATOR
// ═══════════════════════════════════════════════════════════════════════════

pub struct SpinOrchestrator {
    config: SlotConfig,
    account: Arc<dyn AccountService>,
    presentation: Arc<dyn Presentation>,
    bus: StageBus,
    cascade: CascadeResolver,
    signal_timeout: Duration,
    state: Mutex<SessionState>,
    round: AsyncMutex<RoundState>,
}

impl SpinOrchestrator {
    /// Build an orchestrator over a validated config
    pub fn new(
        config: SlotConfig,
        account: Arc<dyn AccountService>,
        presentation: Arc<dyn Presentation>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let symbols = config.symbol_set();
        let generator = SymbolGenerator::new(symbols, config.difficulty_pool, config.seed);
        let cascade = CascadeResolver::new(
            MatchDetector::from_config(&config),
            config.max_tumble_steps,
            config.signal_timeout(),
        );
        let state = SessionState {
            phase: SpinPhase::Idle,
            overlay_active: false,
            ctx: SpinContext::new(config.pricing.bet, config.base_scatters),
            bonus: BonusRound::new(FreeSpinCounter::local()),
            stats: SessionStats::default(),
            spin_index: 0,
        };
        let round = RoundState {
            grid: Grid::filled(config.grid, FIRST_REGULAR),
            generator,
            wins: WinAccumulator::new(),
        };

        Ok(Self {
            signal_timeout: config.signal_timeout(),
            config,
            account,
            presentation,
            bus: StageBus::new(),
            cascade,
            state: Mutex::new(state),
            round: AsyncMutex::new(round),
        })
    }

    /// Let an outside authority own the free-spin count
    pub fn with_free_spin_authority(self, authority: Arc<dyn FreeSpinAuthority>) -> Self {
        self.state
            .lock()
            .bonus
            .set_counter(FreeSpinCounter::external(authority));
        self
    }

    // ─── observation ───────────────────────────────────────────────────────

    /// Subscribe to stage events
    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.bus.subscribe()
    }

    pub fn snapshot(&self) -> OrchestratorSnapshot {
        let state = self.state.lock();
        OrchestratorSnapshot {
            phase: state.phase,
            overlay_active: state.overlay_active,
            game_phase: state.bonus.phase(),
            free_spins: state.bonus.remaining(),
            spin_index: state.spin_index,
            bet: state.ctx.bet,
            balance: self.account.balance(),
        }
    }

    /// No spin in flight and no overlay open
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.phase == SpinPhase::Idle && !state.overlay_active
    }

    pub fn context(&self) -> SpinContext {
        let state = self.state.lock();
        let mut ctx = state.ctx.clone();
        ctx.is_bonus_round = state.bonus.in_bonus();
        ctx.free_spins = state.bonus.remaining();
        ctx
    }

    pub fn game_phase(&self) -> GamePhase {
        self.state.lock().bonus.phase()
    }

    pub fn in_bonus(&self) -> bool {
        self.state.lock().bonus.in_bonus()
    }

    pub fn free_spins_remaining(&self) -> u32 {
        self.state.lock().bonus.remaining()
    }

    pub fn stats(&self) -> SessionStats {
        self.state.lock().stats.clone()
    }

    pub fn reset_stats(&self) {
        self.state.lock().stats = SessionStats::default();
    }

    pub fn config(&self) -> &SlotConfig {
        &self.config
    }

    pub fn balance(&self) -> f64 {
        self.account.balance()
    }

    /// Current grid (waits for an in-flight spin to release it)
    pub async fn grid(&self) -> Grid {
        self.round.lock().await.grid.clone()
    }

    /// Amount the next spin in `mode` would debit
    pub fn next_spin_cost(&self, mode: SpinMode) -> f64 {
        let state = self.state.lock();
        if state.bonus.in_bonus() {
            return 0.0;
        }
        self.config.pricing.price(mode.paid_kind(), state.ctx.bet)
    }

    /// Surface the blocking balance notice without spinning
    pub fn notify_insufficient_balance(&self, required: f64, available: f64) {
        self.presentation.show_insufficient_balance(required, available);
        let spin_index = self.state.lock().spin_index;
        self.bus.emit(Stage::InsufficientBalance { required, available }, spin_index);
    }

    // ─── settings ──────────────────────────────────────────────────────────

    pub fn set_turbo(&self, turbo: bool) {
        self.state.lock().ctx.turbo = turbo;
    }

    /// Change the bet; refused mid-spin, inside the bonus round, or for
    /// non-positive amounts
    pub fn set_bet(&self, bet: f64) -> bool {
        let mut state = self.state.lock();
        if state.phase != SpinPhase::Idle || state.bonus.in_bonus() || !(bet.is_finite() && bet > 0.0) {
            return false;
        }
        state.ctx.bet = bet;
        true
    }

    /// Reseed the generator; refused while a spin holds the grid
    pub fn seed(&self, seed: u64) -> bool {
        match self.round.try_lock() {
            Ok(mut round) => {
                round.generator.seed(seed);
                true
            }
            Err(_) => false,
        }
    }

    // ─── spinning ──────────────────────────────────────────────────────────

    /// Spin with a freshly generated grid
    pub async fn spin(&self, mode: SpinMode) -> Result<SpinAttempt, SpinError> {
        self.run(mode, None).await
    }

    /// Spin with a caller-supplied grid (replays, QA)
    pub async fn spin_with_grid(&self, mode: SpinMode, grid: Grid) -> Result<SpinAttempt, SpinError> {
        self.run(mode, Some(grid)).await
    }

    fn try_begin(&self, mode: SpinMode) -> Result<Option<SpinTicket>, SpinError> {
        let mut state = self.state.lock();
        if state.phase != SpinPhase::Idle || state.overlay_active {
            return Ok(None);
        }
        let game_phase = state.bonus.phase();
        let kind = match (game_phase, mode) {
            (GamePhase::Bonus, SpinMode::FeatureBuy) => return Err(SpinError::FeatureBuyNotAllowed),
            (GamePhase::Bonus, _) => SpinKind::Free,
            (GamePhase::Base, mode) => mode.paid_kind(),
        };
        state.phase = SpinPhase::Spinning;
        state.ctx.is_spinning = true;
        state.spin_index += 1;
        Ok(Some(SpinTicket {
            spin_index: state.spin_index,
            kind,
            bet: state.ctx.bet,
            turbo: state.ctx.turbo,
            game_phase,
        }))
    }

    fn set_phase(&self, phase: SpinPhase) {
        self.state.lock().phase = phase;
    }

    fn abort(&self, ticket: &SpinTicket, cost: f64, reason: String) {
        if cost > 0.0 {
            self.account.credit(cost);
        }
        log::error!("[Orchestrator] Spin {} aborted: {}", ticket.spin_index, reason);
        self.bus.emit(Stage::SpinAborted { reason }, ticket.spin_index);
    }

    async fn run(&self, mode: SpinMode, forced: Option<Grid>) -> Result<SpinAttempt, SpinError> {
        let Some(ticket) = self.try_begin(mode)? else {
            log::debug!("[Orchestrator] Spin request ignored: spin in progress");
            return Ok(SpinAttempt::Ignored);
        };
        let mut guard = SpinGuard::new(&self.state);
        let spin_index = ticket.spin_index;

        // ─── debit ─────────────────────────────────────────────────────────
        let cost = self.config.pricing.price(ticket.kind, ticket.bet);
        if cost > 0.0 {
            match self.account.debit(cost) {
                Ok(_) => {}
                Err(AccountError::Insufficient { required, available }) => {
                    // Refused spins keep no index
                    self.state.lock().spin_index = spin_index - 1;
                    log::info!(
                        "[Orchestrator] Insufficient balance: required {:.2}, available {:.2}",
                        required,
                        available
                    );
                    self.notify_insufficient_balance(required, available);
                    return Err(SpinError::InsufficientBalance { required, available });
                }
                Err(e) => {
                    self.abort(&ticket, 0.0, e.to_string());
                    return Err(SpinError::Account(e));
                }
            }
        }

        // ─── populate ──────────────────────────────────────────────────────
        let mut round = self.round.lock().await;
        let RoundState { grid, generator, wins } = &mut *round;

        let placement = self.config.placement_for(ticket.kind);
        match forced {
            Some(forced) => *grid = forced,
            None => {
                generator.populate(grid);
                generator.place_scatters(grid, &placement);
                if ticket.game_phase == GamePhase::Bonus && self.config.multipliers.enabled {
                    generator.place_multipliers(grid, &self.config.multipliers.placement);
                }
            }
        }
        if let Err(e) = grid.validate(self.config.grid, generator.symbols(), ticket.game_phase) {
            self.abort(&ticket, cost, e.to_string());
            return Err(SpinError::InvalidGridState(e));
        }

        wins.begin_spin();
        let initial_award = {
            let mut state = self.state.lock();
            state.ctx.begin(ticket.kind, placement);
            match ticket.kind {
                SpinKind::Free => state.bonus.take_initial_award(),
                _ => None,
            }
        };

        self.bus.emit(
            Stage::SpinStart {
                kind: ticket.kind,
                bet: ticket.bet,
                cost,
                grid: grid.to_columns(),
            },
            spin_index,
        );
        if let Some(amount) = initial_award {
            wins.add_award(amount);
            log::info!("[Bonus] Initial scatter award {:.2} credited", amount);
            self.bus.emit(Stage::ScatterAwardCredited { amount }, spin_index);
        }

        self.presentation
            .play_reel_drop(grid, ticket.turbo)
            .wait(self.signal_timeout, "reel drop")
            .await;

        // ─── resolve ───────────────────────────────────────────────────────
        self.set_phase(SpinPhase::Resolving);
        let env = CascadeEnv {
            bet: ticket.bet,
            phase: ticket.game_phase,
            turbo: ticket.turbo,
            spin_index,
            presentation: self.presentation.as_ref(),
            bus: &self.bus,
        };
        let report = self.cascade.resolve(grid, generator, &env, wins).await;

        let mut multiplier = None;
        if ticket.game_phase == GamePhase::Bonus && report.sequence_win > 0.0 {
            let symbols = generator.symbols();
            let total: u32 = grid.symbols().filter_map(|s| symbols.multiplier_value(s)).sum();
            if total > 0 {
                let base_win = wins.sequence_win();
                let total_win = wins.apply_sequence_multiplier(total);
                log::debug!("[Orchestrator] Multiplier x{} on {:.2} → {:.2}", total, base_win, total_win);
                self.bus.emit(
                    Stage::MultiplierApply {
                        multiplier: total,
                        base_win,
                        total_win,
                    },
                    spin_index,
                );
                multiplier = Some(total);
            }
        }

        // ─── bonus trigger ─────────────────────────────────────────────────
        let effect = {
            let mut state = self.state.lock();
            let effect = state.bonus.apply(report.outcome.scatter());
            match effect {
                TriggerEffect::Entered { .. } => state.stats.bonus_triggers += 1,
                TriggerEffect::Retriggered { .. } => state.stats.retriggers += 1,
                TriggerEffect::None => {}
            }
            effect
        };
        let mut popup = CompletionSignal::ready();
        match &effect {
            TriggerEffect::Entered {
                free_spins,
                scatter_count,
                ..
            } => {
                wins.reset_bonus();
                self.bus.emit(
                    Stage::BonusEntered {
                        free_spins: *free_spins,
                        scatter_count: (*scatter_count).min(u8::MAX as usize) as u8,
                    },
                    spin_index,
                );
                self.presentation.switch_scene(Scene::Bonus);
                popup = self.presentation.show_bonus_trigger_popup(*free_spins);
            }
            TriggerEffect::Retriggered { added, remaining, pay } => {
                if *pay > 0.0 {
                    wins.add_award(*pay);
                }
                self.bus.emit(
                    Stage::FreeSpinsAwarded {
                        added: *added,
                        remaining: *remaining,
                    },
                    spin_index,
                );
            }
            TriggerEffect::None => {}
        }
        popup.wait(self.signal_timeout, "bonus popup").await;

        // ─── settle ────────────────────────────────────────────────────────
        let was_free = ticket.kind == SpinKind::Free;
        let total_win = wins.settle(was_free);
        let bonus_win = wins.bonus_win();
        let final_grid = grid.clone();
        drop(round);

        let balance = if total_win > 0.0 {
            self.account.credit(total_win)
        } else {
            self.account.balance()
        };
        let win_ratio = if ticket.bet > 0.0 { total_win / ticket.bet } else { 0.0 };
        let tier = if total_win > 0.0 {
            self.config.win_tiers.tier_for(win_ratio)
        } else {
            None
        };
        let retriggered = matches!(effect, TriggerEffect::Retriggered { .. });

        let (bonus_ended, free_spins_remaining) = {
            let mut state = self.state.lock();
            let ended = state.bonus.settle_spin(was_free, retriggered);
            state.stats.record(SpinRecord {
                cost,
                win: total_win,
                win_ratio,
                tumble_steps: report.steps,
                hit_ceiling: report.hit_ceiling,
            });
            state.ctx.is_bonus_round = state.bonus.in_bonus();
            state.ctx.free_spins = state.bonus.remaining();
            match tier {
                Some(_) => {
                    state.phase = SpinPhase::Settled;
                    state.overlay_active = true;
                }
                None => {
                    state.phase = SpinPhase::Idle;
                    state.ctx.is_spinning = false;
                }
            }
            (ended, state.bonus.remaining())
        };

        log::debug!(
            "[Orchestrator] Spin {} settled: win {:.2} ({:.1}x), {} tumbles",
            spin_index,
            total_win,
            win_ratio,
            report.steps
        );
        self.bus.emit(
            Stage::SpinSettled {
                total_win,
                win_ratio,
                tier,
            },
            spin_index,
        );

        if let Some(tier) = tier {
            self.bus.emit(
                Stage::WinOverlayShown {
                    total_win,
                    multiplier: win_ratio,
                    tier,
                },
                spin_index,
            );
            self.presentation
                .show_win_overlay(total_win, win_ratio, tier)
                .wait(self.signal_timeout, "win overlay")
                .await;
            {
                let mut state = self.state.lock();
                state.phase = SpinPhase::Idle;
                state.overlay_active = false;
                state.ctx.is_spinning = false;
            }
            self.bus.emit(Stage::WinOverlayClosed, spin_index);
        }
        guard.disarm();

        if bonus_ended {
            self.presentation.switch_scene(Scene::Base);
            self.bus.emit(Stage::BonusEnded { bonus_win }, spin_index);
        }

        Ok(SpinAttempt::Settled(SpinSummary {
            spin_index,
            kind: ticket.kind,
            cost,
            total_win,
            win_ratio,
            tier,
            tumble_steps: report.steps,
            hit_ceiling: report.hit_ceiling,
            multiplier,
            bonus: effect,
            bonus_ended,
            free_spins_remaining,
            balance,
            grid: final_grid,
        }))
    }
}
