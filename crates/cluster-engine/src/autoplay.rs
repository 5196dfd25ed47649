//! Autoplay Scheduler — unattended spin sequences
//!
//! A session issues one spin at a time. Readiness is a single state
//! machine driven by orchestrator events:
//!
//! ```text
//!   Ready ──spin issued / SpinStart──▶ WaitingAnimation
//!   WaitingAnimation ──SpinSettled (no tier)──▶ Ready
//!   WaitingAnimation ──SpinSettled (tier)──▶ WaitingOverlay
//!   WaitingOverlay ──WinOverlayClosed──▶ Ready
//! ```
//!
//! Becoming Ready schedules the next spin once (a single deadline). If no
//! event arrives within the readiness timeout, readiness is re-derived
//! from an orchestrator snapshot. Stopping cancels only the next
//! not-yet-issued spin; a spin already running settles normally.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cluster_stage::{AutoplayStopReason, Stage, StageEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use crate::context::SpinMode;
use crate::orchestrator::{OrchestratorSnapshot, SpinAttempt, SpinError, SpinOrchestrator, SpinPhase};
use crate::signals::StageBus;
use crate::timing::AutoplayConfig;

// ═══════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════

/// Whether the next spin may be issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    /// A spin is in flight
    WaitingAnimation,
    /// A win overlay is open
    WaitingOverlay,
}

impl Readiness {
    /// Next state after an orchestrator event
    pub fn observe(self, stage: &Stage) -> Self {
        match stage {
            Stage::SpinStart { .. } => Self::WaitingAnimation,
            Stage::SpinSettled { tier: Some(_), .. } | Stage::WinOverlayShown { .. } => {
                Self::WaitingOverlay
            }
            Stage::SpinSettled { tier: None, .. }
            | Stage::WinOverlayClosed
            | Stage::SpinAborted { .. } => Self::Ready,
            _ => self,
        }
    }

    /// Readiness as implied by orchestrator state
    pub fn from_snapshot(snapshot: &OrchestratorSnapshot) -> Self {
        if snapshot.overlay_active {
            Self::WaitingOverlay
        } else if snapshot.phase != SpinPhase::Idle {
            Self::WaitingAnimation
        } else {
            Self::Ready
        }
    }
}

/// Refused autoplay request
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AutoplayError {
    #[error("A spin is already in progress")]
    SpinInProgress,

    #[error("Autoplay is already running")]
    AlreadyRunning,

    #[error("Spin count must be at least 1")]
    InvalidSpinCount,

    #[error("Insufficient balance: required {required:.2}, available {available:.2}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("Feature buy cannot be autoplayed")]
    FeatureBuyNotAllowed,

    #[error("No bonus round is active")]
    NotInBonus,
}

/// Public view of the running session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoplayStatus {
    pub mode: SpinMode,
    /// Session drives bonus free spins
    pub free_spins: bool,
    pub remaining: u32,
    pub spins_played: u32,
    pub readiness: Readiness,
    /// Times readiness had to be re-derived after a timeout
    pub stall_recoveries: u32,
}

struct AutoplaySession {
    id: u64,
    mode: SpinMode,
    free_spins: bool,
    remaining: u32,
    spins_played: u32,
    readiness: Readiness,
    stall_recoveries: u32,
    /// Last issued spin consumed from `remaining`
    last_counted: bool,
    /// At least one free spin was issued by this session
    played_bonus: bool,
    bonus_ended: bool,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl AutoplaySession {
    fn status(&self) -> AutoplayStatus {
        AutoplayStatus {
            mode: self.mode,
            free_spins: self.free_spins,
            remaining: self.remaining,
            spins_played: self.spins_played,
            readiness: self.readiness,
            stall_recoveries: self.stall_recoveries,
        }
    }
}

/// Driver-side deadlines; at most one pending spin
#[derive(Debug, Default)]
struct Timers {
    next_spin: Option<Instant>,
    stall: Option<Instant>,
}

enum Issue {
    Spin(SpinMode),
    Stop(AutoplayStopReason),
    Wait,
}

// ═══════════════════════════════════════════════════════════════════════════
// SCHEDULER
// ═══════════════════════════════════════════════════════════════════════════

/// Autoplay for one orchestrator. Dropping the scheduler stops its session.
pub struct AutoplayScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    orchestrator: Arc<SpinOrchestrator>,
    timing: AutoplayConfig,
    bus: StageBus,
    session: Mutex<Option<AutoplaySession>>,
    next_id: AtomicU64,
}

impl AutoplayScheduler {
    pub fn new(orchestrator: Arc<SpinOrchestrator>, timing: AutoplayConfig) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                orchestrator,
                timing,
                bus: StageBus::new(),
                session: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribe to autoplay stages
    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.inner.bus.subscribe()
    }

    pub fn orchestrator(&self) -> &Arc<SpinOrchestrator> {
        &self.inner.orchestrator
    }

    pub fn is_active(&self) -> bool {
        self.inner.session.lock().is_some()
    }

    pub fn status(&self) -> Option<AutoplayStatus> {
        self.inner.session.lock().as_ref().map(AutoplaySession::status)
    }

    /// Start a session of `remaining` paid spins. Bonus free spins
    /// triggered along the way play without consuming the count, and the
    /// session ends with that bonus round. The session runs on the
    /// ambient tokio runtime.
    pub fn start(&self, remaining: u32, mode: SpinMode) -> Result<(), AutoplayError> {
        if mode == SpinMode::FeatureBuy {
            return Err(AutoplayError::FeatureBuyNotAllowed);
        }
        if remaining == 0 {
            return Err(AutoplayError::InvalidSpinCount);
        }
        let orchestrator = &self.inner.orchestrator;
        let snapshot = orchestrator.snapshot();
        if !snapshot.in_bonus() {
            let required = orchestrator.next_spin_cost(mode);
            if snapshot.balance < required {
                orchestrator.notify_insufficient_balance(required, snapshot.balance);
                return Err(AutoplayError::InsufficientBalance {
                    required,
                    available: snapshot.balance,
                });
            }
        }
        self.inner.open(remaining, mode, false)
    }

    /// Autoplay the current bonus round's free spins. Retriggers extend
    /// the session; it ends with the bonus round.
    pub fn start_free_spins(&self) -> Result<(), AutoplayError> {
        let orchestrator = &self.inner.orchestrator;
        if !orchestrator.in_bonus() {
            return Err(AutoplayError::NotInBonus);
        }
        let remaining = orchestrator.free_spins_remaining();
        if remaining == 0 {
            return Err(AutoplayError::InvalidSpinCount);
        }
        self.inner.open(remaining, SpinMode::Standard, true)
    }

    /// Stop the session. A spin already running settles normally.
    /// Returns `false` when nothing was running.
    pub fn stop(&self) -> bool {
        self.inner.stop()
    }

    /// Extend the running session. Returns the new remaining count.
    pub fn add_spins(&self, spins: u32) -> Option<u32> {
        let mut slot = self.inner.session.lock();
        let session = slot.as_mut()?;
        session.remaining = session.remaining.saturating_add(spins);
        log::debug!("[Autoplay] +{} spins ({} remaining)", spins, session.remaining);
        Some(session.remaining)
    }
}

impl Drop for AutoplayScheduler {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl SchedulerInner {
    fn open(self: &Arc<Self>, remaining: u32, mode: SpinMode, free_spins: bool) -> Result<(), AutoplayError> {
        let (stop_tx, stop_rx) = oneshot::channel();
        let events = self.orchestrator.subscribe();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut slot = self.session.lock();
            if slot.is_some() {
                return Err(AutoplayError::AlreadyRunning);
            }
            if !self.orchestrator.is_idle() {
                return Err(AutoplayError::SpinInProgress);
            }
            *slot = Some(AutoplaySession {
                id,
                mode,
                free_spins,
                remaining,
                spins_played: 0,
                readiness: Readiness::Ready,
                stall_recoveries: 0,
                last_counted: false,
                played_bonus: false,
                bonus_ended: false,
                stop_tx: Some(stop_tx),
            });
        }

        log::info!(
            "[Autoplay] Started: {} {}",
            remaining,
            if free_spins { "free spins" } else { "spins" }
        );
        self.bus.emit(Stage::AutoplayStart { remaining, free_spins }, self.spin_index());

        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.drive(id, stop_rx, events).await });
        Ok(())
    }

    fn stop(&self) -> bool {
        let session = self.session.lock().take();
        let Some(mut session) = session else {
            return false;
        };
        if let Some(tx) = session.stop_tx.take() {
            let _ = tx.send(());
        }
        self.announce_stop(&session, AutoplayStopReason::Stopped);
        true
    }

    fn spin_index(&self) -> u64 {
        self.orchestrator.snapshot().spin_index
    }

    fn announce_stop(&self, session: &AutoplaySession, reason: AutoplayStopReason) {
        log::info!(
            "[Autoplay] Stopped after {} spins: {}",
            session.spins_played,
            reason.display_name()
        );
        self.bus.emit(
            Stage::AutoplayStop {
                reason,
                spins_played: session.spins_played,
            },
            self.spin_index(),
        );
    }

    /// Clear the session if it is still ours, then announce
    fn finish(&self, id: u64, reason: AutoplayStopReason) {
        let session = {
            let mut slot = self.session.lock();
            match slot.as_ref() {
                Some(s) if s.id == id => slot.take(),
                _ => None,
            }
        };
        if let Some(session) = session {
            self.announce_stop(&session, reason);
        }
    }

    fn with_session<R>(&self, id: u64, f: impl FnOnce(&mut AutoplaySession) -> R) -> Option<R> {
        let mut slot = self.session.lock();
        match slot.as_mut() {
            Some(session) if session.id == id => Some(f(session)),
            _ => None,
        }
    }

    // ─── driver ────────────────────────────────────────────────────────────

    async fn drive(
        self: Arc<Self>,
        id: u64,
        mut stop_rx: oneshot::Receiver<()>,
        mut events: broadcast::Receiver<StageEvent>,
    ) {
        let (result_tx, mut result_rx) = mpsc::unbounded_channel();
        let mut timers = Timers {
            next_spin: Some(Instant::now() + self.timing.start_delay()),
            stall: None,
        };

        let reason = loop {
            let next_spin = timers.next_spin;
            let stall = timers.stall;

            tokio::select! {
                biased;

                // Explicit stop already cleared the session
                _ = &mut stop_rx => return,

                event = events.recv() => match event {
                    Ok(event) => {
                        if let Some(reason) = self.on_event(id, &event.stage, &mut timers) {
                            break reason;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        log::warn!("[Autoplay] Missed {} orchestrator events; resyncing", missed);
                        if let Some(reason) = self.resync(id, &mut timers) {
                            break reason;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break AutoplayStopReason::Disconnected,
                },

                Some(result) = result_rx.recv() => {
                    if let Some(reason) = self.on_spin_result(id, result, &mut timers) {
                        break reason;
                    }
                }

                _ = sleep_until(next_spin) => {
                    timers.next_spin = None;
                    match self.try_issue(id, &mut timers) {
                        Issue::Spin(mode) => {
                            let orchestrator = Arc::clone(&self.orchestrator);
                            let tx = result_tx.clone();
                            tokio::spawn(async move {
                                let _ = tx.send(orchestrator.spin(mode).await);
                            });
                        }
                        Issue::Stop(reason) => break reason,
                        Issue::Wait => {}
                    }
                }

                _ = sleep_until(stall) => {
                    timers.stall = None;
                    let recoveries = self.with_session(id, |s| {
                        s.stall_recoveries += 1;
                        s.stall_recoveries
                    });
                    log::warn!(
                        "[Autoplay] No readiness signal within {:?}; resyncing (recovery #{})",
                        self.timing.readiness_timeout(),
                        recoveries.unwrap_or(0)
                    );
                    if let Some(reason) = self.resync(id, &mut timers) {
                        break reason;
                    }
                }
            }
        };

        self.finish(id, reason);
    }

    fn on_event(&self, id: u64, stage: &Stage, timers: &mut Timers) -> Option<AutoplayStopReason> {
        let (before, after, bonus_ended) = self.with_session(id, |s| {
            let before = s.readiness;
            s.readiness = s.readiness.observe(stage);
            match stage {
                Stage::FreeSpinsAwarded { added, .. } if s.free_spins => {
                    s.remaining = s.remaining.saturating_add(*added);
                    log::debug!("[Autoplay] Retrigger +{} ({} remaining)", added, s.remaining);
                }
                Stage::BonusEnded { .. } => s.bonus_ended = true,
                _ => {}
            }
            (before, s.readiness, s.bonus_ended)
        })?;

        if bonus_ended {
            return Some(AutoplayStopReason::FreeSpinsEnded);
        }

        match after {
            Readiness::Ready => {
                timers.stall = None;
                if before != Readiness::Ready {
                    return self.on_ready(id, timers);
                }
                None
            }
            _ => {
                timers.stall = Some(Instant::now() + self.timing.readiness_timeout());
                None
            }
        }
    }

    fn on_spin_result(
        &self,
        id: u64,
        result: Result<SpinAttempt, SpinError>,
        timers: &mut Timers,
    ) -> Option<AutoplayStopReason> {
        match result {
            Ok(SpinAttempt::Settled(_)) => None,
            Ok(SpinAttempt::Ignored) => {
                log::warn!("[Autoplay] Spin was ignored by the orchestrator; resyncing");
                self.with_session(id, |s| {
                    if s.last_counted {
                        s.remaining += 1;
                    }
                    s.spins_played = s.spins_played.saturating_sub(1);
                });
                self.resync(id, timers)
            }
            Err(SpinError::InsufficientBalance { .. }) => Some(AutoplayStopReason::InsufficientBalance),
            Err(e) => {
                log::error!("[Autoplay] Spin failed: {}", e);
                self.resync(id, timers)
            }
        }
    }

    /// Re-derive readiness from the orchestrator
    fn resync(&self, id: u64, timers: &mut Timers) -> Option<AutoplayStopReason> {
        let readiness = Readiness::from_snapshot(&self.orchestrator.snapshot());
        self.with_session(id, |s| s.readiness = readiness)?;
        if readiness == Readiness::Ready {
            timers.stall = None;
            self.on_ready(id, timers)
        } else {
            timers.stall = Some(Instant::now() + self.timing.readiness_timeout());
            None
        }
    }

    /// Check stop conditions, then schedule the next spin once
    fn on_ready(&self, id: u64, timers: &mut Timers) -> Option<AutoplayStopReason> {
        if let Some(reason) = self.with_session(id, |s| self.stop_reason(s)).flatten() {
            return Some(reason);
        }
        if timers.next_spin.is_none() {
            timers.next_spin = Some(Instant::now() + self.timing.spin_interval());
        }
        None
    }

    fn stop_reason(&self, session: &AutoplaySession) -> Option<AutoplayStopReason> {
        let snapshot = self.orchestrator.snapshot();
        if session.bonus_ended || (session.played_bonus && !snapshot.in_bonus()) {
            return Some(AutoplayStopReason::FreeSpinsEnded);
        }
        if session.free_spins {
            if !snapshot.in_bonus() || session.remaining == 0 {
                return Some(AutoplayStopReason::FreeSpinsEnded);
            }
            return None;
        }
        if snapshot.in_bonus() {
            return None;
        }
        if session.remaining == 0 {
            return Some(AutoplayStopReason::Exhausted);
        }
        let required = self.orchestrator.next_spin_cost(session.mode);
        if snapshot.balance < required {
            self.orchestrator
                .notify_insufficient_balance(required, snapshot.balance);
            return Some(AutoplayStopReason::InsufficientBalance);
        }
        None
    }

    fn try_issue(&self, id: u64, timers: &mut Timers) -> Issue {
        let snapshot = self.orchestrator.snapshot();
        let issue = self.with_session(id, |s| {
            if s.readiness != Readiness::Ready || snapshot.is_spinning() {
                s.readiness = Readiness::from_snapshot(&snapshot);
                return Issue::Wait;
            }
            if let Some(reason) = self.stop_reason(s) {
                return Issue::Stop(reason);
            }

            let counted = s.free_spins || !snapshot.in_bonus();
            if counted {
                s.remaining = s.remaining.saturating_sub(1);
            }
            s.last_counted = counted;
            s.played_bonus |= snapshot.in_bonus();
            s.spins_played += 1;
            s.readiness = Readiness::WaitingAnimation;
            self.bus.emit(
                Stage::AutoplaySpin {
                    remaining: s.remaining,
                },
                snapshot.spin_index + 1,
            );
            Issue::Spin(s.mode)
        });

        match issue {
            Some(Issue::Stop(reason)) => Issue::Stop(reason),
            Some(issue) => {
                timers.stall = Some(Instant::now() + self.timing.readiness_timeout());
                issue
            }
            // Session gone: the stop branch ends the driver
            None => Issue::Wait,
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
