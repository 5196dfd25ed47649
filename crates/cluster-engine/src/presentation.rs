//! Presentation collaborator — animation requests and completion signals
//!
//! The engine asks the presentation layer to animate something and gets a
//! `CompletionSignal` back. Awaiting a signal is always bounded: a dropped
//! or late signal is logged and the engine moves on.

use std::time::Duration;

use cluster_stage::{Cell, Scene, WinTier};
use tokio::sync::oneshot;

use crate::grid::Grid;

/// How an awaited signal resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// Presentation reported completion
    Completed,
    /// The completion handle was dropped without firing
    Dropped,
    /// No answer within the timeout
    TimedOut,
}

/// Sender half; presentation fires it when the animation ends
#[derive(Debug)]
pub struct CompletionHandle {
    tx: oneshot::Sender<()>,
}

impl CompletionHandle {
    pub fn complete(self) {
        // Receiver gone means the engine already stopped waiting
        let _ = self.tx.send(());
    }
}

/// Receiver half, awaited by the engine
#[derive(Debug, Default)]
pub struct CompletionSignal {
    rx: Option<oneshot::Receiver<()>>,
}

impl CompletionSignal {
    /// Already-completed signal (nothing to animate)
    pub fn ready() -> Self {
        Self { rx: None }
    }

    /// Linked handle/signal pair
    pub fn pair() -> (CompletionHandle, CompletionSignal) {
        let (tx, rx) = oneshot::channel();
        (CompletionHandle { tx }, CompletionSignal { rx: Some(rx) })
    }

    pub fn is_ready(&self) -> bool {
        self.rx.is_none()
    }

    /// Await completion, bounded by `timeout`
    pub async fn wait(self, timeout: Duration, what: &str) -> SignalOutcome {
        let Some(rx) = self.rx else {
            return SignalOutcome::Completed;
        };
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(())) => SignalOutcome::Completed,
            Ok(Err(_)) => {
                log::warn!("[Presentation] {} signal dropped without completing", what);
                SignalOutcome::Dropped
            }
            Err(_) => {
                log::warn!("[Presentation] {} signal timed out after {:?}", what, timeout);
                SignalOutcome::TimedOut
            }
        }
    }
}

/// Animation/sound layer as seen by the engine
pub trait Presentation: Send + Sync {
    /// Reels drop in with the freshly populated grid
    fn play_reel_drop(&self, grid: &Grid, turbo: bool) -> CompletionSignal;

    /// Winning cells burst before the columns collapse
    fn play_removal(&self, cells: &[Cell], turbo: bool) -> CompletionSignal;

    /// Celebration overlay; completes on dismissal
    fn show_win_overlay(&self, total_win: f64, multiplier: f64, tier: WinTier) -> CompletionSignal;

    /// Bonus entry popup; completes on dismissal
    fn show_bonus_trigger_popup(&self, free_spins: u32) -> CompletionSignal;

    /// Background/music swap
    fn switch_scene(&self, _scene: Scene) {}

    /// Blocking notice for a refused debit
    fn show_insufficient_balance(&self, _required: f64, _available: f64) {}
}

/// Presentation that completes everything immediately (headless runs)
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantPresentation;

impl Presentation for InstantPresentation {
    fn play_reel_drop(&self, _grid: &Grid, _turbo: bool) -> CompletionSignal {
        CompletionSignal::ready()
    }

    fn play_removal(&self, _cells: &[Cell], _turbo: bool) -> CompletionSignal {
        CompletionSignal::ready()
    }

    fn show_win_overlay(&self, _total_win: f64, _multiplier: f64, _tier: WinTier) -> CompletionSignal {
        CompletionSignal::ready()
    }

    fn show_bonus_trigger_popup(&self, _free_spins: u32) -> CompletionSignal {
        CompletionSignal::ready()
    }
}
