//! Autoplay sessions against a live orchestrator
//!
//! All tests run on a paused clock so timer-driven scheduling advances
//! deterministically.

use std::sync::Arc;
use std::time::Duration;

use cluster_engine::cluster_stage::{AutoplayStopReason, Cell, Stage, StageEvent, StageTrace, WinTier};
use cluster_engine::{
    AutoplayConfig, AutoplayError, AutoplayScheduler, CompletionHandle, CompletionSignal, Grid,
    InMemoryAccount, InstantPresentation, Presentation, Readiness, SCATTER, ScatterPlacement, SlotConfig,
    SpinMode, SpinOrchestrator, SymbolId,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;

// ═══════════════════════════════════════════════════════════════════════════════
// TEST FIXTURES
// ═══════════════════════════════════════════════════════════════════════════════

/// Base game only: no scatters anywhere
fn no_bonus_config(seed: u64) -> SlotConfig {
    SlotConfig {
        base_scatters: ScatterPlacement::none(),
        bonus_scatters: ScatterPlacement::none(),
        seed: Some(seed),
        ..SlotConfig::default()
    }
}

/// Every cluster pays nothing
fn dead_config(seed: u64) -> SlotConfig {
    let mut config = no_bonus_config(seed);
    for tier in config.paytable.tiers.iter_mut() {
        tier.iter_mut().for_each(|pay| *pay = 0.0);
    }
    config
}

/// One live symbol: every spin tumbles to the ceiling with a tiered win
fn always_win_config(seed: u64) -> SlotConfig {
    let mut config = SlotConfig {
        regular_symbols: 2,
        difficulty_pool: 1,
        max_tumble_steps: 2,
        ..no_bonus_config(seed)
    };
    config.paytable.tiers = [vec![20.0; 2], vec![20.0; 2], vec![20.0; 2]];
    config
}

fn orchestrator(config: SlotConfig, balance: f64) -> Arc<SpinOrchestrator> {
    Arc::new(
        SpinOrchestrator::new(
            config,
            Arc::new(InMemoryAccount::new(balance)),
            Arc::new(InstantPresentation),
        )
        .unwrap(),
    )
}

fn quiet_grid(scatters: usize) -> Grid {
    let rows: Vec<Vec<SymbolId>> = (0..5)
        .map(|r| {
            (0..6)
                .map(|c| {
                    let i = r * 6 + c;
                    if i < scatters { SCATTER } else { (i % 9 + 1) as SymbolId }
                })
                .collect()
        })
        .collect();
    Grid::from_rows(&rows).unwrap()
}

async fn wait_for(rx: &mut broadcast::Receiver<StageEvent>, type_name: &str) -> StageEvent {
    let fut = async {
        loop {
            match rx.recv().await {
                Ok(event) if event.type_name() == type_name => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("bus closed waiting for {type_name}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(120), fut)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {type_name}"))
}

async fn wait_for_any(rx: &mut broadcast::Receiver<StageEvent>) -> StageEvent {
    tokio::time::timeout(Duration::from_secs(120), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("bus closed")
}

fn drain(rx: &mut broadcast::Receiver<StageEvent>) -> StageTrace {
    let mut trace = StageTrace::new("drain");
    while let Ok(event) = rx.try_recv() {
        trace.push(event);
    }
    trace
}

fn stop_of(event: &StageEvent) -> (AutoplayStopReason, u32) {
    match event.stage {
        Stage::AutoplayStop { reason, spins_played } => (reason, spins_played),
        ref other => panic!("expected autoplay_stop, got {other:?}"),
    }
}

/// Keeps win overlays open while `hold` is set
#[derive(Default)]
struct HeldOverlay {
    hold: Mutex<bool>,
    handles: Mutex<Vec<CompletionHandle>>,
}

impl HeldOverlay {
    fn holding() -> Self {
        Self {
            hold: Mutex::new(true),
            handles: Mutex::new(Vec::new()),
        }
    }

    fn release(&self) {
        *self.hold.lock() = false;
        for handle in self.handles.lock().drain(..) {
            handle.complete();
        }
    }
}

impl Presentation for HeldOverlay {
    fn play_reel_drop(&self, _grid: &Grid, _turbo: bool) -> CompletionSignal {
        CompletionSignal::ready()
    }

    fn play_removal(&self, _cells: &[Cell], _turbo: bool) -> CompletionSignal {
        CompletionSignal::ready()
    }

    fn show_win_overlay(&self, _total_win: f64, _multiplier: f64, _tier: WinTier) -> CompletionSignal {
        if !*self.hold.lock() {
            return CompletionSignal::ready();
        }
        let (handle, signal) = CompletionSignal::pair();
        self.handles.lock().push(handle);
        signal
    }

    fn show_bonus_trigger_popup(&self, _free_spins: u32) -> CompletionSignal {
        CompletionSignal::ready()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn test_three_spin_session_exhausts() {
    let orch = orchestrator(no_bonus_config(11), 1_000.0);
    let scheduler = AutoplayScheduler::new(Arc::clone(&orch), AutoplayConfig::studio());
    let mut spins = orch.subscribe();
    let mut autoplay = scheduler.subscribe();

    scheduler.start(3, SpinMode::Standard).unwrap();
    assert!(scheduler.is_active());

    let stop = wait_for(&mut autoplay, "autoplay_stop").await;
    assert_eq!(stop_of(&stop), (AutoplayStopReason::Exhausted, 3));
    assert!(!scheduler.is_active());

    let trace = drain(&mut spins);
    assert_eq!(trace.count("spin_start"), 3);
    assert_eq!(trace.count("spin_settled"), 3);
    assert_eq!(orch.stats().total_spins, 3);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(drain(&mut spins).count("spin_start"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_autoplay_announces_each_spin() {
    let orch = orchestrator(no_bonus_config(12), 1_000.0);
    let scheduler = AutoplayScheduler::new(Arc::clone(&orch), AutoplayConfig::studio());
    let mut autoplay = scheduler.subscribe();

    scheduler.start(2, SpinMode::EnhancedBet).unwrap();
    let mut trace = StageTrace::new("autoplay");
    loop {
        let event = wait_for_any(&mut autoplay).await;
        let done = matches!(event.stage, Stage::AutoplayStop { .. });
        trace.push(event);
        if done {
            break;
        }
    }

    assert_eq!(
        trace.type_sequence(),
        vec!["autoplay_start", "autoplay_spin", "autoplay_spin", "autoplay_stop"]
    );
    let remaining: Vec<u32> = trace
        .events_by_type("autoplay_spin")
        .iter()
        .filter_map(|e| match e.stage {
            Stage::AutoplaySpin { remaining } => Some(remaining),
            _ => None,
        })
        .collect();
    assert_eq!(remaining, vec![1, 0]);

    // Enhanced bet costs 1.25x
    assert_eq!(orch.stats().total_staked, 2.5);
}

#[tokio::test(start_paused = true)]
async fn test_add_spins_extends_session() {
    let orch = orchestrator(no_bonus_config(13), 1_000.0);
    let scheduler = AutoplayScheduler::new(Arc::clone(&orch), AutoplayConfig::studio());
    let mut autoplay = scheduler.subscribe();

    scheduler.start(1, SpinMode::Standard).unwrap();
    assert_eq!(scheduler.add_spins(2), Some(3));

    let stop = wait_for(&mut autoplay, "autoplay_stop").await;
    assert_eq!(stop_of(&stop), (AutoplayStopReason::Exhausted, 3));
    assert_eq!(scheduler.add_spins(1), None);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_spins() {
    let orch = orchestrator(dead_config(14), 1_000.0);
    let scheduler = AutoplayScheduler::new(Arc::clone(&orch), AutoplayConfig::studio());
    let mut spins = orch.subscribe();
    let mut autoplay = scheduler.subscribe();

    scheduler.start(100, SpinMode::Standard).unwrap();
    wait_for(&mut autoplay, "autoplay_spin").await;
    assert!(scheduler.stop());
    assert!(!scheduler.stop());

    let stop = wait_for(&mut autoplay, "autoplay_stop").await;
    assert_eq!(stop_of(&stop), (AutoplayStopReason::Stopped, 1));
    assert!(!scheduler.is_active());

    // The spin already issued settles; nothing after it
    tokio::time::sleep(Duration::from_secs(10)).await;
    let trace = drain(&mut spins);
    assert_eq!(trace.count("spin_start"), 1);
    assert_eq!(trace.count("spin_settled"), 1);
    assert!(orch.is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_scheduler_stops_session() {
    let orch = orchestrator(dead_config(15), 1_000.0);
    let scheduler = AutoplayScheduler::new(Arc::clone(&orch), AutoplayConfig::studio());
    let mut spins = orch.subscribe();

    scheduler.start(50, SpinMode::Standard).unwrap();
    wait_for(&mut spins, "spin_settled").await;
    drop(scheduler);

    tokio::time::sleep(Duration::from_secs(10)).await;
    let played = orch.stats().total_spins;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(orch.stats().total_spins, played);
    assert!(played < 50);
}

// ═══════════════════════════════════════════════════════════════════════════════
// START VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn test_start_rejections() {
    let orch = orchestrator(no_bonus_config(16), 0.5);
    let scheduler = AutoplayScheduler::new(Arc::clone(&orch), AutoplayConfig::studio());
    let mut spins = orch.subscribe();

    assert_eq!(
        scheduler.start(5, SpinMode::FeatureBuy),
        Err(AutoplayError::FeatureBuyNotAllowed)
    );
    assert_eq!(
        scheduler.start(0, SpinMode::Standard),
        Err(AutoplayError::InvalidSpinCount)
    );
    assert_eq!(
        scheduler.start(5, SpinMode::Standard),
        Err(AutoplayError::InsufficientBalance {
            required: 1.0,
            available: 0.5
        })
    );
    assert_eq!(scheduler.start_free_spins(), Err(AutoplayError::NotInBonus));
    assert!(!scheduler.is_active());
    assert!(drain(&mut spins).has_stage("insufficient_balance"));
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_refused() {
    let orch = orchestrator(no_bonus_config(17), 1_000.0);
    let scheduler = AutoplayScheduler::new(Arc::clone(&orch), AutoplayConfig::studio());

    scheduler.start(10, SpinMode::Standard).unwrap();
    assert_eq!(
        scheduler.start(10, SpinMode::Standard),
        Err(AutoplayError::AlreadyRunning)
    );
    assert!(scheduler.stop());
}

#[tokio::test(start_paused = true)]
async fn test_running_out_of_balance_stops_session() {
    let orch = orchestrator(dead_config(18), 2.0);
    let scheduler = AutoplayScheduler::new(Arc::clone(&orch), AutoplayConfig::studio());
    let mut spins = orch.subscribe();
    let mut autoplay = scheduler.subscribe();

    scheduler.start(10, SpinMode::Standard).unwrap();
    let stop = wait_for(&mut autoplay, "autoplay_stop").await;
    assert_eq!(stop_of(&stop), (AutoplayStopReason::InsufficientBalance, 2));
    assert_eq!(orch.balance(), 0.0);

    let trace = drain(&mut spins);
    assert_eq!(trace.count("spin_start"), 2);
    assert_eq!(trace.count("insufficient_balance"), 1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// READINESS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn test_open_overlay_blocks_next_spin() {
    let presentation = Arc::new(HeldOverlay::holding());
    let orch = Arc::new(
        SpinOrchestrator::new(
            always_win_config(19),
            Arc::new(InMemoryAccount::new(100.0)),
            presentation.clone(),
        )
        .unwrap(),
    );
    let scheduler = AutoplayScheduler::new(Arc::clone(&orch), AutoplayConfig::studio());
    let mut spins = orch.subscribe();
    let mut autoplay = scheduler.subscribe();

    scheduler.start(2, SpinMode::Standard).unwrap();
    wait_for(&mut spins, "win_overlay_shown").await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    let status = scheduler.status().unwrap();
    assert_eq!(status.spins_played, 1);
    assert_eq!(status.readiness, Readiness::WaitingOverlay);
    assert!(status.stall_recoveries > 0);
    assert!(!orch.is_idle());

    presentation.release();
    let stop = wait_for(&mut autoplay, "autoplay_stop").await;
    assert_eq!(stop_of(&stop), (AutoplayStopReason::Exhausted, 2));
    assert_eq!(orch.stats().tumble_ceiling_hits, 2);
}

// ═══════════════════════════════════════════════════════════════════════════════
// BONUS ROUNDS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn test_free_spin_session_ends_with_bonus() {
    let orch = orchestrator(no_bonus_config(20), 100.0);
    orch.spin_with_grid(SpinMode::Standard, quiet_grid(4)).await.unwrap();
    assert!(orch.in_bonus());

    let scheduler = AutoplayScheduler::new(Arc::clone(&orch), AutoplayConfig::studio());
    let mut autoplay = scheduler.subscribe();
    scheduler.start_free_spins().unwrap();
    assert!(scheduler.status().unwrap().free_spins);

    let stop = wait_for(&mut autoplay, "autoplay_stop").await;
    assert_eq!(stop_of(&stop), (AutoplayStopReason::FreeSpinsEnded, 10));
    assert!(!orch.in_bonus());
    assert_eq!(orch.stats().free_spins_played, 10);
}

#[tokio::test(start_paused = true)]
async fn test_bonus_spins_do_not_consume_session_count() {
    let orch = orchestrator(no_bonus_config(21), 100.0);
    orch.spin_with_grid(SpinMode::Standard, quiet_grid(4)).await.unwrap();

    let scheduler = AutoplayScheduler::new(Arc::clone(&orch), AutoplayConfig::studio());
    let mut autoplay = scheduler.subscribe();
    scheduler.start(2, SpinMode::Standard).unwrap();

    let mut trace = StageTrace::new("session");
    let stop = loop {
        let event = wait_for_any(&mut autoplay).await;
        if event.type_name() == "autoplay_stop" {
            break event;
        }
        trace.push(event);
    };
    assert_eq!(stop_of(&stop), (AutoplayStopReason::FreeSpinsEnded, 10));
    assert!(!orch.in_bonus());

    let remaining: Vec<u32> = trace
        .events_by_type("autoplay_spin")
        .iter()
        .filter_map(|e| match e.stage {
            Stage::AutoplaySpin { remaining } => Some(remaining),
            _ => None,
        })
        .collect();
    assert_eq!(remaining, vec![2; 10]);
    let stats = orch.stats();
    assert_eq!(stats.free_spins_played, 10);
    assert_eq!(stats.paid_spins, 1);
}

#[tokio::test(start_paused = true)]
async fn test_bonus_end_stops_paid_session() {
    // Every paid spin lands exactly four scatters; free spins land none
    let config = SlotConfig {
        base_scatters: ScatterPlacement::new(4, 4, 0.0),
        max_tumble_steps: 5,
        ..no_bonus_config(22)
    };
    let orch = orchestrator(config, 100.0);
    let scheduler = AutoplayScheduler::new(Arc::clone(&orch), AutoplayConfig::studio());
    let mut autoplay = scheduler.subscribe();
    let mut spins = orch.subscribe();

    scheduler.start(5, SpinMode::Standard).unwrap();
    let stop = wait_for(&mut autoplay, "autoplay_stop").await;
    assert_eq!(stop_of(&stop), (AutoplayStopReason::FreeSpinsEnded, 11));

    tokio::time::sleep(Duration::from_secs(5)).await;
    let trace = drain(&mut spins);
    assert_eq!(trace.count("bonus_entered"), 1);
    assert_eq!(trace.count("bonus_ended"), 1);
    assert_eq!(trace.count("spin_start"), 11);
    // No paid spin after the bonus closed
    let last_start = trace.events.iter().rposition(|e| e.type_name() == "spin_start").unwrap();
    let ended = trace.events.iter().position(|e| e.type_name() == "bonus_ended").unwrap();
    assert!(last_start < ended);

    let stats = orch.stats();
    assert_eq!(stats.paid_spins, 1);
    assert_eq!(stats.free_spins_played, 10);
    assert!(!scheduler.is_active());
}
