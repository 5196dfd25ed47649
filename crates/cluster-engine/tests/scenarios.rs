//! Spin scenarios through the public API
//!
//! Covers cluster detection, bonus entry, reentrancy, forced scatters,
//! tumble termination and the free-spin bookkeeping modes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use cluster_engine::cluster_stage::{Cell, Stage, StageEvent, StageTrace, WinTier};
use approx::assert_relative_eq;
use cluster_engine::{
    CompletionHandle, CompletionSignal, FreeSpinAuthority, GamePhase, Grid, GridError, GridSpec,
    InMemoryAccount, InstantPresentation, MULTIPLIER_BASE, MatchDetector, MatchOutcome, Presentation,
    SCATTER, ScatterPlacement, SlotConfig, SpinError, SpinMode, SpinOrchestrator, SymbolGenerator,
    SymbolId, TriggerEffect,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;

// ═══════════════════════════════════════════════════════════════════════════════
// TEST FIXTURES
// ═══════════════════════════════════════════════════════════════════════════════

fn seeded_config(seed: u64) -> SlotConfig {
    SlotConfig {
        seed: Some(seed),
        ..SlotConfig::default()
    }
}

fn orchestrator(config: SlotConfig, balance: f64) -> SpinOrchestrator {
    SpinOrchestrator::new(
        config,
        Arc::new(InMemoryAccount::new(balance)),
        Arc::new(InstantPresentation),
    )
    .unwrap()
}

/// 6x5 grid (row-major) with no symbol reaching 8 and `scatters` leading scatters
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

fn drain(rx: &mut broadcast::Receiver<StageEvent>) -> StageTrace {
    let mut trace = StageTrace::new("drain");
    while let Ok(event) = rx.try_recv() {
        trace.push(event);
    }
    trace
}

/// Holds every reel-drop completion until released
#[derive(Default)]
struct HeldReelDrop {
    handles: Mutex<Vec<CompletionHandle>>,
    drops: AtomicUsize,
}

impl HeldReelDrop {
    fn release(&self) {
        for handle in self.handles.lock().drain(..) {
            handle.complete();
        }
    }
}

impl Presentation for HeldReelDrop {
    fn play_reel_drop(&self, _grid: &Grid, _turbo: bool) -> CompletionSignal {
        self.drops.fetch_add(1, Ordering::SeqCst);
        let (handle, signal) = CompletionSignal::pair();
        self.handles.lock().push(handle);
        signal
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

struct RemoteCounter(AtomicU32);

impl FreeSpinAuthority for RemoteCounter {
    fn remaining(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MATCH DETECTION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_exactly_eight_of_a_symbol_pays_tier_one() {
    let config = SlotConfig::default();
    let detector = MatchDetector::from_config(&config);

    // Symbol 5 on eight cells; the other 22 cycle through the remaining eight ids
    let others: Vec<SymbolId> = vec![1, 2, 3, 4, 6, 7, 8, 9];
    let mut other_iter = others.iter().cycle();
    let rows: Vec<Vec<SymbolId>> = (0..5)
        .map(|r| {
            (0..6)
                .map(|c| {
                    if r * 6 + c < 8 {
                        5
                    } else {
                        *other_iter.next().unwrap()
                    }
                })
                .collect()
        })
        .collect();
    let grid = Grid::from_rows(&rows).unwrap();

    let bet = 2.0;
    let MatchOutcome::Cluster(win) = detector.evaluate(&grid, bet, GamePhase::Base) else {
        panic!("expected a cluster win");
    };
    assert_eq!(win.symbol, 5);
    assert_eq!(win.count(), 8);
    assert_eq!(win.win, config.paytable.tiers[0][4] * bet);
}

#[test]
fn test_quiet_grid_is_idempotent_no_match() {
    let detector = MatchDetector::default();
    let grid = quiet_grid(3);
    for _ in 0..10 {
        assert_eq!(detector.evaluate(&grid, 1.0, GamePhase::Base), MatchOutcome::NoMatch);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BONUS ENTRY
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_four_scatters_enter_bonus_with_ten_spins() {
    let orch = orchestrator(seeded_config(1), 50.0);
    let mut rx = orch.subscribe();

    let attempt = orch
        .spin_with_grid(SpinMode::Standard, quiet_grid(4))
        .await
        .unwrap();
    let summary = attempt.summary().unwrap();

    assert!(matches!(
        summary.bonus,
        TriggerEffect::Entered {
            free_spins: 10,
            scatter_count: 4,
            ..
        }
    ));
    let ctx = orch.context();
    assert!(ctx.is_bonus_round);
    assert_eq!(ctx.free_spins, 10);

    let trace = drain(&mut rx);
    assert_eq!(
        trace.type_sequence(),
        vec!["spin_start", "bonus_entered", "spin_settled"]
    );
}

#[tokio::test]
async fn test_initial_scatter_award_credited_once() {
    let orch = orchestrator(seeded_config(2), 50.0);
    orch.spin_with_grid(SpinMode::Standard, quiet_grid(5)).await.unwrap();
    assert_eq!(orch.free_spins_remaining(), 12);

    let mut rx = orch.subscribe();
    let first = orch.spin_with_grid(SpinMode::Standard, quiet_grid(0)).await.unwrap();
    let second = orch.spin_with_grid(SpinMode::Standard, quiet_grid(0)).await.unwrap();

    // 5 scatters pay 5x bet, held until the first free spin
    assert_eq!(first.summary().unwrap().total_win, 5.0);
    assert_eq!(first.summary().unwrap().cost, 0.0);
    assert_eq!(second.summary().unwrap().total_win, 0.0);
    assert_eq!(orch.free_spins_remaining(), 10);

    let trace = drain(&mut rx);
    assert_eq!(trace.count("scatter_award_credited"), 1);
    assert_eq!(orch.balance(), 54.0);
}

#[tokio::test]
async fn test_bonus_round_runs_out_and_returns_to_base() {
    let orch = orchestrator(seeded_config(3), 50.0);
    orch.spin_with_grid(SpinMode::Standard, quiet_grid(4)).await.unwrap();

    let mut rx = orch.subscribe();
    for spin in 0..10 {
        let attempt = orch.spin_with_grid(SpinMode::Standard, quiet_grid(0)).await.unwrap();
        let summary = attempt.summary().unwrap();
        assert_eq!(summary.bonus_ended, spin == 9);
    }
    assert_eq!(orch.game_phase(), GamePhase::Base);

    let trace = drain(&mut rx);
    assert_eq!(trace.count("bonus_ended"), 1);
    assert_eq!(trace.type_sequence().last(), Some(&"bonus_ended"));
}

#[tokio::test]
async fn test_retrigger_adds_free_spins() {
    let orch = orchestrator(seeded_config(4), 50.0);
    orch.spin_with_grid(SpinMode::Standard, quiet_grid(4)).await.unwrap();

    let mut rx = orch.subscribe();
    let attempt = orch.spin_with_grid(SpinMode::Standard, quiet_grid(3)).await.unwrap();
    assert!(matches!(
        attempt.summary().unwrap().bonus,
        TriggerEffect::Retriggered {
            added: 5,
            remaining: 15,
            ..
        }
    ));
    // One spin consumed after the award
    assert_eq!(orch.free_spins_remaining(), 14);
    assert!(drain(&mut rx).has_stage("free_spins_awarded"));
}

#[tokio::test]
async fn test_external_free_spin_authority_is_never_written() {
    let remote = Arc::new(RemoteCounter(AtomicU32::new(3)));
    let orch = orchestrator(seeded_config(5), 50.0).with_free_spin_authority(remote.clone());

    orch.spin_with_grid(SpinMode::Standard, quiet_grid(4)).await.unwrap();
    assert!(orch.in_bonus());
    assert_eq!(orch.free_spins_remaining(), 3);

    let attempt = orch.spin_with_grid(SpinMode::Standard, quiet_grid(0)).await.unwrap();
    assert!(!attempt.summary().unwrap().bonus_ended);
    assert_eq!(remote.remaining(), 3);

    remote.0.store(0, Ordering::SeqCst);
    let attempt = orch.spin_with_grid(SpinMode::Standard, quiet_grid(0)).await.unwrap();
    assert!(attempt.summary().unwrap().bonus_ended);
    assert!(!orch.in_bonus());
}

// ═══════════════════════════════════════════════════════════════════════════════
// BONUS MULTIPLIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Symbol 5 on the first eight cells; the bottom-right cell optionally
/// holds `extra`
fn cluster_grid(extra: Option<SymbolId>) -> Grid {
    let others: Vec<SymbolId> = vec![1, 2, 3, 4, 6, 7, 8, 9];
    let mut other_iter = others.iter().cycle();
    let mut rows: Vec<Vec<SymbolId>> = (0..5)
        .map(|r| {
            (0..6)
                .map(|c| if r * 6 + c < 8 { 5 } else { *other_iter.next().unwrap() })
                .collect()
        })
        .collect();
    if let Some(symbol) = extra {
        rows[4][5] = symbol;
    }
    Grid::from_rows(&rows).unwrap()
}

fn multiplier_applied(trace: &StageTrace) -> Option<(u32, f64, f64)> {
    trace.events_by_type("multiplier_apply").first().and_then(|e| match e.stage {
        Stage::MultiplierApply {
            multiplier,
            base_win,
            total_win,
        } => Some((multiplier, base_win, total_win)),
        _ => None,
    })
}

#[tokio::test]
async fn test_multiplier_boosts_winning_free_spin() {
    let orch = orchestrator(seeded_config(31), 50.0);
    orch.spin_with_grid(SpinMode::Standard, quiet_grid(4)).await.unwrap();
    assert!(orch.in_bonus());

    // MULTIPLIER_BASE + 1 carries x3 in the default alphabet
    let mut rx = orch.subscribe();
    let attempt = orch
        .spin_with_grid(SpinMode::Standard, cluster_grid(Some(MULTIPLIER_BASE + 1)))
        .await
        .unwrap();
    let summary = attempt.summary().unwrap();
    assert_eq!(summary.multiplier, Some(3));
    assert!(summary.tumble_steps >= 1);

    let trace = drain(&mut rx);
    assert_eq!(trace.count("multiplier_apply"), 1);
    let (multiplier, base_win, boosted) = multiplier_applied(&trace).unwrap();
    assert_eq!(multiplier, 3);
    assert!(base_win >= 1.0);
    assert_relative_eq!(boosted, base_win * 3.0);
    // The held 4-scatter award (3x bet) is added unmultiplied
    assert_relative_eq!(summary.total_win, boosted + 3.0);
    // The multiplier symbol survives the tumbles
    assert_eq!(summary.grid.count(MULTIPLIER_BASE + 1), 1);
}

#[tokio::test]
async fn test_multiplier_needs_a_winning_bonus_sequence() {
    let orch = orchestrator(seeded_config(32), 50.0);
    orch.spin_with_grid(SpinMode::Standard, quiet_grid(4)).await.unwrap();
    // First free spin collects the held award
    orch.spin_with_grid(SpinMode::Standard, quiet_grid(0)).await.unwrap();

    let mut grid = quiet_grid(0);
    grid.set(Cell::new(4, 5), MULTIPLIER_BASE + 1);
    let mut rx = orch.subscribe();
    let attempt = orch.spin_with_grid(SpinMode::Standard, grid).await.unwrap();
    let summary = attempt.summary().unwrap();
    assert_eq!(summary.multiplier, None);
    assert_eq!(summary.total_win, 0.0);
    assert_eq!(drain(&mut rx).count("multiplier_apply"), 0);
}

#[tokio::test]
async fn test_base_game_never_applies_multipliers() {
    let orch = orchestrator(seeded_config(33), 50.0);
    let mut rx = orch.subscribe();
    let attempt = orch.spin_with_grid(SpinMode::Standard, cluster_grid(None)).await.unwrap();
    let summary = attempt.summary().unwrap();
    assert!(summary.total_win > 0.0);
    assert_eq!(summary.multiplier, None);
    assert_eq!(drain(&mut rx).count("multiplier_apply"), 0);

    // Multiplier ids cannot be forced onto a base-game grid
    let err = orch
        .spin_with_grid(SpinMode::Standard, cluster_grid(Some(MULTIPLIER_BASE + 1)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SpinError::InvalidGridState(GridError::MultiplierOutsideBonus { .. })
    ));
}

// ═══════════════════════════════════════════════════════════════════════════════
// REENTRANCY
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_spin_while_spinning_is_ignored() {
    let presentation = Arc::new(HeldReelDrop::default());
    let orch = Arc::new(
        SpinOrchestrator::new(
            seeded_config(6),
            Arc::new(InMemoryAccount::new(100.0)),
            presentation.clone(),
        )
        .unwrap(),
    );
    let mut rx = orch.subscribe();

    let first = tokio::spawn({
        let orch = Arc::clone(&orch);
        async move { orch.spin(SpinMode::Standard).await }
    });

    let event = rx.recv().await.unwrap();
    assert_eq!(event.type_name(), "spin_start");
    assert!(!orch.is_idle());

    let second = orch.spin(SpinMode::Standard).await.unwrap();
    assert!(second.is_ignored());
    assert_eq!(presentation.drops.load(Ordering::SeqCst), 1);
    assert_eq!(orch.balance(), 99.0);

    presentation.release();
    let summary = first.await.unwrap().unwrap();
    assert_eq!(summary.summary().unwrap().spin_index, 1);

    let trace = drain(&mut rx);
    assert_eq!(trace.count("spin_start"), 0);
    assert_eq!(trace.count("spin_settled"), 1);
    assert!(orch.is_idle());
}

// ═══════════════════════════════════════════════════════════════════════════════
// FORCED SCATTERS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_min_scatter_guarantees_count_regardless_of_chance() {
    let config = SlotConfig::default();
    let mut generator = SymbolGenerator::new(config.symbol_set(), config.difficulty_pool, Some(8));
    for chance in [0.0, 0.3, 1.0] {
        for _ in 0..50 {
            let mut grid = Grid::filled(config.grid, 1);
            generator.populate(&mut grid);
            generator.place_scatters(&mut grid, &ScatterPlacement::new(4, 6, chance));
            assert!(grid.count(SCATTER) >= 4);
        }
    }
}

#[tokio::test]
async fn test_feature_buy_forces_bonus_entry() {
    let config = SlotConfig {
        base_scatters: ScatterPlacement::none(),
        ..seeded_config(9)
    };
    let orch = orchestrator(config, 500.0);
    let mut rx = orch.subscribe();

    let attempt = orch.spin(SpinMode::FeatureBuy).await.unwrap();
    let summary = attempt.summary().unwrap();
    assert_eq!(summary.cost, 100.0);
    assert!(matches!(summary.bonus, TriggerEffect::Entered { .. }));

    let trace = drain(&mut rx);
    let start = trace.events_by_type("spin_start");
    let Stage::SpinStart { grid, .. } = &start[0].stage else {
        panic!("expected spin_start");
    };
    let scatters = grid.iter().flatten().filter(|&&s| s == SCATTER).count();
    assert!(scatters >= 4);
}

// ═══════════════════════════════════════════════════════════════════════════════
// TUMBLE PROPERTIES
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_tumbles_terminate_and_keep_dimensions() {
    let config = SlotConfig {
        max_tumble_steps: 50,
        ..seeded_config(2024)
    };
    let spec = config.grid;
    let threshold = config.paytable.match_threshold();
    let orch = orchestrator(config, 1_000_000.0);
    let mut rx = orch.subscribe();

    for _ in 0..400 {
        let attempt = orch.spin(SpinMode::Standard).await.unwrap();
        let summary = attempt.summary().unwrap();
        assert!(summary.tumble_steps < 50);
        assert!(!summary.hit_ceiling);
        assert_eq!(summary.grid.spec(), spec);

        for event in drain(&mut rx).events {
            if let Stage::TumbleStep { removed, added, .. } = event.stage {
                assert!(removed.len() >= threshold);
                assert_eq!(removed.len(), added.len());
            }
        }
    }

    let stats = orch.stats();
    assert_eq!(stats.total_spins, 400);
    assert_eq!(stats.tumble_ceiling_hits, 0);
}

#[tokio::test]
async fn test_grid_matches_configured_spec() {
    let config = SlotConfig {
        grid: GridSpec { rows: 7, columns: 7 },
        ..seeded_config(77)
    };
    let orch = orchestrator(config, 1_000.0);
    for _ in 0..20 {
        let attempt = orch.spin(SpinMode::Standard).await.unwrap();
        assert_eq!(attempt.summary().unwrap().grid.spec(), GridSpec { rows: 7, columns: 7 });
    }
}
