//! Cascade Resolver — the tumble loop
//!
//! Per step: await the removal animation, collapse the winning cells out
//! of each column, refill the vacated top slots, add the step win and
//! re-evaluate. The loop ends on the first pass without a cluster, or at
//! the step ceiling, in which case only the scatter check runs.

use std::time::Duration;

use cluster_stage::Stage;

use crate::accumulator::WinAccumulator;
use crate::bonus::GamePhase;
use crate::detector::{MatchDetector, MatchOutcome};
use crate::generator::SymbolGenerator;
use crate::grid::Grid;
use crate::presentation::Presentation;
use crate::signals::StageBus;

/// Per-spin inputs the resolver does not own
pub struct CascadeEnv<'a> {
    pub bet: f64,
    pub phase: GamePhase,
    pub turbo: bool,
    pub spin_index: u64,
    pub presentation: &'a dyn Presentation,
    pub bus: &'a StageBus,
}

/// Outcome of one tumble sequence
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeReport {
    /// Tumble steps resolved
    pub steps: u32,
    /// Win produced by the sequence
    pub sequence_win: f64,
    /// Terminal evaluation: scatter trigger or no match
    pub outcome: MatchOutcome,
    /// Stopped by the step ceiling with a cluster still on the grid
    pub hit_ceiling: bool,
}

#[derive(Debug, Clone)]
pub struct CascadeResolver {
    detector: MatchDetector,
    max_steps: u32,
    signal_timeout: Duration,
}

impl CascadeResolver {
    pub fn new(detector: MatchDetector, max_steps: u32, signal_timeout: Duration) -> Self {
        Self {
            detector,
            max_steps: max_steps.max(1),
            signal_timeout,
        }
    }

    pub fn detector(&self) -> &MatchDetector {
        &self.detector
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub async fn resolve(
        &self,
        grid: &mut Grid,
        generator: &mut SymbolGenerator,
        env: &CascadeEnv<'_>,
        wins: &mut WinAccumulator,
    ) -> CascadeReport {
        let mut steps = 0u32;
        let mut sequence_win = 0.0;
        let mut hit_ceiling = false;
        let mut outcome = self.detector.evaluate(grid, env.bet, env.phase);

        let terminal = loop {
            let cluster = match outcome {
                MatchOutcome::Cluster(cluster) => cluster,
                other => break other,
            };

            if steps >= self.max_steps {
                log::warn!(
                    "[Cascade] Step ceiling ({}) reached on spin {}; keeping win {:.2}",
                    self.max_steps,
                    env.spin_index,
                    sequence_win
                );
                hit_ceiling = true;
                break match self.detector.check_scatter(grid, env.bet, env.phase) {
                    Some(trigger) => MatchOutcome::Scatter(trigger),
                    None => MatchOutcome::NoMatch,
                };
            }

            env.presentation
                .play_removal(&cluster.cells, env.turbo)
                .wait(self.signal_timeout, "removal")
                .await;

            let vacancies = grid.collapse(&cluster.cells);
            let added = generator.refill(grid, &vacancies);
            sequence_win += cluster.win;
            let running_win = wins.add_tumble(cluster.win);

            log::debug!(
                "[Cascade] Step {}: {} x symbol {} pays {:.2} (running {:.2})",
                steps,
                cluster.count(),
                cluster.symbol,
                cluster.win,
                running_win
            );
            env.bus.emit(
                Stage::TumbleStep {
                    step_index: steps,
                    symbol_id: cluster.symbol,
                    removed: cluster.cells,
                    added,
                    step_win: cluster.win,
                    running_win,
                },
                env.spin_index,
            );

            steps += 1;
            outcome = self.detector.evaluate(grid, env.bet, env.phase);
        };

        CascadeReport {
            steps,
            sequence_win,
            outcome: terminal,
            hit_ceiling,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GridSpec, SlotConfig};
    use crate::presentation::InstantPresentation;
    use crate::symbols::SymbolSet;

    fn resolver(max_steps: u32) -> CascadeResolver {
        CascadeResolver::new(MatchDetector::default(), max_steps, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_no_cluster_no_steps() {
        let rows: Vec<Vec<u32>> = (0..5)
            .map(|r| (0..6).map(|c| ((r * 6 + c) % 9 + 1) as u32).collect())
            .collect();
        let mut grid = Grid::from_rows(&rows).unwrap();
        let before = grid.clone();
        let mut generator = SymbolGenerator::new(SymbolSet::default(), 4, Some(1));
        let bus = StageBus::new();
        let env = CascadeEnv {
            bet: 1.0,
            phase: GamePhase::Base,
            turbo: false,
            spin_index: 1,
            presentation: &InstantPresentation,
            bus: &bus,
        };
        let mut wins = WinAccumulator::new();

        let report = resolver(50).resolve(&mut grid, &mut generator, &env, &mut wins).await;
        assert_eq!(report.steps, 0);
        assert_eq!(report.outcome, MatchOutcome::NoMatch);
        assert_eq!(grid, before);
    }

    #[tokio::test]
    async fn test_full_grid_tumbles_and_emits_steps() {
        let mut grid = Grid::filled(GridSpec::standard_6x5(), 4);
        let mut generator = SymbolGenerator::new(SymbolSet::default(), 4, Some(21));
        let bus = StageBus::new();
        let mut rx = bus.subscribe();
        let env = CascadeEnv {
            bet: 1.0,
            phase: GamePhase::Base,
            turbo: true,
            spin_index: 7,
            presentation: &InstantPresentation,
            bus: &bus,
        };
        let mut wins = WinAccumulator::new();
        wins.begin_spin();

        let report = resolver(50).resolve(&mut grid, &mut generator, &env, &mut wins).await;
        assert!(report.steps >= 1);
        assert!(!report.outcome.is_cluster());
        assert_eq!(grid.spec(), GridSpec::standard_6x5());
        assert!((wins.spin_win() - report.sequence_win).abs() < 1e-9);

        let first = rx.recv().await.unwrap();
        match first.stage {
            Stage::TumbleStep {
                step_index,
                symbol_id,
                removed,
                added,
                step_win,
                ..
            } => {
                assert_eq!(step_index, 0);
                assert_eq!(symbol_id, 4);
                assert_eq!(removed.len(), 30);
                assert_eq!(added.len(), 30);
                // symbol 4, tier 3
                assert_eq!(step_win, 8.0);
            }
            other => panic!("unexpected stage {other:?}"),
        }
        assert_eq!(first.spin_index, 7);
    }

    #[tokio::test]
    async fn test_ceiling_stops_loop() {
        // One regular symbol: every refill is another full cluster
        let config = SlotConfig {
            regular_symbols: 2,
            difficulty_pool: 1,
            ..SlotConfig::default()
        };
        let mut paytable = config.paytable.clone();
        for tier in paytable.tiers.iter_mut() {
            tier.truncate(2);
        }
        let detector = MatchDetector::new(paytable, config.symbol_set(), config.free_spins.clone());
        let resolver = CascadeResolver::new(detector, 3, Duration::from_secs(1));

        let mut grid = Grid::filled(GridSpec::standard_6x5(), 1);
        let mut generator = SymbolGenerator::new(config.symbol_set(), 1, Some(2));
        let bus = StageBus::new();
        let env = CascadeEnv {
            bet: 1.0,
            phase: GamePhase::Base,
            turbo: false,
            spin_index: 1,
            presentation: &InstantPresentation,
            bus: &bus,
        };
        let mut wins = WinAccumulator::new();

        let report = resolver.resolve(&mut grid, &mut generator, &env, &mut wins).await;
        assert_eq!(report.steps, 3);
        assert!(report.hit_ceiling);
        assert_eq!(report.outcome, MatchOutcome::NoMatch);
        assert!(report.sequence_win > 0.0);
    }
}
