//! Match Detector — cluster-pays evaluation of a grid snapshot
//!
//! There are no paylines: a symbol wins when its total count anywhere on
//! the grid reaches the match threshold. One symbol is resolved per pass;
//! when several qualify at once the lowest symbol id wins. If no cluster
//! qualifies, the scatter count is checked against the trigger table for
//! the current phase.

use cluster_stage::Cell;
use serde::{Deserialize, Serialize};

use crate::bonus::GamePhase;
use crate::config::{FreeSpinAwards, SlotConfig};
use crate::grid::Grid;
use crate::paytable::{ClusterTier, PayTable};
use crate::symbols::{SCATTER, SymbolId, SymbolSet};

/// A resolved cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterWin {
    /// Winning symbol
    pub symbol: SymbolId,
    /// Every cell holding the symbol, row-major
    pub cells: Vec<Cell>,
    /// Size tier
    pub tier: ClusterTier,
    /// Win amount (bet already applied)
    pub win: f64,
}

impl ClusterWin {
    pub fn count(&self) -> usize {
        self.cells.len()
    }
}

/// A qualifying scatter count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterTrigger {
    /// Scatters on the grid
    pub count: usize,
    /// Their positions, row-major
    pub cells: Vec<Cell>,
    /// Free spins awarded (entry) or added (retrigger)
    pub free_spins: u32,
    /// Scatter pay amount (bet already applied)
    pub pay: f64,
    /// Evaluated inside the bonus round
    pub retrigger: bool,
}

/// Result of one evaluation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Cluster(ClusterWin),
    Scatter(ScatterTrigger),
    NoMatch,
}

impl MatchOutcome {
    pub fn is_cluster(&self) -> bool {
        matches!(self, Self::Cluster(_))
    }

    pub fn scatter(&self) -> Option<&ScatterTrigger> {
        match self {
            Self::Scatter(trigger) => Some(trigger),
            _ => None,
        }
    }
}

/// Stateless evaluator over a paytable and award tables
#[derive(Debug, Clone)]
pub struct MatchDetector {
    paytable: PayTable,
    symbols: SymbolSet,
    awards: FreeSpinAwards,
}

impl MatchDetector {
    pub fn new(paytable: PayTable, symbols: SymbolSet, awards: FreeSpinAwards) -> Self {
        Self {
            paytable,
            symbols,
            awards,
        }
    }

    pub fn from_config(config: &SlotConfig) -> Self {
        Self::new(
            config.paytable.clone(),
            config.symbol_set(),
            config.free_spins.clone(),
        )
    }

    pub fn paytable(&self) -> &PayTable {
        &self.paytable
    }

    pub fn symbols(&self) -> &SymbolSet {
        &self.symbols
    }

    /// Full pass: cluster first, then scatter
    pub fn evaluate(&self, grid: &Grid, bet: f64, phase: GamePhase) -> MatchOutcome {
        if let Some(cluster) = self.find_cluster(grid, bet) {
            return MatchOutcome::Cluster(cluster);
        }
        match self.check_scatter(grid, bet, phase) {
            Some(trigger) => MatchOutcome::Scatter(trigger),
            None => MatchOutcome::NoMatch,
        }
    }

    /// Lowest regular symbol id whose count reaches the threshold
    pub fn find_cluster(&self, grid: &Grid, bet: f64) -> Option<ClusterWin> {
        let mut counts = vec![0usize; self.symbols.regular_count as usize];
        for symbol in grid.symbols() {
            if let Some(idx) = self.symbols.regular_index(symbol) {
                counts[idx] += 1;
            }
        }

        let threshold = self.paytable.match_threshold();
        let (idx, &count) = counts.iter().enumerate().find(|(_, c)| **c >= threshold)?;
        let symbol = self.symbols.regular_id(idx);
        let tier = self.paytable.tier_for(count)?;
        let win = self.paytable.cluster_pay(&self.symbols, symbol, count) * bet;

        Some(ClusterWin {
            symbol,
            cells: grid.positions_of(symbol),
            tier,
            win,
        })
    }

    /// Scatter check for the given phase
    pub fn check_scatter(&self, grid: &Grid, bet: f64, phase: GamePhase) -> Option<ScatterTrigger> {
        let count = grid.count(SCATTER);
        let (table, retrigger) = match phase {
            GamePhase::Base => (&self.awards.trigger, false),
            GamePhase::Bonus => (&self.awards.retrigger, true),
        };
        let free_spins = table.lookup(count)?;

        Some(ScatterTrigger {
            count,
            cells: grid.positions_of(SCATTER),
            free_spins,
            pay: self.paytable.scatter_pay(count) * bet,
            retrigger,
        })
    }
}

impl Default for MatchDetector {
    fn default() -> Self {
        Self::from_config(&SlotConfig::default())
    }
}
