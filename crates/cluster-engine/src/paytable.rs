//! Paytable: cluster tiers, per-symbol pays and count-keyed tables

use serde::{Deserialize, Serialize};

use crate::symbols::{SymbolId, SymbolSet};

/// Minimum count of one symbol anywhere on the grid for a cluster win
pub const MATCH_THRESHOLD: usize = 8;

/// Cluster size tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClusterTier {
    /// 8-9 cells by default
    Tier1,
    /// 10-11 cells by default
    Tier2,
    /// 12+ cells by default
    Tier3,
}

impl ClusterTier {
    pub fn index(&self) -> usize {
        match self {
            Self::Tier1 => 0,
            Self::Tier2 => 1,
            Self::Tier3 => 2,
        }
    }
}

/// A table keyed by a count, starting at `min_count`.
/// Counts past the end of `values` use the last entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountTable<T> {
    pub min_count: usize,
    pub values: Vec<T>,
}

impl<T: Copy> CountTable<T> {
    pub fn new(min_count: usize, values: Vec<T>) -> Self {
        Self { min_count, values }
    }

    /// Value for a count, `None` below `min_count` or when the table is empty
    pub fn lookup(&self, count: usize) -> Option<T> {
        if count < self.min_count {
            return None;
        }
        let idx = (count - self.min_count).min(self.values.len().checked_sub(1)?);
        self.values.get(idx).copied()
    }
}

/// Complete paytable (all pays are bet multipliers)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayTable {
    /// Smallest cluster size for each tier, strictly increasing
    pub tier_thresholds: [usize; 3],
    /// Pays per tier, indexed by regular symbol index
    pub tiers: [Vec<f64>; 3],
    /// Scatter pays by scatter count
    pub scatter_pays: CountTable<f64>,
}

impl PayTable {
    /// Standard 9-symbol table
    pub fn standard() -> Self {
        Self {
            tier_thresholds: [MATCH_THRESHOLD, 10, 12],
            tiers: [
                vec![0.25, 0.4, 0.5, 0.8, 1.0, 1.5, 2.0, 2.5, 10.0],
                vec![0.75, 0.9, 1.0, 1.2, 1.5, 2.0, 5.0, 10.0, 25.0],
                vec![2.0, 4.0, 5.0, 8.0, 10.0, 12.0, 15.0, 25.0, 50.0],
            ],
            scatter_pays: CountTable::new(4, vec![3.0, 5.0, 100.0]),
        }
    }

    /// Smallest winning cluster
    pub fn match_threshold(&self) -> usize {
        self.tier_thresholds[0]
    }

    /// Tier for a cluster size, `None` below the match threshold
    pub fn tier_for(&self, count: usize) -> Option<ClusterTier> {
        let [t1, t2, t3] = self.tier_thresholds;
        match count {
            c if c >= t3 => Some(ClusterTier::Tier3),
            c if c >= t2 => Some(ClusterTier::Tier2),
            c if c >= t1 => Some(ClusterTier::Tier1),
            _ => None,
        }
    }

    /// Bet multiplier for a cluster of `count` cells of `symbol`
    pub fn cluster_pay(&self, symbols: &SymbolSet, symbol: SymbolId, count: usize) -> f64 {
        let (Some(tier), Some(idx)) = (self.tier_for(count), symbols.regular_index(symbol)) else {
            return 0.0;
        };
        self.tiers[tier.index()].get(idx).copied().unwrap_or(0.0)
    }

    /// Bet multiplier for `count` scatters
    pub fn scatter_pay(&self, count: usize) -> f64 {
        self.scatter_pays.lookup(count).unwrap_or(0.0)
    }
}

impl Default for PayTable {
    fn default() -> Self {
        Self::standard()
    }
}
