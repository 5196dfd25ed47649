//! Random grid content: columns, scatters and bonus multiplier symbols

use cluster_stage::Cell;
use rand::prelude::*;
use rand::seq::index;

use crate::config::ScatterPlacement;
use crate::grid::Grid;
use crate::symbols::{SCATTER, SymbolId, SymbolSet};

/// Seedable symbol source for one game session
pub struct SymbolGenerator {
    rng: StdRng,
    symbols: SymbolSet,
    /// Distinct regular symbols drawn per column
    difficulty_pool: usize,
}

impl SymbolGenerator {
    /// Create a generator; `None` seeds from OS entropy
    pub fn new(symbols: SymbolSet, difficulty_pool: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            symbols,
            difficulty_pool,
        }
    }

    /// Reseed for reproducible runs
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn symbols(&self) -> &SymbolSet {
        &self.symbols
    }

    /// One column of `len` regular symbols.
    ///
    /// A pool of `difficulty_pool` distinct ids is drawn without
    /// replacement, then every cell samples that pool with replacement.
    pub fn generate_column(&mut self, len: usize) -> Vec<SymbolId> {
        let alphabet = self.symbols.regular_count as usize;
        let pool_size = self.difficulty_pool.clamp(1, alphabet.max(1));
        let pool: Vec<SymbolId> = index::sample(&mut self.rng, alphabet, pool_size)
            .into_iter()
            .map(|i| self.symbols.regular_id(i))
            .collect();

        (0..len)
            .map(|_| pool[self.rng.random_range(0..pool.len())])
            .collect()
    }

    /// Regenerate every column of the grid
    pub fn populate(&mut self, grid: &mut Grid) {
        let rows = grid.rows();
        for c in 0..grid.columns() {
            let fresh = self.generate_column(rows);
            if let Some(column) = grid.column_mut(c) {
                column.copy_from_slice(&fresh);
            }
        }
    }

    /// Fill vacated top slots after a collapse. Returns the refilled cells.
    pub fn refill(&mut self, grid: &mut Grid, vacancies: &[usize]) -> Vec<Cell> {
        let mut added = Vec::new();
        for (column, &gap) in vacancies.iter().enumerate() {
            if gap == 0 {
                continue;
            }
            let fresh = self.generate_column(gap);
            added.extend(grid.fill_top(column, &fresh));
        }
        added.sort();
        added
    }

    /// Place scatters: the first `min_scatter` shuffled coordinates are
    /// forced, each later one rolls `scatter_chance`, capped at `max_scatter`.
    /// Returns the number placed.
    pub fn place_scatters(&mut self, grid: &mut Grid, placement: &ScatterPlacement) -> usize {
        let mut coords: Vec<Cell> = grid.cells().collect();
        coords.shuffle(&mut self.rng);

        let chosen = self.pick(&coords, placement);
        for &cell in &chosen {
            grid.set(cell, SCATTER);
        }
        chosen.len()
    }

    /// Place bonus multiplier symbols with the scatter policy, never on a
    /// scatter cell. Returns the number placed.
    pub fn place_multipliers(&mut self, grid: &mut Grid, placement: &ScatterPlacement) -> usize {
        let values = self.symbols.multiplier_values.len();
        if values == 0 {
            return 0;
        }
        let mut coords: Vec<Cell> = grid
            .cells()
            .filter(|&c| grid.get(c) != Some(SCATTER))
            .collect();
        coords.shuffle(&mut self.rng);

        let chosen = self.pick(&coords, placement);
        for &cell in &chosen {
            let id = self.symbols.multiplier_id(self.rng.random_range(0..values));
            grid.set(cell, id);
        }
        chosen.len()
    }

    fn pick(&mut self, shuffled: &[Cell], placement: &ScatterPlacement) -> Vec<Cell> {
        let mut chosen = Vec::new();
        for (i, &cell) in shuffled.iter().enumerate() {
            if chosen.len() >= placement.max_scatter {
                break;
            }
            if i < placement.min_scatter || self.rng.random::<f64>() < placement.scatter_chance {
                chosen.push(cell);
            }
        }
        chosen
    }
}
