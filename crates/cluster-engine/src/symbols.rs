//! Symbol identifiers and the symbol alphabet

use serde::{Deserialize, Serialize};

/// Raw symbol identifier as stored in the grid
pub type SymbolId = u32;

/// First regular (paying) symbol id. Regular ids are contiguous from here.
pub const FIRST_REGULAR: SymbolId = 1;

/// Upper bound on the regular alphabet so it never collides with the
/// reserved ids below.
pub const MAX_REGULAR_SYMBOLS: u32 = 64;

/// Reserved scatter symbol id
pub const SCATTER: SymbolId = 90;

/// Start of the reserved bonus-round multiplier ("bomb") sub-range
pub const MULTIPLIER_BASE: SymbolId = 100;

/// Size of the multiplier sub-range
pub const MULTIPLIER_RANGE: u32 = 100;

/// Symbol type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SymbolKind {
    /// Regular paying symbol, forms clusters
    Regular = 0,
    /// Scatter - triggers the bonus round regardless of position
    Scatter = 1,
    /// Bonus-round multiplier symbol
    Multiplier = 2,
}

/// The alphabet a game draws from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSet {
    /// Number of regular symbols (ids `FIRST_REGULAR..FIRST_REGULAR + regular_count`)
    pub regular_count: u32,
    /// Multiplier value for each multiplier id, indexed from `MULTIPLIER_BASE`
    pub multiplier_values: Vec<u32>,
}

impl SymbolSet {
    pub fn new(regular_count: u32, multiplier_values: Vec<u32>) -> Self {
        Self {
            regular_count,
            multiplier_values,
        }
    }

    /// All regular symbol ids in ascending order
    pub fn regular_ids(&self) -> impl Iterator<Item = SymbolId> + '_ {
        FIRST_REGULAR..FIRST_REGULAR + self.regular_count
    }

    /// Zero-based index of a regular symbol (paytable column)
    pub fn regular_index(&self, id: SymbolId) -> Option<usize> {
        if id >= FIRST_REGULAR && id < FIRST_REGULAR + self.regular_count {
            Some((id - FIRST_REGULAR) as usize)
        } else {
            None
        }
    }

    /// Regular symbol id for a zero-based index
    pub fn regular_id(&self, index: usize) -> SymbolId {
        FIRST_REGULAR + index as SymbolId
    }

    /// Multiplier symbol id for a value index
    pub fn multiplier_id(&self, index: usize) -> SymbolId {
        MULTIPLIER_BASE + index as SymbolId
    }

    /// Multiplier value carried by a symbol, if it is a multiplier
    pub fn multiplier_value(&self, id: SymbolId) -> Option<u32> {
        if id < MULTIPLIER_BASE {
            return None;
        }
        self.multiplier_values
            .get((id - MULTIPLIER_BASE) as usize)
            .copied()
    }

    /// Classify an id; `None` for ids outside the alphabet
    pub fn kind(&self, id: SymbolId) -> Option<SymbolKind> {
        if self.regular_index(id).is_some() {
            Some(SymbolKind::Regular)
        } else if id == SCATTER {
            Some(SymbolKind::Scatter)
        } else if self.multiplier_value(id).is_some() {
            Some(SymbolKind::Multiplier)
        } else {
            None
        }
    }

    /// Check if the id belongs to this alphabet
    pub fn is_valid(&self, id: SymbolId) -> bool {
        self.kind(id).is_some()
    }
}

impl Default for SymbolSet {
    fn default() -> Self {
        Self::new(9, vec![2, 3, 4, 5, 6, 8, 10, 12, 15, 20, 25, 50, 100])
    }
}
