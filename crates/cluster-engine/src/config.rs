//! Slot engine configuration

use std::path::Path;
use std::time::Duration;

use cluster_stage::{SpinKind, WinTier};
use serde::{Deserialize, Serialize};

use crate::paytable::{CountTable, PayTable};
use crate::symbols::{MAX_REGULAR_SYMBOLS, MULTIPLIER_RANGE, SymbolSet};

/// Grid specification (rows × columns)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Number of visible rows per column
    pub rows: usize,
    /// Number of columns
    pub columns: usize,
}

impl GridSpec {
    /// Standard 6 columns × 5 rows cluster grid
    pub fn standard_6x5() -> Self {
        Self {
            rows: 5,
            columns: 6,
        }
    }

    /// Total grid positions
    pub fn total_positions(&self) -> usize {
        self.rows * self.columns
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        Self::standard_6x5()
    }
}

/// Scatter placement policy for one spin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScatterPlacement {
    /// Scatters forced onto the first shuffled coordinates
    pub min_scatter: usize,
    /// Hard cap on scatters placed
    pub max_scatter: usize,
    /// Independent chance per remaining coordinate
    pub scatter_chance: f64,
}

impl ScatterPlacement {
    pub fn new(min_scatter: usize, max_scatter: usize, scatter_chance: f64) -> Self {
        Self {
            min_scatter,
            max_scatter,
            scatter_chance,
        }
    }

    /// No scatters at all
    pub fn none() -> Self {
        Self::new(0, 0, 0.0)
    }
}

/// Bonus-round multiplier ("bomb") symbol policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplierSymbolConfig {
    /// Place multiplier symbols during the bonus round
    pub enabled: bool,
    /// Placement uses the scatter policy shape
    pub placement: ScatterPlacement,
    /// Available multiplier values; each maps to one reserved symbol id
    pub values: Vec<u32>,
}

impl Default for MultiplierSymbolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            placement: ScatterPlacement::new(0, 4, 0.03),
            values: vec![2, 3, 4, 5, 6, 8, 10, 12, 15, 20, 25, 50, 100],
        }
    }
}

/// Pricing for paid spin modes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    /// Base bet per spin
    pub bet: f64,
    /// Feature buy price as a bet multiple
    pub feature_buy_multiplier: f64,
    /// Enhanced (ante) bet price as a bet multiple
    pub enhanced_bet_multiplier: f64,
    /// Scatter chance factor while the enhanced bet is active
    pub enhanced_scatter_factor: f64,
    /// Scatters forced by a feature buy
    pub feature_buy_scatters: usize,
}

impl Pricing {
    /// Amount debited for a spin of this kind at the configured bet
    pub fn cost(&self, kind: SpinKind) -> f64 {
        self.price(kind, self.bet)
    }

    /// Amount debited for a spin of this kind at `bet`
    pub fn price(&self, kind: SpinKind, bet: f64) -> f64 {
        match kind {
            SpinKind::Standard => bet,
            SpinKind::EnhancedBet => bet * self.enhanced_bet_multiplier,
            SpinKind::FeatureBuy => bet * self.feature_buy_multiplier,
            SpinKind::Free => 0.0,
        }
    }
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            bet: 1.0,
            feature_buy_multiplier: 100.0,
            enhanced_bet_multiplier: 1.25,
            enhanced_scatter_factor: 2.0,
            feature_buy_scatters: 4,
        }
    }
}

/// Win celebration thresholds (win-to-bet ratios)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinTierThresholds {
    /// Minimum ratio for "big win"; also the overlay threshold
    pub big_win: f64,
    /// Minimum ratio for "mega win"
    pub mega_win: f64,
    /// Minimum ratio for "epic win"
    pub epic_win: f64,
}

impl WinTierThresholds {
    /// Celebration tier for a ratio
    pub fn tier_for(&self, ratio: f64) -> Option<WinTier> {
        if ratio >= self.epic_win {
            Some(WinTier::Epic)
        } else if ratio >= self.mega_win {
            Some(WinTier::Mega)
        } else if ratio >= self.big_win {
            Some(WinTier::Big)
        } else {
            None
        }
    }
}

impl Default for WinTierThresholds {
    fn default() -> Self {
        Self {
            big_win: 10.0,
            mega_win: 25.0,
            epic_win: 50.0,
        }
    }
}

/// Free spins awarded by scatter count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeSpinAwards {
    /// Base game entry: 4→10, 5→12, 6+→15
    pub trigger: CountTable<u32>,
    /// Inside the bonus round: 3→5, 4→10, 5→12, 6+→15 added
    pub retrigger: CountTable<u32>,
}

impl Default for FreeSpinAwards {
    fn default() -> Self {
        Self {
            trigger: CountTable::new(4, vec![10, 12, 15]),
            retrigger: CountTable::new(3, vec![5, 10, 12, 15]),
        }
    }
}

/// Complete slot configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    /// Grid dimensions
    pub grid: GridSpec,
    /// Number of regular symbols
    pub regular_symbols: u32,
    /// Distinct symbols drawn per generated column (must be < regular_symbols)
    pub difficulty_pool: usize,
    /// Payouts
    pub paytable: PayTable,
    /// Scatter policy in the base game
    pub base_scatters: ScatterPlacement,
    /// Scatter policy inside the bonus round
    pub bonus_scatters: ScatterPlacement,
    /// Bonus-round multiplier symbols
    pub multipliers: MultiplierSymbolConfig,
    /// Free spin award tables
    pub free_spins: FreeSpinAwards,
    /// Bet and mode pricing
    pub pricing: Pricing,
    /// Celebration thresholds
    pub win_tiers: WinTierThresholds,
    /// Safety ceiling on tumble steps per spin
    pub max_tumble_steps: u32,
    /// Upper bound on any awaited presentation signal (ms)
    pub signal_timeout_ms: u64,
    /// RNG seed (None = OS entropy)
    pub seed: Option<u64>,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            grid: GridSpec::default(),
            regular_symbols: 9,
            difficulty_pool: 4,
            paytable: PayTable::standard(),
            base_scatters: ScatterPlacement::new(0, 6, 0.025),
            bonus_scatters: ScatterPlacement::new(0, 5, 0.02),
            multipliers: MultiplierSymbolConfig::default(),
            free_spins: FreeSpinAwards::default(),
            pricing: Pricing::default(),
            win_tiers: WinTierThresholds::default(),
            max_tumble_steps: 50,
            signal_timeout_ms: 15_000,
            seed: None,
        }
    }
}

impl SlotConfig {
    /// Studio preset: frequent scatters so the bonus flow is easy to reach
    pub fn studio() -> Self {
        Self {
            base_scatters: ScatterPlacement::new(0, 6, 0.12),
            bonus_scatters: ScatterPlacement::new(0, 5, 0.08),
            ..Self::default()
        }
    }

    /// Awaited-signal bound as a Duration
    pub fn signal_timeout(&self) -> Duration {
        Duration::from_millis(self.signal_timeout_ms)
    }

    /// Symbol alphabet described by this config
    pub fn symbol_set(&self) -> SymbolSet {
        SymbolSet::new(self.regular_symbols, self.multipliers.values.clone())
    }

    /// Scatter placement for a spin of this kind
    pub fn placement_for(&self, kind: SpinKind) -> ScatterPlacement {
        match kind {
            SpinKind::Standard => self.base_scatters,
            SpinKind::EnhancedBet => ScatterPlacement {
                scatter_chance: (self.base_scatters.scatter_chance
                    * self.pricing.enhanced_scatter_factor)
                    .clamp(0.0, 1.0),
                ..self.base_scatters
            },
            SpinKind::FeatureBuy => {
                let forced = self.pricing.feature_buy_scatters;
                ScatterPlacement {
                    min_scatter: self.base_scatters.min_scatter.max(forced),
                    max_scatter: self.base_scatters.max_scatter.max(forced),
                    ..self.base_scatters
                }
            }
            SpinKind::Free => self.bonus_scatters,
        }
    }

    /// Validate internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cells = self.grid.total_positions();
        if self.grid.rows == 0 || self.grid.columns == 0 {
            return Err(ConfigError::Invalid("grid must have at least one row and column".into()));
        }
        if self.regular_symbols < 2 || self.regular_symbols > MAX_REGULAR_SYMBOLS {
            return Err(ConfigError::Invalid(format!(
                "regular_symbols must be within 2..={MAX_REGULAR_SYMBOLS}, got {}",
                self.regular_symbols
            )));
        }
        if self.difficulty_pool == 0 || self.difficulty_pool >= self.regular_symbols as usize {
            return Err(ConfigError::Invalid(format!(
                "difficulty_pool must be within 1..{}, got {}",
                self.regular_symbols, self.difficulty_pool
            )));
        }

        let [t1, t2, t3] = self.paytable.tier_thresholds;
        if !(t1 >= 1 && t1 < t2 && t2 < t3) {
            return Err(ConfigError::Invalid(format!(
                "tier thresholds must be strictly increasing, got {:?}",
                self.paytable.tier_thresholds
            )));
        }
        for (tier, pays) in self.paytable.tiers.iter().enumerate() {
            if pays.len() != self.regular_symbols as usize {
                return Err(ConfigError::Invalid(format!(
                    "paytable tier {} has {} entries, expected {}",
                    tier + 1,
                    pays.len(),
                    self.regular_symbols
                )));
            }
            if pays.iter().any(|p| !p.is_finite() || *p < 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "paytable tier {} has a negative or non-finite pay",
                    tier + 1
                )));
            }
        }

        validate_placement("base_scatters", &self.base_scatters, cells)?;
        validate_placement("bonus_scatters", &self.bonus_scatters, cells)?;

        if self.multipliers.enabled {
            validate_placement("multipliers.placement", &self.multipliers.placement, cells)?;
            if self.multipliers.values.is_empty() {
                return Err(ConfigError::Invalid("multiplier values must not be empty".into()));
            }
        }
        if self.multipliers.values.len() > MULTIPLIER_RANGE as usize {
            return Err(ConfigError::Invalid(format!(
                "at most {MULTIPLIER_RANGE} multiplier values are supported"
            )));
        }
        if self.multipliers.values.contains(&0) {
            return Err(ConfigError::Invalid("multiplier values must be positive".into()));
        }

        let awards = &self.free_spins;
        if awards.trigger.values.is_empty() || awards.trigger.min_count == 0 {
            return Err(ConfigError::Invalid("free spin trigger table must not be empty".into()));
        }
        // An empty retrigger table disables retriggers
        if !awards.retrigger.values.is_empty() {
            if awards.retrigger.min_count == 0 {
                return Err(ConfigError::Invalid(
                    "free spin retrigger table needs min_count of at least 1".into(),
                ));
            }
            if self.bonus_scatters.min_scatter >= awards.retrigger.min_count {
                return Err(ConfigError::Invalid(format!(
                    "bonus_scatters.min_scatter ({}) would retrigger every free spin (retrigger needs {})",
                    self.bonus_scatters.min_scatter, awards.retrigger.min_count
                )));
            }
        }
        if awards.trigger.values.contains(&0) || awards.retrigger.values.contains(&0) {
            return Err(ConfigError::Invalid("free spin awards must be positive".into()));
        }

        let pricing = &self.pricing;
        if !(pricing.bet.is_finite() && pricing.bet > 0.0) {
            return Err(ConfigError::Invalid(format!("bet must be positive, got {}", pricing.bet)));
        }
        if pricing.feature_buy_multiplier <= 0.0 || pricing.enhanced_bet_multiplier <= 0.0 {
            return Err(ConfigError::Invalid("price multipliers must be positive".into()));
        }
        if pricing.feature_buy_scatters > cells {
            return Err(ConfigError::Invalid(format!(
                "feature_buy_scatters ({}) exceeds grid size ({cells})",
                pricing.feature_buy_scatters
            )));
        }
        if pricing.feature_buy_scatters < self.free_spins.trigger.min_count {
            return Err(ConfigError::Invalid(format!(
                "feature_buy_scatters ({}) cannot trigger the bonus (needs {})",
                pricing.feature_buy_scatters, self.free_spins.trigger.min_count
            )));
        }

        let tiers = &self.win_tiers;
        if !(tiers.big_win > 0.0 && tiers.big_win <= tiers.mega_win && tiers.mega_win <= tiers.epic_win) {
            return Err(ConfigError::Invalid("win tier thresholds must be positive and ascending".into()));
        }

        if self.max_tumble_steps == 0 {
            return Err(ConfigError::Invalid("max_tumble_steps must be at least 1".into()));
        }
        if self.signal_timeout_ms == 0 {
            return Err(ConfigError::Invalid("signal_timeout_ms must be at least 1".into()));
        }

        Ok(())
    }

    /// Parse from JSON and validate
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from YAML and validate
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            Some("yaml") | Some("yml") => Self::from_yaml(&text),
            other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string())),
        }
    }

    /// Export as pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

fn validate_placement(name: &str, placement: &ScatterPlacement, cells: usize) -> Result<(), ConfigError> {
    if placement.min_scatter > placement.max_scatter {
        return Err(ConfigError::Invalid(format!(
            "{name}: min_scatter ({}) exceeds max_scatter ({})",
            placement.min_scatter, placement.max_scatter
        )));
    }
    if placement.max_scatter > cells {
        return Err(ConfigError::Invalid(format!(
            "{name}: max_scatter ({}) exceeds grid size ({cells})",
            placement.max_scatter
        )));
    }
    if !(0.0..=1.0).contains(&placement.scatter_chance) {
        return Err(ConfigError::Invalid(format!(
            "{name}: scatter_chance must be within 0..=1, got {}",
            placement.scatter_chance
        )));
    }
    Ok(())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("Unsupported config format: '{0}' (expected json, yaml or yml)")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
