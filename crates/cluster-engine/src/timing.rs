//! Timing profiles for autoplay pacing

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing profile for autoplay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimingProfile {
    /// Normal gameplay timing
    #[default]
    Normal,
    /// Fast/Turbo mode
    Turbo,
    /// Studio mode (near-instant, for headless runs and tests)
    Studio,
    /// Scaled or hand-edited timing
    Custom,
}

/// Autoplay pacing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoplayConfig {
    /// Profile type
    pub profile: TimingProfile,

    /// Delay before the first spin of a session (ms)
    pub start_delay_ms: u64,

    /// Delay between readiness and the next spin (ms)
    pub spin_interval_ms: u64,

    /// How long the scheduler waits for a readiness event before
    /// re-deriving readiness from the orchestrator (ms)
    pub readiness_timeout_ms: u64,
}

impl AutoplayConfig {
    /// Normal gameplay timing
    pub fn normal() -> Self {
        Self {
            profile: TimingProfile::Normal,
            start_delay_ms: 300,
            spin_interval_ms: 250,
            readiness_timeout_ms: 3_000,
        }
    }

    /// Turbo mode
    pub fn turbo() -> Self {
        Self {
            profile: TimingProfile::Turbo,
            start_delay_ms: 100,
            spin_interval_ms: 80,
            readiness_timeout_ms: 1_500,
        }
    }

    /// Studio mode
    pub fn studio() -> Self {
        Self {
            profile: TimingProfile::Studio,
            start_delay_ms: 1,
            spin_interval_ms: 1,
            readiness_timeout_ms: 500,
        }
    }

    /// Get config for profile
    pub fn from_profile(profile: TimingProfile) -> Self {
        match profile {
            TimingProfile::Normal => Self::normal(),
            TimingProfile::Turbo => Self::turbo(),
            TimingProfile::Studio => Self::studio(),
            TimingProfile::Custom => Self::normal(),
        }
    }

    /// Scale delays by factor (< 1.0 = faster). The readiness timeout is
    /// never scaled below one spin interval.
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |ms: u64| (ms as f64 * factor.max(0.0)).round() as u64;
        let spin_interval_ms = scale(self.spin_interval_ms);
        Self {
            profile: TimingProfile::Custom,
            start_delay_ms: scale(self.start_delay_ms),
            spin_interval_ms,
            readiness_timeout_ms: scale(self.readiness_timeout_ms).max(spin_interval_ms).max(1),
        }
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn spin_interval(&self) -> Duration {
        Duration::from_millis(self.spin_interval_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms.max(1))
    }
}

impl Default for AutoplayConfig {
    fn default() -> Self {
        Self::normal()
    }
}
