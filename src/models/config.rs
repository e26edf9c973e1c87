//! Engine configuration: court count, balance policy, fairness knobs.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors loading or validating an [`EngineConfig`].
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    /// A value is outside its allowed range.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// How 4 candidates are judged balanced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BalancePolicy {
    /// Team level sums may differ by at most `max_level_diff`.
    NumericLevel { max_level_diff: f64 },
    /// The 4 tiers must form one of the six allowed patterns.
    #[default]
    Tier,
}

/// How long waiters are protected by the selector.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyMode {
    /// Every urgent waiter is selected before anything else.
    #[default]
    Absolute,
    /// Urgent waiters only get reserved slots (1-3) once the pool is large.
    Scaled,
}

/// Repetition Guard thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepetitionConfig {
    /// Snapshots remembered.
    pub history_len: usize,
    /// Snapshots are only taken while the non-finished group is this small.
    pub max_group_size: usize,
    /// Cycle count at which a desync is requested.
    pub desync_at: u32,
    /// A changed group resets the count only once it exceeds this.
    pub reset_above: u32,
}

impl Default for RepetitionConfig {
    fn default() -> Self {
        Self {
            history_len: 2,
            max_group_size: 4,
            desync_at: 2,
            reset_above: 3,
        }
    }
}

/// Full engine configuration. Missing JSON fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub court_count: usize,
    pub policy: BalancePolicy,
    pub urgency: UrgencyMode,
    /// Waiting turns at which a waiter counts as urgent.
    pub urgent_waiting_turns: u32,
    /// Non-finished pool size from which the scaled override applies.
    pub scaled_override_min_pool: usize,
    /// With 6+ non-finished waiters, take just-finished players first.
    pub just_finished_first: bool,
    /// Search the whole pool before asking the operator to relax.
    pub widen_search: bool,
    /// Prefer splits whose teammates have partnered less often.
    pub avoid_repeat_pairs: bool,
    /// Raise a promoted player's match count to the active average.
    pub promote_catch_up: bool,
    pub repetition: RepetitionConfig,
    /// Fixed seed for reproducible tie-breaks; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            court_count: 3,
            policy: BalancePolicy::Tier,
            urgency: UrgencyMode::Absolute,
            urgent_waiting_turns: 2,
            scaled_override_min_pool: 8,
            just_finished_first: true,
            widen_search: false,
            avoid_repeat_pairs: true,
            promote_catch_up: true,
            repetition: RepetitionConfig::default(),
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Numeric-level policy with the usual 1.5 tolerance.
    pub fn numeric() -> Self {
        Self {
            policy: BalancePolicy::NumericLevel { max_level_diff: 1.5 },
            ..Self::default()
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.court_count == 0 {
            return Err(ConfigError::Invalid("court_count must be at least 1".into()));
        }
        if self.urgent_waiting_turns == 0 {
            return Err(ConfigError::Invalid(
                "urgent_waiting_turns must be at least 1".into(),
            ));
        }
        if let BalancePolicy::NumericLevel { max_level_diff } = self.policy {
            if !max_level_diff.is_finite() || max_level_diff < 0.0 {
                return Err(ConfigError::Invalid(
                    "max_level_diff must be a non-negative number".into(),
                ));
            }
        }
        if self.repetition.history_len == 0 {
            return Err(ConfigError::Invalid(
                "repetition.history_len must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
