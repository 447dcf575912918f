//! Tunable simulation settings.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    SWITCH_LOOKAHEAD_STEPS, TICKS_PER_SECOND, TREE_MAX_GENERATION, TREE_MAX_NODES,
    TREE_MAX_NODES_PER_UPDATE,
};
use crate::numbers::trunc_f64_to_i32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: f64,
        value: f64,
    },
    #[error("{field} must be between {min:.2} and {max:.2} (got {value:.2})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("tree budget per update ({per_update}) exceeds the total node cap ({total})")]
    TreeBudget { per_update: usize, total: usize },
    #[error("invalid simulation config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Budgets of the per-cart prediction trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "TreeConfig::default_max_nodes_per_update")]
    pub max_nodes_per_update: usize,
    #[serde(default = "TreeConfig::default_max_generation")]
    pub max_generation: u32,
    #[serde(default = "TreeConfig::default_max_tree_nodes")]
    pub max_tree_nodes: usize,
}

impl TreeConfig {
    const fn default_max_nodes_per_update() -> usize {
        TREE_MAX_NODES_PER_UPDATE
    }

    const fn default_max_generation() -> u32 {
        TREE_MAX_GENERATION
    }

    const fn default_max_tree_nodes() -> usize {
        TREE_MAX_NODES
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_nodes_per_update == 0 {
            return Err(ConfigError::MinViolation {
                field: "tree.max_nodes_per_update",
                min: 1.0,
                value: 0.0,
            });
        }
        if self.max_generation == 0 {
            return Err(ConfigError::MinViolation {
                field: "tree.max_generation",
                min: 1.0,
                value: 0.0,
            });
        }
        if self.max_nodes_per_update > self.max_tree_nodes {
            return Err(ConfigError::TreeBudget {
                per_update: self.max_nodes_per_update,
                total: self.max_tree_nodes,
            });
        }
        Ok(())
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_nodes_per_update: Self::default_max_nodes_per_update(),
            max_generation: Self::default_max_generation(),
            max_tree_nodes: Self::default_max_tree_nodes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Nominal ticks per simulated second.
    #[serde(default = "SimConfig::default_tick_rate")]
    pub tick_rate: u32,
    /// Global time scale applied on top of the tick rate.
    #[serde(default = "SimConfig::default_speed_multiplier")]
    pub speed_multiplier: f32,
    #[serde(default = "SimConfig::default_switch_lookahead_steps")]
    pub switch_lookahead_steps: u32,
    #[serde(default)]
    pub tree: TreeConfig,
    /// Chance a computer cart follows its prediction.
    #[serde(default = "SimConfig::default_iq")]
    pub default_iq: f32,
}

impl SimConfig {
    const fn default_tick_rate() -> u32 {
        TICKS_PER_SECOND
    }

    const fn default_speed_multiplier() -> f32 {
        1.0
    }

    const fn default_switch_lookahead_steps() -> u32 {
        SWITCH_LOOKAHEAD_STEPS
    }

    const fn default_iq() -> f32 {
        0.8
    }

    /// Parse a JSON document, filling absent fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the JSON is malformed or a field is out of bounds.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::MinViolation {
                field: "tick_rate",
                min: 1.0,
                value: 0.0,
            });
        }
        if !(0.1..=10.0).contains(&self.speed_multiplier) {
            return Err(ConfigError::RangeViolation {
                field: "speed_multiplier",
                min: 0.1,
                max: 10.0,
                value: f64::from(self.speed_multiplier),
            });
        }
        if self.switch_lookahead_steps == 0 {
            return Err(ConfigError::MinViolation {
                field: "switch_lookahead_steps",
                min: 1.0,
                value: 0.0,
            });
        }
        if !(0.0..=1.0).contains(&self.default_iq) {
            return Err(ConfigError::RangeViolation {
                field: "default_iq",
                min: 0.0,
                max: 1.0,
                value: f64::from(self.default_iq),
            });
        }
        self.tree.validate()
    }

    /// Ticks to run for `seconds` of play at the configured time scale.
    #[must_use]
    pub fn ticks_for(&self, seconds: f64) -> u64 {
        let ticks = f64::from(self.tick_rate) * f64::from(self.speed_multiplier) * seconds;
        u64::try_from(trunc_f64_to_i32(ticks.round())).unwrap_or(0)
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: Self::default_tick_rate(),
            speed_multiplier: Self::default_speed_multiplier(),
            switch_lookahead_steps: Self::default_switch_lookahead_steps(),
            tree: TreeConfig::default(),
            default_iq: Self::default_iq(),
        }
    }
}
