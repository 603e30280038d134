//! Fold configuration.
//!
//! # Environment
//!
//! | Variable                 | Meaning                               | Default     |
//! |--------------------------|---------------------------------------|-------------|
//! | `THREADFOLD_BUDGET`      | Visible nodes per root level          | `unlimited` |
//! | `THREADFOLD_MIN_SUBTREE` | Reservation per sibling (≥ 1)         | `1`         |
//! | `THREADFOLD_EXPAND_STEP` | Extra nodes granted per "show more"   | `10`        |

use crate::error::ConfigError;
use crate::node::NodeId;
use crate::state::{AllocParams, Budget};
use std::num::NonZeroUsize;

pub const ENV_BUDGET: &str = "THREADFOLD_BUDGET";
pub const ENV_MIN_SUBTREE: &str = "THREADFOLD_MIN_SUBTREE";
pub const ENV_EXPAND_STEP: &str = "THREADFOLD_EXPAND_STEP";

/// Default extra budget granted by one expand interaction.
pub const DEFAULT_EXPAND_STEP: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

/// Allocation settings for a fold store or thread view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "state-persistence",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct FoldConfig {
    pub budget: Budget,
    pub min_subtree: NonZeroUsize,
    pub expand_step: NonZeroUsize,
}

impl Default for FoldConfig {
    fn default() -> Self {
        Self {
            budget: Budget::Unlimited,
            min_subtree: NonZeroUsize::MIN,
            expand_step: DEFAULT_EXPAND_STEP,
        }
    }
}

impl FoldConfig {
    #[must_use]
    pub fn new(budget: impl Into<Budget>) -> Self {
        Self {
            budget: budget.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_budget(mut self, budget: impl Into<Budget>) -> Self {
        self.budget = budget.into();
        self
    }

    #[must_use]
    pub fn with_min_subtree(mut self, min: NonZeroUsize) -> Self {
        self.min_subtree = min;
        self
    }

    #[must_use]
    pub fn with_expand_step(mut self, step: NonZeroUsize) -> Self {
        self.expand_step = step;
        self
    }

    /// Allocation parameters for this config with the given pin.
    #[must_use]
    pub fn params(&self, pinned: Option<NodeId>) -> AllocParams {
        AllocParams {
            budget: self.budget,
            min_subtree: self.min_subtree,
            pinned,
        }
    }

    /// Read configuration from the process environment.
    ///
    /// Invalid values are ignored and the default for that key is kept.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let lookup = |key: &str| std::env::var(key).ok();
        if let Some(raw) = lookup(ENV_BUDGET) {
            match parse_budget(&raw) {
                Ok(budget) => config.budget = budget,
                Err(err) => warn_ignored(&err),
            }
        }
        if let Some(raw) = lookup(ENV_MIN_SUBTREE) {
            match parse_positive(ENV_MIN_SUBTREE, &raw) {
                Ok(min) => config.min_subtree = min,
                Err(err) => warn_ignored(&err),
            }
        }
        if let Some(raw) = lookup(ENV_EXPAND_STEP) {
            match parse_positive(ENV_EXPAND_STEP, &raw) {
                Ok(step) => config.expand_step = step,
                Err(err) => warn_ignored(&err),
            }
        }
        config
    }

    /// Read configuration through `lookup`, failing on the first bad value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the offending key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_BUDGET) {
            config.budget = parse_budget(&raw)?;
        }
        if let Some(raw) = lookup(ENV_MIN_SUBTREE) {
            config.min_subtree = parse_positive(ENV_MIN_SUBTREE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_EXPAND_STEP) {
            config.expand_step = parse_positive(ENV_EXPAND_STEP, &raw)?;
        }
        Ok(config)
    }
}

fn parse_budget(raw: &str) -> Result<Budget, ConfigError> {
    let value = raw.trim();
    if matches!(
        value.to_ascii_lowercase().as_str(),
        "unlimited" | "inf" | "none"
    ) {
        return Ok(Budget::Unlimited);
    }
    value
        .parse::<usize>()
        .map(Budget::Limited)
        .map_err(|_| ConfigError::InvalidValue {
            key: ENV_BUDGET,
            value: raw.to_owned(),
            reason: "expected a non-negative integer or 'unlimited'",
        })
}

fn parse_positive(key: &'static str, raw: &str) -> Result<NonZeroUsize, ConfigError> {
    raw.trim()
        .parse::<NonZeroUsize>()
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw.to_owned(),
            reason: "expected a positive integer",
        })
}

#[cfg(feature = "tracing")]
fn warn_ignored(err: &ConfigError) {
    tracing::warn!(message = "fold.config_ignored", error = %err);
}

#[cfg(not(feature = "tracing"))]
#[inline]
fn warn_ignored(_err: &ConfigError) {}
