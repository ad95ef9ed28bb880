//! Run configuration for the reconstruction engine.

use subrecon_core::{ReconError, Result};

use crate::scaling::TINY;

/// Default reporting threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.4;
/// Default tolerance for sanity checks.
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Options controlling a reconstruction run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReconConfig {
    /// Minimum joint probability for a pair to be listed.
    pub threshold: f64,
    /// Sort listed pairs by descending probability.
    pub sort_by_probability: bool,
    /// Recompute every column's likelihood from the root and check the
    /// posterior sums to one.
    pub sanity_check: bool,
    /// Tolerance used by the sanity check.
    pub epsilon: f64,
    /// Report every column, not just those with a likely substitution.
    pub verbose: bool,
    /// Worker threads for the column pool.
    pub threads: usize,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            sort_by_probability: true,
            sanity_check: false,
            epsilon: DEFAULT_EPSILON,
            verbose: false,
            threads: 1,
        }
    }
}

impl ReconConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ReconError::Config(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if !(self.epsilon > TINY) || !self.epsilon.is_finite() {
            return Err(ReconError::Config(format!(
                "epsilon must be greater than {}, got {}",
                TINY, self.epsilon
            )));
        }
        if self.threads < 1 {
            return Err(ReconError::Config(
                "number of threads must be 1 or higher".into(),
            ));
        }
        Ok(())
    }
}
