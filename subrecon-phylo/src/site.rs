//! Per-column reconstruction results.

use crate::alphabet::amino_acid_symbol;
use crate::mixture::JointProbabilities;

/// One (state at A, state at B) pair and its posterior probability.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Substitution {
    pub from: usize,
    pub to: usize,
    pub probability: f64,
}

impl Substitution {
    /// Two-letter code such as `"AR"` (A at node A, R at node B).
    pub fn code(&self) -> String {
        let mut s = String::with_capacity(2);
        s.push(amino_acid_symbol(self.from).unwrap_or('?'));
        s.push(amino_acid_symbol(self.to).unwrap_or('?'));
        s
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }
}

/// Summary of one alignment column. The full joint matrix is not retained.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SiteResult {
    column: usize,
    log_likelihood: f64,
    substitutions: Vec<Substitution>,
    max_identity_prob: f64,
    max_prob: f64,
}

impl SiteResult {
    /// Keep every pair with probability `>= threshold`, optionally sorted by
    /// descending probability. Ties keep their (from, to) order.
    pub fn from_joint(
        column: usize,
        log_likelihood: f64,
        joint: &JointProbabilities,
        threshold: f64,
        sort_by_probability: bool,
    ) -> Self {
        let mut max_identity_prob = 0.0_f64;
        let mut max_prob = 0.0_f64;
        let mut substitutions = Vec::new();

        for (from, to, probability) in joint.iter() {
            if from == to {
                max_identity_prob = max_identity_prob.max(probability);
            }
            max_prob = max_prob.max(probability);
            if probability >= threshold {
                substitutions.push(Substitution {
                    from,
                    to,
                    probability,
                });
            }
        }

        if sort_by_probability {
            substitutions.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        }

        Self {
            column,
            log_likelihood,
            substitutions,
            max_identity_prob,
            max_prob,
        }
    }

    /// Zero-based column index.
    pub fn column(&self) -> usize {
        self.column
    }

    /// Marginal log-likelihood of the column.
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn substitutions(&self) -> &[Substitution] {
        &self.substitutions
    }

    /// Largest probability on the diagonal (no change along the branch).
    pub fn max_identity_prob(&self) -> f64 {
        self.max_identity_prob
    }

    pub fn max_prob(&self) -> f64 {
        self.max_prob
    }

    /// Whether the column deserves a line in the report: always when
    /// `verbose`, otherwise only when the best outcome is a real change that
    /// clears the threshold.
    pub fn is_reportable(&self, threshold: f64, verbose: bool) -> bool {
        verbose || (self.max_identity_prob <= 1.0 - threshold && self.max_prob >= threshold)
    }
}
