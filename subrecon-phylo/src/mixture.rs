//! Combination of per-category clade conditionals into the joint posterior
//! over the states at the two ends of the focal branch.
//!
//! For category `c` the log term of the pair `(i, j)` is
//!
//! ```text
//! ln pi_i + ln A_i + ln P_c[i][j] + ln B_j + scale_A + scale_B (+ ln w_c)
//! ```
//!
//! Terms are stored flat at `i * K * R + j * R + c`. The joint probability of
//! `(i, j)` is the log-sum-exp of its category slice minus the log-sum-exp of
//! everything.

use subrecon_core::{log_sum_exp, ReconError, Result};

/// Conditionals of both focal clades for one rate category.
#[derive(Debug, Clone, Copy)]
pub struct CategoryConditionals<'a> {
    /// Rescaled conditional vector of clade A.
    pub clade_a: &'a [f64],
    /// Rescaled conditional vector of clade B.
    pub clade_b: &'a [f64],
    /// Sum of both clades' accumulated log scale factors.
    pub log_scaling: f64,
    /// Element-wise log of P over the focal branch at this category's rate.
    pub focal_log: &'a [Vec<f64>],
}

/// K x K posterior over (state at A, state at B), row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct JointProbabilities {
    n_states: usize,
    values: Vec<f64>,
}

impl JointProbabilities {
    pub fn from_values(n_states: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != n_states * n_states {
            return Err(ReconError::InvalidInput(format!(
                "expected {} joint probabilities, got {}",
                n_states * n_states,
                values.len()
            )));
        }
        Ok(Self { n_states, values })
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    /// P(A = i, B = j).
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n_states + j]
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// `(i, j, p)` in canonical (row-major) order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let k = self.n_states;
        self.values
            .iter()
            .enumerate()
            .map(move |(idx, &p)| (idx / k, idx % k, p))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

/// Result of combining all categories for one column.
#[derive(Debug, Clone)]
pub struct MixtureOutcome {
    pub joint: JointProbabilities,
    /// Log-sum-exp of every term, before the category prior is applied
    /// (when weights are uniform).
    pub log_total: f64,
    /// Log-likelihood of the column.
    pub marginal_log_likelihood: f64,
}

/// Combine per-category conditionals into the joint posterior.
///
/// With `log_weights == None` categories are equiprobable: weights cancel in
/// the posterior and `ln(R)` is subtracted from the total afterwards.
/// Otherwise `ln w_c` is added to each term and the total is the
/// log-likelihood directly.
///
/// # Errors
///
/// `Numerical` if the total is not finite (e.g. data impossible under the
/// model).
pub fn combine(
    column: usize,
    log_pi: &[f64],
    categories: &[CategoryConditionals<'_>],
    log_weights: Option<&[f64]>,
) -> Result<MixtureOutcome> {
    let k = log_pi.len();
    let r = categories.len();
    if r == 0 {
        return Err(ReconError::InvalidInput("no rate categories".into()));
    }
    if let Some(lw) = log_weights {
        if lw.len() != r {
            return Err(ReconError::InvalidInput(format!(
                "{} category weights for {} categories",
                lw.len(),
                r
            )));
        }
    }

    let mut terms = vec![0.0; k * k * r];
    for (c, cat) in categories.iter().enumerate() {
        let offset = cat.log_scaling + log_weights.map_or(0.0, |lw| lw[c]);
        for i in 0..k {
            let left = log_pi[i] + cat.clade_a[i].ln() + offset;
            for j in 0..k {
                terms[i * k * r + j * r + c] = left + cat.focal_log[i][j] + cat.clade_b[j].ln();
            }
        }
    }

    let log_total = log_sum_exp(&terms);
    if !log_total.is_finite() {
        return Err(ReconError::Numerical {
            column,
            detail: format!("total log-likelihood is {}", log_total),
        });
    }

    let values = terms
        .chunks_exact(r)
        .map(|slice| (log_sum_exp(slice) - log_total).exp())
        .collect();

    let marginal_log_likelihood = match log_weights {
        None => log_total - (r as f64).ln(),
        Some(_) => log_total,
    };

    Ok(MixtureOutcome {
        joint: JointProbabilities { n_states: k, values },
        log_total,
        marginal_log_likelihood,
    })
}
