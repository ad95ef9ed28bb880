//! Reversible substitution models over N states.
//!
//! Models are pure: `transition_probs(t)` computes `P(t) = exp(Qt)` from an
//! eigensystem fixed at construction, so one instance can be shared by any
//! number of worker threads.

use subrecon_core::{ReconError, Result};

/// Maximum number of full Jacobi sweeps before giving up.
const MAX_SWEEPS: usize = 100;

/// Trait for time-reversible substitution models.
pub trait SubstitutionModel: Send + Sync {
    /// Short model name used in reports.
    fn name(&self) -> &str;

    /// Number of character states (20 for amino acids).
    fn n_states(&self) -> usize;

    /// Equilibrium frequencies, one per state, summing to 1.
    fn frequencies(&self) -> &[f64];

    /// Instantaneous rate matrix Q (N x N), scaled to one expected
    /// substitution per unit time.
    fn rate_matrix(&self) -> &[Vec<f64>];

    /// Transition probability matrix P(t) = exp(Qt). Rows sum to 1.
    fn transition_probs(&self, t: f64) -> Vec<Vec<f64>>;

    /// Single entry of P(t).
    fn transition_probability(&self, from: usize, to: usize, t: f64) -> f64 {
        self.transition_probs(t)[from][to]
    }
}

/// Spectral form of a reversible rate matrix.
///
/// `B = diag(sqrt(pi)) Q diag(1/sqrt(pi))` is symmetric, so
/// `P(t) = diag(1/sqrt(pi)) U exp(Lambda t) U^T diag(sqrt(pi))`.
#[derive(Debug, Clone)]
pub struct EigenSystem {
    values: Vec<f64>,
    vectors: Vec<Vec<f64>>,
    sqrt_pi: Vec<f64>,
    inv_sqrt_pi: Vec<f64>,
}

impl EigenSystem {
    /// Decompose `q` under equilibrium frequencies `freqs`.
    pub fn new(q: &[Vec<f64>], freqs: &[f64]) -> Result<Self> {
        let n = freqs.len();
        if q.len() != n || q.iter().any(|row| row.len() != n) {
            return Err(ReconError::InvalidInput(format!(
                "rate matrix must be {}x{}",
                n, n
            )));
        }
        if freqs.iter().any(|&f| !(f > 0.0)) {
            return Err(ReconError::InvalidInput(
                "equilibrium frequencies must be positive".into(),
            ));
        }

        let sqrt_pi: Vec<f64> = freqs.iter().map(|&f| f.sqrt()).collect();
        let inv_sqrt_pi: Vec<f64> = sqrt_pi.iter().map(|&sp| 1.0 / sp).collect();

        let mut b = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                b[i][j] = sqrt_pi[i] * q[i][j] * inv_sqrt_pi[j];
            }
        }
        // Average out rounding asymmetry before the symmetric solver.
        for i in 0..n {
            for j in (i + 1)..n {
                let m = 0.5 * (b[i][j] + b[j][i]);
                b[i][j] = m;
                b[j][i] = m;
            }
        }

        let (values, vectors) = jacobi_eigen(b)?;
        Ok(Self {
            values,
            vectors,
            sqrt_pi,
            inv_sqrt_pi,
        })
    }

    /// Eigenvalues of Q.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// P(t), with tiny negative round-off clamped to zero. P(0) is the exact
    /// identity.
    pub fn transition_probs(&self, t: f64) -> Vec<Vec<f64>> {
        let n = self.values.len();
        if t == 0.0 {
            return (0..n)
                .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
                .collect();
        }
        let exp_lt: Vec<f64> = self.values.iter().map(|&l| (l * t).exp()).collect();
        let mut p = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                let mut sum = 0.0;
                for k in 0..n {
                    sum += self.vectors[i][k] * exp_lt[k] * self.vectors[j][k];
                }
                p[i][j] = (self.inv_sqrt_pi[i] * sum * self.sqrt_pi[j]).max(0.0);
            }
        }
        p
    }
}

/// Cyclic Jacobi eigendecomposition of a real symmetric matrix.
///
/// Returns (eigenvalues, eigenvectors) where `vectors[i][k]` is the i-th
/// component of the k-th eigenvector.
pub(crate) fn jacobi_eigen(mut a: Vec<Vec<f64>>) -> Result<(Vec<f64>, Vec<Vec<f64>>)> {
    let n = a.len();
    let mut v: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            let mut row = vec![0.0; n];
            row[i] = 1.0;
            row
        })
        .collect();

    let scale: f64 = a.iter().flatten().map(|x| x * x).sum::<f64>().sqrt();
    let tol = 1e-15 * scale.max(f64::MIN_POSITIVE);

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum::<f64>()
            .sqrt();
        if off <= tol {
            let values = (0..n).map(|i| a[i][i]).collect();
            return Ok((values, v));
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p][q];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (akp, akq) = (a[k][p], a[k][q]);
                    a[k][p] = c * akp - s * akq;
                    a[k][q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                a[p][q] = 0.0;
                a[q][p] = 0.0;
                for row in v.iter_mut() {
                    let (vkp, vkq) = (row[p], row[q]);
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    Err(ReconError::Other(format!(
        "eigendecomposition did not converge after {} sweeps",
        MAX_SWEEPS
    )))
}

/// Build a normalized rate matrix Q from exchangeability matrix S and frequencies pi.
///
/// Q\[i\]\[j\] = S\[i\]\[j\] * pi\[j\] for i != j, rows sum to 0,
/// normalized so -sum(pi_i * Q_ii) = 1.
pub(crate) fn build_rate_matrix(exchangeabilities: &[Vec<f64>], freqs: &[f64]) -> Vec<Vec<f64>> {
    let n = freqs.len();
    let mut q = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..n {
            if i != j {
                q[i][j] = exchangeabilities[i][j] * freqs[j];
            }
        }
        let off_diag: f64 = (0..n).filter(|&j| j != i).map(|j| q[i][j]).sum();
        q[i][i] = -off_diag;
    }

    let mu: f64 = (0..n).map(|i| -freqs[i] * q[i][i]).sum();
    if mu > 0.0 {
        for row in q.iter_mut() {
            for x in row.iter_mut() {
                *x /= mu;
            }
        }
    }

    q
}

/// Rescale frequencies to sum to 1. Zero or negative entries are rejected.
pub fn normalize_frequencies(freqs: &[f64]) -> Result<Vec<f64>> {
    if freqs.iter().any(|&f| !f.is_finite() || f <= 0.0) {
        return Err(ReconError::InvalidInput(
            "equilibrium frequencies must be positive and finite".into(),
        ));
    }
    let total: f64 = freqs.iter().sum();
    Ok(freqs.iter().map(|&f| f / total).collect())
}

/// Equal-rates, equal-frequencies model over `n` states (Jukes-Cantor style).
///
/// Mostly useful as an analytically tractable model in tests and benches.
#[derive(Debug, Clone)]
pub struct PoissonModel {
    freqs: Vec<f64>,
    q: Vec<Vec<f64>>,
}

impl PoissonModel {
    pub fn new(n_states: usize) -> Result<Self> {
        if n_states < 2 {
            return Err(ReconError::InvalidInput(
                "a substitution model needs at least two states".into(),
            ));
        }
        let freqs = vec![1.0 / n_states as f64; n_states];
        let ones = vec![vec![1.0; n_states]; n_states];
        let q = build_rate_matrix(&ones, &freqs);
        Ok(Self { freqs, q })
    }
}

impl SubstitutionModel for PoissonModel {
    fn name(&self) -> &str {
        "Poisson"
    }

    fn n_states(&self) -> usize {
        self.freqs.len()
    }

    fn frequencies(&self) -> &[f64] {
        &self.freqs
    }

    fn rate_matrix(&self) -> &[Vec<f64>] {
        &self.q
    }

    fn transition_probs(&self, t: f64) -> Vec<Vec<f64>> {
        let n = self.freqs.len();
        let k = n as f64;
        let decay = (-k * t / (k - 1.0)).exp();
        let same = 1.0 / k + (k - 1.0) / k * decay;
        let diff = (1.0 - decay) / k;
        (0..n)
            .map(|i| (0..n).map(|j| if i == j { same } else { diff }).collect())
            .collect()
    }
}
