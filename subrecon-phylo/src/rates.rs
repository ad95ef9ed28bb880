//! Among-site rate heterogeneity as a finite list of (rate, weight) categories.

use std::f64::consts::PI;

use subrecon_core::{ReconError, Reportable, Result, Summarizable};

/// Tolerance on category weights summing to 1.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

const SERIES_MAX_ITER: usize = 500;
const SERIES_EPS: f64 = 1e-15;

/// How a set of categories was obtained, for reporting.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RateSource {
    /// No heterogeneity: one category at rate 1.
    Single,
    /// Discrete gamma with the given shape (mean-of-category rates).
    Gamma { shape: f64 },
    /// Rates (and optionally weights) supplied directly.
    Custom,
}

/// Ordered discrete rate categories.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RateCategories {
    rates: Vec<f64>,
    weights: Vec<f64>,
    source: RateSource,
}

impl RateCategories {
    /// One category with rate 1 and weight 1.
    pub fn single() -> Self {
        Self {
            rates: vec![1.0],
            weights: vec![1.0],
            source: RateSource::Single,
        }
    }

    /// `n` equiprobable categories of a mean-one gamma distribution, each
    /// represented by its mean rate (Yang 1994).
    ///
    /// `n == 1` or `shape == 0` gives [`RateCategories::single`].
    pub fn gamma(shape: f64, n: usize) -> Result<Self> {
        if !shape.is_finite() || shape < 0.0 {
            return Err(ReconError::Config(format!(
                "gamma shape must be >= 0, got {}",
                shape
            )));
        }
        if n < 1 {
            return Err(ReconError::Config(
                "number of rate categories must be 1 or higher".into(),
            ));
        }
        if n == 1 || shape == 0.0 {
            return Ok(Self::single());
        }

        // Work in y = shape * x, where y ~ Gamma(shape, 1).
        let mut upper = Vec::with_capacity(n + 1);
        upper.push(0.0);
        for i in 1..n {
            let cut = gamma_quantile(shape, i as f64 / n as f64)?;
            upper.push(regularized_gamma_p(shape + 1.0, cut)?);
        }
        upper.push(1.0);

        let k = n as f64;
        let mut rates: Vec<f64> = upper.windows(2).map(|w| k * (w[1] - w[0])).collect();
        let mean = rates.iter().sum::<f64>() / k;
        for r in rates.iter_mut() {
            *r /= mean;
        }

        Ok(Self {
            rates,
            weights: vec![1.0 / k; n],
            source: RateSource::Gamma { shape },
        })
    }

    /// Explicit rates with equal weights.
    pub fn uniform(rates: Vec<f64>) -> Result<Self> {
        check_rates(&rates)?;
        let n = rates.len() as f64;
        let weights = vec![1.0 / n; rates.len()];
        Ok(Self {
            rates,
            weights,
            source: RateSource::Custom,
        })
    }

    /// Explicit rates and weights. Weights must sum to 1 within
    /// [`WEIGHT_TOLERANCE`].
    pub fn weighted(rates: Vec<f64>, weights: Vec<f64>) -> Result<Self> {
        check_rates(&rates)?;
        if rates.len() != weights.len() {
            return Err(ReconError::Config(format!(
                "{} rates but {} weights",
                rates.len(),
                weights.len()
            )));
        }
        if weights.iter().any(|&w| !w.is_finite() || w < 0.0) {
            return Err(ReconError::Config(
                "category weights must be non-negative".into(),
            ));
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ReconError::Config(format!(
                "category weights must sum to 1.0, sum = {}",
                total
            )));
        }
        Ok(Self {
            rates,
            weights,
            source: RateSource::Custom,
        })
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn rate(&self, category: usize) -> f64 {
        self.rates[category]
    }

    pub fn weight(&self, category: usize) -> f64 {
        self.weights[category]
    }

    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn source(&self) -> &RateSource {
        &self.source
    }

    /// True when every category carries the same weight.
    pub fn is_uniform(&self) -> bool {
        let first = self.weights[0];
        self.weights.iter().all(|&w| (w - first).abs() <= 1e-12)
    }

    /// `(rate, weight)` pairs in category order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.rates.iter().copied().zip(self.weights.iter().copied())
    }
}

impl Default for RateCategories {
    fn default() -> Self {
        Self::single()
    }
}

impl Summarizable for RateCategories {
    fn summary(&self) -> String {
        match self.source {
            RateSource::Single => "no rate heterogeneity (1 category)".to_string(),
            RateSource::Gamma { shape } => format!(
                "discrete gamma, shape {} ({} categories)",
                shape,
                self.len()
            ),
            RateSource::Custom => format!("user-defined rates ({} categories)", self.len()),
        }
    }
}

impl Reportable for RateCategories {
    fn report_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("Rate heterogeneity: {}", self.summary())];
        for (i, (rate, weight)) in self.iter().enumerate() {
            lines.push(format!(
                "  category {}: rate {:.6}, probability {:.6}",
                i + 1,
                rate,
                weight
            ));
        }
        lines.push(String::new());
        lines
    }
}

fn check_rates(rates: &[f64]) -> Result<()> {
    if rates.is_empty() {
        return Err(ReconError::Config("at least one rate is required".into()));
    }
    if let Some(bad) = rates.iter().find(|r| !r.is_finite() || **r < 0.0) {
        return Err(ReconError::Config(format!(
            "rates must be non-negative, got {}",
            bad
        )));
    }
    Ok(())
}

/// Natural log of the gamma function via the Lanczos approximation (g=7).
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 8] = [
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];

    if x < 0.5 {
        (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut ag = 0.99999999999980993_f64;
        for (i, &c) in COEFFS.iter().enumerate() {
            ag += c / (x + i as f64 + 1.0);
        }
        let t = x + 7.5;
        0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + ag.ln()
    }
}

/// Regularized lower incomplete gamma P(a, x).
///
/// Series expansion below `a + 1`, Lentz continued fraction for the upper
/// tail above it.
fn regularized_gamma_p(a: f64, x: f64) -> Result<f64> {
    if !(a > 0.0) || x < 0.0 {
        return Err(ReconError::InvalidInput(format!(
            "incomplete gamma undefined for a={}, x={}",
            a, x
        )));
    }
    if x == 0.0 {
        return Ok(0.0);
    }
    if x.is_infinite() {
        return Ok(1.0);
    }
    let ln_prefix = a * x.ln() - x - ln_gamma(a);

    if x < a + 1.0 {
        let mut term = 1.0 / a;
        let mut sum = term;
        for n in 1..=SERIES_MAX_ITER {
            term *= x / (a + n as f64);
            sum += term;
            if term.abs() < sum.abs() * SERIES_EPS {
                break;
            }
        }
        Ok((sum * ln_prefix.exp()).min(1.0))
    } else {
        let tiny = 1e-300_f64;
        let mut b = x + 1.0 - a;
        let mut c = 1.0 / tiny;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..=SERIES_MAX_ITER {
            let an = -(i as f64) * (i as f64 - a);
            b += 2.0;
            d = an * d + b;
            if d.abs() < tiny {
                d = tiny;
            }
            c = b + an / c;
            if c.abs() < tiny {
                c = tiny;
            }
            d = 1.0 / d;
            let delta = d * c;
            h *= delta;
            if (delta - 1.0).abs() < SERIES_EPS {
                break;
            }
        }
        Ok((1.0 - h * ln_prefix.exp()).max(0.0))
    }
}

/// Quantile of Gamma(a, 1) at probability `p`, by bisection.
fn gamma_quantile(a: f64, p: f64) -> Result<f64> {
    let mut lo = 0.0;
    let mut hi = a + 10.0 * a.sqrt() + 10.0;
    while regularized_gamma_p(a, hi)? < p {
        hi *= 2.0;
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if regularized_gamma_p(a, mid)? < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= 1e-15 * hi {
            break;
        }
    }
    Ok(0.5 * (lo + hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f64], b: &[f64], tol: f64) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < tol, "{:?} vs {:?}", a, b);
        }
    }

    #[test]
    fn single_category() {
        let r = RateCategories::single();
        assert_eq!(r.len(), 1);
        assert_eq!(r.rate(0), 1.0);
        assert_eq!(r.weight(0), 1.0);
        assert!(r.is_uniform());
    }

    #[test]
    fn gamma_matches_published_means() {
        // Yang (1994), table 1.
        let r = RateCategories::gamma(0.5, 4).unwrap();
        assert_close(r.rates(), &[0.0334, 0.2519, 0.8203, 2.8944], 1e-4);
        let r = RateCategories::gamma(1.0, 4).unwrap();
        assert_close(r.rates(), &[0.1370, 0.4768, 1.0000, 2.3863], 1e-4);
    }

    #[test]
    fn gamma_has_mean_one_and_equal_weights() {
        for &(shape, n) in &[(0.2, 3), (0.8, 6), (5.0, 8)] {
            let r = RateCategories::gamma(shape, n).unwrap();
            let mean: f64 = r.iter().map(|(rate, w)| rate * w).sum();
            assert!((mean - 1.0).abs() < 1e-12);
            assert!(r.is_uniform());
            assert!(r.rates().windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn gamma_degenerate_cases_collapse_to_single() {
        assert_eq!(RateCategories::gamma(0.5, 1).unwrap(), RateCategories::single());
        assert_eq!(RateCategories::gamma(0.0, 4).unwrap(), RateCategories::single());
    }

    #[test]
    fn gamma_rejects_bad_arguments() {
        assert!(matches!(RateCategories::gamma(-1.0, 4), Err(ReconError::Config(_))));
        assert!(RateCategories::gamma(0.5, 0).is_err());
        assert!(RateCategories::gamma(f64::NAN, 4).is_err());
    }

    #[test]
    fn uniform_rates() {
        let r = RateCategories::uniform(vec![0.5, 1.5]).unwrap();
        assert_eq!(r.weights(), &[0.5, 0.5]);
        assert!(r.is_uniform());
        assert!(RateCategories::uniform(vec![]).is_err());
        assert!(RateCategories::uniform(vec![-1.0]).is_err());
    }

    #[test]
    fn weighted_rates() {
        let r = RateCategories::weighted(vec![0.5, 2.0], vec![0.75, 0.25]).unwrap();
        assert!(!r.is_uniform());
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![(0.5, 0.75), (2.0, 0.25)]);
    }

    #[test]
    fn weighted_validation() {
        assert!(RateCategories::weighted(vec![1.0, 2.0], vec![1.0]).is_err());
        assert!(RateCategories::weighted(vec![1.0, 2.0], vec![0.5, 0.6]).is_err());
        assert!(RateCategories::weighted(vec![1.0, 2.0], vec![1.2, -0.2]).is_err());
        // Within tolerance.
        assert!(RateCategories::weighted(vec![1.0, 2.0], vec![0.5, 0.5000001]).is_ok());
    }

    #[test]
    fn incomplete_gamma_reference_values() {
        // P(1, x) = 1 - exp(-x)
        for &x in &[0.1, 1.0, 3.0, 10.0] {
            let p = regularized_gamma_p(1.0, x).unwrap();
            assert!((p - (1.0 - (-x as f64).exp())).abs() < 1e-13);
        }
        assert_eq!(regularized_gamma_p(2.0, 0.0).unwrap(), 0.0);
        assert!(regularized_gamma_p(0.0, 1.0).is_err());
    }

    #[test]
    fn quantile_inverts_cdf() {
        for &a in &[0.3, 1.0, 4.0] {
            for &p in &[0.1, 0.5, 0.9] {
                let q = gamma_quantile(a, p).unwrap();
                assert!((regularized_gamma_p(a, q).unwrap() - p).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn report_lines_list_categories() {
        let lines = RateCategories::gamma(0.5, 4).unwrap().report_lines();
        assert_eq!(lines[0], "Rate heterogeneity: discrete gamma, shape 0.5 (4 categories)");
        assert_eq!(lines.len(), 6);
        assert!(lines[1].starts_with("  category 1: rate 0.033"));
    }
}
