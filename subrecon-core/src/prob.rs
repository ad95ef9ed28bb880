//! Log-space helpers for numerically stable likelihood arithmetic.
//!
//! Likelihoods over whole alignment columns underflow `f64` quickly, so the
//! engine keeps everything as natural logarithms and only leaves log space
//! for final posterior probabilities.

/// Natural logarithm of `sum(exp(values))` without overflow or underflow.
///
/// Subtracts the maximum before exponentiating and adds it back afterwards.
/// A single-element slice is returned unchanged. An empty slice, or one where
/// every value is `-inf`, yields `-inf` (the log of an empty sum).
pub fn log_sum_exp(values: &[f64]) -> f64 {
    match values.len() {
        0 => return f64::NEG_INFINITY,
        1 => return values[0],
        _ => {}
    }

    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY || max == f64::INFINITY {
        return max;
    }

    let sum: f64 = values.iter().map(|&v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Entrywise natural logarithm. Zero entries map to `-inf`.
pub fn ln_values(values: &[f64]) -> Vec<f64> {
    values.iter().map(|&v| v.ln()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_element_is_identity() {
        assert_eq!(log_sum_exp(&[-1234.5]), -1234.5);
        assert_eq!(log_sum_exp(&[0.0]), 0.0);
    }

    #[test]
    fn empty_is_negative_infinity() {
        assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
    }

    #[test]
    fn all_negative_infinity() {
        let v = [f64::NEG_INFINITY; 3];
        assert_eq!(log_sum_exp(&v), f64::NEG_INFINITY);
    }

    #[test]
    fn ignores_negative_infinity_terms() {
        let v = [f64::NEG_INFINITY, 0.5_f64.ln(), f64::NEG_INFINITY, 0.25_f64.ln()];
        assert!((log_sum_exp(&v) - 0.75_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn equal_values_add_log_n() {
        let x = -700.0;
        let v = vec![x; 8];
        assert!((log_sum_exp(&v) - (x + 8.0_f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn survives_values_that_underflow_in_linear_space() {
        // exp(-1000) is 0.0 in f64, the log-space sum is still exact.
        let v = [-1000.0, -1000.0];
        assert!((log_sum_exp(&v) - (-1000.0 + 2.0_f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn ln_values_maps_zero_to_neg_infinity() {
        let logs = ln_values(&[1.0, 0.0, std::f64::consts::E]);
        assert_eq!(logs[0], 0.0);
        assert_eq!(logs[1], f64::NEG_INFINITY);
        assert!((logs[2] - 1.0).abs() < 1e-15);
    }
}
