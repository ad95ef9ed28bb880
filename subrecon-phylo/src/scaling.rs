//! Underflow protection for conditional likelihood vectors.

/// Offset added to a vector's maximum before dividing by it, so an all-zero
/// vector never divides by zero.
pub const TINY: f64 = 1e-10;

/// Running sum of the log factors removed by [`rescale`] during one
/// recursive descent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScalingAccumulator {
    total: f64,
}

impl ScalingAccumulator {
    /// An accumulator holding no scaling yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one removed factor, in log space.
    pub fn add(&mut self, log_factor: f64) {
        self.total += log_factor;
    }

    /// Sum of every log factor recorded so far.
    pub fn get(&self) -> f64 {
        self.total
    }
}

/// Divide `values` by `max + TINY` and record `ln(max + TINY)` in `acc`.
pub fn rescale(values: &mut [f64], acc: &mut ScalingAccumulator) {
    let max = values.iter().cloned().fold(0.0_f64, f64::max);
    let divisor = max + TINY;
    for v in values.iter_mut() {
        *v /= divisor;
    }
    acc.add(divisor.ln());
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn rescaled_max_is_one(values in proptest::collection::vec(1e-3f64..1e3, 1..30)) {
            let mut v = values.clone();
            let mut acc = ScalingAccumulator::new();
            rescale(&mut v, &mut acc);
            let max = v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!((max - 1.0).abs() < 1e-6);
        }

        #[test]
        fn rescaling_is_reversible(values in proptest::collection::vec(1e-3f64..1e3, 1..30)) {
            let mut v = values.clone();
            let mut acc = ScalingAccumulator::new();
            rescale(&mut v, &mut acc);
            for (orig, scaled) in values.iter().zip(&v) {
                prop_assert!((orig.ln() - (scaled.ln() + acc.get())).abs() < 1e-9);
            }
        }
    }
}
