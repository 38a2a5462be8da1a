//! Transaction sampling.

use crate::models::TraceId;

/// Probability sampler keyed on the trace id.
///
/// The decision is derived from the low 63 bits of the trace id, so every
/// unit that sees the same trace id reaches the same verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sampler {
    rate: Option<f64>,
}

impl Sampler {
    /// Creates a sampler. `None` disables tracing; rates are clamped to
    /// `[0, 1]`.
    #[must_use]
    pub fn new(rate: Option<f64>) -> Self {
        Self {
            rate: rate.filter(|r| !r.is_nan()).map(|r| r.clamp(0.0, 1.0)),
        }
    }

    /// Returns the configured rate.
    #[must_use]
    pub fn rate(&self) -> Option<f64> {
        self.rate
    }

    /// Decides whether a new trace is recorded.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn should_sample(&self, trace_id: TraceId) -> bool {
        match self.rate {
            None => false,
            Some(rate) if rate >= 1.0 => true,
            Some(rate) => {
                let upper_bound = (rate * (1u64 << 63) as f64) as u64;
                let low = (trace_id.to_u128() & u128::from(u64::MAX)) as u64;
                (low >> 1) < upper_bound
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_rate_never_samples() {
        let sampler = Sampler::new(None);
        assert!((0..100).all(|_| !sampler.should_sample(TraceId::random())));
    }

    #[test]
    fn test_bounds() {
        let always = Sampler::new(Some(1.0));
        let never = Sampler::new(Some(0.0));
        for _ in 0..100 {
            let id = TraceId::random();
            assert!(always.should_sample(id));
            assert!(!never.should_sample(id));
        }
    }

    #[test]
    fn test_rate_is_clamped() {
        assert_eq!(Sampler::new(Some(4.0)).rate(), Some(1.0));
        assert_eq!(Sampler::new(Some(-1.0)).rate(), Some(0.0));
        assert_eq!(Sampler::new(Some(f64::NAN)).rate(), None);
    }

    #[test]
    fn test_decision_is_stable_per_trace() {
        let sampler = Sampler::new(Some(0.5));
        let id = TraceId::random();
        let first = sampler.should_sample(id);
        assert!((0..10).all(|_| sampler.should_sample(id) == first));
    }

    #[test]
    fn test_half_rate_splits_trace_ids() {
        let sampler = Sampler::new(Some(0.5));
        let low = TraceId::from_hex("00000000000000000000000000000001").unwrap();
        let high = TraceId::from_hex("0000000000000000ffffffffffffffff").unwrap();
        assert!(sampler.should_sample(low));
        assert!(!sampler.should_sample(high));
    }
}
