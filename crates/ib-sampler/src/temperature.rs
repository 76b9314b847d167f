use crate::sampler::{Sampler, TokenLogit};

/// Scales all logits by `1 / temperature`.
///
/// Higher temperatures flatten the distribution, lower ones sharpen it.
pub struct TemperatureSampler {
    temperature: f32,
}

impl TemperatureSampler {
    /// Create a new temperature sampler with the given temperature.
    pub fn new(temperature: f32) -> Self {
        Self { temperature }
    }
}

impl Sampler for TemperatureSampler {
    fn name(&self) -> &str {
        "temperature"
    }

    fn apply(&mut self, candidates: &mut Vec<TokenLogit>) {
        // Non-positive temperatures collapse toward argmax instead of dividing by zero.
        let temp = if self.temperature <= 0.0 {
            1e-7
        } else {
            self.temperature
        };

        for token in candidates.iter_mut() {
            token.logit /= temp;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scales_by_inverse_temperature() {
        let mut c = vec![
            TokenLogit { token_id: 0, logit: 1.0 },
            TokenLogit { token_id: 1, logit: -2.0 },
        ];
        TemperatureSampler::new(0.5).apply(&mut c);
        assert_relative_eq!(c[0].logit, 2.0);
        assert_relative_eq!(c[1].logit, -4.0);
    }

    #[test]
    fn test_zero_temperature_is_finite() {
        let mut c = vec![TokenLogit { token_id: 0, logit: 0.25 }];
        TemperatureSampler::new(0.0).apply(&mut c);
        assert!(c[0].logit.is_finite());
        assert!(c[0].logit > 1.0e5);
    }
}
