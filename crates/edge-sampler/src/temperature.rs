use crate::sampler::{sort_descending, Sampler, TokenLogit};

/// Divides every logit by the temperature.
///
/// Higher temperatures flatten the distribution, lower ones sharpen it. A
/// temperature of zero or below keeps only the best candidate.
pub struct TemperatureSampler {
    temperature: f32,
}

impl TemperatureSampler {
    pub fn new(temperature: f32) -> Self {
        Self { temperature }
    }
}

impl Sampler for TemperatureSampler {
    fn name(&self) -> &str {
        "temperature"
    }

    fn apply(&mut self, candidates: &mut Vec<TokenLogit>) {
        if self.temperature <= 0.0 {
            sort_descending(candidates);
            candidates.truncate(1);
            return;
        }
        for t in candidates.iter_mut() {
            t.logit /= self.temperature;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_scales_logits() {
        let mut c = vec![TokenLogit { token_id: 0, logit: 1.4 }];
        TemperatureSampler::new(0.7).apply(&mut c);
        assert_abs_diff_eq!(c[0].logit, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_keeps_best() {
        let mut c = vec![
            TokenLogit { token_id: 0, logit: 1.0 },
            TokenLogit { token_id: 1, logit: 2.0 },
        ];
        TemperatureSampler::new(0.0).apply(&mut c);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].token_id, 1);
    }
}
