use crate::sampler::{sort_descending, sorted_probs, Sampler, TokenLogit};

/// Nucleus sampling: keeps the smallest prefix of candidates whose
/// cumulative probability reaches `p`, but never fewer than `min_keep`.
pub struct TopPSampler {
    p: f32,
    min_keep: usize,
}

impl TopPSampler {
    pub fn new(p: f32, min_keep: usize) -> Self {
        Self { p, min_keep }
    }
}

impl Sampler for TopPSampler {
    fn name(&self) -> &str {
        "top_p"
    }

    fn apply(&mut self, candidates: &mut Vec<TokenLogit>) {
        if self.p >= 1.0 || candidates.is_empty() {
            return;
        }
        sort_descending(candidates);
        let probs = sorted_probs(candidates);

        let mut cumulative = 0.0f32;
        let mut cutoff = candidates.len();
        for (i, prob) in probs.into_iter().enumerate() {
            cumulative += prob;
            if cumulative >= self.p && i + 1 >= self.min_keep {
                cutoff = i + 1;
                break;
            }
        }
        candidates.truncate(cutoff.max(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<TokenLogit> {
        // Probabilities roughly 0.64, 0.24, 0.09, 0.03.
        [3.0f32, 2.0, 1.0, 0.0]
            .iter()
            .enumerate()
            .map(|(i, &logit)| TokenLogit { token_id: i as u32, logit })
            .collect()
    }

    #[test]
    fn test_cuts_at_threshold() {
        let mut c = candidates();
        TopPSampler::new(0.8, 1).apply(&mut c);
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_min_keep() {
        let mut c = candidates();
        TopPSampler::new(0.1, 3).apply(&mut c);
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn test_one_is_noop() {
        let mut c = candidates();
        TopPSampler::new(1.0, 1).apply(&mut c);
        assert_eq!(c.len(), 4);
    }
}
