use crate::sampler::{sort_descending, Sampler, TokenLogit};

/// Keeps the `k` highest-logit candidates. Zero disables the stage.
pub struct TopKSampler {
    k: usize,
}

impl TopKSampler {
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl Sampler for TopKSampler {
    fn name(&self) -> &str {
        "top_k"
    }

    fn apply(&mut self, candidates: &mut Vec<TokenLogit>) {
        if self.k == 0 || self.k >= candidates.len() {
            return;
        }
        sort_descending(candidates);
        candidates.truncate(self.k);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_top_k() {
        let mut c: Vec<TokenLogit> = (0..10)
            .map(|i| TokenLogit { token_id: i, logit: i as f32 })
            .collect();
        TopKSampler::new(3).apply(&mut c);
        let ids: Vec<u32> = c.iter().map(|t| t.token_id).collect();
        assert_eq!(ids, vec![9, 8, 7]);
    }

    #[test]
    fn test_zero_is_noop() {
        let mut c = vec![TokenLogit { token_id: 0, logit: 1.0 }; 4];
        TopKSampler::new(0).apply(&mut c);
        assert_eq!(c.len(), 4);
    }
}
