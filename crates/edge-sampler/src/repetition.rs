use std::collections::VecDeque;

use crate::sampler::{Sampler, TokenLogit};

/// Penalizes candidates that were accepted recently.
///
/// Positive logits are divided by `penalty`, negative ones multiplied, so the
/// penalty always lowers the token's chance.
pub struct RepetitionPenaltySampler {
    penalty: f32,
    history: VecDeque<u32>,
    last_n: usize,
}

impl RepetitionPenaltySampler {
    pub fn new(penalty: f32, last_n: usize) -> Self {
        Self {
            penalty,
            history: VecDeque::with_capacity(last_n),
            last_n,
        }
    }
}

impl Sampler for RepetitionPenaltySampler {
    fn name(&self) -> &str {
        "repetition_penalty"
    }

    fn apply(&mut self, candidates: &mut Vec<TokenLogit>) {
        if self.penalty == 1.0 || self.history.is_empty() {
            return;
        }
        for t in candidates.iter_mut() {
            if self.history.contains(&t.token_id) {
                if t.logit > 0.0 {
                    t.logit /= self.penalty;
                } else {
                    t.logit *= self.penalty;
                }
            }
        }
    }

    fn accept(&mut self, token: u32) {
        if self.last_n == 0 {
            return;
        }
        if self.history.len() == self.last_n {
            self.history.pop_front();
        }
        self.history.push_back(token);
    }

    fn reset(&mut self) {
        self.history.clear();
    }
}
