use crate::sampler::{Sampler, TokenLogit};

/// Selects the single candidate with the highest logit.
#[derive(Debug, Default)]
pub struct GreedySampler;

impl GreedySampler {
    pub fn new() -> Self {
        Self
    }
}

impl Sampler for GreedySampler {
    fn name(&self) -> &str {
        "greedy"
    }

    fn apply(&mut self, candidates: &mut Vec<TokenLogit>) {
        // Earliest index wins ties.
        let best = candidates
            .iter()
            .copied()
            .reduce(|best, t| if t.logit > best.logit { t } else { best });
        if let Some(best) = best {
            candidates.clear();
            candidates.push(best);
        }
    }
}
