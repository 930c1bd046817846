use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::sampler::{sort_descending, sorted_probs, Sampler, TokenLogit};

/// Seed value meaning "seed from OS entropy".
pub const DEFAULT_SEED: u32 = u32::MAX;

fn make_rng(seed: u32) -> StdRng {
    if seed == DEFAULT_SEED {
        StdRng::from_entropy()
    } else {
        StdRng::seed_from_u64(seed as u64)
    }
}

/// Draws one token from the softmax of the remaining candidates.
///
/// The RNG advances across calls and survives `reset`, so a fixed seed gives
/// one reproducible stream of draws for the sampler's whole lifetime rather
/// than replaying it for every generation.
pub struct DistSampler {
    rng: StdRng,
}

impl DistSampler {
    pub fn new(seed: u32) -> Self {
        Self { rng: make_rng(seed) }
    }
}

impl Sampler for DistSampler {
    fn name(&self) -> &str {
        "dist"
    }

    fn apply(&mut self, candidates: &mut Vec<TokenLogit>) {
        if candidates.is_empty() {
            return;
        }
        sort_descending(candidates);
        let probs = sorted_probs(candidates);

        let index = match WeightedIndex::new(&probs) {
            Ok(dist) => dist.sample(&mut self.rng),
            // Non-finite logits: fall back to the best candidate.
            Err(_) => 0,
        };
        let selected = candidates[index];
        candidates.clear();
        candidates.push(selected);
    }
}
