use std::cmp::Ordering;
use std::fmt;

use crate::dist::DistSampler;
use crate::greedy::GreedySampler;
use crate::params::SamplerParams;
use crate::repetition::RepetitionPenaltySampler;
use crate::temperature::TemperatureSampler;
use crate::top_k::TopKSampler;
use crate::top_p::TopPSampler;

/// A token ID paired with its logit value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenLogit {
    pub token_id: u32,
    pub logit: f32,
}

/// One stage of a sampling pipeline.
pub trait Sampler: Send + Sync {
    fn name(&self) -> &str;

    /// Rescale, reorder or truncate the candidates in place.
    fn apply(&mut self, candidates: &mut Vec<TokenLogit>);

    /// Observe the token that was finally chosen.
    fn accept(&mut self, _token: u32) {}

    /// Drop per-generation state such as token history. Random number
    /// generators keep their position.
    fn reset(&mut self) {}
}

/// Sort candidates by logit, highest first. NaN compares equal.
pub(crate) fn sort_descending(candidates: &mut [TokenLogit]) {
    candidates.sort_by(|a, b| b.logit.partial_cmp(&a.logit).unwrap_or(Ordering::Equal));
}

/// Softmax over candidates already sorted highest first.
pub(crate) fn sorted_probs(candidates: &[TokenLogit]) -> Vec<f32> {
    let Some(max) = candidates.first().map(|t| t.logit) else {
        return Vec::new();
    };
    let exps: Vec<f32> = candidates.iter().map(|t| (t.logit - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Composes samplers into a pipeline.
///
/// The last stage should be a selector (greedy or dist); the chain returns
/// the first candidate left after every stage ran.
#[derive(Default)]
pub struct SamplerChain {
    samplers: Vec<Box<dyn Sampler>>,
}

impl SamplerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage. Returns self for builder-style usage.
    pub fn with(mut self, sampler: Box<dyn Sampler>) -> Self {
        self.samplers.push(sampler);
        self
    }

    /// Build the standard pipeline: optional repetition penalty, then
    /// temperature, top-k, top-p and a seeded draw.
    ///
    /// A temperature of zero or below selects greedily instead.
    pub fn from_params(params: &SamplerParams) -> Self {
        let mut chain = SamplerChain::new();
        if params.repeat_penalty != 1.0 && params.repeat_last_n > 0 {
            chain = chain.with(Box::new(RepetitionPenaltySampler::new(
                params.repeat_penalty,
                params.repeat_last_n,
            )));
        }
        if params.temperature <= 0.0 {
            return chain.with(Box::new(GreedySampler::new()));
        }
        chain
            .with(Box::new(TemperatureSampler::new(params.temperature)))
            .with(Box::new(TopKSampler::new(params.top_k)))
            .with(Box::new(TopPSampler::new(params.top_p, params.min_keep)))
            .with(Box::new(DistSampler::new(params.seed)))
    }

    /// Run all stages over `logits` (token id = index) and return the
    /// selected token id.
    ///
    /// Empty logits select token 0.
    pub fn sample(&mut self, logits: &[f32]) -> u32 {
        let mut candidates: Vec<TokenLogit> = logits
            .iter()
            .enumerate()
            .map(|(i, &logit)| TokenLogit {
                token_id: i as u32,
                logit,
            })
            .collect();

        for sampler in &mut self.samplers {
            sampler.apply(&mut candidates);
        }

        candidates.first().map(|t| t.token_id).unwrap_or(0)
    }

    /// Feed the chosen token to every stage.
    pub fn accept(&mut self, token: u32) {
        for sampler in &mut self.samplers {
            sampler.accept(token);
        }
    }

    pub fn reset(&mut self) {
        for sampler in &mut self.samplers {
            sampler.reset();
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.samplers.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }
}

impl fmt::Debug for SamplerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamplerChain")
            .field("stages", &self.names())
            .finish()
    }
}
