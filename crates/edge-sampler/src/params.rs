use crate::dist::DEFAULT_SEED;

/// Settings for `SamplerChain::from_params`.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerParams {
    /// Zero or below means greedy selection.
    pub temperature: f32,
    /// Zero disables top-k.
    pub top_k: usize,
    /// 1.0 disables nucleus truncation.
    pub top_p: f32,
    /// Minimum candidates top-p keeps.
    pub min_keep: usize,
    /// `DEFAULT_SEED` draws a fresh seed from the OS.
    pub seed: u32,
    /// 1.0 disables the repetition penalty.
    pub repeat_penalty: f32,
    /// How many accepted tokens the penalty looks back over.
    pub repeat_last_n: usize,
}

impl Default for SamplerParams {
    fn default() -> Self {
        SamplerParams {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            min_keep: 1,
            seed: DEFAULT_SEED,
            repeat_penalty: 1.0,
            repeat_last_n: 64,
        }
    }
}

impl SamplerParams {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_top_p(mut self, top_p: f32, min_keep: usize) -> Self {
        self.top_p = top_p;
        self.min_keep = min_keep;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_repeat_penalty(mut self, penalty: f32, last_n: usize) -> Self {
        self.repeat_penalty = penalty;
        self.repeat_last_n = last_n;
        self
    }
}
