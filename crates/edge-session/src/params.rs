use edge_sampler::SamplerParams;

use crate::cancel::CancelToken;

/// Settings for `Session::load`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadParams {
    /// Context window in tokens. Zero uses the model's trained length.
    pub context_size: usize,
    /// Compute threads. Zero uses every available core.
    pub threads: usize,
    /// Layers to offload to a GPU. Recorded only: the CPU backend runs all layers.
    pub gpu_layers: u32,
    pub sampler: SamplerParams,
}

impl Default for LoadParams {
    fn default() -> Self {
        LoadParams {
            context_size: 2048,
            threads: 4,
            gpu_layers: 0,
            sampler: SamplerParams::default(),
        }
    }
}

impl LoadParams {
    pub fn with_context_size(mut self, context_size: usize) -> Self {
        self.context_size = context_size;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_gpu_layers(mut self, gpu_layers: u32) -> Self {
        self.gpu_layers = gpu_layers;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerParams) -> Self {
        self.sampler = sampler;
        self
    }
}

/// Settings for one generation call.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub max_tokens: usize,
    pub cancel: Option<CancelToken>,
}

impl GenerateOptions {
    pub fn new(max_tokens: usize) -> Self {
        GenerateOptions {
            max_tokens,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}
