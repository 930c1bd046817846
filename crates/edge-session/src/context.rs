use std::sync::Arc;

use edge_model::{Batch, KvCache, ModelArchitecture, ModelError};
use edge_tensor::{ComputeBackend, CpuBackend};

use crate::error::{Result, SessionError};
use crate::generate::Decoder;

/// Most tokens a single decode call accepts.
pub const BATCH_CAPACITY: usize = 512;

/// Execution state bound to one model: KV cache, compute threads and the
/// logits of the last decode.
pub struct Context {
    model: Arc<dyn ModelArchitecture>,
    cache: KvCache,
    compute: CpuBackend,
    n_batch: usize,
    logits: Option<Vec<f32>>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("n_ctx", &self.cache.capacity())
            .field("n_batch", &self.n_batch)
            .field("threads", &self.compute.threads())
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl Context {
    /// Allocate a context of `n_ctx` positions computing on `threads` threads.
    ///
    /// `n_ctx == 0` uses the model's trained context length.
    pub fn new(model: Arc<dyn ModelArchitecture>, n_ctx: usize, threads: usize) -> Result<Context> {
        let n_ctx = if n_ctx == 0 { model.context_length() } else { n_ctx };
        if n_ctx > model.context_length() {
            log::warn!(
                "context size {} exceeds the trained context length {}",
                n_ctx,
                model.context_length()
            );
        }

        let compute = CpuBackend::with_threads(threads)
            .map_err(|e| SessionError::ContextCreation(e.to_string()))?;
        let cache = model
            .new_cache(n_ctx)
            .map_err(|e| SessionError::ContextCreation(e.to_string()))?;

        log::info!(
            "context created: n_ctx {}, n_batch {}, {} threads",
            n_ctx,
            BATCH_CAPACITY,
            compute.threads()
        );

        Ok(Context {
            model,
            cache,
            compute,
            n_batch: BATCH_CAPACITY,
            logits: None,
        })
    }

    pub fn n_ctx(&self) -> usize {
        self.cache.capacity()
    }

    pub fn threads(&self) -> usize {
        self.compute.threads()
    }

    /// Positions currently held in the KV cache.
    pub fn n_cached(&self) -> usize {
        self.cache.len()
    }
}

impl Decoder for Context {
    fn batch_capacity(&self) -> usize {
        self.n_batch
    }

    fn clear_memory(&mut self) {
        self.cache.clear();
        self.logits = None;
    }

    fn decode(&mut self, batch: &Batch) -> edge_model::Result<()> {
        self.logits = None;
        if batch.len() > self.n_batch {
            return Err(ModelError::BatchFull {
                capacity: self.n_batch,
            });
        }
        let mut rows = self.model.forward(batch, &mut self.cache, &self.compute)?;
        self.logits = rows.pop();
        Ok(())
    }

    fn logits(&self) -> Option<&[f32]> {
        self.logits.as_deref()
    }
}
