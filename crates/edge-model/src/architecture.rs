use edge_tensor::ComputeBackend;

use crate::batch::Batch;
use crate::llama::KvCache;

/// A model architecture that can run decode steps over a KV cache.
///
/// Implementations hold only immutable weights. All per-sequence state lives
/// in the `KvCache` the caller passes in, so one loaded model can back
/// several caches.
pub trait ModelArchitecture: Send + Sync {
    /// Process every entry of `batch` in order, writing keys and values into
    /// `cache` at each entry's position.
    ///
    /// Returns one row of `vocab_size()` logits per entry flagged with
    /// `logits`, in batch order.
    fn forward(
        &self,
        batch: &Batch,
        cache: &mut KvCache,
        backend: &dyn ComputeBackend,
    ) -> crate::Result<Vec<Vec<f32>>>;

    /// Number of output logits per row.
    fn vocab_size(&self) -> usize;

    /// Context length the model was trained with.
    fn context_length(&self) -> usize;

    /// Allocate an empty cache holding `n_ctx` positions.
    fn new_cache(&self, n_ctx: usize) -> crate::Result<KvCache>;
}
