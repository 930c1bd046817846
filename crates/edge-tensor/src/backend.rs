use std::fmt::Debug;

use crate::error::Result;

/// Trait for pluggable compute backends.
///
/// All operations work on f32 slices. Inputs are borrowed and results are
/// returned as owned vectors, so a backend is free to schedule the work on
/// its own threads.
pub trait ComputeBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "cpu").
    fn name(&self) -> &str;

    /// Number of worker threads the backend computes with.
    fn threads(&self) -> usize;

    /// Matrix multiplication: C = A @ B.
    ///
    /// - `a`: row-major data of shape [m, k]
    /// - `b`: row-major data of shape [k, n]
    /// - Returns: row-major data of shape [m, n]
    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>>;

    /// Element-wise addition: result[i] = a[i] + b[i].
    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>>;

    /// Element-wise multiplication: result[i] = a[i] * b[i].
    fn mul(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>>;

    /// RMS normalization over rows of `hidden_size` elements:
    ///   rms = sqrt(mean(x^2) + eps)
    ///   result[i] = x[i] * weight[i] / rms
    fn rms_norm(
        &self,
        x: &[f32],
        weight: &[f32],
        eps: f32,
        hidden_size: usize,
    ) -> Result<Vec<f32>>;

    /// Softmax over chunks of `n` elements.
    fn softmax(&self, x: &[f32], n: usize) -> Result<Vec<f32>>;

    /// Rotary Position Embedding applied to query and key heads at `pos`.
    ///
    /// - `q`: shape [n_heads_q, head_dim]
    /// - `k`: shape [n_heads_k, head_dim]
    /// - `freq_base`: RoPE theta (10000.0 for the original LLaMA)
    ///
    /// Returns (rotated_q, rotated_k).
    #[allow(clippy::too_many_arguments)]
    fn rope(
        &self,
        q: &[f32],
        k: &[f32],
        head_dim: usize,
        pos: usize,
        n_heads_q: usize,
        n_heads_k: usize,
        freq_base: f32,
    ) -> Result<(Vec<f32>, Vec<f32>)>;

    /// SiLU activation: x * sigmoid(x).
    fn silu(&self, x: &[f32]) -> Result<Vec<f32>>;
}
