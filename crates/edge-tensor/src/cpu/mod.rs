pub mod matmul;
pub mod unary;

use std::sync::Arc;

use rayon::ThreadPool;

use crate::backend::ComputeBackend;
use crate::error::{Result, TensorError};

/// Pure-Rust CPU compute backend.
///
/// Operations are straightforward loops aimed at correctness. Matmul, which
/// dominates a forward pass, is split by output rows across a private
/// `rayon` pool when more than one thread is requested.
#[derive(Debug, Clone)]
pub struct CpuBackend {
    threads: usize,
    pool: Option<Arc<ThreadPool>>,
}

impl CpuBackend {
    /// A single-threaded backend.
    pub fn new() -> Self {
        CpuBackend {
            threads: 1,
            pool: None,
        }
    }

    /// A backend computing with `threads` workers.
    ///
    /// Zero and one both mean single-threaded. Any larger count builds a
    /// dedicated pool so the caller's thread budget is not shared with the
    /// global rayon pool.
    pub fn with_threads(threads: usize) -> Result<Self> {
        if threads <= 1 {
            return Ok(Self::new());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("edge-compute-{}", i))
            .build()
            .map_err(|e| TensorError::ThreadPool(e.to_string()))?;
        Ok(CpuBackend {
            threads,
            pool: Some(Arc::new(pool)),
        })
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn check_len(op: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(TensorError::LengthMismatch { op, expected, got });
    }
    Ok(())
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn threads(&self) -> usize {
        self.threads
    }

    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>> {
        check_len("matmul lhs", m * k, a.len())?;
        check_len("matmul rhs", k * n, b.len())?;
        Ok(match &self.pool {
            Some(pool) => matmul::matmul_parallel(pool, a, b, m, k, n),
            None => matmul::matmul_serial(a, b, m, k, n),
        })
    }

    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        check_len("add", a.len(), b.len())?;
        Ok(a.iter().zip(b.iter()).map(|(x, y)| x + y).collect())
    }

    fn mul(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        check_len("mul", a.len(), b.len())?;
        Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).collect())
    }

    fn rms_norm(
        &self,
        x: &[f32],
        weight: &[f32],
        eps: f32,
        hidden_size: usize,
    ) -> Result<Vec<f32>> {
        check_len("rms_norm weight", hidden_size, weight.len())?;
        if hidden_size == 0 || x.len() % hidden_size != 0 {
            return Err(TensorError::Other(format!(
                "rms_norm: x.len()={} is not a multiple of hidden_size={}",
                x.len(),
                hidden_size
            )));
        }

        let mut result = vec![0.0f32; x.len()];
        for (row, out) in x
            .chunks_exact(hidden_size)
            .zip(result.chunks_exact_mut(hidden_size))
        {
            unary::rms_norm_row(row, weight, eps, out);
        }
        Ok(result)
    }

    fn softmax(&self, x: &[f32], n: usize) -> Result<Vec<f32>> {
        if n == 0 || x.len() % n != 0 {
            return Err(TensorError::Other(format!(
                "softmax: x.len()={} is not a multiple of n={}",
                x.len(),
                n
            )));
        }

        let mut result = vec![0.0f32; x.len()];
        for (row, out) in x.chunks_exact(n).zip(result.chunks_exact_mut(n)) {
            unary::softmax_row(row, out);
        }
        Ok(result)
    }

    fn rope(
        &self,
        q: &[f32],
        k: &[f32],
        head_dim: usize,
        pos: usize,
        n_heads_q: usize,
        n_heads_k: usize,
        freq_base: f32,
    ) -> Result<(Vec<f32>, Vec<f32>)> {
        check_len("rope q", n_heads_q * head_dim, q.len())?;
        check_len("rope k", n_heads_k * head_dim, k.len())?;
        if head_dim == 0 {
            return Err(TensorError::Other("rope: head_dim must be > 0".to_string()));
        }

        let mut q_out = q.to_vec();
        let mut k_out = k.to_vec();
        unary::rope_heads(&mut q_out, head_dim, pos, freq_base);
        unary::rope_heads(&mut k_out, head_dim, pos, freq_base);
        Ok((q_out, k_out))
    }

    fn silu(&self, x: &[f32]) -> Result<Vec<f32>> {
        Ok(x.iter().map(|&v| unary::silu(v)).collect())
    }
}
