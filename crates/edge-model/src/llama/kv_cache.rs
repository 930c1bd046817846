use crate::error::{ModelError, Result};

/// Per-layer key and value storage for attention.
///
/// Layout for each layer: `[capacity, kv_dim]` row-major, one row per
/// sequence position. Positions `0..len` are valid.
#[derive(Debug, Clone)]
pub struct KvCache {
    k: Vec<Vec<f32>>,
    v: Vec<Vec<f32>>,
    kv_dim: usize,
    capacity: usize,
    len: usize,
}

fn alloc_zeroed(n: usize, bytes: usize) -> Result<Vec<f32>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(n)
        .map_err(|_| ModelError::AllocationFailed { bytes })?;
    buf.resize(n, 0.0);
    Ok(buf)
}

impl KvCache {
    /// Allocate a cache for `capacity` positions.
    ///
    /// Fails with `AllocationFailed` instead of aborting when the allocator
    /// cannot satisfy the request.
    pub fn new(n_layers: usize, kv_dim: usize, capacity: usize) -> Result<Self> {
        let per_layer = kv_dim
            .checked_mul(capacity)
            .ok_or(ModelError::AllocationFailed { bytes: usize::MAX })?;
        let total_bytes = per_layer
            .saturating_mul(n_layers)
            .saturating_mul(2 * std::mem::size_of::<f32>());

        let mut k = Vec::with_capacity(n_layers);
        let mut v = Vec::with_capacity(n_layers);
        for _ in 0..n_layers {
            k.push(alloc_zeroed(per_layer, total_bytes)?);
            v.push(alloc_zeroed(per_layer, total_bytes)?);
        }

        log::debug!(
            "allocated KV cache: {} layers x {} positions x {} ({} bytes)",
            n_layers,
            capacity,
            kv_dim,
            total_bytes
        );

        Ok(KvCache {
            k,
            v,
            kv_dim,
            capacity,
            len: 0,
        })
    }

    /// Make `pos` the newest position in the cache.
    ///
    /// Writing at `len` appends; writing at an earlier position overwrites it
    /// and drops everything after. Skipping ahead would leave unwritten rows
    /// inside the attention window and is rejected.
    pub fn claim(&mut self, pos: usize) -> Result<()> {
        if pos >= self.capacity {
            return Err(ModelError::ContextFull {
                pos,
                n_ctx: self.capacity,
            });
        }
        if pos > self.len {
            return Err(ModelError::InvalidBatch(format!(
                "position {} leaves a gap after {} cached positions",
                pos, self.len
            )));
        }
        self.len = pos + 1;
        Ok(())
    }

    /// Store the key and value rows for `layer` at a claimed position.
    pub fn store(&mut self, layer: usize, pos: usize, k_row: &[f32], v_row: &[f32]) -> Result<()> {
        if pos >= self.len || k_row.len() != self.kv_dim || v_row.len() != self.kv_dim {
            return Err(ModelError::InvalidBatch(format!(
                "cache write at position {} (len {}) with rows of {}/{} values, expected {}",
                pos,
                self.len,
                k_row.len(),
                v_row.len(),
                self.kv_dim
            )));
        }
        let offset = pos * self.kv_dim;
        self.k[layer][offset..offset + self.kv_dim].copy_from_slice(k_row);
        self.v[layer][offset..offset + self.kv_dim].copy_from_slice(v_row);
        Ok(())
    }

    /// Keys for positions `0..len` of `layer`.
    pub fn keys(&self, layer: usize) -> &[f32] {
        &self.k[layer][..self.len * self.kv_dim]
    }

    /// Values for positions `0..len` of `layer`.
    pub fn values(&self, layer: usize) -> &[f32] {
        &self.v[layer][..self.len * self.kv_dim]
    }

    /// Forget every cached position. The allocation is kept.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn kv_dim(&self) -> usize {
        self.kv_dim
    }
}
