//! Element-wise and row-wise kernels for the CPU backend.

/// Numerically stable softmax of one row, written into `out`.
pub(crate) fn softmax_row(row: &[f32], out: &mut [f32]) {
    let max_val = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0f32;
    for (o, &x) in out.iter_mut().zip(row.iter()) {
        let e = (x - max_val).exp();
        *o = e;
        sum += e;
    }
    for o in out.iter_mut() {
        *o /= sum;
    }
}

/// RMS normalization of one row scaled by `weight`, written into `out`.
pub(crate) fn rms_norm_row(row: &[f32], weight: &[f32], eps: f32, out: &mut [f32]) {
    let mean_sq = row.iter().map(|v| v * v).sum::<f32>() / row.len() as f32;
    let inv_rms = 1.0 / (mean_sq + eps).sqrt();
    for ((o, &x), &w) in out.iter_mut().zip(row.iter()).zip(weight.iter()) {
        *o = x * w * inv_rms;
    }
}

/// Rotates consecutive pairs of every head in `x` by the RoPE angle for `pos`.
pub(crate) fn rope_heads(x: &mut [f32], head_dim: usize, pos: usize, freq_base: f32) {
    for head in x.chunks_exact_mut(head_dim) {
        for i in 0..head_dim / 2 {
            let theta = pos as f32 * freq_base.powf(-2.0 * i as f32 / head_dim as f32);
            let (sin_theta, cos_theta) = theta.sin_cos();
            let x0 = head[2 * i];
            let x1 = head[2 * i + 1];
            head[2 * i] = x0 * cos_theta - x1 * sin_theta;
            head[2 * i + 1] = x0 * sin_theta + x1 * cos_theta;
        }
    }
}

pub(crate) fn silu(v: f32) -> f32 {
    v / (1.0 + (-v).exp())
}
