//! Row-major matmul kernels for the CPU backend.

use rayon::prelude::*;
use rayon::ThreadPool;

/// Computes one output row: `c_row = a_row @ b` where `b` is [k, n].
fn row_times_matrix(a_row: &[f32], b: &[f32], n: usize, c_row: &mut [f32]) {
    if n == 1 {
        // Matrix-vector product, the shape of every decode step.
        c_row[0] = a_row.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        return;
    }
    c_row.fill(0.0);
    for (p, &a) in a_row.iter().enumerate() {
        let b_row = &b[p * n..(p + 1) * n];
        for (c, &bv) in c_row.iter_mut().zip(b_row.iter()) {
            *c += a * bv;
        }
    }
}

/// Single-threaded matmul of [m, k] @ [k, n].
pub(crate) fn matmul_serial(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let mut c = vec![0.0f32; m * n];
    if n == 0 || k == 0 {
        return c;
    }
    for (a_row, c_row) in a.chunks_exact(k).zip(c.chunks_exact_mut(n)) {
        row_times_matrix(a_row, b, n, c_row);
    }
    c
}

/// Matmul of [m, k] @ [k, n] with output rows split across `pool`.
pub(crate) fn matmul_parallel(
    pool: &ThreadPool,
    a: &[f32],
    b: &[f32],
    m: usize,
    k: usize,
    n: usize,
) -> Vec<f32> {
    let mut c = vec![0.0f32; m * n];
    if n == 0 || k == 0 {
        return c;
    }
    pool.install(|| {
        c.par_chunks_exact_mut(n)
            .zip(a.par_chunks_exact(k))
            .for_each(|(c_row, a_row)| row_times_matrix(a_row, b, n, c_row));
    });
    c
}
