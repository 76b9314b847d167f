//! Dense f32 kernels used by the reference forward pass.
//!
//! Shapes are fixed by the model, so the kernels only `debug_assert!` them.

/// Epsilon added to the mean square before normalizing.
pub const NORM_EPS: f32 = 1e-5;

/// Matrix-vector product `W @ x` for `W` stored row-major as `[rows, x.len()]`.
pub fn matvec(w: &[f32], x: &[f32], rows: usize) -> Vec<f32> {
    let k = x.len();
    debug_assert_eq!(w.len(), rows * k);

    let mut out = vec![0.0f32; rows];
    for (i, o) in out.iter_mut().enumerate() {
        let row = &w[i * k..(i + 1) * k];
        *o = row.iter().zip(x).map(|(a, b)| a * b).sum();
    }
    out
}

/// Root-mean-square normalization with unit gain, in place.
pub fn rms_norm(x: &mut [f32]) {
    if x.is_empty() {
        return;
    }
    let mean_sq: f32 = x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32;
    let rms = (mean_sq + NORM_EPS).sqrt();
    for v in x.iter_mut() {
        *v /= rms;
    }
}

/// Column-wise mean of `data`, viewed as rows of width `width`.
pub fn mean_rows(data: &[f32], width: usize) -> Vec<f32> {
    debug_assert!(width > 0 && data.len() % width == 0);

    let n_rows = data.len() / width;
    let mut out = vec![0.0f32; width];
    if n_rows == 0 {
        return out;
    }
    for row in data.chunks_exact(width) {
        add_assign(&mut out, row);
    }
    let inv = 1.0 / n_rows as f32;
    for v in out.iter_mut() {
        *v *= inv;
    }
    out
}

/// Element-wise `a += b`.
pub fn add_assign(a: &mut [f32], b: &[f32]) {
    debug_assert_eq!(a.len(), b.len());
    for (x, y) in a.iter_mut().zip(b) {
        *x += y;
    }
}
