//! Packing between complex vectors and interleaved real vectors.
//!
//! Real solvers see complex unknowns as `[re0, im0, re1, im1, ...]`.

use ndarray::Array1;
use num_complex::Complex64;

/// Interleave real (even indices) and imaginary (odd indices) parts.
pub fn c2re(x: &[Complex64]) -> Array1<f64> {
    let mut out = Array1::zeros(2 * x.len());
    for (i, z) in x.iter().enumerate() {
        out[2 * i] = z.re;
        out[2 * i + 1] = z.im;
    }
    out
}

/// Inverse of [`c2re`]. A trailing odd element is dropped.
pub fn re2c(x: &[f64]) -> Vec<Complex64> {
    x.chunks_exact(2)
        .map(|pair| Complex64::new(pair[0], pair[1]))
        .collect()
}
