// ─────────────────────────────────────────────────────────────────────
// SCPN Cavity Sim — Property-Based Tests (proptest) for cavity-math
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for cavity-math using proptest.
//!
//! Covers: Gaussian elimination, matrix exponential, complex least squares,
//! 2x2 eigenvalues.

use cavity_math::linalg::{eigvals_2x2, expm, lstsq_complex, solve_vec};
use ndarray::{Array1, Array2};
use num_complex::Complex64;
use proptest::prelude::*;

// ── Dense Solve Properties ───────────────────────────────────────────

proptest! {
    /// For a diagonally dominant system, x = solve(A, b) satisfies Ax = b.
    #[test]
    fn solve_ax_eq_b(n in 1usize..12, seed in 0u64..1000) {
        let s = seed as f64;
        let a = Array2::from_shape_fn((n, n), |(i, j)| {
            if i == j { n as f64 + 2.0 } else { ((i * 7 + j * 3) as f64 + s).sin() }
        });
        let b = Array1::from_shape_fn(n, |i| (i as f64 * 0.9 + s).cos());
        let x = solve_vec(&a, &b).unwrap();
        let ax = a.dot(&x);
        for i in 0..n {
            prop_assert!((ax[i] - b[i]).abs() < 1e-10,
                "Ax[{}] = {}, b[{}] = {}", i, ax[i], i, b[i]);
        }
    }
}

// ── Matrix Exponential Properties ────────────────────────────────────

proptest! {
    /// exp(A) exp(-A) = I.
    #[test]
    fn expm_inverse_identity(n in 1usize..6, scale in 0.01f64..3.0) {
        let a = Array2::from_shape_fn((n, n), |(i, j)| {
            scale * (((i + 1) * (j + 2)) as f64).sin() / n as f64
        });
        let e = expm(&a).unwrap();
        let e_neg = expm(&(-&a)).unwrap();
        let prod = e.dot(&e_neg);
        for i in 0..n {
            for j in 0..n {
                let expected = if i == j { 1.0 } else { 0.0 };
                let tol = 1e-8 * e.iter().fold(1.0_f64, |m, v| m.max(v.abs()));
                prop_assert!((prod[[i, j]] - expected).abs() < tol,
                    "prod[{},{}] = {}", i, j, prod[[i, j]]);
            }
        }
    }

    /// Scalar case matches f64::exp.
    #[test]
    fn expm_scalar_matches_exp(x in -30.0f64..30.0) {
        let e = expm(&Array2::from_elem((1, 1), x)).unwrap();
        let expected = x.exp();
        prop_assert!((e[[0, 0]] - expected).abs() <= 1e-12 * expected.max(1.0));
    }
}

// ── Complex Least Squares Properties ─────────────────────────────────

proptest! {
    /// Noiseless data generated from known coefficients is recovered.
    #[test]
    fn lstsq_recovers_coefficients(
        m in 4usize..40,
        re0 in -5.0f64..5.0, im0 in -5.0f64..5.0,
        re1 in -5.0f64..5.0, im1 in -5.0f64..5.0,
    ) {
        let x_true = [Complex64::new(re0, im0), Complex64::new(re1, im1)];
        let a = Array2::from_shape_fn((m, 2), |(i, j)| {
            let t = i as f64 * 0.37;
            if j == 0 {
                Complex64::new(t.cos(), t.sin())
            } else {
                Complex64::new(1.0 + 0.1 * t, -(0.5 * t).cos())
            }
        });
        let b = Array1::from_shape_fn(m, |i| x_true[0] * a[[i, 0]] + x_true[1] * a[[i, 1]]);
        let sol = lstsq_complex(&a, &b).unwrap();
        prop_assert_eq!(sol.rank, 2);
        for k in 0..2 {
            prop_assert!((sol.x[k] - x_true[k]).norm() < 1e-9,
                "x[{}] = {}, expected {}", k, sol.x[k], x_true[k]);
        }
    }
}

// ── 2x2 Eigenvalue Properties ────────────────────────────────────────

proptest! {
    /// Eigenvalues sum to the trace and multiply to the determinant.
    #[test]
    fn eigvals_trace_det(
        a00 in -10.0f64..10.0, a01 in -10.0f64..10.0,
        a10 in -10.0f64..10.0, a11 in -10.0f64..10.0,
    ) {
        let a = [[a00, a01], [a10, a11]];
        let [l1, l2] = eigvals_2x2(&a);
        let trace = a00 + a11;
        let det = a00 * a11 - a01 * a10;
        prop_assert!(((l1 + l2).re - trace).abs() < 1e-9);
        prop_assert!((l1 + l2).im.abs() < 1e-9);
        prop_assert!(((l1 * l2).re - det).abs() < 1e-8 * det.abs().max(1.0));
    }
}
