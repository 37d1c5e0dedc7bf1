//! Linear algebra utilities.
//!
//! Dense Gaussian elimination, Padé matrix exponential, pivoted complex QR
//! least squares, 2x2 eigenvalues. Matrices here are small (≤ 20x20).

use cavity_types::error::{CavityError, CavityResult};
use ndarray::{Array1, Array2};
use num_complex::Complex64;

/// Padé order for [`expm`].
const PADE_ORDER: usize = 6;

/// Scaling target for [`expm`]: ||A / 2^s||_inf <= this.
const EXPM_THETA: f64 = 0.5;

/// Relative column-norm threshold for numerical rank in [`lstsq_complex`].
const RANK_RTOL: f64 = 1e-12;

/// Maximum absolute row sum.
pub fn norm_inf(a: &Array2<f64>) -> f64 {
    a.rows()
        .into_iter()
        .map(|row| row.iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

/// Solve `A X = B` by Gaussian elimination with partial pivoting.
///
/// `A` is n×n, `B` is n×k.
pub fn solve(a: &Array2<f64>, b: &Array2<f64>) -> CavityResult<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(CavityError::ShapeMismatch {
            context: "solve: square matrix",
            expected: n,
            actual: a.ncols(),
        });
    }
    if b.nrows() != n {
        return Err(CavityError::ShapeMismatch {
            context: "solve: right-hand side rows",
            expected: n,
            actual: b.nrows(),
        });
    }

    let mut m = a.clone();
    let mut x = b.clone();
    let k_rhs = x.ncols();

    for k in 0..n {
        let mut p = k;
        let mut max_abs = m[[k, k]].abs();
        for i in (k + 1)..n {
            let v = m[[i, k]].abs();
            if v > max_abs {
                max_abs = v;
                p = i;
            }
        }
        if !max_abs.is_finite() || max_abs == 0.0 {
            return Err(CavityError::LinAlg(format!(
                "matrix is singular at pivot {k}"
            )));
        }
        if p != k {
            for j in 0..n {
                m.swap([k, j], [p, j]);
            }
            for j in 0..k_rhs {
                x.swap([k, j], [p, j]);
            }
        }
        let pivot = m[[k, k]];
        for i in (k + 1)..n {
            let factor = m[[i, k]] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in k..n {
                m[[i, j]] -= factor * m[[k, j]];
            }
            for j in 0..k_rhs {
                x[[i, j]] -= factor * x[[k, j]];
            }
        }
    }

    for j in 0..k_rhs {
        for i in (0..n).rev() {
            let mut sum = x[[i, j]];
            for c in (i + 1)..n {
                sum -= m[[i, c]] * x[[c, j]];
            }
            x[[i, j]] = sum / m[[i, i]];
        }
    }

    Ok(x)
}

/// Vector right-hand side variant of [`solve`].
pub fn solve_vec(a: &Array2<f64>, b: &Array1<f64>) -> CavityResult<Array1<f64>> {
    let rhs = b.clone().insert_axis(ndarray::Axis(1));
    let x = solve(a, &rhs)?;
    Ok(x.column(0).to_owned())
}

/// Matrix exponential by scaling and squaring with a diagonal Padé approximant.
pub fn expm(a: &Array2<f64>) -> CavityResult<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(CavityError::ShapeMismatch {
            context: "expm: square matrix",
            expected: n,
            actual: a.ncols(),
        });
    }
    if n == 0 {
        return Ok(Array2::zeros((0, 0)));
    }
    if !a.iter().all(|v| v.is_finite()) {
        return Err(CavityError::LinAlg(
            "expm input contains non-finite values".to_string(),
        ));
    }

    let norm = norm_inf(a);
    let squarings = if norm > EXPM_THETA {
        (norm / EXPM_THETA).log2().ceil().max(0.0) as u32
    } else {
        0
    };
    let x = a / 2f64.powi(squarings as i32);

    let eye: Array2<f64> = Array2::eye(n);
    let q = PADE_ORDER as f64;
    let mut c = 0.5;
    let mut x_pow = x.clone();
    let mut num = &eye + &(&x * c);
    let mut den = &eye - &(&x * c);
    for k in 2..=PADE_ORDER {
        let kf = k as f64;
        c *= (q - kf + 1.0) / (kf * (2.0 * q - kf + 1.0));
        x_pow = x.dot(&x_pow);
        num = num + &(&x_pow * c);
        if k % 2 == 0 {
            den = den + &(&x_pow * c);
        } else {
            den = den - &(&x_pow * c);
        }
    }

    let mut e = solve(&den, &num)?;
    for _ in 0..squarings {
        e = e.dot(&e);
    }
    Ok(e)
}

/// Result of a complex linear least-squares solve.
#[derive(Debug, Clone)]
pub struct LstsqSolution {
    pub x: Array1<Complex64>,
    /// Numerical rank of the design matrix.
    pub rank: usize,
    /// ||A x - b||₂.
    pub residual_norm: f64,
}

fn column_norm_from(r: &Array2<Complex64>, col: usize, start: usize) -> f64 {
    (start..r.nrows())
        .map(|i| r[[i, col]].norm_sqr())
        .sum::<f64>()
        .sqrt()
}

/// Minimize ||A x - b||₂ over complex `x` with Householder QR and column pivoting.
///
/// For rank-deficient `A` this returns the basic solution: unknowns whose
/// columns are dependent on earlier pivots are set to zero.
pub fn lstsq_complex(
    a: &Array2<Complex64>,
    b: &Array1<Complex64>,
) -> CavityResult<LstsqSolution> {
    let (m, n) = a.dim();
    if b.len() != m {
        return Err(CavityError::ShapeMismatch {
            context: "least-squares right-hand side",
            expected: m,
            actual: b.len(),
        });
    }
    if m == 0 || n == 0 {
        return Err(CavityError::DegenerateInput(
            "least-squares problem has an empty design matrix".to_string(),
        ));
    }
    if !a.iter().chain(b.iter()).all(|z| z.re.is_finite() && z.im.is_finite()) {
        return Err(CavityError::DegenerateInput(
            "least-squares inputs contain non-finite values".to_string(),
        ));
    }

    let mut r = a.clone();
    let mut qtb = b.clone();
    let mut perm: Vec<usize> = (0..n).collect();

    let max_norm0 = (0..n)
        .map(|j| column_norm_from(&r, j, 0))
        .fold(0.0, f64::max);
    if max_norm0 == 0.0 {
        return Err(CavityError::DegenerateInput(
            "least-squares design matrix is all zeros".to_string(),
        ));
    }
    let tol = RANK_RTOL * max_norm0 * m.max(n) as f64;

    let mut rank = 0;
    for k in 0..m.min(n) {
        let mut p = k;
        let mut p_norm = column_norm_from(&r, k, k);
        for j in (k + 1)..n {
            let nj = column_norm_from(&r, j, k);
            if nj > p_norm {
                p = j;
                p_norm = nj;
            }
        }
        if p_norm <= tol {
            break;
        }
        if p != k {
            for i in 0..m {
                r.swap([i, k], [i, p]);
            }
            perm.swap(k, p);
        }

        // Householder reflector mapping r[k.., k] onto alpha·e1
        let x0 = r[[k, k]];
        let phase = if x0.norm() > 0.0 {
            x0 / x0.norm()
        } else {
            Complex64::new(1.0, 0.0)
        };
        let alpha = -phase * p_norm;
        let mut v: Vec<Complex64> = (k..m).map(|i| r[[i, k]]).collect();
        v[0] -= alpha;
        let v_norm = v.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt();
        if v_norm > 0.0 {
            for vi in v.iter_mut() {
                *vi /= v_norm;
            }
            for j in k..n {
                let s: Complex64 = (k..m).map(|i| v[i - k].conj() * r[[i, j]]).sum();
                for i in k..m {
                    r[[i, j]] -= v[i - k] * s * 2.0;
                }
            }
            let s: Complex64 = (k..m).map(|i| v[i - k].conj() * qtb[i]).sum();
            for i in k..m {
                qtb[i] -= v[i - k] * s * 2.0;
            }
        }
        rank += 1;
    }

    let mut z = vec![Complex64::new(0.0, 0.0); rank];
    for i in (0..rank).rev() {
        let mut sum = qtb[i];
        for j in (i + 1)..rank {
            sum -= r[[i, j]] * z[j];
        }
        z[i] = sum / r[[i, i]];
    }

    let mut x = Array1::from_elem(n, Complex64::new(0.0, 0.0));
    for (i, zi) in z.into_iter().enumerate() {
        x[perm[i]] = zi;
    }
    let residual_norm = (rank..m)
        .map(|i| qtb[i].norm_sqr())
        .sum::<f64>()
        .sqrt();

    Ok(LstsqSolution {
        x,
        rank,
        residual_norm,
    })
}

/// Eigenvalues of a real 2x2 matrix, complex pairs included.
pub fn eigvals_2x2(a: &[[f64; 2]; 2]) -> [Complex64; 2] {
    let trace = a[0][0] + a[1][1];
    let det = a[0][0] * a[1][1] - a[0][1] * a[1][0];
    let disc = trace * trace - 4.0 * det;

    if disc >= 0.0 {
        let sqrt_disc = disc.sqrt();
        [
            Complex64::new((trace - sqrt_disc) / 2.0, 0.0),
            Complex64::new((trace + sqrt_disc) / 2.0, 0.0),
        ]
    } else {
        let im = (-disc).sqrt() / 2.0;
        [
            Complex64::new(trace / 2.0, -im),
            Complex64::new(trace / 2.0, im),
        ]
    }
}

/// Largest eigenvalue magnitude of a real 2x2 matrix.
pub fn spectral_radius_2x2(a: &[[f64; 2]; 2]) -> f64 {
    let [l1, l2] = eigvals_2x2(a);
    l1.norm().max(l2.norm())
}
