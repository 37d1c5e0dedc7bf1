// ─────────────────────────────────────────────────────────────────────
// SCPN Cavity Sim — State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::error::{CavityError, CavityResult};
use ndarray::linalg::general_mat_vec_mul;
use ndarray::{Array1, Array2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Mechanical resonances driving Lorentz-force detuning.
///
/// Lists are ordered and index-aligned: mode `i` is `(f[i], q[i], k[i])`.
/// `k` is in rad/s per (MV)², usually negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanicalModeSpec {
    /// Resonance frequencies [Hz].
    pub f: Vec<f64>,
    /// Quality factors.
    #[serde(rename = "Q", alias = "q")]
    pub q: Vec<f64>,
    /// Lorentz coupling constants [rad/s/(MV)²].
    #[serde(rename = "K", alias = "k")]
    pub k: Vec<f64>,
}

impl MechanicalModeSpec {
    pub fn new(f: Vec<f64>, q: Vec<f64>, k: Vec<f64>) -> Self {
        MechanicalModeSpec { f, q, k }
    }

    /// No modes: detuning is never driven by the field.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }

    pub fn n_modes(&self) -> usize {
        self.f.len()
    }
}

impl Default for MechanicalModeSpec {
    /// Five-mode TESLA-cavity microphonics set.
    fn default() -> Self {
        MechanicalModeSpec {
            f: vec![280.0, 341.0, 460.0, 487.0, 618.0],
            q: vec![40.0, 20.0, 50.0, 80.0, 100.0],
            k: vec![2.0, 0.8, 2.0, 0.6, 0.2],
        }
    }
}

/// Continuous-time single-input single-output state-space model.
///
/// Shapes: A (n×n), B (n×1), C (1×n), D (1×1).
#[derive(Debug, Clone, PartialEq)]
pub struct StateSpace {
    pub a: Array2<f64>,
    pub b: Array2<f64>,
    pub c: Array2<f64>,
    pub d: Array2<f64>,
}

impl StateSpace {
    /// Number of states `n`.
    pub fn order(&self) -> usize {
        self.a.nrows()
    }

    /// Verify the SISO shape relations between the four matrices.
    pub fn check_shapes(&self) -> CavityResult<()> {
        check_siso_shapes(&self.a, &self.b, &self.c, &self.d)
    }
}

/// Discrete-time state-space model with its sample time.
///
/// Built once at setup and shared read-only between steps.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteStateSpace {
    pub a: Array2<f64>,
    pub b: Array2<f64>,
    pub c: Array2<f64>,
    pub d: Array2<f64>,
    pub ts: f64,
}

impl DiscreteStateSpace {
    pub fn order(&self) -> usize {
        self.a.nrows()
    }

    pub fn check_shapes(&self) -> CavityResult<()> {
        check_siso_shapes(&self.a, &self.b, &self.c, &self.d)
    }

    /// One update with scalar input `u`:
    /// `x' = A x + B u`, `y = C x' + D u`.
    ///
    /// The output uses the updated state, matching the cavity detuning update.
    pub fn advance(&self, state: &Array1<f64>, u: f64) -> CavityResult<(Array1<f64>, f64)> {
        let mut next = Array1::zeros(self.b.nrows());
        let y = self.advance_into(state, u, &mut next)?;
        Ok((next, y))
    }

    /// Allocation-free [`advance`](Self::advance): writes `x'` into `next`
    /// and returns `y`.
    pub fn advance_into(
        &self,
        state: &Array1<f64>,
        u: f64,
        next: &mut Array1<f64>,
    ) -> CavityResult<f64> {
        check_siso_shapes(&self.a, &self.b, &self.c, &self.d)?;
        let n = self.b.nrows();
        for (context, actual) in [
            ("mechanical state vector", state.len()),
            ("next mechanical state vector", next.len()),
        ] {
            if actual != n {
                return Err(CavityError::ShapeMismatch {
                    context,
                    expected: n,
                    actual,
                });
            }
        }
        general_mat_vec_mul(1.0, &self.a, state, 0.0, next);
        next.scaled_add(u, &self.b.column(0));
        Ok(self.c.row(0).dot(next) + self.d[[0, 0]] * u)
    }
}

fn check_siso_shapes(
    a: &Array2<f64>,
    b: &Array2<f64>,
    c: &Array2<f64>,
    d: &Array2<f64>,
) -> CavityResult<()> {
    let n = a.nrows();
    let checks: [(&'static str, usize, usize); 6] = [
        ("A columns", n, a.ncols()),
        ("B rows", n, b.nrows()),
        ("B columns", 1, b.ncols()),
        ("C rows", 1, c.nrows()),
        ("C columns", n, c.ncols()),
        ("D size", 1, d.len()),
    ];
    for (context, expected, actual) in checks {
        if expected != actual {
            return Err(CavityError::ShapeMismatch {
                context,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

/// Caller-owned state of one cavity simulation.
///
/// `state_m` has length 2N for N mechanical modes.
#[derive(Debug, Clone, PartialEq)]
pub struct CavityState {
    /// Complex baseband cavity voltage [V].
    pub vc: Complex64,
    /// Detuning from the previous step [rad/s].
    pub dw: f64,
    /// Mechanical-mode state vector.
    pub state_m: Array1<f64>,
}

impl CavityState {
    /// Zeroed state sized for `n_states` mechanical states.
    pub fn zeroed(n_states: usize) -> Self {
        CavityState {
            vc: Complex64::new(0.0, 0.0),
            dw: 0.0,
            state_m: Array1::zeros(n_states),
        }
    }

    pub fn reset(&mut self) {
        self.vc = Complex64::new(0.0, 0.0);
        self.dw = 0.0;
        self.state_m.fill(0.0);
    }
}

/// Per-step external inputs to the cavity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveSignals {
    /// Forward drive voltage [V].
    pub forward: Complex64,
    /// Instantaneous beam current [A]; the drive voltage is `-RL · beam`.
    pub beam: Complex64,
    /// Injected detuning (piezo + microphonics) [rad/s].
    pub detuning: f64,
}

impl DriveSignals {
    pub fn new(forward: Complex64, beam: Complex64, detuning: f64) -> Self {
        DriveSignals {
            forward,
            beam,
            detuning,
        }
    }

    /// Forward drive only, no beam and no injected detuning.
    pub fn forward_only(forward: Complex64) -> Self {
        Self::new(forward, Complex64::new(0.0, 0.0), 0.0)
    }
}

/// Accelerator convention for the shunt impedance.
///
/// Linacs use `r/Q = V²/(ω0 U)`, circular machines `R/Q = V²/(2 ω0 U)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Machine {
    #[default]
    Linac,
    Circular,
}
