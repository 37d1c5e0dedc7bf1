// ─────────────────────────────────────────────────────────────────────
// SCPN Cavity Sim — Mechanical Modes
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Lorentz-force / microphonics mechanical-mode model.
//!
//! Each mode i is a damped oscillator driven by the squared cavity voltage:
//!
//! ```text
//! A_i = [[0, 1], [-ω_i², -ω_i/Q_i]],  B_i = [[0], [-ω_i² K_i]],  C_i = [1, 0]
//! ```
//!
//! with ω_i = 2π f_i. Modes are stacked block-diagonally; D = 0.

use cavity_math::linalg::{expm, solve, solve_vec};
use cavity_types::error::{CavityError, CavityResult};
use cavity_types::state::{DiscreteStateSpace, MechanicalModeSpec, StateSpace};
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Discretization scheme for [`discretize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscretizationMethod {
    /// Zero-order hold, exact at sample instants for piecewise-constant input.
    #[default]
    Zoh,
    /// Bilinear transform.
    Tustin,
    /// `Ad = I + Ts·A`, `Bd = Ts·B`.
    ForwardEuler,
}

fn validate_spec(spec: &MechanicalModeSpec) -> CavityResult<()> {
    if spec.q.len() != spec.f.len() || spec.k.len() != spec.f.len() {
        return Err(CavityError::InvalidModeSpec(format!(
            "list lengths differ: f={}, Q={}, K={}",
            spec.f.len(),
            spec.q.len(),
            spec.k.len()
        )));
    }
    for (i, ((&f, &q), &k)) in spec.f.iter().zip(&spec.q).zip(&spec.k).enumerate() {
        if !f.is_finite() || f <= 0.0 {
            return Err(CavityError::InvalidModeSpec(format!(
                "mode {i}: frequency must be finite and > 0, got {f}"
            )));
        }
        if !q.is_finite() || q <= 0.0 {
            return Err(CavityError::InvalidModeSpec(format!(
                "mode {i}: Q must be finite and > 0, got {q}"
            )));
        }
        if !k.is_finite() {
            return Err(CavityError::InvalidModeSpec(format!(
                "mode {i}: K must be finite, got {k}"
            )));
        }
    }
    Ok(())
}

/// Continuous-time model of all mechanical modes.
///
/// An empty mode list yields a 0-state system (A is 0×0, D is 1×1 zero).
pub fn build_mechanical_model(spec: &MechanicalModeSpec) -> CavityResult<StateSpace> {
    validate_spec(spec)?;
    let n_modes = spec.n_modes();
    let n = 2 * n_modes;

    let mut a = Array2::zeros((n, n));
    let mut b = Array2::zeros((n, 1));
    let mut c = Array2::zeros((1, n));
    let d = Array2::zeros((1, 1));

    for i in 0..n_modes {
        let w = 2.0 * PI * spec.f[i];
        let row = 2 * i;
        a[[row, row + 1]] = 1.0;
        a[[row + 1, row]] = -w * w;
        a[[row + 1, row + 1]] = -w / spec.q[i];
        b[[row + 1, 0]] = -w * w * spec.k[i];
        c[[0, row]] = 1.0;
    }

    tracing::debug!(n_modes, "built mechanical mode model");
    Ok(StateSpace { a, b, c, d })
}

/// Convert a continuous model to discrete time with sample time `ts`.
pub fn discretize(
    ss: &StateSpace,
    ts: f64,
    method: DiscretizationMethod,
) -> CavityResult<DiscreteStateSpace> {
    if !ts.is_finite() || ts <= 0.0 {
        return Err(CavityError::InvalidSampleTime(ts));
    }
    ss.check_shapes()?;
    let n = ss.order();

    let (ad, bd, cd, dd) = match method {
        DiscretizationMethod::Zoh => {
            // exp([[A, B], [0, 0]] Ts) = [[Ad, Bd], [0, I]]
            let mut aug = Array2::zeros((n + 1, n + 1));
            aug.slice_mut(s![..n, ..n]).assign(&(&ss.a * ts));
            aug.slice_mut(s![..n, n..]).assign(&(&ss.b * ts));
            let e = expm(&aug)?;
            (
                e.slice(s![..n, ..n]).to_owned(),
                e.slice(s![..n, n..]).to_owned(),
                ss.c.clone(),
                ss.d.clone(),
            )
        }
        DiscretizationMethod::Tustin => {
            let eye: Array2<f64> = Array2::eye(n);
            let half = &ss.a * (0.5 * ts);
            let ima = &eye - &half;
            let ad = solve(&ima, &(&eye + &half))?;
            let bd = solve(&ima, &(&ss.b * ts))?;
            let cd = solve(&ima.t().to_owned(), &ss.c.t().to_owned())?
                .t()
                .to_owned();
            let dd = &ss.d + &(ss.c.dot(&bd) * 0.5);
            (ad, bd, cd, dd)
        }
        DiscretizationMethod::ForwardEuler => {
            let eye: Array2<f64> = Array2::eye(n);
            (
                &eye + &(&ss.a * ts),
                &ss.b * ts,
                ss.c.clone(),
                ss.d.clone(),
            )
        }
    };

    tracing::debug!(order = n, ts, ?method, "discretized state-space model");
    Ok(DiscreteStateSpace {
        a: ad,
        b: bd,
        c: cd,
        d: dd,
        ts,
    })
}

/// Build and discretize in one go.
pub fn mechanical_model(
    spec: &MechanicalModeSpec,
    ts: f64,
    method: DiscretizationMethod,
) -> CavityResult<DiscreteStateSpace> {
    let ss = build_mechanical_model(spec)?;
    discretize(&ss, ts, method)
}

/// Steady-state gain `C (I − Ad)⁻¹ Bd + D` of a discrete SISO model.
///
/// For a mechanical model this is the static detuning per (MV)², i.e. `−Σ K_i`.
pub fn dc_gain(model: &DiscreteStateSpace) -> CavityResult<f64> {
    model.check_shapes()?;
    let n = model.order();
    if n == 0 {
        return Ok(model.d[[0, 0]]);
    }
    let eye: Array2<f64> = Array2::eye(n);
    let x = solve_vec(&(&eye - &model.a), &model.b.column(0).to_owned())?;
    Ok(model.c.row(0).dot(&x) + model.d[[0, 0]])
}

/// The 2×2 diagonal block of mode `i` of a (discrete or continuous) A matrix.
pub fn mode_block(a: &Array2<f64>, i: usize) -> [[f64; 2]; 2] {
    let r = 2 * i;
    [[a[[r, r]], a[[r, r + 1]]], [a[[r + 1, r]], a[[r + 1, r + 1]]]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use cavity_math::linalg::spectral_radius_2x2;

    fn single_mode() -> MechanicalModeSpec {
        MechanicalModeSpec::new(vec![280.0], vec![40.0], vec![2.0])
    }

    #[test]
    fn test_single_mode_blocks() {
        let ss = build_mechanical_model(&single_mode()).unwrap();
        let w = 2.0 * PI * 280.0;
        assert_eq!(ss.a.dim(), (2, 2));
        assert_eq!(ss.a[[0, 0]], 0.0);
        assert_eq!(ss.a[[0, 1]], 1.0);
        assert!((ss.a[[1, 0]] + w * w).abs() < 1e-6);
        assert!((ss.a[[1, 1]] + w / 40.0).abs() < 1e-12);
        assert!((ss.b[[1, 0]] + w * w * 2.0).abs() < 1e-6);
        assert_eq!(ss.b[[0, 0]], 0.0);
        assert_eq!(ss.c.row(0).to_vec(), vec![1.0, 0.0]);
        assert_eq!(ss.d[[0, 0]], 0.0);
    }

    #[test]
    fn test_default_spec_is_block_diagonal() {
        let ss = build_mechanical_model(&MechanicalModeSpec::default()).unwrap();
        assert_eq!(ss.a.dim(), (10, 10));
        assert_eq!(ss.b.dim(), (10, 1));
        assert_eq!(ss.c.dim(), (1, 10));
        // Off-block entries stay zero
        assert_eq!(ss.a[[0, 2]], 0.0);
        assert_eq!(ss.a[[3, 1]], 0.0);
        assert_eq!(ss.a[[9, 7]], 0.0);
        for i in 0..5 {
            assert_eq!(ss.c[[0, 2 * i]], 1.0);
            assert_eq!(ss.c[[0, 2 * i + 1]], 0.0);
        }
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let spec = MechanicalModeSpec::new(vec![280.0, 341.0], vec![40.0], vec![2.0, 0.8]);
        assert!(matches!(
            build_mechanical_model(&spec),
            Err(CavityError::InvalidModeSpec(_))
        ));
    }

    #[test]
    fn test_non_positive_q_and_f_rejected() {
        let bad_q = MechanicalModeSpec::new(vec![280.0], vec![0.0], vec![2.0]);
        let bad_f = MechanicalModeSpec::new(vec![-1.0], vec![40.0], vec![2.0]);
        assert!(build_mechanical_model(&bad_q).is_err());
        assert!(build_mechanical_model(&bad_f).is_err());
    }

    #[test]
    fn test_empty_spec_gives_zero_order_model() {
        let model = mechanical_model(&MechanicalModeSpec::empty(), 1e-6, DiscretizationMethod::Zoh)
            .unwrap();
        assert_eq!(model.a.dim(), (0, 0));
        assert_eq!(model.b.dim(), (0, 1));
        assert_eq!(model.c.dim(), (1, 0));
        assert_eq!(model.d.dim(), (1, 1));
    }

    #[test]
    fn test_invalid_sample_time() {
        let ss = build_mechanical_model(&single_mode()).unwrap();
        for ts in [0.0, -1e-6, f64::NAN] {
            assert!(matches!(
                discretize(&ss, ts, DiscretizationMethod::Zoh),
                Err(CavityError::InvalidSampleTime(_))
            ));
        }
    }

    #[test]
    fn test_zoh_preserves_shapes() {
        let ss = build_mechanical_model(&MechanicalModeSpec::default()).unwrap();
        let model = discretize(&ss, 1e-6, DiscretizationMethod::Zoh).unwrap();
        assert_eq!(model.b.nrows(), ss.a.nrows());
        assert_eq!(model.a.dim(), ss.a.dim());
        assert_eq!(model.c, ss.c);
        assert!((model.ts - 1e-6).abs() < 1e-20);
    }

    #[test]
    fn test_zoh_matches_closed_form_undamped_oscillator() {
        // Q → ∞ is approximated by a very large Q; Ad ≈ rotation
        let f = 100.0;
        let ts = 1e-4;
        let spec = MechanicalModeSpec::new(vec![f], vec![1e12], vec![0.0]);
        let model = mechanical_model(&spec, ts, DiscretizationMethod::Zoh).unwrap();
        let w = 2.0 * PI * f;
        let wt = w * ts;
        assert!((model.a[[0, 0]] - wt.cos()).abs() < 1e-9);
        assert!((model.a[[0, 1]] - wt.sin() / w).abs() < 1e-12);
        assert!((model.a[[1, 0]] + w * wt.sin()).abs() < 1e-6);
        assert!((model.a[[1, 1]] - wt.cos()).abs() < 1e-9);
    }

    #[test]
    fn test_zoh_eigenvalues_inside_unit_circle() {
        let spec = MechanicalModeSpec::default();
        let model = mechanical_model(&spec, 1e-6, DiscretizationMethod::Zoh).unwrap();
        for i in 0..spec.n_modes() {
            let rho = spectral_radius_2x2(&mode_block(&model.a, i));
            assert!(rho < 1.0, "mode {i}: spectral radius {rho}");
            assert!(rho > 0.99, "mode {i}: spectral radius {rho}");
        }
    }

    #[test]
    fn test_dc_gain_is_minus_sum_k() {
        let spec = MechanicalModeSpec::default();
        let expected = -spec.k.iter().sum::<f64>();
        for method in [
            DiscretizationMethod::Zoh,
            DiscretizationMethod::Tustin,
            DiscretizationMethod::ForwardEuler,
        ] {
            let model = mechanical_model(&spec, 1e-5, method).unwrap();
            let gain = dc_gain(&model).unwrap();
            assert!(
                (gain - expected).abs() < 1e-6 * expected.abs(),
                "{method:?}: gain {gain}, expected {expected}"
            );
        }
    }

    #[test]
    fn test_tustin_and_zoh_agree_for_small_ts() {
        let spec = single_mode();
        let zoh = mechanical_model(&spec, 1e-6, DiscretizationMethod::Zoh).unwrap();
        let tustin = mechanical_model(&spec, 1e-6, DiscretizationMethod::Tustin).unwrap();
        for i in 0..2 {
            for j in 0..2 {
                assert!((zoh.a[[i, j]] - tustin.a[[i, j]]).abs() < 1e-6 * zoh.a[[i, j]].abs().max(1.0));
            }
        }
    }

    #[test]
    fn test_forward_euler_matrices() {
        let ss = build_mechanical_model(&single_mode()).unwrap();
        let ts = 1e-6;
        let model = discretize(&ss, ts, DiscretizationMethod::ForwardEuler).unwrap();
        assert!((model.a[[0, 0]] - 1.0).abs() < 1e-15);
        assert!((model.a[[0, 1]] - ts).abs() < 1e-20);
        assert!((model.b[[1, 0]] - ts * ss.b[[1, 0]]).abs() < 1e-9);
    }
}
