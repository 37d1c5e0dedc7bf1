// ─────────────────────────────────────────────────────────────────────
// SCPN Cavity Sim — Property-Based Tests (proptest) for cavity-calib
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for cavity-calib using proptest, plus a
//! calibration run on traces produced by the cavity step simulator.

use cavity_calib::{
    calibrate_diagonal, calibrate_energy, probe_sq_derivative, CalibrationCoefficients,
    DecayTraces,
};
use cavity_core::cavity::cavity_step_simple;
use num_complex::Complex64;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

const HBW: f64 = 2.0 * PI * 216.0;
const TS: f64 = 1e-6;

/// Simulated pulse: 1500 samples of unit drive, then 1500 samples of decay.
/// Returns `(probe, vf, vr)`.
fn simulated_pulse() -> (Vec<Complex64>, Vec<Complex64>, Vec<Complex64>) {
    let zero = Complex64::new(0.0, 0.0);
    let mut vc = zero;
    let mut probe = Vec::new();
    let mut vf = Vec::new();
    let mut vr = Vec::new();
    for i in 0..3000 {
        let drive = if i < 1500 {
            Complex64::from_polar(1.0, 0.2)
        } else {
            zero
        };
        let (next, refl) =
            cavity_step_simple(HBW, 2.0 * PI * 30.0, drive, zero, vc, TS, 1e4).unwrap();
        vc = next;
        probe.push(vc);
        vf.push(drive);
        vr.push(refl);
    }
    (probe, vf, vr)
}

#[test]
fn diagonal_calibration_on_simulated_pulse_with_noise() {
    let (probe, vf, vr) = simulated_pulse();
    let (a, d) = (Complex64::new(0.7, 0.2), Complex64::new(1.3, -0.4));
    let mut rng = StdRng::seed_from_u64(42);
    let noise = Normal::new(0.0, 1e-5).unwrap();
    let mut jitter = || Complex64::new(noise.sample(&mut rng), noise.sample(&mut rng));
    let vforw: Vec<Complex64> = vf.iter().map(|v| *v / a + jitter()).collect();
    let vrefl: Vec<Complex64> = vr.iter().map(|v| *v / d + jitter()).collect();

    let cal = calibrate_diagonal(&probe, &vforw, &vrefl).unwrap();
    assert!((cal.a - a).norm() < 1e-3, "a = {}", cal.a);
    assert!((cal.d - d).norm() < 1e-3, "d = {}", cal.d);
}

#[test]
fn energy_calibration_on_simulated_pulse_is_consistent() {
    let (probe, vf, vr) = simulated_pulse();
    let deriv = probe_sq_derivative(&probe, TS).unwrap();
    let (fill, decay) = (1500, 1500..3000);
    let ddecay = DecayTraces::new(&vf[decay.clone()], &vr[decay]).unwrap();
    let fit = calibrate_energy(
        HBW,
        &probe[..fill],
        &vf[..fill],
        &vr[..fill],
        &deriv[..fill],
        Some(ddecay),
    )
    .unwrap();
    // Ideal channels: the fit stays close to identity up to the
    // finite-difference error in the energy derivative.
    let id = CalibrationCoefficients::identity().as_array();
    for (got, want) in fit.coefficients.as_array().iter().zip(id.iter()) {
        assert!((*got - *want).norm() < 1e-2, "got {got}");
    }
}

proptest! {
    /// Noiseless traces built from known (a, d) give (a, d) back.
    #[test]
    fn diagonal_round_trip(ar in 0.2f64..3.0, ai in -1.0f64..1.0,
                           dr in 0.2f64..3.0, di in -1.0f64..1.0) {
        let (probe, vf, vr) = simulated_pulse();
        let a = Complex64::new(ar, ai);
        let d = Complex64::new(dr, di);
        let vforw: Vec<Complex64> = vf.iter().map(|v| *v / a).collect();
        let vrefl: Vec<Complex64> = vr.iter().map(|v| *v / d).collect();
        let cal = calibrate_diagonal(&probe, &vforw, &vrefl).unwrap();
        prop_assert!((cal.a - a).norm() < 1e-8 * a.norm());
        prop_assert!((cal.d - d).norm() < 1e-8 * d.norm());
    }

    /// Applying coefficients is linear in the raw channels.
    #[test]
    fn apply_is_linear(fr in -5.0f64..5.0, fi in -5.0f64..5.0,
                       rr in -5.0f64..5.0, ri in -5.0f64..5.0, k in -3.0f64..3.0) {
        let cal = CalibrationCoefficients::new(
            Complex64::new(0.9, 0.1), Complex64::new(0.05, 0.0),
            Complex64::new(-0.02, 0.03), Complex64::new(1.1, -0.2),
        );
        let f = Complex64::new(fr, fi);
        let r = Complex64::new(rr, ri);
        let (vf1, vr1) = cal.apply(f, r);
        let (vf2, vr2) = cal.apply(f * k, r * k);
        prop_assert!((vf2 - vf1 * k).norm() < 1e-12 * (1.0 + vf1.norm()));
        prop_assert!((vr2 - vr1 * k).norm() < 1e-12 * (1.0 + vr1.norm()));
    }

    /// The squared-magnitude derivative of a linear amplitude ramp is 2·A·A'.
    #[test]
    fn probe_derivative_of_ramp(slope in 0.1f64..10.0, phase in -3.0f64..3.0) {
        let ts = 1e-3;
        let probe: Vec<Complex64> = (0..50)
            .map(|i| Complex64::from_polar(slope * i as f64 * ts, phase))
            .collect();
        let d = probe_sq_derivative(&probe, ts).unwrap();
        for i in 1..49 {
            let t = i as f64 * ts;
            let expected = 2.0 * slope * slope * t;
            prop_assert!((d[i] - expected).abs() < 1e-6 * (1.0 + expected));
        }
    }
}
