// ─────────────────────────────────────────────────────────────────────
// SCPN Cavity Sim — Forward/Reflected Calibration
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Three calibration methods:
//!
//! - diagonal: linear least squares with `b = c = 0`
//! - reference: linear least squares on pulse and decay traces with
//!   magnitude anchoring (Pfeiffer et al., IPAC 2015)
//! - energy: nonlinear least squares on the stored-energy relations
//!
//! The energy method minimizes, over all samples,
//!
//! ```text
//! vf_cal + vr_cal − probe                              (probe reconstruction)
//! (2·Re(probe*·vf_cal) − D) / max|probe|               (energy derivative)
//! (|vf_cal|² − |vr_cal|² − C) / max|probe|             (power balance)
//! a·vforw_decay + b·vrefl_decay                        (no drive in decay)
//! ```
//!
//! with `C = d|probe|²/dt / (2ω½)` and `D = C + |probe|²`.

use crate::traces::require_same_len;
use cavity_math::complex::{c2re, re2c};
use cavity_math::linalg::lstsq_complex;
use cavity_math::lm::{levenberg_marquardt, LmConfig, LmReport};
use cavity_types::error::{CavityError, CavityResult};
use ndarray::{Array1, Array2};
use num_complex::Complex64;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);

/// Complex calibration coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationCoefficients {
    pub a: Complex64,
    pub b: Complex64,
    pub c: Complex64,
    pub d: Complex64,
}

impl CalibrationCoefficients {
    pub fn new(a: Complex64, b: Complex64, c: Complex64, d: Complex64) -> Self {
        CalibrationCoefficients { a, b, c, d }
    }

    pub fn identity() -> Self {
        Self::new(Complex64::new(1.0, 0.0), ZERO, ZERO, Complex64::new(1.0, 0.0))
    }

    pub fn as_array(&self) -> [Complex64; 4] {
        [self.a, self.b, self.c, self.d]
    }

    fn from_slice(x: &[Complex64]) -> CavityResult<Self> {
        match x {
            [a, b, c, d] => Ok(Self::new(*a, *b, *c, *d)),
            _ => Err(CavityError::ShapeMismatch {
                context: "calibration coefficient vector",
                expected: 4,
                actual: x.len(),
            }),
        }
    }

    /// Calibrated `(vf, vr)` for one raw sample.
    #[inline]
    pub fn apply(&self, vforw: Complex64, vrefl: Complex64) -> (Complex64, Complex64) {
        (
            self.a * vforw + self.b * vrefl,
            self.c * vforw + self.d * vrefl,
        )
    }

    /// Calibrated forward and reflected traces.
    pub fn apply_traces(
        &self,
        vforw: &[Complex64],
        vrefl: &[Complex64],
    ) -> CavityResult<(Vec<Complex64>, Vec<Complex64>)> {
        require_same_len("reflected trace", vforw.len(), vrefl.len())?;
        Ok(vforw
            .iter()
            .zip(vrefl)
            .map(|(&f, &r)| self.apply(f, r))
            .unzip())
    }
}

/// Raw forward and reflected traces recorded after the drive is switched off.
#[derive(Debug, Clone, Copy)]
pub struct DecayTraces<'a> {
    pub vforw: &'a [Complex64],
    pub vrefl: &'a [Complex64],
}

impl<'a> DecayTraces<'a> {
    pub fn new(vforw: &'a [Complex64], vrefl: &'a [Complex64]) -> CavityResult<Self> {
        require_same_len("reflected decay trace", vforw.len(), vrefl.len())?;
        Ok(DecayTraces { vforw, vrefl })
    }

    pub fn len(&self) -> usize {
        self.vforw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vforw.is_empty()
    }
}

fn check_pulse_traces(
    probe: &[Complex64],
    vforw: &[Complex64],
    vrefl: &[Complex64],
) -> CavityResult<()> {
    require_same_len("forward trace", probe.len(), vforw.len())?;
    require_same_len("reflected trace", probe.len(), vrefl.len())?;
    if probe.is_empty() {
        return Err(CavityError::DegenerateInput(
            "calibration traces are empty".to_string(),
        ));
    }
    Ok(())
}

/// Classical calibration assuming no cross-coupling:
/// `probe ≈ a·vforw + d·vrefl`, returned as `(a, 0, 0, d)`.
pub fn calibrate_diagonal(
    probe: &[Complex64],
    vforw: &[Complex64],
    vrefl: &[Complex64],
) -> CavityResult<CalibrationCoefficients> {
    check_pulse_traces(probe, vforw, vrefl)?;
    let n = probe.len();
    let design = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { vforw[i] } else { vrefl[i] });
    let rhs = Array1::from_vec(probe.to_vec());
    let sol = lstsq_complex(&design, &rhs)?;
    if sol.rank < 2 {
        tracing::warn!(
            rank = sol.rank,
            "forward and reflected traces are linearly dependent; basic solution returned"
        );
    }
    Ok(CalibrationCoefficients::new(sol.x[0], ZERO, ZERO, sol.x[1]))
}

/// Reference calibration with magnitude anchoring.
///
/// Rows of the linear system, unknowns `(a, b, c, d)`:
///
/// ```text
/// [vforw, vrefl, vforw, vrefl]           = probe
/// [vforw_d, vrefl_d, 0, 0]               = 0
/// [0, 0, vforw_d, vrefl_d]               = probe_d
/// [|x| − Wc, 0, 1/Wc, 0]                 = |x|
/// [0, 1/Wb, 0, |y| − Wb]                 = |y|
/// ```
///
/// `(x, y)` is the diagonal calibration, `Wb = |S|` with
/// `vforw_d ≈ −S·vrefl_d`, and `Wc = kadd·Wb`.
pub fn calibrate_reference(
    probe: &[Complex64],
    vforw: &[Complex64],
    vrefl: &[Complex64],
    probe_decay: &[Complex64],
    decay: DecayTraces<'_>,
    kadd: f64,
) -> CavityResult<CalibrationCoefficients> {
    check_pulse_traces(probe, vforw, vrefl)?;
    require_same_len("reflected decay trace", decay.vforw.len(), decay.vrefl.len())?;
    require_same_len("probe decay trace", decay.len(), probe_decay.len())?;
    if decay.is_empty() {
        return Err(CavityError::DegenerateInput(
            "reference calibration needs decay traces".to_string(),
        ));
    }
    if !kadd.is_finite() || kadd <= 0.0 {
        return Err(CavityError::InvalidParameter(format!(
            "kadd must be finite and > 0, got {kadd}"
        )));
    }

    let diag = calibrate_diagonal(probe, vforw, vrefl)?;
    let (abs_x, abs_y) = (diag.a.norm(), diag.d.norm());

    let k = decay.len();
    let neg_refl = Array2::from_shape_fn((k, 1), |(i, _)| -decay.vrefl[i]);
    let s = lstsq_complex(&neg_refl, &Array1::from_vec(decay.vforw.to_vec()))?.x[0];
    let wb = s.norm();
    let wc = kadd * wb;
    if wb <= f64::MIN_POSITIVE {
        return Err(CavityError::DegenerateInput(
            "forward decay trace carries no leakage from the reflected channel".to_string(),
        ));
    }

    let n = probe.len();
    let rows = n + 2 * k + 2;
    let mut design = Array2::from_elem((rows, 4), ZERO);
    let mut rhs = Array1::from_elem(rows, ZERO);
    for i in 0..n {
        design[[i, 0]] = vforw[i];
        design[[i, 1]] = vrefl[i];
        design[[i, 2]] = vforw[i];
        design[[i, 3]] = vrefl[i];
        rhs[i] = probe[i];
    }
    for i in 0..k {
        let fr = n + i;
        design[[fr, 0]] = decay.vforw[i];
        design[[fr, 1]] = decay.vrefl[i];
        let rr = n + k + i;
        design[[rr, 2]] = decay.vforw[i];
        design[[rr, 3]] = decay.vrefl[i];
        rhs[rr] = probe_decay[i];
    }
    let ax = rows - 2;
    design[[ax, 0]] = Complex64::new(abs_x - wc, 0.0);
    design[[ax, 2]] = Complex64::new(1.0 / wc, 0.0);
    rhs[ax] = Complex64::new(abs_x, 0.0);
    let ay = rows - 1;
    design[[ay, 1]] = Complex64::new(1.0 / wb, 0.0);
    design[[ay, 3]] = Complex64::new(abs_y - wb, 0.0);
    rhs[ay] = Complex64::new(abs_y, 0.0);

    let sol = lstsq_complex(&design, &rhs)?;
    tracing::debug!(
        rank = sol.rank,
        residual = sol.residual_norm,
        wb,
        "reference calibration solved"
    );
    let coeffs: Vec<Complex64> = sol.x.to_vec();
    CalibrationCoefficients::from_slice(&coeffs)
}

/// Energy calibration result, with the solver report for inspection.
#[derive(Debug, Clone)]
pub struct EnergyCalibration {
    pub coefficients: CalibrationCoefficients,
    pub report: LmReport,
}

/// Stored-energy calibration with default solver settings.
///
/// Errors with `SolverDiverged` when the fit does not converge and
/// `DegenerateInput` for an all-zero probe, forward or reflected trace.
pub fn calibrate_energy(
    half_bw: f64,
    probe: &[Complex64],
    vforw: &[Complex64],
    vrefl: &[Complex64],
    probe_sq_deriv: &[f64],
    decay: Option<DecayTraces<'_>>,
) -> CavityResult<EnergyCalibration> {
    calibrate_energy_with(
        half_bw,
        probe,
        vforw,
        vrefl,
        probe_sq_deriv,
        decay,
        &LmConfig::default(),
    )
}

struct EnergyProblem<'a> {
    probe: &'a [Complex64],
    vforw: &'a [Complex64],
    vrefl: &'a [Complex64],
    decay: Option<DecayTraces<'a>>,
    c: Vec<f64>,
    d: Vec<f64>,
    max_probe_recip: f64,
}

impl EnergyProblem<'_> {
    fn residual_len(&self) -> usize {
        let decay = self.decay.map_or(0, |t| t.len());
        4 * self.probe.len() + 2 * decay
    }

    fn residual(&self, x: &Array1<f64>) -> Array1<f64> {
        let z = match x.as_slice() {
            Some(s) => re2c(s),
            None => re2c(&x.to_vec()),
        };
        let cal = CalibrationCoefficients::new(z[0], z[1], z[2], z[3]);
        let n = self.probe.len();

        let mut dprobe = Vec::with_capacity(n);
        let mut r = Vec::with_capacity(self.residual_len());
        for i in 0..n {
            let (vf, vr) = cal.apply(self.vforw[i], self.vrefl[i]);
            dprobe.push(vf + vr - self.probe[i]);
        }
        r.extend(c2re(&dprobe).iter());
        for i in 0..n {
            let (vf, _) = cal.apply(self.vforw[i], self.vrefl[i]);
            let energy = 2.0 * (self.probe[i].conj() * vf).re;
            r.push((energy - self.d[i]) * self.max_probe_recip);
        }
        for i in 0..n {
            let (vf, vr) = cal.apply(self.vforw[i], self.vrefl[i]);
            r.push((vf.norm_sqr() - vr.norm_sqr() - self.c[i]) * self.max_probe_recip);
        }
        if let Some(t) = self.decay {
            let drive: Vec<Complex64> = t
                .vforw
                .iter()
                .zip(t.vrefl)
                .map(|(&f, &rf)| cal.a * f + cal.b * rf)
                .collect();
            r.extend(c2re(&drive).iter());
        }
        Array1::from_vec(r)
    }
}

/// Stored-energy calibration with explicit solver settings.
pub fn calibrate_energy_with(
    half_bw: f64,
    probe: &[Complex64],
    vforw: &[Complex64],
    vrefl: &[Complex64],
    probe_sq_deriv: &[f64],
    decay: Option<DecayTraces<'_>>,
    config: &LmConfig,
) -> CavityResult<EnergyCalibration> {
    check_pulse_traces(probe, vforw, vrefl)?;
    require_same_len("probe derivative trace", probe.len(), probe_sq_deriv.len())?;
    if let Some(t) = decay {
        require_same_len("reflected decay trace", t.vforw.len(), t.vrefl.len())?;
    }
    if !half_bw.is_finite() || half_bw <= 0.0 {
        return Err(CavityError::InvalidParameter(format!(
            "half bandwidth must be finite and > 0, got {half_bw}"
        )));
    }
    let max_probe = probe.iter().fold(0.0_f64, |m, p| m.max(p.norm()));
    if !max_probe.is_finite() || max_probe <= 0.0 {
        return Err(CavityError::DegenerateInput(
            "probe trace is identically zero".to_string(),
        ));
    }
    for (name, trace) in [("forward", vforw), ("reflected", vrefl)] {
        if trace.iter().all(|v| v.norm_sqr() == 0.0) {
            return Err(CavityError::DegenerateInput(format!(
                "{name} trace is identically zero"
            )));
        }
    }

    let c: Vec<f64> = probe_sq_deriv.iter().map(|&v| v / (2.0 * half_bw)).collect();
    let d: Vec<f64> = c.iter().zip(probe).map(|(&ci, p)| ci + p.norm_sqr()).collect();
    let problem = EnergyProblem {
        probe,
        vforw,
        vrefl,
        decay,
        c,
        d,
        max_probe_recip: 1.0 / max_probe,
    };

    let x0 = c2re(&CalibrationCoefficients::identity().as_array());
    let report = levenberg_marquardt(|x| problem.residual(x), &x0, config)?;
    tracing::debug!(
        iterations = report.iterations,
        cost = report.cost,
        termination = ?report.termination,
        "energy calibration finished"
    );
    if !report.converged() {
        tracing::warn!(
            termination = ?report.termination,
            cost = report.cost,
            "energy calibration did not converge"
        );
        return Err(CavityError::SolverDiverged {
            iteration: report.iterations,
            message: format!(
                "energy calibration stopped with {:?} at cost {:e}",
                report.termination, report.cost
            ),
        });
    }

    let fitted = report.x.to_vec();
    let coefficients = CalibrationCoefficients::from_slice(&re2c(&fitted))?;
    Ok(EnergyCalibration {
        coefficients,
        report,
    })
}
