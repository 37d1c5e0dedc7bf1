// ─────────────────────────────────────────────────────────────────────
// SCPN Cavity Sim — Trace Helpers
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────

use cavity_types::error::{CavityError, CavityResult};
use num_complex::Complex64;

/// `d|probe|²/dt` by central differences, one-sided at both ends.
pub fn probe_sq_derivative(probe: &[Complex64], ts: f64) -> CavityResult<Vec<f64>> {
    if !ts.is_finite() || ts <= 0.0 {
        return Err(CavityError::InvalidSampleTime(ts));
    }
    let n = probe.len();
    if n < 2 {
        return Err(CavityError::DegenerateInput(format!(
            "probe derivative needs at least 2 samples, got {n}"
        )));
    }
    let sq: Vec<f64> = probe.iter().map(|p| p.norm_sqr()).collect();
    let mut out = vec![0.0; n];
    out[0] = (sq[1] - sq[0]) / ts;
    out[n - 1] = (sq[n - 1] - sq[n - 2]) / ts;
    for i in 1..n - 1 {
        out[i] = (sq[i + 1] - sq[i - 1]) / (2.0 * ts);
    }
    Ok(out)
}

/// Length check shared by the calibration entry points.
pub(crate) fn require_same_len(
    context: &'static str,
    expected: usize,
    actual: usize,
) -> CavityResult<()> {
    if expected != actual {
        return Err(CavityError::ShapeMismatch {
            context,
            expected,
            actual,
        });
    }
    Ok(())
}
