// ─────────────────────────────────────────────────────────────────────
// SCPN Cavity Sim — RF Power
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Steady-state RF power relations for a driven cavity.

use cavity_types::error::{CavityError, CavityResult};
use cavity_types::state::Machine;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

fn require_positive(name: &str, value: f64) -> CavityResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CavityError::InvalidParameter(format!(
            "{name} must be finite and > 0, got {value}"
        )));
    }
    Ok(())
}

/// Half bandwidth `π f0 / QL` [rad/s].
pub fn half_bandwidth(f0: f64, ql: f64) -> CavityResult<f64> {
    require_positive("f0", f0)?;
    require_positive("QL", ql)?;
    Ok(PI * f0 / ql)
}

/// Loaded resistance: `½·(r/Q)·QL` for linacs, `(R/Q)·QL` for circular machines.
pub fn loaded_resistance(roq: f64, ql: f64, machine: Machine) -> CavityResult<f64> {
    require_positive("r/Q", roq)?;
    require_positive("QL", ql)?;
    Ok(match machine {
        Machine::Linac => 0.5 * roq * ql,
        Machine::Circular => roq * ql,
    })
}

/// Coefficient `C = β/(β+1)/(2 RL)` such that `P [W] = C·|V|²`.
pub fn volt_to_power_coefficient(roq: f64, ql: f64, beta: f64, machine: Machine) -> CavityResult<f64> {
    require_positive("beta", beta)?;
    let rl = loaded_resistance(roq, ql, machine)?;
    Ok(beta / (beta + 1.0) / (2.0 * rl))
}

/// Apply a volt-to-power coefficient to a calibrated waveform.
pub fn volt_to_power(coefficient: f64, waveform: &[Complex64]) -> Vec<f64> {
    waveform.iter().map(|v| coefficient * v.norm_sqr()).collect()
}

/// Operating point for [`rf_power_requirement`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerRequest {
    /// RF frequency [Hz].
    pub f0: f64,
    /// Desired cavity voltage [V].
    pub vc0: f64,
    /// Average beam current [A].
    pub ib0: f64,
    /// Beam phase [deg], 0 on crest.
    pub phib_deg: f64,
    /// Unloaded Q (≈1e10 for superconducting cavities).
    pub q0: f64,
    /// r/Q or R/Q [Ω].
    pub roq: f64,
    pub ql: f64,
    /// Detuning [rad/s].
    pub detuning: f64,
    pub machine: Machine,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerRequirement {
    pub forward_w: f64,
    pub reflected_w: f64,
}

/// Steady-state forward and reflected power for an operating point.
pub fn rf_power_requirement(req: &PowerRequest) -> CavityResult<PowerRequirement> {
    require_positive("f0", req.f0)?;
    require_positive("Q0", req.q0)?;
    if !req.vc0.is_finite() || req.vc0 <= 0.0 {
        return Err(CavityError::InvalidParameter(format!(
            "cavity voltage must be finite and > 0, got {}",
            req.vc0
        )));
    }
    if !req.ib0.is_finite() || req.ib0 < 0.0 {
        return Err(CavityError::InvalidParameter(format!(
            "beam current must be finite and >= 0, got {}",
            req.ib0
        )));
    }
    let rl = loaded_resistance(req.roq, req.ql, req.machine)?;
    let beta = req.q0 / req.ql - 1.0;
    if beta <= 0.0 {
        return Err(CavityError::InvalidParameter(format!(
            "Q0 ({}) must exceed QL ({}) for a positive coupling factor",
            req.q0, req.ql
        )));
    }
    let wh = PI * req.f0 / req.ql;
    let phib = req.phib_deg.to_radians();

    let scale = (beta + 1.0) / beta * req.vc0 * req.vc0 / 8.0 / rl;
    let beam_re = 2.0 * rl * req.ib0 * phib.cos() / req.vc0;
    let quad = req.detuning / wh + 2.0 * rl * req.ib0 * phib.sin() / req.vc0;

    let forward_w = scale * ((1.0 + beam_re).powi(2) + quad * quad);
    let reflected_w = scale * (((beta - 1.0) / (beta + 1.0) - beam_re).powi(2) + quad * quad);
    Ok(PowerRequirement {
        forward_w,
        reflected_w,
    })
}
