// ─────────────────────────────────────────────────────────────────────
// SCPN Cavity Sim — Cavity Step
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! One-sample update of the complex baseband cavity voltage.
//!
//! Explicit Euler step of `dvc/dt = −(ω½ − jΔω)·vc + 2ω½·(β·vf/(β+1) + vb)`:
//!
//! ```text
//! vc[n] = (1 − Ts(ω½ − jΔω[n−1]))·vc[n−1] + 2ω½Ts·(β·vf/(β+1) + vb)
//! vr[n] = vc[n] − vf[n]
//! ```
//!
//! The squared voltage in MV drives the mechanical modes, whose output
//! plus the injected detuning becomes the detuning of the next step.

use cavity_types::config::CavityConfig;
use cavity_types::constants::VOLT_TO_MV;
use cavity_types::error::{CavityError, CavityResult};
use cavity_types::state::{CavityState, DiscreteStateSpace, DriveSignals};
use ndarray::Array1;
use num_complex::Complex64;

/// Electrical cavity parameters, fixed for a simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CavityParams {
    /// Half bandwidth ω½ [rad/s].
    pub half_bw: f64,
    /// Loaded resistance RL [Ω].
    pub rl: f64,
    /// Input coupling factor β.
    pub beta: f64,
    /// Sample time [s].
    pub ts: f64,
}

impl CavityParams {
    pub fn new(half_bw: f64, rl: f64, beta: f64, ts: f64) -> Self {
        CavityParams {
            half_bw,
            rl,
            beta,
            ts,
        }
    }

    pub fn from_config(config: &CavityConfig) -> Self {
        Self::new(
            config.half_bandwidth(),
            config.loaded_resistance(),
            config.cavity.beta,
            config.sample_time,
        )
    }

    pub fn validate(&self) -> CavityResult<()> {
        validate_electrical(self.half_bw, self.ts, self.beta)?;
        if !self.rl.is_finite() || self.rl <= 0.0 {
            return Err(CavityError::InvalidParameter(format!(
                "loaded resistance must be finite and > 0, got {}",
                self.rl
            )));
        }
        Ok(())
    }

    /// Beam-induced drive voltage `−RL · ib`.
    pub fn beam_voltage(&self, beam_current: Complex64) -> Complex64 {
        -beam_current * self.rl
    }
}

fn validate_electrical(half_bw: f64, ts: f64, beta: f64) -> CavityResult<()> {
    if !half_bw.is_finite() || half_bw <= 0.0 {
        return Err(CavityError::InvalidParameter(format!(
            "half bandwidth must be finite and > 0, got {half_bw}"
        )));
    }
    if !ts.is_finite() || ts <= 0.0 {
        return Err(CavityError::InvalidSampleTime(ts));
    }
    if !beta.is_finite() || beta <= 0.0 {
        return Err(CavityError::InvalidParameter(format!(
            "coupling beta must be finite and > 0, got {beta}"
        )));
    }
    Ok(())
}

#[inline]
fn voltage_update(
    half_bw: f64,
    ts: f64,
    beta: f64,
    detuning: f64,
    vf: Complex64,
    vb: Complex64,
    vc_prev: Complex64,
) -> Complex64 {
    let decay = Complex64::new(1.0 - ts * half_bw, ts * detuning);
    decay * vc_prev + (vf * (beta / (beta + 1.0)) + vb) * (2.0 * half_bw * ts)
}

/// Result of one cavity step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// State to feed back as `prev` on the next call.
    pub state: CavityState,
    /// Reflected voltage `vc − vf` [V].
    pub vr: Complex64,
}

/// Advance the cavity by one sample.
///
/// `prev.dw` detunes the electrical update; `drive.detuning` is added to the
/// mechanical output to form the new detuning. Without a mechanical model
/// the new detuning is `drive.detuning` and `state_m` passes through.
///
/// Errors: `InvalidParameter`/`InvalidSampleTime` for non-positive
/// ω½, Ts, β or RL; `ShapeMismatch` if `prev.state_m` does not match the model.
pub fn cavity_step(
    params: &CavityParams,
    drive: &DriveSignals,
    prev: &CavityState,
    mech: Option<&DiscreteStateSpace>,
) -> CavityResult<StepOutput> {
    params.validate()?;
    let mut state = prev.clone();
    let mut scratch = Array1::zeros(prev.state_m.len());
    let vr = cavity_step_in_place(params, drive, &mut state, mech, &mut scratch)?;
    Ok(StepOutput { state, vr })
}

/// In-place [`cavity_step`] for long simulation loops; returns `vr`.
///
/// `params` must already have passed [`CavityParams::validate`]; they are
/// not re-checked here. `scratch` must have the model order and is swapped
/// with `state.state_m`. On error `state` is left unchanged.
pub fn cavity_step_in_place(
    params: &CavityParams,
    drive: &DriveSignals,
    state: &mut CavityState,
    mech: Option<&DiscreteStateSpace>,
    scratch: &mut Array1<f64>,
) -> CavityResult<Complex64> {
    let vb = params.beam_voltage(drive.beam);
    let vc = voltage_update(
        params.half_bw,
        params.ts,
        params.beta,
        state.dw,
        drive.forward,
        vb,
        state.vc,
    );

    let dw = match mech {
        Some(model) => {
            let u = (vc.norm() * VOLT_TO_MV).powi(2);
            let lorentz = model.advance_into(&state.state_m, u, scratch)?;
            std::mem::swap(&mut state.state_m, scratch);
            lorentz + drive.detuning
        }
        None => drive.detuning,
    };
    state.vc = vc;
    state.dw = dw;
    Ok(vc - drive.forward)
}

/// Electrical-only step with constant detuning and explicit beam voltage.
///
/// Returns `(vc, vr)`.
pub fn cavity_step_simple(
    half_bw: f64,
    detuning: f64,
    vf: Complex64,
    vb: Complex64,
    vc_prev: Complex64,
    ts: f64,
    beta: f64,
) -> CavityResult<(Complex64, Complex64)> {
    validate_electrical(half_bw, ts, beta)?;
    let vc = voltage_update(half_bw, ts, beta, detuning, vf, vb, vc_prev);
    Ok((vc, vc - vf))
}
