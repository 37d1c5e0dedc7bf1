// ─────────────────────────────────────────────────────────────────────
// SCPN Cavity Sim — Calibration
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Recovery of the forward/reflected channel calibration of an SRF cavity.
//!
//! Raw forward and reflected traces are mixed and scaled by the RF
//! pickup chain. The calibration `(a, b, c, d)` maps them back:
//!
//! ```text
//! vf = a·vforw + b·vrefl
//! vr = c·vforw + d·vrefl
//! probe = vf + vr
//! ```

pub mod calibration;
pub mod traces;

pub use calibration::{
    calibrate_diagonal, calibrate_energy, calibrate_energy_with, calibrate_reference,
    CalibrationCoefficients, DecayTraces, EnergyCalibration,
};
pub use traces::probe_sq_derivative;
