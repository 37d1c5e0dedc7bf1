// ─────────────────────────────────────────────────────────────────────
// SCPN Cavity Sim — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Volts → megavolts. Lorentz coefficients are specified per (MV)².
pub const VOLT_TO_MV: f64 = 1.0e-6;

/// Default input coupling factor for superconducting cavities (β ≫ 1).
pub const DEFAULT_BETA: f64 = 1.0e4;

/// Default electrical sample time [s].
pub const DEFAULT_TS: f64 = 1.0e-6;

/// TESLA-type 1.3 GHz cavity r/Q (linac convention) [Ω].
pub const TESLA_ROQ: f64 = 1036.0;

/// L-band RF operating frequency [Hz].
pub const F0_LBAND: f64 = 1.3e9;
