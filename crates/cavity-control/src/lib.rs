// ─────────────────────────────────────────────────────────────────────
// SCPN Cavity Sim — Control Surface
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Caller-owned simulation context for driving the cavity from an
//! external controller, plus seeded microphonics and telemetry buffers.

pub mod context;
pub mod microphonics;
pub mod telemetry;
