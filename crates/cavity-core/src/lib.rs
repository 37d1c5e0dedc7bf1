// ─────────────────────────────────────────────────────────────────────
// SCPN Cavity Sim — Cavity Core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Discrete-time RF superconducting cavity model.
//!
//! Mechanical-mode state space, per-sample cavity voltage step,
//! signal-chain primitives and steady-state power relations.

pub mod cavity;
pub mod mechanical;
pub mod power;
pub mod signal_chain;
