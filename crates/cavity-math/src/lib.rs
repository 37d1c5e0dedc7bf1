//! Mathematical primitives for the SRF cavity simulator.

pub mod complex;
pub mod linalg;
pub mod lm;
