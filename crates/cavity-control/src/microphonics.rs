// ─────────────────────────────────────────────────────────────────────
// SCPN Cavity Sim — Microphonics Source
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! White Gaussian detuning noise from an explicitly seeded generator.

use cavity_types::config::MicrophonicsConfig;
use cavity_types::error::{CavityError, CavityResult};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

/// Per-step detuning samples `2π·σ·N(0, 1)` [rad/s].
#[derive(Debug, Clone)]
pub struct MicrophonicsSource {
    rng: StdRng,
    dist: Normal<f64>,
    sigma_hz: f64,
    seed: u64,
}

impl MicrophonicsSource {
    pub fn new(sigma_hz: f64, seed: u64) -> CavityResult<Self> {
        if !sigma_hz.is_finite() || sigma_hz < 0.0 {
            return Err(CavityError::InvalidParameter(format!(
                "microphonics sigma must be finite and >= 0, got {sigma_hz}"
            )));
        }
        let dist = Normal::new(0.0, 2.0 * PI * sigma_hz)
            .map_err(|e| CavityError::InvalidParameter(format!("microphonics: {e}")))?;
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            dist,
            sigma_hz,
            seed,
        })
    }

    /// Uses the configured seed, or `fallback_seed` when none is set.
    pub fn from_config(config: &MicrophonicsConfig, fallback_seed: u64) -> CavityResult<Self> {
        let seed = config.seed.unwrap_or(fallback_seed);
        tracing::debug!(sigma_hz = config.sigma_hz, seed, "microphonics source seeded");
        Self::new(config.sigma_hz, seed)
    }

    pub fn sigma_hz(&self) -> f64 {
        self.sigma_hz
    }

    pub fn sample(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }

    /// Restart the sequence from the original seed.
    pub fn reseed(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = MicrophonicsSource::new(10.0, 7).unwrap();
        let mut b = MicrophonicsSource::new(10.0, 7).unwrap();
        for _ in 0..100 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn test_reseed_replays() {
        let mut src = MicrophonicsSource::new(10.0, 11).unwrap();
        let first: Vec<f64> = (0..5).map(|_| src.sample()).collect();
        src.reseed();
        let again: Vec<f64> = (0..5).map(|_| src.sample()).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn test_zero_sigma_is_silent() {
        let mut src = MicrophonicsSource::new(0.0, 1).unwrap();
        assert!((0..50).all(|_| src.sample() == 0.0));
    }

    #[test]
    fn test_sample_statistics() {
        let mut src = MicrophonicsSource::new(10.0, 2024).unwrap();
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| src.sample()).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;
        let sigma = 2.0 * PI * 10.0;
        assert!(mean.abs() < 0.05 * sigma, "mean {mean}");
        assert!((var.sqrt() / sigma - 1.0).abs() < 0.05, "std {}", var.sqrt());
    }

    #[test]
    fn test_negative_sigma_rejected() {
        assert!(MicrophonicsSource::new(-1.0, 0).is_err());
        assert!(MicrophonicsSource::new(f64::NAN, 0).is_err());
    }

    #[test]
    fn test_config_seed_takes_precedence() {
        let cfg = MicrophonicsConfig {
            sigma_hz: 5.0,
            seed: Some(99),
        };
        let mut from_cfg = MicrophonicsSource::from_config(&cfg, 1).unwrap();
        let mut direct = MicrophonicsSource::new(5.0, 99).unwrap();
        assert_eq!(from_cfg.sigma_hz(), 5.0);
        assert_eq!(from_cfg.sample(), direct.sample());
    }
}
