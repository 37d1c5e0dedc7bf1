//! RF source, I/Q modulator and amplifier feeding the cavity.
//!
//! Stateless transforms plus thin stateful wrappers; the caller owns
//! the phase accumulator and buffer index.

use cavity_types::error::{CavityError, CavityResult};
use num_complex::Complex64;
use std::f64::consts::PI;

/// Advance the source phase by one sample; returns `(A·e^{jφ}, φ)`.
///
/// The phase is not wrapped; `exp` handles periodicity.
pub fn rf_source_step(f_offset: f64, amplitude: f64, phase_prev: f64, ts: f64) -> (Complex64, f64) {
    let phase = phase_prev + 2.0 * PI * f_offset * ts;
    (Complex64::from_polar(amplitude, phase), phase)
}

/// `10^(gain_dB/20)`.
pub fn db_to_linear(gain_db: f64) -> f64 {
    10f64.powf(gain_db / 20.0)
}

/// Fixed-gain amplifier, no compression.
pub fn amplify(sig: Complex64, gain_db: f64) -> Complex64 {
    sig * db_to_linear(gain_db)
}

/// RF source with its phase accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct RfSource {
    /// Offset from the carrier [Hz].
    pub frequency_offset: f64,
    pub amplitude: f64,
    phase: f64,
}

impl RfSource {
    pub fn new(frequency_offset: f64, amplitude: f64) -> Self {
        RfSource {
            frequency_offset,
            amplitude,
            phase: 0.0,
        }
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn step(&mut self, ts: f64) -> Complex64 {
        let (sig, phase) = rf_source_step(self.frequency_offset, self.amplitude, self.phase, ts);
        self.phase = phase;
        sig
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// Precomputed complex gate/envelope. Indices past the end hold the last sample.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseBuffer {
    samples: Vec<Complex64>,
}

impl PulseBuffer {
    pub fn new(samples: Vec<Complex64>) -> CavityResult<Self> {
        if samples.is_empty() {
            return Err(CavityError::InvalidParameter(
                "pulse buffer must not be empty".to_string(),
            ));
        }
        Ok(PulseBuffer { samples })
    }

    /// `level` on `[start, end)`, zero elsewhere. `end` is clamped to `size`.
    pub fn rectangular(size: usize, start: usize, end: usize, level: Complex64) -> CavityResult<Self> {
        let end = end.min(size);
        let samples = (0..size)
            .map(|i| {
                if i >= start && i < end {
                    level
                } else {
                    Complex64::new(0.0, 0.0)
                }
            })
            .collect();
        Self::new(samples)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn at(&self, buf_id: usize) -> Complex64 {
        let idx = buf_id.min(self.samples.len().saturating_sub(1));
        self.samples[idx]
    }

    pub fn as_slice(&self) -> &[Complex64] {
        &self.samples
    }
}

/// I/Q modulator: pulsed gating or constant CW scaling.
#[derive(Debug, Clone, PartialEq)]
pub enum IqModulator {
    Pulsed(PulseBuffer),
    Cw(Complex64),
}

impl IqModulator {
    pub fn apply(&self, sig: Complex64, buf_id: usize) -> Complex64 {
        match self {
            IqModulator::Pulsed(gate) => sig * gate.at(buf_id),
            IqModulator::Cw(level) => sig * *level,
        }
    }
}

/// Fixed-gain amplifier with cached linear gain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Amplifier {
    gain_db: f64,
    gain: f64,
}

impl Amplifier {
    pub fn new(gain_db: f64) -> Self {
        Amplifier {
            gain_db,
            gain: db_to_linear(gain_db),
        }
    }

    pub fn gain_db(&self) -> f64 {
        self.gain_db
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn apply(&self, sig: Complex64) -> Complex64 {
        sig * self.gain
    }
}
