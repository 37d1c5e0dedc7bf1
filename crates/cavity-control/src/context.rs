// ─────────────────────────────────────────────────────────────────────
// SCPN Cavity Sim — Simulation Context
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! One independent cavity simulation: RF source phase, buffer index,
//! cavity state and a shared read-only mechanical model.
//!
//! Each step runs source → I/Q modulator → amplifier → cavity. The
//! controller supplies the piezo correction and the microphonics sample;
//! nothing here draws random numbers.

use cavity_core::cavity::{cavity_step_in_place, CavityParams};
use cavity_core::mechanical::{mechanical_model, DiscretizationMethod};
use cavity_core::signal_chain::{Amplifier, IqModulator, PulseBuffer, RfSource};
use cavity_types::config::CavityConfig;
use cavity_types::error::{CavityError, CavityResult};
use cavity_types::state::{CavityState, DiscreteStateSpace, DriveSignals};
use ndarray::{Array1, ArrayView1};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Beam current drive, indexed by the same buffer index as the I/Q gate.
#[derive(Debug, Clone, PartialEq)]
pub enum BeamDrive {
    Pulsed(PulseBuffer),
    Cw(Complex64),
}

impl BeamDrive {
    fn current(&self, buf_id: usize) -> Complex64 {
        match self {
            BeamDrive::Pulsed(buf) => buf.at(buf_id),
            BeamDrive::Cw(level) => *level,
        }
    }
}

/// What one step produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Buffer index used for this step.
    pub buf_id: usize,
    /// Amplifier output driving the cavity [V].
    pub forward: Complex64,
    /// Beam current [A].
    pub beam: Complex64,
    pub vc: Complex64,
    pub vr: Complex64,
    /// New detuning [rad/s].
    pub dw: f64,
}

#[derive(Debug, Clone)]
pub struct CavitySimulationContext {
    params: CavityParams,
    model: Arc<DiscreteStateSpace>,
    source: RfSource,
    iq: IqModulator,
    amplifier: Amplifier,
    beam: BeamDrive,
    state: CavityState,
    scratch: Array1<f64>,
    buf_id: usize,
    pulse_length: usize,
    initial_detuning: f64,
}

impl CavitySimulationContext {
    /// Validate `config` and discretize its mechanical modes with ZOH.
    pub fn from_config(config: &CavityConfig) -> CavityResult<Self> {
        config.validate()?;
        let model = mechanical_model(
            &config.mechanical_modes,
            config.sample_time,
            DiscretizationMethod::Zoh,
        )?;
        Self::with_model(config, Arc::new(model))
    }

    /// Build a context around an existing model, e.g. one shared by several
    /// parallel simulations.
    pub fn with_model(config: &CavityConfig, model: Arc<DiscreteStateSpace>) -> CavityResult<Self> {
        config.validate()?;
        model.check_shapes()?;
        if (model.ts - config.sample_time).abs() > 1e-12 * config.sample_time {
            return Err(CavityError::InvalidParameter(format!(
                "mechanical model sampled at {} s, config sample time is {} s",
                model.ts, config.sample_time
            )));
        }
        let params = CavityParams::from_config(config);
        params.validate()?;

        let iq_cfg = &config.iq_modulator;
        let iq = if iq_cfg.pulsed {
            IqModulator::Pulsed(PulseBuffer::rectangular(
                iq_cfg.buffer_size,
                0,
                iq_cfg.flattop_end,
                Complex64::new(1.0, 0.0),
            )?)
        } else {
            IqModulator::Cw(Complex64::new(iq_cfg.cw_level, 0.0))
        };
        let beam = if config.beam.pulsed {
            BeamDrive::Pulsed(PulseBuffer::rectangular(
                iq_cfg.buffer_size,
                config.beam.fill_end,
                iq_cfg.flattop_end,
                Complex64::new(config.beam.current, 0.0),
            )?)
        } else {
            BeamDrive::Cw(Complex64::new(config.beam.cw_current, 0.0))
        };

        let amplifier = Amplifier::new(config.amplifier.gain_db);
        tracing::info!(
            half_bw = params.half_bw,
            gain_db = amplifier.gain_db(),
            rl = params.rl,
            n_states = model.order(),
            pulsed = iq_cfg.pulsed,
            pulse_length = config.pulse_length,
            "cavity simulation context ready"
        );

        Ok(Self {
            params,
            state: CavityState::zeroed(model.order()),
            scratch: Array1::zeros(model.order()),
            model,
            source: RfSource::new(config.rf_source.frequency_offset, config.rf_source.amplitude),
            iq,
            amplifier,
            beam,
            buf_id: 0,
            pulse_length: config.pulse_length,
            initial_detuning: config.cavity.initial_detuning,
        })
    }

    /// Advance one sample with the given piezo and microphonics detuning [rad/s].
    pub fn step(&mut self, piezo: f64, microphonics: f64) -> CavityResult<StepRecord> {
        let sig = self.source.step(self.params.ts);

        self.buf_id += 1;
        if self.buf_id >= self.pulse_length {
            self.buf_id = 0;
        }

        let forward = self.amplifier.apply(self.iq.apply(sig, self.buf_id));
        let beam = self.beam.current(self.buf_id);
        let detuning = self.initial_detuning + piezo + microphonics;
        let drive = DriveSignals::new(forward, beam, detuning);

        // params were validated in with_model
        let vr = cavity_step_in_place(
            &self.params,
            &drive,
            &mut self.state,
            Some(self.model.as_ref()),
            &mut self.scratch,
        )?;
        Ok(StepRecord {
            buf_id: self.buf_id,
            forward,
            beam,
            vc: self.state.vc,
            vr,
            dw: self.state.dw,
        })
    }

    /// Zero the cavity and mechanical state, source phase and buffer index.
    pub fn reset(&mut self) {
        self.state.reset();
        self.source.reset();
        self.buf_id = 0;
        tracing::info!("cavity simulation context reset");
    }

    pub fn state(&self) -> &CavityState {
        &self.state
    }

    pub fn mechanical_state(&self) -> ArrayView1<'_, f64> {
        self.state.state_m.view()
    }

    pub fn model(&self) -> &Arc<DiscreteStateSpace> {
        &self.model
    }

    pub fn params(&self) -> &CavityParams {
        &self.params
    }

    pub fn buf_id(&self) -> usize {
        self.buf_id
    }

    pub fn source_phase(&self) -> f64 {
        self.source.phase()
    }
}
