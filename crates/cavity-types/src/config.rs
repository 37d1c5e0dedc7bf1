// ─────────────────────────────────────────────────────────────────────
// SCPN Cavity Sim — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::constants::{DEFAULT_BETA, DEFAULT_TS, F0_LBAND, TESLA_ROQ};
use crate::error::{CavityError, CavityResult};
use crate::state::{Machine, MechanicalModeSpec};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Top-level RF system configuration.
/// Every section has defaults, so a partial JSON file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CavityConfig {
    /// Electrical sample time [s].
    #[serde(default = "default_ts")]
    pub sample_time: f64,
    #[serde(default)]
    pub cavity: CavityParamsConfig,
    #[serde(default)]
    pub mechanical_modes: MechanicalModeSpec,
    #[serde(default)]
    pub rf_source: RfSourceConfig,
    #[serde(default)]
    pub iq_modulator: IqModulatorConfig,
    #[serde(default)]
    pub amplifier: AmplifierConfig,
    #[serde(default)]
    pub beam: BeamConfig,
    /// Buffer index wraps back to 0 when it reaches this value.
    #[serde(default = "default_pulse_length")]
    pub pulse_length: usize,
    #[serde(default)]
    pub microphonics: MicrophonicsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CavityParamsConfig {
    /// RF operating frequency [Hz].
    #[serde(default = "default_f0")]
    pub f0: f64,
    /// r/Q (linac) or R/Q (circular) [Ω].
    #[serde(default = "default_roq")]
    pub roq: f64,
    /// Loaded quality factor.
    #[serde(default = "default_ql")]
    pub ql: f64,
    /// Input coupling factor.
    #[serde(default = "default_beta")]
    pub beta: f64,
    #[serde(default)]
    pub machine: Machine,
    /// Static detuning added to every commanded detuning [rad/s].
    #[serde(default)]
    pub initial_detuning: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfSourceConfig {
    /// Offset from the carrier [Hz].
    #[serde(default = "default_f_offset")]
    pub frequency_offset: f64,
    #[serde(default = "default_one")]
    pub amplitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IqModulatorConfig {
    #[serde(default)]
    pub pulsed: bool,
    /// Gate buffer length [samples].
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Gate is open on `[0, flattop_end)` [samples].
    #[serde(default = "default_flattop_end")]
    pub flattop_end: usize,
    /// CW-mode scalar multiplier.
    #[serde(default = "default_one")]
    pub cw_level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmplifierConfig {
    #[serde(default = "default_gain_db")]
    pub gain_db: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamConfig {
    /// Average beam current during the pulsed beam window [A]. Only read
    /// when `pulsed` is true; CW runs use `cw_current`, which defaults to 0.
    #[serde(default = "default_beam_current")]
    pub current: f64,
    /// Beam is on during `[fill_end, flattop_end)` of the pulse [samples].
    #[serde(default = "default_fill_end")]
    pub fill_end: usize,
    /// When false, the CW beam current `cw_current` is used on every step.
    #[serde(default)]
    pub pulsed: bool,
    /// Beam current on every step of a CW run [A].
    #[serde(default)]
    pub cw_current: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicrophonicsConfig {
    /// Gaussian detuning standard deviation [Hz].
    #[serde(default = "default_sigma_hz")]
    pub sigma_hz: f64,
    /// Seed for reproducible runs. Absent means the caller seeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_ts() -> f64 {
    DEFAULT_TS
}
fn default_pulse_length() -> usize {
    2048 * 10
}
fn default_f0() -> f64 {
    F0_LBAND
}
fn default_roq() -> f64 {
    TESLA_ROQ
}
fn default_ql() -> f64 {
    3.0e6
}
fn default_beta() -> f64 {
    DEFAULT_BETA
}
fn default_f_offset() -> f64 {
    -460.0
}
fn default_one() -> f64 {
    1.0
}
fn default_buffer_size() -> usize {
    2048 * 8
}
fn default_flattop_end() -> usize {
    1300
}
fn default_gain_db() -> f64 {
    20.0 * 12.0e6_f64.log10()
}
fn default_beam_current() -> f64 {
    0.008
}
fn default_fill_end() -> usize {
    510
}
fn default_sigma_hz() -> f64 {
    10.0
}

impl Default for CavityParamsConfig {
    fn default() -> Self {
        CavityParamsConfig {
            f0: default_f0(),
            roq: default_roq(),
            ql: default_ql(),
            beta: default_beta(),
            machine: Machine::default(),
            initial_detuning: 0.0,
        }
    }
}

impl Default for RfSourceConfig {
    fn default() -> Self {
        RfSourceConfig {
            frequency_offset: default_f_offset(),
            amplitude: default_one(),
        }
    }
}

impl Default for IqModulatorConfig {
    fn default() -> Self {
        IqModulatorConfig {
            pulsed: false,
            buffer_size: default_buffer_size(),
            flattop_end: default_flattop_end(),
            cw_level: default_one(),
        }
    }
}

impl Default for AmplifierConfig {
    fn default() -> Self {
        AmplifierConfig {
            gain_db: default_gain_db(),
        }
    }
}

impl Default for BeamConfig {
    fn default() -> Self {
        BeamConfig {
            current: default_beam_current(),
            fill_end: default_fill_end(),
            pulsed: false,
            cw_current: 0.0,
        }
    }
}

impl Default for MicrophonicsConfig {
    fn default() -> Self {
        MicrophonicsConfig {
            sigma_hz: default_sigma_hz(),
            seed: None,
        }
    }
}

impl Default for CavityConfig {
    fn default() -> Self {
        CavityConfig {
            sample_time: default_ts(),
            cavity: CavityParamsConfig::default(),
            mechanical_modes: MechanicalModeSpec::default(),
            rf_source: RfSourceConfig::default(),
            iq_modulator: IqModulatorConfig::default(),
            amplifier: AmplifierConfig::default(),
            beam: BeamConfig::default(),
            pulse_length: default_pulse_length(),
            microphonics: MicrophonicsConfig::default(),
        }
    }
}

fn require_positive(name: &str, value: f64) -> CavityResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CavityError::ConfigError(format!(
            "{name} must be finite and > 0, got {value}"
        )));
    }
    Ok(())
}

impl CavityConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_file(path: &str) -> CavityResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json(&contents)?;
        tracing::info!(path, ql = config.cavity.ql, "loaded cavity config");
        Ok(config)
    }

    /// Parse and validate a JSON configuration string.
    pub fn from_json(contents: &str) -> CavityResult<Self> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CavityResult<()> {
        require_positive("sample_time", self.sample_time)?;
        require_positive("cavity.f0", self.cavity.f0)?;
        require_positive("cavity.roq", self.cavity.roq)?;
        require_positive("cavity.ql", self.cavity.ql)?;
        require_positive("cavity.beta", self.cavity.beta)?;
        if !self.cavity.initial_detuning.is_finite() {
            return Err(CavityError::ConfigError(
                "cavity.initial_detuning must be finite".to_string(),
            ));
        }
        if !self.amplifier.gain_db.is_finite() {
            return Err(CavityError::ConfigError(
                "amplifier.gain_db must be finite".to_string(),
            ));
        }
        if self.iq_modulator.buffer_size == 0 {
            return Err(CavityError::ConfigError(
                "iq_modulator.buffer_size must be > 0".to_string(),
            ));
        }
        if self.pulse_length == 0 {
            return Err(CavityError::ConfigError(
                "pulse_length must be > 0".to_string(),
            ));
        }
        if !self.microphonics.sigma_hz.is_finite() || self.microphonics.sigma_hz < 0.0 {
            return Err(CavityError::ConfigError(format!(
                "microphonics.sigma_hz must be finite and >= 0, got {}",
                self.microphonics.sigma_hz
            )));
        }
        Ok(())
    }

    /// Half bandwidth `π f0 / QL` [rad/s].
    pub fn half_bandwidth(&self) -> f64 {
        PI * self.cavity.f0 / self.cavity.ql
    }

    /// Loaded resistance for the configured machine convention [Ω].
    pub fn loaded_resistance(&self) -> f64 {
        match self.cavity.machine {
            Machine::Linac => 0.5 * self.cavity.roq * self.cavity.ql,
            Machine::Circular => self.cavity.roq * self.cavity.ql,
        }
    }
}
