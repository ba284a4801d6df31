//! Static run configuration. All values are fixed for the lifetime of a run;
//! there is no hot reload.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::source::TelemetryChannel;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub gas: GasConfig,
    pub valve: ValveConfig,
    pub telemetry: TelemetryConfig,
    pub anomaly: AnomalyConfig,
    pub control: ControlConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    /// Raw samples per second pulled from the ADC.
    pub sample_rate_hz: u32,
    /// Filtered value at/above this is at least WARNING.
    pub warning_min: f64,
    /// Filtered value at/above this starts a critical episode.
    pub critical_min: f64,
    /// Continuous time above `critical_min` required before CRITICAL is confirmed.
    pub confirmation_time_secs: f64,
    /// ADC count range, e.g. 1024 for a 10-bit converter.
    pub adc_full_scale: u32,
    /// Supply voltage used for the display-only volts conversion.
    pub reference_voltage: f64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 10,
            warning_min: 200.0,
            critical_min: 400.0,
            confirmation_time_secs: 2.0,
            adc_full_scale: 1024,
            reference_voltage: 3.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValveConfig {
    /// When false a confirmed leak is reported but the valve is left alone.
    pub auto_shutoff: bool,
}

impl Default for ValveConfig {
    fn default() -> Self {
        Self { auto_shutoff: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub sample_rate_hz: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { sample_rate_hz: 1.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub inference_interval_ms: u64,
    pub warning_min: f64,
    pub critical_min: f64,
    /// Half-width of the symmetric perturbation added to the raw score.
    pub noise_amplitude: f64,
    /// RNG seed; a fixed seed makes scoring reproducible.
    pub seed: u64,
    pub ranges: NormRanges,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            inference_interval_ms: 500,
            warning_min: 0.3,
            critical_min: 0.7,
            noise_amplitude: 0.05,
            seed: 0,
            ranges: NormRanges::default(),
        }
    }
}

/// Per-channel normalization ranges `[min, max]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormRanges {
    pub rpm: [f64; 2],
    pub speed: [f64; 2],
    pub coolant_temp: [f64; 2],
    pub throttle_pos: [f64; 2],
    pub intake_pressure: [f64; 2],
    pub engine_load: [f64; 2],
}

impl Default for NormRanges {
    fn default() -> Self {
        Self {
            rpm: [0.0, 6000.0],
            speed: [0.0, 200.0],
            coolant_temp: [0.0, 120.0],
            throttle_pos: [0.0, 100.0],
            intake_pressure: [0.0, 255.0],
            engine_load: [0.0, 100.0],
        }
    }
}

impl NormRanges {
    pub fn range(&self, channel: TelemetryChannel) -> [f64; 2] {
        match channel {
            TelemetryChannel::Rpm => self.rpm,
            TelemetryChannel::Speed => self.speed,
            TelemetryChannel::CoolantTemp => self.coolant_temp,
            TelemetryChannel::ThrottlePos => self.throttle_pos,
            TelemetryChannel::IntakePressure => self.intake_pressure,
            TelemetryChannel::EngineLoad => self.engine_load,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Scheduler tick granularity; must be well below every sub-task interval.
    pub tick_ms: u64,
    pub gas_interval_ms: u64,
    pub display_interval_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            gas_interval_ms: 100,
            display_interval_ms: 2000,
        }
    }
}

impl SystemConfig {
    /// Load from a TOML file, falling back to defaults for absent fields.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let cfg: SystemConfig = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gas.warning_min > self.gas.critical_min {
            return Err(ConfigError::Invalid(
                "gas.warning_min must not exceed gas.critical_min".into(),
            ));
        }
        if self.anomaly.warning_min > self.anomaly.critical_min {
            return Err(ConfigError::Invalid(
                "anomaly.warning_min must not exceed anomaly.critical_min".into(),
            ));
        }
        if self.gas.sample_rate_hz == 0 {
            return Err(ConfigError::Invalid("gas.sample_rate_hz must be nonzero".into()));
        }
        if self.telemetry.sample_rate_hz <= 0.0 {
            return Err(ConfigError::Invalid(
                "telemetry.sample_rate_hz must be positive".into(),
            ));
        }
        if self.gas.confirmation_time_secs < 0.0 {
            return Err(ConfigError::Invalid(
                "gas.confirmation_time_secs must be nonnegative".into(),
            ));
        }
        if self.control.tick_ms == 0 {
            return Err(ConfigError::Invalid("control.tick_ms must be nonzero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_values() {
        let cfg = SystemConfig::default();
        assert_eq!(cfg.gas.sample_rate_hz, 10);
        assert_eq!(cfg.gas.warning_min, 200.0);
        assert_eq!(cfg.gas.critical_min, 400.0);
        assert_eq!(cfg.gas.confirmation_time_secs, 2.0);
        assert!(cfg.valve.auto_shutoff);
        assert_eq!(cfg.anomaly.inference_interval_ms, 500);
        assert_eq!(cfg.anomaly.critical_min, 0.7);
        assert_eq!(cfg.anomaly.ranges.rpm, [0.0, 6000.0]);
        assert_eq!(cfg.control.gas_interval_ms, 100);
        assert_eq!(cfg.control.display_interval_ms, 2000);
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(f, "[gas]\ncritical_min = 500.0\n\n[valve]\nauto_shutoff = false").unwrap();
        let cfg = SystemConfig::from_file(f.path()).unwrap();
        assert_eq!(cfg.gas.critical_min, 500.0);
        assert!(!cfg.valve.auto_shutoff);
        // untouched fields keep defaults
        assert_eq!(cfg.gas.warning_min, 200.0);
        assert_eq!(cfg.control.tick_ms, 10);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let mut cfg = SystemConfig::default();
        cfg.gas.warning_min = 600.0;
        assert!(cfg.validate().is_err());
    }
}
