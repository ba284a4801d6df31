//! Per-tick anomaly classification over a telemetry frame.
//!
//! Simulation stand-in for a trained model: normalized feature deviation
//! from the channel midpoints, plus a small seeded perturbation. Only the
//! `score: frame -> (f64 in [0,1], status)` contract is load-bearing; a real
//! classifier can be substituted behind the same interface.

use log::{error, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::AnomalyConfig;
use crate::source::{TelemetryChannel, TelemetryFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnomalyStatus {
    Normal,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AnomalyResult {
    pub score: f64,
    pub status: AnomalyStatus,
}

pub struct AnomalyScorer {
    cfg: AnomalyConfig,
    rng: StdRng,
    latest: AnomalyResult,
    inferences: u64,
}

impl AnomalyScorer {
    pub fn new(cfg: AnomalyConfig) -> Self {
        let rng = StdRng::seed_from_u64(cfg.seed);
        Self {
            cfg,
            rng,
            latest: AnomalyResult {
                score: 0.0,
                status: AnomalyStatus::Normal,
            },
            inferences: 0,
        }
    }

    /// Clamp into the channel's configured range, then map linearly to [0,1].
    /// A degenerate range (min == max) normalizes to 0.
    pub fn normalize(&self, value: f64, channel: TelemetryChannel) -> f64 {
        let [min, max] = self.cfg.ranges.range(channel);
        let v = value.clamp(min, max);
        if max > min {
            (v - min) / (max - min)
        } else {
            0.0
        }
    }

    /// Score one telemetry frame. Missing channels default to 0.0 raw.
    /// Deterministic for a fixed seed and frame sequence.
    pub fn score(&mut self, frame: &TelemetryFrame) -> AnomalyResult {
        let mut deviation_sum = 0.0;
        for channel in TelemetryChannel::ALL {
            let raw = frame.get(channel).unwrap_or(0.0);
            deviation_sum += (self.normalize(raw, channel) - 0.5).abs();
        }
        let raw_score =
            (deviation_sum / TelemetryChannel::ALL.len() as f64 * 2.0).clamp(0.0, 1.0);

        let amp = self.cfg.noise_amplitude;
        let noise = if amp > 0.0 {
            self.rng.gen_range(-amp..=amp)
        } else {
            0.0
        };
        let score = (raw_score + noise).clamp(0.0, 1.0);

        let status = if score >= self.cfg.critical_min {
            AnomalyStatus::Critical
        } else if score >= self.cfg.warning_min {
            AnomalyStatus::Warning
        } else {
            AnomalyStatus::Normal
        };

        // report transitions once per entry, not per tick
        if status != self.latest.status {
            match status {
                AnomalyStatus::Critical => error!("CRITICAL ANOMALY: score = {score:.3}"),
                AnomalyStatus::Warning => warn!("anomaly warning: score = {score:.3}"),
                AnomalyStatus::Normal => {}
            }
        }

        self.latest = AnomalyResult { score, status };
        self.inferences += 1;
        self.latest
    }

    pub fn latest(&self) -> AnomalyResult {
        self.latest
    }

    /// Configured inference cadence, consumed by the control loop schedule.
    pub fn interval_ms(&self) -> u64 {
        self.cfg.inference_interval_ms
    }

    pub fn inferences(&self) -> u64 {
        self.inferences
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn midpoint_frame() -> TelemetryFrame {
        let mut f = TelemetryFrame::default();
        f.insert(TelemetryChannel::Rpm, 3000.0);
        f.insert(TelemetryChannel::Speed, 100.0);
        f.insert(TelemetryChannel::CoolantTemp, 60.0);
        f.insert(TelemetryChannel::ThrottlePos, 50.0);
        f.insert(TelemetryChannel::IntakePressure, 127.5);
        f.insert(TelemetryChannel::EngineLoad, 50.0);
        f
    }

    #[test]
    fn normalize_boundaries() {
        let s = AnomalyScorer::new(AnomalyConfig::default());
        assert_eq!(s.normalize(0.0, TelemetryChannel::Rpm), 0.0);
        assert_eq!(s.normalize(6000.0, TelemetryChannel::Rpm), 1.0);
        assert_eq!(s.normalize(3000.0, TelemetryChannel::Rpm), 0.5);
        // out-of-range clamps to the boundary exactly
        assert_eq!(s.normalize(-10.0, TelemetryChannel::Rpm), 0.0);
        assert_eq!(s.normalize(99999.0, TelemetryChannel::Rpm), 1.0);
    }

    #[test]
    fn degenerate_range_normalizes_to_zero() {
        let mut cfg = AnomalyConfig::default();
        cfg.ranges.speed = [80.0, 80.0];
        let s = AnomalyScorer::new(cfg);
        assert_eq!(s.normalize(80.0, TelemetryChannel::Speed), 0.0);
    }

    #[test]
    fn midpoint_frame_is_normal() {
        let mut s = AnomalyScorer::new(AnomalyConfig::default());
        let r = s.score(&midpoint_frame());
        // deviation is ~0; only the +-0.05 noise band remains
        assert!(r.score <= 0.06, "score {} outside noise band", r.score);
        assert_eq!(r.status, AnomalyStatus::Normal);
    }

    #[test]
    fn missing_channels_default_to_zero_raw() {
        let mut s = AnomalyScorer::new(AnomalyConfig {
            noise_amplitude: 0.0,
            ..AnomalyConfig::default()
        });
        // empty frame: every channel normalizes to 0, deviation 0.5 each
        let r = s.score(&TelemetryFrame::default());
        assert_eq!(r.score, 1.0);
        assert_eq!(r.status, AnomalyStatus::Critical);
    }

    #[test]
    fn deterministic_under_fixed_seed() {
        let cfg = AnomalyConfig {
            seed: 42,
            ..AnomalyConfig::default()
        };
        let mut a = AnomalyScorer::new(cfg.clone());
        let mut b = AnomalyScorer::new(cfg);
        let frame = midpoint_frame();
        for _ in 0..10 {
            assert_eq!(a.score(&frame).score, b.score(&frame).score);
        }
        assert_eq!(a.inferences(), 10);
    }
}
