//! Gas-leak confirmation: moving-average filter plus a time-confirmed
//! threshold state machine.
//!
//! CRITICAL is never asserted from a single instantaneous reading. The
//! filtered value must sit at/above `critical_min` continuously for
//! `confirmation_time_secs` before the episode is confirmed; a transient
//! spike that drops back first clears the episode. This is the debounce
//! against sensor noise.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use serde::Serialize;

use crate::config::GasConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GasStatus {
    Safe,
    Warning,
    Critical,
}

pub struct GasSafetyMonitor {
    cfg: GasConfig,
    confirmation: Duration,
    /// Sliding window of the last `sample_rate_hz` raw samples (~1 s).
    window: VecDeque<f64>,
    capacity: usize,
    raw: f64,
    filtered: f64,
    status: GasStatus,
    /// Set when the filtered value first reached `critical_min`; cleared as
    /// soon as it drops below.
    episode_start: Option<Instant>,
    samples: u64,
}

impl GasSafetyMonitor {
    pub fn new(cfg: GasConfig) -> Self {
        let capacity = (cfg.sample_rate_hz as usize).max(1);
        let confirmation = Duration::from_secs_f64(cfg.confirmation_time_secs);
        Self {
            cfg,
            confirmation,
            window: VecDeque::with_capacity(capacity),
            capacity,
            raw: 0.0,
            filtered: 0.0,
            status: GasStatus::Safe,
            episode_start: None,
            samples: 0,
        }
    }

    /// Ingest one raw sample taken at `now`. Pure state transition, no I/O
    /// beyond transition logging; `now` is injected so the confirmation
    /// timing is testable.
    pub fn update_at(&mut self, raw: u16, now: Instant) -> GasStatus {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(raw as f64);
        self.samples += 1;
        self.raw = raw as f64;
        self.filtered = self.window.iter().sum::<f64>() / self.window.len() as f64;

        let next = self.evaluate(self.filtered, now);
        if next != self.status {
            match next {
                GasStatus::Warning => warn!("gas warning level: {:.1}", self.filtered),
                GasStatus::Critical => {
                    error!("CRITICAL GAS LEAK CONFIRMED: {:.1}", self.filtered)
                }
                GasStatus::Safe => info!("gas level back to safe: {:.1}", self.filtered),
            }
            self.status = next;
        }
        self.status
    }

    /// Convenience wrapper stamping the sample with the current time.
    pub fn update(&mut self, raw: u16) -> GasStatus {
        self.update_at(raw, Instant::now())
    }

    fn evaluate(&mut self, value: f64, now: Instant) -> GasStatus {
        if value >= self.cfg.critical_min {
            let start = *self.episode_start.get_or_insert_with(|| {
                warn!("critical gas level detected: {value:.1}, confirming");
                now
            });
            if now.duration_since(start) >= self.confirmation {
                GasStatus::Critical
            } else {
                GasStatus::Warning
            }
        } else if value >= self.cfg.warning_min {
            self.episode_start = None;
            GasStatus::Warning
        } else {
            self.episode_start = None;
            GasStatus::Safe
        }
    }

    pub fn status(&self) -> GasStatus {
        self.status
    }

    pub fn raw(&self) -> f64 {
        self.raw
    }

    pub fn filtered(&self) -> f64 {
        self.filtered
    }

    /// Total raw samples ingested over the run.
    pub fn samples_ingested(&self) -> u64 {
        self.samples
    }

    /// Display-only conversion of the filtered ADC count to volts.
    pub fn voltage(&self) -> f64 {
        self.filtered / self.cfg.adc_full_scale as f64 * self.cfg.reference_voltage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(window: u32) -> GasSafetyMonitor {
        GasSafetyMonitor::new(GasConfig {
            sample_rate_hz: window,
            warning_min: 200.0,
            critical_min: 400.0,
            confirmation_time_secs: 2.0,
            ..GasConfig::default()
        })
    }

    /// 10 Hz sampling: sample i lands at t0 + i * 100 ms.
    fn at(base: Instant, i: u32) -> Instant {
        base + Duration::from_millis(100 * i as u64)
    }

    #[test]
    fn filtered_is_window_mean() {
        let mut m = monitor(5);
        let base = Instant::now();
        for i in 0..5 {
            m.update_at(50, at(base, i));
        }
        assert_eq!(m.filtered(), 50.0);
        assert_eq!(m.status(), GasStatus::Safe);
        // window evicts oldest once full
        m.update_at(100, at(base, 5));
        assert_eq!(m.filtered(), 60.0);
    }

    #[test]
    fn confirmation_scenario() {
        // window=5, warning=200, critical=400, confirmation=2s, 10 Hz
        let mut m = monitor(5);
        let base = Instant::now();
        let mut i = 0;
        for _ in 0..5 {
            assert_eq!(m.update_at(50, at(base, i)), GasStatus::Safe);
            i += 1;
        }
        // Feed 2.5 s of 450s. The filter needs a few samples to cross 400;
        // from the first filtered value >= 400 the episode confirms 2.0 s on.
        let mut first_over: Option<u32> = None;
        let mut statuses = Vec::new();
        for _ in 0..25 {
            let s = m.update_at(450, at(base, i));
            if first_over.is_none() && m.filtered() >= 400.0 {
                first_over = Some(i);
            }
            statuses.push((i, s));
            i += 1;
        }
        let over = first_over.expect("filter never crossed critical");
        for (tick, s) in statuses {
            if tick < over {
                assert_ne!(s, GasStatus::Critical);
            } else if (tick - over) * 100 < 2000 {
                assert_eq!(s, GasStatus::Warning, "still confirming at tick {tick}");
            } else {
                assert_eq!(s, GasStatus::Critical, "confirmed at tick {tick}");
            }
        }
        assert_eq!(m.status(), GasStatus::Critical);
    }

    #[test]
    fn single_spike_never_reaches_critical() {
        let mut m = monitor(1); // window of 1: no filter smoothing at all
        let base = Instant::now();
        m.update_at(50, at(base, 0));
        // one huge spike, then immediately back below warning
        assert_ne!(m.update_at(1023, at(base, 1)), GasStatus::Critical);
        for i in 2..40 {
            assert_eq!(m.update_at(50, at(base, i)), GasStatus::Safe);
        }
    }

    #[test]
    fn episode_restart_resets_confirmation() {
        let mut m = monitor(1);
        let base = Instant::now();
        // 1.5 s above critical, then a dip, then above again: the clock must restart
        for i in 0..15 {
            assert_eq!(m.update_at(500, at(base, i)), GasStatus::Warning);
        }
        assert_eq!(m.update_at(100, at(base, 15)), GasStatus::Safe);
        for i in 16..35 {
            assert_eq!(m.update_at(500, at(base, i)), GasStatus::Warning);
        }
        // 2 s after the restart it confirms
        assert_eq!(m.update_at(500, at(base, 36)), GasStatus::Critical);
    }

    #[test]
    fn warning_band_without_critical() {
        let mut m = monitor(1);
        let base = Instant::now();
        for i in 0..50 {
            assert_eq!(m.update_at(250, at(base, i)), GasStatus::Warning);
        }
    }

    #[test]
    fn voltage_conversion() {
        let mut m = monitor(1);
        m.update_at(512, Instant::now());
        assert!((m.voltage() - 512.0 / 1024.0 * 3.3).abs() < 1e-9);
    }
}
