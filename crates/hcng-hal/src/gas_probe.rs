//! Simulated 10-bit gas-concentration ADC with a scriptable leak profile.

use std::time::{Duration, Instant};

use hcng_core::error::SourceError;
use hcng_core::source::GasProbe;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Step change injected into the simulated signal.
#[derive(Debug, Clone, Copy)]
pub struct LeakProfile {
    /// Time after `open` at which the leak begins.
    pub after: Duration,
    /// Plateau ADC level once leaking.
    pub level: u16,
}

pub struct SimGasProbe {
    rng: StdRng,
    baseline: u16,
    noise: u16,
    leak: Option<LeakProfile>,
    opened_at: Option<Instant>,
}

impl SimGasProbe {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            baseline: 60,
            noise: 10,
            leak: None,
            opened_at: None,
        }
    }

    pub fn with_leak(mut self, profile: LeakProfile) -> Self {
        self.leak = Some(profile);
        self
    }
}

impl GasProbe for SimGasProbe {
    fn open(&mut self) -> Result<(), SourceError> {
        self.opened_at = Some(Instant::now());
        info!("sim gas probe online (baseline {})", self.baseline);
        Ok(())
    }

    fn read_raw(&mut self) -> Result<u16, SourceError> {
        let opened = self
            .opened_at
            .ok_or_else(|| SourceError::Unavailable("probe not opened".into()))?;
        let level = match self.leak {
            Some(p) if opened.elapsed() >= p.after => p.level,
            _ => self.baseline,
        };
        let jitter = self.rng.gen_range(0..=self.noise * 2) as i32 - self.noise as i32;
        let value = (level as i32 + jitter).clamp(0, 1023);
        Ok(value as u16)
    }

    fn close(&mut self) {
        self.opened_at = None;
    }
}
