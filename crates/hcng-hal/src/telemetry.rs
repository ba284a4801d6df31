//! Simulated OBD-II style telemetry bus producing plausible cruising values.

use hcng_core::error::SourceError;
use hcng_core::source::{TelemetryChannel, TelemetrySource};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct SimTelemetry {
    rng: StdRng,
    connected: bool,
}

impl SimTelemetry {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            connected: false,
        }
    }

    fn base(channel: TelemetryChannel) -> f64 {
        match channel {
            TelemetryChannel::Rpm => 3000.0,
            TelemetryChannel::Speed => 100.0,
            TelemetryChannel::CoolantTemp => 60.0,
            TelemetryChannel::ThrottlePos => 50.0,
            TelemetryChannel::IntakePressure => 127.0,
            TelemetryChannel::EngineLoad => 50.0,
        }
    }

    fn spread(channel: TelemetryChannel) -> f64 {
        match channel {
            TelemetryChannel::Rpm => 150.0,
            TelemetryChannel::Speed => 5.0,
            TelemetryChannel::CoolantTemp => 2.0,
            TelemetryChannel::ThrottlePos => 4.0,
            TelemetryChannel::IntakePressure => 6.0,
            TelemetryChannel::EngineLoad => 4.0,
        }
    }
}

impl TelemetrySource for SimTelemetry {
    fn connect(&mut self) -> Result<(), SourceError> {
        self.connected = true;
        info!("sim telemetry bus connected");
        Ok(())
    }

    fn query(&mut self, channel: TelemetryChannel) -> Option<f64> {
        if !self.connected {
            return None;
        }
        let spread = Self::spread(channel);
        Some(Self::base(channel) + self.rng.gen_range(-spread..=spread))
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}
