//! Collaborator seams: telemetry bus, raw gas probe, valve actuator.
//!
//! The core only ever talks to hardware through these traits; `hcng-hal`
//! supplies the concrete (simulated) implementations.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::channel::SampleSource;
use crate::error::SourceError;

/// The fixed telemetry channel set queried every sampling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryChannel {
    Rpm,
    Speed,
    CoolantTemp,
    ThrottlePos,
    IntakePressure,
    EngineLoad,
}

impl TelemetryChannel {
    pub const ALL: [TelemetryChannel; 6] = [
        TelemetryChannel::Rpm,
        TelemetryChannel::Speed,
        TelemetryChannel::CoolantTemp,
        TelemetryChannel::ThrottlePos,
        TelemetryChannel::IntakePressure,
        TelemetryChannel::EngineLoad,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TelemetryChannel::Rpm => "rpm",
            TelemetryChannel::Speed => "speed",
            TelemetryChannel::CoolantTemp => "coolant_temp",
            TelemetryChannel::ThrottlePos => "throttle_pos",
            TelemetryChannel::IntakePressure => "intake_pressure",
            TelemetryChannel::EngineLoad => "engine_load",
        }
    }
}

/// One polling cycle's worth of telemetry. Channels whose query failed are
/// simply absent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TelemetryFrame {
    values: HashMap<TelemetryChannel, f64>,
}

impl TelemetryFrame {
    pub fn insert(&mut self, channel: TelemetryChannel, value: f64) {
        self.values.insert(channel, value);
    }

    pub fn get(&self, channel: TelemetryChannel) -> Option<f64> {
        self.values.get(&channel).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Vehicle telemetry bus (OBD-II style named numeric channels).
pub trait TelemetrySource: Send + 'static {
    fn connect(&mut self) -> Result<(), SourceError>;
    /// A failed single-channel query is non-fatal; the channel is omitted
    /// from the frame.
    fn query(&mut self, channel: TelemetryChannel) -> Option<f64>;
    fn disconnect(&mut self) {}
}

/// Raw gas-concentration source, e.g. a 10-bit ADC (0..=1023).
pub trait GasProbe: Send + 'static {
    fn open(&mut self) -> Result<(), SourceError>;
    fn read_raw(&mut self) -> Result<u16, SourceError>;
    fn close(&mut self) {}
}

/// Physical fuel-valve line. `set_line` must be idempotent and callable even
/// if the line was never driven before.
pub trait ValveActuator: Send {
    fn init(&mut self) -> Result<(), SourceError>;
    fn set_line(&mut self, open: bool);
    fn release(&mut self) {}
}

/// Adapts a [`GasProbe`] to the sampled-channel producer contract.
pub struct GasSampler<P: GasProbe> {
    probe: P,
}

impl<P: GasProbe> GasSampler<P> {
    pub fn new(probe: P) -> Self {
        Self { probe }
    }
}

impl<P: GasProbe> SampleSource<u16> for GasSampler<P> {
    fn open(&mut self) -> Result<(), SourceError> {
        self.probe.open()
    }

    fn read(&mut self) -> Result<u16, SourceError> {
        self.probe.read_raw()
    }

    fn close(&mut self) {
        self.probe.close();
    }
}

/// Adapts a [`TelemetrySource`] to the sampled-channel producer contract by
/// polling the whole channel set per cycle.
pub struct TelemetryPoller<S: TelemetrySource> {
    source: S,
}

impl<S: TelemetrySource> TelemetryPoller<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: TelemetrySource> SampleSource<TelemetryFrame> for TelemetryPoller<S> {
    fn open(&mut self) -> Result<(), SourceError> {
        self.source.connect()
    }

    fn read(&mut self) -> Result<TelemetryFrame, SourceError> {
        let mut frame = TelemetryFrame::default();
        for channel in TelemetryChannel::ALL {
            match self.source.query(channel) {
                Some(v) => frame.insert(channel, v),
                None => debug!("telemetry: {} query returned nothing", channel.name()),
            }
        }
        if frame.is_empty() {
            // Nothing answered this cycle; treat as a transient outage so the
            // producer backs off instead of publishing an empty frame.
            return Err(SourceError::Transient("no telemetry channels answered".into()));
        }
        Ok(frame)
    }

    fn close(&mut self) {
        self.source.disconnect();
    }
}
