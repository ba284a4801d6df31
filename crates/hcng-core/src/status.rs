//! Read-only status snapshot handed to the display sink on the report cadence.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::anomaly::AnomalyStatus;
use crate::gas::GasStatus;
use crate::source::TelemetryFrame;

#[derive(Debug, Clone, Serialize)]
pub struct GasReadout {
    /// False once the sampling producer has died; the readings below are
    /// then the last ones it delivered.
    pub connected: bool,
    pub raw: f64,
    pub filtered: f64,
    pub voltage: f64,
    pub status: GasStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalyReadout {
    pub score: f64,
    pub status: AnomalyStatus,
    pub inferences: u64,
}

/// Atomically-read copy of every component's most recent state.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub at: DateTime<Utc>,
    /// False when the telemetry subsystem is disabled or its producer died.
    pub telemetry_connected: bool,
    pub telemetry: Option<TelemetryFrame>,
    /// None when the gas subsystem is degraded/disabled.
    pub gas: Option<GasReadout>,
    pub anomaly: Option<AnomalyReadout>,
    pub valve_open: bool,
    pub valve_driven: bool,
    pub emergency: bool,
}

impl StatusSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Presentation-side consumer of snapshots. Implementations must not block
/// for long; the control loop calls this inline on the display cadence.
pub trait DisplaySink: Send {
    fn render(&mut self, snapshot: &StatusSnapshot);
}

/// Sink that drops everything; used when no display is attached.
pub struct NullSink;

impl DisplaySink for NullSink {
    fn render(&mut self, _snapshot: &StatusSnapshot) {}
}
