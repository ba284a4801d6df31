//! The deterministic decision loop.
//!
//! Single-threaded, fixed-tick, multi-rate, cooperative: each sub-task runs
//! when its own interval has elapsed, checked against a monotonic clock, in
//! strict priority order within the tick — gas safety first, then anomaly
//! inference, then the status report. Because the tick period is far below
//! every sub-task interval, reaction to a confirmed leak is bounded by one
//! tick plus one gas-check execution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{error, info};

use crate::anomaly::AnomalyScorer;
use crate::channel::ChannelReader;
use crate::config::{ControlConfig, ValveConfig};
use crate::gas::{GasSafetyMonitor, GasStatus};
use crate::source::TelemetryFrame;
use crate::status::{AnomalyReadout, DisplaySink, GasReadout, StatusSnapshot};
use crate::valve::ValveInterlock;

pub struct ControlLoop {
    cfg: ControlConfig,
    auto_shutoff: bool,
    gas_rx: Option<ChannelReader<u16>>,
    telemetry_rx: Option<ChannelReader<TelemetryFrame>>,
    monitor: GasSafetyMonitor,
    scorer: AnomalyScorer,
    valve: ValveInterlock,
    sink: Box<dyn DisplaySink>,
    /// Process-wide emergency latch: set exactly once per run, never cleared.
    emergency: bool,
    last_gas_check: Option<Instant>,
    last_inference: Option<Instant>,
    last_display: Option<Instant>,
}

impl ControlLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: ControlConfig,
        valve_cfg: &ValveConfig,
        gas_rx: Option<ChannelReader<u16>>,
        telemetry_rx: Option<ChannelReader<TelemetryFrame>>,
        monitor: GasSafetyMonitor,
        scorer: AnomalyScorer,
        valve: ValveInterlock,
        sink: Box<dyn DisplaySink>,
    ) -> Self {
        Self {
            cfg,
            auto_shutoff: valve_cfg.auto_shutoff,
            gas_rx,
            telemetry_rx,
            monitor,
            scorer,
            valve,
            sink,
            emergency: false,
            last_gas_check: None,
            last_inference: None,
            last_display: None,
        }
    }

    fn due(last: Option<Instant>, now: Instant, interval_ms: u64) -> bool {
        match last {
            Some(t) => now.duration_since(t) >= Duration::from_millis(interval_ms),
            None => true,
        }
    }

    /// One scheduler tick at `now`. Exposed so tests can drive the schedule
    /// with fabricated instants.
    pub fn tick_at(&mut self, now: Instant) {
        // PRIORITY 1: gas safety. Evaluated, and its emergency decision fully
        // applied, before anything else in the tick. Once the emergency is
        // latched the decision is final and the check stops; the monitor
        // keeps its confirmed status for the reports.
        if !self.emergency && Self::due(self.last_gas_check, now, self.cfg.gas_interval_ms) {
            self.check_gas();
            self.last_gas_check = Some(now);
        }

        // PRIORITY 2: anomaly inference. Suspended once the emergency is
        // latched; only status reporting continues.
        if !self.emergency && Self::due(self.last_inference, now, self.scorer.interval_ms()) {
            self.run_inference();
            self.last_inference = Some(now);
        }

        // PRIORITY 3: status report.
        if Self::due(self.last_display, now, self.cfg.display_interval_ms) {
            self.report();
            self.last_display = Some(now);
        }
    }

    fn check_gas(&mut self) {
        let Some(rx) = &self.gas_rx else { return };

        // Feed everything the sensor produced since the last check, each
        // sample stamped with the time it was taken, so neither the window
        // span nor the confirmation clock depends on the check cadence.
        for sample in rx.drain() {
            self.monitor.update_at(sample.value, sample.at);
        }

        if self.monitor.status() == GasStatus::Critical && self.auto_shutoff && !self.emergency {
            error!("EMERGENCY GAS LEAK - SHUTOFF");
            self.valve.emergency_shutoff();
            self.emergency = true;
        }
    }

    fn run_inference(&mut self) {
        let Some(rx) = &self.telemetry_rx else { return };
        // A dead producer leaves a frozen frame behind; never score it.
        if !rx.is_live() {
            return;
        }
        // Only score once at least one telemetry sample has arrived.
        let Some(sample) = rx.latest() else { return };
        self.scorer.score(&sample.value);
    }

    fn report(&mut self) {
        let snapshot = self.snapshot();
        self.sink.render(&snapshot);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let telemetry = self
            .telemetry_rx
            .as_ref()
            .and_then(|rx| rx.latest())
            .map(|s| s.value);
        let gas = self.gas_rx.as_ref().map(|rx| GasReadout {
            connected: rx.is_live(),
            raw: self.monitor.raw(),
            filtered: self.monitor.filtered(),
            voltage: self.monitor.voltage(),
            status: self.monitor.status(),
        });
        let anomaly = self.telemetry_rx.as_ref().map(|_| {
            let latest = self.scorer.latest();
            AnomalyReadout {
                score: latest.score,
                status: latest.status,
                inferences: self.scorer.inferences(),
            }
        });
        StatusSnapshot {
            at: Utc::now(),
            telemetry_connected: self.telemetry_rx.as_ref().is_some_and(|rx| rx.is_live()),
            telemetry,
            gas,
            anomaly,
            valve_open: self.valve.is_open(),
            valve_driven: self.valve.is_driven(),
            emergency: self.emergency,
        }
    }

    /// Drive ticks until `running` clears. A panicking downstream component
    /// is the only way out besides the flag; per-tick errors are contained
    /// in the sub-tasks, which log and leave the loop to its next tick.
    pub fn run(&mut self, running: &AtomicBool) {
        info!(
            "control loop started (tick {} ms, gas {} ms, ai {} ms, display {} ms)",
            self.cfg.tick_ms,
            self.cfg.gas_interval_ms,
            self.scorer.interval_ms(),
            self.cfg.display_interval_ms
        );
        let tick = Duration::from_millis(self.cfg.tick_ms);
        while running.load(Ordering::Relaxed) {
            let t0 = Instant::now();
            self.tick_at(t0);
            let elapsed = t0.elapsed();
            if elapsed < tick {
                thread::sleep(tick - elapsed);
            }
        }
        info!("control loop ended");
    }

    pub fn emergency(&self) -> bool {
        self.emergency
    }

    /// Shutdown epilogue: emit one final status report, then drive the valve
    /// line to its deterministic final state and release the actuator.
    pub fn finish(&mut self) {
        self.report();
        self.valve.release();
    }
}
