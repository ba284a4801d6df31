//! System assembly and lifecycle.
//!
//! One explicitly constructed context owning the producer channels and the
//! control loop; no ambient singletons. Startup order follows subsystem
//! priority (valve first), and every source failure degrades that subsystem
//! instead of aborting the run.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use log::{info, warn};

use crate::anomaly::AnomalyScorer;
use crate::channel::SampledChannel;
use crate::config::SystemConfig;
use crate::control::ControlLoop;
use crate::gas::GasSafetyMonitor;
use crate::source::{GasProbe, GasSampler, TelemetryFrame, TelemetryPoller, TelemetrySource, ValveActuator};
use crate::status::DisplaySink;
use crate::valve::ValveInterlock;

/// How long `stop` waits for each producer thread to exit.
const CHANNEL_GRACE: Duration = Duration::from_secs(2);

pub struct System {
    gas_channel: Option<SampledChannel<u16>>,
    telemetry_channel: Option<SampledChannel<TelemetryFrame>>,
    ctrl: ControlLoop,
}

impl System {
    /// Bring every subsystem up. Never fails outright: an unavailable gas
    /// probe or telemetry bus leaves that subsystem disabled and the rest
    /// running.
    pub fn start(
        cfg: SystemConfig,
        gas_probe: impl GasProbe,
        telemetry: impl TelemetrySource,
        actuator: Box<dyn ValveActuator>,
        sink: Box<dyn DisplaySink>,
    ) -> Self {
        // 1. Valve interlock first: the safe output must exist before any
        //    decision can want it.
        info!("initializing valve interlock");
        let valve = ValveInterlock::new(actuator);

        // 2. Gas sampling.
        info!("initializing gas sensor");
        let gas_period = Duration::from_secs_f64(1.0 / cfg.gas.sample_rate_hz as f64);
        let gas_channel =
            match SampledChannel::start("gas", GasSampler::new(gas_probe), gas_period, CHANNEL_GRACE)
            {
                Ok(ch) => Some(ch),
                Err(e) => {
                    warn!("gas sensor failed to start, leak monitoring disabled: {e}");
                    None
                }
            };

        // 3. Telemetry polling.
        info!("initializing telemetry interface");
        let telemetry_period = Duration::from_secs_f64(1.0 / cfg.telemetry.sample_rate_hz);
        let telemetry_channel = match SampledChannel::start(
            "telemetry",
            TelemetryPoller::new(telemetry),
            telemetry_period,
            CHANNEL_GRACE,
        ) {
            Ok(ch) => Some(ch),
            Err(e) => {
                warn!("telemetry connection failed, anomaly scoring disabled: {e}");
                None
            }
        };

        let ctrl = ControlLoop::new(
            cfg.control.clone(),
            &cfg.valve,
            gas_channel.as_ref().map(|ch| ch.reader()),
            telemetry_channel.as_ref().map(|ch| ch.reader()),
            GasSafetyMonitor::new(cfg.gas.clone()),
            AnomalyScorer::new(cfg.anomaly.clone()),
            valve,
            sink,
        );

        info!("all components initialized");
        Self {
            gas_channel,
            telemetry_channel,
            ctrl,
        }
    }

    /// Run the decision loop on the calling thread until `running` clears.
    pub fn run(&mut self, running: &AtomicBool) {
        self.ctrl.run(running);
    }

    pub fn emergency(&self) -> bool {
        self.ctrl.emergency()
    }

    /// Ordered shutdown: stop the producers (bounded grace each), then emit
    /// the final status report and drive the valve line to its deterministic
    /// final state. The valve step runs regardless of whether the producer
    /// threads exited in time.
    pub fn stop(mut self) {
        info!("stopping system");
        if let Some(ch) = self.gas_channel.take() {
            ch.stop();
        }
        if let Some(ch) = self.telemetry_channel.take() {
            ch.stop();
        }
        self.ctrl.finish();
        info!("system stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::source::TelemetryChannel;
    use crate::status::NullSink;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    struct DeadProbe;

    impl GasProbe for DeadProbe {
        fn open(&mut self) -> Result<(), SourceError> {
            Err(SourceError::Unavailable("no spi".into()))
        }

        fn read_raw(&mut self) -> Result<u16, SourceError> {
            Err(SourceError::Unavailable("no spi".into()))
        }
    }

    struct QuietProbe;

    impl GasProbe for QuietProbe {
        fn open(&mut self) -> Result<(), SourceError> {
            Ok(())
        }

        fn read_raw(&mut self) -> Result<u16, SourceError> {
            Ok(50)
        }
    }

    struct SteadyBus;

    impl TelemetrySource for SteadyBus {
        fn connect(&mut self) -> Result<(), SourceError> {
            Ok(())
        }

        fn query(&mut self, channel: TelemetryChannel) -> Option<f64> {
            match channel {
                TelemetryChannel::Rpm => Some(3000.0),
                _ => Some(50.0),
            }
        }
    }

    struct NoopActuator;

    impl ValveActuator for NoopActuator {
        fn init(&mut self) -> Result<(), SourceError> {
            Ok(())
        }

        fn set_line(&mut self, _open: bool) {}
    }

    #[test]
    fn degraded_gas_probe_does_not_abort_startup() {
        let system = System::start(
            SystemConfig::default(),
            DeadProbe,
            SteadyBus,
            Box::new(NoopActuator),
            Box::new(NullSink),
        );
        assert!(system.gas_channel.is_none());
        assert!(system.telemetry_channel.is_some());
        system.stop();
    }

    #[test]
    fn clean_run_start_stop() {
        let mut system = System::start(
            SystemConfig::default(),
            QuietProbe,
            SteadyBus,
            Box::new(NoopActuator),
            Box::new(NullSink),
        );
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            flag.store(false, Ordering::Relaxed);
        });
        system.run(&running);
        stopper.join().unwrap();
        assert!(!system.emergency());
        system.stop();
    }
}
