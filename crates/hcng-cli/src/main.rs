//! HCNG safety interlock monitor.
//!
//! Wires the simulated sources to the core, runs the decision loop until
//! Ctrl-C (or a fixed duration), then performs the ordered shutdown.

mod display;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::{error, info};

use hcng_core::config::SystemConfig;
use hcng_core::source::ValveActuator;
use hcng_core::status::DisplaySink;
use hcng_core::system::System;
use hcng_hal::{AbsentActuator, LeakProfile, LogActuator, SimGasProbe, SimTelemetry};

use display::{ConsoleDisplay, JsonDisplay};

#[derive(Parser, Debug)]
#[command(name = "hcng-monitor", about = "HCNG fuel safety interlock (simulated bench)")]
struct Args {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop automatically after this many seconds.
    #[arg(long)]
    duration: Option<u64>,

    /// Inject a simulated leak this many seconds after start.
    #[arg(long)]
    leak_after: Option<f64>,

    /// ADC plateau of the injected leak.
    #[arg(long, default_value_t = 600)]
    leak_level: u16,

    /// Seed for the simulated sources.
    #[arg(long, default_value_t = 0)]
    sim_seed: u64,

    /// Pretend the valve hardware is absent (degraded interlock).
    #[arg(long)]
    no_valve: bool,

    /// Emit status reports as JSON lines instead of the console block.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => match SystemConfig::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => SystemConfig::default(),
    };

    let mut probe = SimGasProbe::new(args.sim_seed);
    if let Some(after) = args.leak_after {
        probe = probe.with_leak(LeakProfile {
            after: Duration::from_secs_f64(after),
            level: args.leak_level,
        });
        info!(
            "leak injection armed: level {} after {:.1} s",
            args.leak_level, after
        );
    }
    let telemetry = SimTelemetry::new(args.sim_seed.wrapping_add(1));
    let actuator: Box<dyn ValveActuator> = if args.no_valve {
        Box::new(AbsentActuator)
    } else {
        Box::new(LogActuator::default())
    };
    let sink: Box<dyn DisplaySink> = if args.json {
        Box::new(JsonDisplay)
    } else {
        Box::new(ConsoleDisplay)
    };

    let running = Arc::new(AtomicBool::new(true));

    let ctrlc_flag = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("stop signal received");
        ctrlc_flag.store(false, Ordering::Relaxed);
    }) {
        error!("failed to install signal handler: {e}");
        return ExitCode::FAILURE;
    }

    if let Some(secs) = args.duration {
        let timer_flag = running.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            timer_flag.store(false, Ordering::Relaxed);
        });
    }

    let mut system = System::start(cfg, probe, telemetry, actuator, sink);
    info!("system running; press Ctrl-C to stop");
    system.run(&running);

    let emergency = system.emergency();
    system.stop();

    if emergency {
        info!("run ended with emergency shutoff latched");
    }
    ExitCode::SUCCESS
}
