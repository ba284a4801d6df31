//! Console renderers for the periodic status report.

use chrono::Local;
use hcng_core::anomaly::AnomalyStatus;
use hcng_core::gas::GasStatus;
use hcng_core::source::TelemetryChannel;
use hcng_core::status::{DisplaySink, StatusSnapshot};
use log::error;

fn gas_symbol(status: GasStatus) -> &'static str {
    match status {
        GasStatus::Safe => "ok",
        GasStatus::Warning => "WARN",
        GasStatus::Critical => "CRIT",
    }
}

fn anomaly_symbol(status: AnomalyStatus) -> &'static str {
    match status {
        AnomalyStatus::Normal => "ok",
        AnomalyStatus::Warning => "WARN",
        AnomalyStatus::Critical => "CRIT",
    }
}

/// Human-readable block, one per display interval.
pub struct ConsoleDisplay;

impl DisplaySink for ConsoleDisplay {
    fn render(&mut self, snap: &StatusSnapshot) {
        println!("\n{}", "=".repeat(60));
        println!("System Status - {}", Local::now().format("%H:%M:%S"));
        println!("{}", "=".repeat(60));

        println!("Telemetry connected: {}", snap.telemetry_connected);
        if let Some(frame) = &snap.telemetry {
            for ch in [
                TelemetryChannel::Rpm,
                TelemetryChannel::Speed,
                TelemetryChannel::CoolantTemp,
                TelemetryChannel::ThrottlePos,
            ] {
                if let Some(v) = frame.get(ch) {
                    println!("  {:<16}{v:.0}", ch.name());
                }
            }
        }

        match &snap.gas {
            Some(gas) => {
                println!(
                    "\nGas sensor: [{}]{}",
                    gas_symbol(gas.status),
                    if gas.connected { "" } else { " (SIGNAL LOST)" }
                );
                println!("  raw             {:.0}", gas.raw);
                println!("  filtered        {:.1}", gas.filtered);
                println!("  voltage         {:.2} V", gas.voltage);
            }
            None => println!("\nGas sensor: DISABLED"),
        }

        match &snap.anomaly {
            Some(ai) => {
                println!("\nAnomaly: [{}] score {:.3} ({} inferences)",
                    anomaly_symbol(ai.status), ai.score, ai.inferences);
            }
            None => println!("\nAnomaly: DISABLED"),
        }

        println!(
            "\nValve: {}{}",
            if snap.valve_open { "OPEN" } else { "CLOSED" },
            if snap.valve_driven { "" } else { " (logical only)" }
        );
        if snap.emergency {
            println!("\n*** EMERGENCY SHUTDOWN ACTIVE ***");
        }
        println!("{}", "=".repeat(60));
    }
}

/// One JSON object per report, for machine consumption.
pub struct JsonDisplay;

impl DisplaySink for JsonDisplay {
    fn render(&mut self, snap: &StatusSnapshot) {
        match snap.to_json() {
            Ok(line) => println!("{line}"),
            Err(e) => error!("status serialization failed: {e}"),
        }
    }
}
