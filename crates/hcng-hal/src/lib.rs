//! Simulated hardware backends for the interlock core.
//!
//! The real vehicle carries an SPI ADC, an OBD-II dongle and a GPIO-driven
//! solenoid; these stand-ins honor the same trait contracts so the core is
//! exercised end to end without the bench.

pub mod actuator;
pub mod gas_probe;
pub mod telemetry;

pub use actuator::*;
pub use gas_probe::*;
pub use telemetry::*;
