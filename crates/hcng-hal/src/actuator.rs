//! Valve actuator backends.

use hcng_core::error::SourceError;
use hcng_core::source::ValveActuator;
use log::info;

/// Stand-in for the GPIO-driven solenoid: reports every line change.
#[derive(Default)]
pub struct LogActuator {
    line_open: Option<bool>,
}

impl ValveActuator for LogActuator {
    fn init(&mut self) -> Result<(), SourceError> {
        info!("sim valve actuator ready");
        Ok(())
    }

    fn set_line(&mut self, open: bool) {
        if self.line_open != Some(open) {
            info!("valve line driven {}", if open { "OPEN" } else { "CLOSED" });
        }
        self.line_open = Some(open);
    }

    fn release(&mut self) {
        info!("valve line released");
        self.line_open = None;
    }
}

/// Actuator whose hardware is absent; init always fails so the interlock
/// exercises its logical-only degraded mode.
pub struct AbsentActuator;

impl ValveActuator for AbsentActuator {
    fn init(&mut self) -> Result<(), SourceError> {
        Err(SourceError::Unavailable("valve hardware not present".into()))
    }

    fn set_line(&mut self, _open: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_actuator_is_idempotent() {
        let mut a = LogActuator::default();
        a.init().unwrap();
        // callable repeatedly, including before any open
        a.set_line(false);
        a.set_line(false);
        a.set_line(true);
        assert_eq!(a.line_open, Some(true));
    }

    #[test]
    fn absent_actuator_fails_init() {
        assert!(AbsentActuator.init().is_err());
    }
}
