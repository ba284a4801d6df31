//! Fuel-valve interlock: the one authority over the valve's logical state
//! and the only component that drives the physical actuator.

use std::thread;
use std::time::Duration;

use log::{error, info, warn};
use serde::Serialize;

use crate::source::ValveActuator;

/// Close reason recorded when the interlock trips on a confirmed leak.
pub const EMERGENCY_REASON: &str = "EMERGENCY - gas leak confirmed";

/// Delay before the defensive re-assertion of the closed line.
const REASSERT_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValveState {
    Open,
    Closed,
}

pub struct ValveInterlock {
    actuator: Box<dyn ValveActuator>,
    /// False when the actuator failed to init; state is then logical-only.
    driven: bool,
    state: ValveState,
    close_reason: Option<String>,
    /// Latched when the close was an emergency shutoff.
    emergency: bool,
}

impl ValveInterlock {
    /// Initial state is OPEN and is asserted on the line at construction.
    /// An unavailable actuator degrades the interlock to logical-only
    /// tracking; it never fails construction.
    pub fn new(mut actuator: Box<dyn ValveActuator>) -> Self {
        let driven = match actuator.init() {
            Ok(()) => true,
            Err(e) => {
                error!("valve actuator unavailable, tracking logical state only: {e}");
                false
            }
        };
        let mut interlock = Self {
            actuator,
            driven,
            state: ValveState::Open,
            close_reason: None,
            emergency: false,
        };
        interlock.drive(true);
        interlock
    }

    fn drive(&mut self, open: bool) {
        if self.driven {
            self.actuator.set_line(open);
        } else {
            warn!(
                "valve actuator offline; would drive line {}",
                if open { "OPEN" } else { "CLOSED" }
            );
        }
    }

    /// No-op if already open. Opening while the emergency latch is set is an
    /// out-of-order request: it is logged and the CLOSED output re-asserted
    /// instead, since an ambiguous OPEN is never the safe answer.
    pub fn open(&mut self) {
        if self.emergency {
            error!("refusing to open fuel valve while emergency latch is set");
            self.drive(false);
            return;
        }
        if self.state == ValveState::Open {
            return;
        }
        self.drive(true);
        self.state = ValveState::Open;
        self.close_reason = None;
        info!("fuel valve OPENED");
    }

    /// No-op if already closed; a duplicate request produces no second
    /// transition event.
    pub fn close(&mut self, reason: &str) {
        if self.state == ValveState::Closed {
            return;
        }
        self.drive(false);
        self.state = ValveState::Closed;
        self.close_reason = Some(reason.to_string());
        error!("FUEL VALVE CLOSED - reason: {reason}");
    }

    /// Close with the fixed emergency reason, then re-assert the closed
    /// output shortly after in case the actuator failed to latch on the
    /// first command.
    pub fn emergency_shutoff(&mut self) {
        error!("EMERGENCY FUEL SHUTOFF ACTIVATED");
        self.emergency = true;
        self.close(EMERGENCY_REASON);
        thread::sleep(REASSERT_DELAY);
        self.drive(false);
    }

    pub fn is_open(&self) -> bool {
        self.state == ValveState::Open
    }

    pub fn state(&self) -> ValveState {
        self.state
    }

    pub fn close_reason(&self) -> Option<&str> {
        self.close_reason.as_deref()
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency
    }

    pub fn is_driven(&self) -> bool {
        self.driven
    }

    /// Final deterministic actuation during shutdown: re-open after a clean
    /// run, leave (and re-assert) CLOSED after an emergency, then release
    /// the actuator.
    pub fn release(&mut self) {
        if self.emergency {
            self.drive(false);
        } else {
            self.open();
        }
        self.actuator.release();
        info!("valve actuator released");
    }
}
