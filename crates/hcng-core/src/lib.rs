//! HCNG fuel safety interlock core: multi-rate decision loop, gas-leak
//! confirmation, anomaly scoring, and the valve interlock state machine.

pub mod anomaly;
pub mod channel;
pub mod config;
pub mod control;
pub mod error;
pub mod gas;
pub mod source;
pub mod status;
pub mod system;
pub mod valve;

pub use anomaly::*;
pub use channel::*;
pub use config::*;
pub use control::*;
pub use error::*;
pub use gas::*;
pub use source::*;
pub use status::*;
pub use system::*;
pub use valve::*;
