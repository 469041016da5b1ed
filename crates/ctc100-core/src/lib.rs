//! # CTC100 Core Library
//!
//! Host-side driver for the CTC100 programmable temperature controller.
//!
//! This library provides:
//! - The newline/CRLF framed text protocol over a serial port or TCP bridge
//! - Command formatting for queries, assignments and increments
//! - Tolerant extraction of readings from terse or verbose replies
//! - Alarm, heater, PID, setpoint and auto-tuning operations
//! - A simulated controller for running without hardware
//!
//! ## Example
//!
//! ```rust,ignore
//! use ctc100_core::protocol::{Connection, ConnectionConfig};
//!
//! let mut ctc = Connection::open(ConnectionConfig::new("/dev/ttyACM0"))?;
//! let kelvin = ctc.read_numeric(1u32)?;
//! println!("In1: {} K", kelvin);
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod demo;
pub mod instrument;
pub mod protocol;
pub mod unit_conversion;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::demo::DemoController;
    pub use crate::instrument::{TuneOutcome, TuneParams, TuneReport};
    pub use crate::protocol::{
        ChannelRef, Command, Completion, Connection, ConnectionConfig, ProtocolError, Response,
        Transport,
    };
    pub use crate::unit_conversion::TemperatureUnit;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
