//! Instrument operations
//!
//! Fixed command sequences for alarms, the heater output, PID control and
//! PID auto-tuning. Each one is a handful of assignments and queries through
//! [`Connection`](crate::protocol::Connection); none of them retry.

mod alarm;
mod pid;
mod tune;

pub use alarm::{ALARM_MODE_ARMED, ALARM_SOUND};
pub use tune::{TuneOutcome, TuneParams, TuneReport};

/// Name of an output channel by number (`Out<n>`)
pub fn output_name(output: u32) -> String {
    format!("Out{}", output)
}
