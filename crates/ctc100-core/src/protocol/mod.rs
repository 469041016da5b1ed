//! Serial Protocol Communication
//!
//! Implements the CTC100 text protocol: newline-terminated commands and
//! CRLF-terminated responses over a byte stream.
//!
//! Responses are not length-prefixed, so the only frame boundary is the
//! trailing `\r\n`. A response that never produces one is cut off by the
//! response timeout and handed back tagged as [`Completion::TimedOut`].

pub mod command;
mod connection;
mod error;
mod response;
pub mod serial;
pub mod stream;

pub use command::{
    format_assignment, format_increment, format_query, resolve_channel, ChannelRef, Command,
};
pub use connection::{Connection, ConnectionConfig, Counters};
pub use error::ProtocolError;
pub use response::{parse_reading, Completion, Response};
pub use serial::{open_port, SerialSettings};
pub use stream::{SerialTransport, TcpTransport, Transport};

/// Default baud rate of the CTC100 USB serial interface
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default time to wait for a terminated response, in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Default sleep between empty reads while waiting for a response
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1;

/// Byte appended to every command
pub const COMMAND_TERMINATOR: u8 = b'\n';

/// Sequence that ends every complete response
pub const RESPONSE_TERMINATOR: &[u8] = b"\r\n";
