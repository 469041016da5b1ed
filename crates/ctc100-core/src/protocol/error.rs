//! Protocol errors

use thiserror::Error;

use super::Completion;

/// Errors that can occur during protocol communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The transport could not be opened
    #[error("Connection to {port} failed: {reason}")]
    ConnectionFailed {
        /// Port name or socket address that was opened
        port: String,
        /// Reason reported by the operating system
        reason: String,
    },

    /// No reading could be extracted from the response to a `.value` query
    #[error("Unable to read from channel {channel} ({completion:?} response: {response:?})")]
    Read {
        /// Fully qualified channel name
        channel: String,
        /// Whether the response carried its terminator
        completion: Completion,
        /// Response text, lossily decoded
        response: String,
    },

    /// The response to a `.value` query was not valid UTF-8
    #[error("Response from channel {channel} is not valid UTF-8")]
    Decode {
        /// Fully qualified channel name
        channel: String,
    },

    /// A configuration file or setting could not be used
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Read or write failure on an open transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
