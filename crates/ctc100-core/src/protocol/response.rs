//! Responses and reading extraction

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::Utf8Error;
use std::sync::OnceLock;

use super::RESPONSE_TERMINATOR;

/// Signed decimal with a mandatory fractional part; the integer part may be empty
const READING_PATTERN: &str = r"[-+]?[0-9]*\.[0-9]+";

/// How the wait for a response ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completion {
    /// The response ended with CRLF
    Complete,
    /// The response timeout elapsed before a CRLF arrived
    TimedOut,
}

/// Raw bytes returned by the controller for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    bytes: Vec<u8>,
    completion: Completion,
}

/// True once the buffer holds at least two bytes and ends with CRLF.
///
/// A lone `\n` never counts.
pub fn is_terminated(buf: &[u8]) -> bool {
    buf.len() >= RESPONSE_TERMINATOR.len() && buf.ends_with(RESPONSE_TERMINATOR)
}

impl Response {
    pub fn new(bytes: Vec<u8>, completion: Completion) -> Self {
        Self { bytes, completion }
    }

    /// Raw bytes, terminator included when present
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn completion(&self) -> Completion {
        self.completion
    }

    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Complete
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Decode as UTF-8
    pub fn text(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }

    /// Decode as UTF-8, replacing invalid sequences
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

fn reading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(READING_PATTERN).expect("reading pattern is a valid regex"))
}

/// Extract the first decimal reading from response text.
///
/// The controller may prefix the number with a label or follow it with units
/// when verbose mode is on, so the whole text is scanned rather than parsed.
pub fn parse_reading(text: &str) -> Option<f64> {
    reading_regex()
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}
