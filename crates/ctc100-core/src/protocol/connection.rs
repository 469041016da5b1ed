//! Connection management
//!
//! Owns the transport for its whole lifetime and runs the command/response
//! exchange with the controller. Only one command is ever in flight: every
//! operation takes `&mut self` and returns once the response is complete or
//! the response timeout has elapsed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{
    parse_reading, resolve_channel,
    response::is_terminated,
    stream::{SerialTransport, TcpTransport, Transport},
    ChannelRef, Command, Completion, ProtocolError, Response, SerialSettings, COMMAND_TERMINATOR,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_MS,
};

/// How long to wait for a TCP bridge to accept the connection
const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Serial port name (e.g. "/dev/ttyACM0" or "COM3")
    pub port_name: String,
    /// Line settings used when opening the serial port
    pub serial: SerialSettings,
    /// Response timeout in milliseconds
    pub timeout_ms: u64,
    /// Sleep between empty reads in milliseconds (0 spins)
    pub poll_interval_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            serial: SerialSettings::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl ConnectionConfig {
    /// Default configuration for the named port
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProtocolError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ProtocolError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        config.serial.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Cumulative traffic on a connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Bytes written, terminators included
    pub tx_bytes: u64,
    /// Bytes received
    pub rx_bytes: u64,
    /// Commands sent
    pub commands: u64,
    /// Responses that ended with CRLF
    pub complete_responses: u64,
    /// Responses cut off by the timeout
    pub timeouts: u64,
}

/// Connection to a CTC100
pub struct Connection {
    /// Byte pipe to the controller
    transport: Box<dyn Transport>,
    /// Connection configuration
    config: ConnectionConfig,
    /// Traffic counters
    counters: Counters,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Open the serial port named in `config`
    pub fn open(config: ConnectionConfig) -> Result<Self, ProtocolError> {
        let transport = SerialTransport::open(&config.port_name, &config.serial)?;
        info!(port = %config.port_name, baud = config.serial.baud_rate, "connected");
        Ok(Self::with_transport(transport, config))
    }

    /// Connect through a serial-to-ethernet bridge at `addr`
    pub fn open_tcp(addr: &str, config: ConnectionConfig) -> Result<Self, ProtocolError> {
        let transport = TcpTransport::connect(addr, TCP_CONNECT_TIMEOUT)?;
        info!(%addr, "connected");
        Ok(Self::with_transport(transport, config))
    }

    /// Wrap an already open transport
    pub fn with_transport(transport: impl Transport + 'static, config: ConnectionConfig) -> Self {
        Self {
            transport: Box::new(transport),
            config,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Get cumulative traffic counters
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Send one command and collect its response.
    ///
    /// A newline is appended to `command`. Bytes are accumulated until the
    /// buffer ends with CRLF or the response timeout elapses. Each pass
    /// appends what was read, then checks the terminator, then the deadline,
    /// so a terminator arriving on the last read still completes.
    ///
    /// A timeout is not an error: the bytes gathered so far come back tagged
    /// [`Completion::TimedOut`], possibly empty.
    pub fn send_and_await_response(&mut self, command: &str) -> Result<Response, ProtocolError> {
        let mut bytes = Vec::with_capacity(command.len() + 1);
        bytes.extend_from_slice(command.as_bytes());
        bytes.push(COMMAND_TERMINATOR);

        self.transport.write_bytes(&bytes)?;
        self.counters.tx_bytes = self.counters.tx_bytes.saturating_add(bytes.len() as u64);
        self.counters.commands = self.counters.commands.saturating_add(1);
        debug!(command, "sent command");

        let timeout = self.config.timeout();
        let poll_interval = self.config.poll_interval();
        let mut response = Vec::new();
        let start = Instant::now();

        let completion = loop {
            let chunk = self.transport.read_available()?;
            let idle = chunk.is_empty();
            response.extend_from_slice(&chunk);

            if is_terminated(&response) {
                break Completion::Complete;
            }
            if start.elapsed() > timeout {
                break Completion::TimedOut;
            }
            if idle && !poll_interval.is_zero() {
                // Never sleep past the deadline
                std::thread::sleep(poll_interval.min(timeout.saturating_sub(start.elapsed())));
            }
        };

        self.counters.rx_bytes = self.counters.rx_bytes.saturating_add(response.len() as u64);
        match completion {
            Completion::Complete => {
                self.counters.complete_responses =
                    self.counters.complete_responses.saturating_add(1);
                debug!(
                    command,
                    response = %String::from_utf8_lossy(&response).trim_end(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "received response"
                );
            }
            Completion::TimedOut => {
                self.counters.timeouts = self.counters.timeouts.saturating_add(1);
                warn!(
                    command,
                    received = response.len(),
                    timeout_ms = timeout.as_millis() as u64,
                    "no response terminator before timeout"
                );
            }
        }

        Ok(Response::new(response, completion))
    }

    /// Send a built command
    pub fn execute(&mut self, command: &Command) -> Result<Response, ProtocolError> {
        self.send_and_await_response(&command.text())
    }

    /// Send a fixed command verbatim (e.g. `outputEnable on`)
    pub fn write(&mut self, command: &str) -> Result<Response, ProtocolError> {
        self.execute(&Command::literal(command))
    }

    /// Query a variable
    pub fn get_variable(&mut self, variable: &str) -> Result<Response, ProtocolError> {
        self.execute(&Command::query(variable))
    }

    /// Set a variable
    pub fn set_variable(
        &mut self,
        variable: &str,
        value: impl fmt::Display,
    ) -> Result<Response, ProtocolError> {
        self.execute(&Command::assign(variable, value))
    }

    /// Add an amount to a variable
    pub fn increment_variable(
        &mut self,
        variable: &str,
        value: impl fmt::Display,
    ) -> Result<Response, ProtocolError> {
        self.execute(&Command::increment(variable, value))
    }

    /// Read the value of a channel.
    ///
    /// Input channels can be given by number; renamed inputs and outputs
    /// need their full name. The reply is scanned for the first decimal
    /// number, which tolerates labels and units added in verbose mode.
    pub fn read_numeric(&mut self, channel: impl Into<ChannelRef>) -> Result<f64, ProtocolError> {
        let channel = resolve_channel(&channel.into());
        let response = self.get_variable(&format!("{}.value", channel))?;

        let text = match response.text() {
            Ok(text) => text,
            Err(_) => return Err(ProtocolError::Decode { channel }),
        };

        match parse_reading(text) {
            Some(value) => Ok(value),
            None => Err(ProtocolError::Read {
                channel,
                completion: response.completion(),
                response: text.to_string(),
            }),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        debug!(counters = ?self.counters, "closing connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// Replays canned reads and records writes
    struct ReplayTransport {
        reads: VecDeque<Vec<u8>>,
        written: Vec<u8>,
    }

    impl ReplayTransport {
        fn new(reads: &[&[u8]]) -> Self {
            Self {
                reads: reads.iter().map(|r| r.to_vec()).collect(),
                written: Vec::new(),
            }
        }
    }

    impl Transport for ReplayTransport {
        fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
            self.written.extend_from_slice(data);
            Ok(())
        }

        fn read_available(&mut self) -> io::Result<Vec<u8>> {
            Ok(self.reads.pop_front().unwrap_or_default())
        }
    }

    #[test]
    fn test_connection_config_default() {
        let config = ConnectionConfig::default();
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.timeout(), Duration::from_millis(100));
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_lone_newline_does_not_terminate() {
        let transport = ReplayTransport::new(&[b"\n", b"\r\n"]);
        let mut conn = Connection::with_transport(transport, ConnectionConfig::default());

        let response = conn.send_and_await_response("x?").unwrap();
        assert_eq!(response.bytes(), b"\n\r\n");
        assert!(response.is_complete());
    }

    /// Hands out its reads in order, sleeping first where a delay is given
    struct DelayedTransport {
        reads: VecDeque<(Duration, Vec<u8>)>,
    }

    impl Transport for DelayedTransport {
        fn write_bytes(&mut self, _data: &[u8]) -> io::Result<()> {
            Ok(())
        }

        fn read_available(&mut self) -> io::Result<Vec<u8>> {
            match self.reads.pop_front() {
                Some((delay, bytes)) => {
                    std::thread::sleep(delay);
                    Ok(bytes)
                }
                None => Ok(Vec::new()),
            }
        }
    }

    #[test]
    fn test_terminator_on_read_past_deadline_completes() {
        let transport = DelayedTransport {
            reads: VecDeque::from(vec![
                (Duration::ZERO, b"23.841".to_vec()),
                (Duration::from_millis(150), b"\r\n".to_vec()),
            ]),
        };
        let mut conn = Connection::with_transport(transport, ConnectionConfig::default());

        let start = Instant::now();
        let response = conn.send_and_await_response("In1.value?").unwrap();
        assert!(start.elapsed() > conn.config().timeout());
        assert_eq!(response.bytes(), b"23.841\r\n");
        assert_eq!(response.completion(), Completion::Complete);
    }

    #[test]
    fn test_idle_sleep_capped_by_deadline() {
        let config = ConnectionConfig {
            timeout_ms: 20,
            poll_interval_ms: 2_000,
            ..Default::default()
        };
        let mut conn = Connection::with_transport(ReplayTransport::new(&[]), config);

        let start = Instant::now();
        let response = conn.send_and_await_response("x?").unwrap();
        assert_eq!(response.completion(), Completion::TimedOut);
        assert!(start.elapsed() < Duration::from_millis(500), "took {:?}", start.elapsed());
    }

    #[test]
    fn test_counters() {
        let transport = ReplayTransport::new(&[b"1.0\r\n"]);
        let mut conn = Connection::with_transport(transport, ConnectionConfig::default());

        conn.get_variable("In1.value").unwrap();
        let counters = conn.counters();
        assert_eq!(counters.tx_bytes, b"In1.value?\n".len() as u64);
        assert_eq!(counters.rx_bytes, 5);
        assert_eq!(counters.commands, 1);
        assert_eq!(counters.complete_responses, 1);
        assert_eq!(counters.timeouts, 0);
    }

    #[test]
    fn test_read_numeric_invalid_utf8() {
        let transport = ReplayTransport::new(&[&[0xFF, 0xFE, b'\r', b'\n']]);
        let mut conn = Connection::with_transport(transport, ConnectionConfig::default());

        match conn.read_numeric(2u32) {
            Err(ProtocolError::Decode { channel }) => assert_eq!(channel, "In2"),
            other => panic!("expected decode error, got {:?}", other),
        }
    }
}
