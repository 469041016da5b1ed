use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

use super::{open_port, ProtocolError, SerialSettings};

/// Size of a single read from a socket
const TCP_READ_CHUNK: usize = 4096;

/// Byte pipe to the controller (serial port, TCP bridge or simulator).
///
/// Implementations do no retries and no reconnection.
pub trait Transport: Send {
    /// Write the whole buffer
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()>;

    /// Return the bytes buffered right now without waiting; may be empty
    fn read_available(&mut self) -> io::Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write_bytes(data)
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        (**self).read_available()
    }
}

fn is_no_data(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

/// Serial port wrapper implementing Transport
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }

    /// Open and configure the named port
    pub fn open(name: &str, settings: &SerialSettings) -> Result<Self, ProtocolError> {
        open_port(name, settings).map(Self::new)
    }
}

impl Transport for SerialTransport {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        // flush() ends in tcdrain, which can stall on some USB CDC drivers;
        // the kernel transmits what write_all queued.
        self.port.write_all(data)
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let available = self.port.bytes_to_read().map_err(io::Error::from)? as usize;
        if available == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; available];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(ref e) if is_no_data(e) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

/// TCP stream wrapper implementing Transport, for serial-to-ethernet bridges
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        stream.set_nonblocking(true)?;
        Ok(Self { stream })
    }

    /// Connect to `addr` (`host:port`)
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self, ProtocolError> {
        let failed = |reason: String| ProtocolError::ConnectionFailed {
            port: addr.to_string(),
            reason,
        };

        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| failed(e.to_string()))?
            .next()
            .ok_or_else(|| failed("address did not resolve".to_string()))?;

        debug!(%socket_addr, "connecting TCP transport");
        let stream =
            TcpStream::connect_timeout(&socket_addr, timeout).map_err(|e| failed(e.to_string()))?;
        Self::new(stream).map_err(|e| failed(e.to_string()))
    }
}

impl Transport for TcpTransport {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        // The socket stays non-blocking for reads; writes of a command line
        // are tiny, so a full send buffer is retried in place.
        let mut remaining = data;
        while !remaining.is_empty() {
            match self.stream.write(remaining) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => remaining = &remaining[n..],
                Err(ref e) if is_no_data(e) => std::thread::yield_now(),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = [0u8; TCP_READ_CHUNK];
        match self.stream.read(&mut buf) {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            )),
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(ref e) if is_no_data(e) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
