//! Serial port handling
//!
//! Provides low-level serial port access for the controller. Line settings
//! are opaque to the framing engine; they only matter here, at open time.

use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use std::time::Duration;
use tracing::debug;

use super::{ProtocolError, DEFAULT_BAUD_RATE};

/// Parity checking mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    One,
    Two,
}

/// Flow control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(stop_bits: StopBits) -> Self {
        match stop_bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow_control: FlowControl) -> Self {
        match flow_control {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Line settings applied when the port is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits per character (5-8)
    pub data_bits: u8,
    /// Parity
    pub parity: Parity,
    /// Stop bits
    pub stop_bits: StopBits,
    /// Flow control
    pub flow_control: FlowControl,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl SerialSettings {
    fn serial_data_bits(&self) -> Result<serialport::DataBits, ProtocolError> {
        match self.data_bits {
            5 => Ok(serialport::DataBits::Five),
            6 => Ok(serialport::DataBits::Six),
            7 => Ok(serialport::DataBits::Seven),
            8 => Ok(serialport::DataBits::Eight),
            n => Err(ProtocolError::InvalidConfig(format!(
                "data_bits must be 5-8, got {}",
                n
            ))),
        }
    }

    /// Reject settings the port could never be opened with
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.baud_rate == 0 {
            return Err(ProtocolError::InvalidConfig(
                "baud_rate must be non-zero".to_string(),
            ));
        }
        self.serial_data_bits().map(|_| ())
    }
}

/// Open a serial port for the controller.
///
/// The port is opened with a zero read timeout so reads return immediately
/// with whatever is buffered.
pub fn open_port(
    name: &str,
    settings: &SerialSettings,
) -> Result<Box<dyn SerialPort>, ProtocolError> {
    settings.validate()?;
    let data_bits = settings.serial_data_bits()?;

    debug!(port = name, ?settings, "opening serial port");

    let mut port = serialport::new(name, settings.baud_rate)
        .data_bits(data_bits)
        .parity(settings.parity.into())
        .stop_bits(settings.stop_bits.into())
        .flow_control(settings.flow_control.into())
        .timeout(Duration::ZERO)
        .open()
        .map_err(|e| ProtocolError::ConnectionFailed {
            port: name.to_string(),
            reason: e.to_string(),
        })?;

    clear_buffers(port.as_mut())?;
    Ok(port)
}

/// Discard anything left in the port's buffers
pub fn clear_buffers(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.clear(serialport::ClearBuffer::All)
        .map_err(|e| ProtocolError::Io(e.into()))
}
