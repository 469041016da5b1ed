use std::fmt;

use super::output_name;
use crate::protocol::{ChannelRef, Connection, ProtocolError, Response};

const HEATER_ON: &str = "outputEnable on";
const HEATER_OFF: &str = "outputEnable off";

impl Connection {
    /// Enable all heater outputs
    pub fn enable_heater(&mut self) -> Result<Response, ProtocolError> {
        self.write(HEATER_ON)
    }

    /// Disable all heater outputs
    pub fn disable_heater(&mut self) -> Result<Response, ProtocolError> {
        self.write(HEATER_OFF)
    }

    /// Turn on the heater and the PID loop of an output.
    ///
    /// The PID parameters should come from a tuning run first.
    pub fn enable_pid(&mut self, output: u32) -> Result<Response, ProtocolError> {
        self.enable_heater()?;
        self.set_variable(&format!("{}.PID.Mode", output_name(output)), "On")
    }

    /// Turn off the heater and the PID loop of an output
    pub fn disable_pid(&mut self, output: u32) -> Result<Response, ProtocolError> {
        self.disable_heater()?;
        self.set_variable(&format!("{}.PID.Mode", output_name(output)), "Off")
    }

    /// Read the PID setpoint of an output, in kelvin
    pub fn read_setpoint(&mut self, output: u32) -> Result<f64, ProtocolError> {
        self.read_numeric(ChannelRef::Name(format!("{}.PID.setpoint", output_name(output))))
    }

    /// Write the PID setpoint of an output, in kelvin
    pub fn write_setpoint(
        &mut self,
        output: u32,
        setpoint: impl fmt::Display,
    ) -> Result<Response, ProtocolError> {
        self.set_variable(&format!("{}.PID.setpoint", output_name(output)), setpoint)
    }
}
