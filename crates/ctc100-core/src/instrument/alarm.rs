use std::fmt;

use crate::protocol::{resolve_channel, ChannelRef, Connection, ProtocolError, Response};

/// Sound played when an alarm trips
pub const ALARM_SOUND: &str = "4 beeps";

/// Alarm mode that trips on leaving the [min, max] band
pub const ALARM_MODE_ARMED: &str = "Level";

const ALARM_MODE_OFF: &str = "Off";

impl Connection {
    /// Arm a level alarm on a channel for the range `[t_min, t_max]`.
    ///
    /// Returns the controller's reply to the final mode assignment.
    pub fn set_alarm(
        &mut self,
        channel: impl Into<ChannelRef>,
        t_min: impl fmt::Display,
        t_max: impl fmt::Display,
    ) -> Result<Response, ProtocolError> {
        let channel = resolve_channel(&channel.into());

        self.set_variable(&format!("{}.alarm.sound", channel), ALARM_SOUND)?;
        self.set_variable(&format!("{}.alarm.min", channel), t_min)?;
        self.set_variable(&format!("{}.alarm.max", channel), t_max)?;
        self.set_variable(&format!("{}.alarm.mode", channel), ALARM_MODE_ARMED)
    }

    /// Turn off the alarm on a channel
    pub fn disable_alarm(
        &mut self,
        channel: impl Into<ChannelRef>,
    ) -> Result<Response, ProtocolError> {
        let channel = resolve_channel(&channel.into());
        self.set_variable(&format!("{}.alarm.mode", channel), ALARM_MODE_OFF)
    }
}
