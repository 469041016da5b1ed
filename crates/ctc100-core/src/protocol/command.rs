//! Protocol commands
//!
//! Builds the text commands understood by the CTC100. Three grammars take a
//! variable name (`<name>?`, `<name> = (<value>)`, `<name> += (<value>)`);
//! everything else (`outputEnable on`, `menu 4`) is sent as a literal.
//!
//! Whitespace is optional in the device's grammar, so it is stripped from
//! variable names before transmission. Values are always wrapped in one pair
//! of parentheses so that spaces or operators inside them stay a single token.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Reference to a channel on the controller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelRef {
    /// Input channel by number, addressed as `In<n>`
    Index(u32),
    /// Fully qualified name (renamed inputs, outputs), used verbatim
    Name(String),
}

impl From<u32> for ChannelRef {
    fn from(index: u32) -> Self {
        ChannelRef::Index(index)
    }
}

impl From<&str> for ChannelRef {
    fn from(name: &str) -> Self {
        ChannelRef::Name(name.to_string())
    }
}

impl From<String> for ChannelRef {
    fn from(name: String) -> Self {
        ChannelRef::Name(name)
    }
}

impl FromStr for ChannelRef {
    type Err = Infallible;

    /// Bare numbers become input indices, anything else a name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().parse::<u32>() {
            Ok(index) => ChannelRef::Index(index),
            Err(_) => ChannelRef::Name(s.to_string()),
        })
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRef::Index(index) => write!(f, "In{}", index),
            ChannelRef::Name(name) => f.write_str(name),
        }
    }
}

/// Resolve a channel reference to the name the device knows it by
pub fn resolve_channel(channel: &ChannelRef) -> String {
    channel.to_string()
}

fn strip_whitespace(variable: &str) -> String {
    variable.chars().filter(|c| !c.is_whitespace()).collect()
}

/// `<name>?`
pub fn format_query(variable: &str) -> String {
    format!("{}?", strip_whitespace(variable))
}

/// `<name> = (<value>)`
pub fn format_assignment(variable: &str, value: impl fmt::Display) -> String {
    format!("{} = ({})", strip_whitespace(variable), value)
}

/// `<name> += (<value>)`
pub fn format_increment(variable: &str, value: impl fmt::Display) -> String {
    format!("{} += ({})", strip_whitespace(variable), value)
}

/// A single command for the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Read a variable
    Query {
        /// Variable name, whitespace already stripped
        variable: String,
    },
    /// Set a variable
    Assign {
        /// Variable name, whitespace already stripped
        variable: String,
        /// Value as rendered text, without the wrapping parentheses
        value: String,
    },
    /// Add to a variable
    Increment {
        /// Variable name, whitespace already stripped
        variable: String,
        /// Amount as rendered text, without the wrapping parentheses
        value: String,
    },
    /// Fixed command sent verbatim (e.g. `outputEnable on`)
    Literal(String),
}

impl Command {
    pub fn query(variable: &str) -> Self {
        Command::Query {
            variable: strip_whitespace(variable),
        }
    }

    pub fn assign(variable: &str, value: impl fmt::Display) -> Self {
        Command::Assign {
            variable: strip_whitespace(variable),
            value: value.to_string(),
        }
    }

    pub fn increment(variable: &str, value: impl fmt::Display) -> Self {
        Command::Increment {
            variable: strip_whitespace(variable),
            value: value.to_string(),
        }
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Command::Literal(text.into())
    }

    /// Variable addressed by this command, if any
    pub fn variable(&self) -> Option<&str> {
        match self {
            Command::Query { variable }
            | Command::Assign { variable, .. }
            | Command::Increment { variable, .. } => Some(variable),
            Command::Literal(_) => None,
        }
    }

    /// Command text without the terminator
    pub fn text(&self) -> String {
        match self {
            Command::Query { variable } => format_query(variable),
            Command::Assign { variable, value } => format_assignment(variable, value),
            Command::Increment { variable, value } => format_increment(variable, value),
            Command::Literal(text) => text.clone(),
        }
    }

    /// Convert command to bytes, appending newline for transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.text().into_bytes();
        bytes.push(super::COMMAND_TERMINATOR);
        bytes
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Remove exactly one pair of wrapping parentheses, if present
fn unwrap_value(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .unwrap_or(value)
}

impl FromStr for Command {
    type Err = Infallible;

    /// Parse command text as the device would, minus the terminator
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(&['\r', '\n'][..]);

        // The first `=` is the operator; anything after it belongs to the value
        if let Some((head, value)) = line.split_once('=') {
            let value = unwrap_value(value).to_string();
            return Ok(match head.trim_end().strip_suffix('+') {
                Some(variable) => Command::Increment {
                    variable: strip_whitespace(variable),
                    value,
                },
                None => Command::Assign {
                    variable: strip_whitespace(head),
                    value,
                },
            });
        }
        if let Some(variable) = line.trim_end().strip_suffix('?') {
            return Ok(Command::Query {
                variable: strip_whitespace(variable),
            });
        }
        Ok(Command::Literal(line.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_channel() {
        assert_eq!(resolve_channel(&ChannelRef::Index(1)), "In1");
        assert_eq!(
            resolve_channel(&ChannelRef::from("Out2.PID.setpoint")),
            "Out2.PID.setpoint"
        );
    }

    #[test]
    fn test_channel_from_str() {
        assert_eq!("3".parse::<ChannelRef>(), Ok(ChannelRef::Index(3)));
        assert_eq!(
            "Sample".parse::<ChannelRef>(),
            Ok(ChannelRef::Name("Sample".to_string()))
        );
    }

    #[test]
    fn test_format_strips_whitespace() {
        assert_eq!(format_query(" In1 . value "), "In1.value?");
        assert_eq!(format_assignment("Out1.PID. Mode", "On"), "Out1.PID.Mode = (On)");
        assert_eq!(format_increment("Out1.PID.\tsetpoint", 5), "Out1.PID.setpoint += (5)");
    }

    #[test]
    fn test_value_wrapped_once_and_untouched() {
        assert_eq!(
            format_assignment("In1.alarm.sound", "4 beeps"),
            "In1.alarm.sound = (4 beeps)"
        );
        assert_eq!(format_assignment("x", "(a + b)"), "x = ((a + b))");
        assert_eq!(format_assignment("x", 2.5), "x = (2.5)");
    }

    #[test]
    fn test_command_to_bytes() {
        assert_eq!(Command::query("In1.value").to_bytes(), b"In1.value?\n".to_vec());
        assert_eq!(
            Command::literal("outputEnable on").to_bytes(),
            b"outputEnable on\n".to_vec()
        );
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(
            "In1.value?".parse::<Command>().unwrap(),
            Command::query("In1.value")
        );
        assert_eq!(
            "In1.alarm.sound = (4 beeps)\n".parse::<Command>().unwrap(),
            Command::assign("In1.alarm.sound", "4 beeps")
        );
        assert_eq!(
            "Out1.PID.setpoint += (2)".parse::<Command>().unwrap(),
            Command::increment("Out1.PID.setpoint", "2")
        );
        assert_eq!(
            "menu 4".parse::<Command>().unwrap(),
            Command::literal("menu 4")
        );
    }

    #[test]
    fn test_command_variable() {
        assert_eq!(Command::query("In2.value").variable(), Some("In2.value"));
        assert_eq!(Command::literal("menu 4").variable(), None);
    }
}
