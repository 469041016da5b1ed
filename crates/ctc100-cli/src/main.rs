//! `ctc100` - command-line client for the CTC100 temperature controller

mod logging;

use std::convert::Infallible;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use ctc100_core::demo::DemoController;
use ctc100_core::instrument::TuneParams;
use ctc100_core::protocol::{ChannelRef, Connection, ConnectionConfig, Response};
use ctc100_core::unit_conversion::TemperatureUnit;
use tracing::debug;

/// Exit code for a tuning run that finished without new PID parameters
const EXIT_TUNE_FAILED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "ctc100", version, about = "Talk to a CTC100 temperature controller")]
struct Cli {
    /// Serial port (e.g. /dev/ttyACM0 or COM3)
    #[arg(short, long, env = "CTC100_PORT", global = true)]
    port: Option<String>,

    /// Connect through a serial-to-TCP bridge at host:port instead
    #[arg(long, global = true, conflicts_with = "port")]
    tcp: Option<String>,

    /// Baud rate (default 9600)
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Response timeout in milliseconds (default 100)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// JSON connection config; flags override its fields
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Talk to the built-in simulator instead of hardware
    #[arg(long, global = true)]
    demo: bool,

    /// Unit for temperatures shown and given (K, C or F)
    #[arg(short, long, global = true, default_value = "K")]
    unit: TemperatureUnit,

    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a channel's temperature
    Read {
        /// Input index (1 for In1) or channel name
        #[arg(value_parser = parse_channel)]
        channel: ChannelRef,
    },
    /// Query a variable
    Get { variable: String },
    /// Assign a variable
    Set { variable: String, value: String },
    /// Add to a numeric variable
    Increment { variable: String, value: String },
    /// Send a line as-is and print the reply
    Raw { line: String },
    /// Channel alarms
    #[command(subcommand)]
    Alarm(AlarmCommand),
    /// Switch all heater outputs
    Heater { state: Switch },
    /// Switch the PID loop of an output
    Pid { output: u32, state: Switch },
    /// PID setpoint of an output
    #[command(subcommand)]
    Setpoint(SetpointCommand),
    /// Auto-tune the PID loop of an output
    Tune {
        output: u32,
        /// Heater power during the step, in watts
        #[arg(long)]
        step_y: f64,
        /// Step duration in seconds
        #[arg(long)]
        lag: f64,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum AlarmCommand {
    /// Arm a level alarm for the range [min, max]
    Set {
        #[arg(value_parser = parse_channel)]
        channel: ChannelRef,
        #[arg(allow_negative_numbers = true)]
        min: f64,
        #[arg(allow_negative_numbers = true)]
        max: f64,
    },
    /// Turn a channel's alarm off
    Disable {
        #[arg(value_parser = parse_channel)]
        channel: ChannelRef,
    },
}

#[derive(Subcommand, Debug)]
enum SetpointCommand {
    /// Print the setpoint
    Get { output: u32 },
    /// Write a new setpoint
    Set {
        output: u32,
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Switch {
    On,
    Off,
}

/// Bare numbers address inputs (`2` is `In2`); anything else is a name
fn parse_channel(s: &str) -> Result<ChannelRef, Infallible> {
    s.parse()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Build the connection config from `--config` and the overriding flags
fn connection_config(cli: &Cli) -> Result<ConnectionConfig> {
    let mut config = match &cli.config {
        Some(path) => ConnectionConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ConnectionConfig::default(),
    };

    if let Some(port) = &cli.port {
        config.port_name = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    Ok(config)
}

fn connect(cli: &Cli) -> Result<Connection> {
    let config = connection_config(cli)?;

    if cli.demo {
        debug!("using simulated controller");
        return Ok(Connection::with_transport(DemoController::new(), config));
    }
    if let Some(addr) = &cli.tcp {
        return Connection::open_tcp(addr, config)
            .with_context(|| format!("failed to connect to {}", addr));
    }
    if config.port_name.is_empty() {
        bail!("no controller given; use --port, --tcp, --config or --demo");
    }

    let port = config.port_name.clone();
    Connection::open(config).with_context(|| format!("failed to open {}", port))
}

fn print_response(response: &Response) {
    println!("{}", response.text_lossy().trim_end());
    if !response.is_complete() {
        eprintln!("warning: reply was not terminated before the timeout");
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let mut ctc = connect(cli)?;
    execute(cli, &mut ctc)
}

fn execute(cli: &Cli, ctc: &mut Connection) -> Result<ExitCode> {
    let unit = cli.unit;

    match &cli.command {
        Command::Read { channel } => {
            let kelvin = ctc.read_numeric(channel.clone())?;
            println!("{} {}", unit.from_kelvin(kelvin), unit.symbol());
        }
        Command::Get { variable } => print_response(&ctc.get_variable(variable)?),
        Command::Set { variable, value } => print_response(&ctc.set_variable(variable, value)?),
        Command::Increment { variable, value } => {
            print_response(&ctc.increment_variable(variable, value)?)
        }
        Command::Raw { line } => print_response(&ctc.write(line)?),
        Command::Alarm(AlarmCommand::Set { channel, min, max }) => {
            if min > max {
                bail!("alarm minimum {} is above maximum {}", min, max);
            }
            let (min, max) = (unit.to_kelvin(*min), unit.to_kelvin(*max));
            print_response(&ctc.set_alarm(channel.clone(), min, max)?);
        }
        Command::Alarm(AlarmCommand::Disable { channel }) => {
            print_response(&ctc.disable_alarm(channel.clone())?)
        }
        Command::Heater { state } => {
            let response = match state {
                Switch::On => ctc.enable_heater()?,
                Switch::Off => ctc.disable_heater()?,
            };
            print_response(&response);
        }
        Command::Pid { output, state } => {
            let response = match state {
                Switch::On => ctc.enable_pid(*output)?,
                Switch::Off => ctc.disable_pid(*output)?,
            };
            print_response(&response);
        }
        Command::Setpoint(SetpointCommand::Get { output }) => {
            let kelvin = ctc.read_setpoint(*output)?;
            println!("{} {}", unit.from_kelvin(kelvin), unit.symbol());
        }
        Command::Setpoint(SetpointCommand::Set { output, value }) => {
            print_response(&ctc.write_setpoint(*output, unit.to_kelvin(*value))?)
        }
        Command::Tune {
            output,
            step_y,
            lag,
            json,
        } => {
            let lag = Duration::try_from_secs_f64(*lag)
                .with_context(|| format!("invalid lag {}", lag))?;
            let report = ctc.tune_pid(*output, TuneParams { step_y: *step_y, lag })?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.message);
            }
            if !report.succeeded() {
                return Ok(ExitCode::from(EXIT_TUNE_FAILED));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_read_by_index_and_name() {
        let cli = Cli::try_parse_from(["ctc100", "--demo", "read", "2"]).unwrap();
        assert!(cli.demo);
        match cli.command {
            Command::Read { channel } => assert_eq!(channel, ChannelRef::Index(2)),
            other => panic!("unexpected command {:?}", other),
        }

        let cli =
            Cli::try_parse_from(["ctc100", "read", "Cold head", "--port", "COM3"]).unwrap();
        assert_eq!(cli.port.as_deref(), Some("COM3"));
        match cli.command {
            Command::Read { channel } => {
                assert_eq!(channel, ChannelRef::Name("Cold head".to_string()))
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_unit_and_verbosity() {
        let cli = Cli::try_parse_from(["ctc100", "-vv", "--unit", "C", "setpoint", "get", "1"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.unit, TemperatureUnit::Celsius);
    }

    #[test]
    fn test_parse_negative_alarm_bounds() {
        let cli =
            Cli::try_parse_from(["ctc100", "-u", "C", "alarm", "set", "1", "-40", "-5.5"]).unwrap();
        match cli.command {
            Command::Alarm(AlarmCommand::Set { min, max, .. }) => {
                assert_eq!(min, -40.0);
                assert_eq!(max, -5.5);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_tcp_conflicts_with_port() {
        assert!(
            Cli::try_parse_from(["ctc100", "--port", "COM3", "--tcp", "host:4000", "heater", "on"])
                .is_err()
        );
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "ctc100",
            "--baud",
            "19200",
            "--timeout-ms",
            "250",
            "heater",
            "off",
        ])
        .unwrap();
        let config = connection_config(&cli).unwrap();
        assert_eq!(config.serial.baud_rate, 19200);
        assert_eq!(config.timeout_ms, 250);
        assert!(config.port_name.is_empty());
    }

    #[test]
    fn test_missing_port_is_reported() {
        let cli = Cli::try_parse_from(["ctc100", "heater", "on"]).unwrap();
        let err = connect(&cli).unwrap_err();
        assert!(err.to_string().contains("--demo"), "{}", err);
    }

    fn execute_on_demo(args: &[&str]) -> (DemoController, Result<ExitCode>) {
        let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
        let demo = DemoController::with_seed(5);
        let mut ctc = Connection::with_transport(demo.clone(), ConnectionConfig::default());
        let result = execute(&cli, &mut ctc);
        (demo, result)
    }

    #[test]
    fn test_run_against_demo() {
        let cli = Cli::try_parse_from([
            "ctc100", "--demo", "-u", "C", "alarm", "set", "1", "10", "20",
        ])
        .unwrap();
        assert!(run(&cli).is_ok());
    }

    #[test]
    fn test_alarm_addresses_numbered_input() {
        let (demo, result) = execute_on_demo(&["ctc100", "alarm", "set", "1", "280", "310.5"]);
        assert!(result.is_ok());
        assert_eq!(
            demo.received(),
            vec![
                "In1.alarm.sound = (4 beeps)".to_string(),
                "In1.alarm.min = (280)".to_string(),
                "In1.alarm.max = (310.5)".to_string(),
                "In1.alarm.mode = (Level)".to_string(),
            ]
        );

        let (demo, result) = execute_on_demo(&["ctc100", "alarm", "disable", "3"]);
        assert!(result.is_ok());
        assert_eq!(demo.received(), vec!["In3.alarm.mode = (Off)".to_string()]);
    }

    #[test]
    fn test_read_addresses_numbered_input() {
        let (demo, result) = execute_on_demo(&["ctc100", "read", "2"]);
        assert!(result.is_ok());
        assert_eq!(demo.received(), vec!["In2.value?".to_string()]);
    }

    #[test]
    fn test_inverted_alarm_bounds_send_nothing() {
        let (demo, result) = execute_on_demo(&["ctc100", "alarm", "set", "1", "20", "10"]);
        assert!(result.is_err());
        assert!(demo.received().is_empty());
    }

    #[test]
    fn test_tune_against_demo() {
        let cli = Cli::try_parse_from([
            "ctc100", "--demo", "tune", "1", "--step-y", "5", "--lag", "0",
        ])
        .unwrap();
        assert!(run(&cli).is_ok());
    }
}
