//! Demo Mode - Simulated CTC100 for testing
//!
//! [`DemoController`] implements [`Transport`] and answers commands the way
//! the controller does, so the driver and the CLI can run without hardware.
//! Input channels read close to room temperature with a little noise.
//!
//! Handles are cheap clones sharing one simulated device, which lets a test
//! keep a handle after moving another into a
//! [`Connection`](crate::protocol::Connection).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::protocol::{Command, Transport, COMMAND_TERMINATOR, RESPONSE_TERMINATOR};

/// Reply to a query for a variable the controller does not have
pub const NO_VALUE: &str = "No Value";

/// Reading reported by unset input channels before noise, in kelvin
const BASELINE_KELVIN: f64 = 296.15;

/// Peak noise added to input readings, in kelvin
const NOISE_KELVIN: f64 = 0.05;

/// Decimals the controller prints for numeric values
const REPLY_DECIMALS: usize = 3;

#[derive(Debug)]
struct DemoState {
    variables: HashMap<String, String>,
    /// Command bytes received but not yet newline-terminated
    pending: Vec<u8>,
    /// Reply bytes not yet read
    outbox: VecDeque<u8>,
    /// Every command line received, without the terminator
    received: Vec<String>,
    heater_enabled: bool,
    /// Bytes handed out per read; 0 hands out everything
    chunk_size: usize,
    verbose: bool,
    tune_fails: bool,
    drop_terminator: bool,
    rng: StdRng,
}

/// Simulated CTC100
#[derive(Debug, Clone)]
pub struct DemoController {
    state: Arc<Mutex<DemoState>>,
}

impl Default for DemoController {
    fn default() -> Self {
        Self::new()
    }
}

/// Numeric values are reported with fixed decimals, whatever was assigned
fn render_value(value: &str) -> String {
    match value.trim().parse::<f64>() {
        Ok(number) if number.is_finite() => format!("{:.*}", REPLY_DECIMALS, number),
        _ => value.to_string(),
    }
}

fn is_input_channel(name: &str) -> bool {
    name.strip_prefix("In")
        .map(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

impl DemoController {
    /// Create a new simulator with random noise
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create a simulator whose noise is reproducible
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            state: Arc::new(Mutex::new(DemoState {
                variables: HashMap::new(),
                pending: Vec::new(),
                outbox: VecDeque::new(),
                received: Vec::new(),
                heater_enabled: false,
                chunk_size: 0,
                verbose: false,
                tune_fails: false,
                drop_terminator: false,
                rng,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, DemoState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hand out replies `size` bytes per read (0 for all at once)
    pub fn set_chunk_size(&self, size: usize) {
        self.state().chunk_size = size;
    }

    /// Prefix query replies with the variable name, like the device's verbose mode
    pub fn set_verbose(&self, verbose: bool) {
        self.state().verbose = verbose;
    }

    /// Make auto-tuning leave PID mode off
    pub fn set_tune_fails(&self, fails: bool) {
        self.state().tune_fails = fails;
    }

    /// Leave CRLF off every reply
    pub fn set_drop_terminator(&self, drop: bool) {
        self.state().drop_terminator = drop;
    }

    /// Preset a variable
    pub fn set_variable(&self, name: &str, value: impl ToString) {
        self.state().variables.insert(name.to_string(), value.to_string());
    }

    /// Current value of a variable
    pub fn variable(&self, name: &str) -> Option<String> {
        self.state().variables.get(name).cloned()
    }

    /// Whether `outputEnable on` is in effect
    pub fn heater_enabled(&self) -> bool {
        self.state().heater_enabled
    }

    /// Command lines received so far, without terminators
    pub fn received(&self) -> Vec<String> {
        self.state().received.clone()
    }
}

impl DemoState {
    fn lookup(&mut self, variable: &str) -> Option<String> {
        if let Some(value) = self.variables.get(variable) {
            return Some(render_value(value));
        }

        let stem = variable.strip_suffix(".value")?;
        if let Some(value) = self.variables.get(stem) {
            return Some(render_value(value));
        }
        if is_input_channel(stem) {
            let noise = self.rng.gen_range(-NOISE_KELVIN..NOISE_KELVIN);
            return Some(format!("{:.*}", REPLY_DECIMALS, BASELINE_KELVIN + noise));
        }
        None
    }

    fn assign(&mut self, variable: &str, value: &str) -> String {
        // Tuning finishes instantly here; the device turns PID on when done
        if let Some(output) = variable.strip_suffix(".Tune.Mode") {
            if value == "Auto" && !self.tune_fails {
                self.variables
                    .insert(format!("{}.PID.Mode", output), "On".to_string());
            }
        }
        self.variables.insert(variable.to_string(), value.to_string());
        value.to_string()
    }

    fn increment(&mut self, variable: &str, amount: &str) -> String {
        let current = self
            .variables
            .get(variable)
            .map(|v| v.parse::<f64>())
            .unwrap_or(Ok(0.0));

        match (current, amount.parse::<f64>()) {
            (Ok(current), Ok(amount)) => {
                let value = (current + amount).to_string();
                self.variables.insert(variable.to_string(), value.clone());
                value
            }
            _ => "Invalid value".to_string(),
        }
    }

    fn literal(&mut self, text: &str) -> String {
        match text.split_once(' ') {
            Some(("outputEnable", "on")) => {
                self.heater_enabled = true;
                "on".to_string()
            }
            Some(("outputEnable", "off")) => {
                self.heater_enabled = false;
                "off".to_string()
            }
            Some(("menu", _)) => String::new(),
            _ => "Unknown command".to_string(),
        }
    }

    fn handle_line(&mut self, line: &str) {
        self.received.push(line.to_string());

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(never) => match never {},
        };

        let reply = match &command {
            Command::Query { variable } => match self.lookup(variable) {
                Some(value) if self.verbose => format!("{} = {}", variable, value),
                Some(value) => value,
                None => NO_VALUE.to_string(),
            },
            Command::Assign { variable, value } => self.assign(variable, value),
            Command::Increment { variable, value } => self.increment(variable, value),
            Command::Literal(text) => self.literal(text),
        };

        self.outbox.extend(reply.as_bytes());
        if !self.drop_terminator {
            self.outbox.extend(RESPONSE_TERMINATOR);
        }
    }
}

impl Transport for DemoController {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.state();
        state.pending.extend_from_slice(data);

        while let Some(pos) = state.pending.iter().position(|&b| b == COMMAND_TERMINATOR) {
            let line: Vec<u8> = state.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..pos]).into_owned();
            state.handle_line(&line);
        }
        Ok(())
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let mut state = self.state();
        let n = match state.chunk_size {
            0 => state.outbox.len(),
            size => size.min(state.outbox.len()),
        };
        Ok(state.outbox.drain(..n).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(demo: &mut DemoController, command: &str) -> String {
        demo.write_bytes(format!("{}\n", command).as_bytes()).unwrap();
        String::from_utf8(demo.read_available().unwrap()).unwrap()
    }

    #[test]
    fn test_input_channel_reads_near_baseline() {
        let mut demo = DemoController::with_seed(7);
        let reply = exchange(&mut demo, "In1.value?");
        assert!(reply.ends_with("\r\n"));

        let value: f64 = reply.trim_end().parse().unwrap();
        // Formatting to three decimals can round just past the noise bound
        assert!(
            (value - BASELINE_KELVIN).abs() <= NOISE_KELVIN + 0.001,
            "reading {} out of range",
            value
        );
    }

    #[test]
    fn test_unknown_variable() {
        let mut demo = DemoController::with_seed(7);
        assert_eq!(exchange(&mut demo, "Nope.value?"), "No Value\r\n");
    }

    #[test]
    fn test_assign_and_increment() {
        let mut demo = DemoController::with_seed(7);
        assert_eq!(exchange(&mut demo, "Out1.PID.setpoint = (300)"), "300\r\n");
        assert_eq!(exchange(&mut demo, "Out1.PID.setpoint += (2.5)"), "302.5\r\n");
        assert_eq!(demo.variable("Out1.PID.setpoint").as_deref(), Some("302.5"));
    }

    #[test]
    fn test_whole_numbers_reported_with_decimals() {
        let mut demo = DemoController::with_seed(7);
        assert_eq!(exchange(&mut demo, "Out1.PID.setpoint = (300)"), "300\r\n");
        assert_eq!(exchange(&mut demo, "Out1.PID.setpoint?"), "300.000\r\n");
        assert_eq!(exchange(&mut demo, "Out1.PID.Mode = (On)"), "On\r\n");
        assert_eq!(exchange(&mut demo, "Out1.PID.Mode?"), "On\r\n");
    }

    #[test]
    fn test_verbose_prefix() {
        let mut demo = DemoController::with_seed(7);
        demo.set_verbose(true);
        demo.set_variable("In2.value", "12.5");
        assert_eq!(exchange(&mut demo, "In2.value?"), "In2.value = 12.500\r\n");
    }

    #[test]
    fn test_heater_literal() {
        let mut demo = DemoController::with_seed(7);
        assert_eq!(exchange(&mut demo, "outputEnable on"), "on\r\n");
        assert!(demo.heater_enabled());
        assert_eq!(exchange(&mut demo, "outputEnable off"), "off\r\n");
        assert!(!demo.heater_enabled());
    }

    #[test]
    fn test_chunked_reads() {
        let mut demo = DemoController::with_seed(7);
        demo.set_chunk_size(2);
        demo.set_variable("x", "abc");
        demo.write_bytes(b"x?\n").unwrap();

        assert_eq!(demo.read_available().unwrap(), b"ab".to_vec());
        assert_eq!(demo.read_available().unwrap(), b"c\r".to_vec());
        assert_eq!(demo.read_available().unwrap(), b"\n".to_vec());
        assert!(demo.read_available().unwrap().is_empty());
    }

    #[test]
    fn test_split_command_write() {
        let mut demo = DemoController::with_seed(7);
        demo.set_variable("x", "1.0");
        demo.write_bytes(b"x").unwrap();
        assert!(demo.read_available().unwrap().is_empty());
        demo.write_bytes(b"?\n").unwrap();
        assert_eq!(demo.read_available().unwrap(), b"1.000\r\n".to_vec());
        assert_eq!(demo.received(), vec!["x?".to_string()]);
    }
}
