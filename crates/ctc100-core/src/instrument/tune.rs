use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use super::output_name;
use crate::protocol::{Connection, ProtocolError};

/// Exact reply to `Out<n>.PID.Mode?` once the controller has finished tuning
const PID_ON_REPLY: &str = "On\r\n";

/// Presses OK on the controller's "tuning complete" screen
const ACKNOWLEDGE_MENU: &str = "menu 4";

/// Parameters of a PID auto-tuning run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuneParams {
    /// Heater power applied during the step, in watts
    pub step_y: f64,
    /// How long the step lasts; also how long the driver waits for the result
    pub lag: Duration,
}

/// Result of a tuning run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TuneOutcome {
    /// The controller accepted new PID parameters
    Succeeded,
    /// The controller did not report PID mode `On` after the lag
    Failed,
}

/// What a tuning run did, for the caller to present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuneReport {
    /// Output that was tuned
    pub output: u32,
    /// Whether tuning succeeded
    pub outcome: TuneOutcome,
    /// Human-readable summary
    pub message: String,
    /// Reply to the final PID mode query, lossily decoded
    pub pid_mode: String,
}

impl TuneReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == TuneOutcome::Succeeded
    }
}

impl Connection {
    /// Run the controller's PID auto-tuning on an output.
    ///
    /// The heater applies `step_y` watts for `lag`; both should be chosen so
    /// the sample temperature rises by at least a factor of 10 over that
    /// time, starting from a stable temperature. This call blocks for `lag`.
    ///
    /// The controller switches PID mode on by itself when tuning finishes,
    /// so a reply of exactly `On` means success; the loop is then switched
    /// off again and the completion dialog acknowledged. Any other reply is
    /// reported as [`TuneOutcome::Failed`], not as an error.
    pub fn tune_pid(
        &mut self,
        output: u32,
        params: TuneParams,
    ) -> Result<TuneReport, ProtocolError> {
        let out = output_name(output);

        self.set_variable(&format!("{}.Tune.StepY", out), params.step_y)?;
        self.set_variable(&format!("{}.Tune.Lag", out), params.lag.as_secs_f64())?;

        self.enable_heater()?;
        self.set_variable(&format!("{}.Tune.Type", out), "Auto")?;
        self.set_variable(&format!("{}.Tune.Mode", out), "Auto")?;

        info!(output = %out, lag_s = params.lag.as_secs_f64(), "PID tuning started");
        std::thread::sleep(params.lag);

        let reply = self.get_variable(&format!("{}.PID.Mode", out))?;
        let pid_mode = reply.text_lossy().into_owned();

        if reply.text() == Ok(PID_ON_REPLY) {
            self.disable_pid(output)?;
            self.write(ACKNOWLEDGE_MENU)?;
            info!(output = %out, "PID tuning succeeded");
            Ok(TuneReport {
                output,
                outcome: TuneOutcome::Succeeded,
                message: "The PID tuning was successful; the parameters have been updated"
                    .to_string(),
                pid_mode,
            })
        } else {
            warn!(output = %out, reply = %pid_mode.trim_end(), "PID tuning failed");
            Ok(TuneReport {
                output,
                outcome: TuneOutcome::Failed,
                message: "The PID tuning failed; try a higher step power, a longer lag, or both"
                    .to_string(),
                pid_mode,
            })
        }
    }
}
