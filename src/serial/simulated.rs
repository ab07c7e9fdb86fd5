use log::info;

use super::{frame_command, Outcome, Transport};
use crate::error::LinkError;
use crate::logutil::escape_log;

/// Message returned for every simulated exchange.
pub const SIMULATION_MESSAGE: &str = "TESTING MODE";

/// Stand-in for the controller when no device is attached.
///
/// Nothing is read or written and there is no settle delay; every command
/// succeeds. Sent codes are kept so a console session can be replayed.
#[derive(Debug, Default)]
pub struct SimulatedLink {
    sent: Vec<String>,
}

impl SimulatedLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> &[String] {
        &self.sent
    }
}

impl Transport for SimulatedLink {
    fn send(&mut self, code: &str) -> Result<Outcome, LinkError> {
        info!("(simulated) Sending: {}", escape_log(&frame_command(code)));
        self.sent.push(code.to_string());
        Ok(Outcome::success(SIMULATION_MESSAGE))
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
