//! # Controller Serial Link
//!
//! The RC210 speaks a line-oriented protocol over a 9600 8N1 serial port.
//! One exchange is:
//!
//! 1. clear the buffer: read (and discard) up to five lines of unsolicited
//!    output, then write a lone `\r` to resynchronise the command parser;
//! 2. write the framed command `1*<code>\r\n` (unit selector `1`);
//! 3. wait a short settle interval and read one reply line;
//! 4. clear the buffer again.
//!
//! Replies starting with `+` are acknowledgements, `-` are rejections, and
//! anything else (including nothing at all before the read timeout) is an
//! unexpected response. None of these are errors at the Rust level: they come
//! back as an [`Outcome`] and the link stays usable. [`LinkError`] is
//! reserved for real I/O trouble.
//!
//! [`Transport`] is the seam used by [`crate::controller::CommandGate`];
//! [`LineLink`] implements it over any `Read + Write` stream (a
//! `serialport` handle in production) and [`SimulatedLink`] implements it
//! without a device.

mod link;
mod simulated;

pub use link::LineLink;
pub use simulated::SimulatedLink;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::SerialConfig;
use crate::error::LinkError;

/// Unit selector prefixed to every command.
pub const UNIT_SELECTOR: &str = "1*";

/// Lines drained from the device before and after each exchange.
pub const CLEAR_LINES: usize = 5;

/// Result of one operation, as returned to RPC clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub succeeded: bool,
    pub message: String,
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
        }
    }
}

/// Classification of a single reply line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Accepted,
    Rejected,
    Unexpected,
}

/// Frame a command code for the wire.
pub fn frame_command(code: &str) -> String {
    format!("{UNIT_SELECTOR}{code}\r\n")
}

pub fn classify_reply(line: &str) -> ReplyKind {
    if line.starts_with('+') {
        ReplyKind::Accepted
    } else if line.starts_with('-') {
        ReplyKind::Rejected
    } else {
        ReplyKind::Unexpected
    }
}

/// Turn a reply line into the caller-facing outcome for `framed`.
pub fn outcome_for(reply: &str, framed: &str) -> Outcome {
    let command = framed.trim_end();
    match classify_reply(reply) {
        ReplyKind::Accepted => Outcome::success("succeeded"),
        ReplyKind::Rejected => Outcome::failure(format!("failed: {command}")),
        ReplyKind::Unexpected => Outcome::failure(format!("unexpected response: {command}")),
    }
}

/// One command/response exchange with the controller.
///
/// Implementations are blocking; the command gate runs them on a blocking
/// worker and guarantees a single caller at a time.
pub trait Transport: Send {
    fn send(&mut self, code: &str) -> Result<Outcome, LinkError>;

    /// True when no device is attached.
    fn is_simulated(&self) -> bool {
        false
    }
}

/// Open the configured link, or a simulated one when `simulate` is set.
pub fn open_transport(config: &SerialConfig, simulate: bool) -> Result<Box<dyn Transport>, LinkError> {
    if simulate {
        warn!("Simulation mode: no commands will reach the controller");
        return Ok(Box::new(SimulatedLink::new()));
    }

    #[cfg(feature = "serial")]
    {
        let link = link::open_serial(config)?;
        Ok(Box::new(link))
    }

    #[cfg(not(feature = "serial"))]
    {
        warn!(
            "Serial support not compiled in, simulating controller on {}",
            config.device
        );
        Ok(Box::new(SimulatedLink::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_with_unit_selector() {
        assert_eq!(frame_command("4321"), "1*4321\r\n");
        assert_eq!(frame_command("5555101824"), "1*5555101824\r\n");
    }

    #[test]
    fn classifies_by_first_character() {
        assert_eq!(classify_reply("+1*4321"), ReplyKind::Accepted);
        assert_eq!(classify_reply("-1*4321"), ReplyKind::Rejected);
        assert_eq!(classify_reply(""), ReplyKind::Unexpected);
        assert_eq!(classify_reply(" +1*4321"), ReplyKind::Unexpected);
        assert_eq!(classify_reply("RC210 ready"), ReplyKind::Unexpected);
    }

    #[test]
    fn failure_messages_name_the_command() {
        let framed = frame_command("1234");
        assert_eq!(outcome_for("+ok", &framed), Outcome::success("succeeded"));
        assert_eq!(
            outcome_for("-err", &framed),
            Outcome::failure("failed: 1*1234")
        );
        assert_eq!(
            outcome_for("", &framed),
            Outcome::failure("unexpected response: 1*1234")
        );
    }
}
