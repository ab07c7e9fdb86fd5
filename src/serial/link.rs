use std::io::{ErrorKind, Read, Write};
use std::thread;
use std::time::Duration;

use log::{debug, trace};

use super::{frame_command, outcome_for, Outcome, Transport, CLEAR_LINES};
use crate::error::LinkError;
use crate::logutil::escape_log;

/// Longest reply line we bother to collect.
const MAX_LINE: usize = 256;

/// Settle interval between writing and reading.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(100);

/// The RC210 line protocol over any byte stream.
///
/// The stream is expected to have a short read timeout: a read returning
/// `TimedOut`, `WouldBlock` or zero bytes ends the current line.
pub struct LineLink<S> {
    stream: S,
    settle: Duration,
}

impl<S: Read + Write + Send> LineLink<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            settle: DEFAULT_SETTLE,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Read one line (terminators stripped); empty when nothing arrived in time.
    fn read_line(&mut self) -> Result<String, LinkError> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        while line.len() < MAX_LINE {
            match self.stream.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(LinkError::Read(e)),
            }
        }
        let text = String::from_utf8_lossy(&line);
        Ok(text.trim_end_matches(['\r', '\n']).to_string())
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError> {
        self.stream.write_all(data).map_err(LinkError::Write)?;
        self.stream.flush().map_err(LinkError::Write)
    }

    /// Swallow pending controller output, then resync with a bare CR.
    fn clear_buffer(&mut self) -> Result<(), LinkError> {
        for _ in 0..CLEAR_LINES {
            let discarded = self.read_line()?;
            if !discarded.is_empty() {
                trace!("clear buffer discarded: {}", escape_log(&discarded));
            }
        }
        self.write_all(b"\r")
    }
}

impl<S: Read + Write + Send> Transport for LineLink<S> {
    fn send(&mut self, code: &str) -> Result<Outcome, LinkError> {
        self.clear_buffer()?;
        thread::sleep(self.settle);

        let framed = frame_command(code);
        debug!("Sending: {}", escape_log(&framed));
        self.write_all(framed.as_bytes())?;

        thread::sleep(self.settle);
        let reply = self.read_line()?;
        debug!("Received: {}", escape_log(&reply));

        let outcome = outcome_for(&reply, &framed);
        if !outcome.succeeded {
            debug!("{}", outcome.message);
        }
        self.clear_buffer()?;
        Ok(outcome)
    }
}

#[cfg(feature = "serial")]
pub(super) fn open_serial(
    config: &crate::config::SerialConfig,
) -> Result<LineLink<Box<dyn serialport::SerialPort>>, LinkError> {
    log::info!(
        "Opening controller link on {} at {} baud",
        config.device,
        config.baud_rate
    );
    let port = serialport::new(config.device.as_str(), config.baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .stop_bits(serialport::StopBits::One)
        .parity(serialport::Parity::None)
        .flow_control(serialport::FlowControl::None)
        .timeout(Duration::from_millis(config.read_timeout_ms))
        .open()
        .map_err(|e| LinkError::Open {
            device: config.device.clone(),
            reason: e.to_string(),
        })?;
    Ok(LineLink::new(port))
}
