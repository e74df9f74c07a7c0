//! The serial byte transport behind the controller's request/response loop.

use std::io::Read;
use std::time::Duration;

use super::ControllerError;

/// What the controller needs from a serial-like byte pipe: send a
/// CR-terminated line, poll for one complete reply line (the line feed is
/// auto-detected, `\n` or `\r\n`), and reset the connection. Implemented by
/// [`SerialPortTransport`] for real hardware and by an in-memory mock in
/// tests, mirroring the `Dispatcher`/`ProbeLink` seam pattern used to keep
/// the rewriter and probe driver decoupled from the controller.
pub trait SerialTransport {
    fn write_line(&mut self, line: &str) -> Result<(), ControllerError>;

    /// Attempts to read one complete line, blocking for at most `timeout`.
    /// Returns `None` if no full line arrived within the window.
    fn poll_line(&mut self, timeout: Duration) -> Result<Option<String>, ControllerError>;

    /// Discards any buffered, unparsed bytes and sends the firmware reset
    /// command (`M999`).
    fn reset(&mut self) -> Result<(), ControllerError>;
}

/// A concrete transport over a real serial port, opened with the
/// `serialport` crate.
pub struct SerialPortTransport {
    port: Box<dyn serialport::SerialPort>,
    buffer: Vec<u8>,
}

impl SerialPortTransport {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, ControllerError> {
        let port = serialport::new(path, baud_rate)
            .timeout(Duration::from_millis(4))
            .open()?;
        Ok(Self {
            port,
            buffer: Vec::new(),
        })
    }

    /// Pulls one complete line out of the accumulated byte buffer, if one
    /// is present, trimming a trailing `\r\n` or `\n`.
    fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

impl SerialTransport for SerialPortTransport {
    fn write_line(&mut self, line: &str) -> Result<(), ControllerError> {
        use std::io::Write;
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\r")?;
        self.port.flush()?;
        Ok(())
    }

    fn poll_line(&mut self, timeout: Duration) -> Result<Option<String>, ControllerError> {
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }
        self.port.set_timeout(timeout)?;
        let mut chunk = [0u8; 256];
        match self.port.read(&mut chunk) {
            Ok(0) => Ok(None),
            Ok(n) => {
                self.buffer.extend_from_slice(&chunk[..n]);
                Ok(self.take_line())
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn reset(&mut self) -> Result<(), ControllerError> {
        self.buffer.clear();
        self.write_line("M999")
    }
}
