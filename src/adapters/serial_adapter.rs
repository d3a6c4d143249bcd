//! Serial session for newline-delimited sensor output.
//!
//! The device prints one integer per line (`"512\n"`). The session keeps a
//! `BufReader` over the async port and hands back one line per `read_frame`,
//! terminator included; trimming is left to the decoder.

use super::TransportSession;
use crate::config::TransportKind;
use crate::error::TransportError;
use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

/// Byte stream produced by a [`PortOpener`].
pub type SerialStream = Box<dyn AsyncRead + Send + Unpin>;

/// Opens a port by name and baud rate.
pub type PortOpener = Box<dyn FnMut(&str, u32) -> io::Result<SerialStream> + Send>;

pub struct SerialSession {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    port_name: String,
    baud_rate: u32,
    opener: PortOpener,
    reader: Option<BufReader<SerialStream>>,
    /// Bytes of a line not yet terminated.
    pending: Vec<u8>,
}

impl SerialSession {
    /// Session backed by a real serial port.
    pub fn new(port_name: String, baud_rate: u32) -> Self {
        Self::with_opener(port_name, baud_rate, Box::new(open_native))
    }

    /// Session whose port is produced by `opener`, e.g. an in-memory stream in tests.
    pub fn with_opener(port_name: String, baud_rate: u32, opener: PortOpener) -> Self {
        Self {
            port_name,
            baud_rate,
            opener,
            reader: None,
            pending: Vec::new(),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

#[cfg(feature = "serial")]
fn open_native(port_name: &str, baud_rate: u32) -> io::Result<SerialStream> {
    use tokio_serial::SerialPortBuilderExt;

    let port = tokio_serial::new(port_name, baud_rate)
        .open_native_async()
        .map_err(io::Error::from)?;
    Ok(Box::new(port))
}

#[cfg(not(feature = "serial"))]
fn open_native(_port_name: &str, _baud_rate: u32) -> io::Result<SerialStream> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Serial support not enabled. Rebuild with --features serial",
    ))
}

#[async_trait]
impl TransportSession for SerialSession {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn describe(&self) -> String {
        format!("serial:{}@{}", self.port_name, self.baud_rate)
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    async fn open(&mut self) -> Result<(), TransportError> {
        let stream = (self.opener)(&self.port_name, self.baud_rate)
            .map_err(|e| TransportError::connect(TransportKind::Serial, e))?;

        self.pending.clear();
        self.reader = Some(BufReader::new(stream));
        debug!(
            port = %self.port_name,
            baud_rate = self.baud_rate,
            "Serial port opened"
        );
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<String, TransportError> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(TransportError::io(
                TransportKind::Serial,
                io::Error::new(io::ErrorKind::NotConnected, "serial port not open"),
            ));
        };

        // Partial bytes stay in `pending` if this future is dropped mid-line.
        let read = reader
            .read_until(b'\n', &mut self.pending)
            .await
            .map_err(|e| TransportError::io(TransportKind::Serial, e))?;

        if read == 0 && self.pending.is_empty() {
            return Err(TransportError::io(
                TransportKind::Serial,
                io::Error::new(io::ErrorKind::UnexpectedEof, "serial port closed"),
            ));
        }

        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Ok(line)
    }

    async fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!(port = %self.port_name, "Serial port closed");
        }
        self.pending.clear();
    }
}
