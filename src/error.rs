//! Custom error types for the acquisition engine.
//!
//! Two layers of errors exist:
//!
//! - **`TransportError`**: raised by a [`TransportSession`](crate::adapters::TransportSession)
//!   when a link cannot be opened (`Connect`) or breaks mid-stream (`Io`). These never
//!   leave the acquisition loop; they drive its backoff and reconnect cycle.
//! - **`DaqError`**: the crate-level error returned by configuration loading and by the
//!   [`CommunicationManager`](crate::manager::CommunicationManager) lifecycle calls.
//!
//! Malformed frames are not errors at all: [`parse_frame`](crate::data::normalize::parse_frame)
//! returns `None` and the frame is dropped. Cancellation is a normal loop exit.

use crate::config::TransportKind;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

#[derive(Error, Debug)]
pub enum DaqError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Communication manager is already running")]
    AlreadyRunning,

    #[error("No Tokio runtime available to spawn acquisition tasks")]
    NoRuntime,
}

impl From<figment::Error> for DaqError {
    fn from(err: figment::Error) -> Self {
        DaqError::Config(Box::new(err))
    }
}

/// Failure of a single transport session.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The transport could not be opened (device busy, port missing, bind failed).
    #[error("{transport} connect failed: {source}")]
    Connect {
        transport: TransportKind,
        #[source]
        source: std::io::Error,
    },

    /// The transport broke while streaming (read failure, disconnect, socket reset).
    #[error("{transport} I/O error: {source}")]
    Io {
        transport: TransportKind,
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    pub fn connect(transport: TransportKind, source: std::io::Error) -> Self {
        TransportError::Connect { transport, source }
    }

    pub fn io(transport: TransportKind, source: std::io::Error) -> Self {
        TransportError::Io { transport, source }
    }

    pub fn transport(&self) -> TransportKind {
        match self {
            TransportError::Connect { transport, .. } | TransportError::Io { transport, .. } => {
                *transport
            }
        }
    }

    pub fn is_connect(&self) -> bool {
        matches!(self, TransportError::Connect { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_display() {
        let err = DaqError::Configuration("priority list is empty".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration validation error: priority list is empty"
        );
    }

    #[test]
    fn test_transport_error_carries_kind() {
        let err = TransportError::connect(
            TransportKind::Serial,
            io::Error::new(io::ErrorKind::NotFound, "no such device"),
        );
        assert!(err.is_connect());
        assert_eq!(err.transport(), TransportKind::Serial);
        assert_eq!(err.to_string(), "serial connect failed: no such device");

        let err = TransportError::io(
            TransportKind::Udp,
            io::Error::new(io::ErrorKind::ConnectionReset, "reset"),
        );
        assert!(!err.is_connect());
        assert_eq!(err.to_string(), "udp I/O error: reset");
    }
}
