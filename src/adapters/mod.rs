//! Transport session implementations
//!
//! A [`TransportSession`] is a thin, fail-fast wrapper around one OS resource
//! (a serial port or a UDP socket). It opens, yields one raw frame at a time and
//! closes. It never retries on its own; that is the job of the
//! [`AcquisitionLoop`](crate::acquisition::AcquisitionLoop).

pub mod failover;
pub mod mock;
pub mod serial_adapter;
pub mod udp_adapter;

pub use failover::FailoverSession;
pub use mock::{MockFrame, MockProbe, MockSession};
pub use serial_adapter::SerialSession;
pub use udp_adapter::UdpSession;

use crate::config::{TransportConfig, TransportKind};
use crate::error::TransportError;
use async_trait::async_trait;

/// Lifecycle of one transport resource.
///
/// Implementations own at most one live handle. `close` must be idempotent and
/// safe on a session that was never opened; after it returns the handle is
/// released.
#[async_trait]
pub trait TransportSession: Send {
    /// Which transport this session speaks.
    fn kind(&self) -> TransportKind;

    /// Human-readable endpoint description for diagnostics (e.g. "serial:/dev/ttyUSB0@115200").
    fn describe(&self) -> String;

    fn is_open(&self) -> bool;

    /// Acquire the underlying resource. Fails with [`TransportError::Connect`].
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Wait for the next raw frame. Fails with [`TransportError::Io`].
    async fn read_frame(&mut self) -> Result<String, TransportError>;

    /// Release the underlying resource. Never fails.
    async fn close(&mut self);
}

/// Build the session for one transport kind from configuration.
pub fn session_for(kind: TransportKind, config: &TransportConfig) -> Box<dyn TransportSession> {
    match kind {
        TransportKind::Serial => Box::new(SerialSession::new(
            config.port_name.clone(),
            config.baud_rate,
        )),
        TransportKind::Udp => Box::new(UdpSession::new(config.udp_port)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_for_follows_config() {
        let config = TransportConfig {
            port_name: "COM7".to_string(),
            baud_rate: 9600,
            udp_port: 9001,
            ..TransportConfig::default()
        };

        let serial = session_for(TransportKind::Serial, &config);
        assert_eq!(serial.kind(), TransportKind::Serial);
        assert_eq!(serial.describe(), "serial:COM7@9600");
        assert!(!serial.is_open());

        let udp = session_for(TransportKind::Udp, &config);
        assert_eq!(udp.kind(), TransportKind::Udp);
        assert_eq!(udp.describe(), "udp:0.0.0.0:9001");
    }
}
