//! UDP session: a passive receiver bound to a fixed local port.
//!
//! Each datagram carries one integer reading as UTF-8 text. Invalid UTF-8 is
//! decoded lossily and left for the frame decoder to reject.

use super::TransportSession;
use crate::config::TransportKind;
use crate::error::TransportError;
use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, trace};

/// Maximum UDP datagram size we'll receive.
const MAX_DATAGRAM_SIZE: usize = 65535;

pub struct UdpSession {
    bind_addr: SocketAddr,
    socket: Option<UdpSocket>,
    recv_buf: Vec<u8>,
}

impl UdpSession {
    /// Listen on `0.0.0.0:port`.
    pub fn new(port: u16) -> Self {
        Self::with_bind_addr(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
    }

    pub fn with_bind_addr(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            socket: None,
            recv_buf: Vec::new(),
        }
    }

    /// Address actually bound, while open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

#[async_trait]
impl TransportSession for UdpSession {
    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }

    fn describe(&self) -> String {
        format!("udp:{}", self.bind_addr)
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    async fn open(&mut self) -> Result<(), TransportError> {
        let socket = UdpSocket::bind(self.bind_addr)
            .await
            .map_err(|e| TransportError::connect(TransportKind::Udp, e))?;

        if self.recv_buf.len() != MAX_DATAGRAM_SIZE {
            self.recv_buf = vec![0u8; MAX_DATAGRAM_SIZE];
        }
        debug!(addr = ?socket.local_addr().ok(), "UDP socket bound");
        self.socket = Some(socket);
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<String, TransportError> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(TransportError::io(
                TransportKind::Udp,
                io::Error::new(io::ErrorKind::NotConnected, "UDP socket not bound"),
            ));
        };

        let (len, peer) = socket
            .recv_from(&mut self.recv_buf)
            .await
            .map_err(|e| TransportError::io(TransportKind::Udp, e))?;

        trace!(%peer, len, "Datagram received");
        Ok(String::from_utf8_lossy(&self.recv_buf[..len]).into_owned())
    }

    async fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            debug!(addr = ?socket.local_addr().ok(), "UDP socket closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> UdpSession {
        UdpSession::with_bind_addr(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
    }

    #[tokio::test]
    async fn test_receives_one_frame_per_datagram() {
        let mut session = loopback();
        session.open().await.unwrap();
        let addr = session.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"512", addr).await.unwrap();
        sender.send_to(b" 7\n", addr).await.unwrap();

        assert_eq!(session.read_frame().await.unwrap(), "512");
        assert_eq!(session.read_frame().await.unwrap(), " 7\n");

        session.close().await;
        assert!(session.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_connect_error() {
        let mut first = loopback();
        first.open().await.unwrap();
        let taken = first.local_addr().unwrap();

        let mut second = UdpSession::with_bind_addr(taken);
        let err = second.open().await.unwrap_err();
        assert!(err.is_connect());
        assert!(!second.is_open());

        // Releasing the first socket frees the port for a reopen.
        first.close().await;
        second.open().await.unwrap();
        second.close().await;
    }

    #[tokio::test]
    async fn test_read_before_open_fails() {
        let mut session = UdpSession::new(8000);
        assert!(session.read_frame().await.is_err());
        session.close().await;
        assert_eq!(session.describe(), "udp:0.0.0.0:8000");
    }
}
