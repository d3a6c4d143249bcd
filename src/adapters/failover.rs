//! Ordered fallback across several transports.
//!
//! `FailoverSession` presents a list of sessions as one. It keeps using the
//! active entry until that entry fails to open `failover_after` times in a row,
//! then moves to the next entry in priority order, wrapping back to the most
//! preferred one after the last. A successful open resets the count, so a link
//! that connects and later drops is retried in place first.

use super::TransportSession;
use crate::config::TransportKind;
use crate::error::{AppResult, DaqError, TransportError};
use async_trait::async_trait;
use tracing::info;

pub struct FailoverSession {
    sessions: Vec<Box<dyn TransportSession>>,
    active: usize,
    consecutive_failures: u32,
    failover_after: u32,
}

impl FailoverSession {
    pub fn new(sessions: Vec<Box<dyn TransportSession>>, failover_after: u32) -> AppResult<Self> {
        if sessions.is_empty() {
            return Err(DaqError::Configuration(
                "Failover requires at least one transport".to_string(),
            ));
        }
        Ok(Self {
            sessions,
            active: 0,
            consecutive_failures: 0,
            failover_after: failover_after.max(1),
        })
    }

    /// Index of the transport currently in use, in priority order.
    pub fn active_index(&self) -> usize {
        self.active
    }

    fn active_session(&mut self) -> &mut Box<dyn TransportSession> {
        &mut self.sessions[self.active]
    }
}

#[async_trait]
impl TransportSession for FailoverSession {
    fn kind(&self) -> TransportKind {
        self.sessions[self.active].kind()
    }

    fn describe(&self) -> String {
        self.sessions[self.active].describe()
    }

    fn is_open(&self) -> bool {
        self.sessions[self.active].is_open()
    }

    async fn open(&mut self) -> Result<(), TransportError> {
        match self.active_session().open().await {
            Ok(()) => {
                self.consecutive_failures = 0;
                Ok(())
            }
            Err(e) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.failover_after && self.sessions.len() > 1 {
                    let from = self.describe();
                    self.active = (self.active + 1) % self.sessions.len();
                    self.consecutive_failures = 0;
                    info!(from = %from, to = %self.describe(), "Failing over to next transport");
                }
                Err(e)
            }
        }
    }

    async fn read_frame(&mut self) -> Result<String, TransportError> {
        self.active_session().read_frame().await
    }

    async fn close(&mut self) {
        self.active_session().close().await;
    }
}
