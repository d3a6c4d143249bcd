//! Scriptable in-memory session for exercising the acquisition engine.
//!
//! A `MockSession` fails its first N opens, then serves one scripted frame list
//! per successful open. Once a script runs out the session blocks in
//! `read_frame` like a quiet device would. A shared [`MockProbe`] records what
//! the engine did to the session so tests can check resource discipline.

use super::TransportSession;
use crate::config::TransportKind;
use crate::error::TransportError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

/// One scripted step of a connection.
#[derive(Clone, Debug, PartialEq)]
pub enum MockFrame {
    /// Deliver this text as the next frame.
    Line(String),
    /// Fail the read with an I/O error.
    Fail,
    /// Never return.
    Block,
}

impl MockFrame {
    pub fn line(text: impl Into<String>) -> Self {
        MockFrame::Line(text.into())
    }

    pub fn fail() -> Self {
        MockFrame::Fail
    }
}

#[derive(Debug, Default)]
struct ProbeState {
    open_attempts: AtomicUsize,
    opens: AtomicUsize,
    closes: AtomicUsize,
    overlapping_opens: AtomicUsize,
    live: AtomicBool,
    attempt_instants: Mutex<Vec<Instant>>,
}

/// Shared view of what happened to a [`MockSession`].
#[derive(Clone, Debug, Default)]
pub struct MockProbe {
    state: Arc<ProbeState>,
}

impl MockProbe {
    /// Calls to `open`, successful or not.
    pub fn open_attempts(&self) -> usize {
        self.state.open_attempts.load(Ordering::SeqCst)
    }

    /// Successful opens.
    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    /// Closes of a live handle. Closing an already-closed session is not counted.
    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Opens performed while a handle was still live. Always zero for a well-behaved caller.
    pub fn overlapping_opens(&self) -> usize {
        self.state.overlapping_opens.load(Ordering::SeqCst)
    }

    pub fn is_live(&self) -> bool {
        self.state.live.load(Ordering::SeqCst)
    }

    /// When each open attempt happened, in order.
    pub fn attempt_instants(&self) -> Vec<Instant> {
        self.state.attempt_instants.lock().clone()
    }
}

pub struct MockSession {
    kind: TransportKind,
    connect_failures: u32,
    connections: VecDeque<Vec<MockFrame>>,
    current: VecDeque<MockFrame>,
    open: bool,
    probe: MockProbe,
}

impl MockSession {
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            connect_failures: 0,
            connections: VecDeque::new(),
            current: VecDeque::new(),
            open: false,
            probe: MockProbe::default(),
        }
    }

    /// Fail the next `count` open attempts.
    pub fn fail_connects(mut self, count: u32) -> Self {
        self.connect_failures = count;
        self
    }

    /// Script the frames served by the next successful open.
    pub fn connection(mut self, frames: impl IntoIterator<Item = MockFrame>) -> Self {
        self.connections.push_back(frames.into_iter().collect());
        self
    }

    pub fn probe(&self) -> MockProbe {
        self.probe.clone()
    }
}

#[async_trait]
impl TransportSession for MockSession {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn describe(&self) -> String {
        format!("mock:{}", self.kind)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self) -> Result<(), TransportError> {
        let state = &self.probe.state;
        state.open_attempts.fetch_add(1, Ordering::SeqCst);
        state.attempt_instants.lock().push(Instant::now());

        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(TransportError::connect(
                self.kind,
                io::Error::new(io::ErrorKind::ConnectionRefused, "mock device unavailable"),
            ));
        }

        if self.open || state.live.load(Ordering::SeqCst) {
            state.overlapping_opens.fetch_add(1, Ordering::SeqCst);
        }
        self.open = true;
        state.live.store(true, Ordering::SeqCst);
        state.opens.fetch_add(1, Ordering::SeqCst);
        self.current = self.connections.pop_front().unwrap_or_default().into();
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<String, TransportError> {
        if !self.open {
            return Err(TransportError::io(
                self.kind,
                io::Error::new(io::ErrorKind::NotConnected, "mock session not open"),
            ));
        }

        match self.current.pop_front() {
            Some(MockFrame::Line(text)) => Ok(text),
            Some(MockFrame::Fail) => Err(TransportError::io(
                self.kind,
                io::Error::new(io::ErrorKind::BrokenPipe, "mock link dropped"),
            )),
            Some(MockFrame::Block) | None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.probe.state.live.store(false, Ordering::SeqCst);
            self.probe.state.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}
