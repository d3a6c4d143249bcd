//! Retrying acquisition supervisor.
//!
//! An [`AcquisitionLoop`] owns exactly one [`TransportSession`] and drives it
//! through a small state machine until shutdown:
//!
//! ```text
//! Idle -> Connecting -> Streaming
//!            ^   |          |
//!            |   v          v (read failure: session closed first)
//!            Backoff <------+
//!
//! any state -> Closed   (shutdown observed; session closed, no retry)
//! ```
//!
//! Transport errors never escape the loop: they are logged once per reconnect
//! attempt and followed by the fixed backoff of the [`RetryPolicy`]. Frames that
//! do not decode to an integer are dropped without delay. The only way out is
//! the [`ShutdownSignal`], which is raced against every blocking operation so an
//! in-flight read is abandoned and the session is still closed by the loop
//! itself before it returns.

use crate::adapters::TransportSession;
use crate::data::{Normalizer, ValueQueue};
use crate::error::TransportError;
use crate::error_recovery::RetryPolicy;
use crate::shutdown::ShutdownSignal;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Observable state of an acquisition loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Connecting,
    Streaming,
    Backoff,
    Closed,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Idle => "idle",
            LoopState::Connecting => "connecting",
            LoopState::Streaming => "streaming",
            LoopState::Backoff => "backoff",
            LoopState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Running counters for one loop.
#[derive(Debug, Default)]
pub struct LoopStats {
    connect_attempts: AtomicU64,
    connect_failures: AtomicU64,
    stream_failures: AtomicU64,
    frames_received: AtomicU64,
    frames_skipped: AtomicU64,
    samples_produced: AtomicU64,
}

/// Point-in-time copy of [`LoopStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub stream_failures: u64,
    pub frames_received: u64,
    pub frames_skipped: u64,
    pub samples_produced: u64,
}

impl LoopStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            stream_failures: self.stream_failures.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            samples_produced: self.samples_produced.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// How a streaming phase ended.
enum StreamEnd {
    Shutdown,
    Failed(TransportError),
}

pub struct AcquisitionLoop {
    session: Box<dyn TransportSession>,
    queue: ValueQueue,
    normalizer: Normalizer,
    retry: RetryPolicy,
    state_tx: watch::Sender<LoopState>,
    stats: Arc<LoopStats>,
}

impl AcquisitionLoop {
    pub fn new(
        session: Box<dyn TransportSession>,
        queue: ValueQueue,
        normalizer: Normalizer,
        retry: RetryPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(LoopState::Idle);
        Self {
            session,
            queue,
            normalizer,
            retry,
            state_tx,
            stats: Arc::new(LoopStats::default()),
        }
    }

    /// Subscribe to state transitions.
    pub fn state(&self) -> watch::Receiver<LoopState> {
        self.state_tx.subscribe()
    }

    pub fn stats(&self) -> Arc<LoopStats> {
        Arc::clone(&self.stats)
    }

    /// Run until `shutdown` fires. The session is closed on return.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        let endpoint = self.session.describe();
        info!(endpoint = %endpoint, "Acquisition loop started");

        while !shutdown.is_shutdown() {
            self.set_state(LoopState::Connecting);
            LoopStats::bump(&self.stats.connect_attempts);

            let opened = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                opened = self.session.open() => opened,
            };

            if let Err(e) = opened {
                LoopStats::bump(&self.stats.connect_failures);
                warn!(
                    endpoint = %endpoint,
                    error = %e,
                    retry_in_ms = self.retry.backoff_delay.as_millis() as u64,
                    "Connect failed, retrying"
                );
                if !self.backoff(&mut shutdown).await {
                    break;
                }
                continue;
            }

            info!(endpoint = %endpoint, "Streaming");
            self.set_state(LoopState::Streaming);

            let end = self.stream(&mut shutdown).await;
            self.session.close().await;

            match end {
                StreamEnd::Shutdown => break,
                StreamEnd::Failed(e) => {
                    LoopStats::bump(&self.stats.stream_failures);
                    warn!(
                        endpoint = %endpoint,
                        error = %e,
                        retry_in_ms = self.retry.backoff_delay.as_millis() as u64,
                        "Link lost, reconnecting"
                    );
                    if !self.backoff(&mut shutdown).await {
                        break;
                    }
                }
            }
        }

        // No-op unless shutdown interrupted an open.
        self.session.close().await;
        self.set_state(LoopState::Closed);
        info!(endpoint = %endpoint, "Acquisition loop stopped");
    }

    async fn stream(&mut self, shutdown: &mut ShutdownSignal) -> StreamEnd {
        loop {
            let frame = tokio::select! {
                biased;
                _ = shutdown.recv() => return StreamEnd::Shutdown,
                frame = self.session.read_frame() => frame,
            };

            match frame {
                Ok(text) => self.ingest(&text),
                Err(e) => return StreamEnd::Failed(e),
            }
        }
    }

    fn ingest(&self, frame: &str) {
        LoopStats::bump(&self.stats.frames_received);
        match self.normalizer.decode(frame) {
            Some(sample) => {
                self.queue.push(sample);
                LoopStats::bump(&self.stats.samples_produced);
            }
            None => {
                LoopStats::bump(&self.stats.frames_skipped);
                trace!(frame = %frame.escape_debug(), "Skipping malformed frame");
            }
        }
    }

    async fn backoff(&mut self, shutdown: &mut ShutdownSignal) -> bool {
        self.set_state(LoopState::Backoff);
        self.retry.wait(shutdown).await
    }

    fn set_state(&self, state: LoopState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Loop state change");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockFrame, MockSession};
    use crate::config::TransportKind;
    use crate::data::Sample;
    use crate::shutdown;
    use std::time::Duration;
    use tracing_test::traced_test;

    fn acquisition(session: MockSession, queue: &ValueQueue, delay_ms: u64) -> AcquisitionLoop {
        AcquisitionLoop::new(
            Box::new(session),
            queue.clone(),
            Normalizer::default(),
            RetryPolicy::fixed(Duration::from_millis(delay_ms)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_decodes_and_skips_in_one_connection() {
        let queue = ValueQueue::new();
        let session = MockSession::new(TransportKind::Serial).connection([
            MockFrame::line("0\n"),
            MockFrame::line("abc\n"),
            MockFrame::line("\n"),
            MockFrame::line("1023\n"),
        ]);
        let probe = session.probe();
        let acq = acquisition(session, &queue, 1000);
        let stats = acq.stats();
        let mut state = acq.state();

        let (handle, signal) = shutdown::channel();
        let task = tokio::spawn(acq.run(signal));

        while queue.len() < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(*state.borrow_and_update(), LoopState::Streaming);

        handle.shutdown();
        task.await.unwrap();

        assert_eq!(queue.drain(), vec![Sample::new(0.0), Sample::new(24.0)]);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_received, 4);
        assert_eq!(snapshot.frames_skipped, 2);
        assert_eq!(snapshot.samples_produced, 2);
        // malformed frames never cause a reconnect
        assert_eq!(probe.open_attempts(), 1);
        assert_eq!(probe.opens(), probe.closes());
        assert_eq!(*state.borrow(), LoopState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_closes_then_backs_off() {
        let queue = ValueQueue::new();
        let session = MockSession::new(TransportKind::Udp)
            .connection([MockFrame::line("100"), MockFrame::fail()])
            .connection([MockFrame::line("200")]);
        let probe = session.probe();
        let acq = acquisition(session, &queue, 500);

        let (handle, signal) = shutdown::channel();
        let task = tokio::spawn(acq.run(signal));

        while queue.len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.shutdown();
        task.await.unwrap();

        assert_eq!(probe.opens(), 2);
        assert_eq!(probe.closes(), 2);
        assert_eq!(probe.overlapping_opens(), 0);

        let attempts = probe.attempt_instants();
        assert_eq!(attempts.len(), 2);
        assert!(attempts[1] - attempts[0] >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_backoff_is_prompt() {
        let queue = ValueQueue::new();
        let session = MockSession::new(TransportKind::Serial).fail_connects(u32::MAX);
        let probe = session.probe();
        let acq = acquisition(session, &queue, 60_000);
        let mut state = acq.state();

        let (handle, signal) = shutdown::channel();
        let task = tokio::spawn(acq.run(signal));

        state.wait_for(|s| *s == LoopState::Backoff).await.unwrap();
        let start = tokio::time::Instant::now();
        handle.shutdown();
        task.await.unwrap();

        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(probe.open_attempts(), 1);
        assert_eq!(probe.opens(), 0);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_already_shutdown_never_opens() {
        let queue = ValueQueue::new();
        let session = MockSession::new(TransportKind::Serial);
        let probe = session.probe();
        let acq = acquisition(session, &queue, 10);
        let mut state = acq.state();

        let (handle, signal) = shutdown::channel();
        handle.shutdown();
        acq.run(signal).await;

        assert_eq!(probe.open_attempts(), 0);
        assert_eq!(*state.borrow_and_update(), LoopState::Closed);
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_reconnect_attempts_are_logged() {
        let queue = ValueQueue::new();
        let session = MockSession::new(TransportKind::Serial).fail_connects(2);
        let probe = session.probe();
        let acq = acquisition(session, &queue, 100);
        let mut state = acq.state();

        let (handle, signal) = shutdown::channel();
        let run = acq.run(signal);
        let observe = async move {
            state
                .wait_for(|s| *s == LoopState::Streaming)
                .await
                .unwrap();
            handle.shutdown();
        };
        tokio::join!(run, observe);

        assert_eq!(probe.open_attempts(), 3);
        assert!(logs_contain("Connect failed, retrying"));
    }
}
