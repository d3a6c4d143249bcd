//! Owner of every acquisition loop and the resources they hold.
//!
//! `CommunicationManager::start` and `CommunicationManager::shutdown` bracket
//! the lifetime of all transport sessions. Each loop runs in its own Tokio task
//! and closes its own session on exit; `shutdown` fires the shared signal and
//! then waits for every task, so when it returns no session handle is open.
//!
//! The priority list is interpreted according to [`PriorityPolicy`]:
//!
//! - `Concurrent`: one loop per listed transport, all pushing into the same
//!   queue. No ordering is defined between samples of different loops.
//! - `Failover`: a single loop over a [`FailoverSession`] that moves down the
//!   list after repeated connect failures.

use crate::acquisition::{AcquisitionLoop, LoopState, LoopStats, StatsSnapshot};
use crate::adapters::{session_for, FailoverSession, TransportSession};
use crate::config::{PriorityPolicy, Settings};
use crate::data::{Normalizer, Sample, ValueQueue};
use crate::error::{AppResult, DaqError};
use crate::error_recovery::RetryPolicy;
use crate::shutdown::{self, ShutdownHandle};
use futures::future::join_all;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Handle to one running loop.
struct Worker {
    endpoint: String,
    task: JoinHandle<()>,
    state: watch::Receiver<LoopState>,
    stats: Arc<LoopStats>,
}

pub struct CommunicationManager {
    settings: Settings,
    queue: ValueQueue,
    shutdown: Option<ShutdownHandle>,
    workers: Vec<Worker>,
}

impl CommunicationManager {
    pub fn new(settings: Settings) -> Self {
        let queue = ValueQueue::with_capacity_limit(settings.queue.capacity);
        Self {
            settings,
            queue,
            shutdown: None,
            workers: Vec::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build sessions from the configured priority list and start acquiring.
    ///
    /// Must be called from within a Tokio runtime. On error nothing is spawned.
    pub fn start(&mut self) -> AppResult<()> {
        self.settings.validate()?;
        let transport = &self.settings.transport;
        let sessions = transport
            .priority
            .iter()
            .map(|kind| session_for(*kind, transport))
            .collect();
        self.start_with_sessions(sessions)
    }

    /// Start acquiring from caller-supplied sessions, given in priority order.
    pub fn start_with_sessions(
        &mut self,
        sessions: Vec<Box<dyn TransportSession>>,
    ) -> AppResult<()> {
        if self.shutdown.is_some() {
            return Err(DaqError::AlreadyRunning);
        }
        if sessions.is_empty() {
            return Err(DaqError::Configuration(
                "At least one transport session is required".to_string(),
            ));
        }
        let runtime = Handle::try_current().map_err(|_| DaqError::NoRuntime)?;

        let loops: Vec<Box<dyn TransportSession>> = match self.settings.transport.policy {
            PriorityPolicy::Concurrent => sessions,
            PriorityPolicy::Failover => vec![Box::new(FailoverSession::new(
                sessions,
                self.settings.transport.failover_after,
            )?)],
        };

        let (handle, signal) = shutdown::channel();
        let normalizer = Normalizer::from(&self.settings.normalization);
        let retry = RetryPolicy::fixed(self.settings.transport.retry_delay());

        for session in loops {
            let endpoint = session.describe();
            let acquisition =
                AcquisitionLoop::new(session, self.queue.clone(), normalizer, retry.clone());
            let state = acquisition.state();
            let stats = acquisition.stats();
            let task = runtime.spawn(acquisition.run(signal.clone()));
            self.workers.push(Worker {
                endpoint,
                task,
                state,
                stats,
            });
        }
        self.shutdown = Some(handle);

        info!(
            loops = self.workers.len(),
            policy = ?self.settings.transport.policy,
            "Communication manager started"
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_some()
    }

    /// Shared handle to the sample queue.
    pub fn queue(&self) -> ValueQueue {
        self.queue.clone()
    }

    /// Take the next sample, if any arrived since the last poll.
    pub fn try_take(&self) -> Option<Sample> {
        self.queue.try_pop()
    }

    pub fn drain(&self) -> Vec<Sample> {
        self.queue.drain()
    }

    /// Current state of every loop, keyed by endpoint description.
    pub fn loop_states(&self) -> Vec<(String, LoopState)> {
        self.workers
            .iter()
            .map(|w| (w.endpoint.clone(), *w.state.borrow()))
            .collect()
    }

    /// Watch channels for every loop's state, in start order.
    pub fn state_receivers(&self) -> Vec<watch::Receiver<LoopState>> {
        self.workers.iter().map(|w| w.state.clone()).collect()
    }

    pub fn stats(&self) -> Vec<(String, StatsSnapshot)> {
        self.workers
            .iter()
            .map(|w| (w.endpoint.clone(), w.stats.snapshot()))
            .collect()
    }

    /// Stop every loop and wait until all sessions are closed.
    ///
    /// Safe to call repeatedly and without a prior successful `start`.
    pub async fn shutdown(&mut self) {
        let Some(handle) = self.shutdown.take() else {
            return;
        };
        handle.shutdown();

        let workers = std::mem::take(&mut self.workers);
        let (endpoints, tasks): (Vec<_>, Vec<_>) =
            workers.into_iter().map(|w| (w.endpoint, w.task)).unzip();

        for (endpoint, result) in endpoints.iter().zip(join_all(tasks).await) {
            if let Err(e) = result {
                error!(endpoint = %endpoint, error = %e, "Acquisition task ended abnormally");
            }
        }
        info!("Communication manager stopped");
    }
}

impl Drop for CommunicationManager {
    fn drop(&mut self) {
        // Loops still close their own sessions once they see the signal.
        if let Some(handle) = self.shutdown.take() {
            handle.shutdown();
        }
    }
}
