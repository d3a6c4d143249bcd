//! Reconnect policy for failed transports.
//!
//! Transport failures are always recoverable: the acquisition loop waits a
//! fixed delay and tries again, forever, because the device may come back at
//! any time. The wait itself is cancellable so shutdown never has to sit out a
//! full backoff period.

use crate::shutdown::ShutdownSignal;
use std::time::Duration;
use tokio::time::sleep;

/// Defines a policy for retrying a transport connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// The delay between a failure and the next attempt.
    pub backoff_delay: Duration,
}

impl RetryPolicy {
    pub fn fixed(backoff_delay: Duration) -> Self {
        Self { backoff_delay }
    }

    /// Sleep for the backoff delay.
    ///
    /// Returns `false` if shutdown was requested before the delay elapsed.
    pub async fn wait(&self, shutdown: &mut ShutdownSignal) -> bool {
        tokio::select! {
            biased;
            _ = shutdown.recv() => false,
            _ = sleep(self.backoff_delay) => true,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_delay: Duration::from_millis(1000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_full_delay() {
        let (_handle, mut signal) = shutdown::channel();
        let policy = RetryPolicy::fixed(Duration::from_millis(250));

        let start = Instant::now();
        assert!(policy.wait(&mut signal).await);
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_is_cut_short_by_shutdown() {
        let (handle, mut signal) = shutdown::channel();
        let policy = RetryPolicy::fixed(Duration::from_secs(3600));

        let start = Instant::now();
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            handle.shutdown();
        });
        assert!(!policy.wait(&mut signal).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
