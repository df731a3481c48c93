//! Queue drain loop.
//!
//! One [`DeliverySender`] task per process takes the oldest queued entry,
//! posts it with bounded retries and exponential backoff, and acknowledges
//! it in the queue once the endpoint answers 2xx. Entries are delivered in
//! insertion order; a failing head entry blocks the ones behind it.
//!
//! Failed attempts feed a [`CircuitBreaker`]. While the circuit is open the
//! loop makes no requests at all; it sleeps out the cool-down, closes the
//! circuit and starts a fresh attempt cycle on the same entry.
//!
//! Cancellation is observed between attempts and while sleeping. An HTTP
//! request already in flight runs to completion or to its timeout.

use crate::breaker::{CircuitBreaker, CircuitState};
use crate::client::HttpDelivery;
use scanbridge_core::constants::{
    BACKOFF_BASE_MS, CIRCUIT_COOLDOWN_SECS, CIRCUIT_FAILURE_THRESHOLD, IDLE_INTERVAL_MS,
    MAX_DELIVERY_ATTEMPTS, REQUEST_TIMEOUT_SECS,
};
use scanbridge_storage::{QueueEntry, QueueStore};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Retry, backoff and circuit tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderConfig {
    /// Attempts per entry before giving up on this cycle
    pub max_attempts: u32,

    /// Consecutive failed attempts that open the circuit
    pub failure_threshold: u32,

    /// How long the circuit stays open
    pub cooldown: Duration,

    /// Pause between peeks of an empty queue
    pub idle_interval: Duration,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,

    /// Backoff before attempt `n + 1` is `backoff_base * 2^(n - 1)`
    pub backoff_base: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_DELIVERY_ATTEMPTS,
            failure_threshold: CIRCUIT_FAILURE_THRESHOLD,
            cooldown: Duration::from_secs(CIRCUIT_COOLDOWN_SECS),
            idle_interval: Duration::from_millis(IDLE_INTERVAL_MS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            backoff_base: Duration::from_millis(BACKOFF_BASE_MS),
        }
    }
}

impl SenderConfig {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Delay before the attempt following failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1 << exponent)
    }
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    failed_attempts: AtomicU64,
    circuit_open: AtomicBool,
}

/// Point-in-time sender statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SenderStats {
    pub delivered: u64,
    pub failed_attempts: u64,
    pub circuit: CircuitState,
}

enum Outcome {
    Delivered,
    Failed,
    Cancelled,
}

/// Drains a [`QueueStore`] to HTTP endpoints.
pub struct DeliverySender {
    queue: QueueStore,
    client: HttpDelivery,
    config: SenderConfig,
    breaker: CircuitBreaker,
    counters: Arc<Counters>,
    cancel: CancellationToken,
}

impl DeliverySender {
    /// Build a sender with its own HTTP client.
    pub fn new(queue: QueueStore, config: SenderConfig) -> Result<Self, crate::DeliveryError> {
        let client = HttpDelivery::new(config.request_timeout)?;
        Ok(Self::with_client(queue, client, config))
    }

    pub fn with_client(queue: QueueStore, client: HttpDelivery, config: SenderConfig) -> Self {
        Self {
            queue,
            client,
            breaker: CircuitBreaker::new(config.failure_threshold, config.cooldown),
            config,
            counters: Arc::new(Counters::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Spawn the drain loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> SenderHandle {
        let counters = Arc::clone(&self.counters);
        let cancel = self.cancel.clone();
        SenderHandle {
            counters,
            cancel,
            task: tokio::spawn(self.run()),
        }
    }

    async fn run(mut self) {
        info!(
            max_attempts = self.config.max_attempts,
            threshold = self.config.failure_threshold,
            cooldown_secs = self.config.cooldown.as_secs(),
            "delivery sender started"
        );

        while !self.cancel.is_cancelled() {
            if let Some(wait) = self.breaker.remaining_cooldown(Instant::now()) {
                if !self.pause(wait).await {
                    break;
                }
                if self.breaker.close(Instant::now()) {
                    self.counters.circuit_open.store(false, Ordering::Relaxed);
                    info!("delivery circuit closed");
                }
                continue;
            }

            let entry = match self.queue.peek_front().await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    if !self.pause(self.config.idle_interval).await {
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "failed to read delivery queue");
                    if !self.pause(self.config.idle_interval).await {
                        break;
                    }
                    continue;
                }
            };

            match self.deliver(&entry).await {
                Outcome::Delivered => self.acknowledge(&entry).await,
                Outcome::Failed => {}
                Outcome::Cancelled => break,
            }
        }

        info!("delivery sender stopped");
    }

    async fn deliver(&mut self, entry: &QueueEntry) -> Outcome {
        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 && !self.pause(self.config.backoff(attempt - 1)).await {
                return Outcome::Cancelled;
            }

            match self.client.post(&entry.url, &entry.payload).await {
                Ok(status) => {
                    info!(
                        entry_id = entry.id,
                        attempt,
                        status = status.as_u16(),
                        "event delivered"
                    );
                    self.breaker.record_success();
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                    return Outcome::Delivered;
                }
                Err(e) => {
                    warn!(
                        entry_id = entry.id,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        status = e.status(),
                        error = %e,
                        "delivery attempt failed"
                    );
                    self.counters.failed_attempts.fetch_add(1, Ordering::Relaxed);

                    if self.breaker.record_failure(Instant::now()) {
                        self.counters.circuit_open.store(true, Ordering::Relaxed);
                        warn!(
                            entry_id = entry.id,
                            failures = self.breaker.consecutive_failures(),
                            cooldown_secs = self.config.cooldown.as_secs(),
                            "delivery circuit opened"
                        );
                        return Outcome::Failed;
                    }
                }
            }

            if self.cancel.is_cancelled() {
                return Outcome::Cancelled;
            }
        }

        debug!(entry_id = entry.id, "retry ceiling reached, entry stays queued");
        Outcome::Failed
    }

    /// Remove a delivered entry. On failure it stays queued and is sent again.
    async fn acknowledge(&self, entry: &QueueEntry) {
        match self.queue.remove(entry.id).await {
            Ok(true) => {}
            Ok(false) => debug!(entry_id = entry.id, "delivered entry already gone"),
            Err(e) => error!(
                entry_id = entry.id,
                error = %e,
                "failed to remove delivered entry, it will be delivered again"
            ),
        }
    }

    /// Sleep unless cancelled first. Returns `false` on cancellation.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }
}

/// Handle to a running sender.
pub struct SenderHandle {
    counters: Arc<Counters>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SenderHandle {
    pub fn stats(&self) -> SenderStats {
        SenderStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed_attempts: self.counters.failed_attempts.load(Ordering::Relaxed),
            circuit: if self.counters.circuit_open.load(Ordering::Relaxed) {
                CircuitState::Open
            } else {
                CircuitState::Closed
            },
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the loop and wait for it, letting an in-flight request finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await
            && e.is_panic()
        {
            error!(error = %e, "delivery sender task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_config_defaults() {
        let config = SenderConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.cooldown, Duration::from_secs(60));
        assert_eq!(config.idle_interval, Duration::from_millis(500));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[rstest]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(3, 4)]
    #[case(4, 8)]
    fn test_backoff_doubles(#[case] attempt: u32, #[case] secs: u64) {
        assert_eq!(SenderConfig::default().backoff(attempt), Duration::from_secs(secs));
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = SenderConfig::default();
        assert_eq!(config.backoff(1000), config.backoff(17));
    }

    #[test]
    fn test_builder_clamps_zero() {
        let config = SenderConfig::default()
            .with_max_attempts(0)
            .with_failure_threshold(0);
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.failure_threshold, 1);
    }
}
