use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::counter::{ConcurrentHashCounter, Counter};
use super::hash::AHashProvider;
use super::queue::{ConditionalQueue, TwoLockQueue};
use super::record::ExpiryRecord;
use super::sweeper::{SweepPool, Sweeper};
use crate::error::{GateError, Result};
use crate::telemetry::Metrics;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Admission engine settings. A single threshold and window apply to every key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionConfig {
    /// Occurrences of a key allowed inside one window; later ones are blocked. Must be > 0.
    pub threshold: u64,
    /// Trailing span after which a key's count is forgotten.
    pub window: Duration,
    /// Sweep pool size.
    pub workers: usize,
    /// Sweep timer period. Should be small relative to `window`.
    pub sweep_interval: Duration,
}

impl AdmissionConfig {
    /// Threshold and window with the default pool: 3 workers ticking every 10ms.
    pub fn new(threshold: u64, window: Duration) -> Self {
        Self { threshold, window, workers: 3, sweep_interval: Duration::from_millis(10) }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }
}

/// Decides, per key, whether a request must be blocked.
///
/// Each [`handle`](Self::handle) counts one occurrence of the key. A key seen
/// `threshold` times inside its window is blocked until a sweep forgets it.
/// The window of a key starts at its first occurrence since the last reset;
/// [`start`](Self::start) launches the sweep workers that enforce it.
///
/// # Example
/// ```ignore
/// use std::time::Duration;
/// use hitgate_lib::admission::{AdmissionConfig, AdmissionService};
///
/// let service = AdmissionService::with_defaults(AdmissionConfig::new(3, Duration::from_secs(1)));
/// service.start()?;
///
/// assert!(!service.handle("https://example.com"));
///
/// service.stop().await;
/// ```
pub struct AdmissionService<K: ?Sized + 'static> {
    config: AdmissionConfig,
    counter: Arc<dyn Counter<K>>,
    queue: Arc<dyn ConditionalQueue<ExpiryRecord>>,
    pool: SweepPool,
    metrics: Option<Arc<Metrics>>,
    state: AtomicU8,
}

impl AdmissionService<str> {
    /// String keys hashed with [`AHashProvider`], counted by
    /// [`ConcurrentHashCounter`] and expired through a [`TwoLockQueue`].
    pub fn with_defaults(config: AdmissionConfig) -> Self {
        Self::new(
            config,
            ConcurrentHashCounter::new(AHashProvider::<str>::new()),
            TwoLockQueue::new(),
        )
    }
}

impl<K: ?Sized + 'static> AdmissionService<K> {
    pub fn new<C, Q>(config: AdmissionConfig, counter: C, queue: Q) -> Self
    where
        C: Counter<K> + 'static,
        Q: ConditionalQueue<ExpiryRecord> + 'static,
    {
        let pool = SweepPool::new(config.workers, config.sweep_interval);
        Self {
            config,
            counter: Arc::new(counter),
            queue: Arc::new(queue),
            pool,
            metrics: None,
            state: AtomicU8::new(IDLE),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Launch the sweep workers on the current tokio runtime.
    ///
    /// Calling it again, or after [`stop`](Self::stop), does nothing.
    pub fn start(&self) -> Result<()> {
        tokio::runtime::Handle::try_current()
            .map_err(|e| GateError::Runtime(format!("sweep workers need a tokio runtime: {e}")))?;

        if self
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("admission service already started or stopped, ignoring start");
            return Ok(());
        }

        self.pool.start(Sweeper::new(
            Arc::clone(&self.counter),
            Arc::clone(&self.queue),
            self.config.window,
            self.metrics.clone(),
        ));

        info!(
            threshold = self.config.threshold,
            window_ms = self.config.window.as_millis() as u64,
            workers = self.config.workers,
            sweep_interval_ms = self.config.sweep_interval.as_millis() as u64,
            "admission service started"
        );
        Ok(())
    }

    /// Count one occurrence of `key` and return `true` if the request must be blocked.
    ///
    /// The first occurrence of a key since its last reset schedules its expiry.
    /// The expiry record is appended before returning, so a sweep can never
    /// run ahead of the record for the occurrence that opened the window.
    pub fn handle(&self, key: &K) -> bool {
        let started = Instant::now();
        let (previous, fingerprint) = self.counter.report(key);

        let blocked = if previous >= self.config.threshold {
            true
        } else {
            if previous == 0 {
                self.queue.enqueue(ExpiryRecord::new(fingerprint));
                if let Some(m) = &self.metrics {
                    m.record_expiry_scheduled();
                }
            }
            false
        };

        if let Some(m) = &self.metrics {
            m.record_admission(blocked, started.elapsed().as_secs_f64());
        }
        blocked
    }

    /// Stop the sweep workers, wait for them to exit and drop all state.
    ///
    /// When this returns no worker is mid-sweep and both the queue and the
    /// counter are empty, apart from reports that race with the shutdown.
    pub async fn stop(&self) {
        let previous = self.state.swap(STOPPED, Ordering::AcqRel);
        if previous == STOPPED {
            warn!("admission service already stopped");
            return;
        }

        info!("stop requested, shutting down sweep workers");
        self.pool.shutdown().await;

        self.queue.drain();
        self.counter.drain();
        info!("admission service stopped");
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    /// Number of keys currently holding a count.
    pub fn tracked_keys(&self) -> usize {
        self.counter.len()
    }

    /// Number of expiry records waiting for their window to elapse.
    pub fn pending_expiries(&self) -> usize {
        self.queue.len()
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }
}

impl<K: ?Sized + 'static> fmt::Debug for AdmissionService<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionService")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("tracked_keys", &self.tracked_keys())
            .field("pending_expiries", &self.pending_expiries())
            .finish()
    }
}
