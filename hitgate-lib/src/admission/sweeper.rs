//! Background expiry of counter entries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

use super::counter::Counter;
use super::queue::ConditionalQueue;
use super::record::ExpiryRecord;
use crate::telemetry::Metrics;

/// One sweep: evicts every record at the head of the queue whose window has elapsed.
pub struct Sweeper<K: ?Sized> {
    counter: Arc<dyn Counter<K>>,
    queue: Arc<dyn ConditionalQueue<ExpiryRecord>>,
    window: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl<K: ?Sized> Clone for Sweeper<K> {
    fn clone(&self) -> Self {
        Self {
            counter: Arc::clone(&self.counter),
            queue: Arc::clone(&self.queue),
            window: self.window,
            metrics: self.metrics.clone(),
        }
    }
}

impl<K: ?Sized> Sweeper<K> {
    pub fn new(
        counter: Arc<dyn Counter<K>>,
        queue: Arc<dyn ConditionalQueue<ExpiryRecord>>,
        window: Duration,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self { counter, queue, window, metrics }
    }

    /// Pop expired records and reset their counter entries until the head is
    /// absent or still live. Returns the number of evictions.
    ///
    /// Keeps going without waiting for another tick: several records may have
    /// aged out since the last one.
    pub fn sweep(&self) -> usize {
        let window = self.window;
        let mut evicted = 0usize;

        while let Some(record) = self
            .queue
            .dequeue_if(&mut |head: &ExpiryRecord| head.is_expired(Instant::now(), window))
        {
            self.counter.reset(record.fingerprint);
            trace!(fingerprint = record.fingerprint, "evicted expired key");
            evicted = evicted.saturating_add(1);
        }

        if let Some(m) = &self.metrics {
            m.record_sweep_pass(evicted);
        }
        evicted
    }
}

/// A fixed set of sweep workers sharing one periodic timer.
///
/// Every tick of the timer is consumed by exactly one worker, which runs a
/// [`Sweeper::sweep`]. Workers exit when the pool is shut down.
pub struct SweepPool {
    workers: usize,
    period: Duration,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl SweepPool {
    pub fn new(workers: usize, period: Duration) -> Self {
        Self {
            workers,
            // tokio's interval rejects a zero period
            period: period.max(Duration::from_millis(1)),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Spawn the workers on the current tokio runtime.
    pub fn start<K: ?Sized + 'static>(&self, sweeper: Sweeper<K>) {
        let mut timer = interval(self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let timer = Arc::new(Mutex::new(timer));

        for worker in 0..self.workers {
            let timer = Arc::clone(&timer);
            let cancel = self.cancel.clone();
            let sweeper = sweeper.clone();

            self.tracker.spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!(worker, "sweep worker stopped");
                            break;
                        }
                        _ = next_tick(&timer) => {
                            sweeper.sweep();
                        }
                    }
                }
            });
        }
    }

    /// Signal every worker and wait until all of them have exited.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

async fn next_tick(timer: &Mutex<Interval>) {
    timer.lock().await.tick().await;
}

impl Drop for SweepPool {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
