// Batch coordination for queued observation records
//
// One coordinator per process. Producers enqueue without taking the drain
// lock; the readiness check and the drain that follows run under it, so only
// one caller ever takes a given batch.

use parking_lot::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

mod aging_queue;

pub use aging_queue::AgingQueue;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Flush once this many records are pending
    pub max_size: usize,
    /// Flush once the oldest pending record is older than this
    pub max_age: Duration,
    /// Queue capacity before producers block (0 = unbounded)
    pub max_pending: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            max_age: Duration::from_secs(600),
            max_pending: 10_000,
        }
    }
}

/// Thread-safe batch orchestrator shared across ingestion call sites.
#[derive(Debug)]
pub struct BatchCoordinator<T = String> {
    config: BatchConfig,
    queue: AgingQueue<T>,
    drain_lock: Mutex<()>,
}

impl<T> BatchCoordinator<T> {
    /// Build a coordinator over a fresh queue.
    ///
    /// A bounded queue must hold at least one full batch, otherwise a full queue
    /// could never become ready by size. Smaller capacities are raised to
    /// `max_size`.
    pub fn new(mut config: BatchConfig) -> Self {
        if config.max_pending != 0 && config.max_pending < config.max_size {
            warn!(
                max_pending = config.max_pending,
                max_size = config.max_size,
                "Queue capacity below batch size, raising it to batch size"
            );
            config.max_pending = config.max_size;
        }
        let queue = AgingQueue::new(config.max_pending);
        Self {
            config,
            queue,
            drain_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn enqueue(&self, item: T) {
        self.queue.enqueue(item);
    }

    pub fn pending(&self) -> usize {
        self.queue.size()
    }

    pub fn age(&self) -> Duration {
        self.queue.age()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Take the pending batch if a threshold has been reached.
    ///
    /// The count drained is the queue size observed under the drain lock;
    /// records enqueued concurrently after that wait for the next batch.
    pub fn take_ready(&self) -> Option<Vec<T>> {
        let _guard = self.drain_lock.lock();

        let current_size = self.queue.size();
        let age = self.queue.age();
        let ready = age > self.config.max_age || current_size >= self.config.max_size;

        debug!(
            pending = current_size,
            age_ms = age.as_millis() as u64,
            ready,
            "batch readiness check"
        );

        if !ready || current_size == 0 {
            return None;
        }

        Some(self.drain(current_size))
    }

    /// Take everything pending regardless of thresholds.
    pub fn drain_all(&self) -> Vec<T> {
        let _guard = self.drain_lock.lock();
        let current_size = self.queue.size();
        self.drain(current_size)
    }

    // Callers hold the drain lock, so nobody else removes items meanwhile and
    // `dequeue` never waits.
    fn drain(&self, count: usize) -> Vec<T> {
        (0..count).map(|_| self.queue.dequeue()).collect()
    }
}
