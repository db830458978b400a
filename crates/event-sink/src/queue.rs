//! Bounded event queue between the producing pipeline and the delivery worker.
//!
//! The queue is the single synchronized boundary in the sink and its only
//! backpressure mechanism: when it is full, `enqueue` drops the event and
//! returns `false` instead of blocking, so a slow or unavailable endpoint
//! can never stall the live processing path.

use crate::event::Event;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Minimum interval between queue-full warnings.
const DROP_WARN_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

/// Producer-side handle. Cheap to clone; every operation is non-blocking.
#[derive(Clone)]
pub struct QueueProducer {
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
    last_drop_warn: Arc<Mutex<Option<Instant>>>,
}

/// Consumer-side handle, owned exclusively by the delivery worker.
pub struct QueueConsumer {
    rx: mpsc::Receiver<Event>,
}

/// Create a bounded queue with the given capacity.
pub fn bounded(capacity: usize) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        QueueProducer {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            last_drop_warn: Arc::new(Mutex::new(None)),
        },
        QueueConsumer { rx },
    )
}

impl QueueProducer {
    /// Attempt to add one event without blocking.
    ///
    /// Returns `false` and counts a drop when the queue is at capacity or
    /// the consumer is gone. Queue-full warnings are rate-limited so a
    /// sustained overflow does not flood the logs.
    pub fn enqueue(&self, event: Event) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                self.warn_rate_limited(total);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("event queue closed, dropping event");
                false
            }
        }
    }

    /// Total number of events dropped because the queue was full or closed.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn warn_rate_limited(&self, dropped_total: u64) {
        let mut last = self.last_drop_warn.lock().expect("lock poisoned");
        let due = match *last {
            Some(at) => at.elapsed() >= DROP_WARN_INTERVAL,
            None => true,
        };
        if due {
            *last = Some(Instant::now());
            warn!(dropped_total, "event queue full, dropping events");
        }
    }
}

impl QueueConsumer {
    /// Wait for the next event.
    ///
    /// This is the worker's suspension point when the queue is empty; the
    /// worker awaits it inside a `select!` together with the shutdown
    /// signal, so the wait is always interruptible.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Remove and return every currently buffered event without waiting.
    pub fn drain_available(&mut self) -> Vec<Event> {
        let mut drained = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            drained.push(event);
        }
        drained
    }
}
