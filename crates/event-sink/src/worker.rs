//! The delivery loop and the public sink handle.
//!
//! One background task owns the accumulator, compressor, and delivery
//! client exclusively; the bounded queue is the only structure both threads
//! touch. Deliveries are strictly sequential, events flow one direction,
//! and the only control signal flowing backwards is shutdown.

use crate::batch::{BatchAccumulator, FlushReason};
use crate::compress;
use crate::config::SinkConfig;
use crate::error::SinkResult;
use crate::event::Event;
use crate::queue::{self, QueueConsumer, QueueProducer};
use crate::sender::DeliverySender;
use std::sync::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

/// Handle to a running event sink.
///
/// `enqueue` is the producer-side entry point: synchronous, non-blocking,
/// and safe to call at arbitrarily high frame rates. Everything else
/// happens on the background worker.
pub struct EventSink {
    producer: QueueProducer,
    config: SinkConfig,
    shutdown_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventSink {
    /// Validate the configuration and start the background delivery worker.
    pub fn start(mut config: SinkConfig) -> SinkResult<Self> {
        config.validate()?;

        let (producer, consumer) = queue::bounded(config.queue_capacity);
        let sender = DeliverySender::new(&config)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = DeliveryWorker {
            consumer,
            accumulator: BatchAccumulator::new(&config),
            sender,
            gzip_level: config.gzip.then_some(config.gzip_level),
            shutdown: shutdown_rx,
            endpoint: config.endpoint.clone(),
            batches_dropped: 0,
        };
        let handle = tokio::spawn(worker.run());

        Ok(Self {
            producer,
            config,
            shutdown_tx,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Offer one event to the sink without blocking.
    ///
    /// Events whose topic is outside the configured filter are accepted and
    /// discarded by policy. Returns `false` only when the bounded queue
    /// rejected the event (capacity reached), which also counts a drop.
    pub fn enqueue(&self, event: Event) -> bool {
        if !self.config.accepts_topic(&event.topic) {
            trace!(topic = %event.topic, "event topic filtered out");
            return true;
        }
        self.producer.enqueue(event)
    }

    /// Total events dropped at the queue boundary since startup.
    pub fn dropped_events(&self) -> u64 {
        self.producer.dropped_events()
    }

    /// Signal shutdown and wait for the worker to finish its drain.
    ///
    /// The worker flushes the current partial batch through one final
    /// compress-and-deliver cycle under the normal retry budget, so this
    /// completes in bounded time even against an unreachable endpoint.
    /// Idempotent; later calls return once the worker is gone.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handle = self.worker.lock().expect("lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

/// The single long-lived background worker.
struct DeliveryWorker {
    consumer: QueueConsumer,
    accumulator: BatchAccumulator,
    sender: DeliverySender,
    gzip_level: Option<u32>,
    shutdown: watch::Receiver<bool>,
    endpoint: String,
    batches_dropped: u64,
}

impl DeliveryWorker {
    async fn run(mut self) {
        info!(endpoint = %self.endpoint, "event sink worker started");

        loop {
            let flush_at = self.accumulator.deadline();

            tokio::select! {
                received = self.consumer.recv() => match received {
                    Some(event) => {
                        self.ingest(event).await;
                        for event in self.consumer.drain_available() {
                            self.ingest(event).await;
                        }
                    }
                    // Every producer handle is gone; drain what we hold.
                    None => break,
                },
                _ = sleep_until_deadline(flush_at) => {
                    if let Some(reason) = self.accumulator.ready_reason() {
                        self.flush(reason, false).await;
                    }
                }
                _ = self.shutdown.changed() => break,
            }
        }

        self.drain().await;
        info!(
            batches_dropped = self.batches_dropped,
            "event sink worker stopped"
        );
    }

    /// Append one event and flush as soon as a threshold trips.
    async fn ingest(&mut self, event: Event) {
        self.accumulator.push(event);
        if let Some(reason) = self.accumulator.ready_reason() {
            self.flush(reason, false).await;
        }
    }

    /// Final flush cycle: pull whatever is still buffered, then force the
    /// partial batch out. An empty batch is discarded without a delivery
    /// attempt, and drain deliveries keep the normal retry budget.
    async fn drain(&mut self) {
        for event in self.consumer.drain_available() {
            self.accumulator.push(event);
            if let Some(reason) = self.accumulator.ready_reason() {
                self.flush(reason, true).await;
            }
        }
        if !self.accumulator.is_empty() {
            self.flush(FlushReason::Drain, true).await;
        }
    }

    /// Close the current batch and run it through compress-and-deliver.
    ///
    /// No failure escapes: serialization errors and delivery failures alike
    /// are logged, counted, and the batch is dropped so the loop continues
    /// with the next one.
    async fn flush(&mut self, reason: FlushReason, draining: bool) {
        let events = self.accumulator.take();
        if events.is_empty() {
            return;
        }
        let count = events.len();

        let (payload, encoding) = match compress::encode_batch(&events, self.gzip_level) {
            Ok(encoded) => encoded,
            Err(e) => {
                self.batches_dropped += 1;
                error!(events = count, error = %e, "dropping unserializable batch");
                return;
            }
        };

        let cancel = (!draining).then(|| self.shutdown.clone());
        match self.sender.deliver(&payload, encoding, cancel).await {
            Ok(()) => {
                debug!(
                    events = count,
                    payload_bytes = payload.len(),
                    reason = reason.as_str(),
                    "batch flushed"
                );
            }
            Err(e) => {
                self.batches_dropped += 1;
                error!(
                    events = count,
                    reason = reason.as_str(),
                    error = %e,
                    "dropping batch after delivery failure"
                );
            }
        }
    }
}

/// Sleep until the batch age deadline, or forever when no batch is open.
async fn sleep_until_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
