//! Batch accumulation under size, count, and time thresholds.

use crate::config::SinkConfig;
use crate::event::Event;
use std::time::Duration;
use tokio::time::Instant;

/// Why a batch was closed. Attached to flush logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Event count reached `max_batch_events`.
    Count,
    /// Cumulative serialized size reached `max_batch_bytes`.
    Bytes,
    /// `flush_interval` elapsed since the batch opened.
    Interval,
    /// Shutdown drain forced the flush.
    Drain,
}

impl FlushReason {
    /// Short label for log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            FlushReason::Count => "count",
            FlushReason::Bytes => "bytes",
            FlushReason::Interval => "interval",
            FlushReason::Drain => "drain",
        }
    }
}

/// The open batch plus its derived metadata.
#[derive(Debug)]
struct Batch {
    events: Vec<Event>,
    bytes: usize,
    /// Set when the first event lands; an empty batch has no age and never
    /// time-flushes.
    opened_at: Option<Instant>,
}

impl Batch {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            bytes: 0,
            opened_at: None,
        }
    }
}

/// Accumulates events pulled off the queue into batches.
///
/// Owned exclusively by the delivery worker; nothing here is shared across
/// threads. The worker pushes events, asks for the ready reason after each
/// push (and on timer wakeups), and takes the batch when one is due.
pub struct BatchAccumulator {
    current: Batch,
    max_events: usize,
    max_bytes: usize,
    flush_interval: Duration,
}

impl BatchAccumulator {
    pub fn new(config: &SinkConfig) -> Self {
        Self {
            current: Batch::new(),
            max_events: config.max_batch_events,
            max_bytes: config.max_batch_bytes,
            flush_interval: config.flush_interval,
        }
    }

    /// Append one event to the open batch and update its accounting.
    ///
    /// A single event larger than `max_bytes` trips the size threshold on
    /// its own, so it flushes alone instead of waiting on a batch that can
    /// never close.
    pub fn push(&mut self, event: Event) {
        self.current.bytes += event.estimated_size();
        if self.current.opened_at.is_none() {
            self.current.opened_at = Some(Instant::now());
        }
        self.current.events.push(event);
    }

    /// Evaluate the readiness predicate for the open batch.
    ///
    /// Returns `None` while the batch should stay open. An empty batch is
    /// never ready.
    pub fn ready_reason(&self) -> Option<FlushReason> {
        if self.current.events.is_empty() {
            return None;
        }
        if self.current.events.len() >= self.max_events {
            return Some(FlushReason::Count);
        }
        if self.current.bytes >= self.max_bytes {
            return Some(FlushReason::Bytes);
        }
        match self.current.opened_at {
            Some(opened_at) if opened_at.elapsed() >= self.flush_interval => {
                Some(FlushReason::Interval)
            }
            _ => None,
        }
    }

    /// When the open batch will become ready by age alone, if ever.
    pub fn deadline(&self) -> Option<Instant> {
        self.current
            .opened_at
            .map(|opened_at| opened_at + self.flush_interval)
    }

    /// Number of events in the open batch.
    pub fn len(&self) -> usize {
        self.current.events.len()
    }

    /// Whether the open batch holds no events.
    pub fn is_empty(&self) -> bool {
        self.current.events.is_empty()
    }

    /// Close the open batch, returning its events, and reopen an empty one.
    pub fn take(&mut self) -> Vec<Event> {
        std::mem::replace(&mut self.current, Batch::new()).events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn config() -> SinkConfig {
        let mut config = SinkConfig::new("https://api.example.com/events", "ps_test");
        config.max_batch_events = 5;
        config.max_batch_bytes = 1000;
        config.flush_interval = Duration::from_millis(50);
        config
    }

    fn event(payload: Value) -> Event {
        match payload {
            Value::Object(map) => Event::new("main", map),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn empty_batch_is_never_ready() {
        let accumulator = BatchAccumulator::new(&config());
        assert_eq!(accumulator.ready_reason(), None);
        assert_eq!(accumulator.deadline(), None);
    }

    #[tokio::test]
    async fn ready_on_count_limit() {
        let mut accumulator = BatchAccumulator::new(&config());
        for i in 0..4 {
            accumulator.push(event(json!({"index": i})));
            assert_eq!(accumulator.ready_reason(), None);
        }
        accumulator.push(event(json!({"index": 4})));
        assert_eq!(accumulator.ready_reason(), Some(FlushReason::Count));
    }

    #[tokio::test]
    async fn ready_on_size_limit() {
        let mut accumulator = BatchAccumulator::new(&config());
        accumulator.push(event(json!({"large": "x".repeat(600)})));
        assert_eq!(accumulator.ready_reason(), None);
        accumulator.push(event(json!({"large": "y".repeat(600)})));
        assert_eq!(accumulator.ready_reason(), Some(FlushReason::Bytes));
    }

    #[tokio::test]
    async fn oversized_single_event_is_ready_alone() {
        let mut accumulator = BatchAccumulator::new(&config());
        accumulator.push(event(json!({"huge": "z".repeat(2000)})));
        assert_eq!(accumulator.len(), 1);
        assert_eq!(accumulator.ready_reason(), Some(FlushReason::Bytes));
    }

    #[tokio::test(start_paused = true)]
    async fn ready_after_flush_interval() {
        let mut accumulator = BatchAccumulator::new(&config());
        accumulator.push(event(json!({"test": "data"})));
        assert_eq!(accumulator.ready_reason(), None);

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(accumulator.ready_reason(), Some(FlushReason::Interval));
    }

    #[tokio::test]
    async fn take_closes_and_reopens_empty() {
        let mut accumulator = BatchAccumulator::new(&config());
        for i in 0..5 {
            accumulator.push(event(json!({"index": i})));
        }

        let events = accumulator.take();
        assert_eq!(events.len(), 5);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.data["index"], json!(i));
        }

        assert!(accumulator.is_empty());
        assert_eq!(accumulator.ready_reason(), None);
        assert_eq!(accumulator.deadline(), None);
    }
}
