//! # Event Sink
//!
//! Buffered, batched, compressed event delivery for real-time pipeline
//! filters. Upstream code hands the sink already-shaped event records; the
//! sink buffers them in a bounded queue, groups them into batches under
//! size/count/time thresholds, gzips the batch payload, and POSTs it to an
//! HTTP ingestion endpoint with retry and backoff.
//!
//! # Core Invariants
//!
//! 1. **Never block the producer**: `enqueue` is non-blocking; a full queue
//!    drops the event and counts it rather than slowing the live path
//! 2. **One delivery in flight**: a single background worker sequences
//!    accumulate, compress, deliver; batches go out in FIFO order
//! 3. **Bounded everything**: queue capacity, batch thresholds, request
//!    timeout, retry budget, and backoff ceiling are all finite, so
//!    shutdown always completes in bounded time
//! 4. **No failure escapes the loop**: every failure is classified, logged,
//!    and converted into a dropped-event count; the worker exits only
//!    through a shutdown drain
//!
//! # Architecture
//!
//! ```text
//! producer -> bounded queue -> accumulator -> compressor -> sender -> endpoint
//!                  ^                                                    |
//!                  |__________________ shutdown/drain __________________|
//! ```

pub mod batch;
pub mod compress;
pub mod config;
pub mod error;
pub mod event;
pub mod queue;
pub mod sender;
pub mod worker;

#[cfg(test)]
mod tests;

pub use batch::{BatchAccumulator, FlushReason};
pub use config::SinkConfig;
pub use error::{SinkError, SinkResult};
pub use event::Event;
pub use sender::DeliverySender;
pub use worker::EventSink;
