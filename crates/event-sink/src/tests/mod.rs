//! Integration tests for the event sink.
//!
//! Test organization:
//!
//! - `harness.rs`      - Mock HTTP intake and shared builders
//! - `batching.rs`     - Batch thresholds, topic filtering, FIFO ordering
//! - `backpressure.rs` - Queue capacity and drop-on-full behavior
//! - `delivery.rs`     - Retry classification, backoff, wire headers
//! - `shutdown.rs`     - Drain semantics and bounded termination
//! - `compression.rs`  - Gzip round trips and the disabled path

mod shutdown;
