//! Shutdown drain semantics.

use super::harness::{event, sink_config, MockIntake};
use crate::worker::EventSink;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn shutdown_flushes_partial_batch_exactly_once() {
    let intake = MockIntake::start().await;
    // 60s flush interval and high count threshold: nothing would flush
    // on its own, only the drain can.
    let sink = EventSink::start(sink_config(&intake)).unwrap();

    sink.enqueue(event("main", json!({"final": true})));
    sink.shutdown().await;

    assert_eq!(intake.request_count(), 1);
    let events = intake.requests()[0].events();
    assert_eq!(events, vec![json!({"final": true})]);
}

#[tokio::test]
async fn shutdown_with_empty_batch_delivers_nothing() {
    let intake = MockIntake::start().await;
    let sink = EventSink::start(sink_config(&intake)).unwrap();

    sink.shutdown().await;

    assert_eq!(intake.request_count(), 0);
}

#[tokio::test]
async fn shutdown_drains_everything_left_in_the_queue() {
    let intake = MockIntake::start().await;
    let mut config = sink_config(&intake);
    config.max_batch_events = 4;
    let sink = EventSink::start(config).unwrap();

    for i in 0..10 {
        assert!(sink.enqueue(event("main", json!({"index": i}))));
    }
    sink.shutdown().await;

    let delivered: Vec<_> = intake
        .requests()
        .iter()
        .flat_map(|request| request.events())
        .collect();
    assert_eq!(delivered.len(), 10);
    for (i, value) in delivered.iter().enumerate() {
        assert_eq!(value["index"], json!(i));
    }
}

#[tokio::test]
async fn shutdown_is_bounded_against_unreachable_endpoint() {
    // Nothing listens on this port; every attempt fails fast with a
    // connection error, which is retryable.
    let mut config = crate::config::SinkConfig::new("http://127.0.0.1:1/events", "ps_test");
    config.flush_interval = Duration::from_secs(60);
    config.backoff_base = 0.05;
    config.max_retries = 2;
    config.request_timeout = Duration::from_secs(1);
    let sink = EventSink::start(config).unwrap();

    sink.enqueue(event("main", json!({"lost": true})));

    let started = std::time::Instant::now();
    sink.shutdown().await;
    // Finite retry budget: the drain gives up and the worker exits.
    assert!(started.elapsed() < Duration::from_secs(15));
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let intake = MockIntake::start().await;
    let sink = EventSink::start(sink_config(&intake)).unwrap();

    sink.enqueue(event("main", json!({"once": true})));
    sink.shutdown().await;
    sink.shutdown().await;

    assert_eq!(intake.request_count(), 1);
}
