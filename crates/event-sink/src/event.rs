//! The event record the sink buffers and delivers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// One discrete occurrence record emitted by the host pipeline.
///
/// The `data` map is the already-shaped envelope produced upstream; the sink
/// never inspects or rewrites it. The topic label is used only for filtering
/// and never reaches the wire on its own. Immutable once constructed: after
/// enqueue an event is owned by exactly one container (queue, then batch),
/// so no cross-thread mutation is needed.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Topic the event was published under.
    #[serde(skip)]
    pub topic: String,

    /// Schema-less event envelope, serialized verbatim into the batch payload.
    #[serde(flatten)]
    pub data: Map<String, Value>,

    /// When the event entered the sink.
    #[serde(skip)]
    pub enqueued_at: DateTime<Utc>,
}

impl Event {
    /// Create an event with the current time as its enqueue timestamp.
    pub fn new(topic: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            topic: topic.into(),
            data,
            enqueued_at: Utc::now(),
        }
    }

    /// Serialized size estimate, used for batch byte accounting.
    ///
    /// Computed against the wire shape (the flattened envelope object).
    /// A map that cannot be serialized will be rejected later by the
    /// compressor; here it just contributes zero bytes.
    pub fn estimated_size(&self) -> usize {
        serde_json::to_vec(self).map(|b| b.len()).unwrap_or(0)
    }
}
