//! Batch payload encoding: JSON serialization plus optional gzip.

use crate::error::SinkResult;
use crate::event::Event;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

/// Content-Encoding value reported for compressed payloads.
pub const GZIP_ENCODING: &str = "gzip";

/// Serialize a closed batch into a single JSON array (one envelope object
/// per event) and gzip it at the given level when compression is enabled.
///
/// Returns the payload bytes and the Content-Encoding to advertise, if any.
/// Stateless; the only failure modes are serialization errors on malformed
/// event content, which the worker treats as terminal for the batch.
pub fn encode_batch(
    events: &[Event],
    gzip_level: Option<u32>,
) -> SinkResult<(Vec<u8>, Option<&'static str>)> {
    let serialized = serde_json::to_vec(events)?;

    match gzip_level {
        Some(level) => {
            let mut encoder = GzEncoder::new(
                Vec::with_capacity(serialized.len() / 2),
                Compression::new(level),
            );
            encoder.write_all(&serialized)?;
            Ok((encoder.finish()?, Some(GZIP_ENCODING)))
        }
        None => Ok((serialized, None)),
    }
}
