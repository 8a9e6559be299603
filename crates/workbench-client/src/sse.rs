//! Server-sent event decoding into [`Frame`]s.

use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde_json::Value;
use tracing::warn;
use workbench_stream::{EventStream, EventTaxonomy, Frame, StreamError};

/// Decode an SSE response body into typed frames.
///
/// Empty events (keep-alives) are dropped. A frame whose JSON lacks a `type`
/// field takes it from the SSE `event:` name when one was sent.
pub(crate) fn frames<E: EventTaxonomy>(response: reqwest::Response) -> EventStream<E> {
    let stream = response.bytes_stream().eventsource();

    Box::pin(stream.filter_map(|result| async move {
        match result {
            Ok(event) => {
                if event.data.trim().is_empty() {
                    return None;
                }
                Some(decode::<E>(&event.event, &event.data))
            }
            Err(e) => Some(Err(StreamError::Stream(e.to_string()))),
        }
    }))
}

fn decode<E: EventTaxonomy>(name: &str, data: &str) -> workbench_stream::Result<Frame<E>> {
    let mut value: Value = serde_json::from_str(data).map_err(|e| {
        warn!(data = %data, error = %e, "Failed to parse stream event");
        StreamError::InvalidEvent(e.to_string())
    })?;

    if let Value::Object(map) = &mut value
        && !map.contains_key("type")
        && !name.is_empty()
        && name != "message"
    {
        map.insert("type".to_string(), Value::String(name.to_string()));
    }
    Frame::from_value(value)
}
