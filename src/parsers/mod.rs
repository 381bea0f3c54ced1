// Parsers for the backend event stream: SSE framing and JSON event decoding

pub mod sse;
pub mod wire;

pub use sse::{SseDecoder, SseFrame};
pub use wire::{parse_agent_state, parse_event, WireError};

use crate::events::ResearchEvent;

/// Decode a complete SSE frame into an event
///
/// When the frame carries an `event:` name and the JSON payload has no `type`
/// field, the name is used as the event type.
pub fn decode_frame(frame: &SseFrame) -> Result<ResearchEvent, WireError> {
    match parse_event(&frame.data) {
        Err(WireError::InvalidJson(reason)) => match frame.event.as_deref() {
            Some(name) => retry_with_type(&frame.data, name).ok_or(WireError::InvalidJson(reason)),
            None => Err(WireError::InvalidJson(reason)),
        },
        other => other,
    }
}

fn retry_with_type(data: &str, name: &str) -> Option<ResearchEvent> {
    let mut value: serde_json::Value = match data.trim() {
        "" => serde_json::json!({}),
        trimmed => serde_json::from_str(trimmed).ok()?,
    };
    let object = value.as_object_mut()?;
    if object.contains_key("type") {
        return None;
    }
    object.insert("type".to_string(), serde_json::Value::String(name.to_string()));
    parse_event(&value.to_string()).ok()
}
