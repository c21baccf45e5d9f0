//! Server-Sent-Event framing for POST responses
//!
//! Streamable HTTP servers may answer a plain POST with a `text/event-stream`
//! body holding one or more frames:
//!
//! ```text
//! event: message
//! data: {"jsonrpc":"2.0","id":"x","result":{}}
//!
//! ```
//!
//! Both LF and CRLF line endings occur in the wild.

use serde_json::Value;

pub const EVENT_STREAM: &str = "text/event-stream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name; `message` when the frame has no `event:` field
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

pub fn is_event_stream(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with(EVENT_STREAM))
        .unwrap_or(false)
}

/// Split a complete SSE body into events. Comment lines are skipped.
pub fn parse_events(body: &str) -> Vec<SseEvent> {
    let mut events = Vec::new();
    let mut pending = PendingEvent::default();

    // `lines()` strips a trailing `\r`, which covers CRLF bodies
    for line in body.lines() {
        if line.is_empty() {
            pending.flush_into(&mut events);
            continue;
        }
        if line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => pending.event = Some(value.to_string()),
            "data" => pending.data.push(value.to_string()),
            "id" => pending.id = Some(value.to_string()),
            _ => {}
        }
    }
    pending.flush_into(&mut events);

    events
}

#[derive(Default)]
struct PendingEvent {
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl PendingEvent {
    fn flush_into(&mut self, events: &mut Vec<SseEvent>) {
        let pending = std::mem::take(self);
        if !pending.data.is_empty() {
            events.push(SseEvent {
                event: pending.event.unwrap_or_else(|| "message".to_string()),
                data: pending.data.join("\n"),
                id: pending.id,
            });
        }
    }
}

/// The JSON-RPC payload of a response stream.
///
/// Prefers the first `message` event that carries a `result` or `error`
/// (servers may interleave notifications before the response), falling back
/// to the first `message` event that is valid JSON.
pub fn response_payload(body: &str) -> Option<Value> {
    let messages: Vec<Value> = parse_events(body)
        .into_iter()
        .filter(|e| e.event == "message")
        .filter_map(|e| serde_json::from_str(&e.data).ok())
        .collect();

    let is_response = |v: &Value| v.get("result").is_some() || v.get("error").is_some();
    match messages.iter().position(is_response) {
        Some(idx) => messages.into_iter().nth(idx),
        None => messages.into_iter().next(),
    }
}
