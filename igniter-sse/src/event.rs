use bytes::Bytes;
use serde_json::Value;

/// An event published on a channel. Ephemeral; never stored.
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub channel: String,
    pub id: Option<String>,
    pub event_type: Option<String>,
    pub data: Value,
    pub scopes: Option<Vec<String>>,
}

impl SseEvent {
    pub fn new(channel: impl Into<String>, data: Value) -> Self {
        Self {
            channel: channel.into(),
            id: None,
            event_type: None,
            data,
            scopes: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = Some(scopes);
        self
    }

    /// Serialize to one wire frame: `id:`/`event:` fields, `data:` split
    /// per newline, terminated by a blank line.
    pub fn to_frame(&self) -> Bytes {
        let mut frame = String::new();
        if let Some(ref id) = self.id {
            frame.push_str("id: ");
            frame.push_str(id);
            frame.push('\n');
        }
        if let Some(ref event_type) = self.event_type {
            frame.push_str("event: ");
            frame.push_str(event_type);
            frame.push('\n');
        }
        let encoded = igniter_core::json::encode(&self.data);
        for line in encoded.split('\n') {
            frame.push_str("data: ");
            frame.push_str(line);
            frame.push('\n');
        }
        frame.push('\n');
        Bytes::from(frame)
    }
}

/// A comment frame, used for keep-alives.
pub fn comment_frame(text: &str) -> Bytes {
    Bytes::from(format!(": {text}\n\n"))
}

/// A `retry:` frame advising the client's reconnection delay.
pub fn retry_frame(millis: u64) -> Bytes {
    Bytes::from(format!("retry: {millis}\n\n"))
}

/// Response headers for an SSE connection, including the disable-buffering
/// hint for reverse proxies.
pub fn response_headers() -> Vec<(String, String)> {
    vec![
        ("Content-Type".to_string(), "text/event-stream".to_string()),
        (
            "Cache-Control".to_string(),
            "no-cache, no-transform".to_string(),
        ),
        ("Connection".to_string(), "keep-alive".to_string()),
        ("X-Accel-Buffering".to_string(), "no".to_string()),
    ]
}
