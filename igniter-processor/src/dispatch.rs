use crate::processor::{ProcessOutcome, RequestProcessor};
use igniter_core::{ErrorCode, FrameworkError, RawRequest, WireResponse, router::apply_params};
use serde_json::Value;
use std::collections::HashMap;

/// Input for a direct action invocation: path params, query (GET), and
/// body (non-GET/HEAD).
#[derive(Debug, Clone, Default)]
pub struct DispatchInput {
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

impl DispatchInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl RequestProcessor {
    /// Invoke an action by `(controller, action)` name through the same
    /// pipeline an HTTP request takes, and unwrap the response envelope.
    pub async fn dispatch(
        &self,
        controller: &str,
        action: &str,
        input: DispatchInput,
    ) -> Result<Value, FrameworkError> {
        let key = format!("{controller}.{action}");
        let Some(entry) = self.dispatch_table.get(&key) else {
            return Err(FrameworkError::not_found(format!("unknown action: {key}")));
        };

        let mut url = apply_params(&entry.pattern, &input.params);
        if entry.method == "GET" && !input.query.is_empty() {
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (name, value) in &input.query {
                serializer.append_pair(name, value);
            }
            url.push('?');
            url.push_str(&serializer.finish());
        }

        let mut raw = RawRequest::new(entry.method.clone(), url);
        if !matches!(entry.method.as_str(), "GET" | "HEAD") {
            if let Some(body) = &input.body {
                raw = raw
                    .with_header("Content-Type", "application/json")
                    .with_body(body.to_string());
            }
        }

        match self.process(raw).await {
            ProcessOutcome::Response(wire) => parse_envelope(wire),
            ProcessOutcome::EventStream(_) => Err(FrameworkError::internal(
                "self-dispatch cannot target the SSE endpoint",
            )),
        }
    }
}

/// Unwrap a wire envelope: `data` on success, a reconstructed framework
/// error otherwise.
fn parse_envelope(wire: WireResponse) -> Result<Value, FrameworkError> {
    if wire.status == 204 || wire.body.is_empty() {
        if wire.status < 400 {
            return Ok(Value::Null);
        }
        let code = if wire.status == 404 {
            ErrorCode::NotFound
        } else {
            ErrorCode::InternalServerError
        };
        return Err(
            FrameworkError::framework(code, format!("empty response with status {}", wire.status))
                .with_status(wire.status),
        );
    }

    let envelope: Value = serde_json::from_slice(&wire.body)
        .map_err(|e| FrameworkError::internal(format!("malformed response envelope: {e}")))?;

    if envelope["error"].is_null() {
        return Ok(envelope["data"].clone());
    }

    let code = envelope["error"]["code"]
        .as_str()
        .and_then(ErrorCode::from_code)
        .unwrap_or(ErrorCode::InternalServerError);
    let message = envelope["error"]["message"]
        .as_str()
        .unwrap_or("unknown error")
        .to_string();
    let mut error = FrameworkError::framework(code, message).with_status(wire.status);
    if let Some(details) = envelope["error"].get("data") {
        error = error.with_details(details.clone());
    }
    Err(error)
}
