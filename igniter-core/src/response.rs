use crate::config::CoreConfig;
use crate::cookie::{CookieOptions, serialize_set_cookie, sign};
use crate::error::{ClassifiedError, ErrorBody, ErrorCode, FrameworkError};
use crate::json;
use crate::request::WireResponse;
use bytes::Bytes;
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;

/// Recorded by `stream()`; the processor registers the channel and
/// publishes the initial event before the response is returned.
#[derive(Debug, Clone)]
pub struct StreamDirective {
    pub channel_id: String,
    pub initial_data: Option<Value>,
}

/// Recorded by `revalidate()`; the processor publishes a `revalidate`
/// event on the `revalidation` channel.
#[derive(Debug, Clone)]
pub struct RevalidateDirective {
    pub query_keys: Vec<String>,
    pub data: Option<Value>,
    pub scopes: Option<Vec<String>>,
}

/// Options accepted by [`ResponseBuilder::stream`].
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    pub channel_id: Option<String>,
    pub controller: Option<String>,
    pub action: Option<String>,
    pub initial_data: Option<Value>,
}

/// Body model of a finalized response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// No body at all (`204`).
    Empty,
    /// The `{error, data}` wire envelope; exactly one side is non-null.
    Envelope {
        error: Option<ErrorBody>,
        data: Value,
    },
}

/// Fluent, per-request response builder.
///
/// Mutators chain; terminal methods (`success`, `no_content`, `stream`, …)
/// drain the accumulated state into a [`FinalizedResponse`]. An explicit
/// `status()` always wins over a terminal's default.
pub struct ResponseBuilder {
    status: Option<u16>,
    headers: Vec<(String, String)>,
    set_cookies: Vec<String>,
    revalidates: Vec<RevalidateDirective>,
    config: Arc<CoreConfig>,
}

impl ResponseBuilder {
    pub fn new(config: Arc<CoreConfig>) -> Self {
        Self {
            status: None,
            headers: Vec::new(),
            set_cookies: Vec::new(),
            revalidates: Vec::new(),
            config,
        }
    }

    /// Set an explicit status that overrides terminal defaults.
    pub fn status(&mut self, status: u16) -> &mut Self {
        self.status = Some(status);
        self
    }

    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Queue a `Set-Cookie` line. Prefix and lifetime rules apply.
    pub fn set_cookie(
        &mut self,
        name: &str,
        value: &str,
        options: CookieOptions,
    ) -> Result<&mut Self, FrameworkError> {
        let line = serialize_set_cookie(name, value, options)?;
        self.set_cookies.push(line);
        Ok(self)
    }

    /// Queue a signed `Set-Cookie` line (`value.signature`).
    pub fn set_signed_cookie(
        &mut self,
        name: &str,
        value: &str,
        secret: &str,
        options: CookieOptions,
    ) -> Result<&mut Self, FrameworkError> {
        let signed = sign(name, value, secret);
        let line = serialize_set_cookie(name, &signed, options)?;
        self.set_cookies.push(line);
        Ok(self)
    }

    pub fn delete_cookie(&mut self, name: &str) -> &mut Self {
        self.set_cookies.push(format!("{name}=; Path=/; Max-Age=0"));
        self
    }

    /// Queue a cache revalidation for the given query keys.
    pub fn revalidate<I, S>(&mut self, query_keys: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.revalidates.push(RevalidateDirective {
            query_keys: query_keys.into_iter().map(Into::into).collect(),
            data: None,
            scopes: None,
        });
        self
    }

    /// Queue a revalidation with payload and resolved scopes.
    pub fn revalidate_with(&mut self, directive: RevalidateDirective) -> &mut Self {
        self.revalidates.push(directive);
        self
    }

    // ── Terminals ────────────────────────────────────────────────

    pub fn success(&mut self, data: Value) -> FinalizedResponse {
        self.finalize_data(200, data)
    }

    pub fn created(&mut self, data: Value) -> FinalizedResponse {
        self.finalize_data(201, data)
    }

    pub fn json(&mut self, data: Value) -> FinalizedResponse {
        self.finalize_data(200, data)
    }

    /// `204`: no body, no `Content-Type`, whatever was set earlier.
    pub fn no_content(&mut self) -> FinalizedResponse {
        let status = self.status.take().unwrap_or(204);
        FinalizedResponse {
            status,
            headers: std::mem::take(&mut self.headers),
            set_cookies: std::mem::take(&mut self.set_cookies),
            body: ResponseBody::Empty,
            stream: None,
            revalidates: std::mem::take(&mut self.revalidates),
        }
    }

    pub fn bad_request(&mut self, message: impl Into<String>) -> FinalizedResponse {
        self.error(ErrorCode::BadRequest, message, None)
    }

    pub fn unauthorized(&mut self, message: impl Into<String>) -> FinalizedResponse {
        self.error(ErrorCode::Unauthorized, message, None)
    }

    pub fn forbidden(&mut self, message: impl Into<String>) -> FinalizedResponse {
        self.error(ErrorCode::Forbidden, message, None)
    }

    pub fn not_found(&mut self, message: impl Into<String>) -> FinalizedResponse {
        self.error(ErrorCode::NotFound, message, None)
    }

    pub fn redirect(&mut self, destination: impl Into<String>) -> FinalizedResponse {
        let destination = destination.into();
        self.headers.push(("Location".to_string(), destination.clone()));
        self.error(
            ErrorCode::Redirect,
            "Redirect",
            Some(json!({ "destination": destination })),
        )
    }

    /// Error terminal; status defaults from the code unless overridden.
    pub fn error(
        &mut self,
        code: ErrorCode,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> FinalizedResponse {
        let status = self.status.take().unwrap_or_else(|| code.default_status());
        FinalizedResponse {
            status,
            headers: std::mem::take(&mut self.headers),
            set_cookies: std::mem::take(&mut self.set_cookies),
            body: ResponseBody::Envelope {
                error: Some(ErrorBody {
                    message: message.into(),
                    code: code.as_str().to_string(),
                    data,
                }),
                data: Value::Null,
            },
            stream: None,
            revalidates: std::mem::take(&mut self.revalidates),
        }
    }

    /// Switch the response to an SSE hand-off.
    ///
    /// The channel id is `options.channel_id`, or `controller.action` when
    /// both parts are given. The body tells the client where to connect.
    pub fn stream(&mut self, options: StreamOptions) -> Result<FinalizedResponse, FrameworkError> {
        let channel_id = match options.channel_id {
            Some(id) => id,
            None => match (&options.controller, &options.action) {
                (Some(controller), Some(action)) => format!("{controller}.{action}"),
                _ => {
                    return Err(FrameworkError::bad_request(
                        "stream requires a channel id, or both controller and action",
                    ));
                }
            },
        };

        let data = json!({
            "type": "stream",
            "channelId": channel_id,
            "connectionInfo": {
                "endpoint": self.config.sse_endpoint(),
                "params": { "channels": channel_id },
            },
            "timestamp": Utc::now().to_rfc3339(),
        });

        let mut finalized = self.finalize_data(200, data);
        finalized.stream = Some(StreamDirective {
            channel_id,
            initial_data: options.initial_data,
        });
        Ok(finalized)
    }

    fn finalize_data(&mut self, default_status: u16, data: Value) -> FinalizedResponse {
        let status = self.status.take().unwrap_or(default_status);
        FinalizedResponse {
            status,
            headers: std::mem::take(&mut self.headers),
            set_cookies: std::mem::take(&mut self.set_cookies),
            body: ResponseBody::Envelope { error: None, data },
            stream: None,
            revalidates: std::mem::take(&mut self.revalidates),
        }
    }
}

/// The outcome of a terminal builder call, ready for the wire.
#[derive(Debug, Clone)]
pub struct FinalizedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub set_cookies: Vec<String>,
    pub body: ResponseBody,
    pub stream: Option<StreamDirective>,
    pub revalidates: Vec<RevalidateDirective>,
}

impl FinalizedResponse {
    /// Build from a classified error, for failures outside any builder.
    pub fn from_classified(classified: ClassifiedError) -> Self {
        Self {
            status: classified.status,
            headers: Vec::new(),
            set_cookies: Vec::new(),
            body: ResponseBody::Envelope {
                error: Some(classified.body),
                data: Value::Null,
            },
            stream: None,
            revalidates: Vec::new(),
        }
    }

    /// Serialize to the transport response. Envelope bodies go through the
    /// safe encoder; empty bodies carry no `Content-Type`.
    pub fn into_wire(self) -> WireResponse {
        let mut headers = self.headers;
        for line in self.set_cookies {
            headers.push(("Set-Cookie".to_string(), line));
        }

        match self.body {
            ResponseBody::Empty => {
                headers.retain(|(name, _)| !name.eq_ignore_ascii_case("content-type"));
                WireResponse {
                    status: self.status,
                    headers,
                    body: Bytes::new(),
                }
            }
            ResponseBody::Envelope { error, data } => {
                let envelope = json!({
                    "error": error
                        .map(|e| serde_json::to_value(e).unwrap_or(Value::Null))
                        .unwrap_or(Value::Null),
                    "data": data,
                });
                if !headers
                    .iter()
                    .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
                {
                    headers.push(("Content-Type".to_string(), "application/json".to_string()));
                }
                WireResponse {
                    status: self.status,
                    headers,
                    body: Bytes::from(json::encode(&envelope)),
                }
            }
        }
    }
}
