use crate::body::{ParsedBody, parse_body};
use crate::capability::{
    JobQueue, PluginHandle, ScopedLogger, SpanHandle, Store, TelemetryProvider, TraceContext,
};
use crate::config::CoreConfig;
use crate::request::{RawRequest, RequestEnvelope};
use crate::response::{ResponseBuilder, RevalidateDirective};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Capability names that middleware can never overwrite.
pub const RESERVED_CONTEXT_KEYS: [&str; 6] =
    ["store", "logger", "jobs", "telemetry", "span", "traceContext"];

/// Capabilities injected by the context builder. These are authoritative;
/// the reserved-key policy keeps middleware from shadowing them.
pub struct Capabilities {
    pub store: Arc<dyn Store>,
    pub logger: ScopedLogger,
    pub jobs: Option<Arc<dyn JobQueue>>,
    pub telemetry: Arc<dyn TelemetryProvider>,
    pub span: Option<SpanHandle>,
    pub trace: TraceContext,
    pub plugins: HashMap<String, Arc<dyn PluginHandle>>,
}

impl Capabilities {
    pub fn plugin(&self, name: &str) -> Option<&Arc<dyn PluginHandle>> {
        self.plugins.get(name)
    }
}

/// How scopes are supplied to a scoped revalidation.
pub enum ScopeSelector {
    None,
    Fixed(Vec<String>),
    FromContext(Arc<dyn Fn(&RequestContext) -> Vec<String> + Send + Sync>),
}

/// The per-request context passed to middleware and handlers.
///
/// Exclusively owned by the processor for the request's lifetime. The
/// user-context bag is open; capability keys are reserved.
pub struct RequestContext {
    pub request: RequestEnvelope,
    pub response: ResponseBuilder,
    pub capabilities: Capabilities,
    user_context: Map<String, Value>,
    body_parse_warning: Option<String>,
}

impl RequestContext {
    pub fn user_context(&self) -> &Map<String, Value> {
        &self.user_context
    }

    pub fn user_value(&self, key: &str) -> Option<&Value> {
        self.user_context.get(key)
    }

    /// Shallow-merge a middleware's mapping into the user context.
    /// Reserved keys are dropped with a warning; other keys last-write-win.
    pub fn merge_user_context(&mut self, incoming: Map<String, Value>) {
        for (key, value) in incoming {
            if RESERVED_CONTEXT_KEYS.contains(&key.as_str()) {
                warn!(
                    request_id = %self.request.id,
                    key = %key,
                    "Ignoring attempt to overwrite reserved context key"
                );
                continue;
            }
            self.user_context.insert(key, value);
        }
    }

    /// Set a single user-context value, subject to the reserved-key policy.
    pub fn set_user_value(&mut self, key: impl Into<String>, value: Value) {
        let mut map = Map::new();
        map.insert(key.into(), value);
        self.merge_user_context(map);
    }

    /// Warning recorded when body parsing failed during context assembly.
    pub fn body_parse_warning(&self) -> Option<&str> {
        self.body_parse_warning.as_deref()
    }

    /// Queue a revalidation, resolving scopes against this context.
    pub fn revalidate_scoped(
        &mut self,
        query_keys: Vec<String>,
        data: Option<Value>,
        scopes: ScopeSelector,
    ) {
        let resolved = match scopes {
            ScopeSelector::None => None,
            ScopeSelector::Fixed(list) => Some(list),
            ScopeSelector::FromContext(resolver) => Some(resolver(self)),
        };
        self.response.revalidate_with(RevalidateDirective {
            query_keys,
            data,
            scopes: resolved,
        });
    }
}

/// Source of the per-request user context.
pub enum UserContextSource {
    /// The same mapping for every request.
    Static(Map<String, Value>),
    /// A zero-argument producer; on failure the request continues with an
    /// empty context.
    Producer(Arc<dyn Fn() -> anyhow::Result<Map<String, Value>> + Send + Sync>),
}

impl Default for UserContextSource {
    fn default() -> Self {
        UserContextSource::Static(Map::new())
    }
}

/// Assembles the immutable per-request context.
pub struct ContextBuilder {
    config: Arc<CoreConfig>,
    store: Arc<dyn Store>,
    telemetry: Arc<dyn TelemetryProvider>,
    jobs: Option<Arc<dyn JobQueue>>,
    user_context: UserContextSource,
}

impl ContextBuilder {
    pub fn new(
        config: Arc<CoreConfig>,
        store: Arc<dyn Store>,
        telemetry: Arc<dyn TelemetryProvider>,
    ) -> Self {
        Self {
            config,
            store,
            telemetry,
            jobs: None,
            user_context: UserContextSource::default(),
        }
    }

    pub fn with_jobs(mut self, jobs: Arc<dyn JobQueue>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn with_user_context(mut self, source: UserContextSource) -> Self {
        self.user_context = source;
        self
    }

    /// Build the context: user context, envelope, parsed body, and
    /// injected capabilities. Body parse failures are recorded as a
    /// warning and leave the body absent; schema validation later decides
    /// whether that is fatal.
    pub async fn build(
        &self,
        raw: &RawRequest,
        params: HashMap<String, String>,
        plugins: HashMap<String, Arc<dyn PluginHandle>>,
    ) -> RequestContext {
        let user_context = match &self.user_context {
            UserContextSource::Static(map) => map.clone(),
            UserContextSource::Producer(producer) => match producer() {
                Ok(map) => map,
                Err(error) => {
                    warn!(error = %error, "User context producer failed, continuing with empty context");
                    Map::new()
                }
            },
        };

        let mut request = RequestEnvelope::from_raw(raw);
        request.params = params;

        let content_type = request.header("content-type").map(str::to_owned);
        let mut body_parse_warning = None;
        match parse_body(&request.method, content_type.as_deref(), raw.body.clone()).await {
            Ok(parsed) => request.body = parsed,
            Err(error) => {
                warn!(request_id = %request.id, error = %error, "Body parse failed");
                request.body = ParsedBody::Empty;
                body_parse_warning = Some(error.to_string());
            }
        }

        let request_id = request.id.clone();
        let capabilities = Capabilities {
            store: Arc::clone(&self.store),
            logger: ScopedLogger::new(request_id.clone()),
            jobs: self.jobs.clone(),
            telemetry: Arc::clone(&self.telemetry),
            span: None,
            trace: TraceContext {
                request_id,
                span_id: None,
            },
            plugins,
        };

        RequestContext {
            request,
            response: ResponseBuilder::new(Arc::clone(&self.config)),
            capabilities,
            user_context,
            body_parse_warning,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{NullStore, test_context};
    use super::*;
    use crate::capability::NoopTelemetry;
    use bytes::Bytes;
    use serde_json::json;

    fn builder() -> ContextBuilder {
        ContextBuilder::new(
            Arc::new(CoreConfig::default()),
            Arc::new(NullStore),
            Arc::new(NoopTelemetry),
        )
    }

    #[tokio::test]
    async fn test_build_parses_body_and_params() {
        let raw = RawRequest::new("POST", "/users?verbose=1")
            .with_header("Content-Type", "application/json")
            .with_body(Bytes::from(r#"{"name":"ada"}"#));
        let params = HashMap::from([("id".to_string(), "42".to_string())]);
        let ctx = builder().build(&raw, params, HashMap::new()).await;

        assert_eq!(ctx.request.param("id"), Some("42"));
        assert_eq!(ctx.request.query_param("verbose"), Some("1"));
        assert_eq!(ctx.request.body.as_value()["name"], "ada");
        assert!(ctx.body_parse_warning().is_none());
    }

    #[tokio::test]
    async fn test_body_parse_failure_is_a_warning() {
        let raw = RawRequest::new("POST", "/users")
            .with_header("Content-Type", "application/json")
            .with_body(Bytes::from("{broken"));
        let ctx = builder().build(&raw, HashMap::new(), HashMap::new()).await;

        assert!(ctx.request.body.is_empty());
        assert!(ctx.body_parse_warning().unwrap().contains("invalid JSON"));
    }

    #[tokio::test]
    async fn test_static_user_context() {
        let mut map = Map::new();
        map.insert("tenant".to_string(), json!("acme"));
        let ctx = builder()
            .with_user_context(UserContextSource::Static(map))
            .build(&RawRequest::new("GET", "/"), HashMap::new(), HashMap::new())
            .await;
        assert_eq!(ctx.user_value("tenant"), Some(&json!("acme")));
    }

    #[tokio::test]
    async fn test_failing_producer_yields_empty_context() {
        let ctx = builder()
            .with_user_context(UserContextSource::Producer(Arc::new(|| {
                anyhow::bail!("boom")
            })))
            .build(&RawRequest::new("GET", "/"), HashMap::new(), HashMap::new())
            .await;
        assert!(ctx.user_context().is_empty());
    }

    #[test]
    fn test_reserved_keys_are_protected() {
        let mut ctx = test_context(Arc::new(CoreConfig::default()));
        let mut incoming = Map::new();
        incoming.insert("store".to_string(), json!("evil"));
        incoming.insert("traceContext".to_string(), json!("evil"));
        incoming.insert("user".to_string(), json!({"id": 1}));
        ctx.merge_user_context(incoming);

        assert!(ctx.user_value("store").is_none());
        assert!(ctx.user_value("traceContext").is_none());
        assert_eq!(ctx.user_value("user"), Some(&json!({"id": 1})));
    }

    #[test]
    fn test_merge_is_shallow_last_write_wins() {
        let mut ctx = test_context(Arc::new(CoreConfig::default()));
        ctx.set_user_value("user", json!({"id": 1, "name": "ada"}));
        ctx.set_user_value("user", json!({"id": 2}));
        assert_eq!(ctx.user_value("user"), Some(&json!({"id": 2})));
    }

    #[test]
    fn test_revalidate_scoped_resolves_from_context() {
        let mut ctx = test_context(Arc::new(CoreConfig::default()));
        ctx.set_user_value("tenant", json!("42"));
        ctx.revalidate_scoped(
            vec!["user-profile".to_string()],
            None,
            ScopeSelector::FromContext(Arc::new(|ctx| {
                vec![format!(
                    "tenant:{}",
                    ctx.user_value("tenant").and_then(Value::as_str).unwrap_or("?")
                )]
            })),
        );
        let finalized = ctx.response.success(json!(null));
        assert_eq!(
            finalized.revalidates[0].scopes,
            Some(vec!["tenant:42".to_string()])
        );
    }
}
