use arc_swap::ArcSwap;
use chrono::Utc;
use igniter_core::body::ParsedBody;
use igniter_core::{
    Action, Controller, CoreConfig, FinalizedResponse, FrameworkError, HandlerOutput, HttpSpanTags,
    JobQueue, Middleware, RawRequest, RequestContext, ResponseBody, RouteTable, RouteTableBuilder,
    SpanHandle, Store, TelemetryProvider, UserContextSource, WireResponse, classify,
    router::join_paths,
};
use igniter_observability::TracingTelemetry;
use igniter_plugin::{MiddlewareExecutor, PipelineOutcome, PluginManager, PluginManagerConfig};
use igniter_sse::{REVALIDATION_CHANNEL, SYSTEM_CHANNEL, SseConnectionHandle, SseEvent, SseHub};
use igniter_store::MemoryStore;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// What one processed request yields: a wire response, or an SSE hand-off
/// the transport adapter keeps open.
pub enum ProcessOutcome {
    Response(WireResponse),
    EventStream(SseConnectionHandle),
}

enum PipelineResult {
    Finalized(FinalizedResponse),
    Raw(WireResponse),
}

pub(crate) struct DispatchEntry {
    pub method: String,
    pub pattern: String,
}

/// Wires the route table, middleware, plugins, telemetry, and the SSE hub
/// into a [`RequestProcessor`].
pub struct ProcessorBuilder {
    config: Arc<CoreConfig>,
    store: Arc<dyn Store>,
    telemetry: Arc<dyn TelemetryProvider>,
    jobs: Option<Arc<dyn JobQueue>>,
    user_context: UserContextSource,
    executor: MiddlewareExecutor,
    controllers: Vec<Controller>,
    plugins: Option<PluginManager>,
    hub: Option<Arc<SseHub>>,
}

impl ProcessorBuilder {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(MemoryStore::new()),
            telemetry: Arc::new(TracingTelemetry::new()),
            jobs: None,
            user_context: UserContextSource::default(),
            executor: MiddlewareExecutor::new(),
            controllers: Vec::new(),
            plugins: None,
            hub: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = store;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetryProvider>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_jobs(mut self, jobs: Arc<dyn JobQueue>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn with_user_context(mut self, source: UserContextSource) -> Self {
        self.user_context = source;
        self
    }

    pub fn with_plugins(mut self, plugins: PluginManager) -> Self {
        self.plugins = Some(plugins);
        self
    }

    pub fn with_hub(mut self, hub: Arc<SseHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Register a global middleware; execution follows registration order.
    pub fn global_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.executor.register(middleware);
        self
    }

    pub fn controller(mut self, controller: Controller) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn build(self) -> Result<RequestProcessor, FrameworkError> {
        let plugins = Arc::new(self.plugins.unwrap_or_else(|| {
            PluginManager::new(Arc::clone(&self.store), PluginManagerConfig::default())
        }));
        if !plugins.is_loaded() {
            plugins.load()?;
        }

        let mut routes = RouteTableBuilder::new(&self.config.app_base_path);
        let mut dispatch_table = HashMap::new();

        for controller in &self.controllers {
            routes.controller(controller)?;
            index_controller(&self.config.app_base_path, controller, &mut dispatch_table);
        }
        plugins.with_controllers(|controller| {
            routes.controller(controller)?;
            index_controller(&self.config.app_base_path, controller, &mut dispatch_table);
            Ok(())
        })?;
        let routes = routes.build();
        info!(routes = routes.len(), "Route table built");

        let hub = self.hub.unwrap_or_else(|| {
            SseHub::new(Duration::from_secs(self.config.sse_keep_alive_secs))
        });

        let mut context_builder = igniter_core::ContextBuilder::new(
            Arc::clone(&self.config),
            Arc::clone(&self.store),
            Arc::clone(&self.telemetry),
        )
        .with_user_context(self.user_context);
        if let Some(jobs) = self.jobs {
            context_builder = context_builder.with_jobs(jobs);
        }

        Ok(RequestProcessor {
            config: self.config,
            routes: ArcSwap::new(Arc::new(routes)),
            context_builder,
            executor: self.executor,
            plugins,
            hub,
            telemetry: self.telemetry,
            dispatch_table,
        })
    }
}

fn index_controller(
    base_path: &str,
    controller: &Controller,
    dispatch_table: &mut HashMap<String, DispatchEntry>,
) {
    for action in controller.actions.values() {
        dispatch_table.insert(
            format!("{}.{}", controller.name, action.name),
            DispatchEntry {
                method: action.method.clone(),
                pattern: join_paths(&[base_path, &controller.path, &action.path]),
            },
        );
    }
}

/// The per-request orchestrator: route resolution, context assembly,
/// middleware, validation, handler invocation, and response finalization,
/// with telemetry and SSE publish side effects.
pub struct RequestProcessor {
    config: Arc<CoreConfig>,
    routes: ArcSwap<RouteTable>,
    context_builder: igniter_core::ContextBuilder,
    executor: MiddlewareExecutor,
    plugins: Arc<PluginManager>,
    hub: Arc<SseHub>,
    telemetry: Arc<dyn TelemetryProvider>,
    pub(crate) dispatch_table: HashMap<String, DispatchEntry>,
}

impl RequestProcessor {
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn hub(&self) -> &Arc<SseHub> {
        &self.hub
    }

    pub fn plugins(&self) -> &Arc<PluginManager> {
        &self.plugins
    }

    /// Replace the route table (hot reload). Requests in flight keep the
    /// table they resolved against.
    pub fn swap_routes(&self, table: RouteTable) {
        self.routes.store(Arc::new(table));
    }

    /// Process one transport request end to end.
    pub async fn process(&self, raw: RawRequest) -> ProcessOutcome {
        let started = Instant::now();
        let method = raw.method.to_ascii_uppercase();
        let (path, query_str) = match raw.url.find('?') {
            Some(pos) => (raw.url[..pos].to_string(), &raw.url[pos + 1..]),
            None => (raw.url.clone(), ""),
        };

        // The SSE endpoint is served by the hub directly.
        if method == "GET" && path == self.config.sse_path() {
            let query: HashMap<String, String> = form_urlencoded::parse(query_str.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            return match self.hub.handle_connection(&query) {
                Ok(handle) => ProcessOutcome::EventStream(handle),
                Err(error) => {
                    ProcessOutcome::Response(self.error_wire(&error, &method, &path, started))
                }
            };
        }

        let resolved = {
            let routes = self.routes.load();
            routes.resolve(&method, &path)
        };
        let Some(resolved) = resolved else {
            debug!(method = %method, path = %path, "No route matched");
            self.telemetry
                .record_request(&method, 404, started.elapsed(), false);
            self.publish_interactive(&method, &path, 404, started);
            return ProcessOutcome::Response(WireResponse::new(404));
        };
        let action = Arc::clone(&resolved.action);

        let mut ctx = self
            .context_builder
            .build(&raw, resolved.params, self.plugins.proxies())
            .await;

        let span = self.telemetry.start_http_span(&HttpSpanTags {
            method: method.clone(),
            url: raw.url.clone(),
            path: path.clone(),
            user_agent: ctx.request.header("user-agent").map(str::to_owned),
        });
        ctx.capabilities.trace.span_id = Some(span.id.clone());
        ctx.capabilities.span = Some(span.clone());

        let result = self.run_pipeline(&action, &mut ctx).await;
        ProcessOutcome::Response(self.finalize(result, &ctx, &method, &path, started, Some(span)))
    }

    async fn run_pipeline(&self, action: &Action, ctx: &mut RequestContext) -> PipelineResult {
        match self.executor.run_global(ctx).await {
            PipelineOutcome::Proceed => {}
            PipelineOutcome::Early(response) => return PipelineResult::Finalized(response),
            PipelineOutcome::Stopped => {
                return PipelineResult::Finalized(ctx.response.success(Value::Null));
            }
            PipelineOutcome::Failed(error) => return self.classified(&error),
        }

        match self.executor.run_action(&action.middleware, ctx).await {
            PipelineOutcome::Proceed => {}
            PipelineOutcome::Early(response) => return PipelineResult::Finalized(response),
            PipelineOutcome::Stopped => {
                return PipelineResult::Finalized(ctx.response.success(Value::Null));
            }
            PipelineOutcome::Failed(error) => return self.classified(&error),
        }

        // Schema validation at the middleware → handler boundary; parsed
        // forms replace the originals.
        if let Some(schema) = &action.body_schema {
            match schema.validate(&ctx.request.body.as_value()) {
                Ok(normalized) => ctx.request.body = ParsedBody::Json(normalized),
                Err(issues) => return self.classified(&FrameworkError::validation(issues)),
            }
        }
        if let Some(schema) = &action.query_schema {
            let raw_query = Value::Object(
                ctx.request
                    .query
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            );
            match schema.validate(&raw_query) {
                Ok(Value::Object(normalized)) => {
                    ctx.request.query = normalized
                        .into_iter()
                        .map(|(k, v)| (k, query_value_to_string(v)))
                        .collect();
                }
                Ok(_) => {}
                Err(issues) => return self.classified(&FrameworkError::validation(issues)),
            }
        }

        match action.handler.call(ctx).await {
            Ok(HandlerOutput::Response(finalized)) => PipelineResult::Finalized(finalized),
            Ok(HandlerOutput::Raw(wire)) => PipelineResult::Raw(wire),
            Ok(HandlerOutput::Data(value)) => {
                PipelineResult::Finalized(ctx.response.success(value))
            }
            Err(error) => self.classified(&error),
        }
    }

    fn classified(&self, error: &FrameworkError) -> PipelineResult {
        PipelineResult::Finalized(FinalizedResponse::from_classified(classify(
            error,
            self.config.production,
        )))
    }

    fn finalize(
        &self,
        result: PipelineResult,
        ctx: &RequestContext,
        method: &str,
        path: &str,
        started: Instant,
        span: Option<SpanHandle>,
    ) -> WireResponse {
        match result {
            PipelineResult::Raw(mut wire) => {
                wire.headers
                    .push(("X-Request-Id".to_string(), ctx.request.id.clone()));
                self.close_telemetry(method, wire.status, started, None, span);
                self.publish_interactive(method, path, wire.status, started);
                wire
            }
            PipelineResult::Finalized(mut finalized) => {
                if let Some(stream) = &finalized.stream {
                    // Streaming hand-off: unregistered channels are created
                    // on the fly, and the initial event goes out before the
                    // response does.
                    self.hub.register_channel(&stream.channel_id, None);
                    if let Some(data) = &stream.initial_data {
                        self.hub
                            .publish_event(SseEvent::new(&stream.channel_id, data.clone()));
                    }
                }
                for directive in &finalized.revalidates {
                    let mut data = serde_json::Map::new();
                    data.insert("queryKeys".to_string(), json!(directive.query_keys));
                    if let Some(payload) = &directive.data {
                        data.insert("data".to_string(), payload.clone());
                    }
                    data.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
                    let mut event = SseEvent::new(REVALIDATION_CHANNEL, Value::Object(data))
                        .with_type("revalidate");
                    if let Some(scopes) = &directive.scopes {
                        event = event.with_scopes(scopes.clone());
                    }
                    self.hub.publish_event(event);
                }

                finalized
                    .headers
                    .push(("X-Request-Id".to_string(), ctx.request.id.clone()));

                let status = finalized.status;
                let error_message = match &finalized.body {
                    ResponseBody::Envelope {
                        error: Some(error), ..
                    } => Some(error.message.clone()),
                    _ => None,
                };
                let wire = finalized.into_wire();
                self.close_telemetry(method, status, started, error_message.as_deref(), span);
                self.publish_interactive(method, path, status, started);
                wire
            }
        }
    }

    fn error_wire(
        &self,
        error: &FrameworkError,
        method: &str,
        path: &str,
        started: Instant,
    ) -> WireResponse {
        let classified = classify(error, self.config.production);
        let status = classified.status;
        let wire = FinalizedResponse::from_classified(classified).into_wire();
        self.telemetry
            .record_request(method, status, started.elapsed(), false);
        self.publish_interactive(method, path, status, started);
        wire
    }

    fn close_telemetry(
        &self,
        method: &str,
        status: u16,
        started: Instant,
        error: Option<&str>,
        span: Option<SpanHandle>,
    ) {
        if let Some(span) = span {
            self.telemetry.finish_http_span(&span, status, error);
        }
        self.telemetry
            .record_request(method, status, started.elapsed(), status < 400);
    }

    /// Interactive mode: per-request metrics on the `system` channel.
    /// Publish failures cannot reach the caller.
    fn publish_interactive(&self, method: &str, path: &str, status: u16, started: Instant) {
        if !self.config.interactive_mode {
            return;
        }
        self.hub.publish_event(
            SseEvent::new(
                SYSTEM_CHANNEL,
                json!({
                    "method": method,
                    "path": path,
                    "status": status,
                    "durationMs": started.elapsed().as_millis() as u64,
                    "timestamp": Utc::now().to_rfc3339(),
                }),
            )
            .with_type("request.completed"),
        );
    }
}

/// Normalized query values go back into the string map; scalars keep
/// their JSON rendering.
fn query_value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
