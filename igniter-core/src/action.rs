use crate::context::RequestContext;
use crate::error::FrameworkError;
use crate::request::WireResponse;
use crate::response::FinalizedResponse;
use crate::schema::Schema;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// What a handler hands back to the processor.
#[derive(Debug)]
pub enum HandlerOutput {
    /// A finalized builder response, used as-is.
    Response(FinalizedResponse),
    /// A raw transport response that bypasses the envelope.
    Raw(WireResponse),
    /// Any other value, wrapped as `200 application/json`.
    Data(Value),
}

/// A typed action handler.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, ctx: &mut RequestContext) -> Result<HandlerOutput, FrameworkError>;
}

/// Outcome of a single middleware step.
pub enum MiddlewareOutcome {
    /// Proceed to the next middleware.
    Continue,
    /// Merge into the user context (reserved keys are dropped with a
    /// warning), then proceed.
    Merge(serde_json::Map<String, Value>),
    /// Skip the rest of the pipeline and the handler; serialize this.
    EarlyReturn(FinalizedResponse),
    /// This middleware contributes nothing; proceed.
    Skip,
    /// End the pipeline without error and finalize without a handler
    /// result.
    Stop,
    /// Abort the pipeline with an error.
    Failed(FrameworkError),
}

/// A middleware step. Global middleware run in registration order, then
/// the action's own in declared order.
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, ctx: &mut RequestContext) -> MiddlewareOutcome;
}

/// An action descriptor: method, path pattern, schemas, middleware, and
/// the handler. Immutable after registration.
pub struct Action {
    pub name: String,
    pub method: String,
    /// Pattern relative to the controller, may contain `:name` segments.
    pub path: String,
    pub body_schema: Option<Arc<dyn Schema>>,
    pub query_schema: Option<Arc<dyn Schema>>,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub handler: Arc<dyn Handler>,
}

impl Action {
    pub fn new(
        name: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        Self {
            name: name.into(),
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            body_schema: None,
            query_schema: None,
            middleware: Vec::new(),
            handler,
        }
    }

    pub fn with_body_schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.body_schema = Some(schema);
        self
    }

    pub fn with_query_schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.query_schema = Some(schema);
        self
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// A named group of actions under a shared path prefix.
pub struct Controller {
    pub name: String,
    pub path: String,
    pub actions: HashMap<String, Arc<Action>>,
}

impl Controller {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            actions: HashMap::new(),
        }
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.insert(action.name.clone(), Arc::new(action));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::context::test_support::test_context;
    use serde_json::json;

    struct StaticHandler(Value);

    #[async_trait]
    impl Handler for StaticHandler {
        async fn call(&self, _ctx: &mut RequestContext) -> Result<HandlerOutput, FrameworkError> {
            Ok(HandlerOutput::Data(self.0.clone()))
        }
    }

    #[tokio::test]
    async fn test_handler_invocation() {
        let handler = StaticHandler(json!(1));
        let mut ctx = test_context(Arc::new(CoreConfig::default()));
        let output = handler.call(&mut ctx).await.unwrap();
        match output {
            HandlerOutput::Data(value) => assert_eq!(value, json!(1)),
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn test_action_builder() {
        let action = Action::new("list", "get", "/", Arc::new(StaticHandler(json!(null))));
        assert_eq!(action.method, "GET");
        assert!(action.body_schema.is_none());
        assert!(action.middleware.is_empty());
    }

    #[test]
    fn test_controller_collects_actions() {
        let handler: Arc<dyn Handler> = Arc::new(StaticHandler(json!(null)));
        let controller = Controller::new("users", "/users")
            .action(Action::new("list", "GET", "/", handler.clone()))
            .action(Action::new("get", "GET", "/:id", handler));
        assert_eq!(controller.actions.len(), 2);
        assert!(controller.actions.contains_key("list"));
    }
}
