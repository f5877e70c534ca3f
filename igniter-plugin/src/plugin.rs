use async_trait::async_trait;
use futures_util::future::BoxFuture;
use igniter_core::{Controller, FrameworkError, Schema};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Handler backing a typed plugin action.
#[async_trait]
pub trait PluginActionHandler: Send + Sync {
    async fn call(&self, input: Value) -> Result<Value, FrameworkError>;
}

struct FnActionHandler<F>(F);

#[async_trait]
impl<F> PluginActionHandler for FnActionHandler<F>
where
    F: Fn(Value) -> BoxFuture<'static, Result<Value, FrameworkError>> + Send + Sync,
{
    async fn call(&self, input: Value) -> Result<Value, FrameworkError> {
        (self.0)(input).await
    }
}

/// Adapt a closure returning a boxed future into a [`PluginActionHandler`].
pub fn action_fn<F>(f: F) -> Arc<dyn PluginActionHandler>
where
    F: Fn(Value) -> BoxFuture<'static, Result<Value, FrameworkError>> + Send + Sync + 'static,
{
    Arc::new(FnActionHandler(f))
}

/// A callable action a plugin exposes through its proxy.
pub struct PluginAction {
    pub name: String,
    pub input_schema: Option<Arc<dyn Schema>>,
    pub handler: Arc<dyn PluginActionHandler>,
}

impl PluginAction {
    pub fn new(name: impl Into<String>, handler: Arc<dyn PluginActionHandler>) -> Self {
        Self {
            name: name.into(),
            input_schema: None,
            handler,
        }
    }

    pub fn with_schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.input_schema = Some(schema);
        self
    }
}

/// Handler invoked when a listened-to event is emitted.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &str, payload: &Value) -> Result<(), FrameworkError>;
}

/// A plugin's subscription to an event, with optional payload validation.
pub struct EventListener {
    pub event: String,
    pub schema: Option<Arc<dyn Schema>>,
    pub handler: Arc<dyn EventHandler>,
}

impl EventListener {
    pub fn new(event: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            event: event.into(),
            schema: None,
            handler,
        }
    }

    pub fn with_schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Lifecycle events hooks can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    Start,
    Progress,
    Success,
    Failure,
    Retry,
    Complete,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::Start => "onStart",
            HookEvent::Progress => "onProgress",
            HookEvent::Success => "onSuccess",
            HookEvent::Failure => "onFailure",
            HookEvent::Retry => "onRetry",
            HookEvent::Complete => "onComplete",
        }
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle hook. Failures are logged, never propagated.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn run(&self, event: HookEvent, payload: &Value) -> Result<(), FrameworkError>;
}

/// Hooks grouped by lifecycle event.
#[derive(Default)]
pub struct HookSet {
    hooks: HashMap<HookEvent, Vec<Arc<dyn Hook>>>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event: HookEvent, hook: Arc<dyn Hook>) {
        self.hooks.entry(event).or_default().push(hook);
    }

    pub fn get(&self, event: HookEvent) -> &[Arc<dyn Hook>] {
        self.hooks.get(&event).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// A plugin: identity, dependency constraints, and the capabilities it
/// contributes. Immutable once the manager has loaded it.
pub struct Plugin {
    pub name: String,
    pub version: String,
    pub requires: Vec<String>,
    pub conflicts: Vec<String>,
    pub actions: HashMap<String, PluginAction>,
    pub controllers: Vec<Controller>,
    pub listeners: Vec<EventListener>,
    pub hooks: HookSet,
}

impl Plugin {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            requires: Vec::new(),
            conflicts: Vec::new(),
            actions: HashMap::new(),
            controllers: Vec::new(),
            listeners: Vec::new(),
            hooks: HookSet::new(),
        }
    }

    pub fn requires(mut self, plugin: impl Into<String>) -> Self {
        self.requires.push(plugin.into());
        self
    }

    pub fn conflicts(mut self, plugin: impl Into<String>) -> Self {
        self.conflicts.push(plugin.into());
        self
    }

    pub fn action(mut self, action: PluginAction) -> Self {
        self.actions.insert(action.name.clone(), action);
        self
    }

    pub fn controller(mut self, controller: Controller) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn listener(mut self, listener: EventListener) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn hook(mut self, event: HookEvent, hook: Arc<dyn Hook>) -> Self {
        self.hooks.add(event, hook);
        self
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("requires", &self.requires)
            .field("conflicts", &self.conflicts)
            .field("actions", &self.actions.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
