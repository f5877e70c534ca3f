use crate::plugin::{Hook, HookEvent, HookSet, Plugin};
use chrono::Utc;
use dashmap::DashMap;
use igniter_core::{Controller, FrameworkError, PluginActionResult, PluginHandle, Store};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Timeouts and switches for the plugin runtime.
#[derive(Debug, Clone)]
pub struct PluginManagerConfig {
    /// Wall-clock budget for one plugin action invocation.
    pub action_timeout: Duration,
    /// Budget for one event listener.
    pub listener_timeout: Duration,
    /// Budget for one lifecycle hook.
    pub hook_timeout: Duration,
    pub metrics_enabled: bool,
}

impl Default for PluginManagerConfig {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_secs(30),
            listener_timeout: Duration::from_secs(5),
            hook_timeout: Duration::from_secs(5),
            metrics_enabled: true,
        }
    }
}

#[derive(Default)]
struct PluginMetrics {
    calls: AtomicU64,
    errors: AtomicU64,
    total_time_ms: AtomicU64,
}

/// Point-in-time view of one plugin's call metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginMetricsSnapshot {
    pub calls: u64,
    pub errors: u64,
    pub total_time_ms: u64,
    pub avg_time_ms: f64,
}

struct Inner {
    plugins: DashMap<String, Arc<Plugin>>,
    order: std::sync::RwLock<Vec<String>>,
    loaded: AtomicBool,
    store: Arc<dyn Store>,
    config: PluginManagerConfig,
    metrics: DashMap<String, PluginMetrics>,
    router_hooks: std::sync::RwLock<HookSet>,
}

/// Registers plugins, validates the dependency graph, loads in topological
/// order, and backs the per-plugin proxies injected into request contexts.
pub struct PluginManager {
    inner: Arc<Inner>,
}

impl PluginManager {
    pub fn new(store: Arc<dyn Store>, config: PluginManagerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                plugins: DashMap::new(),
                order: std::sync::RwLock::new(Vec::new()),
                loaded: AtomicBool::new(false),
                store,
                config,
                metrics: DashMap::new(),
                router_hooks: std::sync::RwLock::new(HookSet::new()),
            }),
        }
    }

    /// Register a plugin. Only valid before `load()`.
    pub fn register(&self, plugin: Plugin) -> Result<(), FrameworkError> {
        if self.inner.loaded.load(Ordering::Acquire) {
            return Err(FrameworkError::initialization(
                "plugins cannot be registered after load",
            ));
        }
        if self.inner.plugins.contains_key(&plugin.name) {
            return Err(FrameworkError::initialization(format!(
                "plugin {} is already registered",
                plugin.name
            )));
        }
        info!(plugin = %plugin.name, version = %plugin.version, "Registered plugin");
        self.inner
            .plugins
            .insert(plugin.name.clone(), Arc::new(plugin));
        Ok(())
    }

    /// Router-level hooks run before plugin hooks for the same event.
    pub fn register_router_hook(&self, event: HookEvent, hook: Arc<dyn Hook>) {
        self.inner
            .router_hooks
            .write()
            .expect("router hook lock poisoned")
            .add(event, hook);
    }

    /// Validate the dependency graph and fix the topological load order.
    pub fn load(&self) -> Result<(), FrameworkError> {
        let order = self.inner.topo_order()?;
        info!(order = ?order, "Plugins loaded");
        *self.inner.order.write().expect("order lock poisoned") = order;
        self.inner.loaded.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.load(Ordering::Acquire)
    }

    /// Plugin names in load order.
    pub fn load_order(&self) -> Vec<String> {
        self.inner.order.read().expect("order lock poisoned").clone()
    }

    /// One proxy per plugin, for injection into request contexts.
    pub fn proxies(&self) -> HashMap<String, Arc<dyn PluginHandle>> {
        self.inner
            .plugins
            .iter()
            .map(|entry| {
                let name = entry.key().clone();
                let proxy: Arc<dyn PluginHandle> = Arc::new(PluginProxy {
                    name: name.clone(),
                    inner: Arc::clone(&self.inner),
                });
                (name, proxy)
            })
            .collect()
    }

    /// Visit plugin-contributed controllers in load order.
    pub fn with_controllers(
        &self,
        mut visit: impl FnMut(&Controller) -> Result<(), FrameworkError>,
    ) -> Result<(), FrameworkError> {
        for name in self.load_order() {
            if let Some(plugin) = self.inner.plugins.get(&name) {
                for controller in &plugin.controllers {
                    visit(controller)?;
                }
            }
        }
        Ok(())
    }

    /// Emit an event on behalf of a plugin (see [`PluginHandle::emit`]).
    pub async fn emit(
        &self,
        source: &str,
        event: &str,
        payload: Value,
    ) -> Result<(), FrameworkError> {
        self.inner.emit(source, event, payload).await
    }

    /// Invoke a plugin action directly.
    pub async fn execute_action(
        &self,
        plugin: &str,
        action: &str,
        input: Value,
    ) -> PluginActionResult {
        self.inner.execute_action(plugin, action, input).await
    }

    /// Run hooks for an event: router-level first, then each plugin's, in
    /// load order. Failures are logged and swallowed.
    pub async fn run_hooks(&self, event: HookEvent, payload: &Value) {
        let router_hooks: Vec<Arc<dyn Hook>> = {
            let guard = self
                .inner
                .router_hooks
                .read()
                .expect("router hook lock poisoned");
            guard.get(event).to_vec()
        };
        for hook in router_hooks {
            self.inner.run_hook("router", event, &hook, payload).await;
        }

        for name in self.load_order() {
            let Some(plugin) = self.inner.plugins.get(&name).map(|p| Arc::clone(&p)) else {
                continue;
            };
            for hook in plugin.hooks.get(event) {
                self.inner.run_hook(&name, event, hook, payload).await;
            }
        }
    }

    /// Run every plugin's `onComplete` hooks in reverse load order.
    pub async fn shutdown(&self) {
        let payload = json!({ "reason": "shutdown" });
        for name in self.load_order().into_iter().rev() {
            let Some(plugin) = self.inner.plugins.get(&name).map(|p| Arc::clone(&p)) else {
                continue;
            };
            for hook in plugin.hooks.get(HookEvent::Complete) {
                self.inner
                    .run_hook(&name, HookEvent::Complete, hook, &payload)
                    .await;
            }
        }
        info!("Plugin manager shut down");
    }

    /// Metrics snapshot for one plugin, when metrics are enabled.
    pub fn metrics(&self, plugin: &str) -> Option<PluginMetricsSnapshot> {
        let entry = self.inner.metrics.get(plugin)?;
        let calls = entry.calls.load(Ordering::Relaxed);
        let total_time_ms = entry.total_time_ms.load(Ordering::Relaxed);
        Some(PluginMetricsSnapshot {
            calls,
            errors: entry.errors.load(Ordering::Relaxed),
            total_time_ms,
            avg_time_ms: if calls == 0 {
                0.0
            } else {
                total_time_ms as f64 / calls as f64
            },
        })
    }
}

impl Inner {
    /// Kahn's algorithm over the `requires` edges. Also rejects missing
    /// requirements and declared conflicts.
    fn topo_order(&self) -> Result<Vec<String>, FrameworkError> {
        let plugins: Vec<Arc<Plugin>> = self.plugins.iter().map(|e| Arc::clone(&e)).collect();

        for plugin in &plugins {
            for required in &plugin.requires {
                if !self.plugins.contains_key(required) {
                    return Err(FrameworkError::initialization(format!(
                        "plugin {} requires missing plugin {}",
                        plugin.name, required
                    )));
                }
            }
            for conflict in &plugin.conflicts {
                if self.plugins.contains_key(conflict) {
                    return Err(FrameworkError::initialization(format!(
                        "plugin {} conflicts with loaded plugin {}",
                        plugin.name, conflict
                    )));
                }
            }
        }

        let mut in_degree: HashMap<&str, usize> = plugins
            .iter()
            .map(|p| (p.name.as_str(), p.requires.len()))
            .collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for plugin in &plugins {
            for required in &plugin.requires {
                dependents
                    .entry(required.as_str())
                    .or_default()
                    .push(plugin.name.as_str());
            }
        }

        let mut ready: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();
        ready.sort_unstable();

        let mut order = Vec::with_capacity(plugins.len());
        while let Some(name) = ready.pop() {
            order.push(name.to_string());
            for dependent in dependents.get(name).into_iter().flatten() {
                let degree = in_degree
                    .get_mut(dependent)
                    .expect("dependent is a registered plugin");
                *degree -= 1;
                if *degree == 0 {
                    ready.push(dependent);
                }
            }
        }

        if order.len() != plugins.len() {
            return Err(FrameworkError::initialization(
                "plugin dependency graph contains a cycle",
            ));
        }
        Ok(order)
    }

    async fn execute_action(
        &self,
        plugin_name: &str,
        action_name: &str,
        input: Value,
    ) -> PluginActionResult {
        let started = Instant::now();
        let failure = |error: String, started: Instant| PluginActionResult {
            success: false,
            data: None,
            error: Some(error),
            execution_time_ms: started.elapsed().as_millis() as u64,
            plugin_name: plugin_name.to_string(),
            action_name: action_name.to_string(),
        };

        let Some(plugin) = self.plugins.get(plugin_name).map(|p| Arc::clone(&p)) else {
            return failure(format!("unknown plugin: {plugin_name}"), started);
        };
        let Some(action) = plugin.actions.get(action_name) else {
            return failure(format!("unknown action: {action_name}"), started);
        };

        let input = match &action.input_schema {
            Some(schema) => match schema.validate(&input) {
                Ok(normalized) => normalized,
                Err(issues) => {
                    let result = failure(
                        format!("input validation failed: {} issue(s)", issues.len()),
                        started,
                    );
                    self.record_metrics(plugin_name, &result);
                    return result;
                }
            },
            None => input,
        };

        let result = match timeout(self.config.action_timeout, action.handler.call(input)).await {
            Ok(Ok(data)) => PluginActionResult {
                success: true,
                data: Some(data),
                error: None,
                execution_time_ms: started.elapsed().as_millis() as u64,
                plugin_name: plugin_name.to_string(),
                action_name: action_name.to_string(),
            },
            Ok(Err(error)) => failure(error.to_string(), started),
            Err(_) => failure(
                format!(
                    "action timed out after {}ms",
                    self.config.action_timeout.as_millis()
                ),
                started,
            ),
        };

        self.record_metrics(plugin_name, &result);
        result
    }

    fn record_metrics(&self, plugin_name: &str, result: &PluginActionResult) {
        if !self.config.metrics_enabled {
            return;
        }
        let entry = self
            .metrics
            .entry(plugin_name.to_string())
            .or_default();
        entry.calls.fetch_add(1, Ordering::Relaxed);
        entry
            .total_time_ms
            .fetch_add(result.execution_time_ms, Ordering::Relaxed);
        if !result.success {
            entry.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Local listeners first (sequential, each under the listener budget),
    /// then best-effort distributed publish via the store.
    async fn emit(&self, source: &str, event: &str, payload: Value) -> Result<(), FrameworkError> {
        let plugins: Vec<Arc<Plugin>> = self.plugins.iter().map(|e| Arc::clone(&e)).collect();

        for plugin in &plugins {
            for listener in plugin.listeners.iter().filter(|l| l.event == event) {
                let payload_for_listener = match &listener.schema {
                    Some(schema) => match schema.validate(&payload) {
                        Ok(normalized) => normalized,
                        Err(issues) => {
                            warn!(
                                plugin = %plugin.name,
                                event = %event,
                                issues = issues.len(),
                                "Event payload rejected by listener schema"
                            );
                            continue;
                        }
                    },
                    None => payload.clone(),
                };

                match timeout(
                    self.config.listener_timeout,
                    listener.handler.handle(event, &payload_for_listener),
                )
                .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        warn!(plugin = %plugin.name, event = %event, error = %error, "Event listener failed");
                    }
                    Err(_) => {
                        warn!(plugin = %plugin.name, event = %event, "Event listener timed out");
                    }
                }
            }
        }

        let message = json!({
            "plugin": source,
            "event": event,
            "payload": payload,
            "timestamp": Utc::now().to_rfc3339(),
        })
        .to_string();
        let channel = format!("plugin:events:{event}");
        if let Err(error) = self.store.publish(&channel, &message).await {
            warn!(channel = %channel, error = %error, "Distributed event publish failed");
        }
        Ok(())
    }

    async fn run_hook(&self, owner: &str, event: HookEvent, hook: &Arc<dyn Hook>, payload: &Value) {
        match timeout(self.config.hook_timeout, hook.run(event, payload)).await {
            Ok(Ok(())) => {
                debug!(owner = %owner, event = %event, "Hook completed");
            }
            Ok(Err(error)) => {
                warn!(owner = %owner, event = %event, error = %error, "Hook failed");
            }
            Err(_) => {
                warn!(owner = %owner, event = %event, "Hook timed out");
            }
        }
    }
}

/// Proxy through which handlers reach one plugin. Cheap to clone into
/// every request context.
struct PluginProxy {
    name: String,
    inner: Arc<Inner>,
}

#[async_trait::async_trait]
impl PluginHandle for PluginProxy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, action: &str, input: Value) -> PluginActionResult {
        self.inner.execute_action(&self.name, action, input).await
    }

    async fn emit(&self, event: &str, payload: Value) -> Result<(), FrameworkError> {
        self.inner.emit(&self.name, event, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{EventHandler, EventListener, PluginAction, action_fn};
    use async_trait::async_trait;
    use igniter_core::{FnSchema, ValidationIssue};
    use igniter_store::MemoryStore;
    use std::sync::atomic::AtomicUsize;

    fn manager() -> (PluginManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (
            PluginManager::new(store.clone(), PluginManagerConfig::default()),
            store,
        )
    }

    fn echo_plugin(name: &str) -> Plugin {
        Plugin::new(name, "1.0.0").action(PluginAction::new(
            "echo",
            action_fn(|input| Box::pin(async move { Ok(json!({ "echo": input })) })),
        ))
    }

    #[tokio::test]
    async fn test_register_after_load_fails() {
        let (manager, _) = manager();
        manager.register(echo_plugin("a")).unwrap();
        manager.load().unwrap();
        assert!(manager.register(echo_plugin("b")).is_err());
    }

    #[tokio::test]
    async fn test_duplicate_registration_fails() {
        let (manager, _) = manager();
        manager.register(echo_plugin("a")).unwrap();
        assert!(manager.register(echo_plugin("a")).is_err());
    }

    #[tokio::test]
    async fn test_missing_requirement_fails_load() {
        let (manager, _) = manager();
        manager
            .register(Plugin::new("a", "1.0.0").requires("ghost"))
            .unwrap();
        assert!(manager.load().is_err());
    }

    #[tokio::test]
    async fn test_conflict_fails_load() {
        let (manager, _) = manager();
        manager.register(echo_plugin("a")).unwrap();
        manager
            .register(Plugin::new("b", "1.0.0").conflicts("a"))
            .unwrap();
        assert!(manager.load().is_err());
    }

    #[tokio::test]
    async fn test_cycle_fails_load() {
        let (manager, _) = manager();
        manager
            .register(Plugin::new("a", "1.0.0").requires("b"))
            .unwrap();
        manager
            .register(Plugin::new("b", "1.0.0").requires("a"))
            .unwrap();
        let error = manager.load().unwrap_err();
        assert!(error.to_string().contains("cycle"));
    }

    #[tokio::test]
    async fn test_topological_order() {
        let (manager, _) = manager();
        manager
            .register(Plugin::new("c", "1.0.0").requires("b"))
            .unwrap();
        manager
            .register(Plugin::new("b", "1.0.0").requires("a"))
            .unwrap();
        manager.register(Plugin::new("a", "1.0.0")).unwrap();
        manager.load().unwrap();

        let order = manager.load_order();
        let position =
            |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(position("a") < position("b"));
        assert!(position("b") < position("c"));
    }

    #[tokio::test]
    async fn test_action_execution() {
        let (manager, _) = manager();
        manager.register(echo_plugin("mailer")).unwrap();
        manager.load().unwrap();

        let result = manager.execute_action("mailer", "echo", json!(7)).await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["echo"], 7);
        assert_eq!(result.plugin_name, "mailer");
        assert_eq!(result.action_name, "echo");
    }

    #[tokio::test]
    async fn test_unknown_plugin_and_action() {
        let (manager, _) = manager();
        manager.register(echo_plugin("mailer")).unwrap();
        manager.load().unwrap();

        let result = manager.execute_action("ghost", "echo", json!(null)).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("unknown plugin"));

        let result = manager.execute_action("mailer", "ghost", json!(null)).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("unknown action"));
    }

    #[tokio::test]
    async fn test_action_input_validation() {
        let (manager, _) = manager();
        let plugin = Plugin::new("strict", "1.0.0").action(
            PluginAction::new(
                "check",
                action_fn(|input| Box::pin(async move { Ok(input) })),
            )
            .with_schema(Arc::new(FnSchema(|value: &Value| {
                if value.get("id").is_some() {
                    Ok(value.clone())
                } else {
                    Err(vec![ValidationIssue::new("id", "required", "required")])
                }
            }))),
        );
        manager.register(plugin).unwrap();
        manager.load().unwrap();

        let ok = manager.execute_action("strict", "check", json!({"id": 1})).await;
        assert!(ok.success);

        let bad = manager.execute_action("strict", "check", json!({})).await;
        assert!(!bad.success);
        assert!(bad.error.unwrap().contains("validation"));
    }

    #[tokio::test]
    async fn test_action_timeout_does_not_block_siblings() {
        let store = Arc::new(MemoryStore::new());
        let manager = PluginManager::new(
            store,
            PluginManagerConfig {
                action_timeout: Duration::from_millis(30),
                ..PluginManagerConfig::default()
            },
        );
        let plugin = Plugin::new("slow", "1.0.0")
            .action(PluginAction::new(
                "sleep",
                action_fn(|_| {
                    Box::pin(async {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        Ok(json!(null))
                    })
                }),
            ))
            .action(PluginAction::new(
                "fast",
                action_fn(|_| Box::pin(async { Ok(json!("ok")) })),
            ));
        manager.register(plugin).unwrap();
        manager.load().unwrap();

        let slow = manager.execute_action("slow", "sleep", json!(null)).await;
        assert!(!slow.success);
        assert!(slow.error.unwrap().contains("timed out"));

        let fast = manager.execute_action("slow", "fast", json!(null)).await;
        assert!(fast.success);
    }

    #[tokio::test]
    async fn test_metrics_tracking() {
        let (manager, _) = manager();
        let plugin = echo_plugin("mailer").action(PluginAction::new(
            "fail",
            action_fn(|_| {
                Box::pin(async { Err(FrameworkError::internal("boom")) })
            }),
        ));
        manager.register(plugin).unwrap();
        manager.load().unwrap();

        manager.execute_action("mailer", "echo", json!(null)).await;
        manager.execute_action("mailer", "echo", json!(null)).await;
        manager.execute_action("mailer", "fail", json!(null)).await;

        let snapshot = manager.metrics("mailer").unwrap();
        assert_eq!(snapshot.calls, 3);
        assert_eq!(snapshot.errors, 1);
        assert!(snapshot.avg_time_ms >= 0.0);
    }

    struct CountingListener {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingListener {
        async fn handle(&self, _event: &str, _payload: &Value) -> Result<(), FrameworkError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_emit_runs_listeners_and_publishes() {
        let (manager, store) = manager();
        let count = Arc::new(AtomicUsize::new(0));
        let plugin = Plugin::new("audit", "1.0.0").listener(EventListener::new(
            "user.created",
            Arc::new(CountingListener {
                count: Arc::clone(&count),
            }),
        ));
        manager.register(plugin).unwrap();
        manager.load().unwrap();

        let mut rx = store.subscribe("plugin:events:user.created").await.unwrap();
        manager
            .emit("audit", "user.created", json!({"id": 1}))
            .await
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        let message = rx.recv().await.unwrap();
        let parsed: Value = serde_json::from_str(&message).unwrap();
        assert_eq!(parsed["event"], "user.created");
        assert_eq!(parsed["plugin"], "audit");
        assert_eq!(parsed["payload"]["id"], 1);
    }

    #[tokio::test]
    async fn test_listener_error_does_not_stop_others() {
        struct FailingListener;
        #[async_trait]
        impl EventHandler for FailingListener {
            async fn handle(&self, _event: &str, _payload: &Value) -> Result<(), FrameworkError> {
                Err(FrameworkError::internal("listener boom"))
            }
        }

        let (manager, _) = manager();
        let count = Arc::new(AtomicUsize::new(0));
        manager
            .register(
                Plugin::new("audit", "1.0.0")
                    .listener(EventListener::new("e", Arc::new(FailingListener)))
                    .listener(EventListener::new(
                        "e",
                        Arc::new(CountingListener {
                            count: Arc::clone(&count),
                        }),
                    )),
            )
            .unwrap();
        manager.load().unwrap();

        manager.emit("audit", "e", json!(null)).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    struct RecordingHook {
        log: Arc<std::sync::Mutex<Vec<String>>>,
        tag: String,
    }

    #[async_trait]
    impl Hook for RecordingHook {
        async fn run(&self, event: HookEvent, _payload: &Value) -> Result<(), FrameworkError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{event}", self.tag));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_router_hooks_run_before_plugin_hooks() {
        let (manager, _) = manager();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        manager
            .register(Plugin::new("jobs", "1.0.0").hook(
                HookEvent::Start,
                Arc::new(RecordingHook {
                    log: Arc::clone(&log),
                    tag: "plugin".into(),
                }),
            ))
            .unwrap();
        manager.register_router_hook(
            HookEvent::Start,
            Arc::new(RecordingHook {
                log: Arc::clone(&log),
                tag: "router".into(),
            }),
        );
        manager.load().unwrap();

        manager.run_hooks(HookEvent::Start, &json!({})).await;
        assert_eq!(
            *log.lock().unwrap(),
            vec!["router:onStart", "plugin:onStart"]
        );
    }

    #[tokio::test]
    async fn test_shutdown_runs_complete_hooks_in_reverse_order() {
        let (manager, _) = manager();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        manager
            .register(Plugin::new("a", "1.0.0").hook(
                HookEvent::Complete,
                Arc::new(RecordingHook {
                    log: Arc::clone(&log),
                    tag: "a".into(),
                }),
            ))
            .unwrap();
        manager
            .register(Plugin::new("b", "1.0.0").requires("a").hook(
                HookEvent::Complete,
                Arc::new(RecordingHook {
                    log: Arc::clone(&log),
                    tag: "b".into(),
                }),
            ))
            .unwrap();
        manager.load().unwrap();

        manager.shutdown().await;
        assert_eq!(
            *log.lock().unwrap(),
            vec!["b:onComplete", "a:onComplete"]
        );
    }

    #[tokio::test]
    async fn test_proxies_expose_plugins() {
        let (manager, _) = manager();
        manager.register(echo_plugin("mailer")).unwrap();
        manager.load().unwrap();

        let proxies = manager.proxies();
        let proxy = proxies.get("mailer").unwrap();
        assert_eq!(proxy.name(), "mailer");
        let result = proxy.call("echo", json!("hi")).await;
        assert!(result.success);
        proxy.emit("mailer.ping", json!(null)).await.unwrap();
    }
}
