//! The Igniter middleware pipeline and plugin system: layered middleware
//! execution with early-return semantics, plugin registration and
//! dependency-ordered loading, typed action proxies, and the event bus
//! bridged onto the store's pub/sub.

pub mod manager;
pub mod middleware;
pub mod plugin;

pub use manager::{PluginManager, PluginManagerConfig, PluginMetricsSnapshot};
pub use middleware::{MiddlewareExecutor, PipelineOutcome};
pub use plugin::{
    EventHandler, EventListener, Hook, HookEvent, HookSet, Plugin, PluginAction,
    PluginActionHandler, action_fn,
};
