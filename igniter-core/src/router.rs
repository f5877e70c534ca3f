use crate::action::{Action, Controller};
use crate::error::FrameworkError;
use matchit::Router as MatchitRouter;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A successful route resolution.
pub struct ResolvedRoute {
    pub action: Arc<Action>,
    pub params: HashMap<String, String>,
}

/// Immutable route table over per-method radix tries.
///
/// Built once at initialization; `(method, pattern)` pairs are unique and
/// resolution is deterministic across requests.
pub struct RouteTable {
    methods: HashMap<String, MatchitRouter<Arc<Action>>>,
    patterns: Vec<(String, String)>,
}

impl RouteTable {
    /// Resolve `(method, path)` to an action plus captured params.
    /// An empty path never matches.
    pub fn resolve(&self, method: &str, path: &str) -> Option<ResolvedRoute> {
        if path.is_empty() {
            return None;
        }
        let router = self.methods.get(&method.to_ascii_uppercase())?;
        let matched = router.at(path).ok()?;
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Some(ResolvedRoute {
            action: Arc::clone(matched.value),
            params,
        })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Registered `(method, pattern)` pairs, for diagnostics.
    pub fn patterns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.patterns.iter().map(|(m, p)| (m.as_str(), p.as_str()))
    }
}

/// Builds the frozen [`RouteTable`].
pub struct RouteTableBuilder {
    base_path: String,
    methods: HashMap<String, MatchitRouter<Arc<Action>>>,
    patterns: Vec<(String, String)>,
}

impl RouteTableBuilder {
    pub fn new(base_path: &str) -> Self {
        Self {
            base_path: base_path.to_string(),
            methods: HashMap::new(),
            patterns: Vec::new(),
        }
    }

    /// Register every action of a controller under
    /// `{base}/{controller}/{action}`.
    pub fn controller(&mut self, controller: &Controller) -> Result<&mut Self, FrameworkError> {
        for action in controller.actions.values() {
            let pattern = join_paths(&[&self.base_path, &controller.path, &action.path]);
            self.route(&action.method, &pattern, Arc::clone(action))?;
        }
        Ok(self)
    }

    /// Register a single action under a full pattern.
    pub fn route(
        &mut self,
        method: &str,
        pattern: &str,
        action: Arc<Action>,
    ) -> Result<(), FrameworkError> {
        let method = method.to_ascii_uppercase();
        let matchit_pattern = to_matchit(pattern);

        let router = self.methods.entry(method.clone()).or_default();
        router.insert(&matchit_pattern, action).map_err(|e| {
            FrameworkError::initialization(format!(
                "route {method} {pattern} conflicts with an existing route: {e}"
            ))
        })?;

        debug!(method = %method, pattern = %pattern, "Route registered");
        self.patterns.push((method, pattern.to_string()));
        Ok(())
    }

    pub fn build(self) -> RouteTable {
        RouteTable {
            methods: self.methods,
            patterns: self.patterns,
        }
    }
}

/// Join path segments, collapsing duplicate slashes. The result always
/// starts with `/` and has no trailing slash (except the bare root).
pub fn join_paths(parts: &[&str]) -> String {
    let mut joined = String::new();
    for part in parts {
        for segment in part.split('/') {
            if segment.is_empty() {
                continue;
            }
            joined.push('/');
            joined.push_str(segment);
        }
    }
    if joined.is_empty() {
        joined.push('/');
    }
    joined
}

/// Convert `:name` placeholder segments to matchit's `{name}` captures.
fn to_matchit(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{name}}}")
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Substitute `:name` segments with values, for self-dispatch.
pub fn apply_params(pattern: &str, params: &HashMap<String, String>) -> String {
    pattern
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                params
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| segment.to_string())
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
