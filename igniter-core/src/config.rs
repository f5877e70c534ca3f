use figment::Figment;
use figment::providers::Env;
use serde::{Deserialize, Serialize};

/// Minimum log level, parsed from `IGNITER_LOG_LEVEL`.
///
/// Accepts the aliases `WARNING` (for `WARN`) and `VERBOSE` (for `DEBUG`).
/// Unknown values fall back to [`LogLevel::Warn`] rather than failing
/// startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Fatal,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "FATAL" => Some(LogLevel::Fatal),
            "ERROR" => Some(LogLevel::Error),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "INFO" => Some(LogLevel::Info),
            "DEBUG" | "VERBOSE" => Some(LogLevel::Debug),
            "TRACE" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Fatal => "FATAL",
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    ///
    /// `tracing` has no FATAL level, so it maps to `error`.
    pub fn as_tracing_directive(&self) -> &'static str {
        match self {
            LogLevel::Fatal | LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Serialize for LogLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(LogLevel::parse(&raw).unwrap_or_default())
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core runtime configuration.
///
/// Values come from `IGNITER_*` environment variables via figment's `Env`
/// provider, plus the conventional `NODE_ENV` and `DISABLE_ERROR_TRACKING`
/// switches read directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Base path prepended to every controller path (`IGNITER_APP_BASE_PATH`).
    #[serde(default = "default_base_path")]
    pub app_base_path: String,

    /// Absolute application URL, used for self-dispatch and the SSE
    /// connection info returned by streaming responses (`IGNITER_APP_URL`).
    #[serde(default = "default_app_url")]
    pub app_url: String,

    /// Minimum log level (`IGNITER_LOG_LEVEL`).
    #[serde(default)]
    pub log_level: LogLevel,

    /// Publish per-request metrics on the `system` channel
    /// (`IGNITER_INTERACTIVE_MODE`).
    #[serde(default)]
    pub interactive_mode: bool,

    /// Suppress details in generic error envelopes (`NODE_ENV=production`).
    #[serde(default)]
    pub production: bool,

    /// Suppress error-tracking logs (`DISABLE_ERROR_TRACKING`).
    #[serde(default)]
    pub error_tracking_disabled: bool,

    /// Seconds between SSE keep-alive comment frames.
    #[serde(default = "default_keep_alive_secs")]
    pub sse_keep_alive_secs: u64,
}

impl CoreConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config: CoreConfig = Figment::new()
            .merge(Env::prefixed("IGNITER_").only(&[
                "app_base_path",
                "app_url",
                "log_level",
                "sse_keep_alive_secs",
            ]))
            .extract()?;

        // Flag-style variables: any value other than ""/"0"/"false" enables.
        config.interactive_mode = env_flag("IGNITER_INTERACTIVE_MODE");
        config.error_tracking_disabled = env_flag("DISABLE_ERROR_TRACKING");
        config.production = std::env::var("NODE_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Ok(config)
    }

    /// `{app_url}{base_path}/sse/events`, the endpoint clients connect to.
    pub fn sse_endpoint(&self) -> String {
        format!(
            "{}{}/sse/events",
            self.app_url.trim_end_matches('/'),
            normalized_base(&self.app_base_path)
        )
    }

    /// The request path of the SSE endpoint (no scheme/host).
    pub fn sse_path(&self) -> String {
        format!("{}/sse/events", normalized_base(&self.app_base_path))
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            app_base_path: default_base_path(),
            app_url: default_app_url(),
            log_level: LogLevel::default(),
            interactive_mode: false,
            production: false,
            error_tracking_disabled: false,
            sse_keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

fn normalized_base(base: &str) -> String {
    let trimmed = base.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn env_flag(name: &str) -> bool {
    match std::env::var(name) {
        Ok(value) => !matches!(value.trim(), "" | "0" | "false" | "FALSE" | "off"),
        Err(_) => false,
    }
}

fn default_base_path() -> String {
    "/api/v1".to_string()
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}
