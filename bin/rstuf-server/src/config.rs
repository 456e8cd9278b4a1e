//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

/// Runtime configuration for rstuf-server.
///
/// Every field has a default so the server starts without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:80"`).
    pub bind_address: String,

    /// sqlx SQLite URL holding the bootstrap record and the task queue
    /// (default: `"sqlite://rstuf.db?mode=rwc"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,sqlx=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Serve `/api-docs/openapi.json`.
    pub enable_docs: bool,

    /// Comma-separated list of allowed CORS origins; wildcard when unset.
    pub cors_allowed_origins: Option<String>,

    /// Interval between two bootstrap watchdog polls.
    pub watchdog_poll_interval: Duration,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        };

        Self {
            bind_address: env_or("RSTUF_BIND", "0.0.0.0:80"),
            database_url: env_or("RSTUF_DATABASE_URL", "sqlite://rstuf.db?mode=rwc"),
            log_level: env_or("RSTUF_LOG", "info"),
            log_json: flag("RSTUF_LOG_JSON", false),
            enable_docs: flag("RSTUF_ENABLE_DOCS", true),
            cors_allowed_origins: lookup("RSTUF_CORS_ORIGINS").filter(|v| !v.trim().is_empty()),
            watchdog_poll_interval: Duration::from_millis(parse_or(
                lookup("RSTUF_WATCHDOG_POLL_MS"),
                1000,
            )),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}
