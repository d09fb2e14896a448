//! Environment configuration (spec §6 "Configuration"): typed defaults,
//! fail-fast validation of anything that was set but unparsable.

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Default model used when `MODEL_PRIMARY`/`MODEL_SECONDARY` are unset.
/// A placeholder name; operators point it at whatever long-context model
/// their `GenerateFn` endpoint actually serves.
pub const DEFAULT_MODEL: &str = "long-context-default-v1";

/// Errors raised while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable was set but could not be parsed as its
    /// expected type.
    #[error("invalid value for {var}: {message}")]
    InvalidValue {
        /// The environment variable name.
        var: &'static str,
        /// Why parsing failed.
        message: String,
    },
}

/// The fully-resolved server configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Primary provider's API credential, if configured.
    pub api_key_primary: Option<String>,
    /// Secondary provider's API credential, if configured.
    pub api_key_secondary: Option<String>,
    /// Primary provider's model identifier.
    pub model_primary: String,
    /// Secondary provider's model identifier.
    pub model_secondary: String,
    /// Primary provider's generate endpoint.
    pub endpoint_primary: String,
    /// Secondary provider's generate endpoint.
    pub endpoint_secondary: String,
    /// Session idle TTL, in seconds.
    pub session_ttl_seconds: i64,
    /// Maximum simultaneous sessions.
    pub max_sessions: usize,
    /// Turn-count cap after which a session reports `canFinalize`.
    pub max_session_turns: usize,
    /// Maximum cache entries before LRU eviction.
    pub cache_max_entries: usize,
    /// Maximum approximate cache size in bytes before LRU eviction.
    pub cache_max_bytes: usize,
    /// Cache entry time-to-live, in seconds.
    pub cache_ttl_seconds: u64,
    /// Consecutive retryable failures before a provider's circuit opens.
    pub circuit_failure_threshold: u32,
    /// Seconds an open circuit stays open before retrying.
    pub circuit_reset_seconds: i64,
    /// Optional ceiling on `estimateCost`; unset disables budget gating.
    pub cost_budget_usd: Option<f64>,
    /// Seconds between scheduled health sweeps.
    pub health_interval_seconds: u64,
    /// `tracing` filter directive, e.g. `info` or `reasoning_serverd=debug`.
    pub log_level: String,
    /// Optional path for append-only checkpoint persistence.
    pub memory_checkpoint_path: Option<PathBuf>,
    /// Resident-memory ceiling, in bytes, used by the built-in memory
    /// health check.
    pub memory_limit_bytes: u64,
    /// Root directory every tool-supplied file path must resolve inside
    /// of (spec §4.8). Defaults to the process's current directory.
    pub workspace_root: PathBuf,
}

fn var_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_or_default<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match var_opt(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            var: name,
            message: format!("could not parse {raw:?}"),
        }),
    }
}

impl Config {
    /// Load configuration from the process environment, applying spec
    /// defaults for anything unset. Fails fast if a set variable doesn't
    /// parse as its expected type.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cost_budget_usd = match var_opt("COST_BUDGET_USD") {
            None => None,
            Some(raw) => Some(raw.parse::<f64>().map_err(|_| ConfigError::InvalidValue {
                var: "COST_BUDGET_USD",
                message: format!("could not parse {raw:?} as a float"),
            })?),
        };

        let log_level = var_opt("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        if !matches!(log_level.as_str(), "debug" | "info" | "warn" | "error") {
            return Err(ConfigError::InvalidValue {
                var: "LOG_LEVEL",
                message: format!("{log_level:?} is not one of debug, info, warn, error"),
            });
        }

        Ok(Self {
            api_key_primary: var_opt("API_KEY_PRIMARY"),
            api_key_secondary: var_opt("API_KEY_SECONDARY"),
            model_primary: var_opt("MODEL_PRIMARY").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            model_secondary: var_opt("MODEL_SECONDARY").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            endpoint_primary: var_opt("PROVIDER_ENDPOINT_PRIMARY")
                .unwrap_or_else(|| "https://llm-gateway.invalid/primary/generate".to_string()),
            endpoint_secondary: var_opt("PROVIDER_ENDPOINT_SECONDARY")
                .unwrap_or_else(|| "https://llm-gateway.invalid/secondary/generate".to_string()),
            session_ttl_seconds: parse_or_default("SESSION_TTL_SECONDS", 1800)?,
            max_sessions: parse_or_default("MAX_SESSIONS", 100)?,
            max_session_turns: parse_or_default("MAX_SESSION_TURNS", 10)?,
            cache_max_entries: parse_or_default("CACHE_MAX_ENTRIES", 1000)?,
            cache_max_bytes: parse_or_default("CACHE_MAX_BYTES", 100 * 1024 * 1024)?,
            cache_ttl_seconds: parse_or_default("CACHE_TTL_SECONDS", 1800)?,
            circuit_failure_threshold: parse_or_default("CIRCUIT_FAILURE_THRESHOLD", 3)?,
            circuit_reset_seconds: parse_or_default("CIRCUIT_RESET_SECONDS", 60)?,
            cost_budget_usd,
            health_interval_seconds: parse_or_default("HEALTH_INTERVAL_SECONDS", 30)?,
            log_level,
            memory_checkpoint_path: var_opt("MEMORY_CHECKPOINT_PATH").map(PathBuf::from),
            memory_limit_bytes: parse_or_default("MEMORY_LIMIT_BYTES", 512 * 1024 * 1024)?,
            workspace_root: var_opt("WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))),
        })
    }
}
