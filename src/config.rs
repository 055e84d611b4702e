//! Router configuration loading from environment variables.
//!
//! All configuration values are loaded from `SLO_ROUTER_*` environment
//! variables with sensible defaults. Invalid values fall back to defaults
//! without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `SLO_ROUTER_ACCURACY_FLOOR` | 0.5 | Accuracy floor for latency-SLO fallback, in [0, 1] |
//! | `SLO_ROUTER_CATALOG` | unset | Catalog file (`.toml` manifest or JSON lines) |
//! | `SLO_ROUTER_WARMUP_EXECUTIONS` | 0 | Warm executions per variant during warm-up |
//! | `SLO_ROUTER_EXECUTION_TIMEOUT_MS` | 0 | Executor timeout in ms (0 = disabled) |
//! | `SLO_ROUTER_PROMOTE_ALL` | false | Start with every variant active |
//! | `SLO_ROUTER_LOG_LEVEL` | info | Tracing filter directive |
//! | `SLO_ROUTER_LOG_FORMAT` | json | `json` or `pretty` |
//! | `SLO_ROUTER_LOG_FILE` | unset | Append logs to this file instead of stderr |

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::scheduler::{DispatcherConfig, DEFAULT_ACCURACY_FLOOR};
use crate::telemetry::{LogConfig, LogFormat};

pub const ENV_ACCURACY_FLOOR: &str = "SLO_ROUTER_ACCURACY_FLOOR";
pub const ENV_CATALOG: &str = "SLO_ROUTER_CATALOG";
pub const ENV_WARMUP_EXECUTIONS: &str = "SLO_ROUTER_WARMUP_EXECUTIONS";
pub const ENV_EXECUTION_TIMEOUT_MS: &str = "SLO_ROUTER_EXECUTION_TIMEOUT_MS";
pub const ENV_PROMOTE_ALL: &str = "SLO_ROUTER_PROMOTE_ALL";
pub const ENV_LOG_LEVEL: &str = "SLO_ROUTER_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "SLO_ROUTER_LOG_FORMAT";
pub const ENV_LOG_FILE: &str = "SLO_ROUTER_LOG_FILE";

/// Upper bound on warm-up executions per variant.
const MAX_WARMUP_EXECUTIONS: usize = 10_000;

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConfig {
    pub accuracy_floor: f64,
    pub catalog: Option<String>,
    pub warmup_executions: usize,
    pub execution_timeout_ms: u64,
    pub promote_all: bool,
    pub log_level: String,
    pub log_format: String,
    pub log_file: Option<String>,
}

/// All router configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub accuracy_floor: f64,
    pub catalog_path: Option<PathBuf>,
    pub warmup_executions: usize,
    pub dispatcher: DispatcherConfig,
    pub promote_all: bool,
    pub logging: LogConfig,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a finite `f64` env var, returning `default` on missing or invalid.
fn parse_f64(key: &str, default: f64) -> f64 {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a boolean env var (`1`/`true`/`yes`/`on`), `default` otherwise.
fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn load_logging() -> LogConfig {
    let defaults = LogConfig::default();
    let level = std::env::var(ENV_LOG_LEVEL)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(defaults.level);
    let format = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or(defaults.format);
    let file = std::env::var(ENV_LOG_FILE)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);
    LogConfig {
        format,
        level,
        file,
    }
}

fn load_dispatcher_config() -> DispatcherConfig {
    let timeout_ms = parse_u64(ENV_EXECUTION_TIMEOUT_MS, 0);
    DispatcherConfig {
        execution_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let accuracy_floor = parse_f64(ENV_ACCURACY_FLOOR, DEFAULT_ACCURACY_FLOOR).clamp(0.0, 1.0);
    let catalog_path = std::env::var(ENV_CATALOG)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);
    let warmup_executions = parse_usize(ENV_WARMUP_EXECUTIONS, 0).min(MAX_WARMUP_EXECUTIONS);

    EnvConfig {
        accuracy_floor,
        catalog_path,
        warmup_executions,
        dispatcher: load_dispatcher_config(),
        promote_all: parse_bool(ENV_PROMOTE_ALL, false),
        logging: load_logging(),
    }
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            accuracy_floor: self.accuracy_floor,
            catalog: self
                .catalog_path
                .as_ref()
                .map(|p| p.display().to_string()),
            warmup_executions: self.warmup_executions,
            execution_timeout_ms: self
                .dispatcher
                .execution_timeout
                .map(|t| t.as_millis() as u64)
                .unwrap_or(0),
            promote_all: self.promote_all,
            log_level: self.logging.level.clone(),
            log_format: self.logging.format.as_str().to_string(),
            log_file: self.logging.file.as_ref().map(|p| p.display().to_string()),
        }
    }
}

/// Serializes tests that mutate `SLO_ROUTER_*` variables.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) fn clear_env_vars() {
    for k in [
        ENV_ACCURACY_FLOOR,
        ENV_CATALOG,
        ENV_WARMUP_EXECUTIONS,
        ENV_EXECUTION_TIMEOUT_MS,
        ENV_PROMOTE_ALL,
        ENV_LOG_LEVEL,
        ENV_LOG_FORMAT,
        ENV_LOG_FILE,
    ] {
        std::env::remove_var(k);
    }
}
