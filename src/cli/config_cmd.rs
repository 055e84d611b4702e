// Copyright 2024-2026 SLO Router Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These commands read configuration directly from environment variables.

use super::{EXIT_OK, EXIT_USAGE};
use crate::config::{self, EffectiveConfig};
use crate::models::{FileCatalog, VariantCatalog, VariantRegistry};
use crate::telemetry::LogFormat;

/// Print effective config as key-value pairs to stdout.
pub fn run_show() {
    let cfg = config::load().effective_config();
    print_config(&cfg);
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    println!("{}=0.5", config::ENV_ACCURACY_FLOOR);
    println!("{}=", config::ENV_CATALOG);
    println!("{}=0", config::ENV_WARMUP_EXECUTIONS);
    println!("{}=0", config::ENV_EXECUTION_TIMEOUT_MS);
    println!("{}=false", config::ENV_PROMOTE_ALL);
    println!("{}=info", config::ENV_LOG_LEVEL);
    println!("{}=json", config::ENV_LOG_FORMAT);
    println!("{}=", config::ENV_LOG_FILE);
}

/// Validate configuration for obvious misconfigurations.
///
/// Raw environment values are checked before defaults hide them, and the
/// catalog, if configured, must load into a registry. Returns 0 if valid,
/// 2 if any warnings are found.
pub fn run_validate() -> i32 {
    let warnings = validate();
    for warning in &warnings {
        eprintln!("WARNING: {}", warning);
    }
    if warnings.is_empty() {
        println!("Configuration is valid.");
        EXIT_OK
    } else {
        EXIT_USAGE
    }
}

fn validate() -> Vec<String> {
    let mut warnings = Vec::new();

    if let Ok(raw) = std::env::var(config::ENV_ACCURACY_FLOOR) {
        match raw.trim().parse::<f64>() {
            Ok(v) if (0.0..=1.0).contains(&v) => {}
            _ => warnings.push(format!(
                "{} ({}) is not in [0, 1]; it is clamped or ignored",
                config::ENV_ACCURACY_FLOOR,
                raw
            )),
        }
    }

    for key in [config::ENV_WARMUP_EXECUTIONS, config::ENV_EXECUTION_TIMEOUT_MS] {
        if let Ok(raw) = std::env::var(key) {
            if raw.trim().parse::<u64>().is_err() {
                warnings.push(format!("{} ({}) is not a non-negative integer", key, raw));
            }
        }
    }

    if let Ok(raw) = std::env::var(config::ENV_LOG_FORMAT) {
        if let Err(e) = raw.parse::<LogFormat>() {
            warnings.push(format!("{}: {}", config::ENV_LOG_FORMAT, e));
        }
    }

    let cfg = config::load();
    if let Some(path) = &cfg.logging.file {
        if let Err(e) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
            warnings.push(format!("log file {}: {}", path.display(), e));
        }
    }

    if let Some(path) = cfg.catalog_path {
        let loaded = FileCatalog::new(&path)
            .list_known_variants()
            .map_err(|e| e.to_string())
            .and_then(|d| VariantRegistry::from_descriptors(d).map_err(|e| e.to_string()));
        match loaded {
            Ok(registry) if registry.is_empty() => {
                warnings.push(format!("catalog {} has no variants", path.display()))
            }
            Ok(_) => {}
            Err(e) => warnings.push(format!("catalog {}: {}", path.display(), e)),
        }
    }

    warnings
}

fn print_config(cfg: &EffectiveConfig) {
    println!("{}={}", config::ENV_ACCURACY_FLOOR, cfg.accuracy_floor);
    println!(
        "{}={}",
        config::ENV_CATALOG,
        cfg.catalog.as_deref().unwrap_or_default()
    );
    println!("{}={}", config::ENV_WARMUP_EXECUTIONS, cfg.warmup_executions);
    println!("{}={}", config::ENV_EXECUTION_TIMEOUT_MS, cfg.execution_timeout_ms);
    println!("{}={}", config::ENV_PROMOTE_ALL, cfg.promote_all);
    println!("{}={}", config::ENV_LOG_LEVEL, cfg.log_level);
    println!("{}={}", config::ENV_LOG_FORMAT, cfg.log_format);
    println!(
        "{}={}",
        config::ENV_LOG_FILE,
        cfg.log_file.as_deref().unwrap_or_default()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{clear_env_vars, ENV_LOCK};
    use std::io::Write;

    fn lock() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn test_validate_passes_with_defaults() {
        let _lock = lock();
        clear_env_vars();
        assert_eq!(run_validate(), 0, "default config should pass validation");
    }

    #[test]
    fn test_validate_flags_out_of_range_floor() {
        let _lock = lock();
        clear_env_vars();
        std::env::set_var(config::ENV_ACCURACY_FLOOR, "1.5");
        let warnings = validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains(config::ENV_ACCURACY_FLOOR));
        clear_env_vars();
    }

    #[test]
    fn test_validate_flags_bad_numbers_and_format() {
        let _lock = lock();
        clear_env_vars();
        std::env::set_var(config::ENV_WARMUP_EXECUTIONS, "lots");
        std::env::set_var(config::ENV_LOG_FORMAT, "xml");
        assert_eq!(validate().len(), 2);
        assert_eq!(run_validate(), 2);
        clear_env_vars();
    }

    #[test]
    fn test_validate_checks_catalog() {
        let _lock = lock();
        clear_env_vars();
        std::env::set_var(config::ENV_CATALOG, "/nonexistent/catalog.toml");
        assert_eq!(validate().len(), 1);

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[[variant]]\nname = \"m\"\naccuracy = 0.7").unwrap();
        std::env::set_var(config::ENV_CATALOG, file.path());
        assert!(validate().is_empty());
        clear_env_vars();
    }

    #[test]
    fn test_validate_checks_log_file() {
        let _lock = lock();
        clear_env_vars();
        std::env::set_var(config::ENV_LOG_FILE, "/nonexistent/dir/router.log");
        let warnings = validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("log file"));

        let dir = tempfile::tempdir().unwrap();
        std::env::set_var(config::ENV_LOG_FILE, dir.path().join("router.log"));
        assert!(validate().is_empty());
        clear_env_vars();
    }

    #[test]
    fn test_print_config_includes_all_fields() {
        let cfg = EffectiveConfig {
            accuracy_floor: 0.5,
            catalog: Some("variants.toml".to_string()),
            warmup_executions: 3,
            execution_timeout_ms: 0,
            promote_all: false,
            log_level: "info".to_string(),
            log_format: "json".to_string(),
            log_file: Some("router.log".to_string()),
        };
        // Smoke-test: just call without panicking.
        print_config(&cfg);
    }
}
