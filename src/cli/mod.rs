// Copyright 2024-2026 SLO Router Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI commands for the router binary.
//!
//! ## Usage
//!
//! ```bash
//! slo-router-cli route --catalog variants.toml --min-accuracy 0.8
//! slo-router-cli models list --catalog variants.toml --application image
//! slo-router-cli config show
//! ```

pub mod config_cmd;
pub mod models_cmd;
pub mod route_cmd;

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::config;

/// Command succeeded.
pub const EXIT_OK: i32 = 0;
/// Command ran but failed, including "no suitable model".
pub const EXIT_FAILURE: i32 = 1;
/// Bad arguments or configuration.
pub const EXIT_USAGE: i32 = 2;

#[derive(Error, Debug, PartialEq)]
pub enum ArgError {
    #[error("Missing value for {0}")]
    MissingValue(String),

    #[error("Invalid value for {flag}: {value}")]
    InvalidValue { flag: String, value: String },

    #[error("Unknown argument: {0}")]
    Unknown(String),

    #[error("{0}")]
    Usage(String),
}

/// Flag/value pairs parsed from `--flag value` arguments.
#[derive(Debug, Default)]
pub struct Flags {
    pairs: Vec<(String, String)>,
}

impl Flags {
    /// Parse `args`, accepting only flags listed in `allowed`.
    pub fn parse(args: &[String], allowed: &[&str]) -> Result<Self, ArgError> {
        let mut pairs = Vec::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if !allowed.contains(&arg.as_str()) {
                return Err(ArgError::Unknown(arg.clone()));
            }
            let value = iter
                .next()
                .filter(|v| !v.starts_with("--"))
                .ok_or_else(|| ArgError::MissingValue(arg.clone()))?;
            pairs.push((arg.clone(), value.clone()));
        }
        Ok(Self { pairs })
    }

    /// Last value given for `flag`.
    pub fn get(&self, flag: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(f, _)| f == flag)
            .map(|(_, v)| v.as_str())
    }

    /// Parse the value of `flag`, if present.
    pub fn parse_value<T: FromStr>(&self, flag: &str) -> Result<Option<T>, ArgError> {
        match self.get(flag) {
            None => Ok(None),
            Some(value) => value.parse::<T>().map(Some).map_err(|_| ArgError::InvalidValue {
                flag: flag.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Catalog path from `--catalog`, falling back to `SLO_ROUTER_CATALOG`.
    pub fn catalog_path(&self) -> Result<PathBuf, ArgError> {
        self.get("--catalog")
            .map(PathBuf::from)
            .or_else(|| config::load().catalog_path)
            .ok_or_else(|| {
                ArgError::Usage(format!(
                    "no catalog given; pass --catalog PATH or set {}",
                    config::ENV_CATALOG
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_flags() {
        let flags = Flags::parse(
            &args(&["--catalog", "c.toml", "--min-accuracy", "0.8"]),
            &["--catalog", "--min-accuracy"],
        )
        .unwrap();
        assert_eq!(flags.get("--catalog"), Some("c.toml"));
        assert_eq!(flags.parse_value::<f64>("--min-accuracy").unwrap(), Some(0.8));
        assert_eq!(flags.parse_value::<f64>("--max-latency").unwrap(), None);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let err = Flags::parse(&args(&["--bogus", "1"]), &["--catalog"]).unwrap_err();
        assert_eq!(err, ArgError::Unknown("--bogus".to_string()));
    }

    #[test]
    fn test_missing_value_rejected() {
        let err = Flags::parse(&args(&["--catalog"]), &["--catalog"]).unwrap_err();
        assert_eq!(err, ArgError::MissingValue("--catalog".to_string()));

        let err = Flags::parse(&args(&["--catalog", "--model", "m"]), &["--catalog", "--model"])
            .unwrap_err();
        assert_eq!(err, ArgError::MissingValue("--catalog".to_string()));
    }

    #[test]
    fn test_invalid_value() {
        let flags = Flags::parse(&args(&["--warmup", "many"]), &["--warmup"]).unwrap();
        assert!(matches!(
            flags.parse_value::<usize>("--warmup"),
            Err(ArgError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_last_value_wins() {
        let flags =
            Flags::parse(&args(&["--model", "a", "--model", "b"]), &["--model"]).unwrap();
        assert_eq!(flags.get("--model"), Some("b"));
    }
}
