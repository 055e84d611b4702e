// Copyright 2024-2026 SLO Router Contributors
// SPDX-License-Identifier: Apache-2.0

//! Route CLI subcommand: dispatch one request through a simulated executor.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::{ArgError, Flags, EXIT_FAILURE, EXIT_OK, EXIT_USAGE};
use crate::config;
use crate::engine::SimulatedExecutor;
use crate::models::{Application, FileCatalog, VariantCatalog};
use crate::scheduler::{DispatchResponse, InferenceRequest, SloKind};
use crate::{Router, RouterConfig};

const FLAGS: &[&str] = &[
    "--catalog",
    "--model",
    "--min-accuracy",
    "--max-latency",
    "--application",
    "--input",
    "--warmup",
];

/// Printed form of a [`DispatchResponse`], with the executor output decoded.
#[derive(Debug, Serialize)]
pub struct RouteOutput {
    pub request_id: u64,
    pub model: String,
    pub accuracy: f64,
    pub model_miss: bool,
    pub cold: bool,
    pub placement_delay: f64,
    pub queue_delay: f64,
    pub exec_delay: f64,
    pub overall_latency: f64,
    pub completed_at: String,
    pub output: serde_json::Value,
}

impl From<DispatchResponse> for RouteOutput {
    fn from(r: DispatchResponse) -> Self {
        let output = serde_json::from_slice(&r.response).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&r.response).into_owned())
        });
        Self {
            request_id: r.request_id,
            model: r.model,
            accuracy: r.accuracy,
            model_miss: r.model_miss,
            cold: r.cold,
            placement_delay: r.placement_delay,
            queue_delay: r.queue_delay,
            exec_delay: r.exec_delay,
            overall_latency: r.overall_latency,
            completed_at: r.completed_at.to_rfc3339(),
            output,
        }
    }
}

/// Build the inbound request from parsed flags.
pub fn build_request(flags: &Flags) -> Result<InferenceRequest, ArgError> {
    let application = flags
        .parse_value::<Application>("--application")?
        .unwrap_or_default();

    let payload = match flags.get("--input") {
        Some(path) => std::fs::read(path).map_err(|e| ArgError::InvalidValue {
            flag: "--input".to_string(),
            value: format!("{path}: {e}"),
        })?,
        None => Vec::new(),
    };

    let model = flags.get("--model");
    let min_accuracy = flags.parse_value::<f64>("--min-accuracy")?;
    let max_latency = flags.parse_value::<f64>("--max-latency")?;

    match (model, min_accuracy, max_latency) {
        (Some(name), None, None) => Ok(InferenceRequest::for_model(name, application, payload)),
        (None, Some(t), None) => Ok(InferenceRequest::with_slo(
            SloKind::Accuracy,
            t,
            application,
            payload,
        )),
        (None, None, Some(t)) => Ok(InferenceRequest::with_slo(
            SloKind::Latency,
            t,
            application,
            payload,
        )),
        _ => Err(ArgError::Usage(
            "exactly one of --model, --min-accuracy, --max-latency is required".to_string(),
        )),
    }
}

/// Run `route`. Returns the process exit code.
pub async fn run_route(args: &[String]) -> i32 {
    let flags = match Flags::parse(args, FLAGS) {
        Ok(flags) => flags,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_USAGE;
        }
    };
    let (request, catalog_path, warmup) = match parse(&flags) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_USAGE;
        }
    };

    let router = match build_router(&catalog_path, warmup) {
        Ok(router) => router,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_USAGE;
        }
    };

    for report in router.warm_up().await {
        if let Err(e) = report {
            eprintln!("Warm-up failed: {}", e);
        }
    }

    match router.route(request).await {
        Ok(response) => match serde_json::to_string_pretty(&RouteOutput::from(response)) {
            Ok(json) => {
                println!("{}", json);
                EXIT_OK
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                EXIT_FAILURE
            }
        },
        Err(e) if e.is_not_found() => {
            eprintln!("No suitable model: {}", e);
            EXIT_FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_FAILURE
        }
    }
}

fn parse(flags: &Flags) -> Result<(InferenceRequest, std::path::PathBuf, Option<usize>), ArgError> {
    let request = build_request(flags)?;
    let catalog_path = flags.catalog_path()?;
    let warmup = flags.parse_value::<usize>("--warmup")?;
    Ok((request, catalog_path, warmup))
}

fn build_router(catalog_path: &Path, warmup: Option<usize>) -> Result<Router, crate::BuildError> {
    let catalog = FileCatalog::new(catalog_path);
    let descriptors = catalog.list_known_variants()?;
    let executor = SimulatedExecutor::from_descriptors(&descriptors);

    let mut router_config = RouterConfig::from(&config::load());
    if let Some(n) = warmup {
        router_config.warmup_executions = n;
    }
    Router::from_catalog(&catalog, router_config, Arc::new(executor))
}
