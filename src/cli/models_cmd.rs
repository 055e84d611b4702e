// Copyright 2024-2026 SLO Router Contributors
// SPDX-License-Identifier: Apache-2.0

//! Models CLI subcommand: list.
//!
//! Loads a catalog file and displays the variants that match the optional
//! application and SLO bounds.

use super::{ArgError, Flags, EXIT_OK, EXIT_USAGE};
use crate::models::{Application, FileCatalog, VariantCatalog, VariantInfo, VariantRegistry};

const FLAGS: &[&str] = &["--catalog", "--application", "--min-accuracy", "--max-latency"];

/// Run `models list`. Returns the process exit code.
pub fn run_list(args: &[String]) -> i32 {
    match list(args) {
        Ok(variants) => {
            print_variants(&variants);
            EXIT_OK
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_USAGE
        }
    }
}

/// Variants from the catalog named in `args` that match its filters.
pub fn list(args: &[String]) -> Result<Vec<VariantInfo>, Box<dyn std::error::Error>> {
    let flags = Flags::parse(args, FLAGS)?;
    let path = flags.catalog_path()?;
    let min_accuracy = flags.parse_value::<f64>("--min-accuracy")?.unwrap_or(0.0);
    let max_latency = flags
        .parse_value::<f64>("--max-latency")?
        .unwrap_or(f64::INFINITY);
    if min_accuracy.is_nan() || max_latency.is_nan() {
        return Err(ArgError::Usage("thresholds must be numbers".to_string()).into());
    }

    let descriptors = FileCatalog::new(path).list_known_variants()?;
    let registry = VariantRegistry::from_descriptors(descriptors)?;

    let variants = match flags.parse_value::<Application>("--application")? {
        Some(app) => registry.matching(app, min_accuracy, max_latency),
        None => registry
            .infos()
            .into_iter()
            .filter(|v| v.accuracy >= min_accuracy && v.effective_latency <= max_latency)
            .collect(),
    };
    Ok(variants)
}

/// Format and print variants to stdout.
pub fn print_variants(variants: &[VariantInfo]) {
    if variants.is_empty() {
        println!("No matching variants.");
        return;
    }

    println!(
        "{:<30} {:<6} {:>9} {:>14} {:>14} {:>8}",
        "NAME", "APP", "ACCURACY", "LATENCY (ms)", "COLD (ms)", "FAILED"
    );
    println!("{}", "-".repeat(86));

    for v in variants {
        println!(
            "{:<30} {:<6} {:>9.3} {:>14.1} {:>14.1} {:>8}",
            truncate(&v.name, 29),
            v.application.to_string(),
            v.accuracy,
            v.effective_latency * 1000.0,
            v.cold_latency * 1000.0,
            v.failures,
        );
    }

    println!("{}", "-".repeat(86));
    println!("{} variant(s)", variants.len());
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
