//! slo-router-cli entry point.
//!
//! ## CLI Subcommands
//!
//! - `slo-router-cli route` - Route one request and print the response
//! - `slo-router-cli models list` - List catalog variants
//! - `slo-router-cli config show|defaults|validate` - Inspect configuration

use std::process::ExitCode;

use slo_router::cli::{config_cmd, models_cmd, route_cmd, EXIT_USAGE};
use slo_router::config;
use slo_router::telemetry::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");
    let rest = args.get(2..).unwrap_or_default();

    let env = config::load();
    if let Err(e) = init_logging(&env.logging) {
        eprintln!("Logging disabled: {}", e);
    }

    match command {
        "route" => {
            let code = route_cmd::run_route(rest).await;
            exit_code(code)
        }
        "models" => {
            let subcommand = rest.first().map(|s| s.as_str()).unwrap_or("list");
            match subcommand {
                "list" => exit_code(models_cmd::run_list(rest.get(1..).unwrap_or_default())),
                _ => {
                    eprintln!("Unknown models subcommand: {}", subcommand);
                    print_command_help("models");
                    exit_code(EXIT_USAGE)
                }
            }
        }
        "config" => {
            let subcommand = rest.first().map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    config_cmd::run_show();
                    ExitCode::SUCCESS
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => exit_code(config_cmd::run_validate()),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    exit_code(EXIT_USAGE)
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = rest.first() {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("slo-router {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            exit_code(EXIT_USAGE)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(code.clamp(0, 255) as u8)
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "slo-router - SLO-aware inference request router v{}

USAGE:
    slo-router-cli [COMMAND] [OPTIONS]

COMMANDS:
    route        Route one request to the best-fitting model variant
    models       Inspect catalog variants (list)
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

EXAMPLES:
    slo-router-cli route --catalog variants.toml --min-accuracy 0.8
    slo-router-cli route --catalog variants.toml --max-latency 0.1 --warmup 5
    slo-router-cli route --catalog endpoints.jsonl --model resnet50 --input img.bin
    slo-router-cli models list --catalog variants.toml --application image
    slo-router-cli config validate

ENVIRONMENT:
    SLO_ROUTER_CATALOG               Catalog used when --catalog is omitted
    SLO_ROUTER_ACCURACY_FLOOR        Accuracy floor for latency fallback (default: 0.5)
    SLO_ROUTER_WARMUP_EXECUTIONS     Warm runs per variant before routing (default: 0)
    SLO_ROUTER_EXECUTION_TIMEOUT_MS  Executor timeout, 0 disables (default: 0)
    SLO_ROUTER_PROMOTE_ALL           Start with every variant active (default: false)
    SLO_ROUTER_LOG_LEVEL             Tracing filter (default: info)
    SLO_ROUTER_LOG_FORMAT            json or pretty (default: json)
    SLO_ROUTER_LOG_FILE              Append logs to this file instead of stderr

EXIT CODES:
    0  Success
    1  Failure / no suitable model
    2  Usage or configuration error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "route" => {
            eprintln!(
                "slo-router-cli route - Route one request

USAGE:
    slo-router-cli route [--catalog PATH] TARGET [OPTIONS]

TARGET (exactly one):
    --model NAME          Use the named variant
    --min-accuracy X      Fastest variant with accuracy >= X
    --max-latency SECS    Most accurate variant expected within SECS

OPTIONS:
    --catalog PATH        Catalog file (.toml manifest or JSON lines)
    --application KIND    image or text (default: image)
    --input FILE          Request payload
    --warmup N            Profile every variant with N warm runs first

DESCRIPTION:
    Loads the catalog, executes the request through a simulated executor
    that sleeps for each variant's profiled latency, and prints the
    response with its placement, queue and execution delays as JSON.

EXIT CODES:
    0  Request served
    1  No suitable model, or execution failed
    2  Usage or catalog error
"
            );
        }
        "models" => {
            eprintln!(
                "slo-router-cli models - Inspect catalog variants

USAGE:
    slo-router-cli models list [--catalog PATH] [OPTIONS]

OPTIONS:
    --application KIND    Only variants of this application
    --min-accuracy X      Only variants with accuracy >= X
    --max-latency SECS    Only variants with expected latency <= SECS
"
            );
        }
        "config" => {
            eprintln!(
                "slo-router-cli config - Inspect configuration

USAGE:
    slo-router-cli config show       Print effective values
    slo-router-cli config defaults   Print default values
    slo-router-cli config validate   Check environment and catalog (exit 0/2)
"
            );
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
        }
    }
}
