use crate::config::ValidatorConfig;
use crate::context::{Direction, ErrorPolicy, ValidationMode, ValidationReport};
use crate::error::ValidationError;
use crate::model::ModelBuilder;
use crate::schema::SwaggerTree;
use crate::transport::{Exchange, Transport};
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use http::Method;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::info;

/// Command-line interface for the Swagger 2.0 validator
#[derive(Parser, Debug)]
#[command(name = "swagger-validator")]
#[command(about = "Validate HTTP exchanges against Swagger 2.0 contracts", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the contract with every referenced definition inlined
    Bundle {
        /// Path or URL of the contract (JSON or YAML)
        #[arg(short, long)]
        spec: String,

        /// Single-line JSON instead of pretty-printed
        #[arg(long, default_value_t = false)]
        compact: bool,
    },
    /// Print the example request/response model of every operation
    Model {
        /// Path or URL of the contract (JSON or YAML)
        #[arg(short, long)]
        spec: String,

        /// Single-line JSON instead of pretty-printed
        #[arg(long, default_value_t = false)]
        compact: bool,
    },
    /// Validate a request, and optionally its response
    Check {
        /// Path or URL of the contract (JSON or YAML)
        #[arg(short, long)]
        spec: String,

        /// HTTP method of the request
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Absolute request URL, or a path with query (`/v1/pets?limit=1`)
        #[arg(short, long)]
        url: String,

        /// Request header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body, or `@file` to read it from a file
        #[arg(short, long)]
        body: Option<String>,

        /// Response status; enables response validation
        #[arg(long)]
        status: Option<u16>,

        /// Response header as `Name: value` (repeatable)
        #[arg(long = "response-header")]
        response_headers: Vec<String>,

        /// Response body, or `@file` to read it from a file
        #[arg(long)]
        response_body: Option<String>,

        /// `pass` ignores undeclared keys, `deny` reports them
        #[arg(long)]
        mode: Option<ValidationMode>,

        /// Report every violation instead of stopping at the first
        #[arg(long, default_value_t = false)]
        all: bool,

        /// Print the report as JSON on stdout
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

/// Print validation errors to stderr
pub fn print_issues(errors: &[ValidationError]) {
    eprintln!("\n❌ Validation failed. {} issue(s) found:\n", errors.len());
    for error in errors {
        eprintln!("{}", error);
    }
    eprintln!();
}

/// Print the errors of an invalid report and exit with status 1
pub fn fail_if_issues(report: ValidationReport) {
    if !report.is_valid() {
        print_issues(report.errors());
        std::process::exit(1);
    }
}

/// Execute a parsed command
///
/// # Errors
///
/// Returns an error if:
/// - The contract or one of its references cannot be loaded
/// - The request description (method, URL, header, body file) is unusable
/// - The output cannot be serialized
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let config = ValidatorConfig::from_env();

    match cli.command {
        Commands::Bundle { spec, compact } => {
            let tree = load(&config, &spec)?;
            print_json(&tree.serialize(), compact)
        }
        Commands::Model { spec, compact } => {
            let tree = load(&config, &spec)?;
            let model = ModelBuilder::new(&tree).with_max_depth(config.model_depth).build();
            print_json(&model, compact)
        }
        Commands::Check {
            spec,
            method,
            url,
            headers,
            body,
            status,
            response_headers,
            response_body,
            mode,
            all,
            json,
        } => {
            let tree = load(&config, &spec)?;

            let method = Method::from_str(&method.to_ascii_uppercase())
                .map_err(|e| anyhow!("Invalid HTTP method {}: {}", method, e))?;
            let mut exchange = Exchange::request(method, &url)?;
            for raw in &headers {
                let (name, value) = parse_header(raw)?;
                exchange = exchange.header(name, value);
            }
            if let Some(body) = body {
                exchange = exchange.body(read_body(&body)?);
            }
            if let Some(status) = status {
                exchange = exchange.status(status);
                for raw in &response_headers {
                    let (name, value) = parse_header(raw)?;
                    exchange = exchange.response_header(name, value);
                }
                if let Some(body) = response_body {
                    exchange = exchange.response_body(read_body(&body)?);
                }
            }

            let mut options = config.options();
            if let Some(mode) = mode {
                options = options.with_mode(mode);
            }
            if all {
                options = options.with_policy(ErrorPolicy::Accumulate);
            }

            let mut report = tree.validate(&exchange, options);
            if status.is_some() && report.is_valid() {
                report.merge(tree.validate(&exchange, options.with_direction(Direction::Response)));
            }

            info!(valid = report.is_valid(), errors = report.errors().len(), "check finished");
            if json {
                let valid = report.is_valid();
                print_json(&json!({ "valid": valid, "errors": report.errors() }), false)?;
                if !valid {
                    std::process::exit(1);
                }
                return Ok(());
            }
            fail_if_issues(report);
            println!("✅ {} {} is valid", exchange_label(&exchange), tree.location());
            Ok(())
        }
    }
}

fn load(config: &ValidatorConfig, spec: &str) -> anyhow::Result<SwaggerTree> {
    let mut resolver = config.resolver();
    SwaggerTree::load_with(&mut resolver, spec).with_context(|| format!("Failed to load contract {}", spec))
}

fn print_json(value: &Value, compact: bool) -> anyhow::Result<()> {
    let text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", text);
    Ok(())
}

/// Split `Name: value`
pub(super) fn parse_header(raw: &str) -> anyhow::Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("Header {:?} is not in `Name: value` form", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Header {:?} has an empty name", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn read_body(raw: &str) -> anyhow::Result<Vec<u8>> {
    match raw.strip_prefix('@') {
        Some(path) => std::fs::read(path).with_context(|| format!("Failed to read body file {}", path)),
        None => Ok(raw.as_bytes().to_vec()),
    }
}

fn exchange_label(exchange: &Exchange) -> String {
    format!("{} {}", exchange.method(), exchange.path())
}
