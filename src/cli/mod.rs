//! # CLI Module
//!
//! Command-line front end of the `swagger-validator` binary.
//!
//! ## Commands
//!
//! ### `bundle`
//!
//! Print a contract with every reachable `$ref` target inlined under
//! `definitions`:
//!
//! ```bash
//! swagger-validator bundle --spec contracts/petstore.yaml
//! ```
//!
//! ### `model`
//!
//! Print the example request/response model of every path and method:
//!
//! ```bash
//! swagger-validator model --spec contracts/petstore.json --compact
//! ```
//!
//! ### `check`
//!
//! Validate one request, and optionally its response, against a contract.
//! Exits with status 1 and lists every reported violation when it is invalid:
//!
//! ```bash
//! swagger-validator check --spec contracts/petstore.json \
//!     --method POST --url https://api.example.com/v1/pets \
//!     --header 'Content-Type: application/json' --body '{"name":"Rex"}' \
//!     --status 201 --mode deny --all
//! ```
//!
//! A `--body`/`--response-body` value starting with `@` is read from that file.
//! `--json` prints `{"valid": bool, "errors": [...]}` on stdout instead.
//! Defaults for `--mode` and `--all` come from
//! [`ValidatorConfig`](crate::config::ValidatorConfig).

mod commands;


pub use commands::{fail_if_issues, print_issues, run_cli, Cli, Commands};
