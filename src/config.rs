//! # Validator Configuration
//!
//! Environment variable based defaults for the validator and its CLI.
//!
//! ## Environment Variables
//!
//! ### `SWAGGER_VALIDATOR_MODE`
//!
//! `pass` (extra keys ignored) or `deny` (extra keys fail with
//! `TooManyParameters`). Default: `pass`
//!
//! ### `SWAGGER_VALIDATOR_ERRORS`
//!
//! `first` stops at the first violation, `all` collects every one.
//! Default: `first`
//!
//! ### `SWAGGER_VALIDATOR_HTTP_TIMEOUT_MS`
//!
//! Timeout for fetching remote contract documents. Default: `5000`
//!
//! ### `SWAGGER_VALIDATOR_MODEL_DEPTH`
//!
//! How many `$ref` hops one generated example may follow. Default: `8`
//!
//! Unparsable values fall back to the default.
//!
//! ## Usage
//!
//! ```rust
//! use swagger_validator::config::ValidatorConfig;
//! use swagger_validator::context::ValidationOptions;
//!
//! let config = ValidatorConfig::from_env();
//! let options: ValidationOptions = config.into();
//! println!("mode: {:?}", options.mode);
//! ```

use crate::context::{ErrorPolicy, ValidationMode, ValidationOptions};
use crate::document::{DefaultFetcher, DocumentStore};
use crate::model::DEFAULT_MODEL_DEPTH;
use crate::reference::Resolver;
use std::env;
use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;

/// Validator settings loaded from environment variables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorConfig {
    pub mode: ValidationMode,
    pub policy: ErrorPolicy,
    /// Timeout for remote document fetches (default: 5 s)
    pub http_timeout: Duration,
    /// `$ref` hop cap for model generation (default: 8)
    pub model_depth: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            mode: ValidationMode::default(),
            policy: ErrorPolicy::default(),
            http_timeout: Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS),
            model_depth: DEFAULT_MODEL_DEPTH,
        }
    }
}

impl ValidatorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let mode = lookup("SWAGGER_VALIDATOR_MODE")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.mode);
        let policy = lookup("SWAGGER_VALIDATOR_ERRORS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.policy);
        let http_timeout = lookup("SWAGGER_VALIDATOR_HTTP_TIMEOUT_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.http_timeout);
        let model_depth = lookup("SWAGGER_VALIDATOR_MODEL_DEPTH")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.model_depth);

        ValidatorConfig {
            mode,
            policy,
            http_timeout,
            model_depth,
        }
    }

    /// A fresh resolver whose remote fetches honour `http_timeout`
    pub fn resolver(&self) -> Resolver {
        Resolver::with_store(DocumentStore::with_fetcher(DefaultFetcher::new(self.http_timeout)))
    }

    pub fn options(&self) -> ValidationOptions {
        ValidationOptions::default()
            .with_mode(self.mode)
            .with_policy(self.policy)
    }
}

impl From<ValidatorConfig> for ValidationOptions {
    fn from(config: ValidatorConfig) -> Self {
        config.options()
    }
}
