//! Traversal state for validation and model generation.
//!
//! [`ValidationContext`] is an immutable cursor: every `with_*` call returns a
//! new value and leaves the caller's context untouched, so sibling branches
//! never observe each other's path or location. Everything that must outlive a
//! single branch (errors, the sandbox of consumed keys) lives in the
//! [`ValidationReport`] passed alongside it.

use crate::error::{ErrorKind, ValidationError};
use crate::schema::SchemaNode;
use crate::transport::Transport;
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Where a parameter lives in an HTTP exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Location {
    Header,
    Query,
    Path,
    FormData,
    Body,
}

impl Location {
    pub const ALL: [Location; 5] = [
        Location::Header,
        Location::Query,
        Location::Path,
        Location::FormData,
        Location::Body,
    ];

    /// The parameter `in` value naming this location
    pub fn as_str(self) -> &'static str {
        match self {
            Location::Header => "header",
            Location::Query => "query",
            Location::Path => "path",
            Location::FormData => "formData",
            Location::Body => "body",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Location::ALL.into_iter().find(|l| l.as_str() == value)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Treatment of data the contract does not describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Extra fields are ignored
    #[default]
    Pass,
    /// Extra fields are `TooManyParameters` errors
    Deny,
}

impl FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass" => Ok(ValidationMode::Pass),
            "deny" => Ok(ValidationMode::Deny),
            other => Err(format!("unknown validation mode '{}', expected pass or deny", other)),
        }
    }
}

/// Whether validation stops at the first error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    #[default]
    FailFast,
    Accumulate,
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" | "fail-fast" => Ok(ErrorPolicy::FailFast),
            "all" | "accumulate" => Ok(ErrorPolicy::Accumulate),
            other => Err(format!("unknown error policy '{}', expected first or all", other)),
        }
    }
}

/// Which half of the exchange is being validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Request,
    Response,
}

/// Caller-selected knobs for one `validate` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    pub mode: ValidationMode,
    pub policy: ErrorPolicy,
    pub direction: Direction,
}

impl ValidationOptions {
    pub fn deny() -> Self {
        Self {
            mode: ValidationMode::Deny,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}

/// Outcome of one validation run
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    policy: ErrorPolicy,
    errors: Vec<ValidationError>,
    sandbox: HashMap<Location, BTreeSet<String>>,
    body_consumed: bool,
}

impl ValidationReport {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn first_error(&self) -> Option<&ValidationError> {
        self.errors.first()
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    /// Whether the traversal should stop now
    pub fn should_stop(&self) -> bool {
        self.policy == ErrorPolicy::FailFast && !self.errors.is_empty()
    }

    pub fn record(&mut self, error: ValidationError) {
        if !self.should_stop() {
            self.errors.push(error);
        }
    }

    /// Mark `key` of `location` as consumed by the contract
    pub fn mark(&mut self, location: Location, key: impl Into<String>) {
        self.sandbox.entry(location).or_default().insert(key.into());
    }

    pub fn mark_body(&mut self) {
        self.body_consumed = true;
    }

    /// Keys consumed in `location`, empty when none were
    pub fn sandbox_keys(&self, location: Location) -> BTreeSet<String> {
        self.sandbox.get(&location).cloned().unwrap_or_default()
    }

    pub fn body_consumed(&self) -> bool {
        self.body_consumed
    }

    /// Append another report's errors, honouring this report's policy
    pub fn merge(&mut self, other: ValidationReport) {
        for error in other.errors {
            self.record(error);
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "valid");
        }
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

/// Immutable traversal cursor
///
/// `definitions` is the typed local pool that `Reference` nodes resolve into.
#[derive(Clone)]
pub struct ValidationContext<'a> {
    data_path: SmallVec<[String; 8]>,
    location: Option<Location>,
    mode: ValidationMode,
    direction: Direction,
    sandboxed: bool,
    current_definition: Option<&'a str>,
    ref_depth: usize,
    /// Definitions entered since the data path last moved
    same_value_refs: SmallVec<[&'a str; 4]>,
    definitions: &'a BTreeMap<String, SchemaNode>,
    transport: Option<&'a dyn Transport>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(definitions: &'a BTreeMap<String, SchemaNode>, options: ValidationOptions) -> Self {
        ValidationContext {
            data_path: SmallVec::new(),
            location: None,
            mode: options.mode,
            direction: options.direction,
            sandboxed: false,
            current_definition: None,
            ref_depth: 0,
            same_value_refs: SmallVec::new(),
            definitions,
            transport: None,
        }
    }

    pub fn with_transport(mut self, transport: &'a dyn Transport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// One level deeper in the data path
    pub fn with_path(&self, segment: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.data_path.push(segment.into());
        next.same_value_refs.clear();
        next
    }

    pub fn with_location(&self, location: Location) -> Self {
        let mut next = self.clone();
        next.location = Some(location);
        next
    }

    pub fn with_direction(&self, direction: Direction) -> Self {
        let mut next = self.clone();
        next.direction = direction;
        next
    }

    /// Context whose key marks no longer reach the top-level sandbox
    pub fn sandboxed(&self) -> Self {
        let mut next = self.clone();
        next.sandboxed = true;
        next
    }

    /// Context for traversing the definition `id`
    pub fn entering_definition(&self, id: &'a str) -> Self {
        let mut next = self.clone();
        next.current_definition = Some(id);
        next.ref_depth += 1;
        next.same_value_refs.push(id);
        next
    }

    /// Whether `id` was already entered for the value under the cursor
    ///
    /// Following it again would loop without consuming any data.
    pub fn is_revisiting(&self, id: &str) -> bool {
        self.same_value_refs.iter().any(|seen| *seen == id)
    }

    /// `/`-joined data path
    pub fn data_path(&self) -> String {
        self.data_path.join("/")
    }

    pub fn location(&self) -> Option<Location> {
        self.location
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_sandboxed(&self) -> bool {
        self.sandboxed
    }

    /// Definition currently being traversed, if inside one
    pub fn current_definition(&self) -> Option<&'a str> {
        self.current_definition
    }

    /// Number of references followed to reach this point
    pub fn ref_depth(&self) -> usize {
        self.ref_depth
    }

    pub fn definition(&self, id: &str) -> Option<&'a SchemaNode> {
        self.definitions.get(id)
    }

    pub fn transport(&self) -> Option<&'a dyn Transport> {
        self.transport
    }

    /// Record a validation failure at the current path and return `false`
    pub fn fail(
        &self,
        report: &mut ValidationReport,
        kind: ErrorKind,
        message: impl Into<String>,
        site: &'static str,
    ) -> bool {
        let mut error = ValidationError::new(kind, message, site).at(self.data_path());
        if let Some(location) = self.location {
            error = error.in_location(location);
        }
        debug!(
            target: "swagger_validator::validate",
            kind = %error.kind,
            path = %error.data_path,
            site = error.site,
            definition = self.current_definition.unwrap_or(""),
            "validation failed"
        );
        report.record(error);
        false
    }

    /// Mark `key` as consumed in the current location
    ///
    /// Ignored inside a sandboxed (body) sub-context.
    pub fn consume(&self, report: &mut ValidationReport, key: &str) {
        if self.sandboxed {
            return;
        }
        if let Some(location) = self.location {
            report.mark(location, key);
        }
    }

    /// Emit a success event for `site`
    pub fn log_valid(&self, site: &'static str) {
        debug!(
            target: "swagger_validator::validate",
            path = %self.data_path(),
            site,
            "valid"
        );
    }
}

impl fmt::Debug for ValidationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationContext")
            .field("data_path", &self.data_path())
            .field("location", &self.location)
            .field("mode", &self.mode)
            .field("direction", &self.direction)
            .field("sandboxed", &self.sandboxed)
            .field("current_definition", &self.current_definition)
            .finish()
    }
}
