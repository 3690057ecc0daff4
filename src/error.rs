//! Error values shared by document loading and request/response validation.
//!
//! Loading failures (`UnreadableSource`, `UndecodableSource`, `ReferenceNotFound`,
//! `MalformedReference`) are returned as `Err` and abort the load. Every other
//! kind is recorded in a [`ValidationReport`](crate::context::ValidationReport)
//! while the traversal carries on or stops, depending on the error policy.

use crate::context::Location;
use serde::Serialize;
use std::fmt;

/// Result type for document loading and tree building
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Classification of a loading or validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// The source is empty or could not be read
    UnreadableSource,
    /// The source bytes are not a valid JSON/YAML document
    UndecodableSource,
    /// A pointer segment does not exist in the target document
    ReferenceNotFound,
    /// A `$ref` node carries extra keys or a non-string target
    MalformedReference,
    /// A remote metadata probe failed
    TransportError,
    /// Declared or runtime type does not match, or the JSON shape is wrong
    SchemaTypeMismatch,
    /// The document does not declare `swagger: "2.0"`
    SwaggerVersionMismatch,
    /// The request scheme is not listed in `schemes`
    SchemeNotAllowed,
    /// The request host differs from `host`
    HostNotAllowed,
    /// The request path does not start with `basePath`
    BasePathMismatch,
    /// `Content-Type` is not listed in `consumes`/`produces`
    ContentTypeNotAllowed,
    /// The value does not match its declared `format`, or the format is unknown
    UnsupportedFormat,
    /// The value does not match `pattern`
    PatternMismatch,
    /// The value is not one of `enum`
    EnumMismatch,
    /// A required key, parameter or property is absent
    MandatoryKeyMissing,
    /// Strict mode found data the contract does not describe
    TooManyParameters,
    /// No path template or method of the contract matches the request
    RouteNotFound,
    /// A range, length, item-count or uniqueness keyword is violated
    ConstraintViolation,
}

impl ErrorKind {
    /// Whether this kind aborts a document load instead of being reported
    pub fn is_load_failure(self) -> bool {
        matches!(
            self,
            ErrorKind::UnreadableSource
                | ErrorKind::UndecodableSource
                | ErrorKind::ReferenceNotFound
                | ErrorKind::MalformedReference
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UnreadableSource => "UnreadableSource",
            ErrorKind::UndecodableSource => "UndecodableSource",
            ErrorKind::ReferenceNotFound => "ReferenceNotFound",
            ErrorKind::MalformedReference => "MalformedReference",
            ErrorKind::TransportError => "TransportError",
            ErrorKind::SchemaTypeMismatch => "SchemaTypeMismatch",
            ErrorKind::SwaggerVersionMismatch => "SwaggerVersionMismatch",
            ErrorKind::SchemeNotAllowed => "SchemeNotAllowed",
            ErrorKind::HostNotAllowed => "HostNotAllowed",
            ErrorKind::BasePathMismatch => "BasePathMismatch",
            ErrorKind::ContentTypeNotAllowed => "ContentTypeNotAllowed",
            ErrorKind::UnsupportedFormat => "UnsupportedFormat",
            ErrorKind::PatternMismatch => "PatternMismatch",
            ErrorKind::EnumMismatch => "EnumMismatch",
            ErrorKind::MandatoryKeyMissing => "MandatoryKeyMissing",
            ErrorKind::TooManyParameters => "TooManyParameters",
            ErrorKind::RouteNotFound => "RouteNotFound",
            ErrorKind::ConstraintViolation => "ConstraintViolation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single loading or validation failure
///
/// Immutable once built. `site` names the node type and check that raised it
/// (e.g. `StringType::pattern`), `data_path` is the `/`-joined cursor of the
/// traversal at the time of failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub kind: ErrorKind,
    pub message: String,
    pub site: &'static str,
    pub data_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl ValidationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, site: &'static str) -> Self {
        ValidationError {
            kind,
            message: message.into(),
            site,
            data_path: String::new(),
            location: None,
        }
    }

    /// Attach the data-path the failure was raised at
    pub fn at(mut self, data_path: impl Into<String>) -> Self {
        self.data_path = data_path.into();
        self
    }

    pub fn in_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn unreadable(message: impl Into<String>, site: &'static str) -> Self {
        Self::new(ErrorKind::UnreadableSource, message, site)
    }

    pub fn undecodable(message: impl Into<String>, site: &'static str) -> Self {
        Self::new(ErrorKind::UndecodableSource, message, site)
    }

    pub fn not_found(message: impl Into<String>, site: &'static str) -> Self {
        Self::new(ErrorKind::ReferenceNotFound, message, site)
    }

    pub fn malformed(message: impl Into<String>, site: &'static str) -> Self {
        Self::new(ErrorKind::MalformedReference, message, site)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.kind)?;
        if !self.data_path.is_empty() {
            write!(f, "{}: ", self.data_path)?;
        }
        write!(f, "{} ({})", self.message, self.site)
    }
}

impl std::error::Error for ValidationError {}
