//! # Validation Engine
//!
//! Walks a built [`SwaggerTree`] against one HTTP exchange supplied through the
//! [`Transport`] trait.
//!
//! ## Flow
//!
//! 1. Root checks: `swagger` version, `schemes`, `host`, `basePath`
//! 2. Route matching: literal path templates first, then templated ones
//! 3. `Content-Type` against `consumes` (requests) or `produces` (responses)
//! 4. Parameters (request) or status, headers and body (response)
//! 5. DENY mode only: every present key the walk did not consume is reported
//!    as `TooManyParameters`
//!
//! Data types check, in order and stopping at the first failure: mandatory
//! keys, declared type, runtime type, `pattern`, `format`, `enum`, then the
//! range keywords.
//!
//! Validation never returns `Err`. Failures land in the [`ValidationReport`],
//! and [`ErrorPolicy`](crate::context::ErrorPolicy) decides whether the walk
//! stops at the first one or collects them all.

mod datatype;
mod parameter;
mod swagger;

pub use datatype::validate_value;
pub(crate) use parameter::merge_parameters;

use crate::context::{ValidationContext, ValidationOptions, ValidationReport};
use crate::error::{ErrorKind, Result, ValidationError};
use crate::schema::SwaggerTree;
use crate::transport::Transport;
use serde_json::Value;
use tracing::{debug, info};

/// Validate one exchange against `tree`
pub fn validate(tree: &SwaggerTree, transport: &dyn Transport, options: ValidationOptions) -> ValidationReport {
    let mut report = ValidationReport::new(options.policy);
    let ctx = ValidationContext::new(tree.definitions(), options).with_transport(transport);

    let valid = swagger::validate_root(tree.root(), &ctx, &mut report, transport);

    if valid {
        debug!(
            target: "swagger_validator::validate",
            method = %transport.method(),
            path = transport.path(),
            direction = ?options.direction,
            "exchange is valid"
        );
    } else {
        info!(
            target: "swagger_validator::validate",
            method = %transport.method(),
            path = transport.path(),
            direction = ?options.direction,
            errors = report.errors().len(),
            first = %report.first_error().map(ToString::to_string).unwrap_or_default(),
            "exchange is invalid"
        );
    }
    report
}

/// Validate a bare JSON value against the typed definition `id`
///
/// # Errors
///
/// `ReferenceNotFound` when the tree has no typed definition named `id`.
pub fn validate_definition(
    tree: &SwaggerTree,
    id: &str,
    value: &Value,
    options: ValidationOptions,
) -> Result<ValidationReport> {
    let node = tree.definition(id).ok_or_else(|| {
        ValidationError::new(
            ErrorKind::ReferenceNotFound,
            format!("no definition named {}", id),
            "validate_definition",
        )
    })?;

    let mut report = ValidationReport::new(options.policy);
    let ctx = ValidationContext::new(tree.definitions(), options)
        .with_path("definitions")
        .with_path(id)
        .sandboxed();
    validate_value(node, &ctx, &mut report, value);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Direction, ErrorPolicy, Location, ValidationMode};
    use crate::transport::Exchange;
    use http::Method;
    use serde_json::json;

    fn contract() -> SwaggerTree {
        SwaggerTree::from_value(
            "/srv/pets.json",
            json!({
                "swagger": "2.0",
                "info": { "title": "Pets", "version": "1.0.0" },
                "host": "api.example.com",
                "basePath": "/v1",
                "schemes": ["https"],
                "consumes": ["application/json"],
                "produces": ["application/json"],
                "paths": {
                    "/pets": {
                        "get": {
                            "parameters": [
                                { "name": "limit", "in": "query", "type": "integer", "maximum": 100 },
                                { "name": "X-Trace", "in": "header", "type": "string" }
                            ],
                            "responses": {
                                "200": {
                                    "description": "ok",
                                    "headers": { "X-Total": { "type": "integer" } },
                                    "schema": { "type": "array", "items": { "$ref": "#/definitions/Pet" } }
                                },
                                "default": { "description": "error", "schema": { "$ref": "#/definitions/Error" } }
                            }
                        },
                        "post": {
                            "parameters": [
                                { "name": "pet", "in": "body", "required": true, "schema": { "$ref": "#/definitions/Pet" } }
                            ],
                            "responses": { "201": { "description": "created" } }
                        }
                    },
                    "/pets/mine": {
                        "get": { "responses": { "200": { "description": "ok" } } }
                    },
                    "/pets/{petId}": {
                        "parameters": [ { "name": "petId", "in": "path", "required": true, "type": "integer" } ],
                        "get": { "responses": { "200": { "description": "ok" } } }
                    }
                },
                "definitions": {
                    "Pet": {
                        "type": "object",
                        "required": ["name"],
                        "properties": { "name": { "type": "string" }, "tag": { "type": "string" } }
                    },
                    "Error": {
                        "type": "object",
                        "properties": { "code": { "type": "integer" } }
                    }
                }
            }),
        )
        .unwrap()
    }

    fn kinds(report: &ValidationReport) -> Vec<ErrorKind> {
        report.errors().iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_valid_request() {
        let tree = contract();
        let ex = Exchange::request(Method::GET, "https://api.example.com/v1/pets?limit=10").unwrap();
        let report = validate(&tree, &ex, ValidationOptions::default());
        assert!(report.is_valid(), "{}", report);
    }

    #[test]
    fn test_base_path_must_match_at_segment_boundary() {
        let tree = contract();
        let ex = Exchange::request(Method::GET, "https://api.example.com/v1pets").unwrap();
        let report = validate(&tree, &ex, ValidationOptions::default());
        assert_eq!(kinds(&report), vec![ErrorKind::BasePathMismatch]);
    }

    #[test]
    fn test_literal_route_wins_over_template() {
        let tree = contract();
        let ex = Exchange::request(Method::GET, "/v1/pets/mine").unwrap();
        let report = validate(&tree, &ex, ValidationOptions::default());
        assert!(report.is_valid(), "{}", report);

        let ex = Exchange::request(Method::GET, "/v1/pets/7").unwrap();
        assert!(validate(&tree, &ex, ValidationOptions::default()).is_valid());
    }

    #[test]
    fn test_unknown_route_and_method() {
        let tree = contract();
        let ex = Exchange::request(Method::GET, "/v1/owners").unwrap();
        assert_eq!(
            kinds(&validate(&tree, &ex, ValidationOptions::default())),
            vec![ErrorKind::RouteNotFound]
        );

        let ex = Exchange::request(Method::DELETE, "/v1/pets").unwrap();
        assert_eq!(
            kinds(&validate(&tree, &ex, ValidationOptions::default())),
            vec![ErrorKind::RouteNotFound]
        );
    }

    #[test]
    fn test_query_constraint_violation_carries_location() {
        let tree = contract();
        let ex = Exchange::request(Method::GET, "/v1/pets?limit=500").unwrap();
        let report = validate(&tree, &ex, ValidationOptions::default());
        let error = report.first_error().unwrap();
        assert_eq!(error.kind, ErrorKind::ConstraintViolation);
        assert_eq!(error.location, Some(Location::Query));
        assert_eq!(error.data_path, "paths//pets/get/parameters/limit");
    }

    #[test]
    fn test_body_required_and_content_type() {
        let tree = contract();
        let ex = Exchange::request(Method::POST, "/v1/pets").unwrap();
        assert_eq!(
            kinds(&validate(&tree, &ex, ValidationOptions::default())),
            vec![ErrorKind::MandatoryKeyMissing]
        );

        let ex = Exchange::request(Method::POST, "/v1/pets")
            .unwrap()
            .header("Content-Type", "text/plain")
            .body("name=Rex");
        assert_eq!(
            kinds(&validate(&tree, &ex, ValidationOptions::default())),
            vec![ErrorKind::ContentTypeNotAllowed]
        );

        let ex = Exchange::request(Method::POST, "/v1/pets")
            .unwrap()
            .json_body(&json!({ "name": "Rex" }));
        assert!(validate(&tree, &ex, ValidationOptions::default()).is_valid());
    }

    #[test]
    fn test_deny_mode_reports_extras_in_body_and_headers() {
        let tree = contract();
        let ex = Exchange::request(Method::POST, "/v1/pets")
            .unwrap()
            .header("X-Unknown", "1")
            .json_body(&json!({ "name": "Rex", "color": "brown" }));

        let options = ValidationOptions::deny().with_policy(ErrorPolicy::Accumulate);
        let report = validate(&tree, &ex, options);
        assert_eq!(
            kinds(&report),
            vec![ErrorKind::TooManyParameters, ErrorKind::TooManyParameters]
        );

        let report = validate(&tree, &ex, ValidationOptions::default());
        assert!(report.is_valid(), "{}", report);
    }

    #[test]
    fn test_declared_header_is_consumed_in_deny_mode() {
        let tree = contract();
        let ex = Exchange::request(Method::GET, "/v1/pets")
            .unwrap()
            .header("x-trace", "abc")
            .header("Accept", "application/json");
        let report = validate(&tree, &ex, ValidationOptions::deny());
        assert!(report.is_valid(), "{}", report);
    }

    #[test]
    fn test_response_validation() {
        let tree = contract();
        let response = |status: u16, body: &str| {
            Exchange::request(Method::GET, "/v1/pets")
                .unwrap()
                .status(status)
                .response_header("Content-Type", "application/json")
                .response_header("X-Total", "1")
                .response_body(body.to_string())
        };
        let options = ValidationOptions::default().with_direction(Direction::Response);

        assert!(validate(&tree, &response(200, r#"[{"name":"Rex"}]"#), options).is_valid());
        assert_eq!(
            kinds(&validate(&tree, &response(200, r#"[{"tag":"x"}]"#), options)),
            vec![ErrorKind::MandatoryKeyMissing]
        );
        assert!(validate(&tree, &response(500, r#"{"code":500}"#), options).is_valid());
        assert_eq!(
            kinds(&validate(&tree, &response(500, r#"{"code":"boom"}"#), options)),
            vec![ErrorKind::SchemaTypeMismatch]
        );
    }

    #[test]
    fn test_response_without_status() {
        let tree = contract();
        let ex = Exchange::request(Method::GET, "/v1/pets").unwrap();
        let options = ValidationOptions::default().with_direction(Direction::Response);
        assert_eq!(kinds(&validate(&tree, &ex, options)), vec![ErrorKind::MandatoryKeyMissing]);
    }

    #[test]
    fn test_validate_definition() {
        let tree = contract();
        let options = ValidationOptions::default().with_mode(ValidationMode::Deny);
        let report = validate_definition(&tree, "Pet", &json!({ "name": "Rex" }), options).unwrap();
        assert!(report.is_valid());

        let report = validate_definition(&tree, "Pet", &json!({ "name": "Rex", "x": 1 }), options).unwrap();
        assert_eq!(kinds(&report), vec![ErrorKind::TooManyParameters]);

        let err = validate_definition(&tree, "Owner", &json!({}), options).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReferenceNotFound);
    }
}
