use crate::context::{ValidationContext, ValidationMode, ValidationReport};
use crate::error::ErrorKind;
use crate::schema::format::{check_numeric_format, check_string_format, FormatCheck};
use crate::schema::{NodeKind, SchemaNode};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Bound on `allOf`/reference hops when collecting declared property names
const MAX_COMPOSITION_DEPTH: usize = 16;

/// Validate `value` against a schema node
///
/// Data type checks run in a fixed order and stop at the first failing step:
/// mandatory keys, declared type, runtime type, `pattern`, `format`, `enum`,
/// then range/length keywords. Arrays and objects then descend into their
/// children.
pub fn validate_value<'a>(
    node: &'a SchemaNode,
    ctx: &ValidationContext<'a>,
    report: &mut ValidationReport,
    value: &Value,
) -> bool {
    validate_node(node, ctx, report, value, true)
}

fn validate_node<'a>(
    node: &'a SchemaNode,
    ctx: &ValidationContext<'a>,
    report: &mut ValidationReport,
    value: &Value,
    check_extras: bool,
) -> bool {
    match node.kind() {
        NodeKind::Reference { id } if ctx.is_revisiting(id) => ctx.fail(
            report,
            ErrorKind::MalformedReference,
            format!("definition '{}' refers back to itself without constraining the value", id),
            "Reference::cycle",
        ),
        NodeKind::Reference { id } => match ctx.definition(id) {
            Some(target) => validate_node(target, &ctx.entering_definition(id), report, value, check_extras),
            // definitions with no typed view are opaque
            None => true,
        },
        kind if kind.is_data_type() => validate_data_type(node, ctx, report, value, check_extras),
        _ => true,
    }
}

fn validate_data_type<'a>(
    node: &'a SchemaNode,
    ctx: &ValidationContext<'a>,
    report: &mut ValidationReport,
    value: &Value,
    check_extras: bool,
) -> bool {
    let kind = node.kind();
    let type_name = kind.type_name().unwrap_or("object");

    if let Some(key) = node.missing_keys().first() {
        return ctx.fail(
            report,
            ErrorKind::MandatoryKeyMissing,
            format!("schema is missing the mandatory key '{}'", key),
            "DataType::mandatory",
        );
    }

    if let Some(declared) = node.str_value("type") {
        if declared != type_name {
            return ctx.fail(
                report,
                ErrorKind::SchemaTypeMismatch,
                format!("declared type '{}' does not match {}", declared, kind.name()),
                "DataType::declared",
            );
        }
    }

    if !runtime_type_matches(kind, value) {
        return ctx.fail(
            report,
            ErrorKind::SchemaTypeMismatch,
            format!("{} is not a valid {}", describe(value), type_name),
            "DataType::type",
        );
    }

    if let (NodeKind::StringType { pattern: Some(pattern) }, Value::String(s)) = (kind, value) {
        if !pattern.is_match(s) {
            return ctx.fail(
                report,
                ErrorKind::PatternMismatch,
                format!("'{}' does not match pattern {}", s, pattern.as_str()),
                "StringType::pattern",
            );
        }
    }

    if let Some(format) = node.str_value("format") {
        if !check_format(kind, format, value, ctx, report) {
            return false;
        }
    }

    if let Some(Value::Array(allowed)) = node.json("enum") {
        if !allowed.iter().any(|candidate| json_equal(candidate, value)) {
            return ctx.fail(
                report,
                ErrorKind::EnumMismatch,
                format!("{} is not one of {}", describe(value), Value::Array(allowed.clone())),
                "DataType::enum",
            );
        }
    }

    if let Some(message) = constraint_violation(node, value) {
        return ctx.fail(report, ErrorKind::ConstraintViolation, message, "DataType::constraint");
    }

    let valid = match (kind, value) {
        (NodeKind::ArrayType, Value::Array(items)) => validate_items(node, ctx, report, items),
        (NodeKind::ObjectType, Value::Object(map)) => validate_object(node, ctx, report, map, check_extras),
        _ => true,
    };

    if valid {
        ctx.log_valid(kind.name());
    }
    valid
}

fn runtime_type_matches(kind: &NodeKind, value: &Value) -> bool {
    match kind {
        NodeKind::StringType { .. } => value.is_string(),
        NodeKind::NumberType => value.is_number(),
        NodeKind::IntegerType => is_integer(value),
        NodeKind::BooleanType => value.is_boolean(),
        NodeKind::ArrayType => value.is_array(),
        NodeKind::ObjectType => value.is_object(),
        NodeKind::FileType => !value.is_null(),
        _ => false,
    }
}

fn is_integer(value: &Value) -> bool {
    value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0)
}

fn check_format(
    kind: &NodeKind,
    format: &str,
    value: &Value,
    ctx: &ValidationContext<'_>,
    report: &mut ValidationReport,
) -> bool {
    let outcome = match (kind, value) {
        (NodeKind::StringType { .. }, Value::String(s)) => check_string_format(format, s),
        (NodeKind::IntegerType | NodeKind::NumberType, _) => check_numeric_format(format, value),
        _ => FormatCheck::Valid,
    };

    match outcome {
        FormatCheck::Valid => true,
        FormatCheck::Mismatch => ctx.fail(
            report,
            ErrorKind::UnsupportedFormat,
            format!("{} does not match format '{}'", describe(value), format),
            "DataType::format",
        ),
        FormatCheck::Unknown => ctx.fail(
            report,
            ErrorKind::UnsupportedFormat,
            format!("format '{}' does not match any registered format", format),
            "DataType::format",
        ),
    }
}

fn constraint_violation(node: &SchemaNode, value: &Value) -> Option<String> {
    match value {
        Value::Number(_) => {
            let n = value.as_f64()?;
            if let Some(min) = node.f64_value("minimum") {
                let exclusive = node.bool_value("exclusiveMinimum");
                if n < min || (exclusive && n == min) {
                    return Some(format!(
                        "{} is below the {}minimum {}",
                        n,
                        if exclusive { "exclusive " } else { "" },
                        min
                    ));
                }
            }
            if let Some(max) = node.f64_value("maximum") {
                let exclusive = node.bool_value("exclusiveMaximum");
                if n > max || (exclusive && n == max) {
                    return Some(format!(
                        "{} is above the {}maximum {}",
                        n,
                        if exclusive { "exclusive " } else { "" },
                        max
                    ));
                }
            }
            if let Some(step) = node.f64_value("multipleOf").filter(|s| *s > 0.0) {
                let ratio = n / step;
                if (ratio - ratio.round()).abs() > 1e-9 {
                    return Some(format!("{} is not a multiple of {}", n, step));
                }
            }
            None
        }
        Value::String(s) => {
            let len = s.chars().count() as u64;
            if let Some(min) = node.u64_value("minLength").filter(|m| len < *m) {
                return Some(format!("length {} is shorter than minLength {}", len, min));
            }
            if let Some(max) = node.u64_value("maxLength").filter(|m| len > *m) {
                return Some(format!("length {} is longer than maxLength {}", len, max));
            }
            None
        }
        Value::Array(items) => {
            let len = items.len() as u64;
            if let Some(min) = node.u64_value("minItems").filter(|m| len < *m) {
                return Some(format!("{} items is fewer than minItems {}", len, min));
            }
            if let Some(max) = node.u64_value("maxItems").filter(|m| len > *m) {
                return Some(format!("{} items is more than maxItems {}", len, max));
            }
            if node.bool_value("uniqueItems") {
                for (i, item) in items.iter().enumerate() {
                    if items[..i].iter().any(|earlier| json_equal(earlier, item)) {
                        return Some(format!("item {} is a duplicate", i));
                    }
                }
            }
            None
        }
        Value::Object(map) => {
            let len = map.len() as u64;
            if let Some(min) = node.u64_value("minProperties").filter(|m| len < *m) {
                return Some(format!("{} properties is fewer than minProperties {}", len, min));
            }
            if let Some(max) = node.u64_value("maxProperties").filter(|m| len > *m) {
                return Some(format!("{} properties is more than maxProperties {}", len, max));
            }
            None
        }
        _ => None,
    }
}

fn validate_items<'a>(
    node: &'a SchemaNode,
    ctx: &ValidationContext<'a>,
    report: &mut ValidationReport,
    items: &[Value],
) -> bool {
    let Some(schema) = node.child("items") else {
        return true;
    };

    let mut valid = true;
    for (i, item) in items.iter().enumerate() {
        if report.should_stop() {
            return false;
        }
        valid &= validate_node(schema, &ctx.with_path(i.to_string()), report, item, true);
    }
    valid
}

fn validate_object<'a>(
    node: &'a SchemaNode,
    ctx: &ValidationContext<'a>,
    report: &mut ValidationReport,
    map: &Map<String, Value>,
    check_extras: bool,
) -> bool {
    let mut valid = true;

    if let Some(Value::Array(required)) = node.json("required") {
        for key in required.iter().filter_map(Value::as_str) {
            if !map.contains_key(key) {
                valid = ctx.with_path(key).fail(
                    report,
                    ErrorKind::MandatoryKeyMissing,
                    format!("{} is required", key),
                    "ObjectType::required",
                );
                if report.should_stop() {
                    return false;
                }
            }
        }
    }

    let properties = node.child("properties");
    if let Some(properties) = properties {
        for (name, schema) in properties.children() {
            if report.should_stop() {
                return false;
            }
            if let Some(field) = map.get(name) {
                valid &= validate_node(schema, &ctx.with_path(name), report, field, true);
            }
        }
    }

    if let Some(all_of) = node.child("allOf") {
        for (_, member) in all_of.children() {
            if report.should_stop() {
                return false;
            }
            valid &= validate_node(member, ctx, report, &Value::Object(map.clone()), false);
        }
    }

    if !check_extras {
        return valid;
    }

    let declared = declared_properties(node, ctx, 0);
    let extras = map.iter().filter(|(k, _)| !declared.contains(k.as_str()));

    if let Some(schema) = node.child("additionalProperties") {
        for (key, field) in extras {
            if report.should_stop() {
                return false;
            }
            valid &= validate_node(schema, &ctx.with_path(key.as_str()), report, field, true);
        }
        return valid;
    }

    let forbid = match node.json("additionalProperties") {
        Some(Value::Bool(allowed)) => !allowed,
        Some(_) => false,
        None => ctx.mode() == ValidationMode::Deny && (properties.is_some() || node.has("allOf")),
    };
    if forbid {
        for (key, _) in extras {
            valid = ctx.with_path(key.as_str()).fail(
                report,
                ErrorKind::TooManyParameters,
                format!("{} is given and not expected", key),
                "ObjectType::additionalProperties",
            );
            if report.should_stop() {
                return false;
            }
        }
    }
    valid
}

/// Property names declared by `node` and, through `allOf`, by its members
fn declared_properties<'a>(node: &'a SchemaNode, ctx: &ValidationContext<'a>, depth: usize) -> BTreeSet<&'a str> {
    let mut names = BTreeSet::new();
    if depth > MAX_COMPOSITION_DEPTH {
        return names;
    }

    let node = match node.kind() {
        NodeKind::Reference { id } => match ctx.definition(id) {
            Some(target) => target,
            None => return names,
        },
        _ => node,
    };

    if let Some(properties) = node.child("properties") {
        names.extend(properties.children().map(|(name, _)| name));
    }
    if let Some(all_of) = node.child("allOf") {
        for (_, member) in all_of.children() {
            names.extend(declared_properties(member, ctx, depth + 1));
        }
    }
    names
}

/// Equality that treats `1` and `1.0` as the same number
fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ErrorPolicy, ValidationOptions};
    use crate::schema::SwaggerTree;
    use serde_json::json;

    fn tree(definitions: Value) -> SwaggerTree {
        SwaggerTree::from_value(
            "/srv/datatype.json",
            json!({
                "swagger": "2.0",
                "info": { "title": "t", "version": "1" },
                "paths": {},
                "definitions": definitions
            }),
        )
        .unwrap()
    }

    fn check(tree: &SwaggerTree, id: &str, value: Value, options: ValidationOptions) -> ValidationReport {
        let ctx = ValidationContext::new(tree.definitions(), options);
        let mut report = ValidationReport::new(options.policy);
        let node = tree.definition(id).unwrap();
        validate_value(node, &ctx, &mut report, &value);
        report
    }

    fn first_kind(report: &ValidationReport) -> Option<ErrorKind> {
        report.first_error().map(|e| e.kind)
    }

    #[test]
    fn test_string_pattern_and_type_order() {
        let t = tree(json!({ "Name": { "type": "string", "pattern": "^[a-z]+$" } }));
        let opts = ValidationOptions::default();

        assert!(check(&t, "Name", json!("abc"), opts).is_valid());
        assert_eq!(first_kind(&check(&t, "Name", json!("ABC"), opts)), Some(ErrorKind::PatternMismatch));
        assert_eq!(first_kind(&check(&t, "Name", json!(123), opts)), Some(ErrorKind::SchemaTypeMismatch));
    }

    #[test]
    fn test_date_format() {
        let t = tree(json!({ "Day": { "type": "string", "format": "date" } }));
        let opts = ValidationOptions::default();

        assert!(check(&t, "Day", json!("2024-01-15"), opts).is_valid());
        assert_eq!(first_kind(&check(&t, "Day", json!("15-01-2024"), opts)), Some(ErrorKind::UnsupportedFormat));
    }

    #[test]
    fn test_enum_and_ranges() {
        let t = tree(json!({
            "Color": { "type": "string", "enum": ["red", "green"] },
            "Age": { "type": "integer", "minimum": 0, "maximum": 130, "exclusiveMaximum": true },
            "Tags": { "type": "array", "items": { "type": "string" }, "maxItems": 2, "uniqueItems": true }
        }));
        let opts = ValidationOptions::default();

        assert!(check(&t, "Color", json!("red"), opts).is_valid());
        assert_eq!(first_kind(&check(&t, "Color", json!("blue"), opts)), Some(ErrorKind::EnumMismatch));
        assert!(check(&t, "Age", json!(42), opts).is_valid());
        assert_eq!(first_kind(&check(&t, "Age", json!(130), opts)), Some(ErrorKind::ConstraintViolation));
        assert_eq!(first_kind(&check(&t, "Age", json!(4.5), opts)), Some(ErrorKind::SchemaTypeMismatch));
        assert_eq!(first_kind(&check(&t, "Tags", json!(["a", "a"]), opts)), Some(ErrorKind::ConstraintViolation));
        assert_eq!(first_kind(&check(&t, "Tags", json!(["a", 1]), opts)), Some(ErrorKind::SchemaTypeMismatch));
        assert_eq!(
            check(&t, "Tags", json!(["a", 1]), opts).first_error().unwrap().data_path,
            "1"
        );
    }

    #[test]
    fn test_object_required_refs_and_deny_mode() {
        let t = tree(json!({
            "Pet": {
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": { "type": "string" },
                    "owner": { "$ref": "#/definitions/Owner" }
                }
            },
            "Owner": { "type": "object", "properties": { "id": { "type": "integer" } } }
        }));
        let pass = ValidationOptions::default();
        let deny = ValidationOptions::deny();

        assert!(check(&t, "Pet", json!({ "name": "Rex", "owner": { "id": 1 } }), pass).is_valid());
        assert_eq!(first_kind(&check(&t, "Pet", json!({ "owner": { "id": 1 } }), pass)), Some(ErrorKind::MandatoryKeyMissing));

        let nested = check(&t, "Pet", json!({ "name": "Rex", "owner": { "id": "x" } }), pass);
        assert_eq!(first_kind(&nested), Some(ErrorKind::SchemaTypeMismatch));
        assert_eq!(nested.first_error().unwrap().data_path, "owner/id");

        assert!(check(&t, "Pet", json!({ "name": "Rex", "color": "brown" }), pass).is_valid());
        assert_eq!(
            first_kind(&check(&t, "Pet", json!({ "name": "Rex", "color": "brown" }), deny)),
            Some(ErrorKind::TooManyParameters)
        );
    }

    #[test]
    fn test_all_of_merges_declared_properties() {
        let t = tree(json!({
            "Base": { "type": "object", "properties": { "id": { "type": "integer" } } },
            "Dog": {
                "allOf": [
                    { "$ref": "#/definitions/Base" },
                    { "type": "object", "properties": { "bark": { "type": "boolean" } } }
                ]
            }
        }));
        let deny = ValidationOptions::deny();

        assert!(check(&t, "Dog", json!({ "id": 1, "bark": true }), deny).is_valid());
        assert_eq!(
            first_kind(&check(&t, "Dog", json!({ "id": 1, "bark": true, "meow": 1 }), deny)),
            Some(ErrorKind::TooManyParameters)
        );
        assert_eq!(first_kind(&check(&t, "Dog", json!({ "id": "1" }), deny)), Some(ErrorKind::SchemaTypeMismatch));
    }

    #[test]
    fn test_accumulate_collects_every_violation() {
        let t = tree(json!({
            "Pair": {
                "type": "object",
                "required": ["a", "b"],
                "properties": { "c": { "type": "string" } }
            }
        }));
        let all = ValidationOptions::default().with_policy(ErrorPolicy::Accumulate);
        let report = check(&t, "Pair", json!({ "c": 1 }), all);
        assert_eq!(report.errors().len(), 3);
    }

    #[test]
    fn test_reference_cycles_fail_instead_of_looping() {
        let t = tree(json!({
            "A": { "$ref": "#/definitions/B" },
            "B": { "$ref": "#/definitions/A" },
            "Node": { "allOf": [ { "$ref": "#/definitions/Node" } ] }
        }));
        let opts = ValidationOptions::default();

        assert_eq!(first_kind(&check(&t, "A", json!({ "x": 1 }), opts)), Some(ErrorKind::MalformedReference));
        assert_eq!(first_kind(&check(&t, "Node", json!({}), opts)), Some(ErrorKind::MalformedReference));
    }

    #[test]
    fn test_recursive_schema_follows_the_data() {
        let t = tree(json!({
            "Node": {
                "type": "object",
                "properties": {
                    "value": { "type": "integer" },
                    "next": { "$ref": "#/definitions/Node" }
                }
            }
        }));
        let opts = ValidationOptions::default();

        assert!(check(&t, "Node", json!({ "value": 1, "next": { "value": 2, "next": { "value": 3 } } }), opts).is_valid());
        let report = check(&t, "Node", json!({ "next": { "next": { "value": "x" } } }), opts);
        assert_eq!(first_kind(&report), Some(ErrorKind::SchemaTypeMismatch));
        assert_eq!(report.first_error().unwrap().data_path, "next/next/value");
    }
}
