use super::datatype::validate_value;
use crate::context::{Direction, Location, ValidationContext, ValidationReport};
use crate::error::ErrorKind;
use crate::schema::{NodeKind, SchemaNode};
use crate::transport::Transport;
use serde_json::{Number, Value};

/// Path-level parameters overridden by operation-level ones with the same `(name, in)`
pub(crate) fn merge_parameters<'a>(
    path_level: Option<&'a SchemaNode>,
    operation_level: Option<&'a SchemaNode>,
) -> Vec<&'a SchemaNode> {
    let mut merged: Vec<&'a SchemaNode> = path_level
        .map(|p| p.children().map(|(_, n)| n).collect())
        .unwrap_or_default();

    for (_, param) in operation_level.into_iter().flat_map(|p| p.children()) {
        let key = identity(param);
        match merged.iter().position(|existing| identity(existing) == key) {
            Some(i) => merged[i] = param,
            None => merged.push(param),
        }
    }
    merged
}

fn identity(param: &SchemaNode) -> (Option<&str>, Option<&str>) {
    (param.str_value("name"), param.str_value("in"))
}

/// Validate every declared parameter of a matched operation
pub(crate) fn validate_parameters<'a>(
    params: &[&'a SchemaNode],
    ctx: &ValidationContext<'a>,
    report: &mut ValidationReport,
    transport: &dyn Transport,
    captures: &[(String, String)],
) -> bool {
    let ctx = ctx.with_path("parameters");
    let mut valid = true;

    for (i, param) in params.iter().enumerate() {
        if report.should_stop() {
            return false;
        }
        let segment = param.str_value("name").map(str::to_string).unwrap_or_else(|| i.to_string());
        valid &= validate_parameter(param, &ctx.with_path(segment), report, transport, captures);
    }
    valid
}

fn validate_parameter<'a>(
    param: &'a SchemaNode,
    ctx: &ValidationContext<'a>,
    report: &mut ValidationReport,
    transport: &dyn Transport,
    captures: &[(String, String)],
) -> bool {
    if let Some(key) = param.missing_keys().first() {
        return ctx.fail(
            report,
            ErrorKind::MandatoryKeyMissing,
            format!("parameter is missing the mandatory key '{}'", key),
            "Parameter::mandatory",
        );
    }

    let name = param.str_value("name").unwrap_or_default();
    let declared_in = param.str_value("in").unwrap_or_default();
    let Some(location) = Location::parse(declared_in) else {
        return ctx.fail(
            report,
            ErrorKind::SchemaTypeMismatch,
            format!("'{}' is not a parameter location", declared_in),
            "Parameter::in",
        );
    };
    let ctx = ctx.with_location(location);

    if location == Location::Body {
        return validate_body(param, &ctx, report, transport);
    }

    let raw = lookup(transport, location, name, captures);
    if raw.is_empty() {
        if param.bool_value("required") || location == Location::Path {
            return ctx.fail(
                report,
                ErrorKind::MandatoryKeyMissing,
                format!("{} parameter '{}' is required", location, name),
                "Parameter::required",
            );
        }
        return true;
    }

    let key = if location == Location::Header {
        name.to_ascii_lowercase()
    } else {
        name.to_string()
    };
    ctx.consume(report, &key);

    let NodeKind::Parameter { item: Some(item) } = param.kind() else {
        return ctx.fail(
            report,
            ErrorKind::SchemaTypeMismatch,
            format!("parameter '{}' declares no supported type", name),
            "Parameter::type",
        );
    };

    let value = from_text(item, param.str_value("collectionFormat"), &raw);
    validate_value(item, &ctx, report, &value)
}

fn validate_body<'a>(
    param: &'a SchemaNode,
    ctx: &ValidationContext<'a>,
    report: &mut ValidationReport,
    transport: &dyn Transport,
) -> bool {
    let body = transport.body(ctx.direction());
    if body.iter().all(u8::is_ascii_whitespace) {
        if param.bool_value("required") {
            return ctx.fail(
                report,
                ErrorKind::MandatoryKeyMissing,
                "body is required",
                "Parameter::body",
            );
        }
        return true;
    }
    report.mark_body();
    validate_json_body(param.child("schema"), ctx, report, body)
}

/// Decode a JSON body and validate it in a sandboxed sub-context
pub(crate) fn validate_json_body<'a>(
    schema: Option<&'a SchemaNode>,
    ctx: &ValidationContext<'a>,
    report: &mut ValidationReport,
    body: &[u8],
) -> bool {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            return ctx.fail(
                report,
                ErrorKind::SchemaTypeMismatch,
                format!("body is not valid JSON: {}", e),
                "Parameter::body",
            )
        }
    };

    match schema {
        Some(schema) => validate_value(schema, &ctx.sandboxed(), report, &value),
        None => true,
    }
}

fn lookup(
    transport: &dyn Transport,
    location: Location,
    name: &str,
    captures: &[(String, String)],
) -> Vec<String> {
    match location {
        Location::Query => transport.query_values(name).into_iter().map(str::to_string).collect(),
        Location::Header => transport
            .request_headers()
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
            .collect(),
        Location::Path => captures
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .collect(),
        Location::FormData => transport
            .form_pairs()
            .into_iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v)
            .collect(),
        Location::Body => Vec::new(),
    }
}

/// Convert the textual value(s) of a parameter or header to JSON by declared type
///
/// Text that does not parse as the declared type is kept as a string, so the
/// type check reports it.
pub(crate) fn from_text(item: &SchemaNode, collection_format: Option<&str>, raw: &[String]) -> Value {
    match item.kind() {
        NodeKind::ArrayType => {
            let parts: Vec<&str> = match collection_format.unwrap_or("csv") {
                "multi" => raw.iter().map(String::as_str).collect(),
                format => {
                    let text = raw.first().map(String::as_str).unwrap_or_default();
                    if text.is_empty() {
                        Vec::new()
                    } else {
                        text.split(separator(format)).collect()
                    }
                }
            };
            let element = item.child("items");
            Value::Array(
                parts
                    .into_iter()
                    .map(|part| match element {
                        Some(element) => scalar(element, part),
                        None => Value::String(part.to_string()),
                    })
                    .collect(),
            )
        }
        _ => scalar(item, raw.first().map(String::as_str).unwrap_or_default()),
    }
}

fn separator(collection_format: &str) -> char {
    match collection_format {
        "ssv" => ' ',
        "tsv" => '\t',
        "pipes" => '|',
        _ => ',',
    }
}

fn scalar(item: &SchemaNode, text: &str) -> Value {
    let fallback = || Value::String(text.to_string());
    match item.kind() {
        NodeKind::IntegerType => text
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| text.parse::<u64>().map(Value::from))
            .unwrap_or_else(|_| fallback()),
        NodeKind::NumberType => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(fallback),
        NodeKind::BooleanType => match text.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => fallback(),
        },
        _ => fallback(),
    }
}

/// Validate the declared response headers that are present
pub(crate) fn validate_response_headers<'a>(
    headers: &'a SchemaNode,
    ctx: &ValidationContext<'a>,
    report: &mut ValidationReport,
    transport: &dyn Transport,
) -> bool {
    let ctx = ctx.with_path("headers").with_location(Location::Header);
    let mut valid = true;

    for (name, header) in headers.children() {
        if report.should_stop() {
            return false;
        }
        let NodeKind::Header { item } = header.kind() else {
            continue;
        };
        let raw: Vec<String> = transport
            .headers(Direction::Response)
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
            .collect();
        if raw.is_empty() {
            continue;
        }

        let ctx = ctx.with_path(name);
        ctx.consume(report, &name.to_ascii_lowercase());
        let value = from_text(item, header.str_value("collectionFormat"), &raw);
        valid &= validate_value(item, &ctx, report, &value);
    }
    valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PropertyBag, Property};
    use serde_json::json;

    fn data_type(kind: NodeKind, items: Option<SchemaNode>) -> SchemaNode {
        let mut props = PropertyBag::new();
        if let Some(items) = items {
            props.set("items", Property::Node(items));
        }
        SchemaNode::new(kind, props, false)
    }

    fn texts(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_scalar_conversion() {
        let int = data_type(NodeKind::IntegerType, None);
        assert_eq!(from_text(&int, None, &texts(&["42"])), json!(42));
        assert_eq!(from_text(&int, None, &texts(&["abc"])), json!("abc"));

        let boolean = data_type(NodeKind::BooleanType, None);
        assert_eq!(from_text(&boolean, None, &texts(&["TRUE"])), json!(true));

        let number = data_type(NodeKind::NumberType, None);
        assert_eq!(from_text(&number, None, &texts(&["1.5"])), json!(1.5));
    }

    #[test]
    fn test_collection_formats() {
        let array = data_type(NodeKind::ArrayType, Some(data_type(NodeKind::IntegerType, None)));
        assert_eq!(from_text(&array, None, &texts(&["1,2,3"])), json!([1, 2, 3]));
        assert_eq!(from_text(&array, Some("pipes"), &texts(&["1|2"])), json!([1, 2]));
        assert_eq!(from_text(&array, Some("ssv"), &texts(&["1 x"])), json!([1, "x"]));
        assert_eq!(from_text(&array, Some("multi"), &texts(&["4", "5"])), json!([4, 5]));
        assert_eq!(from_text(&array, None, &texts(&[""])), json!([]));
    }
}
