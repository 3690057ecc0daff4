use super::parameter::{merge_parameters, validate_json_body, validate_parameters, validate_response_headers};
use crate::context::{Direction, Location, ValidationContext, ValidationMode, ValidationReport};
use crate::error::ErrorKind;
use crate::schema::{NodeKind, PathTemplate, SchemaNode};
use crate::transport::Transport;
use serde_json::Value;

/// Root validation of one exchange against the `Swagger` node
pub(crate) fn validate_root<'a>(
    root: &'a SchemaNode,
    ctx: &ValidationContext<'a>,
    report: &mut ValidationReport,
    transport: &dyn Transport,
) -> bool {
    if let Some(key) = root.missing_keys().first() {
        ctx.with_path(*key).fail(
            report,
            ErrorKind::MandatoryKeyMissing,
            format!("contract is missing the mandatory key '{}'", key),
            "Swagger::mandatory",
        );
        if report.should_stop() {
            return false;
        }
    }

    check_version(root, ctx, report);
    check_scheme(root, ctx, report, transport);
    check_host(root, ctx, report, transport);
    if report.should_stop() {
        return false;
    }

    let Some(request_path) = strip_base_path(root, ctx, report, transport) else {
        return false;
    };

    let Some((template, item, captures)) = match_route(root, &request_path) else {
        return ctx.with_path("paths").fail(
            report,
            ErrorKind::RouteNotFound,
            format!("no path template matches {}", request_path),
            "Paths::route",
        );
    };
    let ctx_item = ctx.with_path("paths").with_path(template.template.as_str());

    let method = transport.method().as_str().to_ascii_lowercase();
    let Some(operation) = item.child(&method) else {
        return ctx_item.fail(
            report,
            ErrorKind::RouteNotFound,
            format!("method {} is not declared for {}", method.to_uppercase(), template.template),
            "PathItem::method",
        );
    };
    let ctx_op = ctx_item.with_path(method.as_str());

    check_content_type(root, operation, ctx, report, transport);
    if report.should_stop() {
        return false;
    }

    match ctx.direction() {
        Direction::Request => {
            let params = merge_parameters(item.child("parameters"), operation.child("parameters"));
            validate_parameters(&params, &ctx_op, report, transport, &captures);
        }
        Direction::Response => {
            validate_response(operation, &ctx_op, report, transport);
        }
    }
    if report.should_stop() {
        return false;
    }

    if ctx.mode() == ValidationMode::Deny {
        validate_too_many(ctx, report, transport);
    }
    report.is_valid()
}

fn check_version(root: &SchemaNode, ctx: &ValidationContext<'_>, report: &mut ValidationReport) -> bool {
    match root.str_value("swagger") {
        Some("2.0") => true,
        other => ctx.with_path("swagger").fail(
            report,
            ErrorKind::SwaggerVersionMismatch,
            format!("swagger version must be \"2.0\", found {:?}", other.unwrap_or_default()),
            "Swagger::version",
        ),
    }
}

fn check_scheme(
    root: &SchemaNode,
    ctx: &ValidationContext<'_>,
    report: &mut ValidationReport,
    transport: &dyn Transport,
) -> bool {
    let scheme = transport.scheme();
    let declared: Vec<&str> = string_list(root.json("schemes"));
    if scheme.is_empty() || declared.is_empty() || declared.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
        return true;
    }
    ctx.with_path("schemes").fail(
        report,
        ErrorKind::SchemeNotAllowed,
        format!("scheme {} is not one of {:?}", scheme, declared),
        "Swagger::schemes",
    )
}

fn check_host(
    root: &SchemaNode,
    ctx: &ValidationContext<'_>,
    report: &mut ValidationReport,
    transport: &dyn Transport,
) -> bool {
    let (Some(declared), Some(actual)) = (root.str_value("host"), transport.host()) else {
        return true;
    };
    if host_matches(declared, actual) {
        return true;
    }
    ctx.with_path("host").fail(
        report,
        ErrorKind::HostNotAllowed,
        format!("host {} is not {}", actual, declared),
        "Swagger::host",
    )
}

/// Case-insensitive host comparison; a side without a port matches any port
fn host_matches(declared: &str, actual: &str) -> bool {
    let (declared_name, declared_port) = split_port(declared);
    let (actual_name, actual_port) = split_port(actual);
    declared_name.eq_ignore_ascii_case(actual_name)
        && (declared_port.is_none() || actual_port.is_none() || declared_port == actual_port)
}

fn split_port(host: &str) -> (&str, Option<&str>) {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => (name, Some(port)),
        _ => (host, None),
    }
}

/// Request path relative to `basePath`, or `None` after recording `BasePathMismatch`
fn strip_base_path(
    root: &SchemaNode,
    ctx: &ValidationContext<'_>,
    report: &mut ValidationReport,
    transport: &dyn Transport,
) -> Option<String> {
    let path = transport.path();
    let base = root
        .str_value("basePath")
        .map(|b| b.trim_end_matches('/'))
        .filter(|b| !b.is_empty());

    let Some(base) = base else {
        return Some(path.to_string());
    };

    match path.strip_prefix(base) {
        Some("") => Some("/".to_string()),
        Some(rest) if rest.starts_with('/') => Some(rest.to_string()),
        _ => {
            ctx.with_path("basePath").fail(
                report,
                ErrorKind::BasePathMismatch,
                format!("{} does not start with basePath {}", path, base),
                "Swagger::basePath",
            );
            None
        }
    }
}

/// Path item matching `path`, literal templates first
fn match_route<'a>(
    root: &'a SchemaNode,
    path: &str,
) -> Option<(&'a PathTemplate, &'a SchemaNode, Vec<(String, String)>)> {
    let paths = root.child("paths")?;
    let items: Vec<(&PathTemplate, &SchemaNode)> = paths
        .children()
        .filter_map(|(_, item)| match item.kind() {
            NodeKind::PathItem(template) => Some((template, item)),
            _ => None,
        })
        .collect();

    let literal = items.iter().filter(|(t, _)| t.is_literal());
    let templated = items.iter().filter(|(t, _)| !t.is_literal());
    literal
        .chain(templated)
        .find_map(|(template, item)| template.captures(path).map(|caps| (*template, *item, caps)))
}

/// Media type reduced the way `consumes`/`produces` entries are compared
fn normalize_media_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
        .replace("application/", "")
        .replace("text/", "")
        .replace("x-", "")
}

fn check_content_type(
    root: &SchemaNode,
    operation: &SchemaNode,
    ctx: &ValidationContext<'_>,
    report: &mut ValidationReport,
    transport: &dyn Transport,
) -> bool {
    let direction = ctx.direction();
    let key = match direction {
        Direction::Request => "consumes",
        Direction::Response => "produces",
    };
    let declared = match string_list(operation.json(key)) {
        list if !list.is_empty() => list,
        _ => string_list(root.json(key)),
    };
    if declared.is_empty() || transport.body(direction).is_empty() {
        return true;
    }

    let actual = transport.header(direction, "content-type").map(normalize_media_type);
    let accepted = actual
        .as_deref()
        .is_some_and(|actual| declared.iter().any(|d| normalize_media_type(d) == actual));
    if accepted {
        return true;
    }

    ctx.with_path(key).with_location(Location::Header).fail(
        report,
        ErrorKind::ContentTypeNotAllowed,
        format!(
            "Content-Type {} is not one of {:?}",
            transport.header(direction, "content-type").unwrap_or("(none)"),
            declared
        ),
        "Swagger::contentType",
    )
}

fn validate_response<'a>(
    operation: &'a SchemaNode,
    ctx: &ValidationContext<'a>,
    report: &mut ValidationReport,
    transport: &dyn Transport,
) -> bool {
    let ctx = ctx.with_path("responses");
    let Some(status) = transport.response_status() else {
        return ctx.fail(
            report,
            ErrorKind::MandatoryKeyMissing,
            "no response status to validate",
            "Responses::status",
        );
    };
    let code = status.to_string();

    let Some((key, response)) = operation.child("responses").and_then(|responses| {
        responses
            .child(&code)
            .map(|r| (code.as_str(), r))
            .or_else(|| responses.child("default").map(|r| ("default", r)))
    }) else {
        return ctx.fail(
            report,
            ErrorKind::RouteNotFound,
            format!("status {} is not declared and there is no default response", status),
            "Responses::status",
        );
    };
    let ctx = ctx.with_path(key);

    if let Some(key) = response.missing_keys().first() {
        ctx.fail(
            report,
            ErrorKind::MandatoryKeyMissing,
            format!("response is missing the mandatory key '{}'", key),
            "Response::mandatory",
        );
    }

    let mut valid = true;
    if let Some(headers) = response.child("headers") {
        valid &= validate_response_headers(headers, &ctx, report, transport);
    }
    if report.should_stop() {
        return false;
    }

    let body_ctx = ctx.with_path("body").with_location(Location::Body);
    let body = transport.response_body();
    match response.child("schema") {
        Some(schema) => {
            if body.iter().all(u8::is_ascii_whitespace) {
                return body_ctx.fail(
                    report,
                    ErrorKind::MandatoryKeyMissing,
                    "response body is missing",
                    "Response::schema",
                );
            }
            report.mark_body();
            valid &= validate_json_body(Some(schema), &body_ctx, report, body);
        }
        // an opaque schema is accepted as declared
        None if response.has("schema") => report.mark_body(),
        None => {}
    }
    valid && report.is_valid()
}

/// Strict mode: every present key the walk did not consume is an error
fn validate_too_many(ctx: &ValidationContext<'_>, report: &mut ValidationReport, transport: &dyn Transport) {
    let direction = ctx.direction();
    let ctx = ctx.with_path("CheckTooMany");

    for location in [Location::Header, Location::Query, Location::FormData] {
        let consumed = report.sandbox_keys(location);
        for key in transport.present_keys(direction, location) {
            if consumed.contains(&key) {
                continue;
            }
            ctx.with_location(location).with_path(key.as_str()).fail(
                report,
                ErrorKind::TooManyParameters,
                format!("{} is given and not expected", key),
                "Swagger::tooMany",
            );
            if report.should_stop() {
                return;
            }
        }
    }

    let body = transport.body(direction);
    let is_form = direction == Direction::Request && transport.has_form_body();
    if !is_form && !body.iter().all(u8::is_ascii_whitespace) && !report.body_consumed() {
        ctx.with_location(Location::Body).with_path("body").fail(
            report,
            ErrorKind::TooManyParameters,
            "body is given and not expected",
            "Swagger::tooMany",
        );
    }
}

fn string_list(value: Option<&Value>) -> Vec<&str> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}
