//! `format` keyword support for string and numeric data types.

use base64::Engine;
use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::Url;

/// RFC 4648 base64
static BYTE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9+/]{4})*(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?$")
        .expect("byte format regex should be valid")
});

static DATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date format regex should be valid")
});

/// RFC 3339 `date-time`, `T`/`Z` designators in either case
static DATE_TIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\d{4}-\d{2}-\d{2}t\d{2}:\d{2}:\d{2}(\.\d+)?(z|[+-]\d{2}:\d{2})$")
        .expect("date-time format regex should be valid")
});

/// Result of checking a value against a declared `format`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCheck {
    Valid,
    /// The format is known but the value does not match it
    Mismatch,
    /// No recognised format of this name
    Unknown,
}

/// Check a string value against a string `format`
///
/// `binary` and `password` accept anything, as does an empty format.
pub fn check_string_format(format: &str, value: &str) -> FormatCheck {
    let matched = match format {
        "" | "string" | "binary" | "password" => true,
        "byte" => BYTE_REGEX.is_match(value),
        "date" => DATE_REGEX.is_match(value),
        "date-time" => DATE_TIME_REGEX.is_match(value),
        "uri" => Url::parse(value).is_ok(),
        "ipv4" => value.parse::<Ipv4Addr>().is_ok(),
        "ipv6" => value.parse::<Ipv6Addr>().is_ok(),
        _ => return FormatCheck::Unknown,
    };
    if matched {
        FormatCheck::Valid
    } else {
        FormatCheck::Mismatch
    }
}

/// Check a numeric value against an integer or number `format`
pub fn check_numeric_format(format: &str, value: &Value) -> FormatCheck {
    match format {
        "" | "int64" | "float" | "double" => FormatCheck::Valid,
        "int32" => match value.as_i64() {
            Some(n) if i32::try_from(n).is_ok() => FormatCheck::Valid,
            Some(_) => FormatCheck::Mismatch,
            None if value.is_u64() => FormatCheck::Mismatch,
            None => FormatCheck::Valid,
        },
        _ => FormatCheck::Unknown,
    }
}

/// Canned example for a string `format`, `None` when the format has none
pub fn string_format_example(format: &str) -> Option<Value> {
    let example = match format {
        "byte" => base64::engine::general_purpose::STANDARD.encode("this is a test 1234567890"),
        "binary" => "a125d1f15b51".to_string(),
        "date" => Utc::now().format("%Y-%m-%d").to_string(),
        "date-time" => Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "password" => "pwdExample1".to_string(),
        "uri" => "http://localhost/path/script?query#fragment".to_string(),
        "ipv4" => "127.0.0.1".to_string(),
        "ipv6" => "::1".to_string(),
        "string" => "This is an example of string type and format string".to_string(),
        _ => return None,
    };
    Some(Value::String(example))
}
