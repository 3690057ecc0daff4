//! Request/response data supplied by the host application.
//!
//! The validator never performs socket I/O for the exchange it checks. A host
//! either implements [`Transport`] over its own request type or fills an owned
//! [`Exchange`].

use crate::context::{Direction, Location};
use crate::error::{ErrorKind, Result, ValidationError};
use http::Method;
use std::collections::BTreeSet;
use url::Url;

/// Read-only view of one HTTP exchange
pub trait Transport {
    /// Lower-case scheme, empty when unknown
    fn scheme(&self) -> &str;
    /// `host[:port]` the request was sent to
    fn host(&self) -> Option<&str>;
    fn method(&self) -> &Method;
    /// Request path without query, still percent-encoded
    fn path(&self) -> &str;
    /// Decoded query pairs in arrival order
    fn query_pairs(&self) -> &[(String, String)];
    fn request_headers(&self) -> &[(String, String)];
    fn request_body(&self) -> &[u8];
    fn response_status(&self) -> Option<u16>;
    fn response_headers(&self) -> &[(String, String)];
    fn response_body(&self) -> &[u8];

    /// Headers of the request or the response
    fn headers(&self, direction: Direction) -> &[(String, String)] {
        match direction {
            Direction::Request => self.request_headers(),
            Direction::Response => self.response_headers(),
        }
    }

    /// Body of the request or the response
    fn body(&self, direction: Direction) -> &[u8] {
        match direction {
            Direction::Request => self.request_body(),
            Direction::Response => self.response_body(),
        }
    }

    /// First header value by case-insensitive name
    fn header(&self, direction: Direction, name: &str) -> Option<&str> {
        self.headers(direction)
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a repeated query parameter
    fn query_values(&self, name: &str) -> Vec<&str> {
        self.query_pairs()
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Pairs of an `application/x-www-form-urlencoded` request body
    fn form_pairs(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.request_body())
            .into_owned()
            .collect()
    }

    /// Whether the request body is `application/x-www-form-urlencoded`
    fn has_form_body(&self) -> bool {
        self.header(Direction::Request, "content-type")
            .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("application/x-www-form-urlencoded"))
    }

    /// Keys present in `location`, as seen by strict-mode checks
    ///
    /// Path keys are never reported: the matched template consumes them all.
    /// Standard HTTP headers are left out since no contract declares them.
    fn present_keys(&self, direction: Direction, location: Location) -> BTreeSet<String> {
        match location {
            Location::Query if direction == Direction::Request => {
                self.query_pairs().iter().map(|(k, _)| k.clone()).collect()
            }
            Location::FormData if direction == Direction::Request && self.has_form_body() => {
                self.form_pairs().into_iter().map(|(k, _)| k).collect()
            }
            Location::Header => self
                .headers(direction)
                .iter()
                .map(|(k, _)| k.to_ascii_lowercase())
                .filter(|k| !is_standard_header(k))
                .collect(),
            _ => BTreeSet::new(),
        }
    }
}

const STANDARD_HEADERS: &[&str] = &[
    "accept",
    "accept-charset",
    "accept-encoding",
    "accept-language",
    "access-control-request-headers",
    "access-control-request-method",
    "authorization",
    "cache-control",
    "connection",
    "content-encoding",
    "content-language",
    "content-length",
    "content-type",
    "cookie",
    "date",
    "etag",
    "expect",
    "forwarded",
    "host",
    "if-match",
    "if-modified-since",
    "if-none-match",
    "keep-alive",
    "last-modified",
    "origin",
    "pragma",
    "referer",
    "server",
    "set-cookie",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "user-agent",
    "vary",
    "via",
];

/// Whether `name` (lower-case) is a general HTTP header rather than an API parameter
pub fn is_standard_header(name: &str) -> bool {
    STANDARD_HEADERS.contains(&name) || name.starts_with("x-forwarded-") || name.starts_with("sec-")
}

/// An owned request (and optional response) for validation
#[derive(Debug, Clone)]
pub struct Exchange {
    scheme: String,
    host: Option<String>,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    request_headers: Vec<(String, String)>,
    request_body: Vec<u8>,
    response_status: Option<u16>,
    response_headers: Vec<(String, String)>,
    response_body: Vec<u8>,
}

impl Exchange {
    /// Start an exchange from a method and an absolute or path-only URL
    ///
    /// A path-only URL (`/v1/users/42?x=1`) leaves scheme and host unknown, and
    /// the scheme and host checks are skipped for it.
    ///
    /// # Errors
    ///
    /// `TransportError` when `url` cannot be parsed.
    pub fn request(method: Method, url: &str) -> Result<Self> {
        let unparsable = |e: url::ParseError| {
            ValidationError::new(
                ErrorKind::TransportError,
                format!("Cannot parse request URL {}: {}", url, e),
                "Exchange::request",
            )
        };

        let (parsed, relative) = match Url::parse(url) {
            Ok(parsed) => (parsed, false),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = Url::parse("http://localhost/").map_err(unparsable)?;
                (base.join(url).map_err(unparsable)?, true)
            }
            Err(e) => return Err(unparsable(e)),
        };

        let host = if relative {
            None
        } else {
            parsed.host_str().map(|h| match parsed.port() {
                Some(port) => format!("{}:{}", h, port),
                None => h.to_string(),
            })
        };

        Ok(Exchange {
            scheme: if relative {
                String::new()
            } else {
                parsed.scheme().to_ascii_lowercase()
            },
            host,
            method,
            path: parsed.path().to_string(),
            query: parsed.query_pairs().into_owned().collect(),
            request_headers: Vec::new(),
            request_body: Vec::new(),
            response_status: None,
            response_headers: Vec::new(),
            response_body: Vec::new(),
        })
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.request_body = body.into();
        self
    }

    /// JSON request body, with `Content-Type: application/json` unless one is set
    pub fn json_body(mut self, body: &serde_json::Value) -> Self {
        if !self.request_headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
            self = self.header("Content-Type", "application/json");
        }
        self.body(body.to_string())
    }

    /// Attach the response status
    pub fn status(mut self, status: u16) -> Self {
        self.response_status = Some(status);
        self
    }

    pub fn response_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response_headers.push((name.into(), value.into()));
        self
    }

    pub fn response_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.response_body = body.into();
        self
    }
}

impl Transport for Exchange {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    fn method(&self) -> &Method {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    fn request_headers(&self) -> &[(String, String)] {
        &self.request_headers
    }

    fn request_body(&self) -> &[u8] {
        &self.request_body
    }

    fn response_status(&self) -> Option<u16> {
        self.response_status
    }

    fn response_headers(&self) -> &[(String, String)] {
        &self.response_headers
    }

    fn response_body(&self) -> &[u8] {
        &self.response_body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_url_is_split() {
        let ex = Exchange::request(Method::GET, "HTTPS://api.example.com:8443/v1/users/42?tag=a&tag=b&q=x%20y")
            .unwrap();
        assert_eq!(ex.scheme(), "https");
        assert_eq!(ex.host(), Some("api.example.com:8443"));
        assert_eq!(ex.path(), "/v1/users/42");
        assert_eq!(ex.query_values("tag"), vec!["a", "b"]);
        assert_eq!(ex.query_values("q"), vec!["x y"]);
    }

    #[test]
    fn test_path_only_url_has_no_scheme_or_host() {
        let ex = Exchange::request(Method::POST, "/v1/users?x=1").unwrap();
        assert_eq!(ex.scheme(), "");
        assert_eq!(ex.host(), None);
        assert_eq!(ex.path(), "/v1/users");
    }

    #[test]
    fn test_present_keys_skip_standard_headers() {
        let ex = Exchange::request(Method::GET, "https://h/p?a=1&b=2")
            .unwrap()
            .header("Accept", "application/json")
            .header("X-Request-Id", "abc")
            .header("X-Forwarded-For", "10.0.0.1");

        let headers = ex.present_keys(Direction::Request, Location::Header);
        assert_eq!(headers.into_iter().collect::<Vec<_>>(), vec!["x-request-id"]);

        let query = ex.present_keys(Direction::Request, Location::Query);
        assert_eq!(query.len(), 2);
        assert!(ex.present_keys(Direction::Response, Location::Query).is_empty());
    }

    #[test]
    fn test_form_pairs_from_body() {
        let ex = Exchange::request(Method::POST, "https://h/p")
            .unwrap()
            .header("content-type", "application/x-www-form-urlencoded")
            .body("name=Rex&tags=a%2Cb");
        assert_eq!(
            ex.form_pairs(),
            vec![
                ("name".to_string(), "Rex".to_string()),
                ("tags".to_string(), "a,b".to_string())
            ]
        );
        assert_eq!(Transport::header(&ex, Direction::Request, "Content-Type"), Some("application/x-www-form-urlencoded"));
    }
}
