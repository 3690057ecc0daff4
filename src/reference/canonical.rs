use crate::document::{classify, LocationKind, RawDocument};
use crate::error::{Result, ValidationError};
use std::path::Path;
use url::Url;

/// A `$ref` resolved to an absolute document location plus inner pointer
///
/// `full_ref` is always `document + "#" + pointer`. Neither part contains `.`
/// or `..` segments once canonicalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalReference {
    pub full_ref: String,
    pub document: String,
    pub pointer: String,
}

impl CanonicalReference {
    pub fn new(document: impl Into<String>, pointer: &str) -> Self {
        let document = document.into();
        let pointer = normalize_pointer(pointer);
        CanonicalReference {
            full_ref: format!("{}#{}", document, pointer),
            document,
            pointer,
        }
    }
}

impl std::fmt::Display for CanonicalReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_ref)
    }
}

/// Split a raw `$ref` into its document link and pointer parts
///
/// ```
/// use swagger_validator::reference::split_reference;
///
/// assert_eq!(split_reference("common.json#/definitions/Error"), ("common.json", "/definitions/Error"));
/// assert_eq!(split_reference("#/definitions/Pet"), ("", "/definitions/Pet"));
/// assert_eq!(split_reference("other.json"), ("other.json", ""));
/// ```
pub fn split_reference(raw: &str) -> (&str, &str) {
    match raw.split_once('#') {
        Some((link, pointer)) => (link.trim(), pointer.trim()),
        None => (raw.trim(), ""),
    }
}

/// Resolve `raw_ref` as it appears inside `base` into a canonical reference
///
/// An empty link targets `base` itself. Relative links join against the base
/// directory (files) or base URL (URLs); `file://` links are absolute paths.
/// The pointer defaults to `/` and repeated slashes collapse.
pub fn canonicalize(base: &RawDocument, raw_ref: &str) -> Result<CanonicalReference> {
    let (link, pointer) = split_reference(raw_ref);

    let document = if link.is_empty() {
        base.location().to_string()
    } else {
        resolve_link(base, link)?
    };

    Ok(CanonicalReference::new(document, pointer))
}

fn resolve_link(base: &RawDocument, link: &str) -> Result<String> {
    if let Ok(url) = Url::parse(link) {
        if url.scheme().eq_ignore_ascii_case("file") {
            let path = url.to_file_path().map_err(|_| {
                ValidationError::malformed(
                    format!("Cannot load file from ref {}", link),
                    "canonicalize",
                )
            })?;
            return Ok(classify(&path.to_string_lossy()).canonical);
        }
        if url.host_str().is_some_and(|h| !h.is_empty()) {
            return Ok(classify(url.as_str()).canonical);
        }
    }

    match base.kind() {
        LocationKind::File => {
            let joined = Path::new(base.base()).join(link);
            Ok(classify(&joined.to_string_lossy()).canonical)
        }
        LocationKind::Url => {
            let joined = Url::parse(base.base())
                .and_then(|b| b.join(link))
                .map_err(|e| {
                    ValidationError::malformed(
                        format!("Cannot resolve {} against {}: {}", link, base.base(), e),
                        "canonicalize",
                    )
                })?;
            Ok(classify(joined.as_str()).canonical)
        }
    }
}

fn normalize_pointer(pointer: &str) -> String {
    let mut pointer = pointer.trim().to_string();
    while pointer.contains("//") {
        pointer = pointer.replace("//", "/");
    }
    if !pointer.starts_with('/') {
        pointer.insert(0, '/');
    }
    pointer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentStore;
    use serde_json::json;

    #[test]
    fn test_internal_reference_targets_same_document() {
        let mut store = DocumentStore::new();
        let doc = store.insert("/srv/api/swagger.json", json!({"a": 1})).unwrap();

        let c = canonicalize(&doc, "#/definitions/Pet").unwrap();
        assert_eq!(c.document, doc.location());
        assert_eq!(c.pointer, "/definitions/Pet");
        assert_eq!(c.full_ref, format!("{}#/definitions/Pet", doc.location()));
    }

    #[test]
    fn test_pointer_defaults_and_collapses() {
        let mut store = DocumentStore::new();
        let doc = store.insert("/srv/api/swagger.json", json!({"a": 1})).unwrap();

        assert_eq!(canonicalize(&doc, "other.json").unwrap().pointer, "/");
        assert_eq!(canonicalize(&doc, "#//definitions///Pet").unwrap().pointer, "/definitions/Pet");
        assert_eq!(canonicalize(&doc, "#definitions/Pet").unwrap().pointer, "/definitions/Pet");
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_file_link_is_resolved_against_base_directory() {
        let mut store = DocumentStore::new();
        let doc = store.insert("/srv/api/v1/swagger.json", json!({"a": 1})).unwrap();

        let c = canonicalize(&doc, "../common/./errors.json#/Error").unwrap();
        assert_eq!(c.document, "/srv/api/common/errors.json");
        assert_eq!(c.full_ref, "/srv/api/common/errors.json#/Error");
    }

    #[test]
    fn test_relative_link_inside_url_document() {
        let mut store = DocumentStore::new();
        let doc = store
            .insert("https://specs.example.com/api/v1/swagger.json", json!({"a": 1}))
            .unwrap();

        let c = canonicalize(&doc, "../shared/models.json#/Pet").unwrap();
        assert_eq!(c.document, "https://specs.example.com/api/shared/models.json");
        assert_eq!(c.pointer, "/Pet");

        let abs = canonicalize(&doc, "http://other.example.com:8080/x.json#/A").unwrap();
        assert_eq!(abs.full_ref, "http://other.example.com:8080/x.json#/A");
    }
}
