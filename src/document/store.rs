use super::fetch::{DefaultFetcher, SourceFetcher};
use super::location::{classify, LocationKind, SourceLocation};
use crate::error::{Result, ValidationError};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha512};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One decoded contract document
///
/// Immutable once loaded. Identity is the canonical location.
#[derive(Debug, Clone)]
pub struct RawDocument {
    source: SourceLocation,
    root: Value,
    hash: String,
    fetched_at: DateTime<Utc>,
}

impl RawDocument {
    /// Canonical location (absolute file path or absolute URL)
    pub fn location(&self) -> &str {
        &self.source.canonical
    }

    /// Prefix relative references in this document resolve against
    pub fn base(&self) -> &str {
        &self.source.base
    }

    pub fn kind(&self) -> LocationKind {
        self.source.kind
    }

    pub fn source(&self) -> &SourceLocation {
        &self.source
    }

    /// Decoded JSON tree
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Hex SHA-512 over the raw bytes, `#`, and the fetch timestamp
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Follow a `/`-segmented pointer into the decoded tree
    ///
    /// Empty segments are skipped, so `""`, `"/"` and `"//"` all address the
    /// root. Segments are percent-decoded and JSON Pointer escapes (`~1`, `~0`)
    /// are honoured. Every segment must exist; there is no partial match.
    pub fn resolve_pointer(&self, pointer: &str) -> Result<&Value> {
        let mut node = &self.root;

        for raw in pointer.split('/').filter(|s| !s.is_empty()) {
            let segment = unescape_segment(raw);
            let next = match node {
                Value::Object(map) => map.get(segment.as_str()),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            node = next.ok_or_else(|| {
                ValidationError::not_found(
                    format!(
                        "Cannot find property \"{}\" from ref {}#{}",
                        segment, self.source.canonical, pointer
                    ),
                    "RawDocument::resolve_pointer",
                )
            })?;
        }

        Ok(node)
    }
}

/// Decode one pointer segment (percent-escapes, then `~1` and `~0`)
pub fn unescape_segment(raw: &str) -> String {
    let decoded = urlencoding::decode(raw)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    decoded.replace("~1", "/").replace("~0", "~")
}

/// Cache of loaded documents keyed by canonical location
///
/// Loading the same location twice returns the same `Arc`. Call
/// [`prune`](Self::prune) between independent loads that reuse the store.
pub struct DocumentStore {
    fetcher: Box<dyn SourceFetcher>,
    documents: HashMap<String, Arc<RawDocument>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::with_fetcher(DefaultFetcher::default())
    }

    pub fn with_fetcher(fetcher: impl SourceFetcher + 'static) -> Self {
        Self {
            fetcher: Box::new(fetcher),
            documents: HashMap::new(),
        }
    }

    /// Load (or return the cached) document at `location`
    ///
    /// # Errors
    ///
    /// * `UnreadableSource` - the source is missing, unreadable or empty
    /// * `UndecodableSource` - the bytes are not a JSON (or YAML) document
    pub fn load(&mut self, location: &str) -> Result<Arc<RawDocument>> {
        let source = classify(location);
        if let Some(doc) = self.documents.get(&source.canonical) {
            return Ok(Arc::clone(doc));
        }

        let bytes = self.fetcher.read(&source)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ValidationError::unreadable(
                format!("Cannot read contents for {}", source.canonical),
                "DocumentStore::load",
            ));
        }

        let root = decode(&source, &bytes)?;
        let fetched_at = match self.fetcher.modified(&source) {
            Ok(ts) => ts,
            Err(err) => {
                warn!(location = %source.canonical, error = %err, "freshness probe failed, using now");
                Utc::now()
            }
        };

        debug!(
            target: "swagger_validator::load_file",
            location = %source.canonical,
            kind = %source.kind,
            bytes = bytes.len(),
            "loaded document"
        );

        Ok(self.store(source, root, content_hash(&bytes, fetched_at), fetched_at))
    }

    /// Register an already-decoded document under `location`
    ///
    /// Replaces any cached document with the same canonical location.
    pub fn insert(&mut self, location: &str, root: Value) -> Result<Arc<RawDocument>> {
        let source = classify(location);
        check_not_empty(&source, &root)?;

        let fetched_at = Utc::now();
        let bytes = serde_json::to_vec(&root).map_err(|e| {
            ValidationError::undecodable(e.to_string(), "DocumentStore::insert")
        })?;
        self.documents.remove(&source.canonical);
        Ok(self.store(source, root, content_hash(&bytes, fetched_at), fetched_at))
    }

    /// Cached document by canonical location, without loading
    pub fn get(&self, canonical: &str) -> Option<Arc<RawDocument>> {
        self.documents.get(canonical).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Drop every cached document
    pub fn prune(&mut self) {
        self.documents.clear();
    }

    fn store(
        &mut self,
        source: SourceLocation,
        root: Value,
        hash: String,
        fetched_at: DateTime<Utc>,
    ) -> Arc<RawDocument> {
        let key = source.canonical.clone();
        let doc = Arc::new(RawDocument {
            source,
            root,
            hash,
            fetched_at,
        });
        self.documents.insert(key, Arc::clone(&doc));
        doc
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("documents", &self.documents.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn decode(source: &SourceLocation, bytes: &[u8]) -> Result<Value> {
    let lower = source.canonical.to_ascii_lowercase();
    let decoded: std::result::Result<Value, String> = if lower.ends_with(".yaml") || lower.ends_with(".yml") {
        serde_yaml::from_slice(bytes).map_err(|e| e.to_string())
    } else {
        serde_json::from_slice(bytes).map_err(|e| e.to_string())
    };

    let root = decoded.map_err(|e| {
        ValidationError::undecodable(
            format!("Cannot decode contents for {}: {}", source.canonical, e),
            "DocumentStore::load",
        )
    })?;
    check_not_empty(source, &root)?;
    Ok(root)
}

fn check_not_empty(source: &SourceLocation, root: &Value) -> Result<()> {
    let empty = match root {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    if empty {
        return Err(ValidationError::unreadable(
            format!("Cannot read contents for {}: empty document", source.canonical),
            "DocumentStore::load",
        ));
    }
    Ok(())
}

fn content_hash(bytes: &[u8], fetched_at: DateTime<Utc>) -> String {
    let mut hasher = Sha512::new();
    hasher.update(bytes);
    hasher.update(b"#");
    hasher.update(fetched_at.timestamp().to_string().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
