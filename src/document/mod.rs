//! # Document Store
//!
//! Fetches contract documents from local files or URLs, decodes them into
//! `serde_json::Value` trees and caches one [`RawDocument`] per canonical
//! location.
//!
//! ## Location classification
//!
//! A location string is treated as a **file** when it has no scheme or no host,
//! when its scheme is `file`, or when a local file of that name exists. Anything
//! else is a **URL**. The base used to resolve relative `$ref` links is the
//! containing directory (files) or `scheme://[user:pass@]host[:port]/dir/`
//! (URLs).
//!
//! ## Freshness
//!
//! Every document records a fetch timestamp (file modification time, or the
//! remote `Last-Modified` header) and a SHA-512 content hash over the raw bytes
//! and that timestamp. A failed remote metadata probe falls back to "now".
//!
//! ## Usage
//!
//! ```rust,ignore
//! use swagger_validator::document::DocumentStore;
//!
//! let mut store = DocumentStore::new();
//! let doc = store.load("contracts/petstore.json")?;
//! let pet = doc.resolve_pointer("/definitions/Pet")?;
//! ```

mod fetch;
mod location;
mod store;

pub use fetch::{DefaultFetcher, SourceFetcher};
pub use location::{classify, normalize_path, LocationKind, SourceLocation};
pub use store::{unescape_segment, DocumentStore, RawDocument};
