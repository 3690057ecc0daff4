//! # Reference Resolver
//!
//! Resolves `$ref` pointers between contract documents and flattens every
//! reachable target into one local `definitions` pool.
//!
//! ## Reference forms
//!
//! - `#/definitions/Pet` - pointer into the same document
//! - `common.json#/Error`, `../shared/models.yaml#/Address` - relative file
//! - `file:///srv/contracts/common.json#/Error` - absolute file
//! - `https://specs.example.com/v1/common.json#/Error` - remote document
//!
//! Every form is canonicalized to `absolute-location#/pointer` before it is
//! registered, so two spellings of the same target share one identifier.
//!
//! ## Sessions
//!
//! A [`Resolver`] owns the [`DocumentStore`] and the [`ReferenceRegistry`] for
//! one load. Nothing is global: build a fresh resolver per contract, or call
//! [`Resolver::prune`] before reusing one for an unrelated document.

mod canonical;
mod registry;
mod visit;

pub use canonical::{canonicalize, split_reference, CanonicalReference};
pub use registry::{local_id, local_ref, ReferenceRegistry, LOCAL_DEFINITIONS};
pub use visit::{extract_references, visit_references, REFERENCE_KEY};

use crate::document::{DocumentStore, RawDocument};
use crate::error::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A contract document with every `$ref` rewritten to absolute form
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub document: Arc<RawDocument>,
    pub tree: Value,
}

/// Document cache plus reference table for one load
#[derive(Debug, Default)]
pub struct Resolver {
    store: DocumentStore,
    registry: ReferenceRegistry,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver over a caller-supplied store (custom fetcher, pre-inserted documents)
    pub fn with_store(store: DocumentStore) -> Self {
        Self {
            store,
            registry: ReferenceRegistry::new(),
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DocumentStore {
        &mut self.store
    }

    pub fn registry(&self) -> &ReferenceRegistry {
        &self.registry
    }

    /// Load the root document at `location` and register everything it refers to
    ///
    /// # Errors
    ///
    /// Any loading failure of the root or of a referenced document.
    pub fn prepare(&mut self, location: &str) -> Result<PreparedDocument> {
        let document = self.store.load(location)?;
        self.prepare_document(document)
    }

    /// Same as [`prepare`](Self::prepare) for an already-decoded document
    pub fn prepare_value(&mut self, location: &str, root: Value) -> Result<PreparedDocument> {
        let document = self.store.insert(location, root)?;
        self.prepare_document(document)
    }

    /// Clear the document cache and the reference table
    pub fn prune(&mut self) {
        self.store.prune();
        self.registry.prune();
    }

    /// A failed preparation leaves the registry as it was before the call
    fn prepare_document(&mut self, document: Arc<RawDocument>) -> Result<PreparedDocument> {
        let snapshot = self.registry.clone();
        let result = self.register_document(document);
        if let Err(err) = &result {
            debug!(
                target: "swagger_validator::load_ref",
                error = %err,
                "preparation failed, rolling back registered references"
            );
            self.registry = snapshot;
        }
        result
    }

    fn register_document(&mut self, document: Arc<RawDocument>) -> Result<PreparedDocument> {
        let roots = self
            .registry
            .register_root_definitions(&mut self.store, &document)?;

        let mut tree = document.root().clone();
        let references = extract_references(&document, &mut tree)?;
        for reference in &references {
            self.registry.register_definition(&mut self.store, reference)?;
        }

        debug!(
            target: "swagger_validator::decode",
            location = %document.location(),
            root_definitions = roots,
            references = references.len(),
            definitions = self.registry.len(),
            "prepared document"
        );

        Ok(PreparedDocument { document, tree })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prepare_rewrites_refs_and_fills_pool() {
        let mut resolver = Resolver::new();
        let prepared = resolver
            .prepare_value(
                "/srv/api.json",
                json!({
                    "swagger": "2.0",
                    "paths": { "/pets": { "get": { "responses": { "200": {
                        "description": "ok",
                        "schema": { "$ref": "#/definitions/Pet" }
                    } } } } },
                    "definitions": {
                        "Pet": { "type": "object", "properties": { "tag": { "$ref": "#/definitions/Tag" } } },
                        "Tag": { "type": "string" }
                    }
                }),
            )
            .unwrap();

        let schema_ref = prepared.tree["paths"]["/pets"]["get"]["responses"]["200"]["schema"]["$ref"]
            .as_str()
            .unwrap();
        assert!(schema_ref.ends_with("api.json#/definitions/Pet"));
        assert_eq!(resolver.registry().id_for(schema_ref), Some("Pet"));

        let pool = resolver.registry().inline_definitions();
        assert_eq!(pool.keys().collect::<Vec<_>>(), vec!["Pet", "Tag"]);
        assert_eq!(pool["Pet"]["properties"]["tag"]["$ref"], "#/definitions/Tag");
    }

    #[test]
    fn test_prune_forgets_everything() {
        let mut resolver = Resolver::new();
        resolver
            .prepare_value("/srv/a.json", json!({ "definitions": { "A": { "type": "string" } } }))
            .unwrap();
        assert_eq!(resolver.registry().len(), 1);

        resolver.prune();
        assert!(resolver.registry().is_empty());
        assert!(resolver.store().is_empty());
    }

    #[test]
    fn test_failed_prepare_registers_nothing() {
        let mut resolver = Resolver::new();
        let err = resolver
            .prepare_value(
                "/srv/broken.json",
                json!({
                    "swagger": "2.0",
                    "paths": { "/pets": { "post": { "parameters": [
                        { "name": "pet", "in": "body", "schema": { "$ref": "#/definitions/Missing" } }
                    ] } } },
                    "definitions": { "Pet": { "type": "object" } }
                }),
            )
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::ReferenceNotFound);
        assert!(resolver.registry().is_empty());
    }
}
