use super::canonical::{canonicalize, CanonicalReference};
use super::visit::visit_references;
use crate::document::{unescape_segment, DocumentStore, RawDocument};
use crate::error::Result;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Prefix of a reference into the local definitions pool
pub const LOCAL_DEFINITIONS: &str = "#/definitions/";

/// Reference into the local definitions pool for `id`
pub fn local_ref(id: &str) -> String {
    format!("{}{}", LOCAL_DEFINITIONS, id)
}

/// Identifier of a local-pool reference, `None` for anything else
pub fn local_id(raw_ref: &str) -> Option<&str> {
    raw_ref
        .strip_prefix(LOCAL_DEFINITIONS)
        .filter(|id| !id.is_empty() && !id.contains('/'))
}

/// Table of every canonical reference seen during one load
///
/// Each canonical reference gets exactly one short identifier. The identifier
/// is assigned before the target body is scanned, so a body that refers back
/// to a reference still being populated sees the identifier and stops there.
/// Definitions are stored with their nested references already rewritten to
/// local-pool form (`#/definitions/<id>`).
#[derive(Debug, Default, Clone)]
pub struct ReferenceRegistry {
    ids: HashMap<String, String>,
    references: IndexMap<String, CanonicalReference>,
    definitions: IndexMap<String, Value>,
    pending: HashSet<String>,
}

impl ReferenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign (or reuse) the identifier for `reference` and populate its definition
    ///
    /// The target document is loaded on first use. Every `$ref` inside the
    /// target body is canonicalized against the target document and registered
    /// in turn.
    ///
    /// # Errors
    ///
    /// Any load failure of the target document, a missing pointer segment
    /// (`ReferenceNotFound`) or a malformed nested reference.
    pub fn register_definition(
        &mut self,
        store: &mut DocumentStore,
        reference: &CanonicalReference,
    ) -> Result<String> {
        if let Some(id) = self.ids.get(&reference.full_ref) {
            return Ok(id.clone());
        }

        let id = self.allocate_id(reference);
        self.ids.insert(reference.full_ref.clone(), id.clone());
        self.references.insert(id.clone(), reference.clone());
        self.pending.insert(id.clone());

        debug!(
            target: "swagger_validator::load_ref",
            reference = %reference.full_ref,
            id = %id,
            "registering reference"
        );

        let document = store.load(&reference.document)?;
        let mut body = document.resolve_pointer(&reference.pointer)?.clone();

        visit_references(&mut body, &mut |raw| {
            let nested = canonicalize(&document, raw)?;
            let nested_id = self.register_definition(store, &nested)?;
            debug!(
                target: "swagger_validator::replace_ref",
                from = raw,
                to = %nested_id,
                "replaced nested reference"
            );
            Ok(local_ref(&nested_id))
        })?;

        self.definitions.insert(id.clone(), body);
        self.pending.remove(&id);
        Ok(id)
    }

    /// Register every entry of `document`'s own `definitions` object
    ///
    /// Runs before the rest of the tree so root definitions keep their names and
    /// survive a round trip even when nothing refers to them.
    pub fn register_root_definitions(
        &mut self,
        store: &mut DocumentStore,
        document: &RawDocument,
    ) -> Result<usize> {
        let Some(Value::Object(definitions)) = document.root().get("definitions") else {
            return Ok(0);
        };

        for key in definitions.keys() {
            let pointer = format!("/definitions/{}", key.replace('~', "~0").replace('/', "~1"));
            let reference = CanonicalReference::new(document.location(), &pointer);
            self.register_definition(store, &reference)?;
        }
        Ok(definitions.len())
    }

    /// Identifier assigned to a fully-qualified reference
    pub fn id_for(&self, full_ref: &str) -> Option<&str> {
        self.ids.get(full_ref).map(String::as_str)
    }

    pub fn reference(&self, id: &str) -> Option<&CanonicalReference> {
        self.references.get(id)
    }

    /// Normalized definition body for `id`, `None` while pending
    pub fn definition(&self, id: &str) -> Option<&Value> {
        self.definitions.get(id)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    /// Identifiers in registration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.references.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// The `definitions` object appended to a serialized document
    pub fn inline_definitions(&self) -> Map<String, Value> {
        self.definitions
            .iter()
            .map(|(id, body)| (id.clone(), body.clone()))
            .collect()
    }

    pub fn prune(&mut self) {
        self.ids.clear();
        self.references.clear();
        self.definitions.clear();
        self.pending.clear();
    }

    fn allocate_id(&self, reference: &CanonicalReference) -> String {
        let base = reference
            .pointer
            .rsplit('/')
            .find(|s| !s.is_empty())
            .map(|s| sanitize_id(&unescape_segment(s)))
            .filter(|s| !s.is_empty())
            .or_else(|| {
                Path::new(reference.document.split('?').next().unwrap_or_default())
                    .file_stem()
                    .map(|stem| sanitize_id(&stem.to_string_lossy()))
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or_else(|| "root".to_string());

        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.references.contains_key(&candidate) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        candidate
    }
}

fn sanitize_id(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '/' | '~' | '#' | '%' | '?' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn store_with(location: &str, root: Value) -> (DocumentStore, std::sync::Arc<RawDocument>) {
        let mut store = DocumentStore::new();
        let doc = store.insert(location, root).unwrap();
        (store, doc)
    }

    #[test]
    fn test_registration_is_idempotent() {
        let (mut store, doc) = store_with(
            "/srv/pets.json",
            json!({ "definitions": { "Pet": { "type": "object" } } }),
        );
        let mut registry = ReferenceRegistry::new();

        let a = canonicalize(&doc, "#/definitions/Pet").unwrap();
        let b = canonicalize(&doc, "pets.json#/definitions//Pet").unwrap();
        let id_a = registry.register_definition(&mut store, &a).unwrap();
        let id_b = registry.register_definition(&mut store, &b).unwrap();

        assert_eq!(id_a, "Pet");
        assert_eq!(id_a, id_b);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.inline_definitions().len(), 1);
    }

    #[test]
    fn test_cycle_terminates_with_two_definitions() {
        let (mut store, doc) = store_with(
            "/srv/cycle.json",
            json!({
                "definitions": {
                    "A": { "type": "object", "properties": { "b": { "$ref": "#/definitions/B" } } },
                    "B": { "type": "object", "properties": { "a": { "$ref": "#/definitions/A" } } }
                }
            }),
        );
        let mut registry = ReferenceRegistry::new();
        let a = canonicalize(&doc, "#/definitions/A").unwrap();
        registry.register_definition(&mut store, &a).unwrap();

        let defs = registry.inline_definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs["A"]["properties"]["b"]["$ref"], "#/definitions/B");
        assert_eq!(defs["B"]["properties"]["a"]["$ref"], "#/definitions/A");
        assert!(!registry.is_pending("A"));
        assert!(!registry.is_pending("B"));
    }

    #[test]
    fn test_identifier_collisions_get_suffixes() {
        let mut store = DocumentStore::new();
        let main = store
            .insert("/srv/main.json", json!({ "definitions": { "Error": { "type": "object" } } }))
            .unwrap();
        store
            .insert("/srv/common.json", json!({ "Error": { "type": "string" } }))
            .unwrap();

        let mut registry = ReferenceRegistry::new();
        registry.register_root_definitions(&mut store, &main).unwrap();
        let external = canonicalize(&main, "common.json#/Error").unwrap();
        let id = registry.register_definition(&mut store, &external).unwrap();

        assert_eq!(id, "Error_2");
        assert_eq!(registry.definition("Error_2").unwrap()["type"], "string");
        assert_eq!(registry.definition("Error").unwrap()["type"], "object");
    }

    #[test]
    fn test_whole_document_reference_uses_file_stem() {
        let mut store = DocumentStore::new();
        let main = store.insert("/srv/main.json", json!({ "a": 1 })).unwrap();
        store.insert("/srv/address.json", json!({ "type": "object" })).unwrap();

        let mut registry = ReferenceRegistry::new();
        let r = canonicalize(&main, "address.json").unwrap();
        assert_eq!(registry.register_definition(&mut store, &r).unwrap(), "address");
    }

    #[test]
    fn test_missing_target_fails_the_load() {
        let (mut store, doc) = store_with("/srv/a.json", json!({ "definitions": {} , "x": 1 }));
        let mut registry = ReferenceRegistry::new();
        let r = canonicalize(&doc, "#/definitions/Nope").unwrap();
        let err = registry.register_definition(&mut store, &r).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReferenceNotFound);
    }

    #[test]
    fn test_local_reference_helpers() {
        assert_eq!(local_ref("Pet"), "#/definitions/Pet");
        assert_eq!(local_id("#/definitions/Pet"), Some("Pet"));
        assert_eq!(local_id("#/definitions/Pet/properties"), None);
        assert_eq!(local_id("/abs/file.json#/definitions/Pet"), None);
    }
}
