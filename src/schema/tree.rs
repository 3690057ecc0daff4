use super::factory::NodeFactory;
use super::node::{Property, SchemaNode};
use crate::context::{ValidationOptions, ValidationReport};
use crate::error::{ErrorKind, Result, ValidationError};
use crate::model::ModelBuilder;
use crate::reference::{PreparedDocument, Resolver};
use crate::transport::Transport;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::info;

/// A fully built contract: typed root, typed definitions and the JSON pool
///
/// Read-only once built. Validation and model generation borrow it, so one
/// tree can serve any number of threads.
#[derive(Debug, Clone)]
pub struct SwaggerTree {
    location: String,
    root: SchemaNode,
    definitions: BTreeMap<String, SchemaNode>,
    pool: Map<String, Value>,
}

impl SwaggerTree {
    /// Load and build the contract at `location` with a fresh resolver
    ///
    /// # Errors
    ///
    /// Any document loading failure, or a node whose JSON shape is wrong
    /// (`SchemaTypeMismatch`).
    pub fn load(location: &str) -> Result<Self> {
        let mut resolver = Resolver::new();
        Self::load_with(&mut resolver, location)
    }

    /// Load through a caller-owned resolver (custom fetcher, shared cache)
    pub fn load_with(resolver: &mut Resolver, location: &str) -> Result<Self> {
        let prepared = resolver.prepare(location)?;
        Self::from_prepared(resolver, prepared)
    }

    /// Build from an already-decoded document registered under `location`
    pub fn from_value(location: &str, root: Value) -> Result<Self> {
        let mut resolver = Resolver::new();
        let prepared = resolver.prepare_value(location, root)?;
        Self::from_prepared(&resolver, prepared)
    }

    /// Build the typed tree once `resolver` has registered every reference
    pub fn from_prepared(resolver: &Resolver, prepared: PreparedDocument) -> Result<Self> {
        let PreparedDocument { document, mut tree } = prepared;
        let registry = resolver.registry();
        let factory = NodeFactory::new(registry);

        let obj = tree.as_object_mut().ok_or_else(|| {
            ValidationError::new(
                ErrorKind::SchemaTypeMismatch,
                "Swagger document must be a JSON object",
                "SwaggerTree::from_prepared",
            )
        })?;
        obj.shift_remove("definitions");
        let root = factory.build_root(&tree)?;

        let mut definitions = BTreeMap::new();
        for id in registry.ids() {
            let body = registry
                .definition(id)
                .filter(|_| !registry.is_pending(id))
                .ok_or_else(|| {
                    ValidationError::not_found(
                        format!("definition '{}' was registered but never resolved", id),
                        "SwaggerTree::from_prepared",
                    )
                })?;
            if !body.is_object() {
                continue;
            }
            let path = format!("definitions/{}", id);
            if let Property::Node(node) = factory.build_schema(body, &path)? {
                definitions.insert(id.to_string(), node);
            }
        }

        info!(
            location = %document.location(),
            definitions = definitions.len(),
            hash = %document.hash().get(..16).unwrap_or_default(),
            "contract loaded"
        );

        Ok(SwaggerTree {
            location: document.location().to_string(),
            root,
            definitions,
            pool: registry.inline_definitions(),
        })
    }

    /// Canonical location of the root document
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// Typed schema nodes of the local definitions pool
    pub fn definitions(&self) -> &BTreeMap<String, SchemaNode> {
        &self.definitions
    }

    pub fn definition(&self, id: &str) -> Option<&SchemaNode> {
        self.definitions.get(id)
    }

    /// Re-emit the contract with every used definition inlined under `definitions`
    pub fn serialize(&self) -> Value {
        let mut doc = self.root.to_value();
        if let Value::Object(map) = &mut doc {
            if !self.pool.is_empty() {
                map.insert("definitions".to_string(), Value::Object(self.pool.clone()));
            }
        }
        doc
    }

    /// Validate one exchange
    pub fn validate(&self, transport: &dyn Transport, options: ValidationOptions) -> ValidationReport {
        crate::validator::validate(self, transport, options)
    }

    /// Example request/response model for every path and method
    pub fn model(&self) -> Value {
        ModelBuilder::new(self).build()
    }

    /// `info.version`
    pub fn api_version(&self) -> Option<&str> {
        self.root.child("info").and_then(|info| info.str_value("version"))
    }

    fn version_part(&self, index: usize) -> Option<&str> {
        self.api_version()
            .and_then(|v| v.splitn(4, '.').nth(index))
            .filter(|p| !p.is_empty())
    }

    pub fn api_version_major(&self) -> Option<&str> {
        self.version_part(0)
    }

    pub fn api_version_minor(&self) -> Option<&str> {
        self.version_part(1)
    }

    pub fn api_version_build(&self) -> Option<&str> {
        self.version_part(2)
    }

    pub fn api_version_patch(&self) -> Option<&str> {
        self.version_part(3)
    }
}
