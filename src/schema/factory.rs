use super::node::{NodeKind, PathTemplate, Property, PropertyBag, SchemaNode};
use crate::error::{ErrorKind, Result, ValidationError};
use crate::reference::{local_id, local_ref, visit_references, ReferenceRegistry, REFERENCE_KEY};
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use tracing::debug;

const HTTP_METHODS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];

/// What a `(parent, key)` pair turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Info,
    Paths,
    PathItem,
    Operation,
    Parameters,
    Parameter,
    Responses,
    Response,
    Headers,
    Header,
    Security,
    Properties,
    AllOf,
    Schema,
    Opaque,
}

/// The dispatch table: every "is this a Parameters block or a Responses block"
/// decision is made here
fn slot(parent: &NodeKind, key: &str) -> Slot {
    match (parent, key) {
        (NodeKind::Swagger, "info") => Slot::Info,
        (NodeKind::Swagger, "paths") => Slot::Paths,
        (NodeKind::Swagger | NodeKind::Operation, "security") => Slot::Security,
        (NodeKind::Paths, k) if k.starts_with('/') => Slot::PathItem,
        (NodeKind::PathItem(_), k) if HTTP_METHODS.contains(&k) => Slot::Operation,
        (NodeKind::PathItem(_) | NodeKind::Operation, "parameters") => Slot::Parameters,
        (NodeKind::Parameters, _) => Slot::Parameter,
        (NodeKind::Operation, "responses") => Slot::Responses,
        (NodeKind::Responses, k) if !k.starts_with("x-") => Slot::Response,
        (NodeKind::Response | NodeKind::Parameter { .. }, "schema") => Slot::Schema,
        (NodeKind::Response, "headers") => Slot::Headers,
        (NodeKind::Headers, _) => Slot::Header,
        (NodeKind::ArrayType, "items") => Slot::Schema,
        (NodeKind::ObjectType, "properties") => Slot::Properties,
        (NodeKind::ObjectType, "allOf") => Slot::AllOf,
        (NodeKind::ObjectType, "additionalProperties") => Slot::Schema,
        (NodeKind::Properties | NodeKind::AllOf, _) => Slot::Schema,
        _ => Slot::Opaque,
    }
}

fn shape_error(kind: &str, expected: &str, path: &str) -> ValidationError {
    ValidationError::new(
        ErrorKind::SchemaTypeMismatch,
        format!("{} expects a JSON {}", kind, expected),
        "NodeFactory::build",
    )
    .at(path)
}

fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", path, key)
    }
}

/// Builds typed nodes from a prepared (reference-normalized) JSON tree
///
/// References are looked up in `registry`; a tree must only be built once the
/// registry holds every reference it mentions.
pub struct NodeFactory<'a> {
    registry: &'a ReferenceRegistry,
}

impl<'a> NodeFactory<'a> {
    pub fn new(registry: &'a ReferenceRegistry) -> Self {
        NodeFactory { registry }
    }

    /// Build the `Swagger` root node
    pub fn build_root(&self, raw: &Value) -> Result<SchemaNode> {
        self.container(NodeKind::Swagger, raw, "")
    }

    /// Build the child stored under `key` of a `parent` node
    pub fn build(&self, parent: &NodeKind, key: &str, raw: &Value, path: &str) -> Result<Property> {
        let slot = slot(parent, key);
        match slot {
            Slot::Opaque => return Ok(Property::Json(self.localize(raw)?)),
            Slot::Schema => {
                if key == "additionalProperties" && !raw.is_object() {
                    return Ok(Property::Json(raw.clone()));
                }
                return self.build_schema(raw, path);
            }
            _ => {}
        }

        let raw = self.inline(raw, path)?;
        let node = match slot {
            Slot::Info => self.container(NodeKind::Info, &raw, path)?,
            Slot::Paths => self.container(NodeKind::Paths, &raw, path)?,
            Slot::PathItem => {
                let template = PathTemplate::compile(key).map_err(|e| {
                    ValidationError::undecodable(
                        format!("Cannot compile path template {}: {}", key, e),
                        "NodeFactory::build",
                    )
                    .at(path)
                })?;
                debug!(
                    target: "swagger_validator::decode",
                    template = %key,
                    params = ?template.params,
                    "decoded path item"
                );
                self.container(NodeKind::PathItem(template), &raw, path)?
            }
            Slot::Operation => self.container(NodeKind::Operation, &raw, path)?,
            Slot::Parameters => self.list(NodeKind::Parameters, &raw, path)?,
            Slot::Parameter => self.parameter(&raw, path)?,
            Slot::Responses => self.container(NodeKind::Responses, &raw, path)?,
            Slot::Response => self.container(NodeKind::Response, &raw, path)?,
            Slot::Headers => self.container(NodeKind::Headers, &raw, path)?,
            Slot::Header => self.header(&raw, path)?,
            Slot::Security => self.list(NodeKind::Security, &raw, path)?,
            Slot::Properties => self.container(NodeKind::Properties, &raw, path)?,
            Slot::AllOf => self.list(NodeKind::AllOf, &raw, path)?,
            Slot::Schema | Slot::Opaque => return Ok(Property::Json(raw.into_owned())),
        };
        Ok(Property::Node(node))
    }

    /// Build a schema-valued node, dispatching on `$ref` and `type`
    ///
    /// A schema with an unrecognised `type` is kept as opaque JSON.
    pub fn build_schema(&self, raw: &Value, path: &str) -> Result<Property> {
        Ok(match self.data_type(raw, path)? {
            Some(node) => Property::Node(node),
            None => Property::Json(self.localize(raw)?),
        })
    }

    fn data_type(&self, raw: &Value, path: &str) -> Result<Option<SchemaNode>> {
        let obj = raw.as_object().ok_or_else(|| shape_error("Schema", "object", path))?;

        if let Some(target) = obj.get(REFERENCE_KEY) {
            let target = target.as_str().ok_or_else(|| {
                ValidationError::malformed(format!("{} must be a string", REFERENCE_KEY), "NodeFactory::build")
                    .at(path)
            })?;
            return Ok(Some(SchemaNode::reference(self.resolve_id(target, path)?)));
        }

        let kind = match obj.get("type") {
            None => NodeKind::ObjectType,
            Some(Value::String(declared)) => match declared.as_str() {
                "string" => NodeKind::StringType {
                    pattern: compile_pattern(obj.get("pattern"), path)?,
                },
                "number" => NodeKind::NumberType,
                "integer" => NodeKind::IntegerType,
                "boolean" => NodeKind::BooleanType,
                "array" => NodeKind::ArrayType,
                "object" => NodeKind::ObjectType,
                "file" => NodeKind::FileType,
                _ => return Ok(None),
            },
            Some(_) => return Ok(None),
        };

        self.container(kind, raw, path).map(Some)
    }

    fn container(&self, kind: NodeKind, raw: &Value, path: &str) -> Result<SchemaNode> {
        let obj = raw.as_object().ok_or_else(|| shape_error(kind.name(), "object", path))?;

        let mut props = PropertyBag::new();
        for (key, value) in obj {
            let child = self.build(&kind, key, value, &child_path(path, key))?;
            props.set(key.clone(), child);
        }
        Ok(SchemaNode::new(kind, props, false))
    }

    fn list(&self, kind: NodeKind, raw: &Value, path: &str) -> Result<SchemaNode> {
        let items = raw.as_array().ok_or_else(|| shape_error(kind.name(), "array", path))?;

        let mut props = PropertyBag::new();
        for (index, value) in items.iter().enumerate() {
            let key = index.to_string();
            let child = self.build(&kind, &key, value, &child_path(path, &key))?;
            props.set(key, child);
        }
        Ok(SchemaNode::new(kind, props, true))
    }

    fn parameter(&self, raw: &Value, path: &str) -> Result<SchemaNode> {
        let obj = raw.as_object().ok_or_else(|| shape_error("Parameter", "object", path))?;
        let is_body = obj.get("in").and_then(Value::as_str) == Some("body");
        let parent = NodeKind::Parameter { item: None };

        let mut props = PropertyBag::new();
        for (key, value) in obj {
            let child = match slot(&parent, key) {
                Slot::Schema if is_body => self.build_schema(value, &child_path(path, key))?,
                _ => Property::Json(self.localize(value)?),
            };
            props.set(key.clone(), child);
        }

        let item = if is_body {
            None
        } else {
            self.data_type(raw, path)?.map(Box::new)
        };
        Ok(SchemaNode::new(NodeKind::Parameter { item }, props, false))
    }

    fn header(&self, raw: &Value, path: &str) -> Result<SchemaNode> {
        let obj = raw.as_object().ok_or_else(|| shape_error("Header", "object", path))?;
        let item = self.data_type(raw, path)?.ok_or_else(|| {
            ValidationError::new(
                ErrorKind::SchemaTypeMismatch,
                "Header declares an unsupported type",
                "NodeFactory::build",
            )
            .at(path)
        })?;

        let mut props = PropertyBag::new();
        for (key, value) in obj {
            props.set(key.clone(), Property::Json(self.localize(value)?));
        }
        Ok(SchemaNode::new(NodeKind::Header { item: Box::new(item) }, props, false))
    }

    /// Replace a pure `$ref` node by the definition it points at
    fn inline<'v>(&self, raw: &'v Value, path: &str) -> Result<Cow<'v, Value>> {
        let mut current = Cow::Borrowed(raw);
        let mut seen: Vec<String> = Vec::new();

        loop {
            let Some(target) = current
                .as_object()
                .and_then(|o| o.get(REFERENCE_KEY))
                .and_then(Value::as_str)
            else {
                return Ok(current);
            };

            let id = self.resolve_id(target, path)?;
            if seen.contains(&id) {
                return Err(ValidationError::malformed(
                    format!("Reference {} only refers back to itself", target),
                    "NodeFactory::inline",
                )
                .at(path));
            }
            let definition = self.definition(&id, path)?;
            debug!(
                target: "swagger_validator::replace_ref",
                path = %path,
                id = %id,
                "inlined reference"
            );
            seen.push(id);
            current = Cow::Owned(definition.clone());
        }
    }

    /// Copy of `raw` with every reference in local-pool form
    fn localize(&self, raw: &Value) -> Result<Value> {
        let mut value = raw.clone();
        visit_references(&mut value, &mut |target| {
            Ok(local_ref(&self.resolve_id(target, "")?))
        })?;
        Ok(value)
    }

    fn resolve_id(&self, target: &str, path: &str) -> Result<String> {
        if let Some(id) = local_id(target) {
            if self.registry.reference(id).is_some() {
                return Ok(id.to_string());
            }
        }
        self.registry.id_for(target).map(str::to_string).ok_or_else(|| {
            ValidationError::not_found(format!("Unregistered reference {}", target), "NodeFactory::resolve")
                .at(path)
        })
    }

    fn definition(&self, id: &str, path: &str) -> Result<&'a Value> {
        self.registry.definition(id).ok_or_else(|| {
            ValidationError::not_found(format!("Definition {} is not populated", id), "NodeFactory::resolve")
                .at(path)
        })
    }
}

fn compile_pattern(pattern: Option<&Value>, path: &str) -> Result<Option<Regex>> {
    match pattern.and_then(Value::as_str) {
        None => Ok(None),
        Some(source) => Regex::new(source).map(Some).map_err(|e| {
            ValidationError::undecodable(
                format!("Cannot compile pattern {}: {}", source, e),
                "NodeFactory::build",
            )
            .at(path)
        }),
    }
}
