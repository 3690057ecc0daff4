//! Example request/response models generated from a contract.
//!
//! The model is derived from the schema tree alone. No exchange is involved.
//! Its shape is `path -> method -> {parameters, responses, consumes, produces}`:
//!
//! ```json
//! {
//!   "/pets": {
//!     "post": {
//!       "parameters": { "query": { "dryRun": true }, "body": { "name": "..." } },
//!       "responses": { "201": { "headers": { "Location": "..." }, "schema": { "id": 0 } } },
//!       "consumes": ["application/json"]
//!     }
//!   }
//! }
//! ```
//!
//! Any container whose content would be empty is left out.

use crate::schema::format::string_format_example;
use crate::schema::{NodeKind, SchemaNode, SwaggerTree};
use crate::validator::merge_parameters;
use serde_json::{Map, Number, Value};
use tracing::{debug, info};

/// Default cap on `$ref` hops while generating one example
pub const DEFAULT_MODEL_DEPTH: usize = 8;

/// Builds the example model of a [`SwaggerTree`]
#[derive(Debug, Clone, Copy)]
pub struct ModelBuilder<'a> {
    tree: &'a SwaggerTree,
    max_depth: usize,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(tree: &'a SwaggerTree) -> Self {
        ModelBuilder {
            tree,
            max_depth: DEFAULT_MODEL_DEPTH,
        }
    }

    /// How many `$ref` hops one example may follow before it stops at `null`
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn build(&self) -> Value {
        let root = self.tree.root();
        let mut model = Map::new();

        let Some(paths) = root.child("paths") else {
            return Value::Object(model);
        };

        for (template, item) in paths.children() {
            if !matches!(item.kind(), NodeKind::PathItem(_)) {
                continue;
            }
            let mut methods = Map::new();
            for (method, operation) in item.children() {
                if !matches!(operation.kind(), NodeKind::Operation) {
                    continue;
                }
                debug!(
                    target: "swagger_validator::model",
                    path = template,
                    method,
                    "building operation model"
                );
                methods.insert(method.to_string(), self.operation(root, item, operation));
            }
            model.insert(template.to_string(), Value::Object(methods));
        }

        info!(
            target: "swagger_validator::model",
            location = self.tree.location(),
            paths = model.len(),
            "model built"
        );
        Value::Object(model)
    }

    fn operation(&self, root: &SchemaNode, item: &SchemaNode, operation: &SchemaNode) -> Value {
        let mut model = Map::new();

        let params = merge_parameters(item.child("parameters"), operation.child("parameters"));
        insert_non_empty(&mut model, "parameters", self.parameters(&params));
        if let Some(responses) = operation.child("responses") {
            insert_non_empty(&mut model, "responses", self.responses(responses));
        }
        for key in ["consumes", "produces"] {
            let declared = operation.json(key).or_else(|| root.json(key)).cloned();
            if let Some(declared) = declared {
                insert_non_empty(&mut model, key, declared);
            }
        }
        Value::Object(model)
    }

    fn parameters(&self, params: &[&SchemaNode]) -> Value {
        let mut by_location = Map::new();

        for param in params {
            let (Some(name), Some(location)) = (param.str_value("name"), param.str_value("in")) else {
                continue;
            };
            match param.kind() {
                NodeKind::Parameter { item: None } => {
                    let example = param
                        .child("schema")
                        .map(|schema| self.example(schema, 0))
                        .unwrap_or(Value::Null);
                    insert_non_empty(&mut by_location, location, example);
                }
                NodeKind::Parameter { item: Some(item) } => {
                    let example = self.example(item, 0);
                    if let Value::Object(names) = by_location
                        .entry(location.to_string())
                        .or_insert_with(|| Value::Object(Map::new()))
                    {
                        names.insert(name.to_string(), example);
                    }
                }
                _ => {}
            }
        }
        Value::Object(by_location)
    }

    fn responses(&self, responses: &SchemaNode) -> Value {
        let mut by_status = Map::new();

        for (status, response) in responses.children() {
            if !matches!(response.kind(), NodeKind::Response) {
                continue;
            }
            let mut model = Map::new();

            if let Some(headers) = response.child("headers") {
                let mut examples = Map::new();
                for (name, header) in headers.children() {
                    if let NodeKind::Header { item } = header.kind() {
                        examples.insert(name.to_string(), self.example(item, 0));
                    }
                }
                insert_non_empty(&mut model, "headers", Value::Object(examples));
            }
            if let Some(schema) = response.child("schema") {
                insert_non_empty(&mut model, "schema", self.example(schema, 0));
            }
            insert_non_empty(&mut by_status, status, Value::Object(model));
        }
        Value::Object(by_status)
    }

    /// Representative value for one schema node
    ///
    /// `example`, then `default`, then the first `enum` entry, then a value
    /// derived from the type.
    pub fn example(&self, node: &SchemaNode, depth: usize) -> Value {
        if let NodeKind::Reference { id } = node.kind() {
            if depth >= self.max_depth {
                debug!(target: "swagger_validator::model", id = %id, depth, "reference depth reached");
                return Value::Null;
            }
            return match self.tree.definition(id) {
                Some(target) => self.example(target, depth + 1),
                None => Value::Null,
            };
        }

        if let Some(given) = node.json("example").or_else(|| node.json("default")) {
            return given.clone();
        }
        if let Some(first) = node.json("enum").and_then(Value::as_array).and_then(|e| e.first()) {
            return first.clone();
        }

        match node.kind() {
            NodeKind::StringType { .. } => string_example(node),
            NodeKind::IntegerType => Value::from(integer_example(node)),
            NodeKind::NumberType => Number::from_f64(number_example(node))
                .map(Value::Number)
                .unwrap_or(Value::Null),
            NodeKind::BooleanType => Value::Bool(true),
            NodeKind::FileType => string_format_example("binary").unwrap_or(Value::Null),
            NodeKind::ArrayType => match node.child("items") {
                Some(items) => Value::Array(vec![self.example(items, depth)]),
                None => Value::Array(Vec::new()),
            },
            NodeKind::ObjectType => self.object_example(node, depth),
            _ => Value::Null,
        }
    }

    fn object_example(&self, node: &SchemaNode, depth: usize) -> Value {
        let mut fields = Map::new();

        if let Some(all_of) = node.child("allOf") {
            for (_, member) in all_of.children() {
                if let Value::Object(member) = self.example(member, depth) {
                    fields.extend(member);
                }
            }
        }
        if let Some(properties) = node.child("properties") {
            for (name, schema) in properties.children() {
                fields.insert(name.to_string(), self.example(schema, depth));
            }
        }
        if fields.is_empty() {
            if let Some(additional) = node.child("additionalProperties") {
                fields.insert("key".to_string(), self.example(additional, depth));
            }
        }
        Value::Object(fields)
    }
}

fn insert_non_empty(map: &mut Map<String, Value>, key: &str, value: Value) {
    let empty = match &value {
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Null => true,
        _ => false,
    };
    if !empty {
        map.insert(key.to_string(), value);
    }
}

fn string_example(node: &SchemaNode) -> Value {
    let format = node.str_value("format").unwrap_or("string");
    let Some(Value::String(mut text)) = string_format_example(format).or_else(|| string_format_example("string"))
    else {
        return Value::Null;
    };

    if let Some(max) = node.u64_value("maxLength").and_then(|m| usize::try_from(m).ok()) {
        text = text.chars().take(max).collect();
    }
    if let Some(min) = node.u64_value("minLength").and_then(|m| usize::try_from(m).ok()) {
        let len = text.chars().count();
        if len < min {
            text.extend(std::iter::repeat('a').take(min - len));
        }
    }
    Value::String(text)
}

fn integer_example(node: &SchemaNode) -> i64 {
    let mut value = 0_i64;
    if let Some(min) = node.f64_value("minimum") {
        let low = if node.bool_value("exclusiveMinimum") {
            min.floor() as i64 + 1
        } else {
            min.ceil() as i64
        };
        value = value.max(low);
    }
    if let Some(max) = node.f64_value("maximum") {
        let high = if node.bool_value("exclusiveMaximum") {
            max.ceil() as i64 - 1
        } else {
            max.floor() as i64
        };
        value = value.min(high);
    }
    value
}

fn number_example(node: &SchemaNode) -> f64 {
    let mut value = 0.0_f64;
    if let Some(min) = node.f64_value("minimum") {
        let low = if node.bool_value("exclusiveMinimum") { min + 1.0 } else { min };
        value = value.max(low);
    }
    if let Some(max) = node.f64_value("maximum") {
        let high = if node.bool_value("exclusiveMaximum") { max - 1.0 } else { max };
        value = value.min(high);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(doc: Value) -> SwaggerTree {
        SwaggerTree::from_value("/srv/model.json", doc).unwrap()
    }

    fn users() -> Value {
        json!({
            "swagger": "2.0",
            "info": { "title": "Users", "version": "1.0" },
            "consumes": ["application/json"],
            "paths": {
                "/users": {
                    "post": {
                        "parameters": [
                            { "name": "dryRun", "in": "query", "type": "boolean" },
                            { "name": "user", "in": "body", "required": true, "schema": { "$ref": "#/definitions/User" } }
                        ],
                        "responses": {
                            "201": {
                                "description": "created",
                                "headers": { "Location": { "type": "string", "format": "uri" } },
                                "schema": { "$ref": "#/definitions/User" }
                            },
                            "204": { "description": "nothing" }
                        }
                    }
                }
            },
            "definitions": {
                "User": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {
                        "name": { "type": "string" },
                        "age": { "type": "integer", "minimum": 18, "maximum": 130 },
                        "role": { "type": "string", "enum": ["admin", "user"] }
                    }
                }
            }
        })
    }

    #[test]
    fn test_body_property_gets_string_example() {
        let model = tree(users()).model();
        let name = &model["/users"]["post"]["parameters"]["body"]["name"];
        assert!(name.as_str().is_some_and(|s| !s.is_empty()));
        assert_eq!(model["/users"]["post"]["parameters"]["query"]["dryRun"], json!(true));
    }

    #[test]
    fn test_constraints_and_enum_shape_examples() {
        let model = tree(users()).model();
        let body = &model["/users"]["post"]["parameters"]["body"];
        assert_eq!(body["age"], json!(18));
        assert_eq!(body["role"], json!("admin"));
    }

    #[test]
    fn test_responses_and_defaults() {
        let model = tree(users()).model();
        let op = &model["/users"]["post"];
        assert_eq!(
            op["responses"]["201"]["headers"]["Location"],
            json!("http://localhost/path/script?query#fragment")
        );
        assert!(op["responses"]["201"]["schema"]["name"].is_string());
        // a response with nothing to show is left out
        assert!(op["responses"].get("204").is_none());
        assert_eq!(op["consumes"], json!(["application/json"]));
        assert!(op.get("produces").is_none());
    }

    #[test]
    fn test_cyclic_definitions_stop_at_depth() {
        let doc = json!({
            "swagger": "2.0",
            "info": { "title": "Tree", "version": "1.0" },
            "paths": {
                "/nodes": {
                    "get": {
                        "responses": { "200": { "description": "ok", "schema": { "$ref": "#/definitions/Node" } } }
                    }
                }
            },
            "definitions": {
                "Node": {
                    "type": "object",
                    "properties": { "child": { "$ref": "#/definitions/Node" } }
                }
            }
        });
        let tree = tree(doc);
        let model = ModelBuilder::new(&tree).with_max_depth(2).build();
        let schema = &model["/nodes"]["get"]["responses"]["200"]["schema"];
        assert!(schema["child"].is_object());
        assert!(schema["child"]["child"].is_null());
    }

    #[test]
    fn test_string_length_bounds() {
        let doc = json!({
            "swagger": "2.0",
            "info": { "title": "Codes", "version": "1.0" },
            "paths": {
                "/codes/{code}": {
                    "get": {
                        "parameters": [
                            { "name": "code", "in": "path", "required": true, "type": "string", "maxLength": 3 }
                        ],
                        "responses": { "200": { "description": "ok" } }
                    }
                }
            }
        });
        let model = tree(doc).model();
        let code = model["/codes/{code}"]["get"]["parameters"]["path"]["code"].as_str().unwrap();
        assert_eq!(code.chars().count(), 3);
    }

    #[test]
    fn test_unresolvable_examples_are_omitted() {
        let doc = json!({
            "swagger": "2.0",
            "info": { "title": "Loop", "version": "1.0" },
            "paths": {
                "/a": {
                    "post": {
                        "parameters": [
                            { "name": "a", "in": "body", "schema": { "$ref": "#/definitions/A" } }
                        ],
                        "responses": { "200": { "description": "ok", "schema": { "$ref": "#/definitions/B" } } }
                    }
                }
            },
            "definitions": {
                "A": { "$ref": "#/definitions/B" },
                "B": { "$ref": "#/definitions/A" }
            }
        });
        let model = tree(doc).model();
        let op = model["/a"]["post"].as_object().unwrap();
        assert!(op.get("parameters").is_none());
        assert!(op.get("responses").is_none());
    }
}
