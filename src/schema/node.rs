use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};

use crate::reference::{local_ref, REFERENCE_KEY};

/// One stored property of a schema node
///
/// Keys the factory recognises become typed [`SchemaNode`]s; everything else is
/// kept verbatim so it can be re-emitted unchanged.
#[derive(Debug, Clone)]
pub enum Property {
    Json(Value),
    Node(SchemaNode),
}

impl Property {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Property::Json(value) => Some(value),
            Property::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&SchemaNode> {
        match self {
            Property::Node(node) => Some(node),
            Property::Json(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Property::Json(value) => value.clone(),
            Property::Node(node) => node.to_value(),
        }
    }
}

/// Ordered key to property mapping backing every node
#[derive(Debug, Clone, Default)]
pub struct PropertyBag(IndexMap<String, Property>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Property) -> Option<Property> {
        self.0.insert(key.into(), value)
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Remove `key`, keeping the order of the remaining keys
    pub fn remove(&mut self, key: &str) -> Option<Property> {
        self.0.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Closed set of node variants
///
/// Variants carrying data hold what is derived from the raw properties once at
/// build time (compiled regexes, the typed view of a parameter or header).
#[derive(Debug, Clone)]
pub enum NodeKind {
    Swagger,
    Info,
    Paths,
    PathItem(PathTemplate),
    Operation,
    Parameters,
    /// `item` is the typed view of a non-body parameter, `None` for `in: body`
    Parameter { item: Option<Box<SchemaNode>> },
    Responses,
    Response,
    Headers,
    Header { item: Box<SchemaNode> },
    Security,
    Properties,
    AllOf,
    StringType { pattern: Option<Regex> },
    NumberType,
    IntegerType,
    BooleanType,
    ArrayType,
    ObjectType,
    FileType,
    /// Pointer into the local definitions pool
    Reference { id: String },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Swagger => "Swagger",
            NodeKind::Info => "Info",
            NodeKind::Paths => "Paths",
            NodeKind::PathItem(_) => "PathItem",
            NodeKind::Operation => "Operation",
            NodeKind::Parameters => "Parameters",
            NodeKind::Parameter { .. } => "Parameter",
            NodeKind::Responses => "Responses",
            NodeKind::Response => "Response",
            NodeKind::Headers => "Headers",
            NodeKind::Header { .. } => "Header",
            NodeKind::Security => "Security",
            NodeKind::Properties => "Properties",
            NodeKind::AllOf => "AllOf",
            NodeKind::StringType { .. } => "StringType",
            NodeKind::NumberType => "NumberType",
            NodeKind::IntegerType => "IntegerType",
            NodeKind::BooleanType => "BooleanType",
            NodeKind::ArrayType => "ArrayType",
            NodeKind::ObjectType => "ObjectType",
            NodeKind::FileType => "FileType",
            NodeKind::Reference { .. } => "Reference",
        }
    }

    /// The `type` keyword value a data type variant stands for
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            NodeKind::StringType { .. } => Some("string"),
            NodeKind::NumberType => Some("number"),
            NodeKind::IntegerType => Some("integer"),
            NodeKind::BooleanType => Some("boolean"),
            NodeKind::ArrayType => Some("array"),
            NodeKind::ObjectType => Some("object"),
            NodeKind::FileType => Some("file"),
            _ => None,
        }
    }

    pub fn is_data_type(&self) -> bool {
        self.type_name().is_some()
    }

    /// Keys a node of this variant must carry
    pub fn mandatory_keys(&self) -> &'static [&'static str] {
        match self {
            NodeKind::Swagger => &["swagger", "info", "paths"],
            NodeKind::Info => &["title", "version"],
            NodeKind::Operation => &["responses"],
            NodeKind::Parameter { .. } => &["name", "in"],
            NodeKind::Response => &["description"],
            NodeKind::StringType { .. }
            | NodeKind::NumberType
            | NodeKind::IntegerType
            | NodeKind::BooleanType
            | NodeKind::ArrayType
            | NodeKind::FileType => &["type"],
            _ => &[],
        }
    }
}

/// A compiled path template such as `/users/{id}`
#[derive(Debug, Clone)]
pub struct PathTemplate {
    pub template: String,
    pub matcher: Regex,
    pub params: Vec<String>,
}

impl PathTemplate {
    /// Compile `template` into an anchored matcher
    ///
    /// Each `{name}` segment captures one non-empty path segment; literal
    /// segments are matched verbatim.
    pub fn compile(template: &str) -> Result<Self, regex::Error> {
        let mut pattern = String::with_capacity(template.len() + 8);
        pattern.push('^');
        let mut params = Vec::with_capacity(template.matches('{').count());

        for segment in template.split('/').filter(|s| !s.is_empty()) {
            if segment.starts_with('{') && segment.ends_with('}') {
                params.push(segment.trim_start_matches('{').trim_end_matches('}').to_string());
                pattern.push_str("/([^/]+)");
            } else {
                pattern.push('/');
                pattern.push_str(&regex::escape(segment));
            }
        }
        if params.is_empty() && pattern.len() == 1 {
            pattern.push('/');
        }
        pattern.push_str("/?$");

        Ok(PathTemplate {
            template: template.to_string(),
            matcher: Regex::new(&pattern)?,
            params,
        })
    }

    /// Captured parameter values when `path` matches
    pub fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let caps = self.matcher.captures(path)?;
        Some(
            self.params
                .iter()
                .enumerate()
                .filter_map(|(i, name)| {
                    caps.get(i + 1).map(|m| {
                        let raw = m.as_str();
                        let decoded = urlencoding::decode(raw)
                            .map(|c| c.into_owned())
                            .unwrap_or_else(|_| raw.to_string());
                        (name.clone(), decoded)
                    })
                })
                .collect(),
        )
    }

    pub fn is_literal(&self) -> bool {
        self.params.is_empty()
    }
}

/// A typed node of the contract tree
#[derive(Debug, Clone)]
pub struct SchemaNode {
    kind: NodeKind,
    props: PropertyBag,
    is_list: bool,
}

impl SchemaNode {
    pub fn new(kind: NodeKind, props: PropertyBag, is_list: bool) -> Self {
        SchemaNode {
            kind,
            props,
            is_list,
        }
    }

    pub fn reference(id: impl Into<String>) -> Self {
        let id = id.into();
        let mut props = PropertyBag::new();
        props.set(REFERENCE_KEY, Property::Json(Value::String(local_ref(&id))));
        SchemaNode::new(NodeKind::Reference { id }, props, false)
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn props(&self) -> &PropertyBag {
        &self.props
    }

    pub fn props_mut(&mut self) -> &mut PropertyBag {
        &mut self.props
    }

    /// Whether the source JSON was an array
    pub fn is_list(&self) -> bool {
        self.is_list
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.props.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.props.has(key)
    }

    /// Raw JSON stored under `key`, `None` when absent or typed
    pub fn json(&self, key: &str) -> Option<&Value> {
        self.props.get(key).and_then(Property::as_json)
    }

    /// Typed child stored under `key`
    pub fn child(&self, key: &str) -> Option<&SchemaNode> {
        self.props.get(key).and_then(Property::as_node)
    }

    pub fn str_value(&self, key: &str) -> Option<&str> {
        self.json(key).and_then(Value::as_str)
    }

    pub fn f64_value(&self, key: &str) -> Option<f64> {
        self.json(key).and_then(Value::as_f64)
    }

    pub fn u64_value(&self, key: &str) -> Option<u64> {
        self.json(key).and_then(Value::as_u64)
    }

    pub fn bool_value(&self, key: &str) -> bool {
        self.json(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Typed children in stored order
    pub fn children(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.props
            .iter()
            .filter_map(|(k, p)| p.as_node().map(|n| (k, n)))
    }

    /// Mandatory keys of this node's variant that are absent
    pub fn missing_keys(&self) -> Vec<&'static str> {
        self.kind
            .mandatory_keys()
            .iter()
            .copied()
            .filter(|k| !self.props.has(k))
            .collect()
    }

    /// Re-emit the node as JSON, preserving the array/object shape it came from
    pub fn to_value(&self) -> Value {
        if self.is_list {
            Value::Array(self.props.iter().map(|(_, p)| p.to_value()).collect())
        } else {
            let map: Map<String, Value> = self
                .props
                .iter()
                .map(|(k, p)| (k.to_string(), p.to_value()))
                .collect();
            Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_template_matches_and_captures() {
        let t = PathTemplate::compile("/users/{id}/posts/{post_id}").unwrap();
        assert_eq!(t.params, vec!["id", "post_id"]);
        let caps = t.captures("/users/42/posts/hello%20world").unwrap();
        assert_eq!(caps[0], ("id".to_string(), "42".to_string()));
        assert_eq!(caps[1], ("post_id".to_string(), "hello world".to_string()));
        assert!(t.captures("/users/42").is_none());
        assert!(t.captures("/users//posts/1").is_none());
    }

    #[test]
    fn test_literal_segments_are_escaped() {
        let t = PathTemplate::compile("/files/report.v1").unwrap();
        assert!(t.is_literal());
        assert!(t.captures("/files/report.v1").is_some());
        assert!(t.captures("/files/reportXv1").is_none());

        let root = PathTemplate::compile("/").unwrap();
        assert!(root.captures("/").is_some());
        assert!(root.captures("/x").is_none());
    }

    #[test]
    fn test_property_bag_keeps_order_on_remove() {
        let mut bag = PropertyBag::new();
        bag.set("a", Property::Json(json!(1)));
        bag.set("b", Property::Json(json!(2)));
        bag.set("c", Property::Json(json!(3)));
        bag.remove("b");
        assert_eq!(bag.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert!(bag.has("c"));
        assert_eq!(bag.len(), 2);
    }

    #[test]
    fn test_list_nodes_serialize_as_arrays() {
        let mut props = PropertyBag::new();
        props.set("0", Property::Json(json!({"api_key": []})));
        let node = SchemaNode::new(NodeKind::Security, props, true);
        assert_eq!(node.to_value(), json!([{"api_key": []}]));

        let reference = SchemaNode::reference("Pet");
        assert_eq!(reference.to_value(), json!({"$ref": "#/definitions/Pet"}));
    }

    #[test]
    fn test_missing_mandatory_keys() {
        let mut props = PropertyBag::new();
        props.set("title", Property::Json(json!("x")));
        let info = SchemaNode::new(NodeKind::Info, props, false);
        assert_eq!(info.missing_keys(), vec!["version"]);
    }
}
