//! # Schema Tree
//!
//! The typed object model of a Swagger 2.0 contract.
//!
//! A prepared JSON document (every `$ref` already canonicalized and registered)
//! is turned into a tree of [`SchemaNode`]s by the [`NodeFactory`]. Each node
//! carries a closed [`NodeKind`] and an ordered [`PropertyBag`] mirroring its
//! source object, so the tree serializes back to equivalent JSON.
//!
//! Schema-valued `$ref`s become [`NodeKind::Reference`] nodes pointing into the
//! local definitions pool instead of live edges, which keeps the tree acyclic
//! even when the contract's schemas are recursive. Pure `$ref` parameters,
//! responses, headers and path items are inlined at build time.
//!
//! ```rust,ignore
//! use swagger_validator::schema::SwaggerTree;
//!
//! let tree = SwaggerTree::load("contracts/petstore.json")?;
//! println!("{}", serde_json::to_string_pretty(&tree.serialize())?);
//! ```

mod factory;
pub mod format;
mod node;
mod tree;

pub use factory::NodeFactory;
pub use node::{NodeKind, PathTemplate, Property, PropertyBag, SchemaNode};
pub use tree::SwaggerTree;
