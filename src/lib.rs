//! # swagger-validator
//!
//! Validates HTTP requests and responses against Swagger/OpenAPI 2.0
//! contracts, and derives example request/response models from them.
//!
//! ## Overview
//!
//! A contract is loaded once into a read-only [`SwaggerTree`]. Loading fetches
//! the root document and every document its `$ref`s point at, canonicalizes
//! each reference and flattens the targets into one local `definitions` pool.
//! The tree can then validate any number of exchanges, from any number of
//! threads, and produce an example model.
//!
//! ## Architecture
//!
//! - **[`document`]** - Fetching, decoding and caching of JSON/YAML documents
//! - **[`reference`]** - `$ref` canonicalization, extraction and the
//!   definitions registry
//! - **[`schema`]** - The typed node tree, its factory and string formats
//! - **[`context`]** - Validation options, traversal context and report
//! - **[`transport`]** - The request/response collaborator trait
//! - **[`validator`]** - The validation engine
//! - **[`model`]** - Example model generation
//! - **[`config`]** / **[`logging`]** - Environment configuration and tracing
//!   setup
//! - **[`cli`]** - The `swagger-validator` binary
//!
//! ### Load and Validate Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Host
//!     participant Tree as SwaggerTree
//!     participant Resolver
//!     participant Store as DocumentStore
//!     participant Factory as NodeFactory
//!     participant Engine as validator
//!
//!     Host->>Tree: load("petstore.yaml")
//!     Tree->>Resolver: prepare(location)
//!     Resolver->>Store: load(location)
//!     Store-->>Resolver: RawDocument
//!     Resolver->>Resolver: canonicalize and register every $ref
//!     Resolver-->>Tree: PreparedDocument
//!     Tree->>Factory: build_root(tree)
//!     Factory-->>Tree: typed SchemaNode tree
//!
//!     Host->>Tree: validate(&exchange, options)
//!     Tree->>Engine: validate(tree, transport, options)
//!     Engine-->>Host: ValidationReport
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use http::Method;
//! use swagger_validator::{Exchange, SwaggerTree, ValidationOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tree = SwaggerTree::load("contracts/petstore.json")?;
//!
//! let exchange = Exchange::request(Method::GET, "https://api.example.com/v1/pets/42?extra=1")?;
//! let report = tree.validate(&exchange, ValidationOptions::deny());
//! if !report.is_valid() {
//!     eprintln!("{}", report);
//! }
//!
//! println!("{}", serde_json::to_string_pretty(&tree.model())?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Every event goes through `tracing` under a `swagger_validator::<event>`
//! target. See [`logging`] for the targets and the subscriber used by the
//! binary.

pub mod cli;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod logging;
pub mod model;
pub mod reference;
pub mod schema;
pub mod transport;
pub mod validator;

pub use context::{Direction, ErrorPolicy, Location, ValidationMode, ValidationOptions, ValidationReport};
pub use error::{ErrorKind, Result, ValidationError};
pub use model::ModelBuilder;
pub use reference::Resolver;
pub use schema::SwaggerTree;
pub use transport::{Exchange, Transport};
