//! relq - declarative include queries over an entity graph.
//!
//! A request names a root entity, equality filters, a field projection and
//! a nested include tree. The engine validates it against the registered
//! entity graph, plans eager loads and join filters, and returns each
//! matching root exactly once with its related rows attached.
//!
//! # Quick Start
//!
//! ```ignore
//! use relq::{Engine, GraphRequest, IncludeNode, MemorySource};
//!
//! let engine = Engine::from_models(MODELS_JSON, MemorySource::new())?;
//!
//! let request = GraphRequest::new("User")
//!     .filter("username", "alice")
//!     .include("posts", IncludeNode::new().with_fields(["title"]));
//!
//! for user in engine.query(&request)?.rows {
//!     println!("{}", user.to_json());
//! }
//! ```
//!
//! # Features
//!
//! - `async`: `Engine::query_async`, running queries on the tokio blocking
//!   pool under the configured timeout

mod config;
mod engine;
mod error;

pub use config::{EngineConfig, DEFAULT_QUERY_TIMEOUT, DEFAULT_QUERY_TIMEOUT_SECS};
pub use engine::Engine;
pub use error::{Error, Result};

// Re-export commonly used types
pub use relq_core::catalog::{EntityDef, EntityRegistry, FieldDef, RelationDef, ScalarType, SchemaBundle};
pub use relq_core::query::{
    CancelFlag, ExecutionContext, FanoutBudget, JoinThreshold, QueryPlan, DEFAULT_MAX_DEPTH,
    DEFAULT_MAX_ENTITIES, DEFAULT_MAX_RELATED,
};
pub use relq_core::source::{DataSource, MemorySource, SledConfig, SledSource, SourceError};
pub use relq_core::ValidationError;
pub use relq_proto::{
    FieldFilters, GraphRequest, IncludeNode, IncludeSpec, QueryResult, Related, RequestParams,
    ResultRow, Row, Value,
};

/// Re-export protocol types.
pub use relq_proto as proto;
