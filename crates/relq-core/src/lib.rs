//! relq core - entity graph catalog, include planning and plan execution.
//!
//! This crate validates graph requests against a registry of entity
//! metadata, compiles them into query plans and executes those plans
//! against a pluggable data source.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod catalog;
pub mod error;
pub mod query;
pub mod source;

pub use catalog::{
    Cardinality, EntityDef, EntityRegistry, FieldDef, ForeignKey, RelationDef, ScalarType,
    SchemaBundle,
};
pub use error::{Error, ValidationError};
pub use query::{
    flatten, CancelFlag, ExecutionContext, FanoutBudget, JoinThreshold, LoadStrategy,
    PlanExecutor, QueryPlan, QueryPlanner,
};
pub use source::{DataSource, MemorySource, SledConfig, SledSource, SourceError};

/// Re-export protocol types.
pub use relq_proto as proto;
