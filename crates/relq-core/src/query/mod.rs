//! Query engine.
//!
//! This module turns a [`GraphRequest`](relq_proto::GraphRequest) into a
//! validated [`QueryPlan`] and executes it against a data source:
//!
//! - [`flatten`] walks the include tree into ordered relationship paths
//! - [`QueryPlanner`] validates paths and fields and builds the plan
//! - [`PlanExecutor`] materializes the plan into a result tree

mod executor;
mod flatten;
mod join;
mod path;
mod plan;
mod planner;

pub use executor::{CancelFlag, ExecutionContext, PlanExecutor};
pub use flatten::{flatten, flatten_with_prefix, FlatPath, FlattenedIncludes};
pub use join::{match_children, JoinKey, JoinStrategy, JoinThreshold};
pub use path::{PathId, RelationPath};
pub use plan::{
    JoinFilterDirective, JoinStep, LoadDirective, LoadStrategy, Projection, QueryPlan,
};
pub use planner::{
    FanoutBudget, QueryPlanner, DEFAULT_MAX_DEPTH, DEFAULT_MAX_ENTITIES, DEFAULT_MAX_RELATED,
};
