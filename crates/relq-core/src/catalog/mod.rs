//! Entity graph catalog.
//!
//! The catalog holds the metadata the planner validates requests against:
//! entities, their scalar fields and primary key, and named relationships.

mod entity;
mod field;
mod registry;
mod relation;
mod schema;
mod types;

pub use entity::EntityDef;
pub use field::{FieldDef, ForeignKey};
pub use registry::{global, install_global, EntityRegistry};
pub use relation::{Cardinality, RelationDef};
pub use schema::SchemaBundle;
pub use types::ScalarType;
