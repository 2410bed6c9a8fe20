//! relq protocol types.
//!
//! This crate defines the vocabulary shared by the request layer, the
//! planner and the executor.
//!
//! # Modules
//!
//! - [`value`] - Scalar values used in predicates and rows
//! - [`filter`] - Ordered equality predicates
//! - [`include`] - Nested include specifications
//! - [`request`] - Graph requests and raw parameter decoding
//! - [`result`] - Flat rows and materialized result trees
//! - [`error`] - Protocol error types
//!
//! # Serialization
//!
//! Request types round-trip through JSON with `serde`, preserving the key
//! order of filter and include objects. Flat values and rows also derive
//! `rkyv` archives for storage:
//!
//! ```ignore
//! use relq_proto::Row;
//!
//! let row = Row::new().with("id", 1i64).with("username", "alice");
//! let bytes = row.to_bytes()?;
//! assert_eq!(Row::from_bytes(&bytes)?, row);
//! ```

pub mod error;
pub mod filter;
pub mod include;
pub mod request;
pub mod result;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use filter::{FieldFilters, Predicate};
pub use include::{IncludeNode, IncludeSpec};
pub use request::{GraphRequest, RequestParams};
pub use result::{FieldValue, QueryResult, Related, ResultRow, Row};
pub use value::Value;
