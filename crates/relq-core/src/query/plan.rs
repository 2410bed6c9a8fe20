//! Query plan types.
//!
//! A [`QueryPlan`] is the validated, fully resolved form of a request. It is
//! built once by the [`QueryPlanner`](super::QueryPlanner) and consumed once
//! by the [`PlanExecutor`](super::PlanExecutor).

use std::fmt::Write as _;

use relq_proto::{FieldFilters, Row};

use crate::catalog::{Cardinality, RelationDef};

use super::path::{PathId, RelationPath};
use super::planner::FanoutBudget;

/// How a relationship's rows are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Fetch the single related row per parent alongside the parent level.
    Joined,
    /// Fetch all related rows for a batch of parents in one `IN` lookup.
    SelectIn,
}

impl LoadStrategy {
    /// Choose the strategy for a relationship.
    ///
    /// Many-to-one relationships cannot multiply parent rows and load
    /// joined; collections load with a separate batched lookup so sibling
    /// collections never form a cartesian product.
    pub fn for_relation(relation: &RelationDef) -> Self {
        match relation.cardinality {
            Cardinality::ManyToOne => LoadStrategy::Joined,
            Cardinality::OneToMany => LoadStrategy::SelectIn,
        }
    }

    fn label(self) -> &'static str {
        match self {
            LoadStrategy::Joined => "joined",
            LoadStrategy::SelectIn => "select-in",
        }
    }
}

/// Fields kept on rows at one level of the result tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Every stored field.
    All,
    /// An explicit projection.
    Fields {
        /// Fields the caller asked for, in order.
        requested: Vec<String>,
        /// `requested` followed by any linking keys it omitted.
        effective: Vec<String>,
    },
}

impl Projection {
    /// Build a projection from the requested fields plus keys that must be kept.
    ///
    /// An empty request means all fields.
    pub fn new<I, S>(requested: &[String], retained: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if requested.is_empty() {
            return Projection::All;
        }
        let mut effective = requested.to_vec();
        for key in retained {
            let key = key.as_ref();
            if !effective.iter().any(|f| f == key) {
                effective.push(key.to_string());
            }
        }
        Projection::Fields {
            requested: requested.to_vec(),
            effective,
        }
    }

    /// Check if every field is kept.
    pub fn is_all(&self) -> bool {
        matches!(self, Projection::All)
    }

    /// Fields the caller asked for (empty for [`Projection::All`]).
    pub fn requested(&self) -> &[String] {
        match self {
            Projection::All => &[],
            Projection::Fields { requested, .. } => requested,
        }
    }

    /// Fields actually kept, `None` for all.
    pub fn effective(&self) -> Option<&[String]> {
        match self {
            Projection::All => None,
            Projection::Fields { effective, .. } => Some(effective),
        }
    }

    /// Apply the projection to a row.
    pub fn apply(&self, row: &Row) -> Row {
        match self {
            Projection::All => row.clone(),
            Projection::Fields { effective, .. } => row.project(effective),
        }
    }
}

impl std::fmt::Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Projection::All => f.write_str("*"),
            Projection::Fields { effective, .. } => f.write_str(&effective.join(", ")),
        }
    }
}

/// Eager-load one relationship path and, recursively, its nested paths.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadDirective {
    /// Id of the loaded path.
    pub path_id: PathId,
    /// Dotted path from the root.
    pub path: RelationPath,
    /// Relationship traversed from the parent level.
    pub relation: RelationDef,
    /// Primary key of the target entity.
    pub primary_key: String,
    /// Fetch strategy.
    pub strategy: LoadStrategy,
    /// Fields kept on loaded rows.
    pub projection: Projection,
    /// Nested loads below this path, in path order.
    pub children: Vec<LoadDirective>,
}

impl LoadDirective {
    /// Entity reached by this path.
    pub fn target_entity(&self) -> &str {
        &self.relation.to_entity
    }

    /// Number of directives in this subtree, including this one.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(LoadDirective::count).sum::<usize>()
    }

    /// Find a directive in this subtree by id.
    pub fn find(&self, id: PathId) -> Option<&LoadDirective> {
        if self.path_id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

/// One hop of a join-filter traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinStep {
    /// Path reached after this hop.
    pub path_id: PathId,
    /// Relationship traversed.
    pub relation: RelationDef,
}

/// Keep only roots that reach at least one row at `path` matching `predicates`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinFilterDirective {
    /// Id of the filtered path.
    pub path_id: PathId,
    /// Dotted path from the root.
    pub path: RelationPath,
    /// Hops from the root to the filtered entity.
    pub steps: Vec<JoinStep>,
    /// Predicates on the filtered entity.
    pub predicates: FieldFilters,
}

impl JoinFilterDirective {
    /// Entity the predicates apply to.
    pub fn target_entity(&self) -> &str {
        self.steps
            .last()
            .map(|s| s.relation.to_entity.as_str())
            .unwrap_or_default()
    }
}

/// A validated execution plan.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Root entity type.
    pub root_entity: String,
    /// Primary key of the root entity.
    pub primary_key: String,
    /// Equality predicates on root rows, in request order.
    pub root_filters: FieldFilters,
    /// Fields kept on root rows.
    pub root_projection: Projection,
    /// Eager loads, one per top-level path, in path order.
    pub loads: Vec<LoadDirective>,
    /// Join filters, one per filtered path, in path order.
    pub join_filters: Vec<JoinFilterDirective>,
    /// Budget the executor enforces.
    pub budget: FanoutBudget,
}

impl QueryPlan {
    /// Total number of load directives, nested ones included.
    pub fn load_count(&self) -> usize {
        self.loads.iter().map(LoadDirective::count).sum()
    }

    /// Find a load directive by dotted path.
    pub fn find_load(&self, dotted: &str) -> Option<&LoadDirective> {
        fn walk<'a>(loads: &'a [LoadDirective], dotted: &str) -> Option<&'a LoadDirective> {
            loads.iter().find_map(|l| {
                if l.path.to_string() == dotted {
                    Some(l)
                } else {
                    walk(&l.children, dotted)
                }
            })
        }
        walk(&self.loads, dotted)
    }

    /// Find a join filter by dotted path.
    pub fn find_join_filter(&self, dotted: &str) -> Option<&JoinFilterDirective> {
        self.join_filters
            .iter()
            .find(|j| j.path.to_string() == dotted)
    }

    /// Render the plan as an indented tree.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "query {} [{}]", self.root_entity, self.root_projection);
        if !self.root_filters.is_empty() {
            let _ = write!(out, " where {}", predicates(&self.root_filters));
        }
        out.push('\n');

        for load in &self.loads {
            explain_load(&mut out, load, 1);
        }
        for filter in &self.join_filters {
            let _ = writeln!(
                out,
                "  filter {} -> {} where {}",
                filter.path,
                filter.target_entity(),
                predicates(&filter.predicates)
            );
        }
        out
    }
}

fn explain_load(out: &mut String, load: &LoadDirective, depth: usize) {
    let _ = writeln!(
        out,
        "{}load {} -> {} ({}) [{}]",
        "  ".repeat(depth),
        load.path,
        load.target_entity(),
        load.strategy.label(),
        load.projection
    );
    for child in &load.children {
        explain_load(out, child, depth + 1);
    }
}

fn predicates(filters: &FieldFilters) -> String {
    filters
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" and ")
}
