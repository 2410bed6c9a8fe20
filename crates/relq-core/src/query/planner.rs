//! Query planner for turning graph requests into execution plans.
//!
//! The planner resolves every include path against the entity registry,
//! validates filter and projection fields, and produces a [`QueryPlan`]
//! with a load tree, join filters and a fanout budget. It performs no I/O.

use relq_proto::{FieldFilters, GraphRequest, IncludeSpec};
use tracing::{debug, trace};

use crate::catalog::{EntityDef, EntityRegistry, RelationDef};
use crate::error::{Error, ValidationError};

use super::flatten::{flatten, FlatPath, FlattenedIncludes};
use super::path::PathId;
use super::plan::{
    JoinFilterDirective, JoinStep, LoadDirective, LoadStrategy, Projection, QueryPlan,
};

/// Default maximum number of root rows.
pub const DEFAULT_MAX_ENTITIES: usize = 10_000;

/// Default maximum number of related rows loaded by one query.
pub const DEFAULT_MAX_RELATED: usize = 50_000;

/// Default maximum include depth.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Budget limits for query execution to prevent runaway queries.
///
/// The default budget rejects include paths deeper than
/// [`DEFAULT_MAX_DEPTH`] relationships with
/// [`ValidationError::DepthExceeded`]. Use [`FanoutBudget::new`] or
/// [`FanoutBudget::unlimited`] to plan deeper include trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutBudget {
    /// Maximum number of root rows.
    pub max_entities: usize,
    /// Maximum total related rows loaded across all paths.
    pub max_related: usize,
    /// Maximum depth of relation includes.
    pub max_depth: usize,
}

impl Default for FanoutBudget {
    fn default() -> Self {
        Self {
            max_entities: DEFAULT_MAX_ENTITIES,
            max_related: DEFAULT_MAX_RELATED,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl FanoutBudget {
    /// Create a budget with custom limits.
    pub fn new(max_entities: usize, max_related: usize, max_depth: usize) -> Self {
        Self {
            max_entities,
            max_related,
            max_depth,
        }
    }

    /// Create an unlimited budget (use with caution).
    pub fn unlimited() -> Self {
        Self {
            max_entities: usize::MAX,
            max_related: usize::MAX,
            max_depth: usize::MAX,
        }
    }
}

/// Resolution of one flattened path.
struct Resolved<'r> {
    relation: &'r RelationDef,
    target: &'r EntityDef,
}

/// Planner that transforms graph requests into query plans.
pub struct QueryPlanner<'a> {
    registry: &'a EntityRegistry,
    budget: FanoutBudget,
}

impl<'a> QueryPlanner<'a> {
    /// Create a new planner with a registry reference.
    pub fn new(registry: &'a EntityRegistry) -> Self {
        Self {
            registry,
            budget: FanoutBudget::default(),
        }
    }

    /// Set the fanout budget attached to produced plans.
    pub fn with_budget(mut self, budget: FanoutBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Plan a graph request.
    pub fn plan(&self, request: &GraphRequest) -> Result<QueryPlan, Error> {
        self.build(
            &request.entity,
            &request.filters,
            &request.fields,
            &request.include,
        )
    }

    /// Build a plan from its parts.
    ///
    /// Validation stops at the first unknown entity, relationship or field.
    pub fn build(
        &self,
        entity: &str,
        filters: &FieldFilters,
        fields: &[String],
        include: &IncludeSpec,
    ) -> Result<QueryPlan, Error> {
        let root = self.registry.resolve(entity).map_err(Error::at_root)?;
        check_fields(root, filters.fields()).map_err(Error::at_root)?;
        check_fields(root, fields.iter().map(String::as_str)).map_err(Error::at_root)?;

        let flat = flatten(include);
        debug!(entity, paths = flat.len(), "flattened include spec");

        let resolved = self.resolve_paths(root, &flat)?;

        let loads: Vec<LoadDirective> = flat
            .children_of(None)
            .map(|entry| build_load(&flat, &resolved, entry))
            .collect();

        let join_filters: Vec<JoinFilterDirective> = flat
            .entries()
            .iter()
            .filter(|entry| !entry.filters.is_empty())
            .map(|entry| build_join_filter(&flat, &resolved, entry))
            .collect();

        let retained = std::iter::once(root.primary_key.as_str())
            .chain(loads.iter().map(|l| l.relation.from_field.as_str()));
        let root_projection = Projection::new(fields, retained);

        let plan = QueryPlan {
            root_entity: root.name.clone(),
            primary_key: root.primary_key.clone(),
            root_filters: filters.clone(),
            root_projection,
            loads,
            join_filters,
            budget: self.budget.clone(),
        };

        debug!(
            entity,
            loads = plan.load_count(),
            join_filters = plan.join_filters.len(),
            "built query plan"
        );
        Ok(plan)
    }

    /// Resolve each path through its parent's target entity, in pre-order.
    fn resolve_paths(
        &self,
        root: &'a EntityDef,
        flat: &FlattenedIncludes,
    ) -> Result<Vec<Resolved<'a>>, Error> {
        let mut resolved: Vec<Resolved<'a>> = Vec::with_capacity(flat.len());

        for entry in flat.entries() {
            let location = entry.path.to_string();
            let depth = entry.path.depth();
            if depth > self.budget.max_depth {
                return Err(Error::validation(
                    location,
                    ValidationError::DepthExceeded {
                        depth,
                        max_depth: self.budget.max_depth,
                    },
                ));
            }

            // Parents precede children in pre-order.
            let source = match entry.parent {
                Some(parent) => resolved[parent.index()].target,
                None => root,
            };

            let relation = self
                .registry
                .relationship(&source.name, entry.path.last())
                .map_err(|e| Error::validation(location.clone(), e))?;
            let target = self
                .registry
                .resolve(&relation.to_entity)
                .map_err(|e| Error::validation(location.clone(), e))?;

            check_fields(target, entry.filters.fields())
                .map_err(|e| Error::validation(location.clone(), e))?;
            check_fields(target, entry.fields.iter().map(String::as_str))
                .map_err(|e| Error::validation(location.clone(), e))?;

            trace!(path = %entry.path, target = %target.name, "resolved include path");
            resolved.push(Resolved { relation, target });
        }

        Ok(resolved)
    }
}

fn check_fields<'f>(
    entity: &EntityDef,
    mut fields: impl Iterator<Item = &'f str>,
) -> Result<(), ValidationError> {
    match fields.find(|f| !entity.has_field(f)) {
        Some(field) => Err(ValidationError::UnknownField {
            entity: entity.name.clone(),
            field: field.to_string(),
        }),
        None => Ok(()),
    }
}

fn build_load(flat: &FlattenedIncludes, resolved: &[Resolved<'_>], entry: &FlatPath) -> LoadDirective {
    let Resolved { relation, target } = &resolved[entry.id.index()];

    let children: Vec<LoadDirective> = flat
        .children_of(Some(entry.id))
        .map(|child| build_load(flat, resolved, child))
        .collect();

    let retained = [target.primary_key.as_str(), relation.to_field.as_str()]
        .into_iter()
        .chain(children.iter().map(|c| c.relation.from_field.as_str()));

    LoadDirective {
        path_id: entry.id,
        path: entry.path.clone(),
        relation: (*relation).clone(),
        primary_key: target.primary_key.clone(),
        strategy: LoadStrategy::for_relation(relation),
        projection: Projection::new(&entry.fields, retained),
        children,
    }
}

fn build_join_filter(
    flat: &FlattenedIncludes,
    resolved: &[Resolved<'_>],
    entry: &FlatPath,
) -> JoinFilterDirective {
    let mut chain: Vec<PathId> = vec![entry.id];
    let mut current = entry.parent;
    while let Some(id) = current {
        chain.push(id);
        current = flat.get(id).and_then(|e| e.parent);
    }
    chain.reverse();

    let steps = chain
        .into_iter()
        .map(|id| JoinStep {
            path_id: id,
            relation: resolved[id.index()].relation.clone(),
        })
        .collect();

    JoinFilterDirective {
        path_id: entry.id,
        path: entry.path.clone(),
        steps,
        predicates: entry.filters.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ROOT_LOCATION;
    use crate::query::fixtures;
    use pretty_assertions::assert_eq;
    use relq_proto::IncludeNode;

    fn plan(request: GraphRequest) -> Result<QueryPlan, Error> {
        let registry = fixtures::registry();
        QueryPlanner::new(&registry).plan(&request)
    }

    #[test]
    fn test_bare_request_has_no_directives() {
        let plan = plan(GraphRequest::new("User")).unwrap();

        assert_eq!(plan.root_entity, "User");
        assert!(plan.loads.is_empty());
        assert!(plan.join_filters.is_empty());
        assert!(plan.root_filters.is_empty());
        assert!(plan.root_projection.is_all());
    }

    #[test]
    fn test_unknown_root_entity() {
        let err = plan(GraphRequest::new("Tag")).unwrap_err();

        assert_eq!(err.location(), Some(ROOT_LOCATION));
        assert_eq!(
            err.validation_error(),
            Some(&ValidationError::UnknownEntity { entity: "Tag".into() })
        );
    }

    #[test]
    fn test_unknown_root_filter_field() {
        let err = plan(GraphRequest::new("User").filter("nickname", "x")).unwrap_err();

        assert_eq!(
            err.validation_error(),
            Some(&ValidationError::UnknownField {
                entity: "User".into(),
                field: "nickname".into()
            })
        );
    }

    #[test]
    fn test_unknown_root_projection_field() {
        let err = plan(GraphRequest::new("User").with_fields(["posts"])).unwrap_err();

        assert_eq!(err.location(), Some(ROOT_LOCATION));
        assert!(matches!(
            err.validation_error(),
            Some(ValidationError::UnknownField { field, .. }) if field == "posts"
        ));
    }

    #[test]
    fn test_unknown_relationship_names_entity_and_segment() {
        let request = GraphRequest::new("User").include(
            "posts",
            IncludeNode::new().include("likes", IncludeNode::new()),
        );
        let err = plan(request).unwrap_err();

        assert_eq!(err.location(), Some("posts.likes"));
        assert_eq!(
            err.validation_error(),
            Some(&ValidationError::UnknownRelationship {
                entity: "Post".into(),
                relation: "likes".into()
            })
        );
    }

    #[test]
    fn test_unknown_include_filter_field() {
        let request =
            GraphRequest::new("Post").include("user", IncludeNode::new().filter("title", "x"));
        let err = plan(request).unwrap_err();

        assert_eq!(err.location(), Some("user"));
        assert_eq!(
            err.validation_error(),
            Some(&ValidationError::UnknownField {
                entity: "User".into(),
                field: "title".into()
            })
        );
    }

    #[test]
    fn test_join_filter_on_many_to_one() {
        let request =
            GraphRequest::new("Post").include("user", IncludeNode::new().filter("username", "alice"));
        let plan = plan(request).unwrap();

        assert_eq!(plan.join_filters.len(), 1);
        let filter = &plan.join_filters[0];
        assert_eq!(filter.path.to_string(), "user");
        assert_eq!(filter.target_entity(), "User");
        assert_eq!(filter.predicates, FieldFilters::new().with("username", "alice"));
        assert_eq!(filter.steps.len(), 1);

        // A filtered path is also loaded.
        assert_eq!(plan.loads.len(), 1);
        assert_eq!(plan.loads[0].strategy, LoadStrategy::Joined);
    }

    #[test]
    fn test_projection_retains_primary_key() {
        let request = GraphRequest::new("Post").include(
            "user",
            IncludeNode::new().with_fields(["username"]),
        );
        let plan = plan(request).unwrap();

        let load = plan.find_load("user").unwrap();
        assert_eq!(load.projection.requested(), ["username".to_string()]);
        assert_eq!(
            load.projection.effective().unwrap(),
            ["username".to_string(), "id".to_string()]
        );
    }

    #[test]
    fn test_root_projection_retains_link_keys() {
        let request = GraphRequest::new("Post")
            .with_fields(["title"])
            .include("user", IncludeNode::new());
        let plan = plan(request).unwrap();

        assert_eq!(
            plan.root_projection.effective().unwrap(),
            ["title".to_string(), "id".to_string(), "user_id".to_string()]
        );
    }

    #[test]
    fn test_nested_loads_are_merged_under_top_level() {
        let request = GraphRequest::new("User").include(
            "posts",
            IncludeNode::new()
                .include("comments", IncludeNode::new().include("author", IncludeNode::new()))
                .include("user", IncludeNode::new()),
        );
        let plan = plan(request).unwrap();

        assert_eq!(plan.loads.len(), 1);
        assert_eq!(plan.load_count(), 4);

        let posts = &plan.loads[0];
        assert_eq!(posts.strategy, LoadStrategy::SelectIn);
        let child_paths: Vec<_> = posts.children.iter().map(|c| c.path.to_string()).collect();
        assert_eq!(child_paths, vec!["posts.comments", "posts.user"]);
        assert_eq!(
            posts.children[0].children[0].path.to_string(),
            "posts.comments.author"
        );
    }

    #[test]
    fn test_nested_join_filter_steps() {
        let request = GraphRequest::new("User").include(
            "posts",
            IncludeNode::new().include("comments", IncludeNode::new().filter("body", "Nice")),
        );
        let plan = plan(request).unwrap();

        let filter = plan.find_join_filter("posts.comments").unwrap();
        let hops: Vec<_> = filter.steps.iter().map(|s| s.relation.name.as_str()).collect();
        assert_eq!(hops, vec!["posts", "comments"]);
        assert_eq!(filter.target_entity(), "Comment");
    }

    #[test]
    fn test_depth_budget() {
        let request = GraphRequest::new("User").include(
            "posts",
            IncludeNode::new().include("user", IncludeNode::new().include("posts", IncludeNode::new())),
        );
        let registry = fixtures::registry();
        let err = QueryPlanner::new(&registry)
            .with_budget(FanoutBudget::new(100, 100, 2))
            .plan(&request)
            .unwrap_err();

        assert_eq!(err.location(), Some("posts.user.posts"));
        assert_eq!(
            err.validation_error(),
            Some(&ValidationError::DepthExceeded { depth: 3, max_depth: 2 })
        );
    }

    /// An include chain `posts.user.posts...` of `depth` relationships.
    fn chain(depth: usize) -> GraphRequest {
        let mut node = IncludeNode::new();
        for level in (2..=depth).rev() {
            let name = if level % 2 == 0 { "user" } else { "posts" };
            node = IncludeNode::new().include(name, node);
        }
        GraphRequest::new("User").include("posts", node)
    }

    #[test]
    fn test_default_depth_limit() {
        assert!(plan(chain(DEFAULT_MAX_DEPTH)).is_ok());

        let err = plan(chain(DEFAULT_MAX_DEPTH + 1)).unwrap_err();
        assert_eq!(
            err.validation_error(),
            Some(&ValidationError::DepthExceeded {
                depth: DEFAULT_MAX_DEPTH + 1,
                max_depth: DEFAULT_MAX_DEPTH
            })
        );

        let registry = fixtures::registry();
        let deep = QueryPlanner::new(&registry)
            .with_budget(FanoutBudget::unlimited())
            .plan(&chain(DEFAULT_MAX_DEPTH + 1));
        assert!(deep.is_ok());
    }

    #[test]
    fn test_self_referencing_paths_are_allowed() {
        let request = GraphRequest::new("User").include(
            "posts",
            IncludeNode::new().include("user", IncludeNode::new().include("posts", IncludeNode::new())),
        );
        let plan = plan(request).unwrap();

        assert!(plan.find_load("posts.user.posts").is_some());
    }

    #[test]
    fn test_root_filters_preserve_order() {
        let request = GraphRequest::new("User")
            .filter("username", "testuser1")
            .filter("email", "user1@example.com");
        let plan = plan(request).unwrap();

        let fields: Vec<_> = plan.root_filters.fields().collect();
        assert_eq!(fields, vec!["username", "email"]);
    }

    #[test]
    fn test_explain() {
        let request = GraphRequest::new("Post")
            .include("user", IncludeNode::new().filter("username", "alice").with_fields(["username"]));
        let explain = plan(request).unwrap().explain();

        assert!(explain.starts_with("query Post [*]"));
        assert!(explain.contains("load user -> User (joined) [username, id]"));
        assert!(explain.contains("filter user -> User where username = \"alice\""));
    }
}
