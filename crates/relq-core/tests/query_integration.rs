//! Integration tests for planning and executing include queries.

use pretty_assertions::assert_eq;
use relq_core::catalog::{EntityRegistry, SchemaBundle};
use relq_core::query::{flatten, ExecutionContext, LoadStrategy, PlanExecutor, QueryPlanner};
use relq_core::source::{DataSource, MemorySource, SledConfig, SledSource};
use relq_core::{Error, ValidationError};
use relq_proto::{GraphRequest, IncludeNode, IncludeSpec, QueryResult, ResultRow, Row, Value};

const MODELS: &str = r#"{
    "User": {
        "table_name": "users",
        "fields": [
            {"name": "id", "type": "Integer", "primary_key": true, "nullable": false},
            {"name": "username", "type": "String", "length": 50, "nullable": false},
            {"name": "email", "type": "String", "length": 100, "nullable": false}
        ],
        "relationships": [
            {"name": "posts", "kind": "one_to_many", "target": "Post", "back_populates": "user"}
        ]
    },
    "Post": {
        "table_name": "posts",
        "fields": [
            {"name": "id", "type": "Integer", "primary_key": true, "nullable": false},
            {"name": "title", "type": "String", "length": 200, "nullable": false},
            {"name": "content", "type": "String", "nullable": false},
            {"name": "user_id", "type": "Integer", "foreign_key": {"target": "users.id"}, "nullable": false}
        ],
        "relationships": [
            {"name": "user", "kind": "many_to_one", "target": "User", "back_populates": "posts"}
        ]
    }
}"#;

struct TestContext {
    registry: EntityRegistry,
    source: Box<dyn DataSource>,
    _dir: Option<tempfile::TempDir>,
}

impl TestContext {
    fn memory() -> Self {
        let source = MemorySource::new();
        for (entity, row) in seed_rows() {
            source.insert(entity, row);
        }
        Self {
            registry: registry(),
            source: Box::new(source),
            _dir: None,
        }
    }

    fn sled() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = SledSource::open(SledConfig::new(dir.path())).unwrap();
        for (entity, row) in seed_rows() {
            source.insert(entity, &row).unwrap();
        }
        Self {
            registry: registry(),
            source: Box::new(source),
            _dir: Some(dir),
        }
    }

    fn both() -> [Self; 2] {
        [Self::memory(), Self::sled()]
    }

    fn query(&self, request: &GraphRequest) -> Result<QueryResult, Error> {
        let plan = QueryPlanner::new(&self.registry).plan(request)?;
        PlanExecutor::new(self.source.as_ref()).execute(&plan, &ExecutionContext::new())
    }
}

fn registry() -> EntityRegistry {
    EntityRegistry::from_bundle(SchemaBundle::from_json(MODELS).unwrap()).unwrap()
}

fn seed_rows() -> Vec<(&'static str, Row)> {
    let user = |id: i64, name: &str| {
        Row::new()
            .with("id", id)
            .with("username", name)
            .with("email", format!("{name}@example.com"))
    };
    let post = |id: i64, title: &str, user_id: i64| {
        Row::new()
            .with("id", id)
            .with("title", title)
            .with("content", format!("Content of post {id}"))
            .with("user_id", user_id)
    };
    vec![
        ("User", user(1, "testuser1")),
        ("User", user(2, "testuser2")),
        ("Post", post(1, "First Post", 1)),
        ("Post", post(2, "Second Post", 1)),
        ("Post", post(3, "Third Post", 2)),
    ]
}

fn ids(rows: &[ResultRow]) -> Vec<i64> {
    rows.iter().filter_map(|r| r.get("id")?.as_i64()).collect()
}

#[test]
fn test_flattened_path_count_matches_tree() {
    let spec = IncludeSpec::new()
        .with(
            "posts",
            IncludeNode::new()
                .include("user", IncludeNode::new().include("posts", IncludeNode::new()))
                .include("tags", IncludeNode::new()),
        )
        .with("profile", IncludeNode::new());

    let flat = flatten(&spec);
    assert_eq!(flat.len(), 5);
    assert_eq!(flat.len(), spec.node_count());
}

#[test]
fn test_bare_user_plan() {
    let ctx = TestContext::memory();
    let plan = QueryPlanner::new(&ctx.registry)
        .plan(&GraphRequest::new("User"))
        .unwrap();

    assert!(plan.loads.is_empty());
    assert!(plan.join_filters.is_empty());
    assert!(plan.root_filters.is_empty());
    assert!(plan.root_projection.is_all());
}

#[test]
fn test_post_filtered_by_user() {
    for ctx in TestContext::both() {
        let request = GraphRequest::from_params(
            "Post",
            None,
            None,
            Some(r#"{"user": {"filters": {"username": "testuser1"}}}"#),
        )
        .unwrap();

        let plan = QueryPlanner::new(&ctx.registry).plan(&request).unwrap();
        assert_eq!(plan.join_filters.len(), 1);
        assert_eq!(plan.join_filters[0].path.to_string(), "user");
        assert_eq!(
            plan.join_filters[0].predicates.get("username"),
            Some(&Value::from("testuser1"))
        );

        let result = ctx.query(&request).unwrap();
        assert_eq!(ids(&result.rows), vec![1, 2]);
        for post in &result.rows {
            let user = post.one("user").unwrap();
            assert_eq!(user.get("username"), Some(&Value::from("testuser1")));
        }
    }
}

#[test]
fn test_user_projection_retains_primary_key() {
    for ctx in TestContext::both() {
        let request = GraphRequest::from_params(
            "Post",
            None,
            None,
            Some(r#"{"user": {"fields": ["username"], "include": {}}}"#),
        )
        .unwrap();

        let flat = flatten(&request.include);
        assert_eq!(flat.fields_map().len(), 1);
        assert_eq!(flat.fields_map()[0].1, ["username".to_string()]);

        let result = ctx.query(&request).unwrap();
        let user = result.rows[0].one("user").unwrap();
        assert_eq!(user.get("id"), Some(&Value::Int64(1)));
        assert_eq!(user.get("username"), Some(&Value::from("testuser1")));
        assert!(user.get("email").is_none());
    }
}

#[test]
fn test_user_with_posts() {
    for ctx in TestContext::both() {
        let request = GraphRequest::from_params(
            "User",
            Some(r#"{"username": "testuser1"}"#),
            None,
            Some(r#"{"posts": {}}"#),
        )
        .unwrap();

        let plan = QueryPlanner::new(&ctx.registry).plan(&request).unwrap();
        assert_eq!(plan.loads[0].strategy, LoadStrategy::SelectIn);

        let result = ctx.query(&request).unwrap();
        assert_eq!(result.len(), 1);
        let titles: Vec<_> = result.rows[0]
            .many("posts")
            .unwrap()
            .iter()
            .filter_map(|p| p.get("title")?.as_str())
            .collect();
        assert_eq!(titles, vec!["First Post", "Second Post"]);
    }
}

#[test]
fn test_root_fields_only() {
    for ctx in TestContext::both() {
        let request = GraphRequest::from_params("User", None, Some("username"), None).unwrap();

        let result = ctx.query(&request).unwrap();
        assert_eq!(result.len(), 2);
        let names: Vec<_> = result.rows[0]
            .fields
            .fields
            .iter()
            .map(|f| f.field.as_str())
            .collect();
        assert_eq!(names, vec!["username", "id"]);
    }
}

#[test]
fn test_filter_and_include_on_same_path() {
    for ctx in TestContext::both() {
        let request = GraphRequest::new("User").include(
            "posts",
            IncludeNode::new()
                .filter("title", "Third Post")
                .with_fields(["title"]),
        );

        let result = ctx.query(&request).unwrap();
        assert_eq!(ids(&result.rows), vec![2]);
        let posts = result.rows[0].many("posts").unwrap();
        assert_eq!(ids(posts), vec![3]);
        assert_eq!(posts[0].get("user_id"), Some(&Value::Int64(2)));
    }
}

#[test]
fn test_unknown_filter_field_is_rejected_before_execution() {
    let ctx = TestContext::memory();
    let request = GraphRequest::new("Post").include("user", IncludeNode::new().filter("age", 30i64));

    let err = ctx.query(&request).unwrap_err();
    assert_eq!(err.location(), Some("user"));
    assert_eq!(
        err.validation_error(),
        Some(&ValidationError::UnknownField {
            entity: "User".into(),
            field: "age".into()
        })
    );
}

#[test]
fn test_unknown_relationship_is_rejected() {
    let ctx = TestContext::memory();
    let request = GraphRequest::new("User").include("comments", IncludeNode::new());

    let err = ctx.query(&request).unwrap_err();
    assert_eq!(
        err.validation_error(),
        Some(&ValidationError::UnknownRelationship {
            entity: "User".into(),
            relation: "comments".into()
        })
    );
}

#[test]
fn test_result_json() {
    let ctx = TestContext::memory();
    let request = GraphRequest::new("User")
        .filter("id", 2i64)
        .with_fields(["username"])
        .include("posts", IncludeNode::new().with_fields(["title"]));

    let json = ctx.query(&request).unwrap().to_json();
    assert_eq!(
        json,
        serde_json::json!([{
            "username": "testuser2",
            "id": 2,
            "posts": [{"title": "Third Post", "id": 3, "user_id": 2}]
        }])
    );
}
