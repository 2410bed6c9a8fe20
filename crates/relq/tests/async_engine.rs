//! Async engine tests.
#![cfg(feature = "async")]

use std::thread;
use std::time::Duration;

use relq::{
    CancelFlag, DataSource, Engine, EngineConfig, EntityDef, EntityRegistry, FieldDef,
    GraphRequest, MemorySource, Row, ScalarType, SourceError,
};

/// A source whose every call takes `delay`.
struct SlowSource {
    inner: MemorySource,
    delay: Duration,
}

impl DataSource for SlowSource {
    fn scan(&self, entity: &str) -> Result<Vec<Row>, SourceError> {
        thread::sleep(self.delay);
        self.inner.scan(entity)
    }
}

fn registry() -> EntityRegistry {
    EntityRegistry::new().with_entity(
        EntityDef::new("User", "id")
            .with_field(FieldDef::new("id", ScalarType::Int64))
            .with_field(FieldDef::new("username", ScalarType::String)),
    )
}

fn engine(delay: Duration, timeout: Duration) -> Engine {
    let source = SlowSource {
        inner: MemorySource::new().with_rows(
            "User",
            [Row::new().with("id", 1i64).with("username", "alice")],
        ),
        delay,
    };
    Engine::new(registry(), source)
        .unwrap()
        .with_config(EngineConfig::new().with_query_timeout(timeout))
}

#[tokio::test]
async fn test_query_async() {
    let engine = engine(Duration::ZERO, Duration::from_secs(5));

    let result = engine.query_async(GraphRequest::new("User")).await.unwrap();
    assert_eq!(result.len(), 1);
}

#[tokio::test]
async fn test_query_async_times_out_and_cancels() {
    let engine = engine(Duration::from_millis(500), Duration::from_millis(50));
    let cancel = CancelFlag::new();

    let err = engine
        .query_async_with_cancel(GraphRequest::new("User"), cancel.clone())
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn test_query_async_validation_error() {
    let engine = engine(Duration::ZERO, Duration::from_secs(5));

    let err = engine
        .query_async(GraphRequest::new("User").filter("nickname", "x"))
        .await
        .unwrap_err();
    assert!(err.validation_error().is_some());
}

#[tokio::test]
async fn test_cancelled_before_execution() {
    let engine = engine(Duration::ZERO, Duration::from_secs(5));
    let cancel = CancelFlag::new();
    cancel.cancel();

    let err = engine
        .query_async_with_cancel(GraphRequest::new("User"), cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}
