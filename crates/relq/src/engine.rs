//! Query engine bundling a registry, a data source and configuration.

use std::sync::Arc;

use relq_core::catalog::{self, EntityRegistry, SchemaBundle};
use relq_core::query::{CancelFlag, ExecutionContext, PlanExecutor, QueryPlan, QueryPlanner};
use relq_core::source::DataSource;
use relq_proto::{GraphRequest, QueryResult, RequestParams};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// A query engine over one entity graph and one data source.
///
/// Cheap to clone; clones share the registry and the source.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<EntityRegistry>,
    source: Arc<dyn DataSource>,
    config: EngineConfig,
}

impl Engine {
    /// Create an engine, validating the registry first.
    pub fn new<S>(registry: EntityRegistry, source: S) -> Result<Self>
    where
        S: DataSource + 'static,
    {
        Self::from_shared(Arc::new(registry), Arc::new(source))
    }

    /// Create an engine over an already shared registry and source.
    pub fn from_shared(registry: Arc<EntityRegistry>, source: Arc<dyn DataSource>) -> Result<Self> {
        registry.validate()?;
        Ok(Self {
            registry,
            source,
            config: EngineConfig::default(),
        })
    }

    /// Create an engine from a model specification document.
    pub fn from_models<S>(models_json: &str, source: S) -> Result<Self>
    where
        S: DataSource + 'static,
    {
        let bundle = SchemaBundle::from_json(models_json)?;
        Self::new(EntityRegistry::from_bundle(bundle)?, source)
    }

    /// Create an engine over the process-wide registry.
    pub fn from_global(source: Arc<dyn DataSource>) -> Result<Self> {
        let registry = catalog::global().ok_or_else(|| {
            Error::Core(relq_core::Error::Schema(
                "no global entity registry installed".to_string(),
            ))
        })?;
        Self::from_shared(registry, source)
    }

    /// Set the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// The entity registry.
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate a request and build its plan without executing it.
    pub fn plan(&self, request: &GraphRequest) -> Result<QueryPlan> {
        let plan = QueryPlanner::new(&self.registry)
            .with_budget(self.config.budget.clone())
            .plan(request)?;
        Ok(plan)
    }

    /// Run a request under the configured timeout.
    pub fn query(&self, request: &GraphRequest) -> Result<QueryResult> {
        self.query_with_context(request, self.context(CancelFlag::new()))
    }

    /// Run a request under a caller-supplied context.
    pub fn query_with_context(&self, request: &GraphRequest, ctx: ExecutionContext) -> Result<QueryResult> {
        let plan = self.plan(request)?;
        let result = PlanExecutor::new(self.source.as_ref())
            .with_join_threshold(self.config.join_threshold)
            .execute(&plan, &ctx)?;
        debug!(entity = %request.entity, rows = result.len(), "query complete");
        Ok(result)
    }

    /// Decode raw handler parameters and run the request.
    pub fn query_params(&self, entity: &str, params: RequestParams) -> Result<QueryResult> {
        let request = params.into_request(entity)?;
        self.query(&request)
    }

    /// Run a request on the blocking pool, bounded by the configured timeout.
    #[cfg(feature = "async")]
    pub async fn query_async(&self, request: GraphRequest) -> Result<QueryResult> {
        self.query_async_with_cancel(request, CancelFlag::new()).await
    }

    /// Run a request on the blocking pool, observing `cancel`.
    ///
    /// On timeout the flag is set so the executor stops at its next check,
    /// and the partial work is discarded.
    #[cfg(feature = "async")]
    pub async fn query_async_with_cancel(
        &self,
        request: GraphRequest,
        cancel: CancelFlag,
    ) -> Result<QueryResult> {
        let engine = self.clone();
        let ctx = self.context(cancel.clone());
        let handle =
            tokio::task::spawn_blocking(move || engine.query_with_context(&request, ctx));

        let joined = match self.config.query_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    cancel.cancel();
                    tracing::warn!(?timeout, "query timed out");
                    return Err(Error::Core(relq_core::Error::Timeout(timeout)));
                }
            },
            None => handle.await,
        };

        joined.map_err(|e| Error::Runtime(e.to_string()))?
    }

    fn context(&self, cancel: CancelFlag) -> ExecutionContext {
        let ctx = ExecutionContext::new().with_cancel(cancel);
        match self.config.query_timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("entities", &self.registry.entity_names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
