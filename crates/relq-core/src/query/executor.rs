//! Plan executor.
//!
//! Runs a [`QueryPlan`] against a [`DataSource`]:
//! 1. Scan the root entity and apply root filters, one row per primary key
//! 2. Apply each join filter as a semi-join that keeps qualifying roots
//! 3. Walk the load tree level by level, one batched lookup per directive
//! 4. Project every level and assemble the result tree
//!
//! Rows fetched while evaluating a join filter are cached by path and reused
//! when the same path is loaded, so a path that is both filtered and loaded
//! is fetched once.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use relq_proto::{QueryResult, Related, ResultRow, Row, Value};
use tracing::{debug, instrument, trace};

use crate::catalog::RelationDef;
use crate::error::Error;
use crate::source::DataSource;

use super::join::{match_children, JoinKey, JoinStrategy, JoinThreshold};
use super::path::PathId;
use super::plan::{JoinFilterDirective, LoadDirective, LoadStrategy, Projection, QueryPlan};

/// Shared cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The caller's cancellation and timeout boundary for one execution.
///
/// Checked before and after every data-source call.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    cancel: CancelFlag,
}

impl ExecutionContext {
    /// A context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with [`Error::Timeout`] once `timeout` has elapsed from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self.timeout = Some(timeout);
        self
    }

    /// Observe an externally owned cancellation flag.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// The cancellation flag this context observes.
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Fail if cancelled or past the deadline.
    pub fn check(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(Error::Timeout(self.timeout.unwrap_or_default()))
            }
            _ => Ok(()),
        }
    }
}

/// A row with the related rows loaded so far, in load-directive order.
#[derive(Debug)]
struct Node {
    row: Row,
    relations: Vec<(String, Vec<Node>)>,
}

impl Node {
    fn new(row: Row) -> Self {
        Self {
            row,
            relations: Vec::new(),
        }
    }
}

/// Per-execution state.
struct Run<'p> {
    plan: &'p QueryPlan,
    ctx: &'p ExecutionContext,
    cache: HashMap<PathId, Vec<Row>>,
    related: usize,
}

/// Executor that materializes query plans against a data source.
pub struct PlanExecutor<'a, S: DataSource + ?Sized> {
    source: &'a S,
    join_threshold: JoinThreshold,
}

impl<'a, S: DataSource + ?Sized> PlanExecutor<'a, S> {
    /// Create a new executor over a data source.
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            join_threshold: JoinThreshold::default(),
        }
    }

    /// Set the batch sizes above which hash joins are used.
    pub fn with_join_threshold(mut self, threshold: JoinThreshold) -> Self {
        self.join_threshold = threshold;
        self
    }

    /// Execute a plan.
    ///
    /// Returns one row per distinct root matching the root filters and every
    /// join filter. On any source failure, cancellation or timeout, nothing
    /// partial is returned.
    #[instrument(skip_all, fields(entity = %plan.root_entity))]
    pub fn execute(&self, plan: &QueryPlan, ctx: &ExecutionContext) -> Result<QueryResult, Error> {
        let mut run = Run {
            plan,
            ctx,
            cache: HashMap::new(),
            related: 0,
        };

        let mut roots = self.fetch_roots(&run)?;
        debug!(roots = roots.len(), "root rows after filters");

        for filter in &plan.join_filters {
            roots = self.apply_join_filter(&mut run, filter, roots)?;
            debug!(path = %filter.path, roots = roots.len(), "applied join filter");
        }

        if roots.len() > plan.budget.max_entities {
            return Err(Error::Budget(format!(
                "{} root rows exceed the limit of {}",
                roots.len(),
                plan.budget.max_entities
            )));
        }

        let mut nodes: Vec<Node> = roots.into_iter().map(Node::new).collect();
        {
            let mut parents: Vec<&mut Node> = nodes.iter_mut().collect();
            for load in &plan.loads {
                self.load(&mut run, load, &mut parents)?;
            }
        }
        debug!(roots = nodes.len(), related = run.related, "execution complete");

        let rows = nodes
            .into_iter()
            .map(|node| materialize(node, &plan.root_entity, &plan.root_projection, &plan.loads))
            .collect();
        Ok(QueryResult::new(plan.root_entity.clone(), rows))
    }

    /// Root rows matching the root filters, first occurrence per primary key.
    fn fetch_roots(&self, run: &Run<'_>) -> Result<Vec<Row>, Error> {
        let plan = run.plan;
        run.ctx.check()?;
        let rows = self.source.scan(&plan.root_entity)?;
        run.ctx.check()?;

        let mut seen = HashSet::new();
        Ok(rows
            .into_iter()
            .filter(|row| plan.root_filters.matches(|f| row.get(f)))
            .filter(|row| match row.get(&plan.primary_key).and_then(JoinKey::from_value) {
                Some(key) => seen.insert(key),
                None => true,
            })
            .collect())
    }

    /// Rows of the relation's target related to any of `parents`.
    ///
    /// Served from the cache when the path was already fetched for a superset
    /// of these parents.
    fn fetch_related(
        &self,
        run: &mut Run<'_>,
        path_id: PathId,
        relation: &RelationDef,
        parents: &[&Row],
    ) -> Result<Vec<Row>, Error> {
        if let Some(rows) = run.cache.get(&path_id) {
            trace!(relation = %relation.name, rows = rows.len(), "reusing fetched rows");
            return Ok(rows.clone());
        }

        let mut seen = HashSet::new();
        let keys: Vec<Value> = parents
            .iter()
            .filter_map(|row| row.get(&relation.from_field))
            .filter(|v| JoinKey::from_value(v).is_some_and(|k| seen.insert(k)))
            .cloned()
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        run.ctx.check()?;
        let rows = self
            .source
            .fetch_where_in(&relation.to_entity, &relation.to_field, &keys)?;
        run.ctx.check()?;

        trace!(
            relation = %relation.name,
            keys = keys.len(),
            rows = rows.len(),
            "fetched related rows"
        );
        run.cache.insert(path_id, rows.clone());
        Ok(rows)
    }

    /// For each parent, indices into `children` related to it.
    fn associate(&self, relation: &RelationDef, parents: &[&Row], children: &[Row]) -> Vec<Vec<usize>> {
        let keys: Vec<Option<Value>> = parents
            .iter()
            .map(|row| row.get(&relation.from_field).cloned())
            .collect();
        let strategy = JoinStrategy::select(parents.len(), children.len(), &self.join_threshold);
        match_children(strategy, &keys, children, &relation.to_field)
    }

    /// Keep roots that reach a row at the filtered path matching its predicates.
    fn apply_join_filter(
        &self,
        run: &mut Run<'_>,
        filter: &JoinFilterDirective,
        roots: Vec<Row>,
    ) -> Result<Vec<Row>, Error> {
        // (root index, row reached so far)
        let mut frontier: Vec<(usize, Row)> = roots.iter().cloned().enumerate().collect();

        for step in &filter.steps {
            if frontier.is_empty() {
                break;
            }
            let parents: Vec<&Row> = frontier.iter().map(|(_, row)| row).collect();
            let children = self.fetch_related(run, step.path_id, &step.relation, &parents)?;
            let matches = self.associate(&step.relation, &parents, &children);

            frontier = frontier
                .iter()
                .zip(matches)
                .flat_map(|((origin, _), idxs)| {
                    let children = &children;
                    idxs.into_iter().map(move |i| (*origin, children[i].clone()))
                })
                .collect();
        }

        let qualifying: HashSet<usize> = frontier
            .iter()
            .filter(|(_, row)| filter.predicates.matches(|f| row.get(f)))
            .map(|(origin, _)| *origin)
            .collect();

        Ok(roots
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| qualifying.contains(idx))
            .map(|(_, row)| row)
            .collect())
    }

    /// Attach `load`'s relation to every parent, then recurse into its children.
    fn load(
        &self,
        run: &mut Run<'_>,
        load: &LoadDirective,
        parents: &mut [&mut Node],
    ) -> Result<(), Error> {
        let (children, matches) = {
            let rows: Vec<&Row> = parents.iter().map(|n| &n.row).collect();
            let children = self.fetch_related(run, load.path_id, &load.relation, &rows)?;
            let matches = self.associate(&load.relation, &rows, &children);
            (children, matches)
        };

        for (parent, idxs) in parents.iter_mut().zip(matches) {
            let take = match load.strategy {
                LoadStrategy::Joined => idxs.len().min(1),
                LoadStrategy::SelectIn => idxs.len(),
            };
            run.related += take;
            let nodes = idxs
                .into_iter()
                .take(take)
                .map(|i| Node::new(children[i].clone()))
                .collect();
            parent.relations.push((load.relation.name.clone(), nodes));
        }

        if run.related > run.plan.budget.max_related {
            return Err(Error::Budget(format!(
                "{} related rows exceed the limit of {}",
                run.related, run.plan.budget.max_related
            )));
        }
        trace!(path = %load.path, related = run.related, "loaded path");

        if load.children.is_empty() {
            return Ok(());
        }
        let mut next: Vec<&mut Node> = parents
            .iter_mut()
            .flat_map(|p| {
                p.relations
                    .last_mut()
                    .into_iter()
                    .flat_map(|(_, nodes)| nodes.iter_mut())
            })
            .collect();
        for child in &load.children {
            self.load(run, child, &mut next)?;
        }
        Ok(())
    }
}

/// Project a node and its loaded relations into a result row.
fn materialize(node: Node, entity: &str, projection: &Projection, loads: &[LoadDirective]) -> ResultRow {
    let mut out = ResultRow::new(entity, projection.apply(&node.row));
    for ((name, children), load) in node.relations.into_iter().zip(loads) {
        let mut rows = children.into_iter().map(|child| {
            materialize(child, load.target_entity(), &load.projection, &load.children)
        });
        let related = match load.strategy {
            LoadStrategy::Joined => Related::One(rows.next().map(Box::new)),
            LoadStrategy::SelectIn => Related::Many(rows.collect()),
        };
        out.attach(name, related);
    }
    out
}
