//! Engine configuration.

use std::time::Duration;

use relq_core::query::{FanoutBudget, JoinThreshold};

/// Default per-query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Default per-query timeout.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS);

/// Engine configuration.
///
/// Defaults:
/// - `budget`: at most 10 000 roots, 50 000 related rows and include paths
///   5 relationships deep. Deeper include trees fail validation with
///   `DepthExceeded` unless the budget is raised.
/// - `query_timeout`: [`DEFAULT_QUERY_TIMEOUT`].
/// - `join_threshold`: hash joins above 100 parents or 1000 children.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Fanout budget attached to every plan.
    pub budget: FanoutBudget,

    /// Per-query timeout. `None` disables the deadline.
    pub query_timeout: Option<Duration>,

    /// Batch sizes above which the executor uses hash joins.
    pub join_threshold: JoinThreshold,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            budget: FanoutBudget::default(),
            query_timeout: Some(DEFAULT_QUERY_TIMEOUT),
            join_threshold: JoinThreshold::default(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fanout budget.
    pub fn with_budget(mut self, budget: FanoutBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Set the per-query timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Disable the per-query timeout.
    pub fn without_timeout(mut self) -> Self {
        self.query_timeout = None;
        self
    }

    /// Set the hash-join thresholds.
    pub fn with_join_threshold(mut self, threshold: JoinThreshold) -> Self {
        self.join_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relq_core::query::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_ENTITIES, DEFAULT_MAX_RELATED};

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();

        assert_eq!(config.query_timeout, Some(Duration::from_secs(30)));
        assert_eq!(
            config.budget,
            FanoutBudget::new(DEFAULT_MAX_ENTITIES, DEFAULT_MAX_RELATED, DEFAULT_MAX_DEPTH)
        );
        assert_eq!(config.budget.max_depth, 5);
        assert_eq!(config.join_threshold.parent_count, 100);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_budget(FanoutBudget::unlimited())
            .without_timeout();

        assert_eq!(config.budget, FanoutBudget::unlimited());
        assert!(config.query_timeout.is_none());

        let config = config.with_query_timeout(Duration::from_millis(250));
        assert_eq!(config.query_timeout, Some(Duration::from_millis(250)));
    }
}
