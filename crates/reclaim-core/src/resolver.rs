//! Multi-method resolver
//!
//! Runs every configured recovery strategy against one target and reports
//! the outcomes in strategy declaration order.

use crate::upstream::{MethodResult, RecoveryStrategy, UpstreamClient};
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

/// Errors that prevent a target from being resolved at all
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Target was empty after trimming
    #[error("target is empty")]
    EmptyTarget,
}

/// Interface for resolving one target into per-strategy results
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TargetResolver: Send + Sync {
    /// Run all strategies for `target`; one result per strategy, in declaration order.
    async fn resolve(&self, target: &str) -> Result<Vec<MethodResult>, ResolveError>;
}

/// Resolver backed by the upstream client and an ordered strategy list.
pub struct MultiMethodResolver {
    client: Arc<UpstreamClient>,
    strategies: Vec<Arc<dyn RecoveryStrategy>>,
    concurrent: bool,
}

impl MultiMethodResolver {
    /// Create a resolver; strategies run concurrently by default.
    #[must_use]
    pub fn new(client: Arc<UpstreamClient>, strategies: Vec<Arc<dyn RecoveryStrategy>>) -> Self {
        Self {
            client,
            strategies,
            concurrent: true,
        }
    }

    /// Run strategies one after another instead of concurrently.
    #[must_use]
    pub const fn sequential(mut self) -> Self {
        self.concurrent = false;
        self
    }

    /// Choose concurrent or sequential execution.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Number of configured strategies
    #[must_use]
    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }
}

#[async_trait]
impl TargetResolver for MultiMethodResolver {
    #[instrument(skip(self))]
    async fn resolve(&self, target: &str) -> Result<Vec<MethodResult>, ResolveError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(ResolveError::EmptyTarget);
        }

        let attempts = self
            .strategies
            .iter()
            .enumerate()
            .map(|(i, strategy)| self.client.attempt(i + 1, strategy.as_ref(), target));

        // join_all keeps input order, so output order is declaration order either way
        let results = if self.concurrent {
            join_all(attempts).await
        } else {
            let mut results = Vec::with_capacity(self.strategies.len());
            for attempt in attempts {
                results.push(attempt.await);
            }
            results
        };

        let succeeded = results.iter().filter(|r| r.success).count();
        info!(
            "Resolved target {}: {}/{} methods succeeded",
            target,
            succeeded,
            results.len()
        );

        Ok(results)
    }
}
