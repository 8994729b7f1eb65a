//! Batch runner
//!
//! Drives the resolver across a bounded, ordered list of targets, one at a
//! time, with a pause between consecutive targets to stay under upstream
//! rate limits.

use crate::config::MAX_BULK_TARGETS;
use crate::resolver::TargetResolver;
use crate::upstream::{render_results, MethodResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Separator placed between per-target blocks of the aggregate report
pub const REPORT_SEPARATOR: &str = "\n\n---\n\n";

/// Bulk input rejected before any upstream call
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Nothing left after trimming and dropping empty lines
    #[error("no targets provided")]
    Empty,
    /// More targets than the bulk cap allows
    #[error("{count} targets exceed the limit of {max}")]
    TooMany {
        /// Number of targets submitted
        count: usize,
        /// Configured cap
        max: usize,
    },
}

/// Validated, ordered list of targets (1..=50 non-empty, trimmed entries)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    targets: Vec<String>,
}

impl BatchJob {
    /// Parse newline-separated input: trim each line, drop empties, enforce the cap.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if no target or more than [`MAX_BULK_TARGETS`] remain.
    ///
    /// # Examples
    ///
    /// ```
    /// use reclaim_core::batch::BatchJob;
    /// let job = BatchJob::parse("alice\n\n  bob  \n").expect("valid job");
    /// assert_eq!(job.targets(), ["alice", "bob"]);
    /// ```
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        Self::from_targets(input.lines())
    }

    /// Build a job from individual entries, with the same rules as [`parse`](Self::parse).
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if no target or more than [`MAX_BULK_TARGETS`] remain.
    pub fn from_targets<I, S>(entries: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let targets: Vec<String> = entries
            .into_iter()
            .map(|entry| entry.as_ref().trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect();

        match targets.len() {
            0 => Err(ValidationError::Empty),
            count if count > MAX_BULK_TARGETS => Err(ValidationError::TooMany {
                count,
                max: MAX_BULK_TARGETS,
            }),
            _ => Ok(Self { targets }),
        }
    }

    /// Targets in submission order
    #[must_use]
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Number of targets
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Always false for a validated job
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Progress notification emitted before each target is processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    /// 1-based position of the target
    pub index: usize,
    /// Total number of targets in the job
    pub total: usize,
    /// The target about to be processed
    pub target: String,
}

/// Receiver of batch progress notifications
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Called once per target, before it is resolved
    async fn on_progress(&self, progress: BatchProgress);
}

/// Result of processing one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStatus {
    /// Resolver ran; per-strategy results in declaration order
    Resolved(Vec<MethodResult>),
    /// Resolver failed for this target; the batch carried on
    Failed(String),
}

/// One target with its processing result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    /// The target
    pub target: String,
    /// What happened to it
    pub status: TargetStatus,
}

impl TargetOutcome {
    /// Whether at least one strategy succeeded
    #[must_use]
    pub fn any_success(&self) -> bool {
        matches!(&self.status, TargetStatus::Resolved(results) if results.iter().any(|r| r.success))
    }

    /// Whether the upstream throttled any strategy for this target
    #[must_use]
    pub fn hit_rate_limit(&self) -> bool {
        matches!(&self.status, TargetStatus::Resolved(results) if results.iter().any(MethodResult::is_rate_limited))
    }

    /// Render the per-target block
    #[must_use]
    pub fn render(&self) -> String {
        let body = match &self.status {
            TargetStatus::Resolved(results) => render_results(results),
            TargetStatus::Failed(reason) => format!("❌ Failed to process target: {reason}"),
        };
        format!("🎯 Target: {}\n{body}", self.target)
    }
}

/// Aggregate report of a whole batch
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchReport {
    /// Outcomes in input order
    pub outcomes: Vec<TargetOutcome>,
}

impl BatchReport {
    /// Number of targets with at least one successful strategy
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.any_success()).count()
    }

    /// Render the aggregate report with a visible separator between blocks
    #[must_use]
    pub fn render(&self) -> String {
        let blocks: Vec<String> = self.outcomes.iter().map(TargetOutcome::render).collect();
        format!(
            "🎉 Bulk Processing Complete!\n{}/{} targets had at least one successful method.{REPORT_SEPARATOR}{}",
            self.succeeded(),
            self.outcomes.len(),
            blocks.join(REPORT_SEPARATOR)
        )
    }
}

/// Pacing policy deciding how long to wait after a target before the next one
pub trait Pacing: Send + Sync {
    /// Delay after `outcome`, applied only when another target follows
    fn delay_after(&self, outcome: &TargetOutcome) -> Duration;
}

/// Constant pause between targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

impl Pacing for FixedDelay {
    fn delay_after(&self, _outcome: &TargetOutcome) -> Duration {
        self.0
    }
}

/// Sequential, paced runner over a [`BatchJob`]
pub struct BatchRunner {
    resolver: Arc<dyn TargetResolver>,
    pacing: Arc<dyn Pacing>,
}

impl BatchRunner {
    /// Create a runner
    #[must_use]
    pub fn new(resolver: Arc<dyn TargetResolver>, pacing: Arc<dyn Pacing>) -> Self {
        Self { resolver, pacing }
    }

    /// Process every target in order.
    ///
    /// A resolver failure is recorded as a failed block and the loop continues.
    pub async fn run(&self, job: &BatchJob, sink: &dyn ProgressSink) -> BatchReport {
        let total = job.len();
        let mut report = BatchReport::default();
        let mut throttled = 0;

        for (i, target) in job.targets().iter().enumerate() {
            sink.on_progress(BatchProgress {
                index: i + 1,
                total,
                target: target.clone(),
            })
            .await;

            let status = match self.resolver.resolve(target).await {
                Ok(results) => TargetStatus::Resolved(results),
                Err(e) => {
                    warn!("Target {}/{} ({}) failed: {}", i + 1, total, target, e);
                    TargetStatus::Failed(e.to_string())
                }
            };
            let outcome = TargetOutcome {
                target: target.clone(),
                status,
            };

            if outcome.hit_rate_limit() {
                throttled += 1;
                warn!("Target {}/{} ({}) was rate limited upstream", i + 1, total, target);
            }

            let delay = self.pacing.delay_after(&outcome);
            report.outcomes.push(outcome);

            if i + 1 < total && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        info!(
            "Batch finished: {}/{} targets with a successful method, {} rate limited",
            report.succeeded(),
            total,
            throttled
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{MockTargetResolver, ResolveError};
    use crate::upstream::FailureKind;
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(BatchProgress, Instant)>>,
    }

    #[async_trait]
    impl ProgressSink for RecordingSink {
        async fn on_progress(&self, progress: BatchProgress) {
            self.events.lock().await.push((progress, Instant::now()));
        }
    }

    fn ok_resolver() -> MockTargetResolver {
        let mut resolver = MockTargetResolver::new();
        resolver.expect_resolve().returning(|target| {
            Ok(vec![
                MethodResult::sent(1, format!("sent for {target}")),
                MethodResult::failed(2, FailureKind::Rejected, "user not found"),
            ])
        });
        resolver
    }

    #[test]
    fn test_parse_trims_and_drops_empty_lines() {
        let job = BatchJob::parse("  alice \n\n\t\nbob@mail.com\n").expect("valid job");
        assert_eq!(job.targets(), ["alice", "bob@mail.com"]);
        assert_eq!(job.len(), 2);
    }

    #[test]
    fn test_parse_rejects_empty_input() {
        assert_eq!(BatchJob::parse(""), Err(ValidationError::Empty));
        assert_eq!(BatchJob::parse(" \n \n\t"), Err(ValidationError::Empty));
    }

    #[test]
    fn test_parse_enforces_cap() {
        let exactly: Vec<String> = (0..MAX_BULK_TARGETS).map(|i| format!("user{i}")).collect();
        assert_eq!(
            BatchJob::parse(&exactly.join("\n")).map(|job| job.len()),
            Ok(MAX_BULK_TARGETS)
        );

        let over: Vec<String> = (0..=MAX_BULK_TARGETS).map(|i| format!("user{i}")).collect();
        assert_eq!(
            BatchJob::parse(&over.join("\n")),
            Err(ValidationError::TooMany {
                count: MAX_BULK_TARGETS + 1,
                max: MAX_BULK_TARGETS
            })
        );
    }

    #[tokio::test]
    async fn test_emits_one_progress_per_target() {
        let runner = BatchRunner::new(
            Arc::new(ok_resolver()),
            Arc::new(FixedDelay(Duration::ZERO)),
        );
        let job = BatchJob::parse("a\nb\nc").expect("valid job");
        let sink = RecordingSink::default();

        let report = runner.run(&job, &sink).await;

        let events = sink.events.lock().await;
        let progress: Vec<_> = events
            .iter()
            .map(|(p, _)| (p.index, p.total, p.target.as_str()))
            .collect();
        assert_eq!(progress, vec![(1, 3, "a"), (2, 3, "b"), (3, 3, "c")]);
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.succeeded(), 3);
    }

    #[tokio::test]
    async fn test_failed_target_does_not_abort_batch() {
        let mut resolver = MockTargetResolver::new();
        resolver.expect_resolve().returning(|target| {
            if target == "broken" {
                Err(ResolveError::EmptyTarget)
            } else {
                Ok(vec![MethodResult::sent(1, "ok")])
            }
        });
        let runner = BatchRunner::new(Arc::new(resolver), Arc::new(FixedDelay(Duration::ZERO)));
        let job = BatchJob::parse("first\nbroken\nlast").expect("valid job");

        let report = runner.run(&job, &RecordingSink::default()).await;

        assert_eq!(report.outcomes.len(), 3);
        assert!(matches!(report.outcomes[1].status, TargetStatus::Failed(_)));
        assert_eq!(report.outcomes[2].target, "last");
        assert!(report.outcomes[2].any_success());
        assert_eq!(report.succeeded(), 2);
    }

    #[test]
    fn test_rate_limit_is_detected_per_target() {
        let throttled = TargetOutcome {
            target: "alice".to_string(),
            status: TargetStatus::Resolved(vec![
                MethodResult::sent(1, "ok"),
                MethodResult::failed(2, FailureKind::RateLimited, "slow down"),
            ]),
        };
        let failed = TargetOutcome {
            target: "bob".to_string(),
            status: TargetStatus::Failed("boom".to_string()),
        };

        assert!(throttled.hit_rate_limit());
        assert!(throttled.any_success());
        assert!(!failed.hit_rate_limit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_between_consecutive_targets() {
        let delay = Duration::from_secs(2);
        let runner = BatchRunner::new(Arc::new(ok_resolver()), Arc::new(FixedDelay(delay)));
        let job = BatchJob::parse("a\nb\nc").expect("valid job");
        let sink = RecordingSink::default();

        let started = Instant::now();
        runner.run(&job, &sink).await;

        let events = sink.events.lock().await;
        for pair in events.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= delay);
        }
        // No trailing pause after the last target
        assert!(started.elapsed() < delay * 3);
    }

    #[test]
    fn test_report_rendering() {
        let report = BatchReport {
            outcomes: vec![
                TargetOutcome {
                    target: "alice".to_string(),
                    status: TargetStatus::Resolved(vec![MethodResult::sent(1, "ok")]),
                },
                TargetOutcome {
                    target: "bob".to_string(),
                    status: TargetStatus::Failed("boom".to_string()),
                },
            ],
        };

        let rendered = report.render();
        assert!(rendered.starts_with("🎉 Bulk Processing Complete!"));
        assert!(rendered.contains("1/2 targets"));
        assert_eq!(rendered.matches(REPORT_SEPARATOR).count(), 2);
        assert!(rendered.contains("🎯 Target: alice\n✅ Method 1: ok"));
        assert!(rendered.contains("🎯 Target: bob\n❌ Failed to process target: boom"));
    }
}
