//! Outbound replies
//!
//! The conversation emits semantic replies; the transport decides how they
//! look (formatting, keyboards, message splitting).

use super::event::Command;
use crate::batch::{BatchProgress, BatchReport};
use crate::gate::GateReport;
use crate::upstream::{render_results, MethodResult};

/// Something the conversation wants shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Top-level menu
    Menu,
    /// Usage help
    Help,
    /// Ask for one target
    SingleTargetPrompt,
    /// Ask for a newline-separated target list
    BulkTargetsPrompt,
    /// A single target is being processed
    Processing {
        /// The target
        target: String,
    },
    /// Per-strategy results for one target
    SingleReport {
        /// The target
        target: String,
        /// Results in strategy order
        results: Vec<MethodResult>,
    },
    /// A batch is about to start
    BulkStarted {
        /// Number of targets
        count: usize,
    },
    /// A batch target is about to be processed
    BatchProgress(BatchProgress),
    /// A batch finished
    BatchReport(BatchReport),
    /// Bulk input had no usable lines
    NoTargets,
    /// Bulk input exceeded the cap
    TooManyTargets {
        /// Lines submitted
        count: usize,
        /// Cap
        max: usize,
    },
    /// Processing failed unexpectedly
    Failure,
    /// The user has to join groups first
    MembershipRequired {
        /// Per-group status
        report: GateReport,
        /// Command to run once the gate passes
        requested: Command,
    },
    /// Gate re-check passed
    AccessGranted,
}

/// Plain-text single target report: title plus one line per strategy
#[must_use]
pub fn render_single_report(target: &str, results: &[MethodResult]) -> String {
    format!("📊 Results for {target}\n\n{}", render_results(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::FailureKind;

    #[test]
    fn test_single_report_example() {
        let results = vec![
            MethodResult::sent(1, "Reset link sent to a***@mail.com."),
            MethodResult::failed(2, FailureKind::Rejected, "user not found"),
            MethodResult::sent(3, "Reset link sent successfully."),
        ];

        let rendered = render_single_report("alice", &results);
        let lines: Vec<&str> = rendered.lines().skip(2).collect();

        assert_eq!(
            lines,
            vec![
                "✅ Method 1: Reset link sent to a***@mail.com.",
                "❌ Method 2: user not found",
                "✅ Method 3: Reset link sent successfully.",
            ]
        );
    }
}
