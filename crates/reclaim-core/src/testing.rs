//! Testing helpers and mock utilities.
//!
//! Provides a recording chat gateway and canned resolver/membership mocks.

use crate::conversation::{ChatGateway, Reply};
use crate::gate::{MembershipStatus, MockMembershipLookup};
use crate::resolver::MockTargetResolver;
use crate::upstream::{FailureKind, MethodResult};
use async_trait::async_trait;
use std::sync::Mutex;

/// Chat gateway that records every reply instead of delivering it.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<(i64, Reply)>>,
    edited: Mutex<Vec<(i64, i32, Reply)>>,
    fail_sends: bool,
}

impl RecordingGateway {
    /// Gateway whose `send` always fails (edits still succeed).
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    /// Replies passed to `send`, in order.
    pub fn sent(&self) -> Vec<Reply> {
        self.sent
            .lock()
            .map(|sent| sent.iter().map(|(_, reply)| reply.clone()).collect())
            .unwrap_or_default()
    }

    /// Replies passed to `edit`, with their message ids.
    pub fn edited(&self) -> Vec<(i32, Reply)> {
        self.edited
            .lock()
            .map(|edited| {
                edited
                    .iter()
                    .map(|(_, id, reply)| (*id, reply.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn send(&self, chat_id: i64, reply: Reply) -> anyhow::Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((chat_id, reply));
        }
        if self.fail_sends {
            anyhow::bail!("chat unavailable");
        }
        Ok(())
    }

    async fn edit(&self, chat_id: i64, message_id: i32, reply: Reply) -> anyhow::Result<()> {
        if let Ok(mut edited) = self.edited.lock() {
            edited.push((chat_id, message_id, reply));
        }
        Ok(())
    }
}

/// Three-strategy results: success with a masked email, a rejection, a generic success.
#[must_use]
pub fn sample_results() -> Vec<MethodResult> {
    vec![
        MethodResult::sent(1, "Reset link sent to a***@mail.com."),
        MethodResult::failed(2, FailureKind::Rejected, "user not found"),
        MethodResult::sent(3, "Reset link sent successfully."),
    ]
}

/// Create a mock resolver that returns [`sample_results`] for every target.
#[must_use]
pub fn mock_resolver_ok() -> MockTargetResolver {
    let mut mock = MockTargetResolver::new();
    mock.expect_resolve().returning(|_| Ok(sample_results()));
    mock
}

/// Create a mock resolver that must never be called.
#[must_use]
pub fn mock_resolver_unused() -> MockTargetResolver {
    let mut mock = MockTargetResolver::new();
    mock.expect_resolve().never();
    mock
}

/// Create a membership lookup reporting the same status for every group.
#[must_use]
pub fn mock_membership(status: MembershipStatus) -> MockMembershipLookup {
    let mut mock = MockMembershipLookup::new();
    mock.expect_membership_status()
        .returning(move |_, _| Ok(status));
    mock
}
