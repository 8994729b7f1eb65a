//! Conversation state machine
//!
//! Single dispatch point for every inbound event. Decides, per user, whether
//! text is a target, a target list or noise, consults the membership gate
//! and drives the resolver or the batch runner.

mod event;
mod reply;

pub use event::{CallbackAction, Command, InboundEvent};
pub use reply::{render_single_report, Reply};

use crate::batch::{BatchJob, BatchProgress, BatchRunner, ProgressSink, ValidationError};
use crate::gate::MembershipGate;
use crate::resolver::TargetResolver;
use crate::session::{ConversationState, SessionStore};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outbound side of the chat platform
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Send a new message
    async fn send(&self, chat_id: i64, reply: Reply) -> Result<()>;

    /// Replace the content of an existing message
    async fn edit(&self, chat_id: i64, message_id: i32, reply: Reply) -> Result<()>;
}

/// Forwards batch progress to the chat; delivery errors never stop the batch
struct ChatProgress {
    gateway: Arc<dyn ChatGateway>,
    chat_id: i64,
}

#[async_trait]
impl ProgressSink for ChatProgress {
    async fn on_progress(&self, progress: BatchProgress) {
        if let Err(e) = self
            .gateway
            .send(self.chat_id, Reply::BatchProgress(progress))
            .await
        {
            warn!("Failed to deliver batch progress: {e}");
        }
    }
}

/// Per-user conversation state machine
pub struct Conversation {
    sessions: Arc<dyn SessionStore>,
    resolver: Arc<dyn TargetResolver>,
    batch: Arc<BatchRunner>,
    gate: Option<Arc<MembershipGate>>,
    gateway: Arc<dyn ChatGateway>,
}

impl Conversation {
    /// Create a conversation without a membership gate
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        resolver: Arc<dyn TargetResolver>,
        batch: Arc<BatchRunner>,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        Self {
            sessions,
            resolver,
            batch,
            gate: None,
            gateway,
        }
    }

    /// Require group membership before any command or input is served
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<MembershipGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Handle one inbound event.
    ///
    /// # Errors
    ///
    /// Returns an error only when a reply could not be delivered.
    #[instrument(skip(self, event), fields(user_id = event.user_id()))]
    pub async fn dispatch(&self, event: InboundEvent) -> Result<()> {
        match event {
            InboundEvent::Command {
                user_id,
                chat_id,
                command,
            } => self.on_command(user_id, chat_id, command).await,
            InboundEvent::Text {
                user_id,
                chat_id,
                text,
            } => self.on_text(user_id, chat_id, &text).await,
            InboundEvent::Callback {
                user_id,
                chat_id,
                message_id,
                action,
            } => self.on_callback(user_id, chat_id, message_id, action).await,
        }
    }

    async fn on_command(&self, user_id: i64, chat_id: i64, command: Command) -> Result<()> {
        if !self.ensure_access(user_id, chat_id, &command).await? {
            return Ok(());
        }
        self.run_command(user_id, chat_id, command).await
    }

    async fn run_command(&self, user_id: i64, chat_id: i64, command: Command) -> Result<()> {
        let reply = match command {
            Command::Start | Command::Unknown(_) => {
                self.sessions.clear(user_id).await;
                Reply::Menu
            }
            Command::Help => {
                self.sessions.clear(user_id).await;
                Reply::Help
            }
            Command::Reset => {
                self.sessions
                    .set(user_id, ConversationState::AwaitingSingleTarget)
                    .await;
                Reply::SingleTargetPrompt
            }
            Command::BulkReset => {
                self.sessions
                    .set(user_id, ConversationState::AwaitingBulkTargets)
                    .await;
                Reply::BulkTargetsPrompt
            }
        };
        self.gateway.send(chat_id, reply).await
    }

    async fn on_text(&self, user_id: i64, chat_id: i64, text: &str) -> Result<()> {
        match self.sessions.state(user_id).await {
            ConversationState::Idle => self.gateway.send(chat_id, Reply::Menu).await,
            ConversationState::AwaitingSingleTarget => {
                if !self.ensure_access(user_id, chat_id, &Command::Reset).await? {
                    return Ok(());
                }
                self.sessions.clear(user_id).await;
                let outcome = self.process_single(chat_id, text.trim()).await;
                self.finish(user_id, chat_id, outcome).await
            }
            ConversationState::AwaitingBulkTargets => {
                let job = match BatchJob::parse(text) {
                    Ok(job) => job,
                    Err(e) => return self.reject_bulk(chat_id, e).await,
                };
                if !self
                    .ensure_access(user_id, chat_id, &Command::BulkReset)
                    .await?
                {
                    return Ok(());
                }
                self.sessions.clear(user_id).await;
                let outcome = self.process_bulk(chat_id, &job).await;
                self.finish(user_id, chat_id, outcome).await
            }
        }
    }

    async fn on_callback(
        &self,
        user_id: i64,
        chat_id: i64,
        message_id: i32,
        action: CallbackAction,
    ) -> Result<()> {
        let CallbackAction::RecheckMembership(requested) = action;
        let Some(gate) = &self.gate else {
            return self.run_command(user_id, chat_id, requested).await;
        };

        let report = gate.check_all(user_id).await;
        if report.satisfied {
            info!(user_id, "Membership re-check passed");
            self.gateway
                .edit(chat_id, message_id, Reply::AccessGranted)
                .await?;
            self.run_command(user_id, chat_id, requested).await
        } else {
            self.gateway
                .edit(
                    chat_id,
                    message_id,
                    Reply::MembershipRequired { report, requested },
                )
                .await
        }
    }

    /// Returns `false` (after showing the gate) when the user is blocked
    async fn ensure_access(&self, user_id: i64, chat_id: i64, requested: &Command) -> Result<bool> {
        let Some(gate) = &self.gate else {
            return Ok(true);
        };

        let report = gate.check_all(user_id).await;
        if report.satisfied {
            return Ok(true);
        }

        info!(
            user_id,
            missing = report.missing().len(),
            "Blocked by membership gate"
        );
        self.sessions.clear(user_id).await;
        self.gateway
            .send(
                chat_id,
                Reply::MembershipRequired {
                    report,
                    requested: requested.clone(),
                },
            )
            .await?;
        Ok(false)
    }

    async fn reject_bulk(&self, chat_id: i64, error: ValidationError) -> Result<()> {
        let reply = match error {
            ValidationError::Empty => Reply::NoTargets,
            ValidationError::TooMany { count, max } => Reply::TooManyTargets { count, max },
        };
        self.gateway.send(chat_id, reply).await
    }

    async fn process_single(&self, chat_id: i64, target: &str) -> Result<()> {
        self.gateway
            .send(
                chat_id,
                Reply::Processing {
                    target: target.to_string(),
                },
            )
            .await?;

        let results = self.resolver.resolve(target).await?;
        self.gateway
            .send(
                chat_id,
                Reply::SingleReport {
                    target: target.to_string(),
                    results,
                },
            )
            .await
    }

    async fn process_bulk(&self, chat_id: i64, job: &BatchJob) -> Result<()> {
        info!(targets = job.len(), "Starting bulk reset");
        self.gateway
            .send(chat_id, Reply::BulkStarted { count: job.len() })
            .await?;

        let sink = ChatProgress {
            gateway: Arc::clone(&self.gateway),
            chat_id,
        };
        let report = self.batch.run(job, &sink).await;
        self.gateway.send(chat_id, Reply::BatchReport(report)).await
    }

    /// Terminal handling shared by single and bulk flows
    async fn finish(&self, user_id: i64, chat_id: i64, outcome: Result<()>) -> Result<()> {
        let Err(e) = outcome else {
            return Ok(());
        };
        warn!(user_id, "Processing failed: {e:#}");
        self.sessions.clear(user_id).await;
        self.gateway.send(chat_id, Reply::Failure).await
    }
}
