//! Upstream recovery client
//!
//! Issues outbound HTTP calls to the account-recovery endpoints and normalizes
//! every outcome (including transport failures) into a [`MethodResult`].

mod client;
pub mod strategies;

pub use client::{classify, UpstreamClient};
pub use strategies::{default_strategies, MobileApiStrategy, UpstreamEndpoints, WebAjaxStrategy, WebApiStrategy};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while talking to the upstream service
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// No response reached us (connect failure, timeout, broken body)
    #[error("No response from upstream: {0}")]
    Transport(String),
    /// Upstream explicitly asked us to slow down
    #[error("Rate limited. Please wait a while before trying again.")]
    RateLimited,
    /// Well-formed response indicating failure
    #[error("{0}")]
    Rejected(String),
}

impl UpstreamError {
    /// Failure class of this error
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) => FailureKind::Transport,
            Self::RateLimited => FailureKind::RateLimited,
            Self::Rejected(_) => FailureKind::Rejected,
        }
    }
}

/// Class of a failed recovery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No response reached us
    Transport,
    /// Explicit throttling signal
    RateLimited,
    /// Upstream answered with a failure
    Rejected,
}

/// Outcome of one recovery strategy for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodResult {
    /// 1-based position of the strategy in declaration order
    pub index: usize,
    /// Whether the upstream confirmed the reset
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
    /// Failure class, `None` on success
    pub failure: Option<FailureKind>,
}

impl MethodResult {
    /// Successful attempt
    #[must_use]
    pub fn sent(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            success: true,
            message: message.into(),
            failure: None,
        }
    }

    /// Failed attempt
    #[must_use]
    pub fn failed(index: usize, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            index,
            success: false,
            message: message.into(),
            failure: Some(kind),
        }
    }

    /// Success/failure marker used in rendered reports
    #[must_use]
    pub const fn marker(&self) -> &'static str {
        if self.success {
            "✅"
        } else {
            "❌"
        }
    }

    /// Whether the attempt was throttled by the upstream
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.failure == Some(FailureKind::RateLimited)
    }

    /// Render as a single report line, e.g. `✅ Method 1: Reset link sent to a***@mail.com.`
    #[must_use]
    pub fn render_line(&self) -> String {
        format!("{} Method {}: {}", self.marker(), self.index, self.message)
    }
}

/// Render results one line per strategy, in the order given.
#[must_use]
pub fn render_results(results: &[MethodResult]) -> String {
    results
        .iter()
        .map(MethodResult::render_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A single outbound HTTP call described by a strategy
#[derive(Debug, Clone)]
pub struct RecoveryRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Query string parameters
    pub query: Vec<(&'static str, String)>,
    /// Request headers
    pub headers: Vec<(&'static str, String)>,
    /// Form-url-encoded body fields (empty means no body)
    pub form: Vec<(&'static str, String)>,
}

impl RecoveryRequest {
    /// GET request without body
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            form: Vec::new(),
        }
    }

    /// POST request with a form body
    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            ..Self::get(url)
        }
    }

    /// Add a query string parameter
    #[must_use]
    pub fn param(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.query.push((name, value.into()));
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Add a form field
    #[must_use]
    pub fn field(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.form.push((name, value.into()));
        self
    }
}

/// Raw upstream response handed to the strategy parser
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Response body as text
    pub body: String,
}

impl UpstreamResponse {
    /// Parse the body as JSON, `None` if it is not JSON
    #[must_use]
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// Upstream-provided `message` field, if the body is JSON and carries one
    #[must_use]
    pub fn json_message(&self) -> Option<String> {
        self.json()?
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .map(ToString::to_string)
    }
}

/// What a strategy concluded from a successful HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Reset accepted, with the masked destination when the upstream disclosed it
    Sent {
        /// Masked destination (e.g. `a***@mail.com`)
        destination: Option<String>,
    },
    /// Reset refused, with the upstream reason when present
    Rejected {
        /// Upstream-provided reason
        reason: Option<String>,
    },
}

/// One independent recovery attempt against a specific upstream endpoint.
///
/// Request building and response parsing are separate so each strategy can
/// carry its own parsing policy (HTML scraping, JSON inspection) while the
/// client stays uniform.
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Turn the user-supplied target into the subject of the reset request.
    ///
    /// Most strategies use the target as is; multi-step strategies can look
    /// something up first.
    async fn resolve_subject(
        &self,
        _client: &UpstreamClient,
        target: &str,
    ) -> Result<String, UpstreamError> {
        Ok(target.to_string())
    }

    /// Build the reset request for a subject
    fn build_request(&self, subject: &str) -> RecoveryRequest;

    /// Whether the response is a throttling signal
    fn is_rate_limited(&self, response: &UpstreamResponse) -> bool {
        response.status == StatusCode::TOO_MANY_REQUESTS
    }

    /// Interpret a 2xx response
    fn parse_response(&self, response: &UpstreamResponse) -> Outcome;
}
