use super::{MethodResult, Outcome, RecoveryRequest, RecoveryStrategy, UpstreamError, UpstreamResponse};
use crate::config::RelaySettings;
use reqwest::Client as HttpClient;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// HTTP client for the upstream recovery endpoints.
///
/// Never retries: one [`attempt`](Self::attempt) is exactly one reset call
/// (plus whatever lookup the strategy needs first).
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: HttpClient,
}

impl UpstreamClient {
    /// Create a client with the configured upstream timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(settings: &RelaySettings) -> Result<Self, reqwest::Error> {
        Self::with_timeout(settings.upstream_timeout())
    }

    /// Create a client with an explicit timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Run one strategy against one target.
    ///
    /// Every failure mode is folded into the returned [`MethodResult`].
    #[instrument(skip(self, strategy), fields(strategy = strategy.name()))]
    pub async fn attempt(
        &self,
        index: usize,
        strategy: &dyn RecoveryStrategy,
        target: &str,
    ) -> MethodResult {
        let result = match self.try_attempt(strategy, target).await {
            Ok(Outcome::Sent {
                destination: Some(destination),
            }) => MethodResult::sent(index, format!("Reset link sent to {destination}.")),
            Ok(Outcome::Sent { destination: None }) => {
                MethodResult::sent(index, "Reset link sent successfully.")
            }
            Ok(Outcome::Rejected { reason }) => {
                let err = UpstreamError::Rejected(
                    reason.unwrap_or_else(|| "An unknown error occurred.".to_string()),
                );
                MethodResult::failed(index, err.kind(), err.to_string())
            }
            Err(err) => MethodResult::failed(index, err.kind(), err.to_string()),
        };

        debug!(success = result.success, message = %result.message, "Strategy finished");
        result
    }

    async fn try_attempt(
        &self,
        strategy: &dyn RecoveryStrategy,
        target: &str,
    ) -> Result<Outcome, UpstreamError> {
        let subject = strategy.resolve_subject(self, target).await?;
        let response = self.execute(&strategy.build_request(&subject)).await?;
        classify(strategy, &response)
    }

    /// Send a request and read the whole body.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Transport` when no complete response was received.
    pub async fn execute(&self, request: &RecoveryRequest) -> Result<UpstreamResponse, UpstreamError> {
        let mut builder = self.http.request(request.method.clone(), &request.url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(url = %request.url, error = %e, "Upstream request failed");
            UpstreamError::Transport(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(UpstreamResponse { status, body })
    }
}

/// Classify a received response: rate limit first, then HTTP failure, then
/// the strategy's own parsing policy.
///
/// # Errors
///
/// Returns `RateLimited` or `Rejected` for throttled and non-2xx responses.
pub fn classify(
    strategy: &dyn RecoveryStrategy,
    response: &UpstreamResponse,
) -> Result<Outcome, UpstreamError> {
    if strategy.is_rate_limited(response) {
        return Err(UpstreamError::RateLimited);
    }

    if !response.status.is_success() {
        let message = response.json_message().unwrap_or_else(|| {
            format!(
                "Request failed with status code {}",
                response.status.as_u16()
            )
        });
        return Err(UpstreamError::Rejected(message));
    }

    Ok(strategy.parse_response(response))
}
