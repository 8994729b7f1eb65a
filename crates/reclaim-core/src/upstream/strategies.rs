//! Built-in recovery strategies.
//!
//! Each strategy owns its endpoint, device identity, body shape and parsing
//! policy. The order of [`default_strategies`] is the order results are
//! reported in.

// lazy_regex! statics are validated at compile time
#![allow(clippy::non_std_lazy_statics)]

use super::{
    classify, Outcome, RecoveryRequest, RecoveryStrategy, UpstreamClient, UpstreamError,
    UpstreamResponse,
};
use crate::config::RelaySettings;
use async_trait::async_trait;
use lazy_regex::lazy_regex;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Desktop browser identity used by the HTML recovery form
pub const USER_AGENT_WEB: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
/// Second browser identity used by the JSON web API
pub const USER_AGENT_WEB_API: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15";
/// Mobile app identity used by the private API
pub const USER_AGENT_MOBILE: &str = "Instagram 27.0.0.7.97 Android (24/7.0; 120dpi; 720x1280; samsung; SM-G935F; herolte; samsungexynos8890; en_US)";
/// Web application id expected by the JSON endpoints
pub const WEB_APP_ID: &str = "936619743392459";

const GENERIC_DESTINATION: &str = "an associated email";
const USER_NOT_FOUND: &str = "Could not find a user with that username.";

/// Masked destination inside the HTML fragment: `<b>a***@mail.com</b>`
static RE_BOLD_DESTINATION: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"<b>(.*?)</b>");

/// Throttling notice embedded in otherwise ordinary JSON failures
static RE_WAIT_NOTICE: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(?i)please wait a few minutes");

/// Base URLs of the upstream hosts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEndpoints {
    /// Web host, e.g. `https://www.instagram.com`
    pub web: String,
    /// Mobile API host, e.g. `https://i.instagram.com`
    pub mobile: String,
}

impl UpstreamEndpoints {
    /// Endpoints from relay settings, trailing slashes trimmed
    #[must_use]
    pub fn from_settings(settings: &RelaySettings) -> Self {
        Self::new(&settings.upstream_web_base, &settings.upstream_mobile_base)
    }

    /// Endpoints from explicit base URLs
    #[must_use]
    pub fn new(web: &str, mobile: &str) -> Self {
        Self {
            web: web.trim_end_matches('/').to_string(),
            mobile: mobile.trim_end_matches('/').to_string(),
        }
    }
}

/// The three strategies in their reporting order.
#[must_use]
pub fn default_strategies(endpoints: &UpstreamEndpoints) -> Vec<Arc<dyn RecoveryStrategy>> {
    vec![
        Arc::new(WebAjaxStrategy::new(endpoints.web.clone())),
        Arc::new(MobileApiStrategy::new(
            endpoints.web.clone(),
            endpoints.mobile.clone(),
        )),
        Arc::new(WebApiStrategy::new(endpoints.web.clone())),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Web recovery form (HTML fragment)
// ─────────────────────────────────────────────────────────────────────────────

/// Classic recovery form endpoint answering with an HTML fragment.
#[derive(Debug, Clone)]
pub struct WebAjaxStrategy {
    base: String,
}

impl WebAjaxStrategy {
    /// Strategy against the given web host
    #[must_use]
    pub const fn new(base: String) -> Self {
        Self { base }
    }
}

#[async_trait]
impl RecoveryStrategy for WebAjaxStrategy {
    fn name(&self) -> &'static str {
        "web_ajax"
    }

    fn build_request(&self, subject: &str) -> RecoveryRequest {
        RecoveryRequest::post(format!("{}/accounts/account_recovery_send_ajax/", self.base))
            .header("User-Agent", USER_AGENT_WEB)
            .header(
                "Referer",
                format!("{}/accounts/password/reset/", self.base),
            )
            .header("X-CSRFToken", "missing")
            .header("X-Requested-With", "XMLHttpRequest")
            .field("email_or_username", subject)
            .field("recaptcha_challenge_field", "")
    }

    fn parse_response(&self, response: &UpstreamResponse) -> Outcome {
        // A JSON body here is an error envelope, not the HTML confirmation
        if let Some(json) = response.json() {
            if json.get("status").and_then(Value::as_str) == Some("fail") {
                return Outcome::Rejected {
                    reason: response.json_message(),
                };
            }
        }

        let destination = RE_BOLD_DESTINATION
            .captures(&response.body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| GENERIC_DESTINATION.to_string());

        Outcome::Sent {
            destination: Some(destination),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mobile API (profile lookup + reset)
// ─────────────────────────────────────────────────────────────────────────────

/// Two-step strategy: resolve the numeric user id, then call the mobile reset API.
#[derive(Debug, Clone)]
pub struct MobileApiStrategy {
    web: String,
    mobile: String,
}

impl MobileApiStrategy {
    /// Strategy against the given web and mobile hosts
    #[must_use]
    pub const fn new(web: String, mobile: String) -> Self {
        Self { web, mobile }
    }

    fn profile_request(&self, username: &str) -> RecoveryRequest {
        RecoveryRequest::get(format!("{}/api/v1/users/web_profile_info/", self.web))
            .param("username", username)
            .header("User-Agent", USER_AGENT_WEB)
            .header("X-IG-App-ID", WEB_APP_ID)
    }
}

#[async_trait]
impl RecoveryStrategy for MobileApiStrategy {
    fn name(&self) -> &'static str {
        "mobile_api"
    }

    async fn resolve_subject(
        &self,
        client: &UpstreamClient,
        target: &str,
    ) -> Result<String, UpstreamError> {
        let response = client.execute(&self.profile_request(target)).await?;

        if self.is_rate_limited(&response) {
            return Err(UpstreamError::RateLimited);
        }
        if !response.status.is_success() {
            return Err(UpstreamError::Rejected(USER_NOT_FOUND.to_string()));
        }

        response
            .json()
            .as_ref()
            .and_then(|json| json.pointer("/data/user/id"))
            .and_then(|id| match id {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| UpstreamError::Rejected(USER_NOT_FOUND.to_string()))
    }

    fn build_request(&self, subject: &str) -> RecoveryRequest {
        RecoveryRequest::post(format!(
            "{}/api/v1/accounts/send_password_reset/",
            self.mobile
        ))
        .header("User-Agent", USER_AGENT_MOBILE)
        .header("Accept-Language", "en-US")
        .field("user_id", subject)
        .field("device_id", format!("android-{}", Uuid::new_v4()))
    }

    fn parse_response(&self, response: &UpstreamResponse) -> Outcome {
        let Some(json) = response.json() else {
            return Outcome::Rejected { reason: None };
        };

        if json.get("status").and_then(Value::as_str) == Some("fail") {
            return Outcome::Rejected {
                reason: response.json_message(),
            };
        }

        let destination = json
            .get("obfuscated_email")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .unwrap_or_else(|| GENERIC_DESTINATION.to_string());

        Outcome::Sent {
            destination: Some(destination),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Web API (JSON)
// ─────────────────────────────────────────────────────────────────────────────

/// JSON web API variant of the recovery form.
#[derive(Debug, Clone)]
pub struct WebApiStrategy {
    base: String,
}

impl WebApiStrategy {
    /// Strategy against the given web host
    #[must_use]
    pub const fn new(base: String) -> Self {
        Self { base }
    }
}

#[async_trait]
impl RecoveryStrategy for WebApiStrategy {
    fn name(&self) -> &'static str {
        "web_api"
    }

    fn build_request(&self, subject: &str) -> RecoveryRequest {
        RecoveryRequest::post(format!(
            "{}/api/v1/web/accounts/account_recovery_send_ajax/",
            self.base
        ))
        .header("Accept", "*/*")
        .header("Origin", self.base.clone())
        .header(
            "Referer",
            format!("{}/accounts/password/reset/", self.base),
        )
        .header("User-Agent", USER_AGENT_WEB_API)
        .header("X-CSRFToken", "missing")
        .header("X-IG-App-ID", WEB_APP_ID)
        .header("X-Requested-With", "XMLHttpRequest")
        .field("email_or_username", subject)
        .field("flow", "fxcal")
    }

    fn is_rate_limited(&self, response: &UpstreamResponse) -> bool {
        response.status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || response
                .json_message()
                .is_some_and(|message| RE_WAIT_NOTICE.is_match(&message))
    }

    fn parse_response(&self, response: &UpstreamResponse) -> Outcome {
        let Some(json) = response.json() else {
            return Outcome::Rejected { reason: None };
        };

        if json.get("status").and_then(Value::as_str) == Some("ok") {
            let destination = json
                .get("contact_point")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string);
            return Outcome::Sent { destination };
        }

        Outcome::Rejected {
            reason: response.json_message(),
        }
    }
}
