use httpmock::prelude::*;
use reclaim_core::config::RelaySettings;
use reclaim_core::resolver::{MultiMethodResolver, TargetResolver};
use reclaim_core::upstream::{
    default_strategies, render_results, FailureKind, UpstreamClient, UpstreamEndpoints,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    // RUST_LOG=reclaim_core=debug shows per-strategy outcomes
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn resolver_for(base: &str) -> MultiMethodResolver {
    let endpoints = UpstreamEndpoints::new(base, base);
    MultiMethodResolver::new(
        Arc::new(UpstreamClient::with_timeout(Duration::from_secs(5)).expect("http client")),
        default_strategies(&endpoints),
    )
}

#[tokio::test]
async fn integration_three_methods_report_in_declaration_order() {
    init_tracing();
    let server = MockServer::start();
    let web_ajax = server.mock(|when, then| {
        when.method(POST)
            .path("/accounts/account_recovery_send_ajax/")
            .header("x-requested-with", "XMLHttpRequest")
            .body_includes("email_or_username=alice");
        then.status(200)
            .body("<p>We sent an email to <b>a***@mail.com</b> with a link.</p>");
    });
    let profile = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/users/web_profile_info/")
            .query_param("username", "alice");
        then.status(404).body("");
    });
    let web_api = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/web/accounts/account_recovery_send_ajax/")
            .body_includes("flow=fxcal");
        then.status(200).json_body(json!({ "status": "ok" }));
    });

    let results = resolver_for(&server.base_url())
        .resolve("alice")
        .await
        .expect("resolve");

    web_ajax.assert();
    profile.assert();
    web_api.assert();
    assert_eq!(
        render_results(&results),
        "✅ Method 1: Reset link sent to a***@mail.com.\n\
         ❌ Method 2: Could not find a user with that username.\n\
         ✅ Method 3: Reset link sent successfully."
    );
}

#[tokio::test]
async fn integration_mobile_method_looks_up_user_id_first() {
    init_tracing();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/users/web_profile_info/");
        then.status(200)
            .json_body(json!({ "data": { "user": { "id": "12345" } } }));
    });
    let reset = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/accounts/send_password_reset/")
            .body_includes("user_id=12345")
            .body_includes("device_id=android-");
        then.status(200).json_body(json!({
            "obfuscated_email": "a***@mail.com",
            "status": "ok"
        }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/accounts/account_recovery_send_ajax/");
        then.status(400)
            .json_body(json!({ "status": "fail", "message": "No users found" }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/web/accounts/account_recovery_send_ajax/");
        then.status(500).body("oops");
    });

    let results = resolver_for(&server.base_url())
        .sequential()
        .resolve("alice")
        .await
        .expect("resolve");

    reset.assert();
    assert_eq!(results.len(), 3);
    assert!(!results[0].success);
    assert_eq!(results[0].message, "No users found");
    assert!(results[1].success);
    assert_eq!(results[1].message, "Reset link sent to a***@mail.com.");
    assert_eq!(results[2].message, "Request failed with status code 500");
}

#[tokio::test]
async fn integration_rate_limits_are_flagged() {
    let server = MockServer::start();
    server.mock(|_when, then| {
        then.status(429).body("Too Many Requests");
    });

    let results = resolver_for(&server.base_url())
        .resolve("alice")
        .await
        .expect("resolve");

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.is_rate_limited()));
    assert!(results.iter().all(|r| !r.success));
}

#[tokio::test]
async fn integration_wait_notice_counts_as_rate_limit_for_web_api() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/web/accounts/account_recovery_send_ajax/");
        then.status(400).json_body(json!({
            "status": "fail",
            "message": "Please wait a few minutes before you try again."
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/users/web_profile_info/");
        then.status(404);
    });
    server.mock(|when, then| {
        when.method(POST).path("/accounts/account_recovery_send_ajax/");
        then.status(200).body("<b>a***@mail.com</b>");
    });

    let results = resolver_for(&server.base_url())
        .resolve("alice")
        .await
        .expect("resolve");

    assert_eq!(results[2].failure, Some(FailureKind::RateLimited));
    assert_eq!(results[1].failure, Some(FailureKind::Rejected));
}

#[tokio::test]
async fn integration_unreachable_upstream_is_a_transport_failure() {
    // Nothing listens on the discard port
    let results = resolver_for("http://127.0.0.1:9")
        .resolve("alice")
        .await
        .expect("resolve");

    assert_eq!(results.len(), 3);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.index, i + 1);
        assert_eq!(result.failure, Some(FailureKind::Transport));
        assert!(result.message.starts_with("No response from upstream"));
    }
}

#[tokio::test]
async fn integration_configured_timeout_bounds_a_slow_upstream() {
    init_tracing();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/accounts/account_recovery_send_ajax/");
        then.status(200)
            .delay(Duration::from_secs(3))
            .body("<p>We sent an email to <b>late@mail.com</b>.</p>");
    });

    let settings = RelaySettings {
        upstream_timeout_secs: 1,
        ..RelaySettings::default()
    };
    let client = UpstreamClient::new(&settings).expect("http client");
    let endpoints = UpstreamEndpoints::new(&server.base_url(), &server.base_url());
    let strategies = default_strategies(&endpoints);

    let started = std::time::Instant::now();
    let result = client.attempt(1, strategies[0].as_ref(), "alice").await;

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::Transport));
    assert!(started.elapsed() < Duration::from_secs(3));
}
