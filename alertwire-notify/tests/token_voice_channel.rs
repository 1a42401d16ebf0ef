//! Token voice calls: login, refresh, single-flight renewal and fan-out.

use alertwire_notify::{
    Alert, CancellationToken, DispatchError, DispatchOutcome, HandlebarsRenderer,
    NotificationChannel, TokenState, TokenVoiceChannel, TokenVoiceConfig, Transport,
};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGIN: &str = "/rest/fastlogin/v1.0";
const REFRESH: &str = "/omp/oauth/refresh";
const CALL: &str = "/rest/httpsessions/callnotify/v2.0";

fn alerts() -> Vec<Alert> {
    vec![Alert::new(Utc::now()).label("alertname", "NodeDown")]
}

fn channel(server: &MockServer, roster: &[&str]) -> TokenVoiceChannel {
    TokenVoiceChannel::new(
        TokenVoiceConfig::new(server.uri(), "key-1", "app-secret", "ops", "Basic b3Bz")
            .call("+861000", "tpl-1")
            .templates("{{status}}", "{{firing}}")
            .roster(roster.iter().map(|r| r.to_string()).collect()),
        Transport::default_transport().unwrap(),
        Arc::new(HandlebarsRenderer::new()),
    )
    .unwrap()
}

fn token_body(access: &str, refresh: &str) -> Value {
    json!({
        "resultcode": "0",
        "resultdesc": "Success",
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": 172800
    })
}

async fn mount_login(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .and(query_param("app_key", "key-1"))
        .and(query_param("username", "ops"))
        .and(header("authorization", "Basic b3Bz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", "rt-1")))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_call(server: &MockServer, access_token: &str, expected: u64) {
    Mock::given(method("POST"))
        .and(path(CALL))
        .and(query_param("app_key", "key-1"))
        .and(query_param("access_token", access_token))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"resultcode": "0", "resultdesc": "Success"})),
        )
        .expect(expected)
        .mount(server)
        .await;
}

fn aged(hours: i64, minutes: i64, seconds: i64) -> TokenState {
    let issued_at = Utc::now()
        - ChronoDuration::hours(hours)
        - ChronoDuration::minutes(minutes)
        - ChronoDuration::seconds(seconds);
    TokenState::new("at-old", "rt-old", issued_at)
}

#[tokio::test]
async fn test_login_then_call() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    mount_call(&server, "at-1", 1).await;

    let channel = channel(&server, &["13800000000"]);
    channel.notify(&CancellationToken::new(), &alerts()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let call = requests.iter().find(|r| r.url.path() == CALL).unwrap();
    let body: Value = serde_json::from_slice(&call.body).unwrap();
    assert_eq!(body["displayNbr"], "+861000");
    assert_eq!(body["calleeNbr"], "+8613800000000");
    assert_eq!(body["playInfoList"][0]["templateId"], "tpl-1");
    assert_eq!(body["playInfoList"][0]["templateParas"], json!(["1"]));

    let state = channel.credentials().state();
    assert_eq!(state.access_token, "at-1");
    assert_eq!(state.refresh_token, "rt-1");
    assert!(state.issued_at.is_some());
}

#[tokio::test]
async fn test_login_rejection_is_retryable_and_calls_nobody() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .expect(1)
        .mount(&server)
        .await;
    mount_call(&server, "at-1", 0).await;

    let (retryable, err) = channel(&server, &["1"])
        .notify(&CancellationToken::new(), &alerts())
        .await
        .into_parts();
    assert!(retryable);
    assert!(matches!(err, Some(DispatchError::TokenAcquisition(_))));
}

#[tokio::test]
async fn test_stale_token_is_refreshed() {
    let server = MockServer::start().await;
    mount_login(&server, 0).await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .and(query_param("app_key", "key-1"))
        .and(query_param("app_secret", "app-secret"))
        .and(query_param("grant_type", "refresh_token"))
        .and(query_param("refresh_token", "rt-old"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-2", "rt-2")))
        .expect(1)
        .mount(&server)
        .await;
    mount_call(&server, "at-2", 1).await;

    let channel = channel(&server, &["1"]).with_token_state(aged(47, 0, 1));
    channel.notify(&CancellationToken::new(), &alerts()).await.unwrap();

    let state = channel.credentials().state();
    assert_eq!(state.access_token, "at-2");
    assert_eq!(state.refresh_token, "rt-2");
}

#[tokio::test]
async fn test_token_younger_than_threshold_is_reused() {
    let server = MockServer::start().await;
    mount_login(&server, 0).await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-2", "rt-2")))
        .expect(0)
        .mount(&server)
        .await;
    mount_call(&server, "at-old", 1).await;

    let channel = channel(&server, &["1"]).with_token_state(aged(46, 59, 0));
    channel.notify(&CancellationToken::new(), &alerts()).await.unwrap();
    assert_eq!(channel.credentials().state().access_token, "at-old");
}

#[tokio::test]
async fn test_refresh_failure_keeps_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    mount_call(&server, "at-old", 0).await;

    let channel = channel(&server, &["1"]).with_token_state(aged(48, 0, 0));
    let before = channel.credentials().state();

    let (retryable, err) = channel
        .notify(&CancellationToken::new(), &alerts())
        .await
        .into_parts();
    assert!(retryable);
    assert!(matches!(err, Some(DispatchError::TokenRefresh(_))));

    let after = channel.credentials().state();
    assert_eq!(after.access_token, before.access_token);
    assert_eq!(after.refresh_token, before.refresh_token);
    assert_eq!(after.issued_at, before.issued_at);
}

#[tokio::test]
async fn test_concurrent_notifies_share_one_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("at-1", "rt-1"))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_call(&server, "at-1", 8).await;

    let channel = Arc::new(channel(&server, &["1"]));
    let cancel = CancellationToken::new();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let channel = Arc::clone(&channel);
            let cancel = cancel.clone();
            tokio::spawn(async move { channel.notify(&cancel, &alerts()).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_failed_recipient_does_not_stop_the_others() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("POST"))
        .and(path(CALL))
        .and(body_partial_json(json!({"calleeNbr": "+86222"})))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    mount_call(&server, "at-1", 4).await;

    let channel = channel(&server, &["111", "222", "333"]);
    let cancel = CancellationToken::new();

    channel.notify(&cancel, &alerts()).await.unwrap();

    let report = channel.deliver(&cancel, &alerts()).await.unwrap();
    assert!(!report.all_delivered());
    assert_eq!(report.delivered().collect::<Vec<_>>(), vec!["111", "333"]);

    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "222");
    assert!(failed[0].1.is_retryable());
}

#[tokio::test]
async fn test_result_code_rejection_is_recorded() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("POST"))
        .and(path(CALL))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"resultcode": "1010010", "resultdesc": "callee blocked"})),
        )
        .mount(&server)
        .await;

    let report = channel(&server, &["1"])
        .deliver(&CancellationToken::new(), &alerts())
        .await
        .unwrap();
    let (recipient, err) = report.failed().next().unwrap();
    assert_eq!(recipient, "1");
    assert!(matches!(err, DispatchError::Rejected { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_cancelled_before_login() {
    let server = MockServer::start().await;
    mount_login(&server, 0).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let (retryable, err) = channel(&server, &["1"]).notify(&cancel, &alerts()).await.into_parts();
    assert!(retryable);
    assert!(err.unwrap().is_cancelled());
}
