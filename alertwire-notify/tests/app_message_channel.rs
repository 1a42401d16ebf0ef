//! Corp app message delivery with cached tokens.

use alertwire_notify::{
    Alert, AppMessageChannel, AppMessageConfig, CancellationToken, DispatchError, DispatchOutcome,
    HandlebarsRenderer, NotificationChannel, Transport,
};
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn alerts() -> Vec<Alert> {
    vec![Alert::new(Utc::now()).label("alertname", "HighLatency")]
}

fn channel(server: &MockServer) -> AppMessageChannel {
    AppMessageChannel::new(
        AppMessageConfig::new("corp-1", "corp-secret", "1001")
            .base_url(server.uri())
            .templates("{{status}}", "{{#each alerts}}{{labels.alertname}} ({{labels.oncall}}){{/each}}")
            .roster(vec!["u1".into(), "u2".into()]),
        Transport::default_transport().unwrap(),
        Arc::new(HandlebarsRenderer::new()),
    )
    .unwrap()
}

async fn mount_token(server: &MockServer, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/gettoken"))
        .and(query_param("corpid", "corp-1"))
        .and(query_param("corpsecret", "corp-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": 0,
            "errmsg": "ok",
            "access_token": "corp-token",
            "expires_in": 7200
        })))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_token_acquired_once_and_reused() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/message/send"))
        .and(query_param("access_token", "corp-token"))
        .and(body_partial_json(json!({"touser": "u1|u2", "agentid": "1001", "msgtype": "markdown"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0, "errmsg": "ok"})))
        .expect(2)
        .mount(&server)
        .await;

    let channel = channel(&server);
    let cancel = CancellationToken::new();
    channel.notify(&cancel, &alerts()).await.unwrap();
    channel.notify(&cancel, &alerts()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let send = requests.iter().find(|r| r.url.path() == "/message/send").unwrap();
    let body: Value = serde_json::from_slice(&send.body).unwrap();
    assert_eq!(body["markdown"]["title"], "firing");
    assert_eq!(body["markdown"]["text"], "HighLatency (u1,u2)");
}

#[tokio::test]
async fn test_token_failure_is_retryable_and_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gettoken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/message/send"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (retryable, err) = channel(&server)
        .notify(&CancellationToken::new(), &alerts())
        .await
        .into_parts();
    assert!(retryable);
    assert!(matches!(err, Some(DispatchError::TokenAcquisition(_))));
}

#[tokio::test]
async fn test_remote_error_code_is_permanent() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/message/send"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"errcode": 60020, "errmsg": "ip not in whitelist"})),
        )
        .mount(&server)
        .await;

    let (retryable, err) = channel(&server)
        .notify(&CancellationToken::new(), &alerts())
        .await
        .into_parts();
    assert!(!retryable);
    let err = err.unwrap();
    assert!(matches!(err, DispatchError::Rejected { .. }));
    assert!(err.to_string().contains("60020"));
    assert!(!err.to_string().contains("corp-token"));
}

#[tokio::test]
async fn test_malformed_response_is_permanent() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/message/send"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let (retryable, err) = channel(&server)
        .notify(&CancellationToken::new(), &alerts())
        .await
        .into_parts();
    assert!(!retryable);
    assert!(matches!(err, Some(DispatchError::MalformedResponse { .. })));
}
