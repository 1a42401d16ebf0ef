//! Robot webhook delivery against a mock endpoint.

use alertwire_notify::{
    ActionButton, Alert, AnnotatedBatch, ButtonOrientation, CancellationToken, DispatchError,
    DispatchOutcome, HandlebarsRenderer, NotificationChannel, RenderedMessage, RobotChannel,
    RobotConfig, TemplateError, TemplateRenderer, Transport,
};
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn alerts() -> Vec<Alert> {
    vec![
        Alert::new(Utc::now())
            .label("alertname", "DiskFull")
            .annotation("summary", "/var is 95% full"),
    ]
}

fn webhook(server: &MockServer) -> String {
    format!("{}/robot/send?access_token=robot-secret", server.uri())
}

fn channel(config: RobotConfig) -> RobotChannel {
    RobotChannel::new(
        config.templates("[{{status}}] {{firing}}", "{{#each alerts}}{{labels.alertname}}{{/each}}"),
        Transport::default_transport().unwrap(),
        Arc::new(HandlebarsRenderer::new()),
    )
    .unwrap()
}

async fn received_json(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_markdown_delivery_with_mentions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/robot/send"))
        .and(query_param("access_token", "robot-secret"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0, "errmsg": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let channel = channel(RobotConfig::new(webhook(&server)).roster(vec!["alice".into(), "bob".into()]));
    let (retryable, err) = channel.notify(&CancellationToken::new(), &alerts()).await.into_parts();
    assert!(!retryable);
    assert!(err.is_none(), "{err:?}");

    let bodies = received_json(&server).await;
    let body = &bodies[0];
    assert_eq!(body["msgtype"], "markdown");
    assert!(body.get("actionCard").is_none());
    assert_eq!(body["markdown"]["title"], "[firing] 1");
    assert_eq!(body["markdown"]["text"], "DiskFull\n@alice@bob");
    assert_eq!(body["at"]["atMobiles"], json!(["alice", "bob"]));
    assert_eq!(body["alerts"][0]["labels"]["oncall"], "alice,bob");
}

#[tokio::test]
async fn test_action_card_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/robot/send"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let channel = channel(
        RobotConfig::new(webhook(&server))
            .action_card(vec![ActionButton::new("Runbook", "https://wiki/disk")])
            .hide_avatar(true)
            .button_orientation(ButtonOrientation::Horizontal),
    );
    channel.notify(&CancellationToken::new(), &alerts()).await.unwrap();

    let bodies = received_json(&server).await;
    let body = &bodies[0];
    assert_eq!(body["msgtype"], "actionCard");
    assert!(body.get("markdown").is_none());
    assert_eq!(body["actionCard"]["btns"][0]["title"], "Runbook");
    assert_eq!(body["actionCard"]["hideAvatar"], "1");
    assert!(body.get("at").is_none());
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let channel = channel(RobotConfig::new(webhook(&server)));
    let (retryable, err) = channel.notify(&CancellationToken::new(), &alerts()).await.into_parts();

    assert!(retryable);
    let message = err.unwrap().to_string();
    assert!(message.contains("503"));
    assert!(message.contains(&format!("{}/robot/send", server.uri())));
    assert!(!message.contains("robot-secret"));
}

#[tokio::test]
async fn test_client_error_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let channel = channel(RobotConfig::new(webhook(&server)));
    let (retryable, err) = channel.notify(&CancellationToken::new(), &alerts()).await.into_parts();

    assert!(!retryable);
    let message = err.unwrap().to_string();
    assert!(message.contains("400"));
    assert!(message.contains(&format!("{}/robot/send", server.uri())));
}

#[tokio::test]
async fn test_error_code_in_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"errcode": 310000, "errmsg": "keywords not in content"})),
        )
        .mount(&server)
        .await;

    let channel = channel(RobotConfig::new(webhook(&server)));
    let err = channel.notify(&CancellationToken::new(), &alerts()).await.unwrap_err();
    assert!(matches!(err, DispatchError::Rejected { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_template_failure_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let renderer = |_: &str, _: &str, _: &AnnotatedBatch| -> Result<RenderedMessage, TemplateError> {
        Err(TemplateError::Render("unknown function".into()))
    };
    let channel = RobotChannel::new(
        RobotConfig::new(webhook(&server)),
        Transport::default_transport().unwrap(),
        Arc::new(renderer) as Arc<dyn TemplateRenderer>,
    )
    .unwrap();

    let (retryable, err) = channel.notify(&CancellationToken::new(), &alerts()).await.into_parts();
    assert!(!retryable);
    assert!(matches!(err, Some(DispatchError::Template(_))));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_retryable() {
    let channel = channel(RobotConfig::new("http://127.0.0.1:1/robot/send"));
    let (retryable, err) = channel.notify(&CancellationToken::new(), &alerts()).await.into_parts();
    assert!(retryable);
    assert!(matches!(err, Some(DispatchError::Transport { .. })));
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let channel = channel(RobotConfig::new(webhook(&server)));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let (retryable, err) = channel.notify(&cancel, &alerts()).await.into_parts();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(retryable);
    assert!(err.unwrap().is_cancelled());
}

#[test]
fn test_action_card_requires_buttons() {
    let mut config = RobotConfig::new("https://oapi.example.com/robot/send");
    config.message = alertwire_notify::RobotMessageKind::ActionCard;
    let err = RobotChannel::new(
        config,
        Transport::default_transport().unwrap(),
        Arc::new(HandlebarsRenderer::new()),
    )
    .unwrap_err();
    assert!(!err.is_retryable());
}
