//! Alert fan-out through real webhook, chat and log channels.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::Value;
use tracing_test::traced_test;

use tidewatch_core::alerts::{AlertCategory, AlertDispatcher, AlertEvent, AlertSeverity};
use tidewatch_core::config::{AlertChannelConfig, ChannelKind};
use tidewatch_core::error::ChannelError;
use tidewatch_core::tidewatch_http_client;

#[derive(Default)]
struct Inbox {
    received: Mutex<Vec<(HeaderMap, Value)>>,
}

async fn accept(
    State(inbox): State<Arc<Inbox>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    inbox.received.lock().push((headers, body));
    StatusCode::OK
}

async fn serve(inbox: Arc<Inbox>) -> SocketAddr {
    let app = Router::new()
        .route("/hook", post(accept))
        .route("/chat", post(accept))
        .route("/broken", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .with_state(inbox);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn channel(name: &str, kind: ChannelKind) -> AlertChannelConfig {
    AlertChannelConfig {
        name: name.to_string(),
        enabled: true,
        kind,
    }
}

#[tokio::test]
#[traced_test]
async fn test_failing_webhook_does_not_block_log_channel() {
    let addr = serve(Arc::new(Inbox::default())).await;
    let dispatcher = AlertDispatcher::from_config(
        &[
            channel(
                "ops-webhook",
                ChannelKind::Webhook {
                    url: Some(format!("http://{addr}/broken")),
                    api_key: None,
                    token: None,
                },
            ),
            channel("local-log", ChannelKind::Log { level: None }),
        ],
        tidewatch_http_client().unwrap(),
    );

    let alert = AlertEvent::new(
        AlertCategory::Error,
        AlertSeverity::Error,
        "Error in inventory: fetch",
        "inventory feed returned 502",
        "inventory",
    );
    let err = dispatcher.send(&alert).await.unwrap_err();

    assert_eq!(err.failures.len(), 1);
    assert_eq!(
        err.failures[0],
        ChannelError::Status {
            channel: "ops-webhook".to_string(),
            status: 500,
        }
    );
    assert!(err.to_string().contains("ops-webhook"));
    assert!(logs_contain("inventory feed returned 502"));
    assert!(logs_contain("local-log"));
}

#[tokio::test]
async fn test_webhook_body_and_auth_headers() {
    let inbox = Arc::new(Inbox::default());
    let addr = serve(inbox.clone()).await;
    let dispatcher = AlertDispatcher::from_config(
        &[channel(
            "ops",
            ChannelKind::Webhook {
                url: Some(format!("http://{addr}/hook")),
                api_key: Some("bearer-key".to_string()),
                token: Some("auth-token".to_string()),
            },
        )],
        tidewatch_http_client().unwrap(),
    );

    dispatcher.test_channels().await.unwrap();

    let received = inbox.received.lock();
    let (headers, body) = &received[0];
    assert_eq!(headers["authorization"], "Bearer bearer-key");
    assert_eq!(headers["x-auth-token"], "auth-token");
    assert_eq!(body["channel"], "ops");
    assert_eq!(body["alert"]["type"], "test");
    assert_eq!(body["alert"]["title"], "Test alert");
}

#[tokio::test]
async fn test_chat_webhook_attachment() {
    let inbox = Arc::new(Inbox::default());
    let addr = serve(inbox.clone()).await;
    let dispatcher = AlertDispatcher::from_config(
        &[channel(
            "team",
            ChannelKind::Chat {
                webhook_url: Some(format!("http://{addr}/chat")),
            },
        )],
        tidewatch_http_client().unwrap(),
    );

    let alert = AlertEvent::new(
        AlertCategory::Staleness,
        AlertSeverity::Critical,
        "Stale data detected: prices",
        "prices is two hours old",
        "prices",
    );
    dispatcher.send(&alert).await.unwrap();

    let received = inbox.received.lock();
    let attachment = &received[0].1["attachments"][0];
    assert_eq!(attachment["color"], "danger");
    assert_eq!(attachment["title"], "Stale data detected: prices");
    assert_eq!(attachment["fields"][0]["value"], "prices");
}

#[tokio::test]
async fn test_disabled_channel_skipped() {
    let inbox = Arc::new(Inbox::default());
    let addr = serve(inbox.clone()).await;
    let mut config = channel(
        "ops",
        ChannelKind::Webhook {
            url: Some(format!("http://{addr}/hook")),
            api_key: None,
            token: None,
        },
    );
    config.enabled = false;
    let dispatcher = AlertDispatcher::from_config(&[config], tidewatch_http_client().unwrap());

    dispatcher.test_channels().await.unwrap();
    assert!(inbox.received.lock().is_empty());
}
