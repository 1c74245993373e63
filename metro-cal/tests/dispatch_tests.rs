//! Integration tests for the HTTP dispatch client against a local endpoint

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use metro_cal::services::dispatch_client::{
    DispatchBatch, DispatchError, HttpDispatcher, MessageDispatcher, OutboundMessage,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Captured {
    authorization: Option<String>,
    batch: Option<DispatchBatch>,
}

type Shared = Arc<Mutex<Captured>>;

async fn receive(
    State(captured): State<Shared>,
    headers: HeaderMap,
    Json(batch): Json<DispatchBatch>,
) -> StatusCode {
    let mut captured = captured.lock().unwrap();
    captured.authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    captured.batch = Some(batch);
    StatusCode::ACCEPTED
}

/// Start a capture endpoint, returning its URL
async fn start_endpoint() -> (String, Shared) {
    let captured = Shared::default();
    let app = Router::new()
        .route("/messages", post(receive))
        .with_state(captured.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/messages", addr), captured)
}

fn message(to: &str) -> OutboundMessage {
    OutboundMessage {
        subject: "Calibration due: PAQ-01 Caliper".to_string(),
        sender: "Calibration Control".to_string(),
        recipient_name: to.to_string(),
        sender_address: "no-reply@example.com".to_string(),
        recipient_address: format!("{}@example.com", to.to_lowercase()),
        body: "Certificate C-1 due 2024-01-09".to_string(),
    }
}

#[tokio::test]
async fn test_batch_posted_with_bearer_token() {
    let (url, captured) = start_endpoint().await;
    let dispatcher =
        HttpDispatcher::new(url, Some("s3cret".to_string()), Duration::from_secs(5)).unwrap();

    let batch = DispatchBatch {
        messages: vec![message("Ana"), message("Bruno")],
    };
    let receipt = dispatcher.dispatch(&batch).await.unwrap();

    assert_eq!(receipt.http_status, 202);
    assert_eq!(receipt.accepted, 2);
    assert!(receipt.is_success());

    let captured = captured.lock().unwrap();
    assert_eq!(captured.authorization.as_deref(), Some("Bearer s3cret"));
    assert_eq!(captured.batch.as_ref(), Some(&batch));
}

#[tokio::test]
async fn test_batch_without_token_has_no_authorization() {
    let (url, captured) = start_endpoint().await;
    let dispatcher = HttpDispatcher::new(url, None, Duration::from_secs(5)).unwrap();

    dispatcher
        .dispatch(&DispatchBatch {
            messages: vec![message("Ana")],
        })
        .await
        .unwrap();

    assert!(captured.lock().unwrap().authorization.is_none());
}

#[tokio::test]
async fn test_non_success_status_is_returned() {
    let (url, _captured) = start_endpoint().await;
    let missing = url.replace("/messages", "/nowhere");
    let dispatcher = HttpDispatcher::new(missing, None, Duration::from_secs(5)).unwrap();

    let receipt = dispatcher
        .dispatch(&DispatchBatch {
            messages: vec![message("Ana")],
        })
        .await
        .unwrap();

    assert_eq!(receipt.http_status, 404);
    assert!(!receipt.is_success());
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dispatcher = HttpDispatcher::new(
        format!("http://{}/messages", addr),
        None,
        Duration::from_secs(2),
    )
    .unwrap();

    let result = dispatcher
        .dispatch(&DispatchBatch {
            messages: vec![message("Ana")],
        })
        .await;
    assert!(matches!(result, Err(DispatchError::Network(_))));
}
