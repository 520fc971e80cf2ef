//! Webhook routing, health and status endpoints

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use call_intake_server::create_router;
use common::{test_state, PUBLIC_HOST};

async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn webhook(call_sid: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/incoming")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!(
            "AccountSid=AC1&CallSid={}&From=%2B15550100&CallStatus=ringing",
            call_sid
        )))
        .unwrap()
}

#[tokio::test]
async fn test_new_call_connects_to_stream() {
    let (state, _transcripts) = test_state(vec![]);
    let app = create_router(state);

    let (status, body) = send(app, webhook("CA1")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(&format!(
        r#"<Connect action="https://{}/incoming"><Stream url="wss://{}/connection"/></Connect>"#,
        PUBLIC_HOST, PUBLIC_HOST
    )));
    assert!(!body.contains("<Dial>"));
}

#[tokio::test]
async fn test_transferred_call_dials_once() {
    let (state, _transcripts) = test_state(vec![]);
    state.registry.mark_due("CA1");
    let app = create_router(state);

    let (status, body) = send(app.clone(), webhook("CA1")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<Dial>+16156175000</Dial>"));

    // a retried webhook must not transfer twice
    let (_, body) = send(app, webhook("CA1")).await;
    assert!(body.contains("<Connect"));
}

#[tokio::test]
async fn test_call_sid_from_query() {
    let (state, _transcripts) = test_state(vec![]);
    state.registry.mark_due("CA2");
    let app = create_router(state);

    let request = Request::builder()
        .uri("/incoming?CallSid=CA2")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<Dial>"));
}

#[tokio::test]
async fn test_missing_call_sid_connects() {
    let (state, _transcripts) = test_state(vec![]);
    let app = create_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/incoming")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<Stream"));
}

#[tokio::test]
async fn test_health_check() {
    let (state, _transcripts) = test_state(vec![]);
    let app = create_router(state);

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_status_lists_pending_transfers() {
    let (state, _transcripts) = test_state(vec![]);
    state.registry.mark_due("CA9");
    let app = create_router(state);

    let request = Request::builder().uri("/status").body(Body::empty()).unwrap();
    let (_, body) = send(app, request).await;

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["activeCalls"], 0);
    assert_eq!(json["pendingTransfers"], 1);
    assert_eq!(json["pendingTransferDetails"][0]["callSid"], "CA9");
}
