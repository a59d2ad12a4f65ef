mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::IntoResponse;
use common::{bearer, json_response, spawn_upstream};
use puter_bridge::routing::dispatch::gateway_service;
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn preflight_is_answered_without_upstream_call() {
    let upstream = spawn_upstream(|_, _| StatusCode::OK.into_response(), None).await;
    let service = gateway_service(upstream.state(None), Arc::<str>::from(""));

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/v1/chat/completions")
        .header(header::ORIGIN, "https://app.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
        .body(Body::empty())
        .expect("build preflight");
    let response = service.oneshot(request).await.expect("preflight");

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "*");
    assert_eq!(upstream.call_count(), 0);
}

#[tokio::test]
async fn regular_responses_carry_allow_origin() {
    let reply = json!({"success": true, "result": {"message": {"content": "ok"}}});
    let upstream = spawn_upstream(move |_, _| json_response(StatusCode::OK, reply.clone()), None).await;
    let service = gateway_service(upstream.state(None), Arc::<str>::from(""));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/chat/completions")
        .header(header::ORIGIN, "https://app.example")
        .header(header::AUTHORIZATION, bearer())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"messages": [{"role": "user", "content": "hi"}]}).to_string(),
        ))
        .expect("build request");
    let response = service.clone().oneshot(request).await.expect("chat");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let request = Request::builder()
        .uri("/v1/unknown")
        .header(header::ORIGIN, "https://app.example")
        .body(Body::empty())
        .expect("build request");
    let response = service.oneshot(request).await.expect("not found");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
