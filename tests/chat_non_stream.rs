mod common;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::{bearer, dead_addr, json_response, send, spawn_upstream, state_for};
use serde_json::{json, Value};

fn parse(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("json body")
}

fn driver_success(content: &str) -> Value {
    json!({
        "success": true,
        "result": {
            "message": {"role": "assistant", "content": content},
            "usage": [{"type": "prompt", "amount": 9}, {"type": "completion", "amount": 1}]
        }
    })
}

#[tokio::test]
async fn returns_chat_completion_from_driver_reply() {
    let upstream = spawn_upstream(|_, _| json_response(StatusCode::OK, driver_success("pong")), None).await;

    let (status, _, body) = send(
        upstream.state(None),
        "POST",
        "/v1/chat/completions",
        Some(&bearer()),
        Some(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "ping"}
            ],
            "max_tokens": 16
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let completion = parse(&body);
    assert_eq!(completion["object"], "chat.completion");
    assert_eq!(completion["model"], "gpt-4o-mini");
    assert_eq!(completion["choices"][0]["message"]["role"], "assistant");
    assert_eq!(completion["choices"][0]["message"]["content"], "pong");
    assert_eq!(completion["choices"][0]["finish_reason"], "stop");
    assert_eq!(completion["usage"]["prompt_tokens"], 9);
    assert_eq!(completion["usage"]["completion_tokens"], 1);
    assert_eq!(completion["usage"]["total_tokens"], 10);
    assert!(completion["id"]
        .as_str()
        .is_some_and(|id| id.starts_with("chatcmpl-")));

    let payload = upstream.payload(0);
    assert_eq!(payload["method"], "complete");
    assert_eq!(payload["test_mode"], false);
    assert_eq!(payload["args"]["max_tokens"], 16);
    assert_eq!(payload["args"]["messages"][0]["role"], "system");
    assert_eq!(payload["args"]["messages"][1]["content"], "ping");
    assert!(payload["args"].get("stream").is_none());
}

#[tokio::test]
async fn legacy_prompt_field_becomes_user_message() {
    let upstream = spawn_upstream(|_, _| json_response(StatusCode::OK, driver_success("ok")), None).await;

    let (status, _, body) = send(
        upstream.state(None),
        "POST",
        "/v1/chat/completions",
        Some(&bearer()),
        Some(json!({"prompt": "hello there"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body)["model"], "gpt-4.1-nano");
    let payload = upstream.payload(0);
    assert_eq!(payload["args"]["model"], "gpt-4.1-nano");
    assert_eq!(
        payload["args"]["messages"],
        json!([{"role": "user", "content": "hello there"}])
    );
}

#[tokio::test]
async fn tool_calls_are_forwarded_verbatim() {
    let calls = json!([{
        "id": "call_1",
        "type": "function",
        "function": {"name": "lookup", "arguments": "{\"q\":\"rust\"}"}
    }]);
    let reply = json!({
        "success": true,
        "result": {"message": {"content": "", "tool_calls": calls.clone()}}
    });
    let upstream = spawn_upstream(move |_, _| json_response(StatusCode::OK, reply.clone()), None).await;

    let tools = json!([{"type": "function", "function": {"name": "lookup", "parameters": {}}}]);
    let (status, _, body) = send(
        upstream.state(None),
        "POST",
        "/v1/chat/completions",
        Some(&bearer()),
        Some(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "search"}],
            "tools": tools.clone()
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let completion = parse(&body);
    assert_eq!(completion["choices"][0]["message"]["tool_calls"], calls);
    assert_eq!(completion["choices"][0]["finish_reason"], "tool_calls");
    assert_eq!(upstream.payload(0)["args"]["tools"], tools);
}

#[tokio::test]
async fn temperature_dropped_for_models_that_reject_it() {
    let upstream = spawn_upstream(|_, _| json_response(StatusCode::OK, driver_success("ok")), None).await;
    let state = upstream.state(None);

    for model in ["o3-mini", "gpt-4o"] {
        let (status, _, _) = send(
            state.clone(),
            "POST",
            "/v1/chat/completions",
            Some(&bearer()),
            Some(json!({
                "model": model,
                "temperature": 0.3,
                "messages": [{"role": "user", "content": "hi"}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    assert!(upstream.payload(0)["args"].get("temperature").is_none());
    assert_eq!(upstream.payload(1)["args"]["temperature"], 0.3);
}

#[tokio::test]
async fn driver_prefix_selects_driver_and_keeps_model() {
    let upstream = spawn_upstream(|_, _| json_response(StatusCode::OK, driver_success("ok")), None).await;

    let model = "openrouter:anthropic/claude-3.5-sonnet";
    let (status, _, body) = send(
        upstream.state(None),
        "POST",
        "/v1/chat/completions",
        Some(&bearer()),
        Some(json!({"model": model, "messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body)["model"], model);
    let payload = upstream.payload(0);
    assert_eq!(payload["driver"], "openrouter");
    assert_eq!(payload["args"]["model"], model);
}

#[tokio::test]
async fn image_parts_enable_vision() {
    let upstream = spawn_upstream(|_, _| json_response(StatusCode::OK, driver_success("a cat")), None).await;

    let (status, _, _) = send(
        upstream.state(None),
        "POST",
        "/v1/chat/completions",
        Some(&bearer()),
        Some(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": [
                {"type": "text", "text": "what is this"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
            ]}]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let payload = upstream.payload(0);
    assert_eq!(payload["args"]["vision"], true);
    assert_eq!(payload["args"]["messages"][0]["content"][1]["type"], "image_url");
}

#[tokio::test]
async fn empty_messages_rejected_without_upstream_call() {
    let upstream = spawn_upstream(|_, _| json_response(StatusCode::OK, driver_success("ok")), None).await;

    let (status, _, body) = send(
        upstream.state(None),
        "POST",
        "/v1/chat/completions",
        Some(&bearer()),
        Some(json!({"model": "gpt-4o", "messages": []})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse(&body)["error"]["type"], "invalid_request_error");
    assert_eq!(upstream.call_count(), 0);
}

#[tokio::test]
async fn driver_failure_flag_maps_to_bad_gateway() {
    let reply = json!({"success": false, "error": {"message": "model not available"}});
    let upstream = spawn_upstream(move |_, _| json_response(StatusCode::OK, reply.clone()), None).await;

    let (status, _, body) = send(
        upstream.state(None),
        "POST",
        "/v1/chat/completions",
        Some(&bearer()),
        Some(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let body = parse(&body);
    assert_eq!(body["error"]["message"], "Upstream returned error");
    assert_eq!(body["error"]["details"]["error"]["message"], "model not available");
    assert!(body["error"].get("upstream_status").is_none());
}

#[tokio::test]
async fn upstream_status_maps_to_bad_gateway() {
    let upstream = spawn_upstream(
        |_, _| (StatusCode::SERVICE_UNAVAILABLE, "overloaded").into_response(),
        None,
    )
    .await;

    let (status, _, body) = send(
        upstream.state(None),
        "POST",
        "/v1/chat/completions",
        Some(&bearer()),
        Some(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let body = parse(&body);
    assert_eq!(body["error"]["message"], "Upstream status 503");
    assert_eq!(body["error"]["details"], "overloaded");
    assert_eq!(body["error"]["upstream_status"], 503);
}

#[tokio::test]
async fn unreachable_upstream_maps_to_bad_gateway() {
    let state = state_for(dead_addr().await, None);

    let (status, _, body) = send(
        state,
        "POST",
        "/v1/chat/completions",
        Some(&bearer()),
        Some(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(parse(&body)["error"]["message"]
        .as_str()
        .is_some_and(|message| message.starts_with("Upstream error")));
}

#[tokio::test]
async fn oversized_usage_amounts_saturate_total() {
    let reply = json!({
        "success": true,
        "result": {
            "message": {"content": "ok"},
            "usage": [
                {"type": "prompt", "amount": 18446744073709551615_u64},
                {"type": "completion", "amount": 5}
            ]
        }
    });
    let upstream = spawn_upstream(move |_, _| json_response(StatusCode::OK, reply.clone()), None).await;

    let (status, _, body) = send(
        upstream.state(None),
        "POST",
        "/v1/chat/completions",
        Some(&bearer()),
        Some(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let usage = &parse(&body)["usage"];
    assert_eq!(usage["prompt_tokens"], u64::MAX);
    assert_eq!(usage["total_tokens"], u64::MAX);
}
