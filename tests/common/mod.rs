#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use puter_bridge::config::AppConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use puter_bridge::routing::dispatch::dispatch_request;
use puter_bridge::state::AppState;
use serde_json::Value;

pub const CLIENT_KEY: &str = "client-key-0123456789";

/// In-process stand-in for the driver API.
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub calls: Arc<AtomicUsize>,
    pub payloads: Arc<Mutex<Vec<Value>>>,
    pub authorizations: Arc<Mutex<Vec<String>>>,
    server: tokio::task::JoinHandle<()>,
}

impl MockUpstream {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn payload(&self, index: usize) -> Value {
        self.payloads.lock().expect("payload lock")[index].clone()
    }

    pub fn authorization(&self, index: usize) -> String {
        self.authorizations.lock().expect("auth lock")[index].clone()
    }

    pub fn state(&self, env_token: Option<&str>) -> Arc<AppState> {
        state_for(self.addr, env_token)
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Spawn a mock upstream. `respond` receives the zero-based call index and
/// the decoded driver payload. `models` is served at `/models` when given.
pub async fn spawn_upstream<F>(respond: F, models: Option<Value>) -> MockUpstream
where
    F: Fn(usize, &Value) -> Response + Send + Sync + 'static,
{
    let respond = Arc::new(respond);
    let calls = Arc::new(AtomicUsize::new(0));
    let payloads = Arc::new(Mutex::new(Vec::new()));
    let authorizations = Arc::new(Mutex::new(Vec::new()));

    let handler_calls = Arc::clone(&calls);
    let handler_payloads = Arc::clone(&payloads);
    let handler_auth = Arc::clone(&authorizations);
    let app = Router::new()
        .route(
            "/drivers/call",
            post(move |headers: HeaderMap, body: Bytes| {
                let respond = Arc::clone(&respond);
                let calls = Arc::clone(&handler_calls);
                let payloads = Arc::clone(&handler_payloads);
                let authorizations = Arc::clone(&handler_auth);
                async move {
                    let index = calls.fetch_add(1, Ordering::SeqCst);
                    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    authorizations.lock().expect("auth lock").push(auth);
                    payloads.lock().expect("payload lock").push(payload.clone());
                    respond(index, &payload)
                }
            }),
        )
        .route(
            "/models",
            get(move || {
                let models = models.clone();
                async move {
                    match models {
                        Some(models) => Json(models).into_response(),
                        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                    }
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockUpstream {
        addr,
        calls,
        payloads,
        authorizations,
        server,
    }
}

/// An address nothing listens on.
pub async fn dead_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind spare port");
    let addr = listener.local_addr().expect("spare addr");
    drop(listener);
    addr
}

pub fn state_for(addr: SocketAddr, env_token: Option<&str>) -> Arc<AppState> {
    state_with(addr, env_token, |_| {})
}

pub fn state_with(
    addr: SocketAddr,
    env_token: Option<&str>,
    configure: impl FnOnce(&mut AppConfig),
) -> Arc<AppState> {
    let mut config = AppConfig::default();
    config.upstream.api_url = format!("http://{addr}/drivers/call");
    config.upstream.models_url = format!("http://{addr}/models");
    configure(&mut config);
    Arc::new(AppState::new(config, env_token.map(str::to_string)).expect("app state"))
}

/// How a raw streaming upstream behaves after its first body line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterFirstLine {
    /// Close the socket mid-body, without the terminating chunk.
    Close,
    /// Keep the connection open and send nothing more.
    Stall,
}

/// A single-connection upstream speaking HTTP/1.1 by hand, for failures an
/// axum handler cannot produce. The task resolves to `true` once the client
/// side of the connection is gone.
pub async fn spawn_raw_stream_upstream(
    first_line: &'static str,
    after: AfterFirstLine,
) -> (SocketAddr, tokio::task::JoinHandle<bool>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind raw upstream");
    let addr = listener.local_addr().expect("raw addr");

    let task = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        read_request(&mut socket).await;

        let line = format!("{first_line}\n");
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ntransfer-encoding: chunked\r\n\r\n{:x}\r\n{line}\r\n",
            line.len()
        );
        socket
            .write_all(response.as_bytes())
            .await
            .expect("write head");
        socket.flush().await.expect("flush");

        match after {
            AfterFirstLine::Close => {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                true
            }
            AfterFirstLine::Stall => {
                let mut buf = [0_u8; 256];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return true,
                        Ok(_) => {}
                    }
                }
            }
        }
    });

    (addr, task)
}

async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.expect("read request");
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
        let content_length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < head_end + 4 + content_length {
            let n = socket.read(&mut chunk).await.expect("read body");
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        return;
    }
}

pub fn json_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

/// A chunked body delivering each line separately.
pub fn lines_response(lines: &[&str]) -> Response {
    let chunks: Vec<Result<Bytes, Infallible>> = lines
        .iter()
        .map(|line| Ok(Bytes::from(format!("{line}\n"))))
        .collect();
    Response::new(Body::from_stream(futures_util::stream::iter(chunks)))
}

pub fn build_request(
    method: &str,
    uri: &str,
    authorization: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = authorization {
        builder = builder.header("authorization", auth);
    }
    let body = match body {
        Some(body) => Body::from(serde_json::to_vec(&body).expect("serialize request")),
        None => Body::empty(),
    };
    builder
        .header("content-type", "application/json")
        .body(body)
        .expect("build request")
}

pub async fn send(
    state: Arc<AppState>,
    method: &str,
    uri: &str,
    authorization: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Bytes) {
    let request = build_request(method, uri, authorization, body);
    let response = dispatch_request(state, Arc::<str>::from(""), request)
        .await
        .expect("dispatch");
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    (status, headers, body)
}

pub fn bearer() -> String {
    format!("Bearer {CLIENT_KEY}")
}

/// Split an SSE body into its `data:` payloads.
pub fn sse_payloads(body: &[u8]) -> Vec<String> {
    std::str::from_utf8(body)
        .expect("utf-8 body")
        .split("\n\n")
        .filter(|frame| !frame.is_empty())
        .map(|frame| {
            frame
                .strip_prefix("data: ")
                .expect("data frame")
                .to_string()
        })
        .collect()
}

pub fn json_frames(payloads: &[String]) -> Vec<Value> {
    payloads
        .iter()
        .filter(|p| p.as_str() != "[DONE]")
        .map(|p| serde_json::from_str(p).expect("json frame"))
        .collect()
}
