use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{self, Body};
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::util::BoxCloneService;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::api::{audio, chat, health, images, models};
use crate::error::GatewayError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteMatch {
    Health,
    Models,
    ChatCompletions,
    ImageGenerations,
    AudioSpeech,
    MethodNotAllowed,
    NotFound,
}

/// The request service the server runs: the dispatcher behind a permissive
/// CORS layer, which also answers browser preflight requests.
pub type GatewayService = BoxCloneService<Request<Body>, Response, Infallible>;

#[must_use]
pub fn gateway_service(state: Arc<AppState>, base_path: Arc<str>) -> GatewayService {
    let dispatch = tower::service_fn(move |request: Request<Body>| {
        dispatch_request(Arc::clone(&state), Arc::clone(&base_path), request)
    });
    BoxCloneService::new(
        ServiceBuilder::new()
            .layer(CorsLayer::permissive())
            .service(dispatch),
    )
}

/// Dispatch a raw HTTP request to the matching handler.
///
/// # Errors
///
/// This function currently never returns `Err` and uses `Infallible`.
pub async fn dispatch_request(
    state: Arc<AppState>,
    base_path: Arc<str>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let (parts, body) = request.into_parts();
    let route = match_route(&parts.method, parts.uri.path(), base_path.as_ref());
    tracing::debug!(method = %parts.method, path = %parts.uri.path(), ?route, "dispatching request");

    let response = match route {
        RouteMatch::Health => health::health_handler().into_response(),
        RouteMatch::Models => models::handler(State(state), &parts.headers).await,
        RouteMatch::ChatCompletions => {
            let body_bytes = match read_request_body(body, &state).await {
                Ok(bytes) => bytes,
                Err(response) => return Ok(response),
            };
            chat::handler(State(state), parts.headers, body_bytes).await
        }
        RouteMatch::ImageGenerations => {
            let body_bytes = match read_request_body(body, &state).await {
                Ok(bytes) => bytes,
                Err(response) => return Ok(response),
            };
            images::handler(State(state), parts.headers, body_bytes).await
        }
        RouteMatch::AudioSpeech => {
            let body_bytes = match read_request_body(body, &state).await {
                Ok(bytes) => bytes,
                Err(response) => return Ok(response),
            };
            audio::handler(State(state), parts.headers, body_bytes).await
        }
        RouteMatch::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        RouteMatch::NotFound => StatusCode::NOT_FOUND.into_response(),
    };

    Ok(response)
}

#[must_use]
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim();
    if trimmed.is_empty() || trimmed == "/" {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.trim_end_matches('/').to_string()
    } else {
        format!("/{}", trimmed.trim_end_matches('/'))
    }
}

async fn read_request_body(body: Body, state: &AppState) -> Result<bytes::Bytes, Response> {
    let limit = state.config.server.max_request_body_bytes;
    body::to_bytes(body, limit).await.map_err(|_| {
        let err = GatewayError::Validation(format!("Request body too large (max {limit} bytes)"));
        let mut response = err.into_response();
        *response.status_mut() = StatusCode::PAYLOAD_TOO_LARGE;
        response
    })
}

fn match_route(method: &Method, path: &str, base_path: &str) -> RouteMatch {
    let Some(path) = strip_base_path(path, base_path) else {
        return RouteMatch::NotFound;
    };

    let (route, allowed) = match path {
        "/" | "/health" => (RouteMatch::Health, Method::GET),
        "/v1/models" => (RouteMatch::Models, Method::GET),
        "/v1/chat/completions" => (RouteMatch::ChatCompletions, Method::POST),
        "/v1/images/generations" => (RouteMatch::ImageGenerations, Method::POST),
        "/v1/audio/speech" => (RouteMatch::AudioSpeech, Method::POST),
        _ => return RouteMatch::NotFound,
    };
    if method == allowed {
        route
    } else {
        RouteMatch::MethodNotAllowed
    }
}

fn strip_base_path<'a>(path: &'a str, base_path: &str) -> Option<&'a str> {
    if base_path.is_empty() {
        return Some(path);
    }

    let remainder = path.strip_prefix(base_path)?;
    if remainder.is_empty() {
        Some("/")
    } else if remainder.starts_with('/') {
        Some(remainder)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes() {
        assert_eq!(match_route(&Method::GET, "/health", ""), RouteMatch::Health);
        assert_eq!(match_route(&Method::GET, "/", ""), RouteMatch::Health);
        assert_eq!(
            match_route(&Method::POST, "/v1/chat/completions", ""),
            RouteMatch::ChatCompletions
        );
        assert_eq!(
            match_route(&Method::GET, "/v1/chat/completions", ""),
            RouteMatch::MethodNotAllowed
        );
        assert_eq!(match_route(&Method::GET, "/v1/nope", ""), RouteMatch::NotFound);
    }

    #[test]
    fn test_base_path() {
        assert_eq!(normalize_base_path("api/"), "/api");
        assert_eq!(normalize_base_path("/"), "");
        assert_eq!(
            match_route(&Method::POST, "/api/v1/audio/speech", "/api"),
            RouteMatch::AudioSpeech
        );
        assert_eq!(match_route(&Method::GET, "/api", "/api"), RouteMatch::Health);
        assert_eq!(match_route(&Method::GET, "/apiv1/models", "/api"), RouteMatch::NotFound);
        assert_eq!(match_route(&Method::GET, "/v1/models", "/api"), RouteMatch::NotFound);
    }
}
