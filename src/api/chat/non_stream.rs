use std::time::Instant;

use tracing::{error, info};

use crate::api::call_driver;
use crate::error::GatewayError;
use crate::observability::log_request_complete;
use crate::observability::token_counter::account_usage;
use crate::protocol::driver::response_decoder::decode_chat_reply;
use crate::protocol::driver::UpstreamPayload;
use crate::protocol::openai_chat::response_encoder::encode_chat_completion;
use crate::protocol::openai_chat::ChatCompletion;
use crate::state::AppState;
use crate::util::unix_now_secs;

/// Perform one non-streaming driver call and assemble a `chat.completion`.
///
/// # Errors
///
/// Returns [`GatewayError::UpstreamTransport`] when the upstream cannot be
/// reached and [`GatewayError::UpstreamProtocol`] for a failure status, a
/// non-JSON body, or `success != true`.
pub async fn invoke(
    state: &AppState,
    headers: &http::HeaderMap,
    payload: &UpstreamPayload,
    prompt_text: &str,
) -> Result<ChatCompletion, GatewayError> {
    let started = Instant::now();
    let model = payload.args.model.as_str();

    let reply = call_driver(state, headers, payload).await.map_err(|err| {
        error!(error = %err, "chat completion upstream call failed");
        err
    })?;
    let reply = decode_chat_reply(&reply.body).map_err(|err| {
        error!(error = %err, "upstream reported failure");
        err
    })?;
    info!(chars = reply.content.chars().count(), "upstream reply received");

    let usage = account_usage(&reply.usage, model, prompt_text, &reply.content);
    log_request_complete(model, &usage, started);

    Ok(encode_chat_completion(
        state.next_completion_id(),
        unix_now_secs(),
        model,
        reply.content,
        reply.tool_calls,
        usage,
    ))
}
