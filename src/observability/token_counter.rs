use std::time::Duration;

use tiktoken_rs::{tokenizer, CoreBPE};
use tracing::{debug, info};

use crate::protocol::canonical::UsageInfo;
use crate::protocol::driver::response_decoder::UsageRecord;

/// BPE table for a model family, when one is known.
fn bpe_for_model(model: &str) -> Option<&'static CoreBPE> {
    let bpe = match tokenizer::get_tokenizer(model)? {
        tokenizer::Tokenizer::O200kHarmony => tiktoken_rs::o200k_harmony_singleton(),
        tokenizer::Tokenizer::O200kBase => tiktoken_rs::o200k_base_singleton(),
        tokenizer::Tokenizer::Cl100kBase => tiktoken_rs::cl100k_base_singleton(),
        tokenizer::Tokenizer::R50kBase | tokenizer::Tokenizer::Gpt2 => {
            tiktoken_rs::r50k_base_singleton()
        }
        tokenizer::Tokenizer::P50kBase => tiktoken_rs::p50k_base_singleton(),
        tokenizer::Tokenizer::P50kEdit => tiktoken_rs::p50k_edit_singleton(),
    };
    Some(bpe)
}

/// Estimate the number of tokens in `text` for the given model.
///
/// Models with a known BPE family are tokenized exactly; anything else is
/// approximated as `max(1, chars / 4)`.
#[must_use]
pub fn estimate_tokens(text: &str, model: &str) -> u64 {
    if let Some(bpe) = bpe_for_model(model) {
        return bpe.encode_with_special_tokens(text).len() as u64;
    }
    (text.chars().count() as u64 / 4).max(1)
}

/// Resolve final usage from upstream records, estimating each missing field.
///
/// A `prompt` or `completion` record is used as-is (the last one wins when
/// repeated); a missing one is estimated from the matching text. Total is
/// always the sum.
#[must_use]
pub fn account_usage(
    records: &[UsageRecord],
    model: &str,
    prompt_text: &str,
    completion_text: &str,
) -> UsageInfo {
    let reported = |kind: &str| {
        records
            .iter()
            .rev()
            .find(|record| record.kind == kind)
            .map(|record| record.amount)
    };

    let prompt_tokens = reported("prompt").unwrap_or_else(|| {
        let estimate = estimate_tokens(prompt_text, model);
        debug!(model, prompt_tokens = estimate, "estimated prompt tokens locally");
        estimate
    });
    let completion_tokens = reported("completion").unwrap_or_else(|| {
        let estimate = estimate_tokens(completion_text, model);
        debug!(model, completion_tokens = estimate, "estimated completion tokens locally");
        estimate
    });

    UsageInfo::new(prompt_tokens, completion_tokens)
}

/// Log token usage for a completed request at INFO level.
pub fn log_request_usage(model: &str, usage: &UsageInfo, duration: Duration) {
    info!(
        model = model,
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        duration_seconds = duration.as_secs_f64(),
        "request completed"
    );
}
