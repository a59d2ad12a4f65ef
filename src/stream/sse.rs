/// SSE frame encoding for the downstream `OpenAI` stream.
use bytes::Bytes;

const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Format an OpenAI-style SSE frame (no event type, just data).
#[must_use]
pub fn openai_sse_frame(json: &str) -> Bytes {
    let mut out = String::with_capacity(10 + json.len());
    out.push_str("data: ");
    out.push_str(json);
    out.push_str("\n\n");
    Bytes::from(out)
}

/// The terminal `[DONE]` frame.
#[must_use]
pub fn done_frame() -> Bytes {
    Bytes::from_static(DONE_FRAME.as_bytes())
}

/// SSE field lines that carry no payload once a body is known to be SSE.
const SSE_FIELDS: [&str; 3] = ["event:", "id:", "retry:"];

/// Extracts payloads from the lines of one upstream body.
///
/// Upstreams may send bare lines or SSE frames. A `data:` or `event:` line
/// marks the body as SSE; from then on `:` comments and `id:`/`retry:` fields
/// are framing and skipped. Before that every non-blank line is payload, so
/// plain text that happens to start with `:` or `id:` is kept.
#[derive(Debug, Default)]
pub struct LineFraming {
    sse: bool,
}

impl LineFraming {
    /// The payload of one line, if any. Blank lines and the `[DONE]`
    /// sentinel never carry one.
    pub fn payload<'a>(&mut self, line: &'a str) -> Option<&'a str> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            self.sse = true;
            let payload = rest.trim_start();
            return (!payload.is_empty() && payload != "[DONE]").then_some(payload);
        }
        if line.starts_with("event:") {
            self.sse = true;
            return None;
        }
        if self.sse && (line.starts_with(':') || SSE_FIELDS.iter().any(|f| line.starts_with(f))) {
            return None;
        }
        (line != "[DONE]").then_some(line)
    }

    #[must_use]
    pub fn is_sse(&self) -> bool {
        self.sse
    }
}
