//! Chunked abstractive summarization through an external inference backend.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SummaryConfig;

pub const SUMMARY_UNAVAILABLE_TEXT: &str = "Summary generation service is currently unavailable.";
pub const NO_CONTENT_TEXT: &str = "No content to summarize.";
pub const NO_SUMMARY_TEXT: &str = "Could not generate a summary for the provided text.";

/// Characters per token in the chunk-size heuristic.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("Summarization backend unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Summarization backend returned error (status {status}): {body}")]
    Backend { status: u16, body: String },

    #[error("Malformed summarization response: {0}")]
    MalformedResponse(String),
}

/// Generation parameters sent with every chunk.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummaryParams {
    pub max_length: u32,
    pub min_length: u32,
    pub do_sample: bool,
}

impl SummaryParams {
    pub fn from_config(config: &SummaryConfig) -> Self {
        Self {
            max_length: config.max_length,
            min_length: config.min_length,
            do_sample: false,
        }
    }
}

/// Validated reply for one chunk.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SummaryOutput {
    pub summary_text: String,
}

/// Summarization model abstraction (allows mocking for tests)
pub trait SummaryBackend: Send + Sync {
    fn summarize(&self, chunk: &str, params: &SummaryParams)
        -> Result<SummaryOutput, SummaryError>;
}

/// Request body for a Hugging Face style summarization endpoint
#[derive(Serialize)]
struct SummarizeRequest<'a> {
    inputs: &'a str,
    parameters: &'a SummaryParams,
}

/// Summarization over HTTP (text-generation-inference / HF Inference API shape).
pub struct HttpSummaryBackend {
    endpoint: String,
    client: reqwest::blocking::Client,
    api_token: Option<String>,
    timeout_secs: u64,
}

impl HttpSummaryBackend {
    /// Build the client. Must not be called from inside an async task.
    pub fn new(config: &SummaryConfig) -> Result<Self, SummaryError> {
        let endpoint = config.endpoint.trim();
        if endpoint.is_empty() {
            return Err(SummaryError::Unavailable("no endpoint configured".into()));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SummaryError::Unavailable(format!("HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
            api_token: config.api_token.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SummaryBackend for HttpSummaryBackend {
    fn summarize(
        &self,
        chunk: &str,
        params: &SummaryParams,
    ) -> Result<SummaryOutput, SummaryError> {
        let body = SummarizeRequest {
            inputs: chunk,
            parameters: params,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| {
            if e.is_connect() {
                SummaryError::Http(format!("cannot connect to {}", self.endpoint))
            } else if e.is_timeout() {
                SummaryError::Http(format!("request timed out after {}s", self.timeout_secs))
            } else {
                SummaryError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SummaryError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let reply: serde_json::Value = response
            .json()
            .map_err(|e| SummaryError::MalformedResponse(e.to_string()))?;
        parse_summary_reply(reply)
    }
}

/// Validate a `[{"summary_text": "..."}]` reply into its first output.
pub fn parse_summary_reply(reply: serde_json::Value) -> Result<SummaryOutput, SummaryError> {
    let outputs: Vec<SummaryOutput> = serde_json::from_value(reply.clone())
        .map_err(|_| SummaryError::MalformedResponse(truncate(&reply.to_string(), 200)))?;
    outputs
        .into_iter()
        .next()
        .ok_or_else(|| SummaryError::MalformedResponse("empty result list".into()))
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Collapse every whitespace run into a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split into consecutive chunks of at most `chunk_chars` Unicode scalar
/// values. No overlap and no sentence awareness.
pub fn chunk_text(text: &str, chunk_chars: usize) -> Vec<&str> {
    if text.is_empty() || chunk_chars == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (offset, _) in text.char_indices() {
        if count == chunk_chars {
            chunks.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    chunks.push(&text[start..]);
    chunks
}

/// Summarizer with a backend resolved once at startup.
#[derive(Clone)]
pub struct Summarizer {
    backend: Result<Arc<dyn SummaryBackend>, String>,
    params: SummaryParams,
    chunk_chars: usize,
}

impl Summarizer {
    pub fn new(backend: Arc<dyn SummaryBackend>, config: &SummaryConfig) -> Self {
        Self {
            backend: Ok(backend),
            params: SummaryParams::from_config(config),
            chunk_chars: config.max_chunk_tokens * CHARS_PER_TOKEN,
        }
    }

    /// Degraded summarizer that answers every request with the unavailable text.
    pub fn unavailable(reason: &str, config: &SummaryConfig) -> Self {
        Self {
            backend: Err(reason.to_string()),
            params: SummaryParams::from_config(config),
            chunk_chars: config.max_chunk_tokens * CHARS_PER_TOKEN,
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_ok()
    }

    pub fn summarize(&self, text: &str) -> String {
        let backend = match &self.backend {
            Ok(backend) => backend,
            Err(reason) => {
                tracing::error!(reason = %reason, "Summarizer not available");
                return SUMMARY_UNAVAILABLE_TEXT.to_string();
            }
        };

        if text.trim().is_empty() {
            tracing::warn!("Attempted to summarize empty text");
            return NO_CONTENT_TEXT.to_string();
        }

        let normalized = normalize_whitespace(text);
        let chunks = chunk_text(&normalized, self.chunk_chars);
        tracing::info!(
            chars = normalized.chars().count(),
            chunks = chunks.len(),
            "Starting summary generation"
        );

        let mut parts = Vec::with_capacity(chunks.len());
        let mut succeeded = 0usize;
        for (i, chunk) in chunks.iter().enumerate() {
            let part = i + 1;
            match backend.summarize(chunk, &self.params) {
                Ok(output) => {
                    succeeded += 1;
                    parts.push(output.summary_text);
                }
                Err(SummaryError::MalformedResponse(detail)) => {
                    tracing::warn!(part, detail = %detail, "Unexpected summarization result, skipping chunk");
                }
                Err(e) => {
                    tracing::error!(part, error = %e, "Error summarizing chunk");
                    parts.push(format!("[Error summarizing part {part}]"));
                }
            }
        }

        let summary = parts.join("\n").trim().to_string();
        if succeeded == 0 || summary.is_empty() {
            tracing::warn!(chunks = chunks.len(), "No chunk produced a summary");
            return NO_SUMMARY_TEXT.to_string();
        }

        tracing::info!(chars = summary.len(), "Summary generation complete");
        summary
    }
}

/// Scripted backend for tests. Each call pops the next reply; once the
/// script is exhausted every chunk is summarized as `summary of <n> chars`.
pub struct MockSummaryBackend {
    script: std::sync::Mutex<std::collections::VecDeque<Result<String, SummaryError>>>,
    seen: std::sync::Mutex<Vec<(String, SummaryParams)>>,
}

impl MockSummaryBackend {
    pub fn new() -> Self {
        Self {
            script: Default::default(),
            seen: Default::default(),
        }
    }

    pub fn with_replies(mut self, replies: Vec<Result<String, SummaryError>>) -> Self {
        if let Ok(script) = self.script.get_mut() {
            script.extend(replies);
        }
        self
    }

    /// Chunks received so far, with their parameters.
    pub fn seen(&self) -> Vec<(String, SummaryParams)> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Default for MockSummaryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryBackend for MockSummaryBackend {
    fn summarize(
        &self,
        chunk: &str,
        params: &SummaryParams,
    ) -> Result<SummaryOutput, SummaryError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((chunk.to_string(), params.clone()));
        }
        match self.script.lock().ok().and_then(|mut s| s.pop_front()) {
            Some(reply) => reply.map(|summary_text| SummaryOutput { summary_text }),
            None => Ok(SummaryOutput {
                summary_text: format!("summary of {} chars", chunk.chars().count()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_with_chunk_tokens(tokens: usize) -> SummaryConfig {
        SummaryConfig {
            max_chunk_tokens: tokens,
            ..SummaryConfig::default()
        }
    }

    #[test]
    fn normalizes_whitespace_runs() {
        assert_eq!(normalize_whitespace("  a\n\n b\t\tc  "), "a b c");
        assert_eq!(normalize_whitespace("\n \t"), "");
    }

    #[test]
    fn chunks_reconstruct_input() {
        let text = "abcdefghij".repeat(7);
        let chunks = chunk_text(&text, 16);
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().take(4).all(|c| c.chars().count() == 16));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn chunks_count_chars_not_bytes() {
        let text = "é".repeat(10);
        let chunks = chunk_text(&text, 4);
        assert_eq!(chunks, vec!["éééé", "éééé", "éé"]);
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_chunk() {
        let chunks = chunk_text("abcdefgh", 4);
        assert_eq!(chunks, vec!["abcd", "efgh"]);
        assert!(chunk_text("", 4).is_empty());
    }

    #[test]
    fn unavailable_backend_wins_over_blank_input() {
        let summarizer = Summarizer::unavailable("model failed to load", &SummaryConfig::default());
        assert!(!summarizer.is_available());
        assert_eq!(summarizer.summarize(""), SUMMARY_UNAVAILABLE_TEXT);
        assert_eq!(summarizer.summarize("real text"), SUMMARY_UNAVAILABLE_TEXT);
    }

    #[test]
    fn blank_input_has_no_content() {
        let backend = Arc::new(MockSummaryBackend::new());
        let summarizer = Summarizer::new(backend.clone(), &SummaryConfig::default());
        assert_eq!(summarizer.summarize("  \n\t "), NO_CONTENT_TEXT);
        assert!(backend.seen().is_empty());
    }

    #[test]
    fn each_chunk_is_summarized_with_greedy_params() {
        let backend = Arc::new(MockSummaryBackend::new());
        let summarizer = Summarizer::new(backend.clone(), &config_with_chunk_tokens(2));

        // 8-char chunks over "aaaa bbbb cccc" (14 chars) -> 2 chunks
        let summary = summarizer.summarize("aaaa\n\nbbbb   cccc");
        assert_eq!(summary, "summary of 8 chars\nsummary of 6 chars");

        let seen = backend.seen();
        assert_eq!(seen[0].0, "aaaa bbb");
        assert_eq!(seen[1].0, "b cccc");
        assert_eq!(
            seen[0].1,
            SummaryParams {
                max_length: 150,
                min_length: 30,
                do_sample: false
            }
        );
    }

    #[test]
    fn failed_chunk_gets_placeholder() {
        let backend = Arc::new(MockSummaryBackend::new().with_replies(vec![
            Ok("first".into()),
            Err(SummaryError::Http("connection reset".into())),
            Ok("third".into()),
        ]));
        let summarizer = Summarizer::new(backend, &config_with_chunk_tokens(1));

        let summary = summarizer.summarize("abcdefghijkl");
        assert_eq!(summary, "first\n[Error summarizing part 2]\nthird");
    }

    #[test]
    fn malformed_reply_is_skipped() {
        let backend = Arc::new(MockSummaryBackend::new().with_replies(vec![
            Err(SummaryError::MalformedResponse("{}".into())),
            Ok("second".into()),
        ]));
        let summarizer = Summarizer::new(backend, &config_with_chunk_tokens(1));
        assert_eq!(summarizer.summarize("abcdefgh"), "second");
    }

    #[test]
    fn all_chunks_failing_yields_sentinel() {
        let backend = Arc::new(MockSummaryBackend::new().with_replies(vec![
            Err(SummaryError::Backend {
                status: 503,
                body: "loading".into(),
            }),
            Err(SummaryError::MalformedResponse("[]".into())),
        ]));
        let summarizer = Summarizer::new(backend, &config_with_chunk_tokens(1));
        assert_eq!(summarizer.summarize("abcdefgh"), NO_SUMMARY_TEXT);
    }

    #[test]
    fn deterministic_backend_is_idempotent() {
        let summarizer = Summarizer::new(Arc::new(MockSummaryBackend::new()), &SummaryConfig::default());
        let text = "The quarterly report shows growth. ".repeat(300);
        assert_eq!(summarizer.summarize(&text), summarizer.summarize(&text));
    }

    #[test]
    fn reply_validation() {
        let ok = parse_summary_reply(json!([{"summary_text": "Short."}])).unwrap();
        assert_eq!(ok.summary_text, "Short.");

        assert!(matches!(
            parse_summary_reply(json!([])),
            Err(SummaryError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_summary_reply(json!({"error": "Model is loading"})),
            Err(SummaryError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_summary_reply(json!([{"generated_text": "x"}])),
            Err(SummaryError::MalformedResponse(_))
        ));
    }

    #[test]
    fn empty_endpoint_is_unavailable() {
        let config = SummaryConfig {
            endpoint: "  ".into(),
            ..SummaryConfig::default()
        };
        assert!(matches!(
            HttpSummaryBackend::new(&config),
            Err(SummaryError::Unavailable(_))
        ));
    }

    // ── HTTP backend against a local stub server ──

    /// Serve a fixed reply on an ephemeral port from a background runtime.
    fn spawn_stub(status: axum::http::StatusCode, reply: serde_json::Value) -> String {
        use axum::{routing::post, Json, Router};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async move {
                let app = Router::new().route(
                    "/summarize",
                    post(move |Json(request): Json<serde_json::Value>| {
                        let reply = reply.clone();
                        async move {
                            // Reject anything that is not the expected request shape.
                            let well_formed = request["inputs"].is_string()
                                && request["parameters"]["do_sample"] == json!(false)
                                && request["parameters"]["max_length"] == json!(150)
                                && request["parameters"]["min_length"] == json!(30);
                            if well_formed {
                                (status, Json(reply))
                            } else {
                                (
                                    axum::http::StatusCode::BAD_REQUEST,
                                    Json(json!({"error": "unexpected request"})),
                                )
                            }
                        }
                    }),
                );
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });

        format!("http://{addr}/summarize")
    }

    fn http_backend(endpoint: String) -> HttpSummaryBackend {
        HttpSummaryBackend::new(&SummaryConfig {
            endpoint,
            timeout_secs: 10,
            ..SummaryConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn http_backend_posts_inputs_and_parameters() {
        let url = spawn_stub(
            axum::http::StatusCode::OK,
            json!([{"summary_text": "A concise summary."}]),
        );
        let backend = http_backend(url);
        let params = SummaryParams::from_config(&SummaryConfig::default());

        let output = backend.summarize("Some long text", &params).unwrap();
        assert_eq!(output.summary_text, "A concise summary.");
    }

    #[test]
    fn http_backend_maps_error_status() {
        let url = spawn_stub(
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            json!({"error": "Model is currently loading"}),
        );
        let err = http_backend(url)
            .summarize("text", &SummaryParams::from_config(&SummaryConfig::default()))
            .unwrap_err();
        assert!(matches!(err, SummaryError::Backend { status: 503, .. }));
    }

    #[test]
    fn http_backend_flags_unexpected_shape() {
        let url = spawn_stub(axum::http::StatusCode::OK, json!({"summary": "wrong shape"}));
        let err = http_backend(url)
            .summarize("text", &SummaryParams::from_config(&SummaryConfig::default()))
            .unwrap_err();
        assert!(matches!(err, SummaryError::MalformedResponse(_)));
    }

    #[test]
    fn http_backend_reports_connection_failure() {
        // Bind then drop to get a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = http_backend(format!("http://127.0.0.1:{port}/"))
            .summarize("text", &SummaryParams::from_config(&SummaryConfig::default()))
            .unwrap_err();
        assert!(matches!(err, SummaryError::Http(_)));
    }
}
