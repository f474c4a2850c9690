//! VLM interaction: build the vision message and call the provider.
//!
//! This module converts the encoded scan into a VLM API call and returns
//! the raw text response. It is intentionally thin — all prompt
//! engineering lives in [`crate::prompts`] and the registry, so schemas
//! can change without touching the transport logic here.
//!
//! ## Single-shot, no retries
//!
//! The call is made exactly once, bounded by a timeout. A failed or
//! timed-out call fails the whole request; the caller decides whether to
//! re-submit the image. Transcribing a paper register is not idempotent
//! from the operator's point of view (they are watching the request), so
//! silent multi-minute retry loops help nobody.

use crate::config::FillConfig;
use crate::error::Scan2SheetError;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// The raw result of the single vision call.
#[derive(Debug, Clone)]
pub struct OcrResponse {
    /// The model's message body, untouched.
    pub content: String,
    /// Prompt tokens consumed.
    pub input_tokens: usize,
    /// Completion tokens produced.
    pub output_tokens: usize,
    /// Wall-clock duration of the call.
    pub duration_ms: u64,
}

/// Send the scan to the vision model with the schema's prompt contract.
///
/// ## Message Layout
///
/// The request contains (in order):
/// 1. **System message** — the schema's extraction prompt (or the
///    caller's override)
/// 2. **User message** — the scan as a base64 image attachment (empty text)
///
/// The empty user text is intentional: VLM APIs require at least one user
/// turn to respond to, but the image carries all the actual content.
pub async fn transcribe_image(
    provider: &Arc<dyn LLMProvider>,
    prompt: &str,
    image_data: ImageData,
    config: &FillConfig,
) -> Result<OcrResponse, Scan2SheetError> {
    let messages = vec![
        ChatMessage::system(prompt),
        ChatMessage::user_with_images("", vec![image_data]),
    ];

    let options = build_options(config);
    let start = Instant::now();

    let call = provider.chat(&messages, Some(&options));
    let response = tokio::time::timeout(Duration::from_secs(config.api_timeout_secs), call)
        .await
        .map_err(|_| Scan2SheetError::OcrTimeout {
            secs: config.api_timeout_secs,
        })?
        .map_err(|e| Scan2SheetError::OcrFailed {
            detail: e.to_string(),
        })?;

    let duration = start.elapsed();
    debug!(
        "OCR call: {} input tokens, {} output tokens, {:?}",
        response.prompt_tokens, response.completion_tokens, duration
    );

    if response.content.trim().is_empty() {
        return Err(Scan2SheetError::EmptyResponse);
    }

    Ok(OcrResponse {
        content: response.content,
        input_tokens: response.prompt_tokens,
        output_tokens: response.completion_tokens,
        duration_ms: duration.as_millis() as u64,
    })
}

/// Build `CompletionOptions` from the fill config.
fn build_options(config: &FillConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
