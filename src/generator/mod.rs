//! Text generator collaborator.
//!
//! The controller only ever sees the [`Generator`] trait: one prompt in, one
//! completion out. Structured (JSON) extraction and the retry-with-reminder
//! policy live here as free functions so every call site gets the same
//! degraded-but-never-fatal behaviour.

mod client;
mod types;


pub use client::PipeGenerator;
pub use types::*;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::GeneratorResult;

/// Instruction appended to a prompt before each structured-output retry.
pub const JSON_ONLY_REMINDER: &str = "\n\nIMPORTANT: Respond ONLY with valid JSON. No other text.";

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Run one prompt and return the raw completion.
    async fn generate(&self, request: &GenerationRequest) -> GeneratorResult<String>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for std::sync::Arc<G> {
    async fn generate(&self, request: &GenerationRequest) -> GeneratorResult<String> {
        (**self).generate(request).await
    }
}

/// One call, then an attempt to pull a JSON object out of the completion.
///
/// Transport failures come back as [`GenerationOutcome::Failed`]; they are
/// never propagated.
pub async fn generate_structured<G: Generator + ?Sized>(
    generator: &G,
    request: &GenerationRequest,
) -> GenerationOutcome {
    match generator.generate(request).await {
        Ok(text) => match extract_json(&text) {
            Some(payload) => GenerationOutcome::Structured { text, payload },
            None => GenerationOutcome::Raw {
                text,
                error: Some("no JSON object in response".to_string()),
            },
        },
        Err(e) => {
            warn!(error = %e, "Generator call failed");
            GenerationOutcome::Failed { error: e.to_string() }
        }
    }
}

/// Plain-text call; failures collapse to [`GenerationOutcome::Failed`].
pub async fn generate_text<G: Generator + ?Sized>(
    generator: &G,
    request: &GenerationRequest,
) -> GenerationOutcome {
    match generator.generate(request).await {
        Ok(text) => GenerationOutcome::Raw {
            text: text.trim().to_string(),
            error: None,
        },
        Err(e) => {
            warn!(error = %e, "Generator call failed");
            GenerationOutcome::Failed { error: e.to_string() }
        }
    }
}

/// Structured call retried up to `max_retries` times.
///
/// Each retry re-issues the same request with [`JSON_ONLY_REMINDER`]
/// appended. A transport failure ends the loop at once, since the generator
/// has already spent its own retries. When every attempt yields prose the
/// last response is returned as a raw outcome marked with an error.
pub async fn generate_with_retry<G: Generator + ?Sized>(
    generator: &G,
    request: &GenerationRequest,
    max_retries: u32,
) -> GenerationOutcome {
    let attempts = max_retries.max(1);
    let mut current = request.clone();
    let mut last = GenerationOutcome::Raw {
        text: String::new(),
        error: None,
    };

    for attempt in 1..=attempts {
        let outcome = generate_structured(generator, &current).await;
        if outcome.is_structured() {
            debug!(attempt, "Structured response received");
            return outcome;
        }
        if outcome.is_failed() {
            warn!(attempt, "Generator unavailable, not retrying for JSON");
            return outcome;
        }

        warn!(attempt, max = attempts, "JSON parsing failed");
        last = outcome;
        if attempt < attempts {
            current.prompt.push_str(JSON_ONLY_REMINDER);
        }
    }

    let text = last.text().to_string();
    GenerationOutcome::Raw {
        text,
        error: Some(format!(
            "Failed to generate valid JSON after {} attempts",
            attempts
        )),
    }
}

/// Pull a JSON object out of a completion that may wrap it in prose,
/// markdown fences or `<think>` blocks.
pub fn extract_json(completion: &str) -> Option<Map<String, Value>> {
    let text = strip_thinking(completion);

    let mut candidates: Vec<&str> = Vec::new();

    if let Some(start) = text.find("```json") {
        if let Some(end) = text[start + 7..].find("```") {
            candidates.push(text[start + 7..start + 7 + end].trim());
        }
    }

    if let Some(start) = text.find("```") {
        let after_start = &text[start + 3..];
        // Skip language identifier if present
        let json_start = after_start.find('\n').map(|n| n + 1).unwrap_or(0);
        if let Some(end) = after_start[json_start..].find("```") {
            candidates.push(after_start[json_start..json_start + end].trim());
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            candidates.push(&text[start..=end]);
        }
    }

    candidates.push(text.trim());

    candidates
        .into_iter()
        .find_map(|candidate| match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
}

/// Remove `<think>...</think>` blocks, including an unterminated trailing one.
pub fn strip_thinking(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<think>") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</think>") {
            Some(end) => rest = &rest[start + end + "</think>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}
