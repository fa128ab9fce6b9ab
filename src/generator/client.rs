use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{GenerationRequest, PipeRequest, PipeResponse};
use super::Generator;
use crate::config::{GeneratorConfig, RequestConfig};
use crate::error::{GeneratorError, GeneratorResult};

/// [`Generator`] backed by a hosted pipe over HTTP
#[derive(Clone)]
pub struct PipeGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    pipe: String,
    request_config: RequestConfig,
}

impl PipeGenerator {
    /// Create a new pipe generator
    pub fn new(config: &GeneratorConfig, request_config: RequestConfig) -> GeneratorResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(GeneratorError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            pipe: config.pipe.clone(),
            request_config,
        })
    }

    /// Run the pipe, retrying transient failures with exponential backoff.
    ///
    /// Client errors other than 408 and 429 are returned after the first
    /// attempt. Either way the caller sees [`GeneratorError::Unavailable`]
    /// carrying the number of attempts made.
    pub async fn call_pipe(&self, request: PipeRequest) -> GeneratorResult<PipeResponse> {
        let url = format!("{}/v1/pipes/run", self.base_url);
        let max_attempts = self.request_config.max_retries + 1;
        let mut attempts = 0;

        let last_error = loop {
            if attempts > 0 {
                let delay = self.backoff(attempts);
                warn!(
                    pipe = %request.name,
                    attempt = attempts + 1,
                    delay_ms = delay.as_millis(),
                    "Retrying pipe request"
                );
                tokio::time::sleep(delay).await;
            }
            attempts += 1;

            let start = Instant::now();
            match self.send(&url, &request).await {
                Ok(response) => {
                    info!(
                        pipe = %request.name,
                        attempt = attempts,
                        latency_ms = start.elapsed().as_millis(),
                        "Pipe call succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    error!(
                        pipe = %request.name,
                        error = %e,
                        attempt = attempts,
                        latency_ms = start.elapsed().as_millis(),
                        "Pipe call failed"
                    );
                    if !e.is_retryable() || attempts >= max_attempts {
                        break e;
                    }
                }
            }
        };

        Err(GeneratorError::Unavailable {
            message: last_error.to_string(),
            retries: attempts,
        })
    }

    /// Delay before the given retry: the base delay doubled per retry.
    fn backoff(&self, retry: u32) -> Duration {
        let factor = 2_u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.request_config.retry_delay_ms.saturating_mul(factor))
    }

    /// One HTTP round trip. A body with `success: false` counts as a failure.
    async fn send(&self, url: &str, request: &PipeRequest) -> GeneratorResult<PipeResponse> {
        debug!(pipe = %request.name, messages = request.messages.len(), "Calling pipe");

        let timeout_ms = self.request_config.timeout_ms;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Timeout { timeout_ms }
                } else {
                    GeneratorError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: PipeResponse = response.json().await.map_err(|e| GeneratorError::InvalidResponse {
            message: format!("Failed to parse response: {}", e),
        })?;

        if body.success {
            Ok(body)
        } else {
            Err(GeneratorError::InvalidResponse {
                message: "pipe reported success=false".to_string(),
            })
        }
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Name of the pipe every prompt is sent to
    pub fn pipe(&self) -> &str {
        &self.pipe
    }
}

#[async_trait]
impl Generator for PipeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> GeneratorResult<String> {
        let pipe_request = PipeRequest::from_generation(&self.pipe, request);
        let response = self.call_pipe(pipe_request).await?;

        if let Some(raw) = &response.raw {
            let usage = raw.usage.as_ref();
            debug!(
                model = raw.model.as_deref().unwrap_or("unknown"),
                prompt_tokens = usage.and_then(|u| u.prompt_tokens),
                completion_tokens = usage.and_then(|u| u.completion_tokens),
                total_tokens = usage.and_then(|u| u.total_tokens),
                "Pipe usage"
            );
        }
        Ok(response.completion)
    }
}
