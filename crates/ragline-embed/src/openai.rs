//! OpenAI-compatible embedding client.

use async_trait::async_trait;
use ragline_core::{
    estimate_tokens, truncate_to_tokens, EmbedBatch, EmbedError, Embedder, EmbeddingConfig,
    EmbeddingOutput,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Embedding client for OpenAI-compatible `/embeddings` endpoints.
///
/// Transient failures (429, 5xx, transport errors) are retried with
/// exponential backoff up to the configured attempt budget; anything
/// else fails immediately.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    config: EmbeddingConfig,
}

impl OpenAiEmbedder {
    /// Build a new embedding client.
    pub fn new(
        api_key: &str,
        base_url: &str,
        config: EmbeddingConfig,
    ) -> Result<Self, EmbedError> {
        if api_key.trim().is_empty() {
            return Err(EmbedError::Service {
                status: 401,
                message: "missing embedding service api key".to_string(),
            });
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| EmbedError::InvalidResponse("invalid api key bytes".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .default_headers(headers)
            .build()
            .map_err(|e| EmbedError::Transport(e.to_string()))?;

        Ok(Self {
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            client,
            config,
        })
    }

    fn should_retry_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn is_retryable_transport(err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect() || err.is_request()
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.config.base_delay_ms << attempt.min(5))
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn max_input_tokens(&self) -> usize {
        self.config.max_input_tokens
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<EmbedBatch, EmbedError> {
        if texts.is_empty() {
            return Ok(EmbedBatch { outputs: Vec::new(), retries: 0 });
        }
        if texts.len() > self.config.batch_size {
            return Err(EmbedError::InvalidResponse(format!(
                "batch of {} exceeds configured max {}",
                texts.len(),
                self.config.batch_size
            )));
        }

        // deterministic longest-prefix truncation to the service cap
        let prepared: Vec<(&str, bool)> = texts
            .iter()
            .map(|text| truncate_to_tokens(text, self.config.max_input_tokens))
            .collect();
        let inputs: Vec<&str> = prepared.iter().map(|(t, _)| *t).collect();

        let mut attempt = 0u32;
        loop {
            let request = EmbeddingRequest {
                model: &self.config.model,
                input: &inputs,
            };
            let response = self.client.post(&self.endpoint).json(&request).send().await;

            let failure = match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: EmbeddingResponse = resp
                            .json()
                            .await
                            .map_err(|e| EmbedError::InvalidResponse(e.to_string()))?;
                        return finish_batch(parsed, &prepared, self.config.dimension, attempt);
                    }

                    let message = resp.text().await.unwrap_or_else(|_| status.to_string());
                    if !Self::should_retry_status(status) {
                        return Err(EmbedError::Service {
                            status: status.as_u16(),
                            message,
                        });
                    }
                    message
                }
                Err(err) => {
                    if !Self::is_retryable_transport(&err) {
                        return Err(EmbedError::Transport(err.to_string()));
                    }
                    err.to_string()
                }
            };

            attempt += 1;
            if attempt >= self.config.max_retries {
                return Err(EmbedError::RetriesExhausted {
                    attempts: attempt,
                    message: failure,
                });
            }
            warn!(attempt, error = %failure, "transient embedding failure, retrying");
            tokio::time::sleep(self.backoff(attempt - 1)).await;
        }
    }
}

fn finish_batch(
    mut parsed: EmbeddingResponse,
    prepared: &[(&str, bool)],
    dimension: usize,
    retries: u32,
) -> Result<EmbedBatch, EmbedError> {
    if parsed.data.len() != prepared.len() {
        return Err(EmbedError::InvalidResponse(format!(
            "service returned {} embeddings for {} inputs",
            parsed.data.len(),
            prepared.len()
        )));
    }
    parsed.data.sort_by_key(|row| row.index);

    let mut outputs = Vec::with_capacity(prepared.len());
    for (row, (text, truncated)) in parsed.data.into_iter().zip(prepared) {
        if row.embedding.len() != dimension {
            return Err(EmbedError::DimensionMismatch {
                expected: dimension,
                got: row.embedding.len(),
            });
        }
        outputs.push(EmbeddingOutput {
            embedding: row.embedding,
            token_count: estimate_tokens(text),
            truncated: *truncated,
        });
    }

    Ok(EmbedBatch { outputs, retries: retries as usize })
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
    index: usize,
}
