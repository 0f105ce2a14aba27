//! OpenAI-compatible chat completion client.

use async_trait::async_trait;
use ragline_core::{
    CompletionClient, CompletionRequest, CompletionResponse, CompletionUsage, ExecuteError,
    ExecutionConfig,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Completion client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiCompletions {
    client: reqwest::Client,
    endpoint: String,
    config: ExecutionConfig,
}

impl OpenAiCompletions {
    /// Build a new completion client.
    pub fn new(
        api_key: &str,
        base_url: &str,
        config: ExecutionConfig,
    ) -> Result<Self, ExecuteError> {
        if api_key.trim().is_empty() {
            return Err(ExecuteError::Service {
                status: 401,
                message: "missing completion service api key".to_string(),
            });
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| ExecuteError::InvalidResponse("invalid api key bytes".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ExecuteError::Transport(e.to_string()))?;

        Ok(Self {
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            client,
            config,
        })
    }

    fn should_retry_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.config.base_delay_ms << attempt.min(5))
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletions {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ExecuteError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let mut attempt = 0u32;
        loop {
            let response = self.client.post(&self.endpoint).json(&body).send().await;

            let failure = match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: ChatResponse = resp
                            .json()
                            .await
                            .map_err(|e| ExecuteError::InvalidResponse(e.to_string()))?;
                        return parse_response(parsed, &request.model);
                    }

                    let message = resp.text().await.unwrap_or_else(|_| status.to_string());
                    if !Self::should_retry_status(status) {
                        return Err(ExecuteError::Service {
                            status: status.as_u16(),
                            message,
                        });
                    }
                    message
                }
                Err(err) if err.is_timeout() => {
                    ExecuteError::Timeout(self.config.timeout_secs).to_string()
                }
                Err(err) if err.is_connect() || err.is_request() => err.to_string(),
                Err(err) => return Err(ExecuteError::Transport(err.to_string())),
            };

            attempt += 1;
            if attempt >= self.config.max_retries {
                return Err(ExecuteError::RetriesExhausted {
                    attempts: attempt,
                    message: failure,
                });
            }
            warn!(attempt, error = %failure, "transient completion failure, retrying");
            tokio::time::sleep(self.backoff(attempt - 1)).await;
        }
    }
}

fn parse_response(parsed: ChatResponse, fallback_model: &str) -> Result<CompletionResponse, ExecuteError> {
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ExecuteError::InvalidResponse("response has no choices".to_string()))?;

    Ok(CompletionResponse {
        text: choice.message.content,
        model: parsed.model.unwrap_or_else(|| fallback_model.to_string()),
        usage: parsed.usage.map(|u| CompletionUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
        finish_reason: choice.finish_reason,
    })
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: Option<String>,
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
