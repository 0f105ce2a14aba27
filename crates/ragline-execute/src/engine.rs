//! Execution engine: template + context → completion call → record.

use crate::template::render_template;
use ragline_core::{
    estimate_tokens, CompletionClient, CompletionRequest, ContextBlock, ExecuteError,
    ExecutionConfig, ExecutionRecord, TemplateVars,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

const CONTEXT_HEADER: &str = "--- Retrieved context ---";
const CONTEXT_FOOTER: &str = "--- End context ---";

/// Renders prompts and executes them against a completion service.
pub struct ExecutionEngine {
    client: Arc<dyn CompletionClient>,
    config: ExecutionConfig,
}

impl ExecutionEngine {
    /// Create an engine over the given completion client.
    pub fn new(client: Arc<dyn CompletionClient>, config: ExecutionConfig) -> Self {
        Self { client, config }
    }

    /// Render `template` with `vars`, inject `context` when present, call
    /// the completion service, and return the execution record.
    ///
    /// Template validation happens first: a missing variable fails before
    /// any external call. The context block is injected as its own
    /// delimited section above the rendered prompt, never interpolated
    /// into user variables.
    pub async fn execute(
        &self,
        template: &str,
        vars: &TemplateVars,
        context: Option<&ContextBlock>,
    ) -> Result<ExecutionRecord, ExecuteError> {
        let rendered = render_template(template, vars)?;

        let (prompt, used_chunk_ids) = match context {
            Some(block) if !block.is_empty() => (
                format!("{CONTEXT_HEADER}\n{}\n{CONTEXT_FOOTER}\n\n{rendered}", block.text),
                block.chunk_ids.clone(),
            ),
            _ => (rendered, Vec::new()),
        };
        debug!(prompt_tokens = estimate_tokens(&prompt), context_chunks = used_chunk_ids.len(), "executing prompt");

        let prompt_chars = prompt.chars().count();
        let request = CompletionRequest {
            prompt,
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let started = Instant::now();
        let response = self.client.complete(&request).await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        // fall back to estimation when the service omits usage
        let (prompt_tokens, completion_tokens, total_tokens) = match response.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens, usage.total_tokens),
            None => {
                let prompt_tokens = estimate_tokens(&request.prompt) as u32;
                let completion_tokens = estimate_tokens(&response.text) as u32;
                (prompt_tokens, completion_tokens, prompt_tokens + completion_tokens)
            }
        };

        info!(model = %response.model, latency_ms, total_tokens, "execution complete");
        Ok(ExecutionRecord {
            id: Uuid::new_v4(),
            template: template.to_string(),
            variables: vars.clone(),
            prompt_chars,
            response_text: response.text,
            model: response.model,
            prompt_tokens,
            completion_tokens,
            total_tokens,
            finish_reason: response.finish_reason,
            latency_ms,
            used_chunk_ids,
            created_at: chrono::Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragline_core::{CompletionResponse, CompletionUsage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockClient {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
        usage: Option<CompletionUsage>,
    }

    impl MockClient {
        fn new(usage: Option<CompletionUsage>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
                usage,
            }
        }
    }

    #[async_trait]
    impl CompletionClient for MockClient {
        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, ExecuteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(request.prompt.clone());
            Ok(CompletionResponse {
                text: "mock answer".to_string(),
                model: request.model.clone(),
                usage: self.usage,
                finish_reason: Some("stop".to_string()),
            })
        }
    }

    fn vars(pairs: &[(&str, &str)]) -> TemplateVars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn context(text: &str) -> ContextBlock {
        ContextBlock {
            text: text.to_string(),
            token_count: estimate_tokens(text),
            chunk_ids: vec![Uuid::new_v4()],
        }
    }

    #[tokio::test]
    async fn missing_variable_makes_no_completion_call() {
        let client = Arc::new(MockClient::new(None));
        let engine = ExecutionEngine::new(client.clone(), ExecutionConfig::default());

        let err = engine
            .execute("Dear {{customer_name}},", &vars(&[]), Some(&context("ctx")))
            .await
            .unwrap_err();

        assert!(matches!(err, ExecuteError::MissingVariable(name) if name == "customer_name"));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn context_is_injected_as_delimited_section() {
        let client = Arc::new(MockClient::new(None));
        let engine = ExecutionEngine::new(client.clone(), ExecutionConfig::default());

        let record = engine
            .execute(
                "Answer for {{name}}.",
                &vars(&[("name", "Ada")]),
                Some(&context("[Source 1: doc]\nrelevant text")),
            )
            .await
            .unwrap();

        let prompts = client.prompts.lock().unwrap();
        let prompt = &prompts[0];
        assert!(prompt.starts_with("--- Retrieved context ---\n"));
        assert!(prompt.contains("relevant text"));
        assert!(prompt.contains("--- End context ---\n\nAnswer for Ada."));
        assert_eq!(record.used_chunk_ids.len(), 1);
    }

    #[tokio::test]
    async fn without_context_the_prompt_is_just_the_template() {
        let client = Arc::new(MockClient::new(None));
        let engine = ExecutionEngine::new(client.clone(), ExecutionConfig::default());

        let record = engine
            .execute("Plain question.", &vars(&[]), None)
            .await
            .unwrap();

        assert_eq!(client.prompts.lock().unwrap()[0], "Plain question.");
        assert!(record.used_chunk_ids.is_empty());
    }

    #[tokio::test]
    async fn empty_context_block_is_omitted() {
        let client = Arc::new(MockClient::new(None));
        let engine = ExecutionEngine::new(client.clone(), ExecutionConfig::default());

        let empty = ContextBlock::default();
        engine.execute("Question.", &vars(&[]), Some(&empty)).await.unwrap();
        assert_eq!(client.prompts.lock().unwrap()[0], "Question.");
    }

    #[tokio::test]
    async fn service_usage_is_preferred() {
        let usage = CompletionUsage {
            prompt_tokens: 42,
            completion_tokens: 7,
            total_tokens: 49,
        };
        let engine = ExecutionEngine::new(
            Arc::new(MockClient::new(Some(usage))),
            ExecutionConfig::default(),
        );

        let record = engine.execute("Question.", &vars(&[]), None).await.unwrap();
        assert_eq!(record.prompt_tokens, 42);
        assert_eq!(record.completion_tokens, 7);
        assert_eq!(record.total_tokens, 49);
    }

    #[tokio::test]
    async fn missing_usage_falls_back_to_estimates() {
        let engine = ExecutionEngine::new(
            Arc::new(MockClient::new(None)),
            ExecutionConfig::default(),
        );

        let record = engine.execute("abcdefgh", &vars(&[]), None).await.unwrap();
        assert_eq!(record.prompt_tokens, 2); // 8 chars
        assert_eq!(record.completion_tokens, estimate_tokens("mock answer") as u32);
        assert_eq!(record.total_tokens, record.prompt_tokens + record.completion_tokens);
    }

    #[tokio::test]
    async fn record_preserves_template_variables_and_prompt_length() {
        let client = Arc::new(MockClient::new(None));
        let engine = ExecutionEngine::new(client.clone(), ExecutionConfig::default());

        let record = engine
            .execute(
                "Hello {{name}}.",
                &vars(&[("name", "Ada"), ("unused", "kept too")]),
                Some(&context("[Source 1: doc]\nctx")),
            )
            .await
            .unwrap();

        // the record alone must be enough to reproduce the call
        assert_eq!(record.template, "Hello {{name}}.");
        assert_eq!(record.variables.get("name").map(String::as_str), Some("Ada"));
        assert_eq!(record.variables.len(), 2);
        let prompts = client.prompts.lock().unwrap();
        assert_eq!(record.prompt_chars, prompts[0].chars().count());
    }

    #[tokio::test]
    async fn record_captures_model_and_finish_reason() {
        let engine = ExecutionEngine::new(
            Arc::new(MockClient::new(None)),
            ExecutionConfig::default(),
        );

        let record = engine.execute("Q", &vars(&[]), None).await.unwrap();
        assert_eq!(record.model, ExecutionConfig::default().model);
        assert_eq!(record.finish_reason.as_deref(), Some("stop"));
        assert_eq!(record.response_text, "mock answer");
    }
}
