//! Hosted LLM client and the prompts used for answering

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{ApiKey, LlmConfig};
use crate::error::{Error, Result};
use crate::vector_store::ScoredChunk;

/// Produces a completion for a prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn model(&self) -> &str;
}

/// Answer plus the chunks it was conditioned on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ScoredChunk>,
}

/// Question as phrased to the QA prompt.
pub fn grounded_question(question: &str) -> String {
    format!("Answer based strictly on the uploaded document: {question}")
}

/// "Stuff" prompt: every retrieved chunk is placed in one context block.
pub fn qa_prompt(question: &str, context: &[ScoredChunk]) -> String {
    let context = context
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n\
         {context}\n\n\
         Question: {question}\n\
         Helpful Answer:"
    )
}

pub fn raw_prompt(question: &str, document_text: &str) -> String {
    format!("Based on the following document, answer: {question}\n\n{document_text}")
}

/// Retrieval-augmented answer over already retrieved chunks.
pub async fn answer_with_context(
    generator: &dyn Generator,
    question: &str,
    context: Vec<ScoredChunk>,
) -> Result<Answer> {
    let prompt = qa_prompt(&grounded_question(question), &context);
    let text = generator.complete(&prompt).await?;
    tracing::info!("LLM result: {}", text);
    Ok(Answer {
        text,
        sources: context,
    })
}

/// Answer from the full text of one document, no retrieval.
pub async fn answer_raw(
    generator: &dyn Generator,
    question: &str,
    document_text: &str,
) -> Result<Answer> {
    let text = generator
        .complete(&raw_prompt(question, document_text))
        .await?;
    Ok(Answer {
        text,
        sources: Vec::new(),
    })
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Groq chat completions client (OpenAI-compatible protocol).
pub struct GroqClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: ApiKey,
    max_retries: u32,
}

impl GroqClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        tracing::info!("LLM client: {} at {}", config.model, config.base_url);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn send_request(&self, prompt: &str) -> std::result::Result<String, Attempt> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let retryable = e.is_timeout() || e.is_connect();
                Attempt::new(Error::Http(e), retryable)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let retryable = status.as_u16() == 429 || status.is_server_error();
            return Err(Attempt::new(
                Error::llm(format!("{} returned {}: {}", self.base_url, status, body)),
                retryable,
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Attempt::new(Error::llm(format!("invalid response: {e}")), false))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Attempt::new(Error::llm("response contained no completion"), false))
    }
}

const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_MAX_MS: u64 = 30_000;

/// Exponential backoff for the given retry number, capped at 30s.
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt);
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(factor).min(BACKOFF_MAX_MS))
}

struct Attempt {
    error: Error,
    retryable: bool,
}

impl Attempt {
    fn new(error: Error, retryable: bool) -> Self {
        Self { error, retryable }
    }
}

#[async_trait]
impl Generator for GroqClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.send_request(prompt).await {
                Ok(text) => return Ok(text),
                Err(failed) if failed.retryable && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        "Retryable LLM error (attempt {}), retrying in {:?}: {}",
                        attempt,
                        delay,
                        failed.error
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failed) => return Err(failed.error),
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}
