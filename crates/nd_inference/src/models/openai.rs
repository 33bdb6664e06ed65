use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use nd_core::{Completion, CompletionRequest, Error, ResponseFormat, Result, TokenUsage};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::CompletionModel;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormatBody {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatBody>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Retry schedule for transient completion failures: transport errors,
/// 429 and 5xx. Delay doubles from `base_delay` on every attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Client for OpenAI-compatible `chat/completions` endpoints.
pub struct OpenAiModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl fmt::Debug for OpenAiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiModel")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("retry", &self.retry)
            .finish()
    }
}

impl OpenAiModel {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Inference("API key is required".to_string()))?;
        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
            model: "gpt-4o".to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    fn build_request<'a>(&'a self, request: &CompletionRequest) -> ChatRequest<'a> {
        let mut system = request.system.clone();
        let response_format = match &request.response_format {
            ResponseFormat::Text => None,
            ResponseFormat::Json { name, schema } => {
                system.push_str(&format!(
                    "\n\nRespond with a single JSON object named {} matching this JSON schema:\n{}",
                    name, schema
                ));
                Some(ResponseFormatBody { kind: "json_object" })
            }
        };

        let mut messages = vec![
            ChatMessage { role: "system", content: system },
            ChatMessage { role: "user", content: request.user.clone() },
        ];
        if let Some(assistant) = &request.assistant {
            messages.push(ChatMessage { role: "assistant", content: assistant.clone() });
        }

        ChatRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format,
        }
    }

    async fn attempt(&self, body: &ChatRequest<'_>) -> Attempt {
        let response = match self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                return Attempt::Retry(Error::Http(e))
            }
            Err(e) => return Attempt::Fail(Error::Http(e)),
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let error = Error::Inference(format!("HTTP {}: {}", status, text));
            return if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                Attempt::Retry(error)
            } else {
                Attempt::Fail(error)
            };
        }

        let parsed = match response.json::<ChatResponse>().await {
            Ok(parsed) => parsed,
            Err(e) => return Attempt::Fail(Error::Http(e)),
        };
        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();
        match parsed.choices.into_iter().next().and_then(|choice| choice.message.content) {
            Some(text) => Attempt::Done(Completion { text, usage }),
            None => Attempt::Fail(Error::Inference("completion returned no choices".to_string())),
        }
    }
}

enum Attempt {
    Done(Completion),
    Retry(Error),
    Fail(Error),
}

#[async_trait]
impl CompletionModel for OpenAiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = self.build_request(request);
        let mut attempt = 0;
        loop {
            match self.attempt(&body).await {
                Attempt::Done(completion) => return Ok(completion),
                Attempt::Fail(fatal) => return Err(fatal),
                Attempt::Retry(transient) => {
                    if attempt >= self.retry.max_retries {
                        return Err(transient);
                    }
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(
                        "Completion attempt {}/{} failed ({}), retrying in {:?}",
                        attempt + 1,
                        self.retry.max_retries + 1,
                        transient,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
