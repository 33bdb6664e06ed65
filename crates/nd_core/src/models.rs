use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::types::TokenUsage;
use crate::Result;

/// Shape the completion must take.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    Text,
    /// A JSON object matching `schema`.
    Json { name: &'static str, schema: Value },
}

/// One call to the hosted completion model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    /// Primes the assistant turn when set.
    pub assistant: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait CompletionModel: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Generate a completion for the given prompts
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}
