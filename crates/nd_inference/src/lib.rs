use std::time::Duration;

pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod steps;
pub mod structured;
pub mod template;

/// Completion model settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// `openai`, `deepseek` or `dummy`.
    pub provider: String,
    pub api_key: Option<String>,
    pub model_name: Option<String>,
    /// Overrides the provider's base URL, for OpenAI-compatible gateways.
    pub model_url: Option<String>,
    pub max_retries: u32,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: None,
            model_name: None,
            model_url: None,
            max_retries: 3,
            timeout: Duration::from_secs(120),
        }
    }
}

pub mod prelude {
    pub use super::models::create_model;
    pub use super::pipeline::{Pipeline, PipelineOptions, PipelineRequest, PipelineRun};
    pub use super::prompts::PromptSet;
    pub use super::steps::{execute, Step, StepContext, StepReply, StepStatus};
    pub use super::Config;
    pub use nd_core::{Error, Result};
}

pub use models::create_model;
pub use pipeline::{Pipeline, PipelineOptions, PipelineRequest, PipelineRun};
pub use prompts::PromptSet;
