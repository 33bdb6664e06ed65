use std::sync::Arc;

pub use nd_core::CompletionModel;
use nd_core::{Error, Result};

use crate::Config;

pub mod dummy;
pub mod openai;
pub mod scripted;

pub use dummy::DummyModel;
pub use openai::{OpenAiModel, RetryPolicy};
pub use scripted::ScriptedModel;

/// Builds the completion model named by `config.provider`.
pub fn create_model(config: &Config) -> Result<Arc<dyn CompletionModel>> {
    let retry = RetryPolicy {
        max_retries: config.max_retries,
        ..RetryPolicy::default()
    };
    let model: Arc<dyn CompletionModel> = match config.provider.as_str() {
        "openai" | "deepseek" => {
            let default_url = if config.provider == "deepseek" {
                openai::DEEPSEEK_BASE_URL
            } else {
                openai::OPENAI_BASE_URL
            };
            let default_model = if config.provider == "deepseek" { "deepseek-chat" } else { "gpt-4o" };
            let base_url = config.model_url.clone().unwrap_or_else(|| default_url.to_string());
            url::Url::parse(&base_url).map_err(|e| Error::Inference(format!("invalid model URL {}: {}", base_url, e)))?;

            let model = OpenAiModel::new(config.api_key.clone())?
                .with_base_url(base_url)
                .with_model(config.model_name.clone().unwrap_or_else(|| default_model.to_string()))
                .with_retry(retry)
                .with_timeout(config.timeout)?;
            Arc::new(model)
        }
        "dummy" => Arc::new(DummyModel::new()),
        other => {
            return Err(Error::Inference(format!(
                "Unknown model provider: {}. Available providers: openai, deepseek, dummy",
                other
            )))
        }
    };
    tracing::info!("🧠 Completion model ready: {} ({})", model.name(), config.provider);
    Ok(model)
}
