//! Pipeline stages.
//!
//! Every stage is a [`Step`]: it validates its request, renders its prompts,
//! calls the completion model with its own temperature and token budget and
//! returns a typed response. [`execute`] turns a stage into the handler
//! contract used by the HTTP layer: a 400 reply with an empty body for
//! invalid requests, a 500 reply with an empty body for generation failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use nd_core::{
    CompletionModel, CompletionRequest, Error, ResponseFormat, Result, RunLogger, Source, TokenUsage,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::prompts::{PromptSet, PromptTemplate};
use crate::structured::{parse_structured, StructuredOutput};

pub mod color_code;
pub mod fan_out;
pub mod headline;
pub mod outline;
pub mod quotes;
pub mod source_bits;
pub mod summarize;
pub mod write;

pub use color_code::{ColorCodeRequest, ColorCodeResponse, ColorCodeStep};
pub use fan_out::{fan_out, fan_out_settled, split_halves, SourceBranch, MAX_SOURCES};
pub use headline::{HeadlineRequest, HeadlineResponse, HeadlineStep};
pub use outline::{OutlineRequest, OutlineResponse, OutlineStep};
pub use quotes::{QuotesRequest, QuotesResponse, QuotesStep};
pub use source_bits::{SourceBitsStep, SplitSourcesRequest, SplitSourcesResponse};
pub use summarize::{SummarizeRequest, SummarizeResponse, SummarizeStep};
pub use write::{RewriteRequest, RewriteStep, TextResponse, WriteRequest, WriteStep};

/// Sampling settings fixed per stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

pub mod budgets {
    use super::StageSettings;

    pub const SOURCE_BITS: StageSettings = StageSettings { temperature: 0.3, max_tokens: 4000 };
    pub const SOURCE_BITS_VERBATIM: StageSettings = StageSettings { temperature: 0.0, max_tokens: 4000 };
    pub const SUMMARIZE: StageSettings = StageSettings { temperature: 0.3, max_tokens: 2000 };
    pub const QUOTES: StageSettings = StageSettings { temperature: 0.0, max_tokens: 2000 };
    pub const HEADLINE_DRAFT: StageSettings = StageSettings { temperature: 0.9, max_tokens: 600 };
    pub const HEADLINE_STRUCTURE: StageSettings = StageSettings { temperature: 0.0, max_tokens: 600 };
    pub const OUTLINE: StageSettings = StageSettings { temperature: 0.4, max_tokens: 1500 };
    pub const WRITE: StageSettings = StageSettings { temperature: 0.7, max_tokens: 4000 };
    pub const REWRITE: StageSettings = StageSettings { temperature: 0.6, max_tokens: 4000 };
    pub const COLOR_CODE: StageSettings = StageSettings { temperature: 0.0, max_tokens: 6000 };
}

#[derive(Debug, Default)]
struct UsageMeter {
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

impl UsageMeter {
    fn add(&self, usage: TokenUsage) {
        self.prompt_tokens.fetch_add(usage.prompt_tokens, Ordering::Relaxed);
        self.completion_tokens.fetch_add(usage.completion_tokens, Ordering::Relaxed);
    }

    fn snapshot(&self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
        }
    }
}

/// Everything a stage needs for one run: the model, the prompts and the
/// run's logger. Clones share the token meter.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub model: Arc<dyn CompletionModel>,
    pub prompts: Arc<PromptSet>,
    pub logger: RunLogger,
    usage: Arc<UsageMeter>,
}

impl StepContext {
    pub fn new(model: Arc<dyn CompletionModel>, prompts: Arc<PromptSet>, logger: RunLogger) -> Self {
        Self {
            model,
            prompts,
            logger,
            usage: Arc::new(UsageMeter::default()),
        }
    }

    /// Same run, with `prefix` appended to log lines.
    pub fn scoped(&self, prefix: impl Into<String>) -> Self {
        Self {
            logger: self.logger.with_prefix(prefix),
            ..self.clone()
        }
    }

    /// Tokens spent by every call made through this context and its clones.
    pub fn usage(&self) -> TokenUsage {
        self.usage.snapshot()
    }

    async fn call(
        &self,
        template: &PromptTemplate,
        data: &Value,
        settings: StageSettings,
        response_format: ResponseFormat,
    ) -> Result<String> {
        let prompt = template.render(data)?;
        self.logger.payload("system prompt", &prompt.system);
        self.logger.payload("user prompt", &prompt.user);

        let request = CompletionRequest {
            system: prompt.system,
            user: prompt.user,
            assistant: prompt.assistant,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            response_format,
        };
        let completion = self.model.complete(&request).await?;
        self.usage.add(completion.usage);
        self.logger.payload("response", &completion.text);
        Ok(completion.text)
    }

    /// Free-text generation.
    pub async fn generate(&self, template: &PromptTemplate, data: &Value, settings: StageSettings) -> Result<String> {
        let text = self.call(template, data, settings, ResponseFormat::Text).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Inference("model returned an empty completion".to_string()));
        }
        Ok(text.to_string())
    }

    /// Generation parsed, repaired if needed, and checked against `T`.
    pub async fn generate_structured<T: StructuredOutput>(
        &self,
        template: &PromptTemplate,
        data: &Value,
        settings: StageSettings,
    ) -> Result<T> {
        let format = ResponseFormat::Json {
            name: T::NAME,
            schema: T::schema(),
        };
        let raw = self.call(template, data, settings, format).await?;
        parse_structured(&raw)
    }
}

#[async_trait]
pub trait Step: Send + Sync {
    type Request: DeserializeOwned + Send + Sync + 'static;
    type Response: Serialize + Default + Send + 'static;

    /// Position in the pipeline, used in user-facing failure messages.
    const NUMBER: u8;
    const NAME: &'static str;

    /// Rejects requests missing their required fields.
    fn validate(&self, request: &Self::Request) -> Result<()>;

    async fn run(&self, ctx: &StepContext, request: Self::Request) -> Result<Self::Response>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Ok,
    BadRequest,
    Failed,
}

impl StepStatus {
    pub fn http_code(self) -> u16 {
        match self {
            StepStatus::Ok => 200,
            StepStatus::BadRequest => 400,
            StepStatus::Failed => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepReply<T> {
    pub status: StepStatus,
    pub body: T,
}

/// Runs a stage behind the handler boundary: errors never escape, they
/// become an empty body with a status.
pub async fn execute<S: Step>(step: &S, ctx: &StepContext, request: S::Request) -> StepReply<S::Response> {
    let ctx = ctx.scoped(format!("[{}]", S::NAME));
    if let Err(e) = step.validate(&request) {
        ctx.logger.warn(&format!("Rejected request: {}", e));
        return StepReply {
            status: StepStatus::BadRequest,
            body: S::Response::default(),
        };
    }

    ctx.logger.info("Generating");
    match step.run(&ctx, request).await {
        Ok(body) => {
            ctx.logger.info("✨ Done");
            StepReply {
                status: StepStatus::Ok,
                body,
            }
        }
        Err(e) => {
            ctx.logger.error(&format!("Step {} failed: {}", S::NUMBER, e));
            StepReply {
                status: StepStatus::Failed,
                body: S::Response::default(),
            }
        }
    }
}

/// Validates then runs a stage, tagging any error with the stage number.
pub async fn run_checked<S: Step>(step: &S, ctx: &StepContext, request: S::Request) -> Result<S::Response> {
    let ctx = ctx.scoped(format!("[{}]", S::NAME));
    let tag = |e: Error| Error::StepFailed {
        step: S::NUMBER,
        name: S::NAME,
        source: Box::new(e),
    };
    step.validate(&request).map_err(tag)?;
    ctx.logger.info("Generating");
    let response = step.run(&ctx, request).await.map_err(tag)?;
    ctx.logger.info("✨ Done");
    Ok(response)
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Shared checks for stages taking a batch of sources.
pub(crate) fn require_sources<F>(sources: &[Source], field: &str, value: F) -> Result<()>
where
    F: Fn(&Source) -> Option<&str>,
{
    if sources.is_empty() {
        return Err(Error::Validation("at least one source is required".to_string()));
    }
    if sources.len() > MAX_SOURCES {
        return Err(Error::Validation(format!(
            "at most {} sources are supported, got {}",
            MAX_SOURCES,
            sources.len()
        )));
    }
    if sources.iter().filter(|s| s.is_base_source).count() > 1 {
        return Err(Error::Validation("only one source can be the base source".to_string()));
    }
    for source in sources {
        if value(source).map_or(true, |v| v.trim().is_empty()) {
            return Err(Error::Validation(format!("source {} has no {}", source.number, field)));
        }
    }
    Ok(())
}

/// Sources rendered as one block of facts, numbered and attributed.
pub fn facts_digest(sources: &[Source]) -> String {
    sources
        .iter()
        .map(|source| {
            let mut header = format!("Source {}", source.number);
            if !source.accredit.is_empty() {
                header.push_str(&format!(" ({})", source.accredit));
            }
            if source.use_verbatim {
                header.push_str(" [verbatim]");
            }
            format!("{}:\n{}", header, source.best_text().trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}


#[cfg(test)]
mod tests {
    use super::test_support::context_with;
    use super::*;
    use nd_core::Source;

    #[tokio::test]
    async fn test_execute_maps_validation_to_bad_request() {
        let (ctx, model) = context_with(|_| Ok("text".to_string()));
        let reply = execute(&WriteStep, &ctx, WriteRequest::default()).await;
        assert_eq!(reply.status, StepStatus::BadRequest);
        assert_eq!(reply.status.http_code(), 400);
        assert_eq!(reply.body.text, "");
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_maps_generation_errors_to_failed() {
        let (ctx, _) = context_with(|_| Err(Error::Inference("rate limited".to_string())));
        let request = WriteRequest {
            text: "Facts".to_string(),
            ..Default::default()
        };
        let reply = execute(&WriteStep, &ctx, request).await;
        assert_eq!(reply.status, StepStatus::Failed);
        assert_eq!(reply.status.http_code(), 500);
        assert_eq!(reply.body.text, "");
    }

    #[tokio::test]
    async fn test_every_stage_rejects_empty_required_fields() {
        let (ctx, model) = context_with(|_| Ok("unused".to_string()));
        let empty_source = vec![Source::new(1, "AP", "")];

        let reply = execute(&SourceBitsStep, &ctx, SplitSourcesRequest { sources: empty_source.clone(), ..Default::default() }).await;
        assert_eq!(reply.status, StepStatus::BadRequest);
        assert!(reply.body.sources.is_empty());

        let reply = execute(&SummarizeStep, &ctx, SummarizeRequest { sources: empty_source.clone(), ..Default::default() }).await;
        assert_eq!(reply.status, StepStatus::BadRequest);
        assert!(reply.body.sources.is_empty());

        let reply = execute(&QuotesStep, &ctx, QuotesRequest { sources: empty_source }).await;
        assert_eq!(reply.status, StepStatus::BadRequest);
        assert!(reply.body.quotes.is_empty());

        let reply = execute(&HeadlineStep, &ctx, HeadlineRequest::default()).await;
        assert_eq!(reply.status, StepStatus::BadRequest);
        assert_eq!(reply.body.headline, "");
        assert!(reply.body.blobs.is_empty());

        let reply = execute(&OutlineStep, &ctx, OutlineRequest::default()).await;
        assert_eq!(reply.status, StepStatus::BadRequest);
        assert!(reply.body.sections.is_empty());

        let reply = execute(&WriteStep, &ctx, WriteRequest::default()).await;
        assert_eq!(reply.status, StepStatus::BadRequest);
        assert_eq!(reply.body.text, "");

        let reply = execute(&RewriteStep, &ctx, RewriteRequest::default()).await;
        assert_eq!(reply.status, StepStatus::BadRequest);
        assert_eq!(reply.body.text, "");

        let reply = execute(&ColorCodeStep, &ctx, ColorCodeRequest::default()).await;
        assert_eq!(reply.status, StepStatus::BadRequest);
        assert_eq!(reply.body.html, "");
        assert!(reply.body.rich_content.is_empty());

        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_run_checked_tags_errors_with_step_number() {
        let (ctx, _) = context_with(|_| Err(Error::Inference("boom".to_string())));
        let err = run_checked(&WriteStep, &ctx, WriteRequest { text: "x".to_string(), ..Default::default() })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Step 6 failed");
        assert!(!err.is_validation());

        let err = run_checked(&WriteStep, &ctx, WriteRequest::default()).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_usage_is_shared_between_scoped_contexts() {
        let (ctx, _) = context_with(|_| Ok("text".to_string()));
        let scoped = ctx.scoped("[child]");
        scoped
            .generate(&ctx.prompts.write.clone(), &serde_json::json!({
                "headline": "h", "blobs": [], "outline": "o", "text": "t", "hasQuotes": false,
                "quotes": [], "instructions": "", "length": {"min": 1, "max": 2}
            }), budgets::WRITE)
            .await
            .unwrap();
        assert_eq!(ctx.usage().total(), 15);
    }

    #[test]
    fn test_facts_digest() {
        let mut a = Source::new(1, "AP", "raw");
        a.facts_bit_splitting2 = Some("- condensed".to_string());
        let mut b = Source::new(2, "", "raw two");
        b.use_verbatim = true;
        let digest = facts_digest(&[a, b]);
        assert_eq!(digest, "Source 1 (AP):\n- condensed\n\nSource 2 [verbatim]:\nraw two");
    }
}
