//! Runs the stages in order for one article, threading every output forward.

use std::sync::Arc;

use nd_core::{
    ArticleMode, CompletionModel, EditorPreferences, Error, NewArticle, Result, RunLogger, Source, StepOutputs,
    TokenUsage,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::prompts::PromptSet;
use crate::steps::{
    facts_digest, run_checked, ColorCodeRequest, ColorCodeStep, HeadlineRequest, HeadlineStep, OutlineRequest,
    OutlineStep, QuotesRequest, QuotesStep, RewriteRequest, RewriteStep, SourceBitsStep, SplitSourcesRequest, Step,
    StepContext, SummarizeRequest, SummarizeStep, WriteRequest, WriteStep, MAX_SOURCES,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineOptions {
    /// Keep going when some sources fail the first stage, dropping them.
    pub allow_partial_sources: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineRequest {
    pub mode: ArticleMode,
    pub sources: Vec<Source>,
    pub preferences: EditorPreferences,
    pub options: PipelineOptions,
}

impl PipelineRequest {
    pub fn validate(&self) -> Result<()> {
        let count = self.sources.len();
        match self.mode {
            ArticleMode::Digest if count != 1 => {
                return Err(Error::Validation(format!("digest mode takes exactly one source, got {}", count)))
            }
            ArticleMode::Aggregator if count == 0 || count > MAX_SOURCES => {
                return Err(Error::Validation(format!(
                    "aggregator mode takes 1 to {} sources, got {}",
                    MAX_SOURCES, count
                )))
            }
            _ => {}
        }
        if self.sources.iter().any(|s| s.text.trim().is_empty()) {
            return Err(Error::Validation("every source needs text".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    pub run_id: Uuid,
    /// Sources with both fact splits attached.
    pub sources: Vec<Source>,
    pub outputs: StepOutputs,
    pub usage: TokenUsage,
}

impl PipelineRun {
    /// Save payload for the finished article.
    pub fn to_new_article(&self) -> Result<NewArticle> {
        let rich_content = match &self.outputs.rich_content {
            Some(rich) => rich.to_json()?,
            None => String::new(),
        };
        Ok(NewArticle {
            headline: self.outputs.headline.clone().unwrap_or_default(),
            blobs: self.outputs.blobs.clone().unwrap_or_default(),
            content: self.outputs.final_text().unwrap_or_default().to_string(),
            rich_content,
            sources: self.sources.clone(),
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    model: Arc<dyn CompletionModel>,
    prompts: Arc<PromptSet>,
}

impl Pipeline {
    pub fn new(model: Arc<dyn CompletionModel>, prompts: Arc<PromptSet>) -> Self {
        Self { model, prompts }
    }

    pub async fn run(&self, request: PipelineRequest) -> Result<PipelineRun> {
        self.run_with_logger(request, RunLogger::new()).await
    }

    pub async fn run_with_logger(&self, request: PipelineRequest, logger: RunLogger) -> Result<PipelineRun> {
        request.validate()?;
        let ctx = StepContext::new(self.model.clone(), self.prompts.clone(), logger.with_new_prefixes("[pipeline]"));
        let prefs = request.preferences;
        ctx.logger.info(&format!(
            "🚀 Starting {:?} run with {} source(s) on {}",
            request.mode,
            request.sources.len(),
            self.model.name()
        ));

        let split = SplitSourcesRequest {
            sources: request.sources,
            instructions: prefs.instructions.clone(),
        };
        let sources = if request.options.allow_partial_sources {
            self.split_partial(&ctx, split).await?
        } else {
            run_checked(&SourceBitsStep, &ctx, split).await?.sources
        };

        let summarize = SummarizeRequest {
            sources,
            instructions: prefs.instructions.clone(),
        };
        let sources = run_checked(&SummarizeStep, &ctx, summarize).await?.sources;

        let quotes = run_checked(&QuotesStep, &ctx, QuotesRequest { sources: sources.clone() })
            .await?
            .quotes;
        let mut outputs = StepOutputs::default().record_quotes(quotes.clone())?;

        let facts = facts_digest(&sources);
        let base_angle = sources
            .iter()
            .find(|s| s.is_base_source)
            .map(|s| s.best_text().to_string())
            .unwrap_or_default();

        let headline = run_checked(
            &HeadlineStep,
            &ctx,
            HeadlineRequest {
                text: facts.clone(),
                base_angle,
                instructions: prefs.instructions.clone(),
                headline_suggestion: prefs.headline_suggestion.clone(),
                blobs: prefs.blobs,
            },
        )
        .await?;
        outputs = outputs.record_headline(headline.headline.clone(), headline.blobs.clone())?;

        let outline = run_checked(
            &OutlineStep,
            &ctx,
            OutlineRequest {
                text: facts.clone(),
                headline: headline.headline.clone(),
                blobs: headline.blobs.clone(),
                quotes: quotes.clone(),
                instructions: prefs.instructions.clone(),
            },
        )
        .await?
        .sections;
        outputs = outputs.record_outline(outline.clone())?;

        let draft = run_checked(
            &WriteStep,
            &ctx,
            WriteRequest {
                text: facts,
                headline: headline.headline,
                blobs: headline.blobs,
                outline,
                quotes,
                instructions: prefs.instructions.clone(),
                length: prefs.length,
            },
        )
        .await?
        .text;
        outputs = outputs.record_draft(draft.clone())?;

        let rewrite = run_checked(
            &RewriteStep,
            &ctx,
            RewriteRequest {
                text: draft,
                sources: sources.clone(),
                instructions: prefs.instructions,
                length: prefs.length,
            },
        )
        .await?
        .text;
        outputs = outputs.record_rewrite(rewrite.clone())?;

        let colored = run_checked(
            &ColorCodeStep,
            &ctx,
            ColorCodeRequest {
                text: rewrite,
                sources: sources.clone(),
            },
        )
        .await?;
        outputs = outputs.record_color_coding(colored.html, colored.rich_content)?;

        let usage = ctx.usage();
        ctx.logger.info(&format!("✅ Run finished, {} tokens used", usage.total()));
        Ok(PipelineRun {
            run_id: ctx.logger.run_id(),
            sources,
            outputs,
            usage,
        })
    }

    async fn split_partial(&self, ctx: &StepContext, request: SplitSourcesRequest) -> Result<Vec<Source>> {
        let tag = |e: Error| Error::StepFailed {
            step: SourceBitsStep::NUMBER,
            name: SourceBitsStep::NAME,
            source: Box::new(e),
        };
        SourceBitsStep.validate(&request).map_err(tag)?;

        let scoped = ctx.scoped(format!("[{}]", SourceBitsStep::NAME));
        let sources = SourceBitsStep.split_settled(&scoped, &request).await;
        if sources.is_empty() {
            return Err(tag(Error::Inference("every source failed".to_string())));
        }
        if sources.len() < request.sources.len() {
            scoped.logger.warn(&format!(
                "Continuing with {} of {} sources",
                sources.len(),
                request.sources.len()
            ));
        }
        Ok(sources)
    }
}
