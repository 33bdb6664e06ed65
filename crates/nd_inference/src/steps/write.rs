use async_trait::async_trait;
use nd_core::{LengthRange, OutlineSection, Quote, Result, Source};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::outline::{quotes_data, render_outline};
use super::{budgets, require_text, Step, StepContext};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextResponse {
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WriteRequest {
    pub text: String,
    pub headline: String,
    pub blobs: Vec<String>,
    pub outline: Vec<OutlineSection>,
    pub quotes: Vec<Quote>,
    pub instructions: String,
    pub length: LengthRange,
}

fn length_data(length: LengthRange) -> Value {
    json!({"min": length.min, "max": length.max})
}

/// Stage 6: drafts the article from facts, headline and outline.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteStep;

#[async_trait]
impl Step for WriteStep {
    type Request = WriteRequest;
    type Response = TextResponse;

    const NUMBER: u8 = 6;
    const NAME: &'static str = "write";

    fn validate(&self, request: &Self::Request) -> Result<()> {
        require_text("text", &request.text)
    }

    async fn run(&self, ctx: &StepContext, request: Self::Request) -> Result<Self::Response> {
        let outline = if request.outline.is_empty() {
            "(none)".to_string()
        } else {
            render_outline(&request.outline)
        };
        let data = json!({
            "headline": request.headline,
            "blobs": request.blobs,
            "outline": outline,
            "text": request.text.trim(),
            "hasQuotes": !request.quotes.is_empty(),
            "quotes": quotes_data(&request.quotes),
            "instructions": request.instructions,
            "length": length_data(request.length),
        });
        let text = ctx.generate(&ctx.prompts.write, &data, budgets::WRITE).await?;
        Ok(TextResponse { text })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RewriteRequest {
    pub text: String,
    /// Sources flagged `useVerbatim` are passed through as protected passages.
    pub sources: Vec<Source>,
    pub instructions: String,
    pub length: LengthRange,
}

/// Stage 7: paraphrases the draft away from source wording.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewriteStep;

#[async_trait]
impl Step for RewriteStep {
    type Request = RewriteRequest;
    type Response = TextResponse;

    const NUMBER: u8 = 7;
    const NAME: &'static str = "rewrite";

    fn validate(&self, request: &Self::Request) -> Result<()> {
        require_text("text", &request.text)
    }

    async fn run(&self, ctx: &StepContext, request: Self::Request) -> Result<Self::Response> {
        let verbatim: Vec<Value> = request
            .sources
            .iter()
            .filter(|s| s.use_verbatim)
            .map(|s| json!({"accredit": s.accredit, "text": s.text.trim()}))
            .collect();
        let data = json!({
            "text": request.text.trim(),
            "hasVerbatim": !verbatim.is_empty(),
            "verbatim": verbatim,
            "instructions": request.instructions,
            "length": length_data(request.length),
        });
        let text = ctx.generate(&ctx.prompts.rewrite, &data, budgets::REWRITE).await?;
        Ok(TextResponse { text })
    }
}
