use async_trait::async_trait;
use nd_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{budgets, require_text, Step, StepContext};
use crate::structured::StructuredOutput;

/// Upper bound on requested blobs.
const MAX_BLOBS: usize = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeadlineRequest {
    /// Combined facts of every source.
    pub text: String,
    /// Condensed facts of the base source, when one is set.
    pub base_angle: String,
    pub instructions: String,
    pub headline_suggestion: Option<String>,
    pub blobs: usize,
}

impl Default for HeadlineRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            base_angle: String::new(),
            instructions: String::new(),
            headline_suggestion: None,
            blobs: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeadlineResponse {
    pub headline: String,
    pub blobs: Vec<String>,
}

impl StructuredOutput for HeadlineResponse {
    const NAME: &'static str = "headline";

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "headline": {"type": "string"},
                "blobs": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["headline", "blobs"]
        })
    }

    fn check(&self) -> Result<()> {
        if self.blobs.iter().all(|b| b.trim().is_empty()) {
            return Err(Error::Inference("structured headline has no blobs".to_string()));
        }
        Ok(())
    }
}

/// Stage 4: headline and blobs in two passes. A creative free-text draft
/// first, then a zero-temperature pass that lifts it into the schema
/// without rewording. An editor's headline suggestion wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlineStep;

impl HeadlineStep {
    fn suggestion(request: &HeadlineRequest) -> Option<&str> {
        request.headline_suggestion.as_deref().filter(|s| !s.trim().is_empty())
    }
}

#[async_trait]
impl Step for HeadlineStep {
    type Request = HeadlineRequest;
    type Response = HeadlineResponse;

    const NUMBER: u8 = 4;
    const NAME: &'static str = "headline";

    fn validate(&self, request: &Self::Request) -> Result<()> {
        require_text("text", &request.text)?;
        if request.blobs == 0 || request.blobs > MAX_BLOBS {
            return Err(Error::Validation(format!("blobs must be between 1 and {}", MAX_BLOBS)));
        }
        Ok(())
    }

    async fn run(&self, ctx: &StepContext, request: Self::Request) -> Result<Self::Response> {
        let suggestion = Self::suggestion(&request);
        let draft_data = json!({
            "text": request.text.trim(),
            "baseAngle": request.base_angle.trim(),
            "instructions": request.instructions,
            "headlineSuggestion": suggestion.unwrap_or_default(),
            "blobs": request.blobs,
        });
        let draft = ctx
            .generate(&ctx.prompts.headline_draft, &draft_data, budgets::HEADLINE_DRAFT)
            .await?;

        let structure_data = json!({ "draft": draft, "blobs": request.blobs });
        let mut structured: HeadlineResponse = ctx
            .generate_structured(&ctx.prompts.headline_structure, &structure_data, budgets::HEADLINE_STRUCTURE)
            .await?;

        structured.blobs.retain(|b| !b.trim().is_empty());
        structured.blobs.truncate(request.blobs);

        if let Some(suggestion) = suggestion {
            ctx.logger.debug("Using the editor's headline");
            structured.headline = suggestion.to_string();
        }
        if structured.headline.trim().is_empty() {
            return Err(Error::Inference("structured headline is empty".to_string()));
        }
        Ok(structured)
    }
}
