use async_trait::async_trait;
use nd_core::{Error, OutlineSection, Quote, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{budgets, require_text, Step, StepContext};
use crate::structured::StructuredOutput;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutlineRequest {
    pub text: String,
    pub headline: String,
    pub blobs: Vec<String>,
    pub quotes: Vec<Quote>,
    pub instructions: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutlineResponse {
    pub sections: Vec<OutlineSection>,
}

impl StructuredOutput for OutlineResponse {
    const NAME: &'static str = "outline";

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "sections": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "heading": {"type": "string"},
                            "points": {"type": "array", "items": {"type": "string"}}
                        },
                        "required": ["heading", "points"]
                    }
                }
            },
            "required": ["sections"]
        })
    }

    fn check(&self) -> Result<()> {
        if self.sections.is_empty() {
            return Err(Error::Inference("outline has no sections".to_string()));
        }
        Ok(())
    }
}

/// Outline as prompt text: one heading per line, its points indented below.
pub fn render_outline(sections: &[OutlineSection]) -> String {
    sections
        .iter()
        .map(|section| {
            let mut block = section.heading.trim().to_string();
            for point in &section.points {
                block.push_str("\n  - ");
                block.push_str(point.trim());
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn quotes_data(quotes: &[Quote]) -> Value {
    Value::Array(
        quotes
            .iter()
            .map(|q| json!({"speaker": q.speaker, "quote": q.quote}))
            .collect(),
    )
}

/// Stage 5: plans the article as ordered sections.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlineStep;

#[async_trait]
impl Step for OutlineStep {
    type Request = OutlineRequest;
    type Response = OutlineResponse;

    const NUMBER: u8 = 5;
    const NAME: &'static str = "outline";

    fn validate(&self, request: &Self::Request) -> Result<()> {
        require_text("text", &request.text)
    }

    async fn run(&self, ctx: &StepContext, request: Self::Request) -> Result<Self::Response> {
        let data = json!({
            "headline": request.headline,
            "blobs": request.blobs,
            "text": request.text.trim(),
            "hasQuotes": !request.quotes.is_empty(),
            "quotes": quotes_data(&request.quotes),
            "instructions": request.instructions,
        });
        let mut outline: OutlineResponse = ctx
            .generate_structured(&ctx.prompts.outline, &data, budgets::OUTLINE)
            .await?;
        outline.sections.retain(|s| !s.heading.trim().is_empty() || !s.points.is_empty());
        outline.check()?;
        Ok(outline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::test_support::context_with;
    use crate::steps::{execute, StepStatus};

    #[tokio::test]
    async fn test_outline_sections() {
        let (ctx, model) = context_with(|_| {
            Ok(r#"{"sections": [
                {"heading": "What happened", "points": ["Fire at 3am", "No injuries"]},
                {"heading": "", "points": []},
                {"heading": "Reaction", "points": ["Mayor statement"]}
            ]}"#
            .to_string())
        });
        let request = OutlineRequest {
            text: "Facts".to_string(),
            headline: "Fire".to_string(),
            quotes: vec![Quote { speaker: "Mayor".to_string(), quote: "Sad day.".to_string(), source_number: Some(1) }],
            ..Default::default()
        };
        let reply = execute(&OutlineStep, &ctx, request).await;
        assert_eq!(reply.status, StepStatus::Ok);
        assert_eq!(reply.body.sections.len(), 2);
        assert!(model.calls()[0].user.contains("- Mayor: \"Sad day.\""));

        assert_eq!(
            render_outline(&reply.body.sections),
            "What happened\n  - Fire at 3am\n  - No injuries\nReaction\n  - Mayor statement"
        );
    }

    #[tokio::test]
    async fn test_quotes_header_is_omitted_without_quotes() {
        let (ctx, model) = context_with(|_| Ok(r#"{"sections": [{"heading": "A", "points": []}]}"#.to_string()));
        let request = OutlineRequest { text: "Facts".to_string(), ..Default::default() };
        execute(&OutlineStep, &ctx, request).await;
        assert!(!model.calls()[0].user.contains("Quotes available"));
    }

    #[tokio::test]
    async fn test_empty_outline_fails() {
        let (ctx, _) = context_with(|_| Ok(r#"{"sections": []}"#.to_string()));
        let reply = execute(&OutlineStep, &ctx, OutlineRequest { text: "Facts".to_string(), ..Default::default() }).await;
        assert_eq!(reply.status, StepStatus::Failed);
    }
}
