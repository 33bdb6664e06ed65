use async_trait::async_trait;
use nd_core::{Quote, Result, Source};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{budgets, require_sources, Step, StepContext};
use crate::structured::StructuredOutput;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuotesRequest {
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuotesResponse {
    pub quotes: Vec<Quote>,
}

impl StructuredOutput for QuotesResponse {
    const NAME: &'static str = "quotes";

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "quotes": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "speaker": {"type": "string"},
                            "quote": {"type": "string"},
                            "sourceNumber": {"type": "integer"}
                        },
                        "required": ["speaker", "quote"]
                    }
                }
            },
            "required": ["quotes"]
        })
    }
}

/// Stage 3: extracts direct quotes with speaker and source number.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuotesStep;

#[async_trait]
impl Step for QuotesStep {
    type Request = QuotesRequest;
    type Response = QuotesResponse;

    const NUMBER: u8 = 3;
    const NAME: &'static str = "quotes";

    fn validate(&self, request: &Self::Request) -> Result<()> {
        require_sources(&request.sources, "text", |s| Some(s.text.as_str()))
    }

    async fn run(&self, ctx: &StepContext, request: Self::Request) -> Result<Self::Response> {
        let sources: Vec<Value> = request
            .sources
            .iter()
            .map(|s| json!({"number": s.number, "accredit": s.accredit, "text": s.text.trim()}))
            .collect();
        let parsed: QuotesResponse = ctx
            .generate_structured(&ctx.prompts.quotes, &json!({ "sources": sources }), budgets::QUOTES)
            .await?;

        let known: Vec<u32> = request.sources.iter().map(|s| s.number).collect();
        let quotes = parsed
            .quotes
            .into_iter()
            .filter(|q| !q.quote.trim().is_empty())
            .map(|mut q| {
                // a number outside the batch is a model slip, not an attribution
                if q.source_number.map_or(false, |n| !known.contains(&n)) {
                    q.source_number = None;
                }
                q
            })
            .collect::<Vec<_>>();
        ctx.logger.info(&format!("Found {} quotes", quotes.len()));
        Ok(QuotesResponse { quotes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::test_support::context_with;
    use crate::steps::{execute, StepStatus};
    use nd_core::ResponseFormat;

    #[tokio::test]
    async fn test_quotes_are_parsed_and_cleaned() {
        let (ctx, model) = context_with(|_| {
            Ok(r#"```json
{"quotes": [
  {"speaker": "Mayor", "quote": "We will rebuild.", "sourceNumber": 1},
  {"speaker": "Nobody", "quote": "  ", "sourceNumber": 1},
  {"speaker": "Chief", "quote": "Stay inside.", "sourceNumber": 9}
]}
```"#
                .to_string())
        });
        let reply = execute(
            &QuotesStep,
            &ctx,
            QuotesRequest { sources: vec![Source::new(1, "AP", "The mayor said: \"We will rebuild.\"")] },
        )
        .await;
        assert_eq!(reply.status, StepStatus::Ok);
        assert_eq!(reply.body.quotes.len(), 2);
        assert_eq!(reply.body.quotes[0].source_number, Some(1));
        assert_eq!(reply.body.quotes[1].speaker, "Chief");
        assert_eq!(reply.body.quotes[1].source_number, None);

        let call = &model.calls()[0];
        assert!(matches!(call.response_format, ResponseFormat::Json { name: "quotes", .. }));
        assert!(call.user.contains("Source 1 (AP)"));
    }

    #[tokio::test]
    async fn test_unparseable_quotes_fail() {
        let (ctx, _) = context_with(|_| Ok("I could not find any quotes.".to_string()));
        let reply = execute(&QuotesStep, &ctx, QuotesRequest { sources: vec![Source::new(1, "AP", "text")] }).await;
        assert_eq!(reply.status, StepStatus::Failed);
        assert!(reply.body.quotes.is_empty());
    }
}
