use async_trait::async_trait;
use nd_core::{Result, Source};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{budgets, fan_out, require_sources, Step, StepContext};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummarizeRequest {
    pub sources: Vec<Source>,
    pub instructions: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeResponse {
    pub sources: Vec<Source>,
}

/// Stage 2: condenses each source's fact bits (`factsBitSplitting2`).
/// Verbatim sources are carried over untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummarizeStep;

async fn summarize_source(ctx: &StepContext, source: &Source, instructions: &str) -> Result<Source> {
    let bits = source.facts_bit_splitting1.clone().unwrap_or_default();
    if source.use_verbatim {
        return Ok(Source {
            facts_bit_splitting2: Some(bits),
            ..source.clone()
        });
    }

    let ctx = ctx.scoped(format!("[source {}]", source.number));
    let data = json!({
        "source": {
            "number": source.number,
            "accredit": source.accredit,
            "bits": bits,
        },
        "isBase": source.is_base_source,
        "instructions": instructions,
    });
    let condensed = ctx.generate(&ctx.prompts.summarize, &data, budgets::SUMMARIZE).await?;
    Ok(Source {
        facts_bit_splitting2: Some(condensed),
        ..source.clone()
    })
}

#[async_trait]
impl Step for SummarizeStep {
    type Request = SummarizeRequest;
    type Response = SummarizeResponse;

    const NUMBER: u8 = 2;
    const NAME: &'static str = "summarize";

    fn validate(&self, request: &Self::Request) -> Result<()> {
        require_sources(&request.sources, "factsBitSplitting1", |s| s.facts_bit_splitting1.as_deref())
    }

    async fn run(&self, ctx: &StepContext, request: Self::Request) -> Result<Self::Response> {
        let sources = fan_out(&request.sources, |source| summarize_source(ctx, source, &request.instructions)).await?;
        Ok(SummarizeResponse { sources })
    }
}
