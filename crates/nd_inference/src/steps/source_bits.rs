use async_trait::async_trait;
use nd_core::{Result, Source};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{budgets, fan_out, fan_out_settled, require_sources, split_halves, SourceBranch, Step, StepContext};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SplitSourcesRequest {
    pub sources: Vec<Source>,
    pub instructions: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitSourcesResponse {
    pub sources: Vec<Source>,
}

/// Stage 1: breaks every source into fact bits (`factsBitSplitting1`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceBitsStep;

impl SourceBitsStep {
    async fn split_source(ctx: &StepContext, source: &Source, instructions: &str) -> Result<Source> {
        let ctx = ctx.scoped(format!("[source {}]", source.number));
        let branch = SourceBranch::of(source);
        ctx.logger.debug(&format!("Branch {:?}", branch));

        let mut data = json!({
            "source": {
                "number": source.number,
                "accredit": source.accredit,
                "description": source.description,
                "text": source.text.trim(),
            },
            "instructions": instructions,
        });

        let bits = match branch {
            SourceBranch::Verbatim => {
                ctx.generate(&ctx.prompts.source_bits_verbatim, &data, budgets::SOURCE_BITS_VERBATIM)
                    .await?
            }
            SourceBranch::Primary => {
                let (first, second) = split_halves(&source.text);
                data["firstHalf"] = json!(first);
                data["secondHalf"] = json!(second);
                ctx.generate(&ctx.prompts.source_bits_primary, &data, budgets::SOURCE_BITS).await?
            }
            SourceBranch::Default => ctx.generate(&ctx.prompts.source_bits, &data, budgets::SOURCE_BITS).await?,
        };

        Ok(Source {
            facts_bit_splitting1: Some(bits),
            ..source.clone()
        })
    }

    /// Splits every source, keeping those that succeed. Failures are logged
    /// and dropped.
    pub async fn split_settled(&self, ctx: &StepContext, request: &SplitSourcesRequest) -> Vec<Source> {
        let results = fan_out_settled(&request.sources, |source| {
            Self::split_source(ctx, source, &request.instructions)
        })
        .await;

        results
            .into_iter()
            .filter_map(|(number, result)| match result {
                Ok(source) => Some(source),
                Err(e) => {
                    ctx.logger.warn(&format!("Dropping source {}: {}", number, e));
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl Step for SourceBitsStep {
    type Request = SplitSourcesRequest;
    type Response = SplitSourcesResponse;

    const NUMBER: u8 = 1;
    const NAME: &'static str = "source-bits";

    fn validate(&self, request: &Self::Request) -> Result<()> {
        require_sources(&request.sources, "text", |s| Some(s.text.as_str()))
    }

    async fn run(&self, ctx: &StepContext, request: Self::Request) -> Result<Self::Response> {
        let sources = fan_out(&request.sources, |source| {
            Self::split_source(ctx, source, &request.instructions)
        })
        .await?;
        Ok(SplitSourcesResponse { sources })
    }
}
