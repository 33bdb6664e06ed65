use async_trait::async_trait;
use nd_core::{Error, Result, RichContent, Source};
use nd_export::palette::{ATTRIBUTION_COLORS, UNATTRIBUTED};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{budgets, require_text, Step, StepContext, MAX_SOURCES};

const _: () = assert!(ATTRIBUTION_COLORS.len() >= MAX_SOURCES);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColorCodeRequest {
    pub text: String,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorCodeResponse {
    pub html: String,
    pub rich_content: RichContent,
}

/// Attribution color for the source at `index` in the request.
pub fn source_color(index: usize) -> &'static str {
    ATTRIBUTION_COLORS[index % ATTRIBUTION_COLORS.len()]
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Strips code fences and, when the model ignored the markup instructions,
/// wraps each non-empty line into an unattributed paragraph.
pub fn repair_html(raw: &str) -> String {
    let mut html = raw.trim();
    if let Some(rest) = html.strip_prefix("```") {
        html = rest.split_once('\n').map_or("", |(_, body)| body);
        html = html.trim_end().strip_suffix("```").unwrap_or(html).trim();
    }
    if html.contains("<p") {
        return html.to_string();
    }
    html.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("<p><span style=\"color:{}\">{}</span></p>", UNATTRIBUTED, escape(line)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Stage 8: colors each sentence by the source it came from and converts
/// the result into the rich-content tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorCodeStep;

#[async_trait]
impl Step for ColorCodeStep {
    type Request = ColorCodeRequest;
    type Response = ColorCodeResponse;

    const NUMBER: u8 = 8;
    const NAME: &'static str = "color-code";

    fn validate(&self, request: &Self::Request) -> Result<()> {
        require_text("text", &request.text)
    }

    async fn run(&self, ctx: &StepContext, request: Self::Request) -> Result<Self::Response> {
        let sources: Vec<Value> = request
            .sources
            .iter()
            .enumerate()
            .map(|(i, s)| {
                json!({
                    "number": s.number,
                    "accredit": s.accredit,
                    "color": source_color(i),
                    "text": s.best_text().trim(),
                })
            })
            .collect();
        let data = json!({ "sources": sources, "text": request.text.trim() });

        let raw = ctx.generate(&ctx.prompts.color_code, &data, budgets::COLOR_CODE).await?;
        let html = repair_html(&raw);
        let rich_content = nd_export::html_to_rich(&html);
        if rich_content.is_empty() {
            return Err(Error::Export("color-coded HTML produced no content".to_string()));
        }
        Ok(ColorCodeResponse { html, rich_content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::test_support::context_with;
    use crate::steps::{execute, StepStatus};

    #[test]
    fn test_repair_html() {
        assert_eq!(repair_html("```html\n<p>x</p>\n```"), "<p>x</p>");
        assert_eq!(
            repair_html("First line\n\nA < B"),
            "<p><span style=\"color:black\">First line</span></p>\n<p><span style=\"color:black\">A &lt; B</span></p>"
        );
    }

    #[test]
    fn test_every_source_gets_its_own_color() {
        let colors: Vec<_> = (0..MAX_SOURCES).map(source_color).collect();
        assert_eq!(colors[0], "darkblue");
        assert_eq!(colors[1], "darkred");
        for (i, color) in colors.iter().enumerate() {
            assert!(!colors[..i].contains(color), "{} repeats", color);
            assert_ne!(*color, UNATTRIBUTED);
        }
    }

    #[tokio::test]
    async fn test_color_code_builds_rich_content() {
        let (ctx, model) = context_with(|_| {
            Ok(concat!(
                "<p><span style=\"color:darkblue\">The bridge closed.</span> ",
                "<span style=\"color:darkred\">Traffic backed up.</span></p>\n",
                "<p><span style=\"color:black\">More later.</span></p>"
            )
            .to_string())
        });
        let request = ColorCodeRequest {
            text: "The bridge closed. Traffic backed up.\n\nMore later.".to_string(),
            sources: vec![Source::new(1, "AP", "a"), Source::new(2, "BBC", "b")],
        };
        let reply = execute(&ColorCodeStep, &ctx, request).await;
        assert_eq!(reply.status, StepStatus::Ok);

        let blocks = reply.body.rich_content.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].children[0].color(), Some("darkblue"));
        assert_eq!(blocks[0].children[0].text.as_deref(), Some("The bridge closed."));
        assert!(reply.body.html.starts_with("<p>"));

        let user = &model.calls()[0].user;
        assert!(user.contains("- Source 1 (AP): darkblue"));
        assert!(user.contains("- Source 2 (BBC): darkred"));
    }

    #[tokio::test]
    async fn test_plain_model_output_is_wrapped() {
        let (ctx, _) = context_with(|_| Ok("Just text.".to_string()));
        let reply = execute(&ColorCodeStep, &ctx, ColorCodeRequest { text: "Just text.".to_string(), ..Default::default() }).await;
        assert_eq!(reply.status, StepStatus::Ok);
        assert_eq!(reply.body.rich_content.plain_text(), "Just text.");
        assert_eq!(reply.body.rich_content.blocks()[0].children[0].color(), Some("black"));
    }
}
