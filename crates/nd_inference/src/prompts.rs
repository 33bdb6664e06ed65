use std::path::Path;

use nd_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::template::{self, TemplateError};

/// System, user and optional assistant templates for one model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
    pub assistant: Option<String>,
}

impl PromptTemplate {
    pub fn new(system: &str, user: &str) -> Self {
        Self {
            system: system.to_string(),
            user: user.to_string(),
            assistant: None,
        }
    }

    pub fn render(&self, data: &Value) -> std::result::Result<RenderedPrompt, TemplateError> {
        Ok(RenderedPrompt {
            system: template::render(&self.system, data)?,
            user: template::render(&self.user, data)?,
            assistant: self
                .assistant
                .as_deref()
                .map(|assistant| template::render(assistant, data))
                .transpose()?,
        })
    }

    fn validate(&self) -> std::result::Result<(), TemplateError> {
        template::validate(&self.system)?;
        template::validate(&self.user)?;
        if let Some(assistant) = &self.assistant {
            template::validate(assistant)?;
        }
        Ok(())
    }
}

/// Every prompt the pipeline sends. Loaded from JSON to override the
/// defaults; keys missing from the file keep their default template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptSet {
    pub source_bits: PromptTemplate,
    pub source_bits_primary: PromptTemplate,
    pub source_bits_verbatim: PromptTemplate,
    pub summarize: PromptTemplate,
    pub quotes: PromptTemplate,
    pub headline_draft: PromptTemplate,
    pub headline_structure: PromptTemplate,
    pub outline: PromptTemplate,
    pub write: PromptTemplate,
    pub rewrite: PromptTemplate,
    pub color_code: PromptTemplate,
}

impl PromptSet {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let prompts: PromptSet = serde_json::from_str(&raw)?;
        prompts.validate()?;
        Ok(prompts)
    }

    /// Fails on the first template that does not parse.
    pub fn validate(&self) -> Result<()> {
        let all = [
            ("sourceBits", &self.source_bits),
            ("sourceBitsPrimary", &self.source_bits_primary),
            ("sourceBitsVerbatim", &self.source_bits_verbatim),
            ("summarize", &self.summarize),
            ("quotes", &self.quotes),
            ("headlineDraft", &self.headline_draft),
            ("headlineStructure", &self.headline_structure),
            ("outline", &self.outline),
            ("write", &self.write),
            ("rewrite", &self.rewrite),
            ("colorCode", &self.color_code),
        ];
        for (name, prompt) in all {
            prompt
                .validate()
                .map_err(|e| Error::Template(format!("{}: {}", name, e)))?;
        }
        Ok(())
    }
}

const EDITOR_SYSTEM: &str = "You are a wire-desk news editor. You never invent facts, names, numbers or quotes. \
You keep every figure, date and direct quote exactly as it appears in the material you are given.";

const SOURCE_BITS_USER: &str = "Source {{source.number}}{{#source.accredit}} ({{source.accredit}}){{/source.accredit}}
{{#source.description}}About this source: {{source.description}}
{{/source.description}}
{{source.text}}

Break the source above into fact bits: one short sentence per fact, in the order the facts appear. \
Keep direct quotes verbatim and attributed.
{{#instructions}}
Editor instructions: {{instructions}}
{{/instructions}}
Return one fact bit per line, each line starting with \"- \".";

const SOURCE_BITS_PRIMARY_USER: &str = "Source {{source.number}}{{#source.accredit}} ({{source.accredit}}){{/source.accredit}} is the primary source. \
It has been split into two halves. Condense each half into fact bits separately and keep the order of facts.

FIRST HALF:
{{firstHalf}}

SECOND HALF:
{{secondHalf}}
{{#instructions}}
Editor instructions: {{instructions}}
{{/instructions}}
Return two lists under the headings FIRST HALF and SECOND HALF, one fact bit per line, each starting with \"- \".";

const SOURCE_BITS_VERBATIM_USER: &str = "Reprint source {{source.number}}{{#source.accredit}} ({{source.accredit}}){{/source.accredit}} exactly as written. \
Only separate its paragraphs with blank lines. Do not change, add or remove a single word.

{{source.text}}";

const SUMMARIZE_USER: &str = "Fact bits from source {{source.number}}{{#source.accredit}} ({{source.accredit}}){{/source.accredit}}:
{{source.bits}}
{{#isBase}}
This is the base source: its angle defines the story, so keep its lead facts first.
{{/isBase}}{{#instructions}}
Editor instructions: {{instructions}}
{{/instructions}}
Condense these fact bits to the points a reader needs. Drop repetition, keep quotes verbatim. \
Return one fact per line, each starting with \"- \".";

const QUOTES_SYSTEM: &str = "You extract direct quotes from news material. You copy quotes character for character \
and you only return quotes that appear in the text. You answer with JSON only.";

const QUOTES_USER: &str = "{{#sources}}Source {{number}}{{#accredit}} ({{accredit}}){{/accredit}}:
{{text}}

{{/sources}}List every direct quote above with its speaker and the number of the source it came from. \
Return {\"quotes\": [{\"speaker\": string, \"quote\": string, \"sourceNumber\": number}]}.";

const HEADLINE_DRAFT_SYSTEM: &str = "You write punchy, tabloid-style headlines and summary blobs for a busy news site. \
Short words, strong verbs, no clickbait questions, no invented facts.";

const HEADLINE_DRAFT_USER: &str = "{{text}}
{{#baseAngle}}
Lead with the angle of the base source:
{{baseAngle}}
{{/baseAngle}}{{#instructions}}
Editor instructions: {{instructions}}
{{/instructions}}{{#headlineSuggestion}}
The editor suggested this headline: {{headlineSuggestion}}
{{/headlineSuggestion}}
Write one headline and {{blobs}} blobs. A blob is a single-sentence summary point of at most 25 words.";

const HEADLINE_STRUCTURE_SYSTEM: &str = "You convert free text into JSON without changing its wording. You answer with JSON only.";

const HEADLINE_STRUCTURE_USER: &str = "{{draft}}

Extract the headline and the blobs above, word for word, into \
{\"headline\": string, \"blobs\": [string]}. Return at most {{blobs}} blobs.";

const OUTLINE_USER: &str = "Headline: {{headline}}
{{#blobs}}- {{.}}
{{/blobs}}
Facts:
{{text}}
{{#hasQuotes}}
Quotes available:
{{#quotes}}- {{speaker}}: \"{{quote}}\"
{{/quotes}}{{/hasQuotes}}{{#instructions}}
Editor instructions: {{instructions}}
{{/instructions}}
Plan the article as ordered sections. Return {\"sections\": [{\"heading\": string, \"points\": [string]}]}.";

const WRITE_USER: &str = "Write the article.

Headline: {{headline}}
{{#blobs}}- {{.}}
{{/blobs}}
Outline:
{{outline}}

Facts:
{{text}}
{{#hasQuotes}}
Quotes you may use verbatim:
{{#quotes}}- {{speaker}}: \"{{quote}}\"
{{/quotes}}{{/hasQuotes}}{{#instructions}}
Editor instructions: {{instructions}}
{{/instructions}}
Length: between {{length.min}} and {{length.max}} words. Plain paragraphs separated by blank lines, no headings.";

const REWRITE_USER: &str = "{{text}}

Paraphrase the article above so no sentence copies a source's wording, \
keeping every fact, figure and direct quote intact.
{{#hasVerbatim}}
These passages are reprinted with permission and must stay exactly as written:
{{#verbatim}}--- {{accredit}}
{{text}}
{{/verbatim}}{{/hasVerbatim}}{{#instructions}}
Editor instructions: {{instructions}}
{{/instructions}}
Keep the length between {{length.min}} and {{length.max}} words. Return plain paragraphs separated by blank lines.";

const COLOR_CODE_SYSTEM: &str = "You attribute article text to its sources and answer with HTML only.";

const COLOR_CODE_USER: &str = "Sources and their colors:
{{#sources}}- Source {{number}}{{#accredit}} ({{accredit}}){{/accredit}}: {{color}}
{{text}}
{{/sources}}
Article:
{{text}}

Reproduce the article without changing any words. Wrap every paragraph in <p></p>. \
Inside each paragraph wrap every sentence in <span style=\"color:COLOR\"></span> using the color of the source \
the sentence is drawn from, or black when it comes from no single source.";

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            source_bits: PromptTemplate::new(EDITOR_SYSTEM, SOURCE_BITS_USER),
            source_bits_primary: PromptTemplate::new(EDITOR_SYSTEM, SOURCE_BITS_PRIMARY_USER),
            source_bits_verbatim: PromptTemplate::new(EDITOR_SYSTEM, SOURCE_BITS_VERBATIM_USER),
            summarize: PromptTemplate::new(EDITOR_SYSTEM, SUMMARIZE_USER),
            quotes: PromptTemplate::new(QUOTES_SYSTEM, QUOTES_USER),
            headline_draft: PromptTemplate::new(HEADLINE_DRAFT_SYSTEM, HEADLINE_DRAFT_USER),
            headline_structure: PromptTemplate::new(HEADLINE_STRUCTURE_SYSTEM, HEADLINE_STRUCTURE_USER),
            outline: PromptTemplate::new(EDITOR_SYSTEM, OUTLINE_USER),
            write: PromptTemplate::new(EDITOR_SYSTEM, WRITE_USER),
            rewrite: PromptTemplate::new(EDITOR_SYSTEM, REWRITE_USER),
            color_code: PromptTemplate::new(COLOR_CODE_SYSTEM, COLOR_CODE_USER),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_prompts_parse() {
        PromptSet::default().validate().unwrap();
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let prompts: PromptSet = serde_json::from_value(json!({
            "write": {"system": "custom", "user": "{{text}}"}
        }))
        .unwrap();
        assert_eq!(prompts.write.system, "custom");
        assert_eq!(prompts.rewrite, PromptSet::default().rewrite);
    }

    #[test]
    fn test_load_rejects_broken_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.json");
        std::fs::write(&path, r#"{"outline": {"system": "x", "user": "{{#open}}"}}"#).unwrap();
        let err = PromptSet::load(&path).unwrap_err();
        assert!(err.to_string().contains("outline"));
    }

    #[test]
    fn test_source_bits_prompt_renders() {
        let rendered = PromptSet::default()
            .source_bits
            .render(&json!({
                "source": {"number": 1, "accredit": "AP", "description": "", "text": "Body text."},
                "instructions": ""
            }))
            .unwrap();
        assert!(rendered.user.starts_with("Source 1 (AP)"));
        assert!(rendered.user.contains("Body text."));
        assert!(!rendered.user.contains("Editor instructions"));
    }
}
