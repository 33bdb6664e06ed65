use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rich::RichContent;
use crate::{Error, Result};

/// One input document contributed to an article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Source {
    pub number: u32,
    pub accredit: String,
    pub text: String,
    pub description: String,
    pub use_verbatim: bool,
    pub is_primary_source: bool,
    pub is_base_source: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facts_bit_splitting1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facts_bit_splitting2: Option<String>,
}

impl Source {
    pub fn new(number: u32, accredit: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            number,
            accredit: accredit.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    /// Best text available for later stages: the condensed bits when present,
    /// the first split otherwise, the raw body as a last resort.
    pub fn best_text(&self) -> &str {
        self.facts_bit_splitting2
            .as_deref()
            .or(self.facts_bit_splitting1.as_deref())
            .unwrap_or(&self.text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Quote {
    pub speaker: String,
    pub quote: String,
    pub source_number: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutlineSection {
    pub heading: String,
    pub points: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LengthRange {
    pub min: u32,
    pub max: u32,
}

impl Default for LengthRange {
    fn default() -> Self {
        Self { min: 300, max: 600 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleMode {
    #[default]
    Digest,
    Aggregator,
}

/// Editor preferences sent alongside the sources of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorPreferences {
    pub instructions: String,
    pub blobs: usize,
    pub length: LengthRange,
    pub headline_suggestion: Option<String>,
}

impl Default for EditorPreferences {
    fn default() -> Self {
        Self {
            instructions: String::new(),
            blobs: 3,
            length: LengthRange::default(),
            headline_suggestion: None,
        }
    }
}

impl From<&Preset> for EditorPreferences {
    fn from(preset: &Preset) -> Self {
        Self {
            instructions: preset.instructions.clone(),
            blobs: preset.blobs,
            length: preset.length,
            headline_suggestion: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
    }
}

/// Text produced by each pipeline stage. Slots are filled once, in order,
/// and never rewritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutputs {
    pub quotes: Option<Vec<Quote>>,
    pub headline: Option<String>,
    pub blobs: Option<Vec<String>>,
    pub outline: Option<Vec<OutlineSection>>,
    pub draft: Option<String>,
    pub rewrite: Option<String>,
    pub color_coded_html: Option<String>,
    pub rich_content: Option<RichContent>,
}

fn fill<T>(slot: &mut Option<T>, value: T, name: &str) -> Result<()> {
    if slot.is_some() {
        return Err(Error::Validation(format!("step output '{}' already recorded", name)));
    }
    *slot = Some(value);
    Ok(())
}

impl StepOutputs {
    pub fn record_quotes(mut self, quotes: Vec<Quote>) -> Result<Self> {
        fill(&mut self.quotes, quotes, "quotes")?;
        Ok(self)
    }

    pub fn record_headline(mut self, headline: String, blobs: Vec<String>) -> Result<Self> {
        fill(&mut self.headline, headline, "headline")?;
        fill(&mut self.blobs, blobs, "blobs")?;
        Ok(self)
    }

    pub fn record_outline(mut self, outline: Vec<OutlineSection>) -> Result<Self> {
        fill(&mut self.outline, outline, "outline")?;
        Ok(self)
    }

    pub fn record_draft(mut self, draft: String) -> Result<Self> {
        fill(&mut self.draft, draft, "draft")?;
        Ok(self)
    }

    pub fn record_rewrite(mut self, rewrite: String) -> Result<Self> {
        fill(&mut self.rewrite, rewrite, "rewrite")?;
        Ok(self)
    }

    pub fn record_color_coding(mut self, html: String, rich: RichContent) -> Result<Self> {
        fill(&mut self.color_coded_html, html, "colorCodedHtml")?;
        fill(&mut self.rich_content, rich, "richContent")?;
        Ok(self)
    }

    /// Final plain text: the rewrite when present, the draft otherwise.
    pub fn final_text(&self) -> Option<&str> {
        self.rewrite.as_deref().or(self.draft.as_deref())
    }
}

/// Decimal article version, `major.minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const FIRST: Version = Version { major: 1, minor: 0 };

    /// The version after this one. Fails once the bumped part is exhausted.
    pub fn bump(self, bump: VersionBump) -> Result<Self> {
        let next = match bump {
            VersionBump::Major => self.major.checked_add(1).map(|major| Version { major, minor: 0 }),
            VersionBump::Minor => self.minor.checked_add(1).map(|minor| Version { minor, ..self }),
        };
        next.ok_or_else(|| Error::Validation(format!("version {} cannot be bumped further", self)))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (major, minor) = s.trim().split_once('.').unwrap_or((s.trim(), "0"));
        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| Error::Validation(format!("invalid version: {}", s)))
        };
        Ok(Version { major: parse(major)?, minor: parse(minor)? })
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionBump {
    /// A freshly generated article.
    #[default]
    Major,
    /// An editor's revision of an existing version.
    Minor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Draft,
    Review,
    Published,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Review => "review",
            ArticleStatus::Published => "published",
        }
    }
}

impl FromStr for ArticleStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(ArticleStatus::Draft),
            "review" => Ok(ArticleStatus::Review),
            "published" => Ok(ArticleStatus::Published),
            other => Err(Error::Validation(format!("unknown article status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: Uuid,
    pub slug: String,
    pub version: Version,
    pub headline: String,
    pub blobs: Vec<String>,
    pub content: String,
    /// Serialized [`RichContent`] tree.
    pub rich_content: String,
    pub status: ArticleStatus,
    pub org_id: String,
    pub creator_id: String,
    pub sources: Vec<Source>,
    pub created_at: DateTime<Utc>,
}

/// Payload for saving an article; the store assigns id and version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewArticle {
    /// Derived from the headline when empty.
    pub slug: String,
    pub headline: String,
    pub blobs: Vec<String>,
    pub content: String,
    pub rich_content: String,
    pub status: ArticleStatus,
    pub org_id: String,
    pub creator_id: String,
    pub sources: Vec<Source>,
    pub bump: VersionBump,
}

impl NewArticle {
    pub fn resolved_slug(&self) -> String {
        if self.slug.trim().is_empty() {
            slugify(&self.headline)
        } else {
            slugify(&self.slug)
        }
    }

    pub fn into_article(self, version: Version) -> Article {
        let slug = self.resolved_slug();
        Article {
            id: Uuid::new_v4(),
            slug,
            version,
            headline: self.headline,
            blobs: self.blobs,
            content: self.content,
            rich_content: self.rich_content,
            status: self.status,
            org_id: self.org_id,
            creator_id: self.creator_id,
            sources: self.sources,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: Uuid,
    pub org_id: String,
    pub name: String,
    pub instructions: String,
    pub blobs: usize,
    pub length: LengthRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPreset {
    pub name: String,
    pub instructions: String,
    pub blobs: usize,
    pub length: LengthRange,
}

impl Default for NewPreset {
    fn default() -> Self {
        Self {
            name: String::new(),
            instructions: String::new(),
            blobs: 3,
            length: LengthRange::default(),
        }
    }
}

impl NewPreset {
    pub fn into_preset(self, org_id: &str) -> Preset {
        Preset {
            id: Uuid::new_v4(),
            org_id: org_id.to_string(),
            name: self.name,
            instructions: self.instructions,
            blobs: self.blobs,
            length: self.length,
        }
    }
}

/// Lowercase ASCII slug, words joined by `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse_and_bump() {
        let version: Version = "2.3".parse().unwrap();
        assert_eq!(version, Version { major: 2, minor: 3 });
        assert_eq!(version.bump(VersionBump::Minor).unwrap().to_string(), "2.4");
        assert_eq!(version.bump(VersionBump::Major).unwrap().to_string(), "3.0");
        assert_eq!("4".parse::<Version>().unwrap(), Version { major: 4, minor: 0 });
        assert!("x.1".parse::<Version>().is_err());
    }

    #[test]
    fn test_version_bump_overflow_is_rejected() {
        let last_minor = Version { major: 2, minor: u32::MAX };
        assert!(last_minor.bump(VersionBump::Minor).unwrap_err().is_validation());
        assert_eq!(last_minor.bump(VersionBump::Major).unwrap(), Version { major: 3, minor: 0 });

        let last_major = Version { major: u32::MAX, minor: 0 };
        assert!(last_major.bump(VersionBump::Major).unwrap_err().is_validation());
        assert_eq!(last_major.bump(VersionBump::Minor).unwrap().to_string(), format!("{}.1", u32::MAX));
    }

    #[test]
    fn test_version_serializes_as_string() {
        let json = serde_json::to_string(&Version::FIRST).unwrap();
        assert_eq!(json, "\"1.0\"");
        let back: Version = serde_json::from_str("\"1.7\"").unwrap();
        assert_eq!(back.minor, 7);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Mayor Quits After  Scandal!"), "mayor-quits-after-scandal");
        assert_eq!(slugify("  --  "), "untitled");
    }

    #[test]
    fn test_step_outputs_are_append_only() {
        let outputs = StepOutputs::default().record_draft("first".to_string()).unwrap();
        assert!(outputs.clone().record_draft("second".to_string()).is_err());
        assert_eq!(outputs.final_text(), Some("first"));
    }

    #[test]
    fn test_source_deserializes_camel_case_with_defaults() {
        let source: Source = serde_json::from_str(
            r#"{"number": 2, "text": "Body", "useVerbatim": true, "factsBitSplitting1": "bits"}"#,
        )
        .unwrap();
        assert_eq!(source.number, 2);
        assert!(source.use_verbatim);
        assert!(!source.is_primary_source);
        assert_eq!(source.best_text(), "bits");
    }
}
