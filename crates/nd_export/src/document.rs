use std::str::FromStr;

use nd_core::{Article, Error, Result};
use serde::{Deserialize, Serialize};

use crate::paragraphs::{paragraphs_from_json, paragraphs_from_text, DocParagraph};

/// Everything an exported file shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportDocument {
    pub headline: String,
    /// Small line under the headline: sources, version, date.
    pub metadata: String,
    pub blobs: Vec<String>,
    /// Plain text, used when the rich content is missing or unreadable.
    pub content: String,
    /// Serialized rich-content tree.
    pub rich_content: String,
}

impl ExportDocument {
    /// Body paragraphs from the rich tree, or from the plain text when the
    /// tree yields nothing.
    pub fn body(&self) -> Vec<DocParagraph> {
        let rich = if self.rich_content.trim().is_empty() {
            Vec::new()
        } else {
            paragraphs_from_json(&self.rich_content)
        };
        if rich.is_empty() {
            paragraphs_from_text(&self.content)
        } else {
            rich
        }
    }

    /// File name stem derived from the headline.
    pub fn file_stem(&self) -> String {
        nd_core::slugify(&self.headline)
    }
}

impl From<&Article> for ExportDocument {
    fn from(article: &Article) -> Self {
        let sources = article
            .sources
            .iter()
            .map(|s| s.accredit.trim())
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        let mut metadata = format!(
            "v{} | {} | {}",
            article.version,
            article.status.as_str(),
            article.created_at.format("%B %-d, %Y")
        );
        if !sources.is_empty() {
            metadata = format!("{} | {}", sources, metadata);
        }
        Self {
            headline: article.headline.clone(),
            metadata,
            blobs: article.blobs.clone(),
            content: article.content.clone(),
            rich_content: article.rich_content.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Docx,
    Pdf,
    Html,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Html => "text/html; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Docx => "docx",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Html => "html",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "docx" => Ok(ExportFormat::Docx),
            "pdf" => Ok(ExportFormat::Pdf),
            "html" => Ok(ExportFormat::Html),
            other => Err(Error::Validation(format!("unsupported export format: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nd_core::{NewArticle, Source, Version};

    #[test]
    fn test_body_falls_back_to_plain_text() {
        let doc = ExportDocument {
            content: "Para one.\n\nPara two.".to_string(),
            rich_content: "{broken".to_string(),
            ..Default::default()
        };
        let body = doc.body();
        assert_eq!(body.len(), 2);
        assert_eq!(body[0].text(), "Para one.");
    }

    #[test]
    fn test_from_article() {
        let article = NewArticle {
            headline: "Bridge Reopens".to_string(),
            sources: vec![Source::new(1, "AP", "x"), Source::new(2, "", "y")],
            ..Default::default()
        }
        .into_article(Version { major: 2, minor: 1 });
        let doc = ExportDocument::from(&article);
        assert!(doc.metadata.starts_with("AP | v2.1 | draft | "));
        assert_eq!(doc.file_stem(), "bridge-reopens");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("DOCX".parse::<ExportFormat>().unwrap(), ExportFormat::Docx);
        assert_eq!(ExportFormat::Pdf.content_type(), "application/pdf");
        assert!("rtf".parse::<ExportFormat>().is_err());
    }
}
