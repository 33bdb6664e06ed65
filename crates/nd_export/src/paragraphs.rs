//! Rich-content tree flattened into styled paragraphs, the shape every
//! document writer consumes.

use nd_core::{ListType, NodeKind, RichContent, RichNode};

use crate::palette::color_hex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    /// Uppercase hex, no `#`.
    pub color: String,
    /// A line break rather than text.
    pub line_break: bool,
}

impl DocRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
            underline: false,
            strike: false,
            color: "000000".to_string(),
            line_break: false,
        }
    }

    pub fn line_break() -> Self {
        Self {
            line_break: true,
            ..Self::plain("")
        }
    }

    fn from_text(node: &RichNode) -> Self {
        let format = node.format;
        Self {
            text: node.text.clone().unwrap_or_default(),
            bold: format.is_bold(),
            italic: format.is_italic(),
            underline: format.is_underline(),
            strike: format.is_strikethrough(),
            color: node.color().map(color_hex).unwrap_or_else(|| "000000".to_string()),
            line_break: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphStyle {
    Body,
    /// Heading level, 1 to 6.
    Heading(u8),
    Quote,
    Bullet,
    /// Position within its list, from 1.
    Numbered(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocParagraph {
    pub style: ParagraphStyle,
    pub runs: Vec<DocRun>,
}

impl DocParagraph {
    pub fn new(style: ParagraphStyle, runs: Vec<DocRun>) -> Self {
        Self { style, runs }
    }

    pub fn text(&self) -> String {
        self.runs
            .iter()
            .map(|run| if run.line_break { "\n" } else { run.text.as_str() })
            .collect()
    }
}

fn runs(node: &RichNode) -> Vec<DocRun> {
    let mut out = Vec::new();
    collect_runs(node, &mut out);
    out
}

fn collect_runs(node: &RichNode, out: &mut Vec<DocRun>) {
    for child in &node.children {
        match child.kind {
            NodeKind::Text => out.push(DocRun::from_text(child)),
            NodeKind::Linebreak => out.push(DocRun::line_break()),
            // nested lists become their own paragraphs
            NodeKind::List => {}
            _ => collect_runs(child, out),
        }
    }
}

fn heading_level(node: &RichNode) -> u8 {
    node.tag
        .as_deref()
        .and_then(|tag| tag.strip_prefix('h'))
        .and_then(|level| level.parse::<u8>().ok())
        .filter(|level| (1..=6).contains(level))
        .unwrap_or(1)
}

fn push_list(node: &RichNode, out: &mut Vec<DocParagraph>) {
    let numbered = node.list_type == Some(ListType::Number);
    let items = node.children.iter().filter(|c| c.kind == NodeKind::Listitem);
    for (i, item) in items.enumerate() {
        let style = if numbered {
            ParagraphStyle::Numbered(i + 1)
        } else {
            ParagraphStyle::Bullet
        };
        out.push(DocParagraph::new(style, runs(item)));
        for nested in item.children.iter().filter(|c| c.kind == NodeKind::List) {
            push_list(nested, out);
        }
    }
}

/// Walks the top-level blocks of the tree. Unknown blocks are skipped.
pub fn paragraphs_from_rich(content: &RichContent) -> Vec<DocParagraph> {
    let mut out = Vec::new();
    for block in content.blocks() {
        match block.kind {
            NodeKind::Paragraph => out.push(DocParagraph::new(ParagraphStyle::Body, runs(block))),
            NodeKind::Heading => out.push(DocParagraph::new(ParagraphStyle::Heading(heading_level(block)), runs(block))),
            NodeKind::Quote => out.push(DocParagraph::new(ParagraphStyle::Quote, runs(block))),
            NodeKind::List => push_list(block, &mut out),
            other => tracing::debug!("Skipping {:?} block", other),
        }
    }
    out
}

/// Parses a stored rich-content string. A corrupt document yields no
/// paragraphs rather than an error.
pub fn paragraphs_from_json(json: &str) -> Vec<DocParagraph> {
    match serde_json::from_str::<RichContent>(json) {
        Ok(content) => paragraphs_from_rich(&content),
        Err(e) => {
            tracing::warn!("Ignoring malformed rich content: {}", e);
            Vec::new()
        }
    }
}

/// Plain text split on blank lines, one body paragraph per chunk.
pub fn paragraphs_from_text(text: &str) -> Vec<DocParagraph> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| DocParagraph::new(ParagraphStyle::Body, vec![DocRun::plain(chunk)]))
        .collect()
}
