//! HTML to rich-content tree.
//!
//! The color-coding stage emits `<p><span style="color:X">…</span></p>`
//! sequences; editors may paste richer markup, so headings, quotes, lists
//! and the usual inline format tags are understood too. Inline markup is
//! flattened: every text run becomes one text node carrying the combined
//! format bits and the innermost color.

use nd_core::rich::style_color;
use nd_core::{ListType, RichContent, RichNode, TextFormat};
use scraper::{ElementRef, Html, Node};

#[derive(Debug, Clone, Default)]
struct Inline {
    format: TextFormat,
    color: Option<String>,
}

impl Inline {
    fn enter(&self, element: &ElementRef<'_>) -> Inline {
        let mut next = self.clone();
        let tag = match element.value().name() {
            "b" | "strong" => TextFormat::BOLD,
            "i" | "em" => TextFormat::ITALIC,
            "s" | "del" | "strike" => TextFormat::STRIKETHROUGH,
            "u" | "ins" => TextFormat::UNDERLINE,
            _ => TextFormat::PLAIN,
        };
        next.format = next.format.with(tag);

        if let Some(color) = element.value().attr("color") {
            next.color = Some(color.trim().to_string());
        }
        if let Some(style) = element.value().attr("style") {
            if let Some(color) = style_color(style) {
                next.color = Some(color.to_string());
            }
            let compact: String = style.to_ascii_lowercase().chars().filter(|c| !c.is_whitespace()).collect();
            if compact.contains("font-weight:bold") || compact.contains("font-weight:700") {
                next.format = next.format.with(TextFormat::BOLD);
            }
            if compact.contains("font-style:italic") {
                next.format = next.format.with(TextFormat::ITALIC);
            }
            if compact.contains("line-through") {
                next.format = next.format.with(TextFormat::STRIKETHROUGH);
            }
            if compact.contains("underline") {
                next.format = next.format.with(TextFormat::UNDERLINE);
            }
        }
        next
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn push_text(text: &str, state: &Inline, out: &mut Vec<RichNode>) {
    let text = collapse_whitespace(text);
    if !text.is_empty() {
        out.push(RichNode::text(text, state.format, state.color.as_deref()));
    }
}

fn collect_inline(element: ElementRef<'_>, state: &Inline, out: &mut Vec<RichNode>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_text(text, state, out),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else { continue };
                if child.value().name() == "br" {
                    out.push(RichNode::linebreak());
                } else {
                    collect_inline(child, &state.enter(&child), out);
                }
            }
            _ => {}
        }
    }
}

fn is_break(node: Option<&RichNode>) -> bool {
    node.map_or(true, |n| n.kind == nd_core::NodeKind::Linebreak)
}

/// Trims whitespace at block edges and around line breaks, then drops
/// empty runs and edge breaks.
fn tidy(nodes: Vec<RichNode>) -> Vec<RichNode> {
    let len = nodes.len();
    let trimmed: Vec<RichNode> = (0..len)
        .map(|i| {
            let mut node = nodes[i].clone();
            if let Some(text) = node.text.as_mut() {
                if is_break(i.checked_sub(1).and_then(|p| nodes.get(p))) {
                    *text = text.trim_start().to_string();
                }
                if is_break(nodes.get(i + 1)) {
                    *text = text.trim_end().to_string();
                }
            }
            node
        })
        .filter(|n| n.text.as_deref().map_or(true, |t| !t.is_empty()))
        .collect();

    let start = trimmed.iter().position(|n| n.kind != nd_core::NodeKind::Linebreak);
    let end = trimmed.iter().rposition(|n| n.kind != nd_core::NodeKind::Linebreak);
    match (start, end) {
        (Some(start), Some(end)) => trimmed[start..=end].to_vec(),
        _ => Vec::new(),
    }
}

fn inlines(element: ElementRef<'_>) -> Vec<RichNode> {
    let mut out = Vec::new();
    collect_inline(element, &Inline::default().enter(&element), &mut out);
    tidy(out)
}

fn push_block(blocks: &mut Vec<RichNode>, block: RichNode) {
    if !block.children.is_empty() {
        blocks.push(block);
    }
}

fn flush(stray: &mut Vec<RichNode>, blocks: &mut Vec<RichNode>) {
    let nodes = tidy(std::mem::take(stray));
    push_block(blocks, RichNode::paragraph(nodes));
}

fn walk_blocks(element: ElementRef<'_>, blocks: &mut Vec<RichNode>, stray: &mut Vec<RichNode>) {
    for child in element.children() {
        let child = match child.value() {
            Node::Text(text) => {
                push_text(text, &Inline::default(), stray);
                continue;
            }
            Node::Element(_) => match ElementRef::wrap(child) {
                Some(child) => child,
                None => continue,
            },
            _ => continue,
        };

        let name = child.value().name();
        match name {
            "p" => {
                flush(stray, blocks);
                push_block(blocks, RichNode::paragraph(inlines(child)));
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                flush(stray, blocks);
                push_block(blocks, RichNode::heading(name, inlines(child)));
            }
            "blockquote" => {
                flush(stray, blocks);
                push_block(blocks, RichNode::quote(inlines(child)));
            }
            "ul" | "ol" => {
                flush(stray, blocks);
                let list_type = if name == "ol" { ListType::Number } else { ListType::Bullet };
                let items = child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|item| item.value().name() == "li")
                    .map(|item| RichNode::listitem(inlines(item)))
                    .filter(|item| !item.children.is_empty())
                    .collect();
                push_block(blocks, RichNode::list(list_type, items));
            }
            "html" | "body" | "div" | "section" | "article" | "main" | "header" | "footer" => {
                flush(stray, blocks);
                walk_blocks(child, blocks, stray);
                flush(stray, blocks);
            }
            "head" | "script" | "style" | "title" | "meta" => {}
            "br" => stray.push(RichNode::linebreak()),
            _ => collect_inline(child, &Inline::default().enter(&child), stray),
        }
    }
}

/// Converts HTML into the rich-content tree. Never fails: unknown markup
/// is flattened into paragraphs.
pub fn html_to_rich(html: &str) -> RichContent {
    let fragment = Html::parse_fragment(html);
    let mut blocks = Vec::new();
    let mut stray = Vec::new();
    walk_blocks(fragment.root_element(), &mut blocks, &mut stray);
    flush(&mut stray, &mut blocks);
    RichContent::new(blocks)
}
