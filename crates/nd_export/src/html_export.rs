use crate::document::ExportDocument;
use crate::paragraphs::{DocParagraph, DocRun, ParagraphStyle};

const PRINT_CSS: &str = "@page { size: letter; margin: 1in; }
body { font-family: 'Times New Roman', serif; font-size: 12pt; line-height: 1.4; margin: 0; }
h1.headline { font-size: 20pt; margin: 0 0 4pt 0; }
p.meta { font-family: Arial, sans-serif; font-size: 9pt; color: #666666; margin: 0 0 12pt 0; }
ul.blobs { margin: 0 0 16pt 0; }
blockquote { font-style: italic; margin: 0 0 8pt 24pt; }
p { margin: 0 0 8pt 0; }";

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_run(run: &DocRun) -> String {
    if run.line_break {
        return "<br>".to_string();
    }
    let mut style = format!("color:#{}", run.color);
    if run.bold {
        style.push_str(";font-weight:bold");
    }
    if run.italic {
        style.push_str(";font-style:italic");
    }
    let decorations: Vec<&str> = [(run.underline, "underline"), (run.strike, "line-through")]
        .into_iter()
        .filter_map(|(on, value)| on.then_some(value))
        .collect();
    if !decorations.is_empty() {
        style.push_str(&format!(";text-decoration:{}", decorations.join(" ")));
    }
    format!("<span style=\"{}\">{}</span>", style, escape(&run.text))
}

fn render_runs(paragraph: &DocParagraph) -> String {
    paragraph.runs.iter().map(render_run).collect()
}

fn render_body(paragraphs: &[DocParagraph]) -> String {
    let mut out = String::new();
    let mut open_list: Option<&str> = None;
    for paragraph in paragraphs {
        let list = match paragraph.style {
            ParagraphStyle::Bullet => Some("ul"),
            ParagraphStyle::Numbered(_) => Some("ol"),
            _ => None,
        };
        if open_list != list {
            if let Some(tag) = open_list {
                out.push_str(&format!("</{}>\n", tag));
            }
            if let Some(tag) = list {
                out.push_str(&format!("<{}>\n", tag));
            }
            open_list = list;
        }
        let runs = render_runs(paragraph);
        let line = match paragraph.style {
            ParagraphStyle::Body => format!("<p>{}</p>", runs),
            ParagraphStyle::Heading(level) => format!("<h{0}>{1}</h{0}>", level.clamp(2, 6), runs),
            ParagraphStyle::Quote => format!("<blockquote>{}</blockquote>", runs),
            ParagraphStyle::Bullet | ParagraphStyle::Numbered(_) => format!("<li>{}</li>", runs),
        };
        out.push_str(&line);
        out.push('\n');
    }
    if let Some(tag) = open_list {
        out.push_str(&format!("</{}>\n", tag));
    }
    out
}

/// Standalone, print-ready HTML page for the document.
pub fn render_html(doc: &ExportDocument) -> String {
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>\n{}\n</style>\n</head>\n<body>\n",
        escape(&doc.headline),
        PRINT_CSS
    );
    html.push_str(&format!("<h1 class=\"headline\">{}</h1>\n", escape(&doc.headline)));
    if !doc.metadata.is_empty() {
        html.push_str(&format!("<p class=\"meta\">{}</p>\n", escape(&doc.metadata)));
    }
    if !doc.blobs.is_empty() {
        html.push_str("<ul class=\"blobs\">\n");
        for blob in &doc.blobs {
            html.push_str(&format!("<li>{}</li>\n", escape(blob)));
        }
        html.push_str("</ul>\n");
    }
    html.push_str(&render_body(&doc.body()));
    html.push_str("</body>\n</html>\n");
    html
}
