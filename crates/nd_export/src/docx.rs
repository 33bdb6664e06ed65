use std::io::Cursor;

use docx_rs::{BreakType, Docx, PageMargin, Paragraph, Run, RunFonts};
use nd_core::{Error, Result};

use crate::document::ExportDocument;
use crate::paragraphs::{DocParagraph, DocRun, ParagraphStyle};

// US Letter, in twips.
const PAGE_WIDTH: u32 = 12240;
const PAGE_HEIGHT: u32 = 15840;
const MARGIN: i32 = 1440;

const BODY_FONT: &str = "Times New Roman";
const META_FONT: &str = "Arial";

// Run sizes are in half-points.
const BODY_SIZE: usize = 24;
const HEADLINE_SIZE: usize = 40;
const META_SIZE: usize = 18;

fn fonts(name: &str) -> RunFonts {
    RunFonts::new().ascii(name).hi_ansi(name).cs(name).east_asia(name)
}

fn body_run(run: &DocRun, size: usize, force_bold: bool, force_italic: bool) -> Run {
    if run.line_break {
        return Run::new().add_break(BreakType::TextWrapping);
    }
    let mut out = Run::new()
        .add_text(run.text.as_str())
        .fonts(fonts(BODY_FONT))
        .size(size)
        .color(run.color.as_str());
    if run.bold || force_bold {
        out = out.bold();
    }
    if run.italic || force_italic {
        out = out.italic();
    }
    if run.underline {
        out = out.underline("single");
    }
    if run.strike {
        out = out.strike();
    }
    out
}

fn heading_size(level: u8) -> usize {
    match level {
        1 => 36,
        2 => 32,
        3 => 28,
        _ => 26,
    }
}

fn body_paragraph(paragraph: &DocParagraph) -> Paragraph {
    let (size, bold, italic, prefix) = match paragraph.style {
        ParagraphStyle::Body => (BODY_SIZE, false, false, None),
        ParagraphStyle::Heading(level) => (heading_size(level), true, false, None),
        ParagraphStyle::Quote => (BODY_SIZE, false, true, None),
        ParagraphStyle::Bullet => (BODY_SIZE, false, false, Some("• ".to_string())),
        ParagraphStyle::Numbered(n) => (BODY_SIZE, false, false, Some(format!("{}. ", n))),
    };

    let mut out = Paragraph::new();
    if let Some(prefix) = prefix {
        out = out.add_run(body_run(&DocRun::plain(prefix), size, false, false));
    }
    for run in &paragraph.runs {
        out = out.add_run(body_run(run, size, bold, italic));
    }
    out
}

fn text_paragraph(text: &str, font: &str, size: usize, bold: bool, color: &str) -> Paragraph {
    let mut run = Run::new().add_text(text).fonts(fonts(font)).size(size).color(color);
    if bold {
        run = run.bold();
    }
    Paragraph::new().add_run(run)
}

/// Writes the document as a DOCX file: headline, metadata line, blobs as
/// bullets, then the body.
pub fn write_docx(doc: &ExportDocument) -> Result<Vec<u8>> {
    let mut docx = Docx::new().page_size(PAGE_WIDTH, PAGE_HEIGHT).page_margin(
        PageMargin::new()
            .top(MARGIN)
            .bottom(MARGIN)
            .left(MARGIN)
            .right(MARGIN),
    );

    docx = docx.add_paragraph(text_paragraph(&doc.headline, BODY_FONT, HEADLINE_SIZE, true, "000000"));
    if !doc.metadata.is_empty() {
        docx = docx.add_paragraph(text_paragraph(&doc.metadata, META_FONT, META_SIZE, false, "666666"));
    }
    for blob in &doc.blobs {
        docx = docx.add_paragraph(text_paragraph(&format!("• {}", blob), BODY_FONT, BODY_SIZE, false, "000000"));
    }
    if !doc.blobs.is_empty() {
        docx = docx.add_paragraph(Paragraph::new());
    }
    for paragraph in doc.body() {
        docx = docx.add_paragraph(body_paragraph(&paragraph));
    }

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| Error::Export(format!("failed to write DOCX: {}", e)))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docx_is_a_zip_archive() {
        let doc = ExportDocument {
            headline: "Storm Hits".to_string(),
            metadata: "AP | v1.0".to_string(),
            blobs: vec!["Power out".to_string()],
            rich_content: r#"{"root":{"type":"root","children":[{"type":"paragraph","children":[
                {"type":"text","text":"Body","format":9,"style":"color:green"}]}]}}"#
                .to_string(),
            ..Default::default()
        };
        let bytes = write_docx(&doc).unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_corrupt_rich_content_still_exports() {
        let doc = ExportDocument {
            headline: "Only Headline".to_string(),
            rich_content: "[[[".to_string(),
            ..Default::default()
        };
        assert!(write_docx(&doc).is_ok());
    }
}
