//! Rich-content conversion and article export.

use nd_core::Result;

pub mod document;
pub mod docx;
pub mod html;
pub mod html_export;
pub mod palette;
pub mod paragraphs;
pub mod pdf;

pub use document::{ExportDocument, ExportFormat};
pub use docx::write_docx;
pub use html::html_to_rich;
pub use html_export::render_html;
pub use paragraphs::{paragraphs_from_json, paragraphs_from_rich, DocParagraph, DocRun, ParagraphStyle};
pub use pdf::PdfRenderer;

/// Renders `doc` in `format`. PDF goes through the configured browser.
pub async fn export(doc: &ExportDocument, format: ExportFormat, pdf: &PdfRenderer) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Docx => write_docx(doc),
        ExportFormat::Html => Ok(render_html(doc).into_bytes()),
        ExportFormat::Pdf => pdf.render(doc).await,
    }
}
