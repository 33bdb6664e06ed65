use std::path::PathBuf;
use std::time::Duration;

use nd_core::{Error, Result};
use tokio::process::Command;
use tokio::time::timeout;

use crate::document::ExportDocument;
use crate::html_export::render_html;

/// Prints documents to PDF with a headless Chromium.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    pub browser: PathBuf,
    pub timeout: Duration,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self {
            browser: PathBuf::from("chromium"),
            timeout: Duration::from_secs(60),
        }
    }
}

impl PdfRenderer {
    pub fn new(browser: impl Into<PathBuf>) -> Self {
        Self {
            browser: browser.into(),
            ..Self::default()
        }
    }

    pub async fn render(&self, doc: &ExportDocument) -> Result<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("article.html");
        let output = dir.path().join("article.pdf");
        tokio::fs::write(&input, render_html(doc)).await?;

        let mut command = Command::new(&self.browser);
        command
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", output.display()))
            .arg(format!("file://{}", input.display()))
            .kill_on_drop(true);

        tracing::debug!("Printing PDF with {}", self.browser.display());
        let result = timeout(self.timeout, command.output())
            .await
            .map_err(|_| Error::Export(format!("PDF rendering timed out after {:?}", self.timeout)))?
            .map_err(|e| Error::Export(format!("failed to launch {}: {}", self.browser.display(), e)))?;

        if !result.status.success() {
            return Err(Error::Export(format!(
                "{} exited with {}: {}",
                self.browser.display(),
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        let bytes = tokio::fs::read(&output)
            .await
            .map_err(|e| Error::Export(format!("browser produced no PDF: {}", e)))?;
        Ok(bytes)
    }
}
