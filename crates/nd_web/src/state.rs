use std::sync::Arc;

use nd_core::{ArticleStorage, CompletionModel, RunLogger};
use nd_export::PdfRenderer;
use nd_inference::steps::StepContext;
use nd_inference::{Pipeline, PromptSet};

pub struct AppState {
    pub model: Arc<dyn CompletionModel>,
    pub prompts: Arc<PromptSet>,
    pub storage: Arc<dyn ArticleStorage>,
    pub pdf: PdfRenderer,
}

impl AppState {
    pub fn new(model: Arc<dyn CompletionModel>, prompts: PromptSet, storage: Arc<dyn ArticleStorage>) -> Self {
        Self {
            model,
            prompts: Arc::new(prompts),
            storage,
            pdf: PdfRenderer::default(),
        }
    }

    pub fn with_pdf(mut self, pdf: PdfRenderer) -> Self {
        self.pdf = pdf;
        self
    }

    /// Fresh context, with its own run id, for one request.
    pub fn step_context(&self) -> StepContext {
        StepContext::new(self.model.clone(), self.prompts.clone(), RunLogger::new())
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.model.clone(), self.prompts.clone())
    }
}
