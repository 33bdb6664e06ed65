use std::fmt;
use std::sync::Mutex;

use nd_core::{Completion, CompletionRequest, Result, TokenUsage};

use super::CompletionModel;

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;

/// Model whose answers come from a closure. Records every request it sees.
pub struct ScriptedModel {
    responder: Responder,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl fmt::Debug for ScriptedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedModel")
            .field("calls", &self.call_count())
            .finish()
    }
}

impl ScriptedModel {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request with the same text.
    pub fn fixed(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl CompletionModel for ScriptedModel {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        let text = (self.responder)(request)?;
        Ok(Completion {
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
            },
            text,
        })
    }
}
