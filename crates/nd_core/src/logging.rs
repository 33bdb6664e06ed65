use std::collections::VecDeque;
use std::sync::Once;

use tracing_subscriber::EnvFilter;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Logger scoped to one pipeline run or request. Every event carries the run
/// id, and messages are prefixed with the stage names pushed so far.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: Uuid,
    prefixes: VecDeque<String>,
}

impl Default for RunLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLogger {
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4())
    }

    pub fn with_run_id(run_id: Uuid) -> Self {
        Self {
            run_id,
            prefixes: VecDeque::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        let mut logger = self.clone();
        logger.prefixes.push_back(prefix.into());
        logger
    }

    pub fn with_new_prefixes(&self, prefix: impl Into<String>) -> Self {
        let mut logger = self.clone();
        logger.prefixes.clear();
        logger.prefixes.push_back(prefix.into());
        logger
    }

    fn prefix(&self) -> String {
        self.prefixes.iter().map(|p| format!("{} ", p)).collect()
    }

    pub fn info(&self, message: &str) {
        tracing::info!(run = %self.run_id, "{}{}", self.prefix(), message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(run = %self.run_id, "{}{}", self.prefix(), message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!(run = %self.run_id, "{}{}", self.prefix(), message);
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(run = %self.run_id, "{}{}", self.prefix(), message);
    }

    /// Records a rendered prompt or a raw model response.
    pub fn payload(&self, kind: &str, body: &str) {
        tracing::debug!(run = %self.run_id, kind, chars = body.len(), "{}{}", self.prefix(), body);
    }
}

/// Installs the global fmt subscriber once. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init_logging() {
    INIT.call_once(|| {
        if tracing::dispatcher::has_been_set() {
            return;
        }
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}
