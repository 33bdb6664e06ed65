use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Step {step} failed")]
    StepFailed {
        step: u8,
        name: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    pub fn is_validation(&self) -> bool {
        match self {
            Error::Validation(_) => true,
            Error::StepFailed { source, .. } => source.is_validation(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
