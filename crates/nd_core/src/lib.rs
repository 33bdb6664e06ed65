pub mod error;
pub mod logging;
pub mod models;
pub mod rich;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use logging::{init_logging, RunLogger};
pub use models::{Completion, CompletionModel, CompletionRequest, ResponseFormat};
pub use rich::{ListType, NodeKind, RichContent, RichNode, TextFormat};
pub use storage::ArticleStorage;
pub use types::*;
