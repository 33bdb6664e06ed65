use std::sync::Arc;

use nd_core::{ArticleStorage, Error, NewArticle, NewPreset, Result, Version, VersionBump};

pub mod backends;

pub use backends::*;

/// Where articles live, parsed from `memory` or `sqlite:<path>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Memory,
    Sqlite(std::path::PathBuf),
}

impl std::str::FromStr for StorageConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "memory" {
            return Ok(StorageConfig::Memory);
        }
        match s.strip_prefix("sqlite:") {
            Some(path) if !path.is_empty() => Ok(StorageConfig::Sqlite(path.into())),
            _ => Err(Error::Storage(format!(
                "Unknown storage backend: {}. Use 'memory' or 'sqlite:<path>'",
                s
            ))),
        }
    }
}

pub async fn create_storage(config: &StorageConfig) -> Result<Arc<dyn ArticleStorage>> {
    match config {
        StorageConfig::Memory => Ok(Arc::new(MemoryStorage::new())),
        #[cfg(feature = "sqlite")]
        StorageConfig::Sqlite(path) => Ok(Arc::new(SqliteStorage::new_with_path(path).await?)),
        #[cfg(not(feature = "sqlite"))]
        StorageConfig::Sqlite(_) => Err(Error::Storage(
            "SQLite storage is not enabled. Rebuild with --features sqlite".to_string(),
        )),
    }
}

/// Version the next save of a slug gets. The first save is always 1.0.
pub fn next_version(latest: Option<Version>, bump: VersionBump) -> Result<Version> {
    match latest {
        Some(latest) => latest.bump(bump),
        None => Ok(Version::FIRST),
    }
}

pub(crate) fn check_article(article: &NewArticle) -> Result<()> {
    if article.headline.trim().is_empty() && article.slug.trim().is_empty() {
        return Err(Error::Validation("article needs a headline or a slug".to_string()));
    }
    Ok(())
}

pub(crate) fn check_preset(preset: &NewPreset) -> Result<()> {
    if preset.name.trim().is_empty() {
        return Err(Error::Validation("preset name is required".to_string()));
    }
    if preset.length.min > preset.length.max {
        return Err(Error::Validation(format!(
            "preset length range is inverted: {}..{}",
            preset.length.min, preset.length.max
        )));
    }
    Ok(())
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, StorageConfig};
}
