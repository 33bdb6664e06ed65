use async_trait::async_trait;

use crate::types::{Article, NewArticle, NewPreset, Preset, Version};
use crate::Result;

#[async_trait]
pub trait ArticleStorage: Send + Sync {
    /// Save an article as a new version of its slug
    async fn save_article(&self, article: NewArticle) -> Result<Article>;

    /// Get the highest version of a slug
    async fn latest(&self, slug: &str) -> Result<Option<Article>>;

    /// Get one specific version
    async fn get_version(&self, slug: &str, version: Version) -> Result<Option<Article>>;

    /// All versions of a slug, oldest first
    async fn list_versions(&self, slug: &str) -> Result<Vec<Article>>;

    async fn save_preset(&self, org_id: &str, preset: NewPreset) -> Result<Preset>;

    async fn list_presets(&self, org_id: &str) -> Result<Vec<Preset>>;
}
