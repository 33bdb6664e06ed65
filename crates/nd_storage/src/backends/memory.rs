use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use nd_core::{Article, ArticleStorage, NewArticle, NewPreset, Preset, Result, Version};
use tokio::sync::RwLock;

use crate::{check_article, check_preset, next_version};

#[derive(Debug, Default)]
struct MemoryStore {
    /// Versions per slug, oldest first.
    articles: HashMap<String, Vec<Article>>,
    presets: HashMap<String, Vec<Preset>>,
}

impl MemoryStore {
    fn save_article(&mut self, article: NewArticle) -> Result<Article> {
        let slug = article.resolved_slug();
        let versions = self.articles.entry(slug).or_default();
        let version = next_version(versions.last().map(|a| a.version), article.bump)?;
        let article = article.into_article(version);
        versions.push(article.clone());
        Ok(article)
    }
}

/// Process-local store. Every save appends a version; nothing is replaced.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStorage for MemoryStorage {
    async fn save_article(&self, article: NewArticle) -> Result<Article> {
        check_article(&article)?;
        let mut store = self.store.write().await;
        let saved = store.save_article(article)?;
        tracing::info!("💾 Saved {} v{}", saved.slug, saved.version);
        Ok(saved)
    }

    async fn latest(&self, slug: &str) -> Result<Option<Article>> {
        let store = self.store.read().await;
        Ok(store.articles.get(slug).and_then(|v| v.last()).cloned())
    }

    async fn get_version(&self, slug: &str, version: Version) -> Result<Option<Article>> {
        let store = self.store.read().await;
        Ok(store
            .articles
            .get(slug)
            .and_then(|versions| versions.iter().find(|a| a.version == version))
            .cloned())
    }

    async fn list_versions(&self, slug: &str) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        Ok(store.articles.get(slug).cloned().unwrap_or_default())
    }

    async fn save_preset(&self, org_id: &str, preset: NewPreset) -> Result<Preset> {
        check_preset(&preset)?;
        let preset = preset.into_preset(org_id);
        let mut store = self.store.write().await;
        store.presets.entry(org_id.to_string()).or_default().push(preset.clone());
        Ok(preset)
    }

    async fn list_presets(&self, org_id: &str) -> Result<Vec<Preset>> {
        let store = self.store.read().await;
        Ok(store.presets.get(org_id).cloned().unwrap_or_default())
    }
}
