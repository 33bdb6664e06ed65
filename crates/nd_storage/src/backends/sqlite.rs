use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nd_core::{
    Article, ArticleStatus, ArticleStorage, Error, LengthRange, NewArticle, NewPreset, Preset, Result, Version,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::{check_article, check_preset, next_version};

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        slug TEXT NOT NULL,
        major INTEGER NOT NULL,
        minor INTEGER NOT NULL,
        headline TEXT NOT NULL,
        blobs TEXT NOT NULL,
        content TEXT NOT NULL,
        rich_content TEXT NOT NULL,
        status TEXT NOT NULL,
        org_id TEXT NOT NULL,
        creator_id TEXT NOT NULL,
        sources TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (slug, major, minor)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS presets (
        id TEXT PRIMARY KEY,
        org_id TEXT NOT NULL,
        name TEXT NOT NULL,
        instructions TEXT NOT NULL,
        blobs INTEGER NOT NULL,
        length_min INTEGER NOT NULL,
        length_max INTEGER NOT NULL
    )
    "#,
];

fn db_err(e: sqlx::Error) -> Error {
    Error::Storage(e.to_string())
}

/// Reads an INTEGER column that must fit `T`; rows written elsewhere may not.
fn int_column<T: TryFrom<i64>>(row: &SqliteRow, column: &str) -> Result<T> {
    let value: i64 = row.try_get(column).map_err(db_err)?;
    T::try_from(value).map_err(|_| Error::Storage(format!("{} out of range: {}", column, value)))
}

fn version_from_row(row: &SqliteRow) -> Result<Version> {
    Ok(Version {
        major: int_column(row, "major")?,
        minor: int_column(row, "minor")?,
    })
}

pub struct SqliteStorage {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new().filename(db_path).create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await.map_err(db_err)?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Storage(format!("Failed to run migration {}: {}", i, e)))?;
        }
        tracing::info!("📦 SQLite storage ready at {}", db_path.display());

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn insert_next_version(conn: &mut SqliteConnection, article: NewArticle) -> Result<Article> {
        let slug = article.resolved_slug();
        let latest = sqlx::query("SELECT major, minor FROM articles WHERE slug = ? ORDER BY major DESC, minor DESC LIMIT 1")
            .bind(&slug)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(version_from_row)
            .transpose()?;

        let version = next_version(latest, article.bump)?;
        let article = article.into_article(version);

        sqlx::query(
            r#"
            INSERT INTO articles
                (id, slug, major, minor, headline, blobs, content, rich_content, status, org_id, creator_id, sources, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(article.id.to_string())
        .bind(&article.slug)
        .bind(i64::from(article.version.major))
        .bind(i64::from(article.version.minor))
        .bind(&article.headline)
        .bind(serde_json::to_string(&article.blobs)?)
        .bind(&article.content)
        .bind(&article.rich_content)
        .bind(article.status.as_str())
        .bind(&article.org_id)
        .bind(&article.creator_id)
        .bind(serde_json::to_string(&article.sources)?)
        .bind(article.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
        Ok(article)
    }

    fn article_from_row(row: &SqliteRow) -> Result<Article> {
        let id: String = row.try_get("id").map_err(db_err)?;
        let blobs: String = row.try_get("blobs").map_err(db_err)?;
        let sources: String = row.try_get("sources").map_err(db_err)?;
        let status: String = row.try_get("status").map_err(db_err)?;
        let created_at: String = row.try_get("created_at").map_err(db_err)?;

        Ok(Article {
            id: Uuid::parse_str(&id).map_err(|e| Error::Storage(format!("bad article id {}: {}", id, e)))?,
            slug: row.try_get("slug").map_err(db_err)?,
            version: version_from_row(row)?,
            headline: row.try_get("headline").map_err(db_err)?,
            blobs: serde_json::from_str(&blobs)?,
            content: row.try_get("content").map_err(db_err)?,
            rich_content: row.try_get("rich_content").map_err(db_err)?,
            status: ArticleStatus::from_str(&status)?,
            org_id: row.try_get("org_id").map_err(db_err)?,
            creator_id: row.try_get("creator_id").map_err(db_err)?,
            sources: serde_json::from_str(&sources)?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| Error::Storage(format!("bad timestamp {}: {}", created_at, e)))?
                .with_timezone(&Utc),
        })
    }

    fn preset_from_row(row: &SqliteRow) -> Result<Preset> {
        let id: String = row.try_get("id").map_err(db_err)?;
        Ok(Preset {
            id: Uuid::parse_str(&id).map_err(|e| Error::Storage(format!("bad preset id {}: {}", id, e)))?,
            org_id: row.try_get("org_id").map_err(db_err)?,
            name: row.try_get("name").map_err(db_err)?,
            instructions: row.try_get("instructions").map_err(db_err)?,
            blobs: int_column(row, "blobs")?,
            length: LengthRange {
                min: int_column(row, "length_min")?,
                max: int_column(row, "length_max")?,
            },
        })
    }
}

#[async_trait]
impl ArticleStorage for SqliteStorage {
    async fn save_article(&self, article: NewArticle) -> Result<Article> {
        check_article(&article)?;
        let mut conn = self.pool.acquire().await.map_err(db_err)?;

        // Take the write lock before reading the latest version so concurrent
        // saves of one slug queue up instead of picking the same number.
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await.map_err(db_err)?;
        match Self::insert_next_version(&mut conn, article).await {
            Ok(article) => {
                sqlx::query("COMMIT").execute(&mut *conn).await.map_err(db_err)?;
                tracing::info!("💾 Saved {} v{}", article.slug, article.version);
                Ok(article)
            }
            Err(e) => {
                if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    tracing::warn!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    async fn latest(&self, slug: &str) -> Result<Option<Article>> {
        sqlx::query("SELECT * FROM articles WHERE slug = ? ORDER BY major DESC, minor DESC LIMIT 1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(Self::article_from_row)
            .transpose()
    }

    async fn get_version(&self, slug: &str, version: Version) -> Result<Option<Article>> {
        sqlx::query("SELECT * FROM articles WHERE slug = ? AND major = ? AND minor = ?")
            .bind(slug)
            .bind(i64::from(version.major))
            .bind(i64::from(version.minor))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(Self::article_from_row)
            .transpose()
    }

    async fn list_versions(&self, slug: &str) -> Result<Vec<Article>> {
        let rows = sqlx::query("SELECT * FROM articles WHERE slug = ? ORDER BY major, minor")
            .bind(slug)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(Self::article_from_row).collect()
    }

    async fn save_preset(&self, org_id: &str, preset: NewPreset) -> Result<Preset> {
        check_preset(&preset)?;
        let preset = preset.into_preset(org_id);
        sqlx::query(
            "INSERT INTO presets (id, org_id, name, instructions, blobs, length_min, length_max) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(preset.id.to_string())
        .bind(&preset.org_id)
        .bind(&preset.name)
        .bind(&preset.instructions)
        .bind(i64::try_from(preset.blobs).map_err(|_| Error::Validation("blobs out of range".to_string()))?)
        .bind(i64::from(preset.length.min))
        .bind(i64::from(preset.length.max))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(preset)
    }

    async fn list_presets(&self, org_id: &str) -> Result<Vec<Preset>> {
        let rows = sqlx::query("SELECT * FROM presets WHERE org_id = ? ORDER BY rowid")
            .bind(org_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(Self::preset_from_row).collect()
    }
}
