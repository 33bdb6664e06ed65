use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use nd_core::{Article, Error, NewArticle, NewPreset, Preset, RichContent, RunLogger, Version};
use nd_export::{export, html_to_rich, ExportDocument, ExportFormat};
use nd_inference::{PipelineRequest, PipelineRun};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RichContentRequest {
    pub html: String,
}

pub async fn run_pipeline(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PipelineRequest>,
) -> ApiResult<Json<PipelineRun>> {
    let logger = RunLogger::new();
    logger.info(&format!("Pipeline requested: {} source(s)", request.sources.len()));
    let run = state.pipeline().run_with_logger(request, logger).await?;
    Ok(Json(run))
}

pub async fn rich_content(Json(request): Json<RichContentRequest>) -> ApiResult<Json<RichContent>> {
    if request.html.trim().is_empty() {
        return Err(Error::Validation("html is required".to_string()).into());
    }
    Ok(Json(html_to_rich(&request.html)))
}

async fn file_response(state: &AppState, doc: &ExportDocument, format: ExportFormat) -> ApiResult<Response> {
    let bytes = export(doc, format, &state.pdf).await?;
    let stem = match doc.file_stem() {
        stem if stem.is_empty() => "article".to_string(),
        stem => stem,
    };
    let disposition = format!("attachment; filename=\"{}.{}\"", stem, format.extension());
    tracing::info!("📄 Exported {} ({} bytes)", disposition, bytes.len());
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

pub async fn export_document(
    State(state): State<Arc<AppState>>,
    Path(format): Path<String>,
    Json(doc): Json<ExportDocument>,
) -> ApiResult<Response> {
    let format: ExportFormat = format.parse()?;
    file_response(&state, &doc, format).await
}

pub async fn create_article(
    State(state): State<Arc<AppState>>,
    Json(article): Json<NewArticle>,
) -> ApiResult<Json<Article>> {
    let saved = state.storage.save_article(article).await?;
    Ok(Json(saved))
}

async fn latest_or_404(state: &AppState, slug: &str) -> ApiResult<Article> {
    state
        .storage
        .latest(slug)
        .await?
        .ok_or_else(|| Error::NotFound(format!("article {}", slug)).into())
}

pub async fn get_article(State(state): State<Arc<AppState>>, Path(slug): Path<String>) -> ApiResult<Json<Article>> {
    Ok(Json(latest_or_404(&state, &slug).await?))
}

pub async fn list_versions(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Vec<Article>>> {
    let versions = state.storage.list_versions(&slug).await?;
    if versions.is_empty() {
        return Err(Error::NotFound(format!("article {}", slug)).into());
    }
    Ok(Json(versions))
}

pub async fn get_version(
    State(state): State<Arc<AppState>>,
    Path((slug, version)): Path<(String, String)>,
) -> ApiResult<Json<Article>> {
    let version: Version = version.parse()?;
    let article = state
        .storage
        .get_version(&slug, version)
        .await?
        .ok_or_else(|| Error::NotFound(format!("article {} v{}", slug, version)))?;
    Ok(Json(article))
}

pub async fn export_article(
    State(state): State<Arc<AppState>>,
    Path((slug, format)): Path<(String, String)>,
) -> ApiResult<Response> {
    let format: ExportFormat = format.parse()?;
    let article = latest_or_404(&state, &slug).await?;
    file_response(&state, &ExportDocument::from(&article), format).await
}

pub async fn list_presets(State(state): State<Arc<AppState>>, Path(org): Path<String>) -> ApiResult<Json<Vec<Preset>>> {
    Ok(Json(state.storage.list_presets(&org).await?))
}

pub async fn create_preset(
    State(state): State<Arc<AppState>>,
    Path(org): Path<String>,
    Json(preset): Json<NewPreset>,
) -> ApiResult<Json<Preset>> {
    Ok(Json(state.storage.save_preset(&org, preset).await?))
}
