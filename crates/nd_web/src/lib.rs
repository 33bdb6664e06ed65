use axum::{
    routing::{get, post},
    Router,
};
use nd_inference::steps::{
    ColorCodeStep, HeadlineStep, OutlineStep, QuotesStep, RewriteStep, SourceBitsStep, SummarizeStep, WriteStep,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod handlers;
pub mod state;
pub mod steps;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use steps::run_step;

pub async fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/steps/source-bits", post(run_step::<SourceBitsStep>))
        .route("/api/steps/summarize", post(run_step::<SummarizeStep>))
        .route("/api/steps/quotes", post(run_step::<QuotesStep>))
        .route("/api/steps/headline", post(run_step::<HeadlineStep>))
        .route("/api/steps/outline", post(run_step::<OutlineStep>))
        .route("/api/steps/write", post(run_step::<WriteStep>))
        .route("/api/steps/rewrite", post(run_step::<RewriteStep>))
        .route("/api/steps/color-code", post(run_step::<ColorCodeStep>))
        .route("/api/pipeline", post(handlers::run_pipeline))
        .route("/api/rich-content", post(handlers::rich_content))
        .route("/api/export/:format", post(handlers::export_document))
        .route("/api/articles", post(handlers::create_article))
        .route("/api/articles/:slug", get(handlers::get_article))
        .route("/api/articles/:slug/versions", get(handlers::list_versions))
        .route("/api/articles/:slug/versions/:version", get(handlers::get_version))
        .route("/api/articles/:slug/export/:format", get(handlers::export_article))
        .route(
            "/api/orgs/:org/presets",
            get(handlers::list_presets).post(handlers::create_preset),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

pub mod prelude {
    pub use crate::{create_app, ApiError, AppState};
    pub use nd_core::{Error, Result};
}
