use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use nd_inference::steps::{execute, Step, StepStatus};

use crate::AppState;

fn status_code(status: StepStatus) -> StatusCode {
    StatusCode::from_u16(status.http_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// One route per stage: 200 with the stage's response, or 400/500 with its
/// empty response. Bodies that do not deserialize count as a bad request.
pub async fn run_step<S>(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<S::Request>, JsonRejection>,
) -> (StatusCode, Json<S::Response>)
where
    S: Step + Default + 'static,
{
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!("[{}] Rejected request body: {}", S::NAME, rejection.body_text());
            return (StatusCode::BAD_REQUEST, Json(S::Response::default()));
        }
    };
    let ctx = state.step_context();
    let reply = execute(&S::default(), &ctx, request).await;
    (status_code(reply.status), Json(reply.body))
}
