use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::services::AppServices;

/// Run one procurement cycle synchronously and return its outcome.
///
/// Stage failures are part of the outcome body; the request itself only fails when the
/// server cannot answer at all.
pub async fn run_cycle(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let outcome = services.run_cycle().await;
    (StatusCode::OK, Json(outcome)).into_response()
}
