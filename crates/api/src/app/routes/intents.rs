use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn reconcile(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.reconcile().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
