use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Most recent decision-ledger entries, newest first.
pub async fn recent_decisions(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::DecisionsQuery>,
) -> axum::response::Response {
    match services.ctx.ledger.recent(query.limit()).await {
        Ok(items) => (StatusCode::OK, Json(json!({ "items": items }))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
