use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use procura_core::ApprovalId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_pending))
        .route("/:id/decision", post(decide))
}

pub async fn list_pending(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.ctx.store.pending_approvals().await {
        Ok(items) => (StatusCode::OK, Json(json!({ "items": items }))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn decide(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::DecisionRequest>,
) -> axum::response::Response {
    let approval_id = match errors::parse_id::<ApprovalId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .ctx
        .approval_gate()
        .decide(approval_id, body.decision, &body.decided_by)
        .await
    {
        Ok(approval) => (StatusCode::OK, Json(approval)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
