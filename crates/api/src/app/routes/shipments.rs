use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use procura_core::ShipmentId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_shipment))
        .route("/:id/status", post(update_status))
}

pub async fn get_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let shipment_id = match errors::parse_id::<ShipmentId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.ctx.store.shipment(shipment_id).await {
        Ok(Some(shipment)) => (StatusCode::OK, Json(shipment)).into_response(),
        Ok(None) => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("shipment {shipment_id}"),
        ),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Carrier status report (DELAYED, IN_TRANSIT, DELIVERED).
pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ShipmentStatusRequest>,
) -> axum::response::Response {
    let shipment_id = match errors::parse_id::<ShipmentId>(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .ctx
        .logistics()
        .update_status(shipment_id, body.status)
        .await
    {
        Ok(shipment) => (StatusCode::OK, Json(shipment)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
