use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use tracing::info;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn record_quote(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RecordQuoteRequest>,
) -> axum::response::Response {
    let new_quote = match body.into_new_quote() {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    match services.ctx.store.insert_quote(new_quote).await {
        Ok(quote) => {
            info!(rfq = %quote.rfq_id, quote = %quote.id, price = %quote.price, "quote recorded");
            (StatusCode::CREATED, Json(quote)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
