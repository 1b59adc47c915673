use axum::{
    routing::{get, post},
    Router,
};

pub mod approvals;
pub mod cycles;
pub mod decisions;
pub mod intents;
pub mod quotes;
pub mod shipments;
pub mod system;

/// Router for every pipeline endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .route("/cycles", post(cycles::run_cycle))
        .route("/quotes", post(quotes::record_quote))
        .nest("/approvals", approvals::router())
        .nest("/shipments", shipments::router())
        .route("/decisions", get(decisions::recent_decisions))
        .route("/intents/reconcile", post(intents::reconcile))
}
