use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use patient_cell::router::patient_routes;
use scheduling_cell::router::scheduling_routes;
use shared_config::AppConfig;
use therapist_cell::router::therapist_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Mindline API is running!" }))
        .nest("/therapists", therapist_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/scheduling", scheduling_routes(state.clone()))
}
