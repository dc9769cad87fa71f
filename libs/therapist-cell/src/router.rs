use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn therapist_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::create_therapist))
        .route("/{therapist_id}", get(handlers::get_therapist))
        .route("/{therapist_id}", put(handlers::update_therapist))
        .route("/{therapist_id}/hours", put(handlers::set_weekly_hours))
        .route("/{therapist_id}/hours", get(handlers::get_hours))
        .route("/{therapist_id}/availability", get(handlers::get_availability))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
