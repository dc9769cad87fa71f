use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};
use tracing::warn;

use calendar_cell::CalendarClient;
use notification_cell::PushClient;
use payment_cell::PaymentClient;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::booking::BookingService;
use crate::services::conflict::ConflictDetectionService;
use crate::services::consistency::TherapistLockRegistry;
use crate::services::recurrence::RecurrenceService;

/// Long-lived service handles shared by every scheduling request. Clients
/// for the external collaborators are built once here, not per call.
pub struct SchedulingState {
    pub booking: BookingService,
    pub conflict: Arc<ConflictDetectionService>,
    pub recurrence: RecurrenceService,
}

impl SchedulingState {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let conflict = Arc::new(ConflictDetectionService::new(
            Arc::clone(&supabase),
            config.scheduling.clone(),
        ));
        let locks = Arc::new(TherapistLockRegistry::new());

        let calendar = match CalendarClient::new(config) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Calendar collaborator disabled: {}", e);
                None
            }
        };
        let payments = match PaymentClient::new(config) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Payment collaborator disabled: {}", e);
                None
            }
        };
        let push = match PushClient::new(config) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Push collaborator disabled: {}", e);
                None
            }
        };

        let booking = BookingService::new(
            Arc::clone(&supabase),
            config.scheduling.clone(),
            Arc::clone(&conflict),
            Arc::clone(&locks),
            calendar.clone(),
            payments,
            push,
        );

        let recurrence = RecurrenceService::new(
            supabase,
            config.scheduling.clone(),
            Arc::clone(&conflict),
            locks,
            calendar,
        );

        Self { booking, conflict, recurrence }
    }
}

pub fn scheduling_routes(config: Arc<AppConfig>) -> Router {
    let state = Arc::new(SchedulingState::new(&config));

    let protected_routes = Router::new()
        // One-off bookings
        .route("/appointments", post(handlers::book_appointment))
        .route("/appointments", get(handlers::search_appointments))
        .route("/appointments/{appointment_id}", get(handlers::get_appointment))
        .route("/appointments/{appointment_id}/accept", post(handlers::accept_appointment))
        .route("/appointments/{appointment_id}/reject", post(handlers::reject_appointment))
        .route("/appointments/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/appointments/{appointment_id}/charge", post(handlers::charge_appointment))

        // Standing weekly bookings
        .route("/recurrences", post(handlers::create_recurrence))
        .route("/recurrences/conflicts/check", get(handlers::check_recurrence_conflict))
        .route("/recurrences/{recurrence_id}/accept", post(handlers::accept_recurrence))
        .route("/recurrences/{recurrence_id}/materialize", post(handlers::materialize_recurrence))
        .route("/recurrences/{recurrence_id}/cancel", post(handlers::cancel_recurrence))

        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
