// libs/scheduling-cell/tests/conflict_test.rs
//
// Conflict detection at both levels: concrete appointments on weekly
// repetitions of the requested instant, and standing recurrences holding
// the same (weekday, start-time).

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::{method, path}};

use scheduling_cell::services::conflict::{
    next_weekday_date, weekly_candidates, ConflictDetectionService,
};
use shared_config::SchedulingConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::TestConfig;
use therapist_cell::models::Weekday;

// ==============================================================================
// PURE CANDIDATE GENERATION
// ==============================================================================

#[test]
fn thirty_one_day_horizon_yields_five_weekly_candidates() {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    let requested = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();

    let candidates = weekly_candidates(requested, now, 31);

    assert_eq!(candidates.len(), 5);
    assert_eq!(candidates[0], requested);
    for pair in candidates.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::days(7));
    }
}

#[test]
fn sub_week_horizon_keeps_only_the_requested_instant() {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    let requested = Utc.with_ymd_and_hms(2026, 1, 2, 9, 0, 0).unwrap();

    let candidates = weekly_candidates(requested, now, 6);

    assert_eq!(candidates, vec![requested]);
}

#[test]
fn next_weekday_date_finds_the_following_monday() {
    // 2026-01-01 is a Thursday.
    let thursday = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    assert_eq!(
        next_weekday_date(thursday, Weekday::Monday),
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    );
}

#[test]
fn next_weekday_date_keeps_a_matching_day() {
    let monday = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
    assert_eq!(next_weekday_date(monday, Weekday::Monday), monday);
}

// ==============================================================================
// STORE-BACKED DETECTION
// ==============================================================================

fn service_for(mock_server: &MockServer) -> ConflictDetectionService {
    let config = TestConfig::with_store_url(&mock_server.uri()).to_app_config();
    ConflictDetectionService::new(
        Arc::new(SupabaseClient::new(&config)),
        SchedulingConfig::default(),
    )
}

fn accepted_appointment_row() -> serde_json::Value {
    serde_json::json!({
        "id": Uuid::new_v4(),
        "therapist_id": Uuid::new_v4(),
        "patient_id": Uuid::new_v4(),
        "scheduled_to": "2026-01-12T10:00:00Z",
        "modality": "ONLINE",
        "status": "ACCEPTED",
        "appointment_type": "ONE_OFF",
        "paid": false,
        "recurrence_id": null,
        "calendar_event_id": null,
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    })
}

fn accepted_recurrence_row() -> serde_json::Value {
    serde_json::json!({
        "id": Uuid::new_v4(),
        "therapist_id": Uuid::new_v4(),
        "patient_id": Uuid::new_v4(),
        "weekday": "MONDAY",
        "start_time": "10:00:00",
        "start_date": "2026-01-05",
        "modality": "ONLINE",
        "status": "ACCEPTED",
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn free_slot_reports_no_conflict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/recurrences"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let requested = Utc::now() + Duration::days(3);

    let conflict = service
        .check_slot_conflict(Uuid::new_v4(), requested, "test_token")
        .await
        .expect("conflict check should run");

    assert!(!conflict);
}

#[tokio::test]
async fn accepted_appointment_on_a_candidate_instant_conflicts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![accepted_appointment_row()]))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/recurrences"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let requested = Utc::now() + Duration::days(3);

    let conflict = service
        .check_slot_conflict(Uuid::new_v4(), requested, "test_token")
        .await
        .expect("conflict check should run");

    assert!(conflict);
}

#[tokio::test]
async fn standing_recurrence_claims_the_weekly_slot() {
    // A one-off request colliding with an accepted recurrence at the same
    // (weekday, start-time) must conflict even with no concrete
    // appointment on the instant.
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/recurrences"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![accepted_recurrence_row()]))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let requested = Utc::now() + Duration::days(3);

    let conflict = service
        .check_slot_conflict(Uuid::new_v4(), requested, "test_token")
        .await
        .expect("conflict check should run");

    assert!(conflict);
}

#[tokio::test]
async fn requested_recurrence_without_anchor_uses_next_occurrence() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/recurrences"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);

    let conflict = service
        .check_requested_recurrence(
            Uuid::new_v4(),
            Weekday::Monday,
            chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            None,
            "test_token",
        )
        .await
        .expect("conflict check should run");

    assert!(!conflict);
}
