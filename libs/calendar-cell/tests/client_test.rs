// libs/calendar-cell/tests/client_test.rs

use chrono::{Duration, Utc};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use calendar_cell::models::{CalendarError, CreateEventRequest, EventPatch};
use calendar_cell::CalendarClient;
use shared_config::{AppConfig, SchedulingConfig};

fn config_for(base_url: &str) -> AppConfig {
    AppConfig {
        supabase_url: String::new(),
        supabase_anon_key: String::new(),
        supabase_jwt_secret: String::new(),
        calendar_api_base_url: base_url.to_string(),
        calendar_api_token: "calendar-token".to_string(),
        calendar_organizer_email: "agenda@example.com".to_string(),
        push_api_base_url: String::new(),
        push_api_token: String::new(),
        payment_api_base_url: String::new(),
        payment_api_secret_key: String::new(),
        payment_application_fee_bps: 1000,
        scheduling: SchedulingConfig::default(),
    }
}

#[test]
fn client_requires_configuration() {
    let config = config_for("");
    assert!(matches!(
        CalendarClient::new(&config),
        Err(CalendarError::NotConfigured)
    ));
}

#[tokio::test]
async fn created_event_id_round_trips() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/events"))
        .and(body_partial_json(serde_json::json!({
            "organizer": "agenda@example.com",
            "conferencing": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "evt_123",
            "conference_link": "https://meet.example.com/abc"
        })))
        .mount(&mock_server)
        .await;

    let client = CalendarClient::new(&config_for(&mock_server.uri())).unwrap();

    let start = Utc::now() + Duration::days(1);
    let event_id = client
        .create_event(&CreateEventRequest {
            organizer_email: "agenda@example.com".to_string(),
            attendee_email: "bruno.lima@example.com".to_string(),
            start,
            end: start + Duration::hours(1),
            conferencing: true,
        })
        .await
        .expect("event should be created");

    assert_eq!(event_id, "evt_123");
}

#[tokio::test]
async fn provider_errors_surface_with_status_and_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/events/evt_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such event"))
        .mount(&mock_server)
        .await;

    let client = CalendarClient::new(&config_for(&mock_server.uri())).unwrap();

    let result = client.delete_event("evt_missing").await;
    match result {
        Err(CalendarError::ApiError { message }) => {
            assert!(message.contains("404"));
            assert!(message.contains("no such event"));
        }
        other => panic!("expected ApiError, got {:?}", other.err()),
    }
}

#[tokio::test]
async fn patch_sends_only_populated_fields() {
    let mock_server = MockServer::start().await;

    let new_start = Utc::now() + Duration::days(2);

    Mock::given(method("PATCH"))
        .and(path("/events/evt_123"))
        .and(body_partial_json(serde_json::json!({
            "start": new_start.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
        })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let client = CalendarClient::new(&config_for(&mock_server.uri())).unwrap();

    client
        .update_event(
            "evt_123",
            &EventPatch {
                start: Some(new_start),
                ..EventPatch::default()
            },
        )
        .await
        .expect("patch should succeed");
}
