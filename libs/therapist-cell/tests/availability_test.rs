// libs/therapist-cell/tests/availability_test.rs
//
// Covers the availability calendar computation: weekday filtering, weekend
// exclusion, booked-slot exclusion, dedup and ordering guarantees.

use std::collections::HashSet;

use assert_matches::assert_matches;
use chrono::{Datelike, NaiveDate};
use uuid::Uuid;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::{method, path}};

use shared_utils::test_utils::TestConfig;
use therapist_cell::models::{Hour, Weekday};
use therapist_cell::services::availability::{build_availability_calendar, AvailabilityService};

fn hour(therapist_id: Uuid, weekday: Weekday, start_hour: u32) -> Hour {
    Hour {
        id: Uuid::new_v4(),
        therapist_id,
        weekday,
        start_hour,
    }
}

// Monday.
fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
}

// ==============================================================================
// PURE CALENDAR COMPUTATION
// ==============================================================================

#[test]
fn no_templates_yields_empty_calendar() {
    let calendar = build_availability_calendar(start_date(), 30, &[], &HashSet::new());
    assert!(calendar.is_empty());
    assert_eq!(calendar.slot_count(), 0);
}

#[test]
fn weekend_templates_never_produce_slots() {
    let therapist_id = Uuid::new_v4();
    let hours = vec![
        hour(therapist_id, Weekday::Saturday, 10),
        hour(therapist_id, Weekday::Sunday, 11),
    ];

    let calendar = build_availability_calendar(start_date(), 30, &hours, &HashSet::new());
    assert!(calendar.is_empty());
}

#[test]
fn monday_template_lands_on_every_monday_in_window() {
    let therapist_id = Uuid::new_v4();
    let hours = vec![hour(therapist_id, Weekday::Monday, 9)];

    let calendar = build_availability_calendar(start_date(), 30, &hours, &HashSet::new());

    // Jan 5 + 30 days covers Mondays Jan 5, 12, 19, 26 and Feb 2.
    assert_eq!(calendar.slot_count(), 5);
    assert_eq!(calendar.months.len(), 2);
    assert_eq!(calendar.months[0].month, 1);
    assert_eq!(calendar.months[1].month, 2);
    assert_eq!(calendar.months[0].days.len(), 4);
    assert_eq!(calendar.months[1].days.len(), 1);

    for month in &calendar.months {
        for day in &month.days {
            assert_eq!(day.date.weekday(), chrono::Weekday::Mon);
            assert_eq!(day.hours.len(), 1);
            assert_eq!(day.hours[0].start_hour, 9);
        }
    }
}

#[test]
fn every_slot_falls_on_a_weekday() {
    let therapist_id = Uuid::new_v4();
    let hours: Vec<Hour> = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ]
    .into_iter()
    .map(|weekday| hour(therapist_id, weekday, 10))
    .collect();

    let calendar = build_availability_calendar(start_date(), 30, &hours, &HashSet::new());

    for month in &calendar.months {
        for day in &month.days {
            assert!(
                !matches!(day.date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun),
                "weekend date {} leaked into availability",
                day.date
            );
        }
    }
}

#[test]
fn booked_slot_is_excluded() {
    let therapist_id = Uuid::new_v4();
    let hours = vec![hour(therapist_id, Weekday::Monday, 9)];

    let mut booked = HashSet::new();
    booked.insert((NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(), 9));

    let calendar = build_availability_calendar(start_date(), 30, &hours, &booked);

    assert_eq!(calendar.slot_count(), 4);
    let dates: Vec<NaiveDate> = calendar
        .months
        .iter()
        .flat_map(|m| m.days.iter().map(|d| d.date))
        .collect();
    assert!(!dates.contains(&NaiveDate::from_ymd_opt(2026, 1, 12).unwrap()));
}

#[test]
fn booking_at_another_hour_keeps_the_slot() {
    let therapist_id = Uuid::new_v4();
    let hours = vec![hour(therapist_id, Weekday::Monday, 9)];

    let mut booked = HashSet::new();
    booked.insert((NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(), 14));

    let calendar = build_availability_calendar(start_date(), 30, &hours, &booked);
    assert_eq!(calendar.slot_count(), 5);
}

#[test]
fn duplicate_templates_do_not_duplicate_slots() {
    let therapist_id = Uuid::new_v4();
    let hours = vec![
        hour(therapist_id, Weekday::Monday, 9),
        hour(therapist_id, Weekday::Monday, 9),
    ];

    let calendar = build_availability_calendar(start_date(), 30, &hours, &HashSet::new());

    let mut seen = HashSet::new();
    for month in &calendar.months {
        for day in &month.days {
            for slot in &day.hours {
                assert!(
                    seen.insert((day.date, slot.start_hour)),
                    "duplicate slot ({}, {})",
                    day.date,
                    slot.start_hour
                );
            }
        }
    }
}

#[test]
fn dates_ascend_within_each_month_group() {
    let therapist_id = Uuid::new_v4();
    let hours = vec![
        hour(therapist_id, Weekday::Monday, 9),
        hour(therapist_id, Weekday::Thursday, 15),
    ];

    let calendar = build_availability_calendar(start_date(), 30, &hours, &HashSet::new());

    for month in &calendar.months {
        let dates: Vec<NaiveDate> = month.days.iter().map(|d| d.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(dates, sorted);
    }
}

#[test]
fn hours_within_a_day_are_ordered() {
    let therapist_id = Uuid::new_v4();
    let hours = vec![
        hour(therapist_id, Weekday::Monday, 16),
        hour(therapist_id, Weekday::Monday, 8),
        hour(therapist_id, Weekday::Monday, 11),
    ];

    let calendar = build_availability_calendar(start_date(), 7, &hours, &HashSet::new());

    let day = &calendar.months[0].days[0];
    let starts: Vec<u32> = day.hours.iter().map(|h| h.start_hour).collect();
    assert_eq!(starts, vec![8, 11, 16]);
}

// ==============================================================================
// STORE-BACKED SERVICE
// ==============================================================================

fn therapist_json(therapist_id: Uuid) -> serde_json::Value {
    serde_json::json!({
        "id": therapist_id,
        "first_name": "Ana",
        "last_name": "Souza",
        "email": "ana.souza@example.com",
        "hourly_rate": 15000,
        "bio": null,
        "street": null,
        "city": null,
        "state": null,
        "postal_code": null,
        "push_token": null,
        "calendar_email": null,
        "payment_account_id": null,
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn service_returns_empty_calendar_for_therapist_without_hours() {
    let mock_server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/therapists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![therapist_json(therapist_id)]))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/hours"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_store_url(&mock_server.uri()).to_app_config();
    let service = AvailabilityService::new(&config);

    let calendar = service
        .find_available_slots(therapist_id, None, "test_token")
        .await
        .expect("availability should compute");

    assert!(calendar.is_empty());
}

#[tokio::test]
async fn service_skips_weekends_and_honors_templates() {
    let mock_server = MockServer::start().await;
    let therapist_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/therapists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![therapist_json(therapist_id)]))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/hours"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![
            serde_json::json!({
                "id": Uuid::new_v4(),
                "therapist_id": therapist_id,
                "weekday": "MONDAY",
                "start_hour": 9
            }),
            serde_json::json!({
                "id": Uuid::new_v4(),
                "therapist_id": therapist_id,
                "weekday": "WEDNESDAY",
                "start_hour": 14
            }),
        ]))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_store_url(&mock_server.uri()).to_app_config();
    let service = AvailabilityService::new(&config);

    let calendar = service
        .find_available_slots(therapist_id, Some(30), "test_token")
        .await
        .expect("availability should compute");

    assert!(calendar.slot_count() > 0);
    for month in &calendar.months {
        for day in &month.days {
            assert!(!matches!(
                day.date.weekday(),
                chrono::Weekday::Sat | chrono::Weekday::Sun
            ));
            for slot in &day.hours {
                assert!(slot.start_hour == 9 || slot.start_hour == 14);
            }
        }
    }
}

#[tokio::test]
async fn service_propagates_missing_therapist() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/therapists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_store_url(&mock_server.uri()).to_app_config();
    let service = AvailabilityService::new(&config);

    let result = service
        .find_available_slots(Uuid::new_v4(), None, "test_token")
        .await;

    assert_matches!(result, Err(therapist_cell::models::TherapistError::NotFound));
}
