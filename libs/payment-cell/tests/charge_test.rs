// libs/payment-cell/tests/charge_test.rs

use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use payment_cell::models::PaymentError;
use payment_cell::PaymentClient;
use shared_config::{AppConfig, SchedulingConfig};

fn config_for(base_url: &str) -> AppConfig {
    AppConfig {
        supabase_url: String::new(),
        supabase_anon_key: String::new(),
        supabase_jwt_secret: String::new(),
        calendar_api_base_url: String::new(),
        calendar_api_token: String::new(),
        calendar_organizer_email: String::new(),
        push_api_base_url: String::new(),
        push_api_token: String::new(),
        payment_api_base_url: base_url.to_string(),
        payment_api_secret_key: "sk_test".to_string(),
        payment_application_fee_bps: 1000,
        scheduling: SchedulingConfig::default(),
    }
}

#[test]
fn application_fee_is_a_basis_point_cut() {
    let mock_uri = "http://localhost:9";
    let client = PaymentClient::new(&config_for(mock_uri)).unwrap();

    // 10% of 15000 cents.
    assert_eq!(client.application_fee(15_000), 1_500);
    assert_eq!(client.application_fee(0), 0);
}

#[tokio::test]
async fn successful_charge_returns_the_charge_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/charges"))
        .and(body_partial_json(serde_json::json!({
            "payer_account_id": "acct_patient",
            "payee_account_id": "acct_therapist",
            "amount": 15000,
            "application_fee": 1500
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "ch_1",
            "status": "succeeded"
        })))
        .mount(&mock_server)
        .await;

    let client = PaymentClient::new(&config_for(&mock_server.uri())).unwrap();

    let charge_id = client
        .charge("acct_patient", "acct_therapist", 15_000)
        .await
        .expect("charge should succeed");

    assert_eq!(charge_id, "ch_1");
}

#[tokio::test]
async fn failed_charge_status_is_a_decline() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/charges"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "ch_2",
            "status": "failed"
        })))
        .mount(&mock_server)
        .await;

    let client = PaymentClient::new(&config_for(&mock_server.uri())).unwrap();

    let result = client.charge("acct_patient", "acct_therapist", 15_000).await;
    assert!(matches!(result, Err(PaymentError::ChargeDeclined)));
}

#[tokio::test]
async fn http_errors_surface_as_api_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/charges"))
        .respond_with(ResponseTemplate::new(402).set_body_string("card expired"))
        .mount(&mock_server)
        .await;

    let client = PaymentClient::new(&config_for(&mock_server.uri())).unwrap();

    let result = client.charge("acct_patient", "acct_therapist", 15_000).await;
    match result {
        Err(PaymentError::ApiError { message }) => assert!(message.contains("402")),
        other => panic!("expected ApiError, got {:?}", other.err()),
    }
}
