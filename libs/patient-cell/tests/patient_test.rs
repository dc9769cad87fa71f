// libs/patient-cell/tests/patient_test.rs

use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::models::{CreatePatientRequest, PatientError, UpdatePaymentAccountRequest};
use patient_cell::services::patient::PatientService;
use shared_utils::test_utils::TestConfig;

#[tokio::test]
async fn missing_patient_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_store_url(&mock_server.uri()).to_app_config();
    let service = PatientService::new(&config);

    let result = service.get_patient(Uuid::new_v4(), "test_token").await;
    assert!(matches!(result, Err(PatientError::NotFound)));
}

#[tokio::test]
async fn empty_name_is_rejected_before_any_write() {
    let config = TestConfig::default().to_app_config();
    let service = PatientService::new(&config);

    let request = CreatePatientRequest {
        first_name: "  ".to_string(),
        last_name: "Lima".to_string(),
        email: "bruno.lima@example.com".to_string(),
    };

    let result = service.create_patient(request, "test_token").await;
    assert!(matches!(result, Err(PatientError::ValidationError(_))));
}

#[tokio::test]
async fn empty_payment_account_is_rejected() {
    let config = TestConfig::default().to_app_config();
    let service = PatientService::new(&config);

    let request = UpdatePaymentAccountRequest {
        payment_account_id: "".to_string(),
    };

    let result = service.set_payment_account(Uuid::new_v4(), request, "test_token").await;
    assert!(matches!(result, Err(PatientError::ValidationError(_))));
}
