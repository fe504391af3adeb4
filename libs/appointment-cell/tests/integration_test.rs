// libs/appointment-cell/tests/integration_test.rs
use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Datelike, Duration, Local, NaiveDate};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::{appointment_routes, AppointmentCellState};
use appointment_cell::{
    AppointmentBookingService, AppointmentError, AppointmentStatus, AppointmentStore,
    InMemoryAppointmentStore, NewAppointment, StoreError, SupabaseAppointmentStore,
};
use doctor_cell::{DoctorDirectory, InMemoryDoctorDirectory, RegisterDoctorRequest};
use shared_database::SupabaseClient;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

// ==============================================================================
// HTTP HANDLERS
// ==============================================================================

struct TestApp {
    router: Router,
    config: TestConfig,
    doctor_id: Uuid,
}

async fn create_test_app() -> TestApp {
    let config = TestConfig::default();
    let doctors = Arc::new(InMemoryDoctorDirectory::new());
    let every_day: serde_json::Map<String, Value> = [
        "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
    ]
    .iter()
    .map(|day| (day.to_string(), json!(["08:00-18:00"])))
    .collect();

    let doctor = doctors
        .register_doctor(RegisterDoctorRequest {
            full_name: "Dr. Sam Okafor".to_string(),
            specialty: "General Practice".to_string(),
            working_hours: Value::Object(every_day),
        })
        .await
        .unwrap();

    let booking = Arc::new(AppointmentBookingService::new(
        Arc::new(InMemoryAppointmentStore::new()),
        doctors,
    ));
    let state = Arc::new(AppointmentCellState { config: config.to_arc(), booking });

    TestApp { router: appointment_routes(state), config, doctor_id: doctor.id }
}

fn next_week_at(hour: u32) -> String {
    let date = Local::now().date_naive() + Duration::days(7);
    format!("{}T{:02}:00", date.format("%Y-%m-%d"), hour)
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap() };
    (status, value)
}

fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json");
    match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let app = create_test_app().await;
    let request = Request::builder().uri("/mine").body(Body::empty()).unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn patient_books_lists_and_cancels() {
    let app = create_test_app().await;
    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &app.config.jwt_secret, None);

    let (status, body) = send(
        &app,
        authed("POST", "/", &token, Some(json!({
            "doctor_id": app.doctor_id,
            "start": next_week_at(10),
            "duration_minutes": 45,
            "notes": "Annual check-up"
        }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["appointment"]["patient_id"], patient.id);
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, authed("POST", "/", &token, Some(json!({
        "doctor_id": app.doctor_id,
        "start": next_week_at(10),
    })))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains(&appointment_id));

    let (status, body) = send(&app, authed("POST", &format!("/{}/cancel", appointment_id), &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "cancelled");

    let (status, body) = send(&app, authed("GET", "/mine", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["appointments"][0]["status"], "cancelled");
    assert_eq!(body["appointments"][0]["doctor_name"], "Dr. Sam Okafor");
}

#[tokio::test]
async fn patient_cannot_book_for_someone_else() {
    let app = create_test_app().await;
    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &app.config.jwt_secret, None);

    let (status, _) = send(&app, authed("POST", "/", &token, Some(json!({
        "patient_id": Uuid::new_v4(),
        "doctor_id": app.doctor_id,
        "start": next_week_at(9),
    })))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn other_patients_cannot_read_an_appointment() {
    let app = create_test_app().await;
    let owner = TestUser::patient("owner@example.com");
    let stranger = TestUser::patient("stranger@example.com");
    let owner_token = JwtTestUtils::create_test_token(&owner, &app.config.jwt_secret, None);
    let stranger_token = JwtTestUtils::create_test_token(&stranger, &app.config.jwt_secret, None);

    let (_, body) = send(&app, authed("POST", "/", &owner_token, Some(json!({
        "doctor_id": app.doctor_id,
        "start": next_week_at(11),
    })))).await;
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, authed("GET", &format!("/{}", appointment_id), &stranger_token, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, authed("POST", &format!("/{}/cancel", appointment_id), &stranger_token, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, authed("GET", &format!("/{}", appointment_id), &owner_token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "scheduled");
}

#[tokio::test]
async fn validation_failures_map_to_bad_request() {
    let app = create_test_app().await;
    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &app.config.jwt_secret, None);

    for start in ["2020-01-06T09:00".to_string(), "soon".to_string(), next_week_at(19)] {
        let (status, body) = send(&app, authed("POST", "/", &token, Some(json!({
            "doctor_id": app.doctor_id,
            "start": start,
        })))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    }

    let (status, _) = send(&app, authed("POST", "/", &token, Some(json!({
        "doctor_id": Uuid::new_v4(),
        "start": next_week_at(9),
    })))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ==============================================================================
// SUPABASE STORE
// ==============================================================================

fn supabase_store(server: &MockServer) -> SupabaseAppointmentStore {
    let config = TestConfig::with_supabase_url(server.uri()).to_app_config();
    SupabaseAppointmentStore::new(Arc::new(SupabaseClient::new(&config)))
}

fn monday_nine() -> chrono::NaiveDateTime {
    let date = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();
    assert_eq!(date.weekday(), chrono::Weekday::Mon);
    date.and_hms_opt(9, 0, 0).unwrap()
}

fn new_appointment(doctor_id: Uuid) -> NewAppointment {
    NewAppointment {
        patient_id: Uuid::new_v4(),
        doctor_id,
        start_time: monday_nine(),
        duration_minutes: 30,
        patient_notes: String::new(),
    }
}

#[tokio::test]
async fn supabase_unique_violation_maps_to_store_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("Prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::unique_violation()))
        .mount(&server)
        .await;

    let store = supabase_store(&server);
    let result = store.insert(new_appointment(Uuid::new_v4())).await;
    assert_matches!(result, Err(StoreError::UniqueViolation(_)));
}

#[tokio::test]
async fn supabase_insert_returns_stored_row() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "doctor_id": doctor_id, "status": "scheduled" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_row(appointment_id, patient_id, doctor_id, "2030-06-03T09:00:00", "scheduled")
        ])))
        .mount(&server)
        .await;

    let store = supabase_store(&server);
    let stored = store.insert(new_appointment(doctor_id)).await.unwrap();
    assert_eq!(stored.id, appointment_id);
    assert_eq!(stored.start_time, monday_nine());
    assert_eq!(stored.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn engine_over_supabase_reports_slot_conflict_after_lost_race() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let winner_id = Uuid::new_v4();

    // First overlap read sees nothing; the re-read after the failed insert
    // sees the winner.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(winner_id, Uuid::new_v4(), doctor_id, "2030-06-03T09:00:00", "scheduled")
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::unique_violation()))
        .mount(&server)
        .await;

    let doctors = Arc::new(InMemoryDoctorDirectory::new());
    let doctor = doctors
        .insert_record(doctor_cell::models::DoctorRecord {
            id: doctor_id,
            full_name: "Dr. Mira Chen".to_string(),
            specialty: "Neurology".to_string(),
            working_hours: json!({"monday": ["09:00-12:00"]}),
        })
        .await;

    let booking = AppointmentBookingService::new(Arc::new(supabase_store(&server)), doctors);
    let result = booking
        .book_appointment_at(
            appointment_cell::ScheduleAppointmentRequest {
                patient_id: Uuid::new_v4(),
                doctor_id: doctor.id,
                start: "2030-06-03T09:00".to_string(),
                duration_minutes: Some(30),
                notes: None,
            },
            monday_nine() - Duration::days(2),
        )
        .await;

    assert_eq!(result, Err(AppointmentError::SlotConflict { conflicting_id: Some(winner_id) }));
}

#[tokio::test]
async fn supabase_cancel_of_missing_row_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = supabase_store(&server);
    let result = store.update_status(Uuid::new_v4(), AppointmentStatus::Cancelled).await;
    assert_eq!(result, Err(StoreError::NotFound));
}
