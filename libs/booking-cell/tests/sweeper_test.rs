use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_cell::models::AppointmentError;
use booking_cell::services::sweeper::CompletionSweeper;
use shared_utils::clock::FixedClock;
use shared_utils::test_utils::{MockClinicRows, TestConfig};

fn sweeper_at(mock_server: &MockServer, now: chrono::DateTime<Utc>) -> CompletionSweeper {
    CompletionSweeper::with_clock(
        &TestConfig::with_url(&mock_server.uri()).to_app_config(),
        Arc::new(FixedClock(now)),
    )
}

#[tokio::test]
async fn test_sweep_completes_stale_confirmed_appointment() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let note_id = Uuid::new_v4();
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

    // Confirmed two hours ago, so its assumed end time is an hour gone
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicRows::appointment_row(appointment_id, "2024-01-01T10:00:00Z", "confirmed")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/notes"))
        .and(body_partial_json(json!({
            "appointment_id": appointment_id,
            "type": "completed",
            "added_by": "system",
            "added_by_id": null,
            "content": "Automatically marked as completed (1 hour after scheduled time)"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockClinicRows::note_row(
                note_id,
                appointment_id,
                "completed",
                "system",
                "Automatically marked as completed (1 hour after scheduled time)",
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "status": "completed",
            "note_history": [note_id]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicRows::appointment_row_with_history(
                appointment_id, "2024-01-01T10:00:00Z", "completed", &[note_id]
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sweeper = sweeper_at(&mock_server, now);

    let completed = sweeper.sweep_once().await.unwrap();
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn test_sweep_leaves_appointment_inside_assumed_duration() {
    let mock_server = MockServer::start().await;
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

    // Started 30 minutes ago; its assumed end time is still ahead. The
    // query should not normally return it, but the sweep re-checks anyway.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicRows::appointment_row(Uuid::new_v4(), "2024-01-01T11:30:00Z", "confirmed")
        ])))
        .mount(&mock_server)
        .await;

    let sweeper = sweeper_at(&mock_server, now);

    let completed = sweeper.sweep_once().await.unwrap();
    assert_eq!(completed, 0);
}

#[tokio::test]
async fn test_sweep_is_idempotent_on_already_completed_appointment() {
    let mock_server = MockServer::start().await;
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

    // A row that already left confirmed between query and processing
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockClinicRows::appointment_row(Uuid::new_v4(), "2024-01-01T10:00:00Z", "completed")
        ])))
        .mount(&mock_server)
        .await;

    let sweeper = sweeper_at(&mock_server, now);

    let completed = sweeper.sweep_once().await.unwrap();
    assert_eq!(completed, 0);
}

#[tokio::test]
async fn test_sweep_with_nothing_stale_is_a_noop() {
    let mock_server = MockServer::start().await;
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let sweeper = sweeper_at(&mock_server, now);

    let completed = sweeper.sweep_once().await.unwrap();
    assert_eq!(completed, 0);
}

#[tokio::test]
async fn test_sweep_surfaces_storage_failure_to_caller() {
    let mock_server = MockServer::start().await;
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockClinicRows::error_response("database unavailable", "XX000")
        ))
        .mount(&mock_server)
        .await;

    let sweeper = sweeper_at(&mock_server, now);

    // The run loop logs this; sweep_once itself reports it
    let result = sweeper.sweep_once().await;
    assert_matches!(result, Err(AppointmentError::Storage(_)));
}
