//! Integration tests for the medical record routes, over in-memory stores.

mod common;

use axum::http::StatusCode;
use serde_json::json;

const BASE: &str = "/api/v1/medical-records";

#[tokio::test]
async fn test_create_reservation_returns_201_and_projects_view() {
    // Arrange
    let app = common::build_test_app();

    // Act
    let (status, json) = common::post_json(app.clone(), BASE, &common::reservation_body()).await;

    // Assert
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["version"], 1);
    assert_eq!(json["event_ids"].as_array().unwrap().len(), 1);

    let record_id = json["record_id"].as_str().unwrap();
    let (status, view) = common::get_json(app, &format!("{BASE}/{record_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "PENDING");
    assert_eq!(view["user_name"], "Park Jisoo");
    assert_eq!(view["hospital_name"], "Seoul Central");
    assert_eq!(view["treatment_product_name"], "Laser Toning");
    assert_eq!(view["user_memo"], "first visit");
    assert_eq!(view["version"], 1);
}

#[tokio::test]
async fn test_create_with_end_before_start_returns_400() {
    let app = common::build_test_app();
    let body = common::reservation_at("2026-01-15T10:30:00Z", "2026-01-15T10:00:00Z");

    let (status, json) = common::post_json(app, BASE, &body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_command");
}

#[tokio::test]
async fn test_create_with_missing_fields_returns_422() {
    let app = common::build_test_app();

    let (status, _) = common::post_json(app, BASE, &json!({ "user_id": "U1" })).await;

    // Axum returns 422 for body deserialization failures.
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_lifecycle_updates_view_and_trail() {
    // Arrange
    let app = common::build_test_app();
    let record_id = common::create_reservation(&app).await;
    let admin = json!({ "admin_id": "A1" });

    // Act
    let (confirm, _) =
        common::patch_json(app.clone(), &format!("{BASE}/{record_id}/status/confirm"), &admin)
            .await;
    let (assign, _) = common::patch_json(
        app.clone(),
        &format!("{BASE}/{record_id}/doctor"),
        &json!({ "doctor_id": "D1", "admin_id": "A1" }),
    )
    .await;
    let (note, note_json) = common::patch_json(
        app.clone(),
        &format!("{BASE}/{record_id}/note"),
        &json!({ "note": "bring previous chart" }),
    )
    .await;

    // Assert
    assert_eq!(confirm, StatusCode::OK);
    assert_eq!(assign, StatusCode::OK);
    assert_eq!(note, StatusCode::OK);
    assert_eq!(note_json["version"], 4);

    let (_, view) = common::get_json(app.clone(), &format!("{BASE}/{record_id}")).await;
    assert_eq!(view["status"], "RESERVED");
    assert_eq!(view["doctor_id"], "D1");
    assert_eq!(view["doctor_name"], "Dr. Kim");
    assert_eq!(view["note"], "bring previous chart");

    let (status, events) = common::get_json(app, &format!("{BASE}/{record_id}/events")).await;
    assert_eq!(status, StatusCode::OK);
    let tags: Vec<&str> = events
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event_type"].as_str().unwrap())
        .collect();
    assert_eq!(
        tags,
        vec![
            "medical_record.reservation_created",
            "medical_record.confirmed",
            "medical_record.doctor_assigned",
            "medical_record.note_updated",
        ]
    );
    assert_eq!(events[1]["payload"]["admin_name"], "Lee");
    assert_eq!(events[3]["version"], 4);
}

#[tokio::test]
async fn test_state_endpoint_rehydrates_aggregate() {
    let app = common::build_test_app();
    let record_id = common::create_reservation(&app).await;
    common::patch_json(
        app.clone(),
        &format!("{BASE}/{record_id}/status/cancel"),
        &json!({ "admin_id": "A1" }),
    )
    .await;

    let (status, json) = common::get_json(app, &format!("{BASE}/{record_id}/state")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["record_id"], record_id.as_str());
    assert_eq!(json["version"], 2);
    assert_eq!(json["state"]["status"], "CANCELED");
    assert_eq!(json["state"]["hospital_id"], "H1");
}

#[tokio::test]
async fn test_status_change_after_cancel_returns_400() {
    let app = common::build_test_app();
    let record_id = common::create_reservation(&app).await;
    let admin = json!({ "admin_id": "A1" });
    common::patch_json(app.clone(), &format!("{BASE}/{record_id}/status/cancel"), &admin).await;

    let (status, json) =
        common::patch_json(app, &format!("{BASE}/{record_id}/status/confirm"), &admin).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_command");
}

#[tokio::test]
async fn test_unknown_status_action_returns_400() {
    let app = common::build_test_app();
    let record_id = common::create_reservation(&app).await;

    let (status, _) = common::patch_json(
        app,
        &format!("{BASE}/{record_id}/status/approve"),
        &json!({ "admin_id": "A1" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_command_on_unknown_record_returns_404() {
    let app = common::build_test_app();

    let (status, json) = common::patch_json(
        app,
        &format!("{BASE}/record-404/status/confirm"),
        &json!({ "admin_id": "A1" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_assign_unknown_doctor_returns_404_and_appends_nothing() {
    let app = common::build_test_app();
    let record_id = common::create_reservation(&app).await;

    let (status, _) = common::patch_json(
        app.clone(),
        &format!("{BASE}/{record_id}/doctor"),
        &json!({ "doctor_id": "D404", "admin_id": "A1" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, events) = common::get_json(app, &format!("{BASE}/{record_id}/events")).await;
    assert_eq!(events.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_queries_for_unknown_record_return_404() {
    let app = common::build_test_app();

    for path in ["record-404", "record-404/events", "record-404/state"] {
        let (status, json) = common::get_json(app.clone(), &format!("{BASE}/{path}")).await;

        assert_eq!(status, StatusCode::NOT_FOUND, "GET {path}");
        assert_eq!(json["error"], "not_found");
    }
}

#[tokio::test]
async fn test_hospital_listing_filters_by_window() {
    // Arrange
    let app = common::build_test_app();
    for (start, end) in [
        ("2026-01-15T09:00:00Z", "2026-01-15T09:30:00Z"),
        ("2026-01-15T14:00:00Z", "2026-01-15T14:30:00Z"),
        ("2026-01-16T09:00:00Z", "2026-01-16T09:30:00Z"),
    ] {
        let (status, _) =
            common::post_json(app.clone(), BASE, &common::reservation_at(start, end)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Act
    let (status, json) = common::get_json(
        app,
        &format!(
            "{BASE}/hospitals/H1?start_time=2026-01-15T00:00:00Z&end_time=2026-01-15T23:59:59Z"
        ),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    let starts: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["start_time"].as_str().unwrap())
        .collect();
    assert_eq!(starts.len(), 2);
    assert!(starts[0].starts_with("2026-01-15T09:00:00"));
    assert!(starts[1].starts_with("2026-01-15T14:00:00"));
}

#[tokio::test]
async fn test_hospital_listing_with_inverted_window_returns_400() {
    let app = common::build_test_app();

    let (status, json) = common::get_json(
        app,
        &format!(
            "{BASE}/hospitals/H1?start_time=2026-01-16T00:00:00Z&end_time=2026-01-15T00:00:00Z"
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_command");
}

#[tokio::test]
async fn test_hospital_listing_without_window_returns_400() {
    let app = common::build_test_app();

    let (status, _) = common::get_json(app, &format!("{BASE}/hospitals/H1")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_listing_is_newest_first() {
    let app = common::build_test_app();
    for (start, end) in [
        ("2026-01-15T09:00:00Z", "2026-01-15T09:30:00Z"),
        ("2026-01-20T09:00:00Z", "2026-01-20T09:30:00Z"),
    ] {
        common::post_json(app.clone(), BASE, &common::reservation_at(start, end)).await;
    }

    let (status, all) = common::get_json(app.clone(), &format!("{BASE}/users/U1")).await;
    let (_, elsewhere) =
        common::get_json(app, &format!("{BASE}/users/U1?hospital_id=H2")).await;

    assert_eq!(status, StatusCode::OK);
    let all = all.as_array().unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0]["start_time"].as_str().unwrap().starts_with("2026-01-20"));
    assert!(elsewhere.as_array().unwrap().is_empty());
}
