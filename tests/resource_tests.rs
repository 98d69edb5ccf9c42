//! Directory CRUD over HTTP: validation, references, uniqueness and paging

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::{Value, json};

#[tokio::test]
async fn test_health_endpoints() {
    let app = spawn_app();

    for path in ["/health", "/healthz"] {
        let response = app.server.get(path).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "campus-api");
    }
}

#[tokio::test]
async fn test_student_crud_round() {
    let app = spawn_app();
    let family = seed_family(&app.server, "ADM-401").await;
    let path = format!("/api/students/{}", family.student_id);

    let fetched: Value = app.server.get(&path).await.json();
    assert_eq!(fetched["type"], "student");
    assert_eq!(fetched["admissionNumber"], "ADM-401");
    assert_eq!(fetched["classId"], family.class_id);

    let updated = app
        .server
        .patch(&path)
        .json(&json!({ "rollNumber": 12 }))
        .await;
    updated.assert_status_ok();
    let updated: Value = updated.json();
    assert_eq!(updated["rollNumber"], 12);
    assert_eq!(updated["name"], "Aarav Sharma");
    assert_ne!(updated["updatedAt"], fetched["updatedAt"]);

    let deleted = app.server.delete(&path).await;
    deleted.assert_status_ok();
    let deleted: Value = deleted.json();
    assert_eq!(deleted["id"], family.student_id);

    let gone = app.server.get(&path).await;
    gone.assert_status(StatusCode::NOT_FOUND);
    let body: Value = gone.json();
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["details"]["entityType"], "student");

    app.server.delete(&path).await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_student_requires_existing_class() {
    let app = spawn_app();

    let response = app
        .server
        .post("/api/students")
        .json(&json!({
            "name": "Ghost",
            "admissionNumber": "ADM-402",
            "classId": uuid::Uuid::new_v4(),
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_REFERENCE");
}

#[tokio::test]
async fn test_duplicate_admission_number_rejected() {
    let app = spawn_app();
    let family = seed_family(&app.server, "ADM-403").await;

    let response = app
        .server
        .post("/api/students")
        .json(&json!({
            "name": "Twin",
            "admissionNumber": "adm-403",
            "classId": family.class_id,
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "DUPLICATE_CODE");
    assert!(body["error"].as_str().unwrap().contains("admissionNumber"));
}

#[tokio::test]
async fn test_subject_code_unique_but_update_keeps_own_code() {
    let app = spawn_app();
    let created = app
        .server
        .post("/api/subjects")
        .json(&json!({ "name": "Mathematics", "code": "MATH" }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let subject_id = id_of(&created.json());

    app.server
        .patch(&format!("/api/subjects/{}", subject_id))
        .json(&json!({ "name": "Maths", "code": "MATH" }))
        .await
        .assert_status_ok();

    let clash = app
        .server
        .post("/api/subjects")
        .json(&json!({ "name": "Applied Maths", "code": "MATH" }))
        .await;
    clash.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_validation_errors_list_fields() {
    let app = spawn_app();

    let response = app
        .server
        .post("/api/parents")
        .json(&json!({ "name": "", "phone": "12", "email": "not-an-email" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let fields: Vec<&str> = body["details"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"phone"));
    assert!(fields.contains(&"email"));
}

#[tokio::test]
async fn test_academic_year_dates_checked() {
    let app = spawn_app();

    let response = app
        .server
        .post("/api/academic-years")
        .json(&json!({ "name": "2024-25", "startDate": "2025-03-31", "endDate": "2024-04-01" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_broken_template_rejected() {
    let app = spawn_app();

    let response = app
        .server
        .post("/api/message-templates")
        .json(&json!({ "name": "attendance_absent", "body": "Dear {{ parentName" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_and_bad_ids() {
    let app = spawn_app();

    let malformed = app
        .server
        .post("/api/classes")
        .content_type("application/json")
        .text("{ not json")
        .await;
    malformed.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = malformed.json();
    assert_eq!(body["code"], "INVALID_JSON");

    let bad_id = app.server.get("/api/classes/12345").await;
    bad_id.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = bad_id.json();
    assert_eq!(body["code"], "INVALID_ID");
}

#[tokio::test]
async fn test_pagination_and_limit_cap() {
    let app = spawn_app();
    for n in 0..5 {
        create_class(&app.server, &format!("Class {}", n)).await;
    }

    let page: Value = app.server.get("/api/classes?limit=2&offset=1").await.json();
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["data"][0]["name"], "Class 1");
    assert_eq!(page["pagination"]["total"], 5);
    assert_eq!(page["pagination"]["hasMore"], true);

    let capped: Value = app.server.get("/api/classes?limit=500").await.json();
    assert_eq!(capped["pagination"]["limit"], 100);
    assert_eq!(capped["pagination"]["hasMore"], false);

    let bad = app.server.get("/api/classes?limit=lots").await;
    bad.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_filter_by_reference() {
    let app = spawn_app();
    let first = seed_family(&app.server, "ADM-404").await;
    seed_family(&app.server, "ADM-405").await;

    let body: Value = app
        .server
        .get(&format!("/api/students?classId={}", first.class_id))
        .await
        .json();
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["admissionNumber"], "ADM-404");
}
