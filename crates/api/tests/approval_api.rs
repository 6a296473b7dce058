//! HTTP-level tests for approval governance and the manual sweep triggers.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, build_test_app, TestApp};
use serde_json::json;

/// Enrol a fresh lead and return its student id.
async fn enrolled_student(app: &TestApp) -> serde_json::Value {
    let batch = app.batch("U14 Weekend", 20).await;
    let lead = app.create_lead("Arjun").await;
    let response = app
        .post_json(
            &format!("/api/v1/leads/{}/convert", lead["id"]),
            &app.counsellor(),
            json!({
                "plan": "Quarterly",
                "start_date": "2026-03-02",
                "batch_ids": [batch.id],
                "payment_verified": true
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].clone()
}

fn deactivate(student_id: &serde_json::Value) -> serde_json::Value {
    json!({
        "action": { "type": "deactivate" },
        "reason": "Family relocating",
        "student_id": student_id
    })
}

// ---------------------------------------------------------------------------
// Filing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn counsellor_files_a_pending_request() {
    let app = build_test_app();
    let student_id = enrolled_student(&app).await;

    let response = app
        .post_json("/api/v1/approvals", &app.counsellor(), deactivate(&student_id))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "pending");
    assert_eq!(json["data"]["request_type"], "deactivate");
    assert_eq!(json["data"]["requester_id"], common::COUNSELLOR_ID);
}

#[tokio::test]
async fn approving_roles_cannot_file_requests() {
    let app = build_test_app();
    let student_id = enrolled_student(&app).await;

    let response = app
        .post_json("/api/v1/approvals", &app.admin(), deactivate(&student_id))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "FORBIDDEN");
}

#[tokio::test]
async fn a_blank_reason_is_rejected() {
    let app = build_test_app();
    let student_id = enrolled_student(&app).await;

    let response = app
        .post_json(
            "/api/v1/approvals",
            &app.counsellor(),
            json!({ "action": { "type": "deactivate" }, "reason": "", "student_id": student_id }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn only_approvers_see_the_queue() {
    let app = build_test_app();
    let student_id = enrolled_student(&app).await;
    app.post_json("/api/v1/approvals", &app.counsellor(), deactivate(&student_id))
        .await;

    let denied = app.get("/api/v1/approvals/pending", &app.counsellor()).await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let queue = app.get("/api/v1/approvals/pending", &app.approver()).await;
    assert_eq!(queue.status(), StatusCode::OK);
    let queue = body_json(queue).await;
    assert_eq!(queue["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn approving_a_deactivation_applies_it() {
    let app = build_test_app();
    let student_id = enrolled_student(&app).await;
    let filed = app
        .post_json("/api/v1/approvals", &app.counsellor(), deactivate(&student_id))
        .await;
    let request_id = body_json(filed).await["data"]["id"].clone();

    let response = app
        .post_json(
            &format!("/api/v1/approvals/{request_id}/resolve"),
            &app.approver(),
            json!({ "approved": true, "note": "Confirmed with parent" }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "approved");
    assert_eq!(json["data"]["resolver_id"], common::APPROVER_ID);

    let student = app
        .get(&format!("/api/v1/students/{student_id}"), &app.counsellor())
        .await;
    assert_eq!(body_json(student).await["data"]["is_active"], false);

    let pending = app.get("/api/v1/approvals/pending", &app.approver()).await;
    assert!(body_json(pending).await["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn counsellor_cannot_resolve() {
    let app = build_test_app();
    let student_id = enrolled_student(&app).await;
    let filed = app
        .post_json("/api/v1/approvals", &app.counsellor(), deactivate(&student_id))
        .await;
    let request_id = body_json(filed).await["data"]["id"].clone();

    let response = app
        .post_json(
            &format!("/api/v1/approvals/{request_id}/resolve"),
            &app.counsellor(),
            json!({ "approved": true }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Sweeps
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweeps_are_admin_only() {
    let app = build_test_app();
    let counsellor = app.counsellor();
    let admin = app.admin();

    let denied = app
        .send(Method::POST, "/api/v1/admin/sweeps/expiry", Some(&counsellor), None)
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    for uri in ["/api/v1/admin/sweeps/expiry", "/api/v1/admin/sweeps/nurture"] {
        let response = app.send(Method::POST, uri, Some(&admin), None).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let json = body_json(response).await;
        assert!(json["data"]["affected"].as_array().unwrap().is_empty());
    }
}
