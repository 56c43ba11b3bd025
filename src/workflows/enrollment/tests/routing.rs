use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::enrollment::domain::{DocumentKind, UserRole};
use crate::workflows::enrollment::router::{platform_router, PlatformState};

fn router(harness: &Harness) -> axum::Router {
    platform_router(PlatformState::new(
        harness.platform.clone(),
        harness.media.clone(),
        harness.identity.clone(),
    ))
}

fn post_json(path: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post(path).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("serializable")))
        .expect("request builds")
}

fn get_authed(path: &str, token: &str) -> Request<Body> {
    Request::get(path)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request builds")
}

async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[tokio::test]
async fn requests_without_credentials_are_unauthorized() {
    let harness = harness();
    let app = router(&harness);

    let response = app
        .oneshot(post_json(
            "/api/v1/enrollments",
            None,
            json!({ "school_id": "anything" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_tokens_are_unauthorized() {
    let harness = harness();
    let app = router(&harness);

    let response = app
        .oneshot(post_json(
            "/api/v1/enrollments",
            Some("bogus"),
            json!({ "school_id": "anything" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn enrollment_route_creates_and_conflicts() {
    let harness = harness();
    let (school, _) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);
    harness
        .identity
        .register_token("student-token", student.id.clone());

    let app = router(&harness);
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/enrollments",
            Some("student-token"),
            json!({ "school_id": school.id.0 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("amount").and_then(Value::as_f64), Some(25000.0));
    assert_eq!(
        payload.get("status").and_then(Value::as_str),
        Some("pending_payment")
    );

    let response = app
        .oneshot(post_json(
            "/api/v1/enrollments",
            Some("student-token"),
            json!({ "school_id": school.id.0 }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn payment_route_reports_the_new_state() {
    let harness = harness();
    let (school, _) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);
    harness
        .identity
        .register_token("student-token", student.id.clone());

    let enrollment = harness
        .enrollments
        .enroll(&student, &school.id)
        .expect("enrollment succeeds");

    let app = router(&harness);
    let response = app
        .oneshot(post_json(
            &format!("/api/v1/enrollments/{}/payment", enrollment.id.0),
            Some("student-token"),
            json!({}),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload.get("payment_status").and_then(Value::as_str),
        Some("completed")
    );
    assert_eq!(
        payload.get("status").and_then(Value::as_str),
        Some("pending_documents")
    );
}

#[tokio::test]
async fn approval_route_maps_incomplete_documents_to_bad_request() {
    let harness = harness();
    let (school, manager) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);
    harness
        .identity
        .register_token("manager-token", manager.id.clone());

    let enrollment = harness
        .enrollments
        .enroll(&student, &school.id)
        .expect("enrollment succeeds");

    let app = router(&harness);
    let response = app
        .oneshot(post_json(
            &format!("/api/v1/enrollments/{}/approve", enrollment.id.0),
            Some("manager-token"),
            json!({}),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert!(payload
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .contains("documents"));
}

#[tokio::test]
async fn locked_course_sessions_map_to_bad_request() {
    let harness = harness();
    let (school, manager) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);
    harness
        .identity
        .register_token("manager-token", manager.id.clone());

    let enrollment = harness.approved_enrollment(&student, &manager, &school.id);
    let park = harness.curriculum_of(&enrollment)[1].clone();

    let app = router(&harness);
    let response = app
        .oneshot(post_json(
            &format!("/api/v1/courses/{}/sessions", park.id.0),
            Some("manager-token"),
            json!({}),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn exam_route_returns_the_outcome() {
    let harness = harness();
    let (school, manager) = harness.seed_school("manager@example.com", 25000.0);
    let student = harness.seed_account("student@example.com", UserRole::Student);
    harness
        .identity
        .register_token("student-token", student.id.clone());

    let enrollment = harness.approved_enrollment(&student, &manager, &school.id);
    let theory = harness.curriculum_of(&enrollment)[0].clone();
    harness.finish_course_sessions(&manager, &theory);

    let app = router(&harness);
    let response = app
        .oneshot(post_json(
            &format!("/api/v1/courses/{}/exam", theory.id.0),
            Some("student-token"),
            json!({ "score": 85.0 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("passed").and_then(Value::as_bool), Some(true));
    assert_eq!(
        payload.get("license_earned").and_then(Value::as_bool),
        Some(false)
    );
}

#[tokio::test]
async fn document_upload_route_stores_and_lists() {
    let harness = harness();
    let student = harness.seed_account("student@example.com", UserRole::Student);
    harness
        .identity
        .register_token("student-token", student.id.clone());

    let app = router(&harness);
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/documents",
            Some("student-token"),
            json!({
                "kind": DocumentKind::IdCard.label(),
                "file_name": "id.png",
                "content_type": "image/png",
                "content": [1, 2, 3],
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(get_authed("/api/v1/documents", "student-token"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn schools_route_is_browsable_without_credentials() {
    let harness = harness();
    harness.seed_school("manager@example.com", 25000.0);

    let app = router(&harness);
    let response = app
        .oneshot(
            Request::get("/api/v1/schools")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("total").and_then(Value::as_u64), Some(1));
}

#[tokio::test]
async fn promoted_guests_see_their_new_role_on_the_next_request() {
    let harness = harness();
    let guest = harness.seed_account("guest@example.com", UserRole::Guest);
    harness
        .identity
        .register_token("guest-token", guest.id.clone());

    let app = router(&harness);
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/schools",
            Some("guest-token"),
            json!({
                "name": "Auto Ecole El Bahdja",
                "address": "12 Rue Didouche Mourad",
                "state": "Alger",
                "phone": "+213 555 010 203",
                "email": "contact@elbahdja.example",
                "description": "City driving school",
                "price": 25000.0,
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);

    // The same token now resolves to a manager, so the dashboard opens.
    let response = app
        .oneshot(get_authed("/api/v1/dashboard/manager", "guest-token"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
}
