use super::common::*;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::portal::router;
use crate::portal::store::MemoryStore;

async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.expect("route executes")
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("serialize")))
        .expect("request builds")
}

fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request builds")
}

async fn register(router: &Router, path: &str, body: Value) -> String {
    let response = send(router, json_request(Method::POST, path, None, body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    payload
        .get("token")
        .and_then(Value::as_str)
        .expect("token issued")
        .to_string()
}

async fn register_student(router: &Router, email: &str) -> String {
    register(
        router,
        "/api/v1/auth/students",
        json!({
            "email": email,
            "password": PASSWORD,
            "name": "Asha",
            "skills": ["Go", "SQL"],
        }),
    )
    .await
}

async fn register_recruiter(router: &Router, email: &str) -> String {
    register(
        router,
        "/api/v1/auth/recruiters",
        json!({
            "email": email,
            "password": PASSWORD,
            "name": "Ravi Menon",
            "company": "Acme",
        }),
    )
    .await
}

async fn post_job(router: &Router, token: &str) -> i64 {
    let response = send(
        router,
        json_request(
            Method::POST,
            "/api/v1/jobs",
            Some(token),
            json!({
                "title": "Backend Engineer",
                "description": "Build placement services",
                "location": "Pune",
                "interview_date": "2026-11-20",
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("company").and_then(Value::as_str), Some("Acme"));
    assert_eq!(payload.get("status").and_then(Value::as_str), Some("open"));
    payload.get("id").and_then(Value::as_i64).expect("job id")
}

#[tokio::test]
async fn register_handler_returns_internal_error_on_store_failure() {
    let harness = build_service_with(
        Arc::new(UnavailableStore),
        Arc::new(RecordingNotifier::default()),
    );

    let response = router::register_student::<UnavailableStore, RecordingNotifier>(
        State(harness.service.clone()),
        axum::Json(student_registration("asha@campus.edu", "Asha")),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = read_json_body(response).await;
    assert!(payload.get("error").is_some());
}

#[tokio::test]
async fn register_handler_returns_conflict_on_duplicate_email() {
    let harness = build_service();
    let first = router::register_recruiter::<MemoryStore, RecordingNotifier>(
        State(harness.service.clone()),
        axum::Json(recruiter_registration("hr@acme.io", "Acme")),
    )
    .await
    .into_response();
    assert_eq!(first.status(), StatusCode::CREATED);

    let response = router::register_student::<MemoryStore, RecordingNotifier>(
        State(harness.service.clone()),
        axum::Json(student_registration("HR@acme.io", "Asha")),
    )
    .await
    .into_response();
    assert_conflict_response(response);
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let harness = build_service();
    let router = router_with(&harness);

    let response = send(&router, empty_request(Method::GET, "/api/v1/students/me", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &router,
        empty_request(Method::GET, "/api/v1/students/me", Some("not-a-token")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = register_student(&router, "asha@campus.edu").await;
    let response = send(
        &router,
        empty_request(Method::GET, "/api/v1/students/me", Some(&token)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload.get("email").and_then(Value::as_str),
        Some("asha@campus.edu")
    );
    assert!(payload.get("credential").is_none());

    let response = send(
        &router,
        empty_request(Method::GET, "/api/v1/recruiters/me", Some(&token)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn application_lifecycle_maps_to_http_statuses() {
    let harness = build_service();
    let router = router_with(&harness);
    let recruiter = register_recruiter(&router, "hr@acme.io").await;
    let student = register_student(&router, "asha@campus.edu").await;
    let job_id = post_job(&router, &recruiter).await;

    let response = send(&router, empty_request(Method::GET, "/api/v1/jobs", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let jobs = read_json_body(response).await;
    assert_eq!(jobs.as_array().map(Vec::len), Some(1));

    let apply_uri = format!("/api/v1/jobs/{job_id}/applications");
    let response = send(
        &router,
        json_request(
            Method::POST,
            &apply_uri,
            Some(&student),
            json!({ "cover_note": "Keen to join" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let application = read_json_body(response).await;
    let application_id = application
        .get("id")
        .and_then(Value::as_i64)
        .expect("application id");
    assert_eq!(
        application.get("status").and_then(Value::as_str),
        Some("submitted")
    );

    let response = send(
        &router,
        json_request(Method::POST, &apply_uri, Some(&student), json!({})),
    )
    .await;
    assert_conflict_response(response);

    let response = send(
        &router,
        empty_request(Method::GET, &apply_uri, Some(&recruiter)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let applicants = read_json_body(response).await;
    assert_eq!(
        applicants[0]["student"]["email"].as_str(),
        Some("asha@campus.edu")
    );

    let review_uri = format!("/api/v1/applications/{application_id}/review");
    let response = send(
        &router,
        empty_request(Method::POST, &review_uri, Some(&recruiter)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(
        &router,
        empty_request(Method::POST, &review_uri, Some(&recruiter)),
    )
    .await;
    assert_conflict_response(response);

    let response = send(
        &router,
        empty_request(Method::POST, &format!("/api/v1/jobs/{job_id}/close"), Some(&recruiter)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let other = register_student(&router, "ben@campus.edu").await;
    let response = send(
        &router,
        json_request(Method::POST, &apply_uri, Some(&other), json!({})),
    )
    .await;
    assert_conflict_response(response);

    let response = send(
        &router,
        empty_request(Method::DELETE, &format!("/api/v1/jobs/{job_id}"), Some(&recruiter)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = send(
        &router,
        empty_request(Method::GET, &format!("/api/v1/jobs/{job_id}"), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_forms_are_unprocessable() {
    let harness = build_service();
    let router = router_with(&harness);

    let response = send(
        &router,
        json_request(
            Method::POST,
            "/api/v1/auth/students",
            None,
            json!({
                "email": "not-an-email",
                "password": PASSWORD,
                "name": "Asha",
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .map(|message| message.starts_with("email"))
        .unwrap_or(false));

    let recruiter = register_recruiter(&router, "hr@acme.io").await;
    let response = send(
        &router,
        json_request(
            Method::POST,
            "/api/v1/jobs",
            Some(&recruiter),
            json!({ "title": "Intern", "description": "", "location": "Pune" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn login_and_oauth_routes_issue_sessions() {
    let harness = build_service();
    let router = router_with(&harness);
    register_student(&router, "asha@campus.edu").await;

    let response = send(
        &router,
        json_request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            json!({ "email": "asha@campus.edu", "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["principal"]["role"].as_str(), Some("student"));

    let response = send(
        &router,
        json_request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            json!({ "email": "asha@campus.edu", "password": "wrong password" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let callback = json!({
        "provider": "github",
        "profile": { "id": 4242, "login": "ben", "email": "ben@campus.edu", "name": null },
    });
    let response = send(
        &router,
        json_request(Method::POST, "/api/v1/auth/oauth/callback", None, callback.clone()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let first = read_json_body(response).await;
    let response = send(
        &router,
        json_request(Method::POST, "/api/v1/auth/oauth/callback", None, callback),
    )
    .await;
    let second = read_json_body(response).await;
    assert_eq!(first["principal"], second["principal"]);

    let response = send(
        &router,
        json_request(
            Method::POST,
            "/api/v1/auth/oauth/callback",
            None,
            json!({
                "provider": "github",
                "profile": { "id": 7, "login": "asha", "email": "asha@campus.edu" },
            }),
        ),
    )
    .await;
    assert_conflict_response(response);
}

#[tokio::test]
async fn export_route_returns_a_pdf_attachment() {
    let harness = build_service();
    let router = router_with(&harness);
    let student = register_student(&router, "asha@campus.edu").await;
    let capability = harness
        .service
        .authenticate(&student)
        .expect("session verifies");
    let student_id = capability.student().expect("student capability");

    let response = send(
        &router,
        empty_request(
            Method::GET,
            &format!("/api/v1/students/{student_id}/export"),
            Some(&student),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("application/pdf")
    );
    assert!(response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains(".pdf"))
        .unwrap_or(false));
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    assert!(bytes.starts_with(b"%PDF-"));

    let response = send(
        &router,
        empty_request(Method::GET, "/api/v1/students/9999/export", Some(&student)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn resume_upload_round_trips_through_the_api() {
    let harness = build_service();
    let router = router_with(&harness);
    let student = register_student(&router, "asha@campus.edu").await;

    let response = send(
        &router,
        Request::builder()
            .method(Method::PUT)
            .uri("/api/v1/students/me/resume?filename=cv.txt")
            .header(header::AUTHORIZATION, format!("Bearer {student}"))
            .body(Body::from("Asha - Go, SQL"))
            .expect("request builds"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let view = read_json_body(response).await;
    assert!(view["profile"]["resume"]
        .as_str()
        .map(|key| key.ends_with("_cv.txt"))
        .unwrap_or(false));

    let response = send(
        &router,
        empty_request(Method::GET, "/api/v1/students/me/resume", Some(&student)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    assert_eq!(&bytes[..], b"Asha - Go, SQL");
}
