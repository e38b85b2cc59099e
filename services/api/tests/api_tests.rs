//! Integration tests for the review API.
//!
//! Each test builds the full router over a throwaway data directory and
//! drives it with `oneshot`, the same way a browser client would.

use api_lib::{
    adapters::{InMemoryUserStore, JsonFileSink},
    config::Config,
    web::{auth::hash_password, build_router, state::AppState},
};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use review_core::domain::Role;
use review_core::ports::UserService;
use review_core::store::ReviewStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

const BOUNDARY: &str = "review-test-boundary";

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    _dir: TempDir,
}

/// Test helper: full app over a fresh JSON snapshot directory
async fn setup_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: None,
        data_dir: dir.path().to_path_buf(),
        log_level: tracing::Level::INFO,
        session_expiry_hours: 24,
        auth_session_days: 30,
        frontend_url: "http://localhost:5173".to_string(),
        sweep_interval_secs: 300,
        admin: None,
    };

    let sink = Arc::new(JsonFileSink::new(dir.path()).await.unwrap());
    let store = ReviewStore::open(sink.clone(), Duration::hours(24), Utc::now())
        .await
        .unwrap();
    let users = InMemoryUserStore::open(sink).await.unwrap();

    let state = Arc::new(AppState {
        store: Arc::new(store),
        users: Arc::new(users),
        config: Arc::new(config),
    });
    TestApp {
        router: build_router(state.clone()),
        state,
        _dir: dir,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// Signs a reviewer up over HTTP and returns their session token.
    async fn signup(&self, email: &str, name: &str) -> (String, String) {
        let request = json_request(
            "POST",
            "/api/auth/signup",
            None,
            json!({ "email": email, "password": "correct horse", "display_name": name }),
        );
        let response = self.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let token = session_cookie(&response).expect("signup sets the session cookie");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        (token, body["user_id"].as_str().unwrap().to_string())
    }

    /// Creates an admin directly in the user store with a live auth session.
    async fn admin(&self) -> String {
        let hash = hash_password("admin password").unwrap();
        let admin = self
            .state
            .users
            .create_user_with_email("admin@example.com", &hash, "Admin", Role::Admin)
            .await
            .unwrap();
        let token = "admin-token".to_string();
        self.state
            .users
            .create_auth_session(&token, admin.user_id, Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        token
    }
}

fn session_cookie(response: &axum::response::Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .map(str::to_string)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("session={}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("X-Session-Token", token)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: multipart form with a `csv_file` part and an optional `plan` part
fn upload_request(uri: &str, token: &str, csv: &str, plan: Option<Value>) -> Request<Body> {
    let mut body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"csv_file\"; filename=\"batch.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n{csv}\r\n",
        b = BOUNDARY,
        csv = csv
    );
    if let Some(plan) = plan {
        body.push_str(&format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"plan\"\r\n\r\n{plan}\r\n",
            b = BOUNDARY,
            plan = plan
        ));
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, format!("session={}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

// =============================================================================
// Public Endpoints
// =============================================================================

#[tokio::test]
async fn health_needs_no_auth() {
    let app = setup_app().await;
    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn login_checks_the_password() {
    let app = setup_app().await;
    app.signup("ann@example.com", "Ann").await;

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "ANN@example.com", "password": "correct horse" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Ann");
    assert_eq!(body["role"], "reviewer");

    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "ann@example.com", "password": "wrong horse" }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_reject_missing_or_stale_tokens() {
    let app = setup_app().await;
    let request = Request::builder()
        .uri("/api/sessions")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (token, _) = app.signup("ann@example.com", "Ann").await;
    let (status, _) = app
        .send(json_request("POST", "/api/auth/logout", Some(&token), json!({})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send(get_request("/api/sessions", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Reviewer Workflow
// =============================================================================

#[tokio::test]
async fn self_upload_reports_duplicates_and_opens_a_session() {
    let app = setup_app().await;
    let (token, _) = app.signup("ann@example.com", "Ann").await;

    let csv = "title,link\n\
               A,http://a.pdf\n\
               B,http://b.pdf\n\
               A again,http://a.pdf\n\
               Blank,\n\
               C,http://c.pdf";
    let (status, body) = app
        .send(upload_request("/api/upload", &token, csv, None))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["total_rows"], 5);
    assert_eq!(body["empty_links_removed"], 1);
    assert_eq!(body["duplicates_removed"], 1);
    assert_eq!(body["global_duplicates_removed"], 0);
    assert_eq!(body["total_duplicates_removed"], 1);
    assert_eq!(body["new_links"], 3);
    assert_eq!(body["within_file_duplicates"][0]["first_index"], 0);
    assert_eq!(body["sessions"].as_array().unwrap().len(), 1);

    let (status, check) = app.send(get_request("/api/session-check", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["hasSession"], true);
    assert!(check["expires_at"].is_string());
}

#[tokio::test]
async fn second_upload_sees_global_duplicates_with_provenance() {
    let app = setup_app().await;
    let (ann, _) = app.signup("ann@example.com", "Ann").await;
    let (bob, _) = app.signup("bob@example.com", "Bob").await;

    app.send(upload_request("/api/upload", &ann, "link\nhttp://a.pdf\nhttp://b.pdf", None))
        .await;
    let (status, body) = app
        .send(upload_request("/api/upload", &bob, "link\nhttp://a.pdf\nhttp://d.pdf", None))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["global_duplicates_removed"], 1);
    assert_eq!(body["new_links"], 1);
    let duplicate = &body["global_duplicates"][0];
    assert_eq!(duplicate["link"], "http://a.pdf");
    assert_eq!(duplicate["provenance"]["first_uploaded_by"], "Ann");
}

#[tokio::test]
async fn reviewer_marks_rows_and_downloads_csv() {
    let app = setup_app().await;
    let (token, _) = app.signup("ann@example.com", "Ann").await;
    let (_, upload) = app
        .send(upload_request("/api/upload", &token, "link\nhttp://a.pdf\nhttp://b.pdf", None))
        .await;
    let session_id = upload["sessions"][0]["session_id"].as_str().unwrap().to_string();

    let (status, row) = app
        .send(json_request(
            "POST",
            &format!("/api/sessions/{}/status", session_id),
            Some(&token),
            json!({ "link": "http://a.pdf", "status": "rej", "feedback": "scan is blank" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(row["Status"], "Rejected");
    assert_eq!(row["Feedback"], "scan is blank");

    let (status, _) = app
        .send(json_request(
            "POST",
            &format!("/api/sessions/{}/status", session_id),
            Some(&token),
            json!({ "link": "http://a.pdf", "status": "maybe" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, rows) = app
        .send(get_request(
            &format!("/api/sessions/{}/rows?verifier=ann", session_id),
            &token,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows["total"], 2);
    assert_eq!(rows["data"][0]["Verified By"], "Ann");

    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/api/sessions/{}/download", session_id), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("link,Status,Feedback,Verified By\n"));
    assert!(text.contains("http://a.pdf,Rejected,scan is blank,Ann"));
}

#[tokio::test]
async fn other_reviewers_cannot_read_a_session() {
    let app = setup_app().await;
    let (ann, _) = app.signup("ann@example.com", "Ann").await;
    let (bob, _) = app.signup("bob@example.com", "Bob").await;
    let (_, upload) = app
        .send(upload_request("/api/upload", &ann, "link\nhttp://a.pdf", None))
        .await;
    let session_id = upload["sessions"][0]["session_id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(get_request(&format!("/api/sessions/{}/rows", session_id), &bob))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// =============================================================================
// Admin Workflow
// =============================================================================

#[tokio::test]
async fn reviewers_are_kept_out_of_admin_routes() {
    let app = setup_app().await;
    let (token, _) = app.signup("ann@example.com", "Ann").await;

    let (status, _) = app.send(get_request("/api/admin/progress", &token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_splits_by_percentage_and_blocks_reassignment() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let (_, ann_id) = app.signup("ann@example.com", "Ann").await;
    let (_, bob_id) = app.signup("bob@example.com", "Bob").await;

    let (status, users) = app.send(get_request("/api/admin/users", &admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);

    let plan = json!({
        "mode": "percentage",
        "shares": [
            { "user_id": ann_id, "percentage": 50.0 },
            { "user_id": bob_id, "percentage": 50.0 }
        ]
    });
    let csv = "link\nhttp://1.pdf\nhttp://2.pdf\nhttp://3.pdf\nhttp://4.pdf";
    let (status, body) = app
        .send(upload_request(
            "/api/admin/upload-assign",
            &admin,
            csv,
            Some(plan.clone()),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let sessions = body["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0]["assigned_range"]["start"], 1);
    assert_eq!(sessions[0]["assigned_range"]["end"], 2);
    assert_eq!(sessions[1]["assigned_range"]["start"], 3);
    assert_eq!(body["unassigned"], 0);

    let (status, conflict) = app
        .send(upload_request(
            "/api/admin/upload-assign",
            &admin,
            "link\nhttp://5.pdf",
            Some(plan),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(conflict["conflicts"], json!(["Ann", "Bob"]));

    let (status, progress) = app.send(get_request("/api/admin/progress", &admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["live_sessions"], 2);
    assert_eq!(progress["overall"]["pending"], 4);

    // The rejected batch registered nothing.
    let (_, registry) = app.send(get_request("/api/admin/registry?limit=2", &admin)).await;
    assert_eq!(registry["total_links"], 4);
    assert_eq!(registry["recent"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn out_of_bounds_range_rejects_the_whole_upload() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let (_, ann_id) = app.signup("ann@example.com", "Ann").await;

    let plan = json!({
        "mode": "range",
        "shares": [{ "user_id": ann_id, "start_range": 1, "end_range": 5 }]
    });
    let (status, body) = app
        .send(upload_request(
            "/api/admin/upload-assign",
            &admin,
            "link\nhttp://1.pdf\nhttp://2.pdf",
            Some(plan),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (_, registry) = app.send(get_request("/api/admin/registry", &admin)).await;
    assert_eq!(registry["total_links"], 0);
}

#[tokio::test]
async fn conflicting_plan_is_refused_before_the_csv_is_read() {
    let app = setup_app().await;
    let admin = app.admin().await;
    let (_, ann_id) = app.signup("ann@example.com", "Ann").await;

    let plan = json!({
        "mode": "range",
        "shares": [{ "user_id": ann_id, "start_range": 1, "end_range": 1 }]
    });
    let (status, _) = app
        .send(upload_request(
            "/api/admin/upload-assign",
            &admin,
            "link\nhttp://1.pdf",
            Some(plan.clone()),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // No link column: this batch would be a 400 on its own.
    let (status, body) = app
        .send(upload_request(
            "/api/admin/upload-assign",
            &admin,
            "title,author\nx,y",
            Some(plan),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["conflicts"], json!(["Ann"]));
}
