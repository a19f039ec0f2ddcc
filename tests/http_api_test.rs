//! REST surface integration tests
//!
//! Requests go through the same dispatcher the server uses, backed by the
//! in-memory store.

use std::sync::Arc;

use clap::Parser;
use http_body_util::BodyExt;
use hyper::{Method, StatusCode};
use serde_json::{json, Value};

use alianca::auth::{hash_password, Role};
use alianca::db::MemberDoc;
use alianca::network::{InMemoryMemberStore, MemberStore};
use alianca::routes::{dispatch, ApiRequest};
use alianca::{AppState, Args};

struct TestApp {
    state: AppState,
    store: Arc<InMemoryMemberStore>,
}

impl TestApp {
    fn new(dev_mode: bool) -> Self {
        let mut argv = vec![
            "alianca",
            "--jwt-secret",
            "integration-test-secret-of-enough-length",
        ];
        if dev_mode {
            argv.push("--dev-mode");
        }
        let args = Args::parse_from(argv);
        let jwt = args.jwt_validator().unwrap();
        let store = Arc::new(InMemoryMemberStore::new());
        let state = AppState::new(args, store.clone(), jwt);
        Self { state, store }
    }

    async fn member(&self, name: &str, role: Role, supervisor: Option<&str>) -> MemberDoc {
        let mut member = MemberDoc::new(
            name.into(),
            format!("{name}@alianca.com"),
            hash_password("password123").unwrap(),
            role,
        );
        member.supervisor_id = supervisor.map(str::to_string);
        self.store.insert_member(member).await.unwrap()
    }

    async fn send(&self, req: ApiRequest) -> (StatusCode, Value) {
        let response = dispatch(&self.state, req).await;
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .send(
                ApiRequest::new(Method::POST, "/api/auth/login")
                    .with_json(&json!({ "email": email, "password": "password123" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new(false);
    let (status, body) = app.send(ApiRequest::new(Method::GET, "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);
    assert_eq!(body["store"], "memory");
    assert_eq!(body["mode"], "production");
}

#[tokio::test]
async fn test_requests_without_token_are_unauthorized() {
    let app = TestApp::new(false);
    for path in ["/api/members", "/api/dashboard/stats", "/api/auth/me"] {
        let (status, body) = app.send(ApiRequest::new(Method::GET, path)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{path}");
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    let (status, _) = app
        .send(ApiRequest::new(Method::GET, "/api/members").with_token("garbage"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let app = TestApp::new(false);
    app.member("lider", Role::Leader, None).await;

    let (status, body) = app
        .send(
            ApiRequest::new(Method::POST, "/api/auth/login")
                .with_json(&json!({ "email": "lider@alianca.com", "password": "wrong-one" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, body) = app
        .send(
            ApiRequest::new(Method::POST, "/api/auth/login")
                .with_json(&json!({ "email": "nope", "password": "x" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_me_and_listing_are_scoped() {
    let app = TestApp::new(false);
    let pastor = app.member("pastor", Role::Pastor, None).await;
    let leader = app.member("lider", Role::Leader, Some(&pastor.id)).await;
    app.member("disc1", Role::Disciple, Some(&leader.id)).await;
    app.member("fora", Role::Disciple, None).await;

    let token = app.login("lider@alianca.com").await;

    let (status, me) = app
        .send(ApiRequest::new(Method::GET, "/api/auth/me").with_token(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], leader.id.as_str());
    assert_eq!(me["supervisor"]["id"], pastor.id.as_str());
    assert_eq!(me["disciples"].as_array().unwrap().len(), 1);
    assert!(me.get("password_hash").is_none());

    let (status, list) = app
        .send(ApiRequest::new(Method::GET, "/api/members").with_token(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 2);
    let names: Vec<&str> = list["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["disc1", "lider"]);

    let (status, list) = app
        .send(
            ApiRequest::new(Method::GET, "/api/members")
                .with_token(&token)
                .with_query("role=DISCIPULO"),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);
}

#[tokio::test]
async fn test_out_of_scope_get_is_forbidden_and_missing_is_not_found() {
    let app = TestApp::new(false);
    app.member("lider", Role::Leader, None).await;
    let stranger = app.member("fora", Role::Disciple, None).await;

    let token = app.login("lider@alianca.com").await;

    let (status, body) = app
        .send(ApiRequest::new(Method::GET, format!("/api/members/{}", stranger.id)).with_token(&token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = app
        .send(ApiRequest::new(Method::GET, "/api/members/does-not-exist").with_token(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_create_promote_and_history() {
    let app = TestApp::new(false);
    app.member("pastor", Role::Pastor, None).await;
    let token = app.login("pastor@alianca.com").await;

    let (status, created) = app
        .send(
            ApiRequest::new(Method::POST, "/api/members")
                .with_token(&token)
                .with_json(&json!({
                    "name": "Nova Discipula",
                    "email": "nova@alianca.com",
                    "password": "password123",
                    "gender": "F",
                    "birth_date": "1995-04-02",
                    "baptized": true
                })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["role"], "DISCIPULO");
    assert_eq!(created["milestones"]["baptized"], true);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, duplicate) = app
        .send(
            ApiRequest::new(Method::POST, "/api/members")
                .with_token(&token)
                .with_json(&json!({
                    "name": "Outra Pessoa",
                    "email": "NOVA@alianca.com",
                    "password": "password123",
                    "gender": "F"
                })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(duplicate["code"], "CONFLICT");

    let (status, promoted) = app
        .send(
            ApiRequest::new(Method::PATCH, format!("/api/members/{id}/promote"))
                .with_token(&token)
                .with_json(&json!({ "new_role": "DISCIPULADOR" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["role"], "DISCIPULADOR");

    let (status, history) = app
        .send(ApiRequest::new(Method::GET, format!("/api/members/{id}/promotions")).with_token(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["previous_role"], "DISCIPULO");
    assert_eq!(history[0]["reason"], "Promoted to DISCIPULADOR");

    let (status, _) = app
        .send(
            ApiRequest::new(Method::PATCH, format!("/api/members/{id}/promote"))
                .with_token(&token)
                .with_json(&json!({ "new_role": "PASTOR" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delete_then_token_stops_working() {
    let app = TestApp::new(false);
    let admin = app.member("admin", Role::Admin, None).await;
    let disciple = app.member("disc1", Role::Disciple, Some(&admin.id)).await;

    let admin_token = app.login("admin@alianca.com").await;
    let disciple_token = app.login("disc1@alianca.com").await;

    let (status, body) = app
        .send(
            ApiRequest::new(Method::DELETE, format!("/api/members/{}", disciple.id))
                .with_token(&admin_token),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app
        .send(ApiRequest::new(Method::GET, "/api/auth/me").with_token(&disciple_token))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_dashboard_stats_and_hierarchy() {
    let app = TestApp::new(false);
    let leader = app.member("lider", Role::Leader, None).await;
    app.member("disc1", Role::Disciple, Some(&leader.id)).await;
    app.member("disc2", Role::Disciple, Some(&leader.id)).await;
    let token = app.login("lider@alianca.com").await;

    let (status, stats) = app
        .send(ApiRequest::new(Method::GET, "/api/dashboard/stats").with_token(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totals"]["disciples"], 3);
    assert_eq!(stats["totals"]["direct_reports"], 2);
    assert_eq!(stats["totals"]["cell"], 3);
    assert_eq!(stats["demographics"]["age_bands"]["0-12"], 3);

    let (status, body) = app
        .send(
            ApiRequest::new(Method::GET, "/api/dashboard/stats")
                .with_token(&token)
                .with_query("min_age=40&max_age=20"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let (status, hierarchy) = app
        .send(ApiRequest::new(Method::GET, "/api/dashboard/hierarchy").with_token(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hierarchy["member"]["id"], leader.id.as_str());
    assert_eq!(hierarchy["direct_reports"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_password_change_over_http() {
    let app = TestApp::new(false);
    let leader = app.member("lider", Role::Leader, None).await;
    let token = app.login("lider@alianca.com").await;

    let (status, body) = app
        .send(
            ApiRequest::new(Method::PATCH, format!("/api/members/{}/password", leader.id))
                .with_token(&token)
                .with_json(&json!({ "current_password": "not-the-one", "new_password": "another-secret" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, body) = app
        .send(
            ApiRequest::new(Method::PATCH, format!("/api/members/{}/password", leader.id))
                .with_token(&token)
                .with_json(&json!({ "current_password": "password123", "new_password": "another-secret" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Password updated");
}

#[tokio::test]
async fn test_unknown_routes_and_methods() {
    let app = TestApp::new(false);
    app.member("lider", Role::Leader, None).await;
    let token = app.login("lider@alianca.com").await;

    let (status, _) = app
        .send(ApiRequest::new(Method::GET, "/api/unknown").with_token(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(ApiRequest::new(Method::PUT, "/api/members").with_token(&token))
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["code"], "METHOD_NOT_ALLOWED");

    let (status, body) = app
        .send(ApiRequest::new(Method::POST, "/api/members").with_token(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}
