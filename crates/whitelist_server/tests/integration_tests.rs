use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use access_policy::{AccessLevel, AppealPolicy};
use async_trait::async_trait;
use chrono::Utc;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use whitelist_server::auth::issue_token;
use whitelist_server::mail::{MailError, Mailer, OutgoingMail};
use whitelist_server::store::{servers, verifications, NewServer, Store};
use whitelist_server::{create_admin, PortalConfig, PortalServer};

const SECRET: &str = "integration-secret";

/// Keeps every message instead of sending it.
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingMailer {
    fn last_token(&self) -> String {
        let sent = self.sent.lock().unwrap();
        let html = &sent.last().expect("a mail was sent").html;
        let start = html.find("token=").expect("mail carries a token") + "token=".len();
        html[start..start + 64].to_string()
    }

    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }

    fn is_preview(&self) -> bool {
        true
    }
}

struct TestApp {
    router: Router,
    store: Store,
    mailer: Arc<RecordingMailer>,
    admin_token: String,
    _dir: TempDir,
}

fn server(id: &str, level: AccessLevel, policy: AppealPolicy) -> NewServer {
    NewServer {
        id: id.to_string(),
        name: format!("{id} server"),
        description: "A test server".to_string(),
        ip: "127.0.0.1:1".to_string(),
        access_level: level,
        required_email_domain: (level == AccessLevel::Student).then(|| "@student.uu.se".to_string()),
        contact: None,
        rules: vec!["Be nice".to_string()],
        appeal_policy: policy,
    }
}

fn app_with(members: Option<&str>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let csv: PathBuf = dir.path().join("members.csv");
    if let Some(content) = members {
        std::fs::write(&csv, content).unwrap();
    }

    let mut config = PortalConfig::default();
    config.auth.jwt_secret = SECRET.to_string();
    config.membership.csv_paths = vec![csv];
    config.status.timeout = Duration::from_millis(200);

    let store = Store::open_in_memory().unwrap();
    store
        .call_blocking(|conn| {
            servers::create(conn, &server("open", AccessLevel::Open, AppealPolicy::Never))?;
            servers::create(conn, &server("uni", AccessLevel::Student, AppealPolicy::Never))?;
            servers::create(conn, &server("guild", AccessLevel::AppealOnly, AppealPolicy::Never))?;
            servers::create(conn, &server("club", AccessLevel::Member, AppealPolicy::NonMember))?;
            Ok(())
        })
        .unwrap();

    let mailer = Arc::new(RecordingMailer::default());
    let portal = PortalServer::with_parts(config, store.clone(), mailer.clone()).unwrap();
    let admin_token = issue_token(SECRET, "admin-1", Duration::from_secs(600)).unwrap();

    TestApp {
        router: portal.router(),
        store,
        mailer,
        admin_token,
        _dir: dir,
    }
}

fn app() -> TestApp {
    app_with(None)
}

async fn call(
    app: &TestApp,
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get(app: &TestApp, uri: &str) -> (StatusCode, Value) {
    call(app, Method::GET, uri, None, None).await
}

async fn post(app: &TestApp, uri: &str, body: Value) -> (StatusCode, Value) {
    call(app, Method::POST, uri, Some(body), None).await
}

/// Registers, follows the magic link and accepts the rules.
async fn whitelist(app: &TestApp, email: &str, name: &str, server_id: &str) -> String {
    let (status, body) = post(
        app,
        "/api/auth/register",
        json!({ "email": email, "minecraftName": name, "serverId": server_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let user_id = body["userId"].as_str().unwrap().to_string();

    let token = app.mailer.last_token();
    let (status, _) = get(app, &format!("/api/auth/verify?token={token}")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        app,
        &format!("/api/servers/{server_id}/accept-rules"),
        json!({ "userId": user_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    user_id
}

async fn verify_by_otp(app: &TestApp, email: &str) {
    let (status, body) = post(app, "/api/otp/send", json!({ "email": email })).await;
    assert_eq!(status, StatusCode::OK);
    let code = body["previewCode"].as_str().unwrap().to_string();

    let (status, _) = post(app, "/api/otp/verify", json!({ "email": email, "code": code })).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn root_and_health() {
    let app = app();

    let (status, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");
    assert_eq!(body["message"], "Minecraft Server Whitelist API");

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["servers"], 4);
}

#[tokio::test]
async fn registration_to_whitelist() {
    let app = app();

    let (_, body) = get(&app, "/api/check-user?username=Steve&serverId=open").await;
    assert_eq!(body["allowed"], false);

    let user_id = whitelist(&app, "Steve@Example.org ", "Steve", "open").await;

    let (status, body) = get(&app, "/api/check-user?username=Steve&serverId=open").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);
    assert_eq!(body["serverId"], "open");

    let (_, body) = get(&app, &format!("/api/servers/open/check-access/{user_id}")).await;
    assert_eq!(body["hasAccess"], true);

    let (_, body) = get(&app, &format!("/api/user/profile/{user_id}")).await;
    assert_eq!(body["email"], "steve@example.org");
    assert_eq!(body["serverAccess"].as_array().unwrap().len(), 1);

    // Not whitelisted on another server.
    let (_, body) = get(&app, "/api/public/check-whitelist/uni?username=Steve").await;
    assert_eq!(body["allowed"], false);
}

#[tokio::test]
async fn registration_validates_input() {
    let app = app();

    let (status, body) = post(&app, "/api/auth/register", json!({ "email": "a@b.se" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email, Minecraft name, and server ID are required");

    let (status, body) = post(
        &app,
        "/api/auth/register",
        json!({ "email": "a@b.se", "minecraftName": "A", "serverId": "nope" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Server not found");

    let (status, body) = post(
        &app,
        "/api/auth/register",
        json!({ "email": "alex@gmail.com", "minecraftName": "Alex", "serverId": "uni" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("@student.uu.se"));
    assert_eq!(app.mailer.count(), 0);
}

#[tokio::test]
async fn taken_minecraft_name_is_rejected() {
    let app = app();
    whitelist(&app, "first@example.org", "Notch", "open").await;

    let (status, body) = post(
        &app,
        "/api/auth/register",
        json!({ "email": "second@example.org", "minecraftName": "Notch", "serverId": "open" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Minecraft name already registered by another user");
}

#[tokio::test]
async fn verify_rejects_unknown_token() {
    let app = app();
    let (status, body) = get(&app, "/api/auth/verify?token=deadbeef").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn student_server_requires_credential_to_accept_rules() {
    let app = app();

    let user_id = whitelist(&app, "kim@student.uu.se", "Kim", "uni").await;
    let (_, body) = get(&app, "/api/check-user?username=Kim&serverId=uni").await;
    assert_eq!(body["allowed"], true);

    // An account without the credential, created through email login.
    let (status, body) = post(&app, "/api/user/login", json!({ "email": "lee@gmail.com" })).await;
    assert_eq!(status, StatusCode::OK);
    let lee = body["userId"].as_str().unwrap().to_string();
    let token = app.mailer.last_token();
    get(&app, &format!("/api/auth/verify?token={token}")).await;

    let (status, _) = post(&app, "/api/servers/uni/accept-rules", json!({ "userId": lee })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post(
        &app,
        "/api/servers/uni/accept-rules",
        json!({ "userId": "missing" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User not found or not verified");
    assert_ne!(user_id, lee);
}

#[tokio::test]
async fn otp_codes() {
    let app = app();

    let (status, body) = post(&app, "/api/otp/send", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email is required");

    let (_, body) = post(&app, "/api/otp/send", json!({ "email": "Alex@Gmail.com" })).await;
    assert_eq!(body["message"], "Verification code sent");
    let code = body["previewCode"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 6);

    let (status, body) = post(
        &app,
        "/api/otp/verify",
        json!({ "email": "alex@gmail.com", "code": "000000" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid verification code");

    let (status, _) = post(
        &app,
        "/api/otp/verify",
        json!({ "email": " alex@gmail.com", "code": code }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn expired_otp_code_is_rejected() {
    let app = app();
    app.store
        .call_blocking(|conn| {
            verifications::create(
                conn,
                "alex@gmail.com",
                "123456",
                Utc::now() - chrono::Duration::minutes(1),
            )
        })
        .unwrap();

    let (status, body) = post(
        &app,
        "/api/otp/verify",
        json!({ "email": "alex@gmail.com", "code": "123456" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Verification code expired");

    // The expired code did not count as a verified email.
    let (status, body) = post(
        &app,
        "/api/appeals",
        json!({ "email": "alex@gmail.com", "minecraftName": "Alex", "serverId": "guild" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email not verified");
}

#[tokio::test]
async fn appeal_requires_verified_email() {
    let app = app();
    let (status, body) = post(
        &app,
        "/api/appeals",
        json!({ "email": "alex@gmail.com", "minecraftName": "Alex", "serverId": "guild" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email not verified");
}

#[tokio::test]
async fn qualifying_appeal_is_granted_immediately() {
    let app = app();
    verify_by_otp(&app, "alex@gmail.com").await;

    let (status, body) = post(
        &app,
        "/api/appeals",
        json!({ "email": "alex@gmail.com", "minecraftName": "Alex", "serverId": "open" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "You now have access to this server!");
    assert_eq!(body["appeal"]["status"], "approved");

    let (_, body) = get(&app, "/api/public/check-whitelist/open?username=Alex").await;
    assert_eq!(body["allowed"], true);
}

#[tokio::test]
async fn reviewed_appeal_grants_access_once_approved() {
    let app = app();
    create_admin(&app.store, "op", Some("op@example.org"), "hunter2").unwrap();
    verify_by_otp(&app, "alex@gmail.com").await;
    let mails_before = app.mailer.count();

    let (status, body) = post(
        &app,
        "/api/appeals",
        json!({
            "email": "alex@gmail.com",
            "minecraftName": "Alex",
            "realName": "Alex A",
            "note": "Friend of Steve",
            "serverId": "guild"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Request submitted for review.");
    assert_eq!(app.mailer.count(), mails_before + 1);
    let appeal_id = body["appeal"]["id"].as_str().unwrap().to_string();

    let (_, body) = get(&app, "/api/check-user?username=Alex&serverId=guild").await;
    assert_eq!(body["allowed"], false);

    let (status, body) = call(&app, Method::GET, "/api/appeals", None, Some(&app.admin_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], appeal_id.as_str());
    assert_eq!(body[0]["server"]["name"], "guild server");

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/appeals/{appeal_id}/approve"),
        None,
        Some(&app.admin_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appeal"]["status"], "approved");

    let (_, body) = get(&app, "/api/check-user?username=Alex&serverId=guild").await;
    assert_eq!(body["allowed"], true);
    assert_eq!(body["realName"], "Alex A");

    // A decided appeal stays decided and the player keeps access.
    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/appeals/{appeal_id}/reject"),
        None,
        Some(&app.admin_token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Appeal already approved");

    let (_, body) = get(&app, "/api/check-user?username=Alex&serverId=guild").await;
    assert_eq!(body["allowed"], true);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/appeals/unknown/reject",
        None,
        Some(&app.admin_token),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_need_a_token() {
    let app = app();

    let (status, body) = get(&app, "/api/appeals").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No token provided");

    let (status, body) = call(&app, Method::GET, "/api/appeals", None, Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn admin_login() {
    let app = app();
    create_admin(&app.store, "op", Some("op@example.org"), "hunter2").unwrap();

    let (status, body) = post(
        &app,
        "/api/admin/login",
        json!({ "identifier": "OP@example.org", "password": "hunter2" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "op");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _) = call(&app, Method::GET, "/api/admin/access-requests", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        &app,
        "/api/admin/login",
        json!({ "username": "op", "password": "wrong" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn upgrade_request_flow() {
    let app = app();
    let user_id = whitelist(&app, "sam@gmail.com", "Sam", "open").await;

    let (status, body) = post(
        &app,
        "/api/upgrade/request",
        json!({
            "userId": user_id,
            "requestedLevel": "student",
            "email": "sam@student.uu.se",
            "realName": "Sam S"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let request_id = body["requestId"].as_str().unwrap().to_string();

    // Unverified requests are not listed.
    let (_, body) = call(&app, Method::GET, "/api/admin/access-requests", None, Some(&app.admin_token)).await;
    assert!(body.as_array().unwrap().is_empty());

    let token = app.mailer.last_token();
    let (status, _) = get(&app, &format!("/api/upgrade/verify?token={token}")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, Method::GET, "/api/admin/access-requests", None, Some(&app.admin_token)).await;
    assert_eq!(body[0]["id"], request_id.as_str());
    assert_eq!(body[0]["user"]["minecraftName"], "Sam");

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/admin/access-requests/{request_id}/approve"),
        None,
        Some(&app.admin_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The credential now lets Sam onto the student server.
    let (status, body) = post(&app, "/api/servers/uni/accept-rules", json!({ "userId": user_id })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn server_management() {
    let app = app();
    let admin = Some(app.admin_token.as_str());

    let (status, body) = call(&app, Method::POST, "/api/servers", Some(json!({ "id": "x" })), admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ID, name, description, and IP are required");

    let new = json!({
        "id": "creative",
        "name": "Creative",
        "description": "Build things",
        "ip": "creative.example.org",
        "accessLevel": "public"
    });
    let (status, body) = call(&app, Method::POST, "/api/servers", Some(new.clone()), admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accessLevel"], "open");
    assert_eq!(body["position"], 4);

    let (status, body) = call(&app, Method::POST, "/api/servers", Some(new), admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Server with this ID already exists");

    let (status, body) = call(
        &app,
        Method::PUT,
        "/api/servers/creative",
        Some(json!({ "name": "Creative Plus", "contact": "ops@example.org" })),
        admin,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Creative Plus");
    assert_eq!(body["description"], "Build things");

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/servers/reorder",
        Some(json!({ "order": ["creative", "guild"] })),
        admin,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body.as_array().unwrap().iter().map(|s| s["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["creative", "guild", "open", "uni", "club"]);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/servers/reorder",
        Some(json!({ "order": ["ghost"] })),
        admin,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::DELETE, "/api/servers/creative", None, admin).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(&app, "/api/servers/creative").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, Method::DELETE, "/api/servers/creative", None, admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::DELETE, "/api/servers/open", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn access_preview() {
    let app = app();

    let (status, body) = get(&app, "/api/servers/uni/access?email=kim@student.uu.se").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"]["result"], "granted");
    assert_eq!(body["studentEmail"], true);

    let (_, body) = get(&app, "/api/servers/uni/access?email=kim@gmail.com").await;
    assert_eq!(body["outcome"]["result"], "denied");
    assert!(body["message"].as_str().unwrap().contains("@student.uu.se"));

    let (_, body) = get(&app, "/api/servers/guild/access?email=kim@student.uu.se").await;
    assert_eq!(body["outcome"]["result"], "review");

    let (status, _) = get(&app, "/api/servers/uni/access").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_answers_without_waiting() {
    let app = app();
    let (status, body) = get(&app, "/api/servers/open/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pending"], true);
    assert_eq!(body["online"], Value::Null);
}

#[tokio::test]
async fn membership_servers() {
    let app = app_with(Some("name,email\nAda,Ada.Lovelace@Example.org\n"));

    let (status, body) = get(&app, "/api/membership/check?email=ada.lovelace@example.org").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["member"], true);

    let (_, body) = get(&app, "/api/orbi/check?email=bob@example.org").await;
    assert_eq!(body["member"], false);

    let (_, body) = get(&app, "/api/servers/club/access?email=bob@example.org").await;
    assert_eq!(body["outcome"]["result"], "review");

    let (status, body) = call(&app, Method::GET, "/api/membership/stats", None, Some(&app.admin_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = call(&app, Method::POST, "/api/membership/reload", None, Some(&app.admin_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Membership list reloaded");
}

#[tokio::test]
async fn first_membership_decision_loads_the_list() {
    let app = app_with(Some("Ada.Lovelace+mc@Example.org; bob@example.org\n"));

    // No lookup has happened yet, so the register handler triggers the load.
    let (status, body) = post(
        &app,
        "/api/auth/register",
        json!({ "email": "ada.lovelace@example.org", "minecraftName": "Ada", "serverId": "club" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Verification email sent");

    let (status, body) = call(&app, Method::GET, "/api/membership/stats", None, Some(&app.admin_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (_, body) = get(&app, "/api/servers/club/access?email=bob@example.org").await;
    assert_eq!(body["outcome"]["result"], "granted");
    assert_eq!(body["member"], true);
}

#[tokio::test]
async fn missing_membership_list_is_unavailable() {
    let app = app();

    let (status, body) = get(&app, "/api/membership/check?email=ada@example.org").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Membership list missing on server");

    let (status, _) = post(
        &app,
        "/api/auth/register",
        json!({ "email": "ada@example.org", "minecraftName": "Ada", "serverId": "club" }),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn plugin_endpoints() {
    let app = app();
    whitelist(&app, "steve@example.org", "Steve", "open").await;

    let (status, body) = get(&app, "/api/check-user?serverId=open").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "username is required");
    assert_eq!(body["allowed"], false);

    let (status, body) = get(&app, "/api/check-user?username=Steve").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["allowed"], false);

    let (status, body) = get(&app, "/api/check-user?username=Steve&serverId=ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["allowed"], false);

    let (status, body) = post(&app, "/api/public/get-names/open", json!({ "usernames": "Steve" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "usernames must be an array");

    let (status, body) = post(
        &app,
        "/api/public/get-names/open",
        json!({ "usernames": ["Steve", "Herobrine"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "Steve": "Steve" }));
}
