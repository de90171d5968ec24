//! End-to-end tests for the credential and session-token lifecycle.
//!
//! Each test gets a throwaway database and a wiremock stand-in for the media
//! host. They are ignored by default because they need a running Postgres;
//! run them with `cargo test -- --ignored`.

use std::net::TcpListener;

use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vidtube::configuration::{get_configuration, DatabaseSettings, MediaSettings};
use vidtube::media::MediaClient;
use vidtube::startup::run;

pub struct TestApp {
    pub address: String,
    pub db_pool: PgPool,
    pub media_server: MockServer,
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    let connection_pool = configure_database(&configuration.database).await;

    let media_server = MockServer::start().await;
    // The body must be built per-request so each upload yields a fresh URL,
    // like a real media host would.
    let media_base = media_server.uri();
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(move |_: &wiremock::Request| {
            ResponseTemplate::new(200).set_body_json(json!({
                "url": format!("{}/assets/{}.png", media_base, uuid::Uuid::new_v4()),
                "publicId": uuid::Uuid::new_v4().to_string(),
                "duration": null,
            }))
        })
        .mount(&media_server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&media_server)
        .await;

    let media_settings = MediaSettings {
        base_url: media_server.uri(),
        api_key: "test-media-key".to_string(),
        timeout_seconds: 5,
        temp_dir: std::env::temp_dir()
            .join("vidtube-tests")
            .to_string_lossy()
            .to_string(),
    };
    let media_client = MediaClient::new(
        media_settings.base_url.clone(),
        media_settings.api_key.clone(),
        reqwest::Client::new(),
    );

    let server = run(
        listener,
        connection_pool.clone(),
        configuration.jwt.clone(),
        media_client,
        media_settings,
    )
    .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool: connection_pool,
        media_server,
    }
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

fn registration_form(
    display_name: &str,
    username: &str,
    email: &str,
    password: &str,
) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new()
        .text("displayName", display_name.to_string())
        .text("email", email.to_string())
        .text("username", username.to_string())
        .text("password", password.to_string())
        .part(
            "avatar",
            reqwest::multipart::Part::bytes(vec![0x89, b'P', b'N', b'G']).file_name("avatar.png"),
        )
}

async fn register(app: &TestApp, username: &str, email: &str, password: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/api/v1/users/register", app.address))
        .multipart(registration_form("Test User", username, email, password))
        .send()
        .await
        .expect("Failed to execute request.")
}

async fn login(app: &TestApp, username: &str, password: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/api/v1/users/login", app.address))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Failed to execute request.")
}

async fn refresh(app: &TestApp, refresh_token: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/api/v1/users/refresh-token", app.address))
        .json(&json!({ "refreshToken": refresh_token }))
        .send()
        .await
        .expect("Failed to execute request.")
}

// --- Registration ---

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn register_returns_201_with_sanitized_user() {
    let app = spawn_app().await;

    let response = register(&app, "Alice_01", "alice@example.com", "p1").await;
    assert_eq!(201, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["username"], "alice_01"); // lowercased
    assert_eq!(body["data"]["email"], "alice@example.com");
    assert!(body["data"].get("passwordHash").is_none());
    assert!(body["data"].get("refreshToken").is_none());

    let row = sqlx::query_as::<_, (String,)>("SELECT username FROM users WHERE email = $1")
        .bind("alice@example.com")
        .fetch_one(&app.db_pool)
        .await
        .expect("Failed to fetch created user");
    assert_eq!(row.0, "alice_01");
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn register_duplicate_username_or_email_returns_409() {
    let app = spawn_app().await;

    assert_eq!(
        201,
        register(&app, "u1", "e1@example.com", "p1").await.status().as_u16()
    );
    // Same username, different email
    assert_eq!(
        409,
        register(&app, "u1", "e2@example.com", "p2").await.status().as_u16()
    );
    // Same email, different username
    assert_eq!(
        409,
        register(&app, "u2", "e1@example.com", "p2").await.status().as_u16()
    );
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn register_without_avatar_returns_400() {
    let app = spawn_app().await;

    let form = reqwest::multipart::Form::new()
        .text("displayName", "Test User")
        .text("email", "noavatar@example.com")
        .text("username", "noavatar")
        .text("password", "p1");

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/users/register", app.address))
        .multipart(form)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["success"], false);
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn register_with_blank_fields_returns_400() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/users/register", app.address))
        .multipart(registration_form("   ", "blankname", "blank@example.com", "p1"))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn failed_avatar_upload_returns_500_and_creates_no_user() {
    let app = spawn_app().await;
    app.media_server.reset().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&app.media_server)
        .await;

    let response = register(&app, "ghost", "ghost@example.com", "p1").await;
    assert_eq!(500, response.status().as_u16());

    let count = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM users")
        .fetch_one(&app.db_pool)
        .await
        .expect("Failed to count users");
    assert_eq!(count.0, 0);
}

// --- Login ---

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn login_succeeds_and_sets_cookies() {
    let app = spawn_app().await;
    register(&app, "alice", "alice@example.com", "p1").await;

    let response = login(&app, "alice", "p1").await;
    assert_eq!(200, response.status().as_u16());

    let cookies: Vec<_> = response.cookies().collect();
    assert!(cookies.iter().any(|c| c.name() == "accessToken"));
    assert!(cookies.iter().any(|c| c.name() == "refreshToken"));

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["data"]["accessToken"].is_string());
    assert!(body["data"]["refreshToken"].is_string());
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert!(body["data"]["user"].get("passwordHash").is_none());
    assert!(body["data"]["user"].get("refreshToken").is_none());
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn login_by_email_also_works() {
    let app = spawn_app().await;
    register(&app, "bob", "bob@example.com", "p1").await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/users/login", app.address))
        .json(&json!({ "email": "bob@example.com", "password": "p1" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn login_with_wrong_password_returns_401() {
    let app = spawn_app().await;
    register(&app, "alice", "alice@example.com", "p1").await;

    assert_eq!(401, login(&app, "alice", "wrong").await.status().as_u16());
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn login_with_unknown_user_returns_404() {
    let app = spawn_app().await;

    assert_eq!(404, login(&app, "nobody", "p1").await.status().as_u16());
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn login_without_identifier_returns_400() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/users/login", app.address))
        .json(&json!({ "password": "p1" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
}

// --- Session guard ---

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn protected_route_returns_401_without_token() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/users/current-user", app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "unauthorized request");
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn access_token_is_accepted_via_header_and_cookie() {
    let app = spawn_app().await;
    register(&app, "alice", "alice@example.com", "p1").await;

    let login_body: Value = login(&app, "alice", "p1")
        .await
        .json()
        .await
        .expect("Failed to parse response");
    let access_token = login_body["data"]["accessToken"].as_str().unwrap();

    let via_header = reqwest::Client::new()
        .get(format!("{}/api/v1/users/current-user", app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, via_header.status().as_u16());
    let body: Value = via_header.json().await.unwrap();
    assert_eq!(body["data"]["username"], "alice");

    let via_cookie = reqwest::Client::new()
        .get(format!("{}/api/v1/users/current-user", app.address))
        .header("Cookie", format!("accessToken={}", access_token))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, via_cookie.status().as_u16());
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn garbage_access_token_returns_401() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/users/current-user", app.address))
        .header("Authorization", "Bearer invalid.token.here")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

// --- Refresh rotation ---

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn refresh_rotates_and_rejects_replay() {
    let app = spawn_app().await;
    register(&app, "alice", "alice@example.com", "p1").await;

    let login_body: Value = login(&app, "alice", "p1").await.json().await.unwrap();
    let r1 = login_body["data"]["refreshToken"].as_str().unwrap().to_string();

    // First presentation succeeds and rotates
    let response = refresh(&app, &r1).await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    let r2 = body["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(r1, r2, "refresh token must be rotated on each use");

    // Replaying the superseded token fails even though its signature is valid
    let replay = refresh(&app, &r1).await;
    assert_eq!(401, replay.status().as_u16());
    let replay_body: Value = replay.json().await.unwrap();
    assert_eq!(replay_body["message"], "refresh token is expired or used");

    // The rotated token still works exactly once
    assert_eq!(200, refresh(&app, &r2).await.status().as_u16());
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn refresh_without_token_returns_401() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/users/refresh-token", app.address))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "unauthorized request");
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn refresh_accepts_token_from_cookie() {
    let app = spawn_app().await;
    register(&app, "alice", "alice@example.com", "p1").await;

    let login_body: Value = login(&app, "alice", "p1").await.json().await.unwrap();
    let r1 = login_body["data"]["refreshToken"].as_str().unwrap();

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/users/refresh-token", app.address))
        .header("Cookie", format!("refreshToken={}", r1))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
}

// --- Logout ---

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn logout_revokes_the_outstanding_refresh_token() {
    let app = spawn_app().await;
    register(&app, "alice", "alice@example.com", "p1").await;

    let login_body: Value = login(&app, "alice", "p1").await.json().await.unwrap();
    let access_token = login_body["data"]["accessToken"].as_str().unwrap();
    let refresh_token = login_body["data"]["refreshToken"].as_str().unwrap();

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/users/logout", app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    // Both cookies are expired
    let cleared: Vec<_> = response.cookies().collect();
    assert!(cleared.iter().any(|c| c.name() == "accessToken" && c.value().is_empty()));
    assert!(cleared.iter().any(|c| c.name() == "refreshToken" && c.value().is_empty()));

    // The pre-logout refresh token can never succeed again
    assert_eq!(401, refresh(&app, refresh_token).await.status().as_u16());
}

// --- Password change ---

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn password_change_rotates_the_hash_but_not_the_session() {
    let app = spawn_app().await;
    register(&app, "alice", "alice@example.com", "old-pass").await;

    let login_body: Value = login(&app, "alice", "old-pass").await.json().await.unwrap();
    let access_token = login_body["data"]["accessToken"].as_str().unwrap().to_string();

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/users/change-password", app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .json(&json!({ "oldPassword": "old-pass", "newPassword": "new-pass" }))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    // Old password no longer verifies
    assert_eq!(401, login(&app, "alice", "old-pass").await.status().as_u16());
    // New password works
    assert_eq!(200, login(&app, "alice", "new-pass").await.status().as_u16());

    // The already-issued access token remains valid until natural expiry
    let me = reqwest::Client::new()
        .get(format!("{}/api/v1/users/current-user", app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, me.status().as_u16());
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn password_change_with_wrong_old_password_returns_400() {
    let app = spawn_app().await;
    register(&app, "alice", "alice@example.com", "p1").await;

    let login_body: Value = login(&app, "alice", "p1").await.json().await.unwrap();
    let access_token = login_body["data"]["accessToken"].as_str().unwrap();

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/users/change-password", app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .json(&json!({ "oldPassword": "nope", "newPassword": "new-pass" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
}

// --- Profile updates ---

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn update_account_returns_sanitized_view() {
    let app = spawn_app().await;
    register(&app, "alice", "alice@example.com", "p1").await;

    let login_body: Value = login(&app, "alice", "p1").await.json().await.unwrap();
    let access_token = login_body["data"]["accessToken"].as_str().unwrap();

    let response = reqwest::Client::new()
        .patch(format!("{}/api/v1/users/update-account", app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .json(&json!({ "displayName": "Alice Renamed", "email": "alice2@example.com" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["displayName"], "Alice Renamed");
    assert_eq!(body["data"]["email"], "alice2@example.com");
    assert!(body["data"].get("passwordHash").is_none());
    assert!(body["data"].get("refreshToken").is_none());
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn update_avatar_replaces_url() {
    let app = spawn_app().await;
    register(&app, "alice", "alice@example.com", "p1").await;

    let login_body: Value = login(&app, "alice", "p1").await.json().await.unwrap();
    let access_token = login_body["data"]["accessToken"].as_str().unwrap();
    let old_avatar = login_body["data"]["user"]["avatarUrl"].as_str().unwrap().to_string();

    let form = reqwest::multipart::Form::new().part(
        "avatar",
        reqwest::multipart::Part::bytes(vec![0x89, b'P', b'N', b'G']).file_name("new.png"),
    );

    let response = reqwest::Client::new()
        .patch(format!("{}/api/v1/users/avatar", app.address))
        .header("Authorization", format!("Bearer {}", access_token))
        .multipart(form)
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_ne!(body["data"]["avatarUrl"].as_str().unwrap(), old_avatar);
}

// --- Full lifecycle scenario ---

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn full_credential_lifecycle() {
    let app = spawn_app().await;

    // register(u1,e1,p1) -> 201
    assert_eq!(201, register(&app, "u1", "e1@example.com", "p1").await.status().as_u16());
    // register(u1,e2,p2) -> 409
    assert_eq!(409, register(&app, "u1", "e2@example.com", "p2").await.status().as_u16());
    // login(u1,wrong) -> 401
    assert_eq!(401, login(&app, "u1", "wrong").await.status().as_u16());

    // login(u1,p1) -> 200 {A1,R1}
    let login_response = login(&app, "u1", "p1").await;
    assert_eq!(200, login_response.status().as_u16());
    let body: Value = login_response.json().await.unwrap();
    let r1 = body["data"]["refreshToken"].as_str().unwrap().to_string();

    // refresh(R1) -> 200 {A2,R2}
    let rotated = refresh(&app, &r1).await;
    assert_eq!(200, rotated.status().as_u16());
    let rotated_body: Value = rotated.json().await.unwrap();
    assert!(rotated_body["data"]["accessToken"].is_string());
    assert!(rotated_body["data"]["refreshToken"].is_string());

    // refresh(R1) -> 401
    assert_eq!(401, refresh(&app, &r1).await.status().as_u16());
}
