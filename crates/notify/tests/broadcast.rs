//! End-to-end broadcast tests against an in-process server that stands in
//! for every remote API the notifiers talk to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Form, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use pagewatch_core::config::Config;
use pagewatch_core::ChannelKind;
use pagewatch_notify::{FailureKind, NotificationManager, Outcome};

const BOT_TOKEN: &str = "123:abc";
const MAILGUN_KEY: &str = "key-test";
/// base64("api:key-test")
const MAILGUN_AUTH: &str = "Basic YXBpOmtleS10ZXN0";
/// Chat id the mock Telegram API answers with 429.
const THROTTLED_CHAT: &str = "429";
const SENDGRID_KEY: &str = "SG.key";
const TWILIO_SID: &str = "AC123";
/// base64("AC123:tok")
const TWILIO_AUTH: &str = "Basic QUMxMjM6dG9r";

#[derive(Debug, Clone)]
struct Received {
    channel: &'static str,
    body: Value,
}

struct MockState {
    received: Mutex<Vec<Received>>,
    discord_status: StatusCode,
    discord_delay: Duration,
}

impl MockState {
    fn record(&self, channel: &'static str, body: Value) {
        self.received.lock().unwrap().push(Received { channel, body });
    }

    fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    fn count(&self, channel: &str) -> usize {
        self.received().iter().filter(|r| r.channel == channel).count()
    }
}

async fn discord(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> StatusCode {
    state.record("discord", body);
    tokio::time::sleep(state.discord_delay).await;
    state.discord_status
}

async fn telegram(
    State(state): State<Arc<MockState>>,
    Path(bot): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.record("telegram", body.clone());
    if bot != format!("bot{BOT_TOKEN}") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "ok": false, "error_code": 401, "description": "Unauthorized" })),
        );
    }
    if body["chat_id"] == THROTTLED_CHAT {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 5",
                "parameters": { "retry_after": 5 },
            })),
        );
    }
    if body["chat_id"] != "42" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error_code": 400, "description": "Bad Request: chat not found" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "ok": true, "result": { "message_id": 1 } })),
    )
}

async fn mailgun(
    State(state): State<Arc<MockState>>,
    Path(domain): Path<String>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.record(
        "mailgun",
        json!({ "domain": domain, "auth": auth, "fields": fields }),
    );
    if auth != MAILGUN_AUTH {
        return (StatusCode::UNAUTHORIZED, "Forbidden".to_string());
    }
    (
        StatusCode::OK,
        json!({ "id": "<1@mg.example.com>", "message": "Queued. Thank you." }).to_string(),
    )
}

fn header(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn slack(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> &'static str {
    state.record("slack", body);
    "ok"
}

async fn webhook(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    raw: String,
) -> StatusCode {
    state.record(
        "webhook",
        json!({
            "api_key": header(&headers, "x-api-key"),
            "content_type": header(&headers, "content-type"),
            "raw": raw,
        }),
    );
    StatusCode::OK
}

async fn sendgrid(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let auth = header(&headers, "authorization");
    state.record("sendgrid", json!({ "auth": auth, "body": body }));
    if auth != format!("Bearer {SENDGRID_KEY}") {
        return StatusCode::UNAUTHORIZED;
    }
    StatusCode::ACCEPTED
}

async fn twilio(
    State(state): State<Arc<MockState>>,
    Path(sid): Path<String>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let auth = header(&headers, "authorization");
    state.record("twilio", json!({ "sid": sid, "auth": auth, "fields": fields }));
    if auth != TWILIO_AUTH {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "code": 20003, "message": "Authenticate" })),
        );
    }
    (StatusCode::CREATED, Json(json!({ "sid": "SM1", "status": "queued" })))
}

async fn textbelt(
    State(state): State<Arc<MockState>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Json<Value> {
    let paid = fields.get("key").map(String::as_str) == Some("paid-key");
    state.record("textbelt", json!(fields));
    if paid {
        Json(json!({ "success": true, "textId": "1", "quotaRemaining": 40 }))
    } else {
        Json(json!({ "success": false, "error": "Out of quota", "quotaRemaining": 0 }))
    }
}

struct MockServer {
    base: String,
    state: Arc<MockState>,
}

async fn spawn_server(discord_status: StatusCode, discord_delay: Duration) -> MockServer {
    let state = Arc::new(MockState {
        received: Mutex::new(Vec::new()),
        discord_status,
        discord_delay,
    });

    let app = Router::new()
        .route("/discord/webhook", post(discord))
        .route("/{bot}/sendMessage", post(telegram))
        .route("/v3/{domain}/messages", post(mailgun))
        .route("/v3/mail/send", post(sendgrid))
        .route("/2010-04-01/Accounts/{sid}/Messages.json", post(twilio))
        .route("/text", post(textbelt))
        .route("/slack", post(slack))
        .route("/webhook", post(webhook))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer {
        base: format!("http://{addr}"),
        state,
    }
}

async fn healthy_server() -> MockServer {
    spawn_server(StatusCode::NO_CONTENT, Duration::ZERO).await
}

fn discord_section(server: &MockServer) -> Value {
    json!({ "webhook_url": format!("{}/discord/webhook", server.base) })
}

fn telegram_section(server: &MockServer) -> Value {
    json!({ "bot_token": BOT_TOKEN, "chat_id": "42", "api_base": server.base })
}

fn mailgun_section(server: &MockServer) -> Value {
    json!({
        "domain": "mg.example.com",
        "api_key": MAILGUN_KEY,
        "to_email": "me@example.com",
        "api_base": server.base,
    })
}

fn manager_for(notifications: Value) -> NotificationManager {
    let raw = json!({ "notifications": notifications }).to_string();
    let config = Config::from_json(&raw).unwrap();
    NotificationManager::configure(&config.notification_config().unwrap()).unwrap()
}

#[tokio::test]
async fn no_enabled_channels_sends_nothing() {
    let server = healthy_server().await;
    let manager = manager_for(json!({ "telegram": { "bot_token": BOT_TOKEN } }));

    let results = manager.broadcast("T", "B").await;
    assert!(results.is_empty());
    assert_eq!(Outcome::classify(&results), Outcome::NoChannels);
    assert!(server.state.received().is_empty());
}

#[tokio::test]
async fn discord_only_posts_once() {
    let server = healthy_server().await;
    let manager = manager_for(json!({ "discord": discord_section(&server) }));

    let results = manager.broadcast("T", "B").await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].channel, ChannelKind::Discord);
    assert!(results[0].success, "{:?}", results[0].error);

    let received = server.state.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body["content"], "**T**\n\nB");
    assert_eq!(received[0].body["username"], "Website Monitor");

    let embed = &received[0].body["embeds"][0];
    assert_eq!(embed["title"], "T");
    assert_eq!(embed["description"], "B");
    assert_eq!(embed["color"], 0xFF0000);
    assert!(embed["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn all_three_channels_report_in_order() {
    let server = healthy_server().await;
    let manager = manager_for(json!({
        "mailgun": mailgun_section(&server),
        "telegram": telegram_section(&server),
        "discord": discord_section(&server),
    }));

    let results = manager.broadcast("Website Update Detected", "New content").await;
    let kinds: Vec<_> = results.iter().map(|r| r.channel).collect();
    assert_eq!(
        kinds,
        vec![ChannelKind::Discord, ChannelKind::Telegram, ChannelKind::Mailgun]
    );
    assert!(results.iter().all(|r| r.success), "{results:?}");
    assert_eq!(Outcome::classify(&results), Outcome::AllSucceeded);

    assert_eq!(server.state.count("discord"), 1);
    assert_eq!(server.state.count("telegram"), 1);
    assert_eq!(server.state.count("mailgun"), 1);
}

#[tokio::test]
async fn discord_timeout_does_not_block_others() {
    let server = spawn_server(StatusCode::NO_CONTENT, Duration::from_secs(5)).await;
    let manager = manager_for(json!({
        "timeout_secs": 1,
        "discord": discord_section(&server),
        "telegram": telegram_section(&server),
        "mailgun": mailgun_section(&server),
    }));

    let results = manager.broadcast("T", "B").await;
    assert_eq!(results.len(), 3);
    assert!(!results[0].success);
    assert_eq!(results[0].failure, Some(FailureKind::Transport));
    assert!(results[1].success, "{:?}", results[1].error);
    assert!(results[2].success, "{:?}", results[2].error);
    assert_eq!(Outcome::classify(&results), Outcome::PartialFailure);
}

#[tokio::test]
async fn discord_rejection_is_captured() {
    let server = spawn_server(StatusCode::NOT_FOUND, Duration::ZERO).await;
    let manager = manager_for(json!({ "discord": discord_section(&server) }));

    let results = manager.broadcast("T", "B").await;
    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert_eq!(results[0].failure, Some(FailureKind::Rejected));
    assert!(results[0].error.as_deref().unwrap().contains("404"));
    assert_eq!(Outcome::classify(&results), Outcome::AllFailed);
}

#[tokio::test]
async fn telegram_without_chat_id_is_excluded() {
    let server = healthy_server().await;
    let manager = manager_for(json!({
        "discord": discord_section(&server),
        "telegram": { "bot_token": BOT_TOKEN, "api_base": server.base },
    }));

    assert_eq!(manager.channels(), vec![ChannelKind::Discord]);
    let results = manager.broadcast("T", "B").await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].channel, ChannelKind::Discord);
    assert_eq!(server.state.count("telegram"), 0);
}

#[tokio::test]
async fn telegram_api_error_uses_description() {
    let server = healthy_server().await;
    let manager = manager_for(json!({
        "telegram": { "bot_token": BOT_TOKEN, "chat_id": "999", "api_base": server.base },
    }));

    let results = manager.broadcast("T", "B").await;
    assert!(!results[0].success);
    assert_eq!(results[0].failure, Some(FailureKind::Rejected));
    assert!(results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("chat not found"));
}

#[tokio::test]
async fn telegram_sends_markdown_v2() {
    let server = healthy_server().await;
    let manager = manager_for(json!({ "telegram": telegram_section(&server) }));

    manager.broadcast("Update!", "Opens 01.09").await;
    let received = server.state.received();
    assert_eq!(received[0].body["chat_id"], "42");
    assert_eq!(received[0].body["parse_mode"], "MarkdownV2");
    assert_eq!(received[0].body["text"], "*Update\\!*\n\nOpens 01\\.09");
}

#[tokio::test]
async fn mailgun_uses_basic_auth_and_form_fields() {
    let server = healthy_server().await;
    let manager = manager_for(json!({ "mailgun": mailgun_section(&server) }));

    let results = manager.broadcast("Subject here", "Body here").await;
    assert!(results[0].success, "{:?}", results[0].error);

    let received = server.state.received();
    let body = &received[0].body;
    assert_eq!(body["domain"], "mg.example.com");
    assert_eq!(body["auth"], MAILGUN_AUTH);
    assert_eq!(body["fields"]["to"], "me@example.com");
    assert_eq!(body["fields"]["subject"], "Subject here");
    assert_eq!(body["fields"]["text"], "Body here");
    assert_eq!(
        body["fields"]["from"],
        "Website Monitor <mailgun@mg.example.com>"
    );
}

#[tokio::test]
async fn mailgun_wrong_key_is_rejected() {
    let server = healthy_server().await;
    let mut section = mailgun_section(&server);
    section["api_key"] = json!("wrong");
    let manager = manager_for(json!({ "mailgun": section }));

    let results = manager.broadcast("T", "B").await;
    assert!(!results[0].success);
    assert_eq!(results[0].failure, Some(FailureKind::Rejected));
    assert!(results[0].error.as_deref().unwrap().contains("Forbidden"));
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_failure() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let server = healthy_server().await;
    let manager = manager_for(json!({
        "discord": { "webhook_url": format!("http://{addr}/hook") },
        "telegram": telegram_section(&server),
    }));

    let results = manager.broadcast("T", "B").await;
    assert_eq!(results[0].failure, Some(FailureKind::Transport));
    assert!(results[1].success);
}

#[tokio::test]
async fn repeated_broadcasts_deliver_twice() {
    let server = healthy_server().await;
    let manager = manager_for(json!({
        "discord": discord_section(&server),
        "telegram": telegram_section(&server),
    }));

    let first = manager.broadcast("T", "B").await;
    let second = manager.broadcast("T", "B").await;
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    assert_eq!(server.state.count("discord"), 2);
    assert_eq!(server.state.count("telegram"), 2);
}

#[tokio::test]
async fn telegram_rate_limit_is_reported() {
    let server = healthy_server().await;
    let manager = manager_for(json!({
        "telegram": { "bot_token": BOT_TOKEN, "chat_id": THROTTLED_CHAT, "api_base": server.base },
    }));

    let results = manager.broadcast("T", "B").await;
    assert!(!results[0].success);
    assert_eq!(results[0].failure, Some(FailureKind::Rejected));
    assert!(results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("retry after 5s"));
}

#[tokio::test]
async fn slack_receives_section_block() {
    let server = healthy_server().await;
    let manager = manager_for(json!({
        "slack": { "webhook_url": format!("{}/slack", server.base) },
    }));

    let results = manager.broadcast("Changed", &"x".repeat(5_000)).await;
    assert!(results[0].success, "{:?}", results[0].error);

    let received = server.state.received();
    let body = &received[0].body;
    assert_eq!(body["text"], "Changed");
    assert_eq!(body["blocks"][0]["type"], "section");
    let section = body["blocks"][0]["text"]["text"].as_str().unwrap();
    assert!(section.starts_with("*Changed*\n\nxxx"));
    assert_eq!(section.chars().count(), 3_000);
}

#[tokio::test]
async fn webhook_sends_json_with_custom_headers() {
    let server = healthy_server().await;
    let manager = manager_for(json!({
        "webhook": {
            "url": format!("{}/webhook", server.base),
            "headers": { "X-Api-Key": "hook-secret" },
            "source_url": "https://pool.example.com/news",
        },
    }));

    let results = manager.broadcast("Changed", "New text").await;
    assert!(results[0].success, "{:?}", results[0].error);

    let received = server.state.received();
    let recorded = &received[0].body;
    assert_eq!(recorded["api_key"], "hook-secret");
    assert_eq!(recorded["content_type"], "application/json");

    let payload: Value = serde_json::from_str(recorded["raw"].as_str().unwrap()).unwrap();
    assert_eq!(payload["title"], "Changed");
    assert_eq!(payload["message"], "New text");
    assert_eq!(payload["url"], "https://pool.example.com/news");
    assert!(payload["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn webhook_body_template_is_rendered() {
    let server = healthy_server().await;
    let manager = manager_for(json!({
        "webhook": {
            "url": format!("{}/webhook", server.base),
            "body_template": r#"{"text": "{{ title }}: {{ message | shorten(8) }}"}"#,
        },
    }));

    let results = manager.broadcast("Changed", "Registration is open").await;
    assert!(results[0].success, "{:?}", results[0].error);

    let received = server.state.received();
    assert_eq!(received[0].body["raw"], r#"{"text": "Changed: Registr…"}"#);
}

#[tokio::test]
async fn sendgrid_uses_bearer_and_personalizations() {
    let server = healthy_server().await;
    let manager = manager_for(json!({
        "sendgrid": {
            "api_key": SENDGRID_KEY,
            "from_email": "monitor@example.com",
            "to_email": "me@example.com",
            "api_base": server.base,
        },
    }));

    let results = manager.broadcast("Subject here", "Body here").await;
    assert!(results[0].success, "{:?}", results[0].error);
    assert_eq!(results[0].channel, ChannelKind::Sendgrid);

    let received = server.state.received();
    let body = &received[0].body["body"];
    assert_eq!(received[0].body["auth"], "Bearer SG.key");
    assert_eq!(body["personalizations"][0]["to"][0]["email"], "me@example.com");
    assert_eq!(body["from"]["email"], "monitor@example.com");
    assert_eq!(body["subject"], "Subject here");
    assert_eq!(body["content"][0]["value"], "Body here");
}

#[tokio::test]
async fn sms_channels_send_shortened_body() {
    let server = healthy_server().await;
    let manager = manager_for(json!({
        "twilio": {
            "account_sid": TWILIO_SID,
            "auth_token": "tok",
            "from_number": "+15550199",
            "to_number": "+15550100",
            "api_base": server.base,
        },
        "textbelt": { "to_number": "+15550100", "api_key": "paid-key", "api_base": server.base },
    }));

    let long_body = "a".repeat(200);
    let results = manager.broadcast("T", &long_body).await;
    let kinds: Vec<_> = results.iter().map(|r| r.channel).collect();
    assert_eq!(kinds, vec![ChannelKind::Twilio, ChannelKind::Textbelt]);
    assert!(results.iter().all(|r| r.success), "{results:?}");

    let expected = format!("{}...", "a".repeat(150));
    let received = server.state.received();
    let twilio = received.iter().find(|r| r.channel == "twilio").unwrap();
    assert_eq!(twilio.body["sid"], TWILIO_SID);
    assert_eq!(twilio.body["auth"], TWILIO_AUTH);
    assert_eq!(twilio.body["fields"]["From"], "+15550199");
    assert_eq!(twilio.body["fields"]["To"], "+15550100");
    assert_eq!(twilio.body["fields"]["Body"], expected.as_str());

    let textbelt = received.iter().find(|r| r.channel == "textbelt").unwrap();
    assert_eq!(textbelt.body["phone"], "+15550100");
    assert_eq!(textbelt.body["message"], expected.as_str());
}

#[tokio::test]
async fn textbelt_failure_flag_is_rejected() {
    let server = healthy_server().await;
    let manager = manager_for(json!({
        "textbelt": { "to_number": "+15550100", "api_base": server.base },
    }));

    let results = manager.broadcast("T", "B").await;
    assert!(!results[0].success);
    assert_eq!(results[0].failure, Some(FailureKind::Rejected));
    assert!(results[0].error.as_deref().unwrap().contains("Out of quota"));
}
