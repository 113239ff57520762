//! Integration tests for API routes.
//!
//! Uses `tower::ServiceExt` to test Axum routes without a real HTTP server.
//! The delivery system runs against in-memory collaborators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use tower::ServiceExt;
use uuid::Uuid;

use herald_api::routes::create_router;
use herald_api::state::AppState;
use herald_common::types::{DeliveryJob, Template};
use herald_delivery::error::{LoaderError, SendError};
use herald_delivery::ledger::InMemoryLedger;
use herald_delivery::loaders::{
    Loaders, MemberGroup, MembershipLoader, StaticTemplateLoader, TokenLoader, UserInfo,
    UserLoader,
};
use herald_delivery::transport::MailTransport;
use herald_delivery::{DeliverySettings, DeliverySystem};

// ============================================================
// Fakes
// ============================================================

struct Tokens {
    fail: bool,
}

#[async_trait]
impl TokenLoader for Tokens {
    async fn load(&self) -> Result<String, LoaderError> {
        if self.fail {
            Err(LoaderError::Unexpected(
                "invalid client credentials".to_string(),
            ))
        } else {
            Ok("token".to_string())
        }
    }
}

struct Users;

#[async_trait]
impl UserLoader for Users {
    async fn load(&self, user_guid: &str, _token: &str) -> Result<UserInfo, LoaderError> {
        match user_guid {
            "broken" => Err(LoaderError::Unexpected(
                "500 from identity provider".to_string(),
            )),
            guid => Ok(UserInfo {
                guid: guid.to_string(),
                email: Some(format!("{}@example.com", guid)),
            }),
        }
    }
}

struct Spaces {
    spaces: HashMap<String, Vec<String>>,
}

#[async_trait]
impl MembershipLoader for Spaces {
    async fn members(
        &self,
        group: MemberGroup<'_>,
        _token: &str,
    ) -> Result<Vec<String>, LoaderError> {
        match group {
            MemberGroup::Space(id) => self
                .spaces
                .get(id)
                .cloned()
                .ok_or_else(|| LoaderError::NotFound(format!("Space {} not found", id))),
            _ => Ok(Vec::new()),
        }
    }
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<DeliveryJob>>,
}

#[async_trait]
impl MailTransport for Outbox {
    async fn send(&self, job: &DeliveryJob) -> Result<(), SendError> {
        self.sent.lock().unwrap().push(job.clone());
        Ok(())
    }
}

// ============================================================
// Helpers
// ============================================================

struct TestApp {
    state: AppState,
    outbox: Arc<Outbox>,
}

fn build_app(token_failure: bool) -> TestApp {
    let spaces = HashMap::from([(
        "dev".to_string(),
        vec!["alice".to_string(), "broken".to_string(), "bob".to_string()],
    )]);
    let loaders = Loaders {
        tokens: Arc::new(Tokens {
            fail: token_failure,
        }),
        users: Arc::new(Users),
        members: Arc::new(Spaces { spaces }),
        templates: Arc::new(StaticTemplateLoader::new(Template {
            subject: "CF Notification: {{.Subject}}".to_string(),
            text: "{{.Text}}".to_string(),
            html: "{{.HTML}}".to_string(),
        })),
    };
    let outbox = Arc::new(Outbox::default());
    let system = DeliverySystem::start(
        DeliverySettings {
            worker_count: 2,
            queue_capacity: 16,
            enqueue_timeout: Duration::from_millis(100),
        },
        loaders,
        Arc::new(InMemoryLedger::new()),
        outbox.clone(),
    );

    TestApp {
        state: AppState::new(Arc::new(system)),
        outbox,
    }
}

fn notify(uri: &str, client_id: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(client_id) = client_id {
        builder = builder.header("x-client-id", client_id);
    }
    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn body() -> serde_json::Value {
    serde_json::json!({
        "kind_id": "disk-alert",
        "subject": "Disk almost full",
        "text": "Disk usage is at 95%",
        "html": "<b>95%</b>"
    })
}

async fn json(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

// ============================================================
// Route Tests
// ============================================================

#[tokio::test]
async fn test_info_endpoint() {
    let app = build_app(false);
    let response = create_router(app.state)
        .oneshot(Request::builder().uri("/info").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "herald-api");
}

#[tokio::test]
async fn test_email_dispatch_then_status_lookup() {
    let app = build_app(false);

    let mut request = body();
    request["to"] = serde_json::json!("ops@example.com");
    let response = create_router(app.state.clone())
        .oneshot(notify("/emails", Some("monitoring"), request))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let results = json(response).await;
    assert_eq!(results.as_array().unwrap().len(), 1);
    assert_eq!(results[0]["status"], "queued");
    assert_eq!(results[0]["email"], "ops@example.com");
    let message_id = results[0]["message_id"].as_str().unwrap().to_string();

    app.state.system.shutdown().await;

    let response = create_router(app.state.clone())
        .oneshot(
            Request::builder()
                .uri(format!("/messages/{}", message_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let message = json(response).await;
    assert_eq!(message["id"], message_id.as_str());
    assert_eq!(message["status"], "delivered");

    let sent = app.outbox.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "CF Notification: Disk almost full");
    assert_eq!(sent[0].client_id, "monitoring");
}

#[tokio::test]
async fn test_space_dispatch_reports_each_member() {
    let app = build_app(false);
    let response = create_router(app.state.clone())
        .oneshot(notify("/spaces/dev", Some("monitoring"), body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let results = json(response).await;
    let statuses: Vec<&str> = results
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["queued", "failed to load", "queued"]);
    assert!(results[1]["message_id"].is_null());

    app.state.system.shutdown().await;
    assert_eq!(app.outbox.sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_client_id_is_unauthorized() {
    let app = build_app(false);
    let response = create_router(app.state)
        .oneshot(notify("/users/alice", None, body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = json(response).await;
    assert!(json["error"].as_str().unwrap().contains("X-Client-Id"));
}

#[tokio::test]
async fn test_email_without_to_is_rejected() {
    let app = build_app(false);
    let response = create_router(app.state)
        .oneshot(notify("/emails", Some("monitoring"), body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_body_without_content_is_rejected() {
    let app = build_app(false);
    let response = create_router(app.state)
        .oneshot(notify(
            "/everyone",
            Some("monitoring"),
            serde_json::json!({"kind_id": "disk-alert", "subject": "empty"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_space_is_not_found() {
    let app = build_app(false);
    let response = create_router(app.state)
        .oneshot(notify("/spaces/missing", Some("monitoring"), body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_token_failure_is_bad_gateway() {
    let app = build_app(true);
    let response = create_router(app.state)
        .oneshot(notify("/users/alice", Some("monitoring"), body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(app.outbox.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_message_is_not_found() {
    let app = build_app(false);
    let response = create_router(app.state)
        .oneshot(
            Request::builder()
                .uri(format!("/messages/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
