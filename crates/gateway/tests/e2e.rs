//! Router over a real SQLite database

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use doodates_analytics::PollAnalyticsService;
use doodates_config::{AnalyticsConfig, DatabaseConfig};
use doodates_database::initialize_database;
use doodates_gateway::{create_router, GatewayState};
use doodates_polls::{
    Conversation, DatePollContent, Poll, PollStore, Preference, SqlitePollStore, Vote, VotePayload,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<SqlitePollStore>,
    _db_dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let db_dir = TempDir::new().expect("create temp dir");
        let db_path = db_dir.path().join("doodates-test.db");
        let pool = initialize_database(&DatabaseConfig {
            url: format!("sqlite://{}", db_path.to_string_lossy()),
            max_connections: 5,
        })
        .await
        .expect("initialise database");

        let store = Arc::new(SqlitePollStore::new(pool));
        let shared: Arc<dyn PollStore> = store.clone();
        let analytics = PollAnalyticsService::new(None, shared.clone(), &AnalyticsConfig::default());
        let router = create_router(GatewayState::from_store(
            shared,
            "https://doodates.test",
            analytics,
        ));

        Self {
            router,
            store,
            _db_dir: db_dir,
        }
    }

    async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn seed_date_poll(&self, title: &str, voters: &[&str]) -> Poll {
        let poll = Poll::new(
            title,
            DatePollContent {
                dates: vec!["2025-09-01".into(), "2025-09-02".into()],
                ..Default::default()
            }
            .into(),
        );
        self.store.insert_poll(&poll).await.expect("insert poll");
        for voter in voters {
            let selections = BTreeMap::from([("2025-09-01".to_string(), Preference::Yes)]);
            let vote = Vote::new(&poll.id, Some(voter.to_string()), VotePayload::Date { selections });
            self.store.insert_vote(&vote).await.expect("insert vote");
        }
        poll
    }
}

#[tokio::test]
async fn dashboard_lists_persisted_polls() {
    let app = TestApp::new().await;
    app.seed_date_poll("Rentrée", &["Alice", "Bruno"]).await;
    app.seed_date_poll("Pique-nique", &[]).await;

    let (status, body) = app
        .request(Method::GET, "/api/polls?search=rentr", None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["title"], "Rentrée");
    assert_eq!(body["items"][0]["vote_count"], 2);
}

#[tokio::test]
async fn delete_with_conversation_cascades() {
    let app = TestApp::new().await;
    let mut poll = app.seed_date_poll("Rentrée", &["Alice"]).await;
    let conversation = Conversation::new("Organisation de la rentrée").linked_to(&poll.id);
    app.store
        .insert_conversation(&conversation)
        .await
        .expect("insert conversation");
    poll.conversation_id = Some(conversation.id.clone());
    app.store.save_poll(&poll).await.expect("link conversation");

    let (status, body) = app
        .request(
            Method::DELETE,
            &format!("/api/polls/{}?delete_conversation=true", poll.slug),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["votes_deleted"], 1);
    assert_eq!(body["conversation_deleted"], true);
    assert!(app.store.find_poll(&poll.id).await.unwrap().is_none());
    assert!(app
        .store
        .find_conversation(&conversation.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn settings_and_archive_persist() {
    let app = TestApp::new().await;
    let poll = app.seed_date_poll("Rentrée", &[]).await;

    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/api/polls/{}/settings", poll.id),
            Some(json!({ "description": "Au parc" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(Method::POST, &format!("/api/polls/{}/archive", poll.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "archived");

    let stored = app.store.require_poll(&poll.id).await.unwrap();
    assert_eq!(stored.description.as_deref(), Some("Au parc"));
    assert_eq!(stored.slug, poll.slug);

    let (status, body) = app
        .request(Method::POST, &format!("/api/polls/{}/archive", poll.id), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn bulk_archive_reports_partial_failures() {
    let app = TestApp::new().await;
    let first = app.seed_date_poll("Rentrée", &[]).await;
    let second = app.seed_date_poll("Pique-nique", &[]).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/polls/bulk-archive",
            Some(json!({ "ids": [first.id, second.id, "ghost"] })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["succeeded"].as_array().unwrap().len(), 2);
    assert_eq!(body["failed"].as_array().unwrap().len(), 1);
}
