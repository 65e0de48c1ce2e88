//! End-to-end tests for the REST API over an in-memory store

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use doodates_analytics::{AnalyticsResult, GenerativeModel, PollAnalyticsService};
use doodates_config::AnalyticsConfig;
use doodates_gateway::{create_router, GatewayState};
use doodates_polls::{
    AnswerValue, DatePollContent, FormPollContent, FormQuestion, MemoryPollStore, Poll,
    PollStatus, PollStore, Preference, QuestionKind, QuestionOption, Vote, VotePayload,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

struct EchoModel;

#[async_trait]
impl GenerativeModel for EchoModel {
    async fn generate_content(&self, _prompt: &str) -> AnalyticsResult<String> {
        Ok("Le 1er juin est la date préférée.".to_string())
    }
}

fn date_poll(title: &str) -> Poll {
    Poll::new(
        title,
        DatePollContent {
            dates: vec!["2025-06-01".into(), "2025-06-02".into()],
            ..Default::default()
        }
        .into(),
    )
}

fn form_poll(title: &str) -> Poll {
    Poll::new(
        title,
        FormPollContent {
            questions: vec![FormQuestion {
                id: "q1".into(),
                title: "Plat préféré".into(),
                required: true,
                kind: QuestionKind::SingleChoice {
                    options: vec![
                        QuestionOption::new("o1", "Pizza"),
                        QuestionOption::new("o2", "Sushi"),
                    ],
                },
            }],
            ..Default::default()
        }
        .into(),
    )
}

fn date_vote(poll: &Poll, name: &str) -> Vote {
    let mut selections = BTreeMap::new();
    selections.insert("2025-06-01".to_string(), Preference::Yes);
    Vote::new(&poll.id, Some(name.to_string()), VotePayload::Date { selections })
}

async fn app_with(
    store: Arc<MemoryPollStore>,
    model: Option<Arc<dyn GenerativeModel>>,
) -> Router {
    let store: Arc<dyn PollStore> = store;
    let analytics = PollAnalyticsService::new(model, store.clone(), &AnalyticsConfig::default());
    create_router(GatewayState::from_store(
        store,
        "https://doodates.test/",
        analytics,
    ))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health_reports_analytics_state() {
    let app = app_with(Arc::new(MemoryPollStore::new()), None).await;

    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["analytics"], false);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = app_with(Arc::new(MemoryPollStore::new()), None).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_list_filters_and_paginates() {
    let store = Arc::new(MemoryPollStore::new());
    store.insert_poll(&date_poll("Barbecue")).await.unwrap();
    store.insert_poll(&date_poll("Réunion d'équipe")).await.unwrap();
    store.insert_poll(&form_poll("Menu de Noël")).await.unwrap();
    let app = app_with(store, None).await;

    let (status, body) = send(&app, Method::GET, "/api/polls?type=date&page_size=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["total_pages"], 2);

    let (status, body) = send(&app, Method::GET, "/api/polls?type=sondage", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_get_poll_by_slug_with_results() {
    let store = Arc::new(MemoryPollStore::new());
    let poll = date_poll("Barbecue");
    store.insert_poll(&poll).await.unwrap();
    store.insert_vote(&date_vote(&poll, "Alice")).await.unwrap();
    let app = app_with(store, None).await;

    let (status, body) = send(&app, Method::GET, &format!("/api/polls/{}", poll.slug), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["poll"]["id"], poll.id.as_str());
    assert_eq!(body["poll"]["type"], "date");
    assert_eq!(body["vote_count"], 1);
}

#[tokio::test]
async fn test_missing_poll_is_json_404() {
    let app = app_with(Arc::new(MemoryPollStore::new()), None).await;

    let (status, body) = send(&app, Method::GET, "/api/polls/nope", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    assert!(body["message"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_close_requires_confirmation() {
    let store = Arc::new(MemoryPollStore::new());
    let poll = date_poll("Barbecue");
    store.insert_poll(&poll).await.unwrap();
    let app = app_with(store.clone(), None).await;
    let uri = format!("/api/polls/{}/close", poll.id);

    let (status, body) = send(&app, Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("confirm"));
    assert_eq!(
        store.require_poll(&poll.id).await.unwrap().status,
        PollStatus::Active
    );

    let (status, body) = send(&app, Method::POST, &uri, Some(json!({ "confirm": true }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "closed");

    // closed polls can be archived but never closed again
    let (status, _) = send(&app, Method::POST, &uri, Some(json!({ "confirm": true }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_anonymize_only_accepts_date_polls() {
    let store = Arc::new(MemoryPollStore::new());
    let date = date_poll("Barbecue");
    let form = form_poll("Menu");
    store.insert_poll(&date).await.unwrap();
    store.insert_poll(&form).await.unwrap();
    store.insert_vote(&date_vote(&date, "Alice")).await.unwrap();
    let app = app_with(store.clone(), None).await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/polls/{}/anonymize", form.id),
        Some(json!({ "confirm": true })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/polls/{}/anonymize", date.id),
        Some(json!({ "confirm": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["votes_anonymized"], 1);

    let votes = store.list_votes(&date.id).await.unwrap();
    assert_ne!(votes[0].voter_name.as_deref(), Some("Alice"));
}

#[tokio::test]
async fn test_link_and_duplicate() {
    let store = Arc::new(MemoryPollStore::new());
    let poll = date_poll("Barbecue");
    store.insert_poll(&poll).await.unwrap();
    let app = app_with(store.clone(), None).await;

    let (status, body) = send(&app, Method::GET, &format!("/api/polls/{}/link", poll.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["url"],
        format!("https://doodates.test/poll/{}", poll.slug)
    );

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/polls/{}/duplicate", poll.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(body["id"], poll.id.as_str());
    assert_eq!(store.list_polls().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_cascades_votes() {
    let store = Arc::new(MemoryPollStore::new());
    let poll = date_poll("Barbecue");
    store.insert_poll(&poll).await.unwrap();
    store.insert_vote(&date_vote(&poll, "Alice")).await.unwrap();
    store.insert_vote(&date_vote(&poll, "Bob")).await.unwrap();
    let app = app_with(store.clone(), None).await;

    let (status, body) = send(&app, Method::DELETE, &format!("/api/polls/{}", poll.id), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["votes_deleted"], 2);
    assert!(store.find_poll(&poll.id).await.unwrap().is_none());
    assert_eq!(store.count_votes(&poll.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_bulk_delete_tallies_each_id() {
    let store = Arc::new(MemoryPollStore::new());
    let poll = date_poll("Barbecue");
    store.insert_poll(&poll).await.unwrap();
    let app = app_with(store, None).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/polls/bulk-delete",
        Some(json!({ "ids": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/polls/bulk-delete",
        Some(json!({ "ids": [&poll.id, "ghost"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["succeeded"], json!([poll.id]));
    assert_eq!(body["failed"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_settings_update() {
    let store = Arc::new(MemoryPollStore::new());
    let poll = date_poll("Barbecue");
    store.insert_poll(&poll).await.unwrap();
    let app = app_with(store, None).await;
    let uri = format!("/api/polls/{}/settings", poll.id);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(json!({ "title": "Barbecue géant" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Barbecue géant");
    assert_eq!(body["slug"], poll.slug.as_str());

    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "date");
}

#[tokio::test]
async fn test_export_csv_download() {
    let store = Arc::new(MemoryPollStore::new());
    let poll = form_poll("Menu de Noël");
    store.insert_poll(&poll).await.unwrap();
    let mut answers = BTreeMap::new();
    answers.insert("q1".to_string(), AnswerValue::Choice("o1".into()));
    store
        .insert_vote(&Vote::new(
            &poll.id,
            Some("Alice".into()),
            VotePayload::Form { answers },
        ))
        .await
        .unwrap();
    let app = app_with(store, None).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/polls/{}/export", poll.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename="));
    assert!(disposition.contains(".csv"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&bytes).contains("Pizza"));

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/polls/{}/export?format=docx", poll.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_analytics_without_model_is_unavailable() {
    let store = Arc::new(MemoryPollStore::new());
    let poll = date_poll("Barbecue");
    store.insert_poll(&poll).await.unwrap();
    let app = app_with(store, None).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/polls/{}/analytics/query", poll.id),
        Some(json!({ "question": "Quelle date ?" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "service_unavailable");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/polls/{}/analytics/insights", poll.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_analytics_query_is_cached() {
    let store = Arc::new(MemoryPollStore::new());
    let poll = date_poll("Barbecue");
    store.insert_poll(&poll).await.unwrap();
    let app = app_with(store, Some(Arc::new(EchoModel))).await;
    let uri = format!("/api/polls/{}/analytics/query", poll.slug);

    let (status, body) = send(&app, Method::POST, &uri, Some(json!({ "question": "Quelle date ?" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached"], false);
    assert!(body["answer"].as_str().unwrap().contains("1er juin"));

    let (_, body) = send(&app, Method::POST, &uri, Some(json!({ "question": "  quelle DATE ? " }))).await;
    assert_eq!(body["cached"], true);

    let (status, _) = send(&app, Method::POST, &uri, Some(json!({ "question": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
