//! Poll REST endpoints

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use doodates_polls::services::aggregate;
use doodates_polls::{
    BulkOutcome, DashboardQuery, DeleteReport, ExportFormat, Page, Poll, PollActions,
    PollSettings, PollStore, PollSummary, ResultsSummary, StaticConfirmer, UpdatePollSettingsRequest,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::error::{ErrorResponse, GatewayError, GatewayResult};
use crate::state::GatewayState;

/// A poll with its aggregated results.
#[derive(Debug, Serialize)]
pub struct PollDetailResponse {
    pub poll: Poll,
    pub vote_count: u64,
    pub results: ResultsSummary,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkDeleteRequest {
    pub ids: Vec<String>,
    #[serde(default)]
    pub delete_conversations: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkArchiveRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LinkResponse {
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnonymizeResponse {
    pub poll_id: String,
    pub votes_anonymized: u64,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DeleteQuery {
    /// Also remove the linked AI conversation
    #[serde(default)]
    pub delete_conversation: bool,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ExportQuery {
    /// csv (default), pdf, json or markdown
    pub format: Option<String>,
}

pub fn create_poll_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/polls", get(list_polls))
        .route("/polls/bulk-delete", post(bulk_delete))
        .route("/polls/bulk-archive", post(bulk_archive))
        .route("/polls/:id", get(get_poll).delete(delete_poll))
        .route("/polls/:id/settings", get(get_settings).patch(update_settings))
        .route("/polls/:id/link", get(poll_link))
        .route("/polls/:id/duplicate", post(duplicate_poll))
        .route("/polls/:id/archive", post(archive_poll))
        .route("/polls/:id/close", post(close_poll))
        .route("/polls/:id/anonymize", post(anonymize_poll))
        .route("/polls/:id/export", get(export_poll))
}

/// Actions that only proceed when the request body confirmed them.
fn confirmed_actions(state: &GatewayState, body: Option<Json<ConfirmRequest>>) -> PollActions {
    let confirm = body.map(|Json(request)| request.confirm).unwrap_or(false);
    state
        .actions
        .clone()
        .with_confirmer(Arc::new(StaticConfirmer(confirm)))
}

fn require_ids(ids: &[String]) -> GatewayResult<()> {
    if ids.is_empty() {
        return Err(GatewayError::InvalidRequest("ids cannot be empty".to_string()));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/polls",
    tag = "Polls",
    params(
        ("status" = Option<String>, Query, description = "active, closed or archived"),
        ("type" = Option<String>, Query, description = "date, form, availability or quizz"),
        ("search" = Option<String>, Query, description = "Case-insensitive title/description match"),
        ("page" = Option<u32>, Query, description = "1-based page"),
        ("page_size" = Option<u32>, Query, description = "Items per page"),
    ),
    responses(
        (status = 200, description = "Paginated poll summaries"),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 422, description = "Invalid paging", body = ErrorResponse)
    )
)]
pub async fn list_polls(
    State(state): State<Arc<GatewayState>>,
    query: Result<Query<DashboardQuery>, QueryRejection>,
) -> GatewayResult<Json<Page<PollSummary>>> {
    let Query(query) = query?;
    Ok(Json(state.dashboard.list(&query).await?))
}

#[utoipa::path(
    get,
    path = "/api/polls/{id}",
    tag = "Polls",
    params(("id" = String, Path, description = "Poll id or slug")),
    responses(
        (status = 200, description = "Poll with aggregated results"),
        (status = 404, description = "Poll not found", body = ErrorResponse)
    )
)]
pub async fn get_poll(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> GatewayResult<Json<PollDetailResponse>> {
    let poll = state.store.require_poll(&id).await?;
    let votes = state.store.list_votes(&poll.id).await?;
    let results = aggregate(&poll, &votes);

    Ok(Json(PollDetailResponse {
        vote_count: votes.len() as u64,
        results,
        poll,
    }))
}

#[utoipa::path(
    get,
    path = "/api/polls/{id}/settings",
    tag = "Polls",
    params(("id" = String, Path, description = "Poll id or slug")),
    responses(
        (status = 200, description = "Current settings, tagged by poll type"),
        (status = 404, description = "Poll not found", body = ErrorResponse)
    )
)]
pub async fn get_settings(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> GatewayResult<Json<PollSettings>> {
    Ok(Json(state.settings.get_settings(&id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/polls/{id}/settings",
    tag = "Polls",
    request_body = UpdatePollSettingsRequest,
    params(("id" = String, Path, description = "Poll id or slug")),
    responses(
        (status = 200, description = "Updated poll"),
        (status = 404, description = "Poll not found", body = ErrorResponse),
        (status = 422, description = "Invalid settings", body = ErrorResponse)
    )
)]
pub async fn update_settings(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdatePollSettingsRequest>, JsonRejection>,
) -> GatewayResult<Json<Poll>> {
    let Json(request) = payload?;
    Ok(Json(state.settings.update_settings(&id, request).await?))
}

#[utoipa::path(
    get,
    path = "/api/polls/{id}/link",
    tag = "Polls",
    params(("id" = String, Path, description = "Poll id or slug")),
    responses(
        (status = 200, description = "Public voting link", body = LinkResponse),
        (status = 404, description = "Poll not found", body = ErrorResponse)
    )
)]
pub async fn poll_link(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> GatewayResult<Json<LinkResponse>> {
    let poll = state.store.require_poll(&id).await?;
    let url = state.actions.copy_link(&poll).await?;
    Ok(Json(LinkResponse { url }))
}

#[utoipa::path(
    post,
    path = "/api/polls/{id}/duplicate",
    tag = "Polls",
    params(("id" = String, Path, description = "Poll id or slug")),
    responses(
        (status = 201, description = "The copy"),
        (status = 404, description = "Poll not found", body = ErrorResponse)
    )
)]
pub async fn duplicate_poll(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> GatewayResult<impl IntoResponse> {
    let poll = state.store.require_poll(&id).await?;
    let copy = state.actions.duplicate(&poll).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

#[utoipa::path(
    post,
    path = "/api/polls/{id}/archive",
    tag = "Polls",
    params(("id" = String, Path, description = "Poll id or slug")),
    responses(
        (status = 200, description = "Archived poll"),
        (status = 404, description = "Poll not found", body = ErrorResponse),
        (status = 409, description = "Already archived", body = ErrorResponse)
    )
)]
pub async fn archive_poll(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> GatewayResult<Json<Poll>> {
    let poll = state.store.require_poll(&id).await?;
    Ok(Json(state.actions.archive(&poll).await?))
}

#[utoipa::path(
    post,
    path = "/api/polls/{id}/close",
    tag = "Polls",
    params(("id" = String, Path, description = "Poll id or slug")),
    request_body = ConfirmRequest,
    responses(
        (status = 200, description = "Closed poll"),
        (status = 400, description = "Not confirmed", body = ErrorResponse),
        (status = 404, description = "Poll not found", body = ErrorResponse),
        (status = 409, description = "Transition not allowed", body = ErrorResponse)
    )
)]
pub async fn close_poll(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    body: Option<Json<ConfirmRequest>>,
) -> GatewayResult<Json<Poll>> {
    let poll = state.store.require_poll(&id).await?;
    let closed = confirmed_actions(&state, body).close(&poll).await?;
    Ok(Json(closed))
}

#[utoipa::path(
    post,
    path = "/api/polls/{id}/anonymize",
    tag = "Polls",
    params(("id" = String, Path, description = "Poll id or slug")),
    request_body = ConfirmRequest,
    responses(
        (status = 200, description = "Votes anonymized", body = AnonymizeResponse),
        (status = 400, description = "Not confirmed", body = ErrorResponse),
        (status = 404, description = "Poll not found", body = ErrorResponse),
        (status = 422, description = "Not a date poll", body = ErrorResponse)
    )
)]
pub async fn anonymize_poll(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    body: Option<Json<ConfirmRequest>>,
) -> GatewayResult<Json<AnonymizeResponse>> {
    let poll = state.store.require_poll(&id).await?;
    let votes_anonymized = confirmed_actions(&state, body).anonymize(&poll).await?;
    Ok(Json(AnonymizeResponse {
        poll_id: poll.id,
        votes_anonymized,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/polls/{id}",
    tag = "Polls",
    params(("id" = String, Path, description = "Poll id or slug"), DeleteQuery),
    responses(
        (status = 200, description = "What the cascade removed"),
        (status = 404, description = "Poll not found", body = ErrorResponse)
    )
)]
pub async fn delete_poll(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    query: Result<Query<DeleteQuery>, QueryRejection>,
) -> GatewayResult<Json<DeleteReport>> {
    let Query(query) = query?;
    let poll = state.store.require_poll(&id).await?;
    let report = state
        .actions
        .delete_with_cascade(&poll, query.delete_conversation)
        .await?;
    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/api/polls/bulk-delete",
    tag = "Polls",
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "Per-poll tally"),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    )
)]
pub async fn bulk_delete(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<BulkDeleteRequest>, JsonRejection>,
) -> GatewayResult<Json<BulkOutcome>> {
    let Json(request) = payload?;
    require_ids(&request.ids)?;
    let outcome = state
        .actions
        .bulk_delete(&request.ids, request.delete_conversations)
        .await;
    info!(
        succeeded = outcome.success_count(),
        failed = outcome.failure_count(),
        "bulk delete request handled"
    );
    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/polls/bulk-archive",
    tag = "Polls",
    request_body = BulkArchiveRequest,
    responses(
        (status = 200, description = "Per-poll tally"),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    )
)]
pub async fn bulk_archive(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<BulkArchiveRequest>, JsonRejection>,
) -> GatewayResult<Json<BulkOutcome>> {
    let Json(request) = payload?;
    require_ids(&request.ids)?;
    Ok(Json(state.dashboard.bulk_archive(&request.ids).await))
}

#[utoipa::path(
    get,
    path = "/api/polls/{id}/export",
    tag = "Polls",
    params(("id" = String, Path, description = "Poll id or slug"), ExportQuery),
    responses(
        (status = 200, description = "File download"),
        (status = 404, description = "Poll not found", body = ErrorResponse),
        (status = 422, description = "Not exportable", body = ErrorResponse)
    )
)]
pub async fn export_poll(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    query: Result<Query<ExportQuery>, QueryRejection>,
) -> GatewayResult<impl IntoResponse> {
    let Query(query) = query?;
    let format = match query.format.as_deref() {
        Some(raw) => ExportFormat::from_str(raw)?,
        None => ExportFormat::Csv,
    };

    let poll = state.store.require_poll(&id).await?;
    let file = state.actions.export(&poll, format).await?;

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            ),
        ],
        file.body,
    ))
}
