//! Poll analytics REST endpoints

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use doodates_analytics::{AnalyticsResponse, AutoInsight};
use doodates_polls::PollStore;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::{ErrorResponse, GatewayResult};
use crate::state::GatewayState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalyticsQueryRequest {
    pub question: String,
}

pub fn create_analytics_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/polls/:id/analytics/query", post(query_poll))
        .route("/polls/:id/analytics/insights", get(poll_insights))
}

#[utoipa::path(
    post,
    path = "/api/polls/{id}/analytics/query",
    tag = "Analytics",
    params(("id" = String, Path, description = "Poll id or slug")),
    request_body = AnalyticsQueryRequest,
    responses(
        (status = 200, description = "Model answer with extracted insights"),
        (status = 400, description = "Empty question", body = ErrorResponse),
        (status = 404, description = "Poll not found", body = ErrorResponse),
        (status = 503, description = "Analytics unavailable", body = ErrorResponse)
    )
)]
pub async fn query_poll(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    payload: Result<Json<AnalyticsQueryRequest>, JsonRejection>,
) -> GatewayResult<Json<AnalyticsResponse>> {
    let Json(request) = payload?;
    let poll = state.store.require_poll(&id).await?;
    let response = state
        .analytics
        .query_poll(&request.question, &poll.id)
        .await?;
    Ok(Json(response))
}

/// Best effort: an unavailable model yields an empty list.
#[utoipa::path(
    get,
    path = "/api/polls/{id}/analytics/insights",
    tag = "Analytics",
    params(("id" = String, Path, description = "Poll id or slug")),
    responses(
        (status = 200, description = "Automatic insights, possibly empty")
    )
)]
pub async fn poll_insights(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Json<Vec<AutoInsight>> {
    Json(state.analytics.generate_auto_insights(&id).await)
}
