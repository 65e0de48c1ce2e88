//! REST API endpoints for the gateway

pub mod analytics;
pub mod health;
pub mod polls;

use std::sync::Arc;

use axum::Router;

use crate::state::GatewayState;

pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .merge(health::create_health_routes())
        .nest(
            "/api",
            polls::create_poll_routes().merge(analytics::create_analytics_routes()),
        )
}
