//! # DooDates Gateway Crate
//!
//! HTTP API over the poll services: dashboard listing, poll actions,
//! settings, exports and analytics. Errors are JSON `{error, message}`
//! bodies.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use doodates_gateway::{create_router, GatewayState};
//!
//! let state = GatewayState::from_store(store, "https://doodates.app", analytics);
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;

pub use error::{ErrorResponse, GatewayError, GatewayResult};
pub use state::GatewayState;

use std::sync::Arc;

use axum::{middleware as axum_middleware, Router};

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    #[allow(unused_mut)]
    let mut router = Router::new()
        .merge(rest::create_rest_routes().with_state(Arc::new(state)))
        .layer(middleware::cors_layer())
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    #[cfg(debug_assertions)]
    {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        #[derive(OpenApi)]
        #[openapi(
            paths(
                rest::health::health_check,
                rest::polls::list_polls,
                rest::polls::get_poll,
                rest::polls::get_settings,
                rest::polls::update_settings,
                rest::polls::poll_link,
                rest::polls::duplicate_poll,
                rest::polls::archive_poll,
                rest::polls::close_poll,
                rest::polls::anonymize_poll,
                rest::polls::delete_poll,
                rest::polls::bulk_delete,
                rest::polls::bulk_archive,
                rest::polls::export_poll,
                rest::analytics::query_poll,
                rest::analytics::poll_insights,
            ),
            components(
                schemas(
                    error::ErrorResponse,
                    rest::health::HealthResponse,
                    rest::polls::ConfirmRequest,
                    rest::polls::BulkDeleteRequest,
                    rest::polls::BulkArchiveRequest,
                    rest::polls::LinkResponse,
                    rest::polls::AnonymizeResponse,
                    rest::analytics::AnalyticsQueryRequest,
                )
            ),
            tags(
                (name = "Health", description = "Liveness"),
                (name = "Polls", description = "Poll management"),
                (name = "Analytics", description = "AI answers and insights"),
            )
        )]
        struct ApiDoc;

        router = router
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router
}
