pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::ImportConfig;
use crate::services::import::ImportService;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Headroom over the archive size limit for multipart framing.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::import::import_markdown,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::import::ImportResponse,
            api::handlers::import::ImportUpload,
            api::handlers::health::HealthResponse,
            services::import::ImportOutcome,
            services::import::ImportFailure,
        )
    ),
    tags(
        (name = "import", description = "Markdown archive import"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub import_service: Arc<ImportService>,
    pub config: ImportConfig,
    /// Cancelled on shutdown; each import runs on a child token
    pub shutdown: CancellationToken,
}

pub fn create_app(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/api/console/import/md",
            post(api::handlers::import::import_markdown)
                .layer(axum::extract::DefaultBodyLimit::max(
                    state.config.max_upload_size + MULTIPART_OVERHEAD,
                ))
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
