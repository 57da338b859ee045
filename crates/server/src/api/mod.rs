//! # HTTP API
//!
//! Run control, live events (SSE and WebSocket), configuration and the
//! OpenAPI document.

use axum::{routing::get, Json, Router};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{OpenApi, ToSchema};

use verdict_core::workflow::Coordinator;

use crate::error::ErrorBody;

pub mod run;
pub mod settings;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    /// Location of the persisted config file
    pub config_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>, config_path: PathBuf) -> Self {
        Self {
            coordinator,
            config_path: Arc::new(config_path),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Verdict API",
        version = "1.0.0",
        description = "Concept review workflow with human approval"
    ),
    paths(
        run::start_run,
        run::get_status,
        run::submit_approval,
        run::cancel_run,
        run::run_events,
        settings::get_config,
        settings::update_config,
        settings::get_providers
    ),
    components(schemas(
        ApiResponse,
        ErrorBody,
        run::StartRunRequest,
        run::StartRunResponse,
        run::RunStatusResponse,
        run::ApprovalRequest,
        crate::config::PersistedConfig,
        settings::ConfigResponse,
        settings::ProviderInfo,
        settings::ProvidersResponse
    )),
    tags(
        (name = "run", description = "Review run control and events"),
        (name = "config", description = "Configuration management"),
        (name = "providers", description = "LLM provider discovery")
    )
)]
pub struct ApiDoc;

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1/run", run::run_routes())
        .merge(settings::settings_routes())
        .route("/api/v1/openapi.json", get(serve_openapi))
        .route("/ws", get(run::run_socket))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_run_routes() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_value(&doc).unwrap();
        let paths = json["paths"].as_object().unwrap();
        for path in [
            "/api/v1/run/start",
            "/api/v1/run/status",
            "/api/v1/run/approve",
            "/api/v1/run/cancel",
            "/api/v1/run/events",
            "/api/v1/config",
        ] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
    }
}
