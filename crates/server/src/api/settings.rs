//! # Settings API
//!
//! Persisted configuration and LLM provider discovery. Config changes apply
//! to the next run; event delivery limits need a restart.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use verdict_core::config::EngineConfig;
use verdict_core::models::LlmProvider;
use verdict_core::skills::default_collaborators;

use super::AppState;
use crate::config::PersistedConfig;
use crate::error::{ApiError, ErrorBody};

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigResponse {
    /// Overrides stored on disk
    pub config: PersistedConfig,
    /// Settings the next run will use
    #[schema(value_type = Object)]
    pub effective: EngineConfig,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub default_model: String,
    pub supports_base_url: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderInfo>,
}

pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/config", get(get_config).patch(update_config))
        .route("/api/v1/providers", get(get_providers))
}

/// Get the persisted configuration and the effective engine settings
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Current configuration", body = ConfigResponse),
        (status = 500, description = "Config file unreadable", body = ErrorBody)
    )
)]
pub async fn get_config(State(state): State<AppState>) -> Result<Json<ConfigResponse>, ApiError> {
    let config = PersistedConfig::load(&state.config_path).await?;
    let effective = state.coordinator.config().await.as_ref().clone();
    Ok(Json(ConfigResponse { config, effective }))
}

/// Merge overrides into the persisted configuration
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "config",
    request_body = PersistedConfig,
    responses(
        (status = 200, description = "Updated configuration", body = ConfigResponse),
        (status = 400, description = "Invalid settings", body = ErrorBody)
    )
)]
pub async fn update_config(
    State(state): State<AppState>,
    Json(updates): Json<PersistedConfig>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let mut config = PersistedConfig::load(&state.config_path).await?;
    config.merge(updates);

    let effective = config
        .to_engine_config()
        .map_err(|e| ApiError::BadRequest(format!("{:#}", e)))?;
    config.save(&state.config_path).await?;

    let collaborators = default_collaborators(&effective);
    state
        .coordinator
        .reconfigure(effective.clone(), collaborators)
        .await;
    tracing::info!(path = %state.config_path.display(), "Configuration updated");

    Ok(Json(ConfigResponse { config, effective }))
}

/// List supported LLM providers
#[utoipa::path(
    get,
    path = "/api/v1/providers",
    tag = "providers",
    responses(
        (status = 200, description = "Supported LLM providers", body = ProvidersResponse)
    )
)]
pub async fn get_providers() -> Json<ProvidersResponse> {
    let providers = LlmProvider::all()
        .into_iter()
        .map(|provider| ProviderInfo {
            id: provider.display_name().to_lowercase(),
            name: provider.display_name().to_string(),
            default_model: provider.default_model().to_string(),
            supports_base_url: provider.supports_base_url(),
        })
        .collect();
    Json(ProvidersResponse { providers })
}
