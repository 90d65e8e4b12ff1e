use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::validate_tenant_id;
use crate::types::StudioConfig;

/// Tenants without a readable `studio.json` get the default-allow config.
pub async fn get_studio_config(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
) -> impl IntoResponse {
    validate_tenant_id(&tenant_id)?;

    let config = state
        .with_store(move |store| store.get_studio_config(&tenant_id))
        .await?;

    Ok::<_, ApiError>(Json(ApiResponse::success(config)))
}

pub async fn save_studio_config(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
    Json(config): Json<StudioConfig>,
) -> impl IntoResponse {
    validate_tenant_id(&tenant_id)?;

    let saved = config.clone();
    state
        .with_store(move |store| store.save_studio_config(&tenant_id, &saved))
        .await?;

    Ok::<_, ApiError>(Json(ApiResponse::success(config)))
}
