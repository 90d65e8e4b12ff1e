use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use crate::provision::ProvisionRequest;
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::validation::{
    validate_application_id, validate_provision_request, validate_tenant_id,
};

pub async fn provision_application(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProvisionRequest>,
) -> impl IntoResponse {
    validate_provision_request(&req)?;

    info!(
        tenant_id = %req.tenant.id,
        application_id = %req.application_id,
        environments = ?req.environments,
        "provisioning application"
    );
    let application = state.provisioner.provision_application(req).await?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(application))))
}

pub async fn get_application(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, application_id)): Path<(String, String)>,
) -> impl IntoResponse {
    validate_tenant_id(&tenant_id)?;
    validate_application_id(&application_id)?;

    let application = state
        .with_store(move |store| store.get_application(&tenant_id, &application_id))
        .await
        .or_not_found("Application not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(application)))
}

pub async fn list_applications(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<String>,
) -> impl IntoResponse {
    validate_tenant_id(&tenant_id)?;

    let applications = state
        .with_store(move |store| store.get_applications(&tenant_id))
        .await?;

    Ok::<_, ApiError>(Json(ApiResponse::success(applications)))
}

pub async fn list_tenants(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tenants = state.with_store(|store| store.get_tenants()).await?;

    Ok::<_, ApiError>(Json(ApiResponse::success(tenants)))
}
