use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use crate::microservice::{
    EnvironmentVariable, SimpleMicroserviceRepo, get_environment_variables,
    update_environment_variables,
};
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::validation::{
    validate_application_id, validate_environment, validate_microservice_id, validate_tenant_id,
};
use crate::types::{BusinessMoment, BusinessMomentEntity, MicroserviceDocument, MicroserviceKind};

/// Path of a single microservice.
#[derive(Debug, Clone, Deserialize)]
pub struct MicroservicePath {
    pub tenant: String,
    pub application: String,
    pub environment: String,
    pub id: String,
}

impl MicroservicePath {
    fn validate(&self) -> Result<(), ApiError> {
        validate_tenant_id(&self.tenant)?;
        validate_application_id(&self.application)?;
        validate_environment(&self.environment)?;
        validate_microservice_id(&self.id)
    }

    async fn load(&self, state: &AppState) -> Result<MicroserviceDocument, ApiError> {
        self.validate()?;
        let path = self.clone();
        state
            .with_store(move |store| {
                store.get_microservice(&path.tenant, &path.application, &path.environment, &path.id)
            })
            .await
            .or_not_found("Microservice not found")
    }
}

#[derive(Debug, Deserialize)]
pub struct EnvironmentPath {
    pub tenant: String,
    pub application: String,
    pub environment: String,
}

#[derive(Debug, Deserialize)]
pub struct MomentPath {
    pub tenant: String,
    pub application: String,
    pub environment: String,
    pub id: String,
    pub type_id: String,
}

pub async fn get_microservice(
    State(state): State<Arc<AppState>>,
    Path(path): Path<MicroservicePath>,
) -> impl IntoResponse {
    let microservice = path.load(&state).await?;

    Ok::<_, ApiError>(Json(ApiResponse::success(microservice)))
}

/// Removes the cluster objects of simple microservices, then the document.
pub async fn delete_microservice(
    State(state): State<Arc<AppState>>,
    Path(path): Path<MicroservicePath>,
) -> impl IntoResponse {
    let microservice = path.load(&state).await?;

    if microservice.kind() == MicroserviceKind::Simple {
        SimpleMicroserviceRepo::new(state.cluster.clone())
            .delete(&path.application, &path.environment, microservice.name())
            .await?;
    }
    let kind = microservice.kind();
    let microservice_id = path.id.clone();
    state
        .with_store(move |store| {
            store.delete_microservice(&path.tenant, &path.application, &path.environment, &path.id)
        })
        .await?;

    info!(%microservice_id, ?kind, "deleted microservice");
    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn get_microservice_environment_variables(
    State(state): State<Arc<AppState>>,
    Path(path): Path<MicroservicePath>,
) -> impl IntoResponse {
    let microservice = path.load(&state).await?;

    let variables = get_environment_variables(
        state.cluster.as_ref(),
        &path.application,
        &path.environment,
        microservice.name(),
    )
    .await
    .or_not_found("Environment variables not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(variables)))
}

pub async fn update_microservice_environment_variables(
    State(state): State<Arc<AppState>>,
    Path(path): Path<MicroservicePath>,
    Json(variables): Json<Vec<EnvironmentVariable>>,
) -> impl IntoResponse {
    let microservice = path.load(&state).await?;

    update_environment_variables(
        state.cluster.as_ref(),
        &path.application,
        &path.environment,
        microservice.name(),
        &variables,
    )
    .await
    .or_not_found("Environment variables not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(variables)))
}

pub async fn get_business_moments(
    State(state): State<Arc<AppState>>,
    Path(path): Path<EnvironmentPath>,
) -> impl IntoResponse {
    validate_tenant_id(&path.tenant)?;
    validate_application_id(&path.application)?;
    validate_environment(&path.environment)?;

    let moments = state
        .with_store(move |store| {
            store.get_business_moments(&path.tenant, &path.application, &path.environment)
        })
        .await?;

    Ok::<_, ApiError>(Json(ApiResponse::success(moments)))
}

pub async fn save_business_moment(
    State(state): State<Arc<AppState>>,
    Path(path): Path<MicroservicePath>,
    Json(moment): Json<BusinessMoment>,
) -> impl IntoResponse {
    path.validate()?;

    let saved = moment.clone();
    state
        .with_store(move |store| {
            store.save_business_moment(
                &path.tenant,
                &path.application,
                &path.environment,
                &path.id,
                saved,
            )
        })
        .await
        .or_not_found("Microservice not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(moment)))
}

pub async fn delete_business_moment(
    State(state): State<Arc<AppState>>,
    Path(path): Path<MomentPath>,
) -> impl IntoResponse {
    validate_tenant_id(&path.tenant)?;
    validate_application_id(&path.application)?;
    validate_environment(&path.environment)?;
    validate_microservice_id(&path.id)?;

    state
        .with_store(move |store| {
            store.delete_business_moment(
                &path.tenant,
                &path.application,
                &path.environment,
                &path.id,
                &path.type_id,
            )
        })
        .await
        .or_not_found("Microservice not found")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}

pub async fn save_business_moment_entity(
    State(state): State<Arc<AppState>>,
    Path(path): Path<MicroservicePath>,
    Json(entity): Json<BusinessMomentEntity>,
) -> impl IntoResponse {
    path.validate()?;

    let saved = entity.clone();
    state
        .with_store(move |store| {
            store.save_business_moment_entity(
                &path.tenant,
                &path.application,
                &path.environment,
                &path.id,
                saved,
            )
        })
        .await
        .or_not_found("Microservice not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(entity)))
}

pub async fn delete_business_moment_entity(
    State(state): State<Arc<AppState>>,
    Path(path): Path<MomentPath>,
) -> impl IntoResponse {
    validate_tenant_id(&path.tenant)?;
    validate_application_id(&path.application)?;
    validate_environment(&path.environment)?;
    validate_microservice_id(&path.id)?;

    state
        .with_store(move |store| {
            store.delete_business_moment_entity(
                &path.tenant,
                &path.application,
                &path.environment,
                &path.id,
                &path.type_id,
            )
        })
        .await
        .or_not_found("Microservice not found")?;

    Ok::<_, ApiError>(StatusCode::NO_CONTENT)
}
