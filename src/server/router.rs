use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{delete, get, post},
};

use super::{applications, microservices, studio};
use crate::error::Result;
use crate::k8s::Cluster;
use crate::provision::Provisioner;
use crate::store::DocumentStore;

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub cluster: Arc<dyn Cluster>,
    /// Shares `store` and `cluster` with the fields above.
    pub provisioner: Provisioner,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cluster: Arc<dyn Cluster>,
        provisioner: Provisioner,
    ) -> Self {
        Self {
            store,
            cluster,
            provisioner,
        }
    }

    /// Runs `f` against the store on the blocking pool. Store calls take the
    /// working tree lock and may fetch or push, which must not stall the
    /// runtime's workers.
    pub async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn DocumentStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(std::io::Error::other)?
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Applications
        .route("/application", post(applications::provision_application))
        .route(
            "/application/{tenant}/{application}",
            get(applications::get_application),
        )
        .route(
            "/applications/{tenant}",
            get(applications::list_applications),
        )
        .route("/tenants", get(applications::list_tenants))
        // Studio
        .route(
            "/studio/config/{tenant}",
            get(studio::get_studio_config).post(studio::save_studio_config),
        )
        // Microservices
        .route(
            "/microservice/{tenant}/{application}/{environment}/{id}",
            get(microservices::get_microservice).delete(microservices::delete_microservice),
        )
        .route(
            "/microservice/{tenant}/{application}/{environment}/{id}/environment-variables",
            get(microservices::get_microservice_environment_variables)
                .put(microservices::update_microservice_environment_variables),
        )
        // Business moments
        .route(
            "/businessmoments/{tenant}/{application}/{environment}",
            get(microservices::get_business_moments),
        )
        .route(
            "/businessmoments/{tenant}/{application}/{environment}/{id}/moment",
            post(microservices::save_business_moment),
        )
        .route(
            "/businessmoments/{tenant}/{application}/{environment}/{id}/moment/{type_id}",
            delete(microservices::delete_business_moment),
        )
        .route(
            "/businessmoments/{tenant}/{application}/{environment}/{id}/entity",
            post(microservices::save_business_moment_entity),
        )
        .route(
            "/businessmoments/{tenant}/{application}/{environment}/{id}/entity/{type_id}",
            delete(microservices::delete_business_moment_entity),
        )
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
