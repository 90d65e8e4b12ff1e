//! # platform-api
//!
//! Control plane for a multi-tenant Kubernetes platform. Each application gets
//! its own namespace with RBAC, registry and storage credentials, and a MongoDB
//! per environment. The platform's documents (applications, microservices,
//! studio configs, Terraform facts) live as JSON files in a Git repository.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use platform_api::config::PlatformConfig;
//! use platform_api::k8s::KubeCluster;
//! use platform_api::provision::Provisioner;
//! use platform_api::server::{AppState, create_router};
//! use platform_api::store::GitStore;
//!
//! let config = PlatformConfig::load("platform.toml".as_ref())?;
//! let store = Arc::new(GitStore::open(config.git.clone())?);
//! let cluster = Arc::new(KubeCluster::try_default().await?);
//! let provisioner = Provisioner::new(cluster.clone(), store.clone(), config.platform, config.mongo);
//! let router = create_router(Arc::new(AppState::new(store, cluster, provisioner)));
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): builds the `platform-api` binary. Disable with `default-features = false`.

pub mod config;
pub mod error;
pub mod import;
pub mod k8s;
pub mod microservice;
pub mod provision;
pub mod resources;
pub mod server;
pub mod store;
pub mod types;
