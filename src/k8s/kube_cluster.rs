use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::{Ingress, NetworkPolicy};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{Cluster, Kind, Object};
use crate::error::{Error, Result};

const FIELD_MANAGER: &str = "platform-api";

/// [`Cluster`] backed by a Kubernetes API server.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Uses in-cluster configuration, falling back to the local kubeconfig.
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::new(client))
    }

    fn namespaced<K>(&self, namespace: Option<&str>) -> Result<Api<K>>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        let namespace = namespace.ok_or_else(|| {
            Error::BadRequest(format!("{} objects need a namespace", K::kind(&())))
        })?;
        Ok(Api::namespaced(self.client.clone(), namespace))
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }
}

fn post_params() -> PostParams {
    PostParams {
        dry_run: false,
        field_manager: Some(FIELD_MANAGER.to_string()),
    }
}

async fn create_with<K>(api: Api<K>, object: &K) -> Result<()>
where
    K: Resource + Clone + Debug + Serialize + DeserializeOwned,
{
    api.create(&post_params(), object)
        .await
        .map_err(Error::from_kube)?;
    Ok(())
}

async fn replace_with<K>(api: Api<K>, name: &str, object: &K) -> Result<()>
where
    K: Resource + Clone + Debug + Serialize + DeserializeOwned,
{
    api.replace(name, &post_params(), object)
        .await
        .map_err(Error::from_kube)?;
    Ok(())
}

async fn get_with<K>(api: Api<K>, name: &str) -> Result<Object>
where
    K: Resource + Clone + Debug + DeserializeOwned + Into<Object>,
{
    let object = api.get(name).await.map_err(Error::from_kube)?;
    Ok(object.into())
}

async fn delete_with<K>(api: Api<K>, name: &str) -> Result<()>
where
    K: Resource + Clone + Debug + DeserializeOwned,
{
    api.delete(name, &DeleteParams::background())
        .await
        .map_err(Error::from_kube)?;
    Ok(())
}

#[async_trait]
impl Cluster for KubeCluster {
    async fn create(&self, object: &Object) -> Result<()> {
        debug!(kind = %object.kind(), name = object.name(), "creating");
        let ns = object.namespace();
        match object {
            Object::Namespace(o) => create_with(self.namespaces(), o).await,
            Object::Secret(o) => create_with(self.namespaced::<Secret>(ns)?, o).await,
            Object::Role(o) => create_with(self.namespaced::<Role>(ns)?, o).await,
            Object::RoleBinding(o) => create_with(self.namespaced::<RoleBinding>(ns)?, o).await,
            Object::ServiceAccount(o) => {
                create_with(self.namespaced::<ServiceAccount>(ns)?, o).await
            }
            Object::ConfigMap(o) => create_with(self.namespaced::<ConfigMap>(ns)?, o).await,
            Object::NetworkPolicy(o) => {
                create_with(self.namespaced::<NetworkPolicy>(ns)?, o).await
            }
            Object::Service(o) => create_with(self.namespaced::<Service>(ns)?, o).await,
            Object::StatefulSet(o) => create_with(self.namespaced::<StatefulSet>(ns)?, o).await,
            Object::CronJob(o) => create_with(self.namespaced::<CronJob>(ns)?, o).await,
            Object::Deployment(o) => create_with(self.namespaced::<Deployment>(ns)?, o).await,
            Object::Ingress(o) => create_with(self.namespaced::<Ingress>(ns)?, o).await,
        }
    }

    async fn get(&self, kind: Kind, namespace: Option<&str>, name: &str) -> Result<Object> {
        match kind {
            Kind::Namespace => get_with(self.namespaces(), name).await,
            Kind::Secret => get_with(self.namespaced::<Secret>(namespace)?, name).await,
            Kind::Role => get_with(self.namespaced::<Role>(namespace)?, name).await,
            Kind::RoleBinding => get_with(self.namespaced::<RoleBinding>(namespace)?, name).await,
            Kind::ServiceAccount => {
                get_with(self.namespaced::<ServiceAccount>(namespace)?, name).await
            }
            Kind::ConfigMap => get_with(self.namespaced::<ConfigMap>(namespace)?, name).await,
            Kind::NetworkPolicy => {
                get_with(self.namespaced::<NetworkPolicy>(namespace)?, name).await
            }
            Kind::Service => get_with(self.namespaced::<Service>(namespace)?, name).await,
            Kind::StatefulSet => get_with(self.namespaced::<StatefulSet>(namespace)?, name).await,
            Kind::CronJob => get_with(self.namespaced::<CronJob>(namespace)?, name).await,
            Kind::Deployment => get_with(self.namespaced::<Deployment>(namespace)?, name).await,
            Kind::Ingress => get_with(self.namespaced::<Ingress>(namespace)?, name).await,
        }
    }

    async fn replace(&self, object: &Object) -> Result<()> {
        debug!(kind = %object.kind(), name = object.name(), "replacing");
        let ns = object.namespace();
        let name = object.name();
        match object {
            Object::Namespace(o) => replace_with(self.namespaces(), name, o).await,
            Object::Secret(o) => replace_with(self.namespaced::<Secret>(ns)?, name, o).await,
            Object::Role(o) => replace_with(self.namespaced::<Role>(ns)?, name, o).await,
            Object::RoleBinding(o) => {
                replace_with(self.namespaced::<RoleBinding>(ns)?, name, o).await
            }
            Object::ServiceAccount(o) => {
                replace_with(self.namespaced::<ServiceAccount>(ns)?, name, o).await
            }
            Object::ConfigMap(o) => replace_with(self.namespaced::<ConfigMap>(ns)?, name, o).await,
            Object::NetworkPolicy(o) => {
                replace_with(self.namespaced::<NetworkPolicy>(ns)?, name, o).await
            }
            Object::Service(o) => replace_with(self.namespaced::<Service>(ns)?, name, o).await,
            Object::StatefulSet(o) => {
                replace_with(self.namespaced::<StatefulSet>(ns)?, name, o).await
            }
            Object::CronJob(o) => replace_with(self.namespaced::<CronJob>(ns)?, name, o).await,
            Object::Deployment(o) => {
                replace_with(self.namespaced::<Deployment>(ns)?, name, o).await
            }
            Object::Ingress(o) => replace_with(self.namespaced::<Ingress>(ns)?, name, o).await,
        }
    }

    async fn delete(&self, kind: Kind, namespace: Option<&str>, name: &str) -> Result<()> {
        debug!(%kind, name, "deleting");
        match kind {
            Kind::Namespace => delete_with(self.namespaces(), name).await,
            Kind::Secret => delete_with(self.namespaced::<Secret>(namespace)?, name).await,
            Kind::Role => delete_with(self.namespaced::<Role>(namespace)?, name).await,
            Kind::RoleBinding => {
                delete_with(self.namespaced::<RoleBinding>(namespace)?, name).await
            }
            Kind::ServiceAccount => {
                delete_with(self.namespaced::<ServiceAccount>(namespace)?, name).await
            }
            Kind::ConfigMap => delete_with(self.namespaced::<ConfigMap>(namespace)?, name).await,
            Kind::NetworkPolicy => {
                delete_with(self.namespaced::<NetworkPolicy>(namespace)?, name).await
            }
            Kind::Service => delete_with(self.namespaced::<Service>(namespace)?, name).await,
            Kind::StatefulSet => {
                delete_with(self.namespaced::<StatefulSet>(namespace)?, name).await
            }
            Kind::CronJob => delete_with(self.namespaced::<CronJob>(namespace)?, name).await,
            Kind::Deployment => {
                delete_with(self.namespaced::<Deployment>(namespace)?, name).await
            }
            Kind::Ingress => delete_with(self.namespaced::<Ingress>(namespace)?, name).await,
        }
    }
}
