//! The cluster seam.
//!
//! Provisioning only ever talks to a [`Cluster`]; [`KubeCluster`] backs it with
//! a live API server and [`MemoryCluster`] with an in-process object map.

mod kube_cluster;
mod memory;
mod rbac;

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::{Ingress, NetworkPolicy};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;

pub use kube_cluster::KubeCluster;
pub use memory::{Action, MemoryCluster, Verb};
pub use rbac::RbacRepo;

use crate::error::{Error, Result};

macro_rules! objects {
    ($($kind:ident($ty:ty)),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum Kind {
            $($kind,)*
        }

        impl fmt::Display for Kind {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$kind => f.write_str(stringify!($kind)),)*
                }
            }
        }

        /// Any object the control plane creates.
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(untagged)]
        pub enum Object {
            $($kind($ty),)*
        }

        impl Object {
            #[must_use]
            pub fn kind(&self) -> Kind {
                match self {
                    $(Self::$kind(_) => Kind::$kind,)*
                }
            }

            #[must_use]
            pub fn metadata(&self) -> &ObjectMeta {
                match self {
                    $(Self::$kind(object) => &object.metadata,)*
                }
            }
        }

        $(
            impl From<$ty> for Object {
                fn from(object: $ty) -> Self {
                    Self::$kind(object)
                }
            }

            impl Typed for $ty {
                const KIND: Kind = Kind::$kind;

                fn from_object(object: Object) -> Option<Self> {
                    match object {
                        Object::$kind(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )*
    };
}

objects! {
    Namespace(Namespace),
    Secret(Secret),
    Role(Role),
    RoleBinding(RoleBinding),
    ServiceAccount(ServiceAccount),
    ConfigMap(ConfigMap),
    NetworkPolicy(NetworkPolicy),
    Service(Service),
    StatefulSet(StatefulSet),
    CronJob(CronJob),
    Deployment(Deployment),
    Ingress(Ingress),
}

impl Kind {
    #[must_use]
    pub fn is_namespaced(self) -> bool {
        self != Self::Namespace
    }
}

impl Object {
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.metadata().namespace.as_deref()
    }
}

/// A concrete object type that can be pulled back out of an [`Object`].
pub trait Typed: Sized + Into<Object> {
    const KIND: Kind;

    fn from_object(object: Object) -> Option<Self>;
}

/// Kubernetes-compatible API surface used by provisioning.
///
/// Implementations report conflicts as [`Error::AlreadyExists`] and missing
/// objects as [`Error::NotFound`].
#[async_trait]
pub trait Cluster: Send + Sync {
    async fn create(&self, object: &Object) -> Result<()>;

    async fn get(&self, kind: Kind, namespace: Option<&str>, name: &str) -> Result<Object>;

    async fn replace(&self, object: &Object) -> Result<()>;

    async fn delete(&self, kind: Kind, namespace: Option<&str>, name: &str) -> Result<()>;
}

/// Typed wrapper over [`Cluster::get`].
pub async fn get<K: Typed>(cluster: &dyn Cluster, namespace: Option<&str>, name: &str) -> Result<K> {
    let object = cluster.get(K::KIND, namespace, name).await?;
    let kind = object.kind();
    K::from_object(object).ok_or_else(|| {
        Error::BadRequest(format!("expected {} {name}, got {kind}", K::KIND))
    })
}

/// Typed wrapper over [`Cluster::create`].
pub async fn create<K: Typed + Clone>(cluster: &dyn Cluster, object: &K) -> Result<()> {
    cluster.create(&object.clone().into()).await
}

/// Typed wrapper over [`Cluster::replace`].
pub async fn replace<K: Typed + Clone>(cluster: &dyn Cluster, object: &K) -> Result<()> {
    cluster.replace(&object.clone().into()).await
}
