//! Desired-state Kubernetes objects for an application.
//!
//! Everything here is a pure function of its inputs: the same tenant,
//! application, environments and settings always produce the same object
//! names, which is what lets an existing namespace stand in for "already
//! provisioned".

pub mod labels;
pub mod mongo;
pub mod network_policy;
mod quantity;
pub mod rbac;
pub mod secrets;
pub mod tenants;

use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, ServiceAccount};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;

pub use labels::{Owner, namespace_name, validate_application_id, validate_environment_name};
pub use mongo::{MongoResources, MongoSettings};
pub use quantity::validate_quantity;

use crate::types::{AcrCredentials, Application, Environment, StorageCredentials, Tenant};

/// Inputs to the builder that do not come from the application itself.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSettings<'a> {
    pub azure_group_id: &'a str,
    pub acr: &'a AcrCredentials,
    pub storage: &'a StorageCredentials,
    pub mongo: &'a MongoSettings,
    pub local_dev_user: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Rbac {
    pub role: Role,
    pub role_binding: RoleBinding,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceAccountResources {
    pub service_account: ServiceAccount,
    pub role_binding: RoleBinding,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentResources {
    pub name: String,
    pub mongo: MongoResources,
    pub network_policy: NetworkPolicy,
    pub tenants_config_map: ConfigMap,
    pub rbac_policy_rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resources {
    pub namespace: Namespace,
    pub acr: Secret,
    pub storage: Secret,
    pub rbac: Rbac,
    pub service_accounts: Vec<ServiceAccountResources>,
    pub environments: Vec<EnvironmentResources>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_dev_role_binding: Option<RoleBinding>,
}

impl Resources {
    /// Builds the full graph for every environment declared on `application`.
    #[must_use]
    pub fn new(tenant: &Tenant, application: &Application, settings: &ResourceSettings<'_>) -> Self {
        let owner = Owner::application(tenant, application);

        let environments = application
            .environments
            .iter()
            .map(|environment| {
                EnvironmentResources::new(tenant, application, environment, settings.mongo)
            })
            .collect();

        Self {
            namespace: namespace(&owner),
            acr: secrets::acr_secret(&owner, settings.acr),
            storage: secrets::storage_secret(&owner, settings.storage),
            rbac: Rbac {
                role: rbac::developer_role(&owner),
                role_binding: rbac::developer_role_binding(&owner, settings.azure_group_id),
            },
            service_accounts: vec![ServiceAccountResources {
                service_account: rbac::devops_service_account(&owner),
                role_binding: rbac::devops_role_binding(&owner),
            }],
            environments,
            local_dev_role_binding: settings
                .local_dev_user
                .map(|user| rbac::local_dev_role_binding(&owner, user)),
        }
    }

    #[must_use]
    pub fn namespace_name(&self) -> &str {
        self.namespace.metadata.name.as_deref().unwrap_or_default()
    }
}

impl EnvironmentResources {
    #[must_use]
    pub fn new(
        tenant: &Tenant,
        application: &Application,
        environment: &Environment,
        mongo: &MongoSettings,
    ) -> Self {
        let owner = Owner::environment(tenant, application, &environment.name);

        Self {
            name: environment.name.clone(),
            mongo: MongoResources::new(&owner, &environment.name, mongo),
            network_policy: network_policy::network_policy(&owner, &environment.name),
            tenants_config_map: tenants::tenants_config_map(
                &owner,
                &environment.name,
                &environment.customer_tenants,
            ),
            rbac_policy_rules: rbac::environment_policy_rules(&mongo::mongo_pod_name(
                &environment.name,
            )),
        }
    }
}

fn namespace(owner: &Owner<'_>) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(owner.namespace()),
            labels: Some(owner.labels()),
            annotations: Some(owner.annotations()),
            ..Default::default()
        },
        ..Default::default()
    }
}
