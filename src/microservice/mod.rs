//! Microservices running inside an application namespace.

mod env_variables;
pub mod simple;

use std::sync::Arc;

use tracing::{info, warn};

pub use env_variables::{
    EnvironmentVariable, get_environment_variables, update_environment_variables,
    validate_environment_variable,
};
pub use simple::SimpleMicroserviceResources;

use crate::error::{Error, Result};
use crate::k8s::{Cluster, Kind};
use crate::resources::{Owner, namespace_name};
use crate::types::{Application, Environment, Microservice, SimpleExtra, Tenant};

/// Creates and removes the cluster objects of simple microservices.
#[derive(Clone)]
pub struct SimpleMicroserviceRepo {
    cluster: Arc<dyn Cluster>,
}

impl SimpleMicroserviceRepo {
    #[must_use]
    pub fn new(cluster: Arc<dyn Cluster>) -> Self {
        Self { cluster }
    }

    pub async fn create(
        &self,
        tenant: &Tenant,
        application: &Application,
        environment: &Environment,
        microservice: &Microservice<SimpleExtra>,
    ) -> Result<()> {
        let owner = Owner::environment(tenant, application, &environment.name);
        let resources =
            SimpleMicroserviceResources::new(&owner, microservice, &environment.customer_tenants);

        for object in resources.into_objects() {
            self.cluster.create(&object).await?;
        }

        info!(
            microservice_id = %microservice.dolittle.microservice_id,
            name = %microservice.name,
            environment = %environment.name,
            "created microservice"
        );
        Ok(())
    }

    /// Deletes the fixed set of objects named after the microservice; objects
    /// that are already gone are skipped. Ingresses are left to namespace
    /// cleanup since their names depend on the customer tenants.
    pub async fn delete(&self, application_id: &str, environment: &str, name: &str) -> Result<()> {
        let namespace = namespace_name(application_id);
        let objects = [
            (Kind::Deployment, simple::object_name(environment, name)),
            (Kind::Service, simple::object_name(environment, name)),
            (Kind::Secret, simple::secret_env_variables_name(environment, name)),
            (Kind::ConfigMap, simple::config_files_name(environment, name)),
            (Kind::ConfigMap, simple::env_variables_name(environment, name)),
            (Kind::ConfigMap, simple::dolittle_config_name(environment, name)),
        ];

        for (kind, object) in &objects {
            match self.cluster.delete(*kind, Some(&namespace), object).await {
                Ok(()) => {}
                Err(Error::NotFound) => warn!(%kind, object, "already deleted"),
                Err(e) => return Err(e),
            }
        }

        info!(application_id, environment, name, "deleted microservice");
        Ok(())
    }
}
