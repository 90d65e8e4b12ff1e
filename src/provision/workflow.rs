use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::orchestrator::provision;
use crate::config::PlatformSettings;
use crate::error::{Error, Result};
use crate::k8s::{Cluster, RbacRepo};
use crate::microservice::SimpleMicroserviceRepo;
use crate::resources::labels::label_value;
use crate::resources::{
    MongoSettings, ResourceSettings, Resources, validate_application_id, validate_environment_name,
};
use crate::store::DocumentStore;
use crate::types::{
    Application, ApplicationStatus, CustomerTenantHost, CustomerTenantInfo, DolittleIds,
    Environment, IngressPath, Microservice, MicroserviceDocument, SimpleExtra, Tenant,
};

pub const WELCOME_MICROSERVICE_NAME: &str = "Welcome";

/// What a caller asks for when provisioning.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    pub tenant: Tenant,
    pub application_id: String,
    pub application_name: String,
    pub environments: Vec<String>,
}

impl ProvisionRequest {
    /// Rejects ids and environment names that cannot become object names.
    pub fn validate(&self) -> Result<()> {
        validate_application_id(&self.application_id)?;
        if self.environments.is_empty() {
            return Err(Error::BadRequest(
                "at least one environment is required".to_string(),
            ));
        }
        for environment in &self.environments {
            validate_environment_name(environment)?;
        }
        Ok(())
    }
}

/// Ties the cluster, the store and the platform settings together for the
/// provisioning workflow.
#[derive(Clone)]
pub struct Provisioner {
    cluster: Arc<dyn Cluster>,
    store: Arc<dyn DocumentStore>,
    rbac: RbacRepo,
    microservices: SimpleMicroserviceRepo,
    settings: PlatformSettings,
    mongo: MongoSettings,
}

impl Provisioner {
    #[must_use]
    pub fn new(
        cluster: Arc<dyn Cluster>,
        store: Arc<dyn DocumentStore>,
        settings: PlatformSettings,
        mongo: MongoSettings,
    ) -> Self {
        Self {
            rbac: RbacRepo::new(cluster.clone()),
            microservices: SimpleMicroserviceRepo::new(cluster.clone()),
            cluster,
            store,
            settings,
            mongo,
        }
    }

    /// A control plane only provisions tenants that belong to its own
    /// platform environment. Tenants without a Terraform document pass.
    pub fn check_platform_environment(&self, tenant_id: &str) -> Result<()> {
        let Some(tenant) = self.store.get_terraform_tenant(tenant_id)? else {
            return Ok(());
        };
        if tenant.platform_environment != self.settings.platform_environment {
            return Err(Error::Forbidden(format!(
                "tenant {tenant_id} belongs to platform environment '{}', this is '{}'",
                tenant.platform_environment, self.settings.platform_environment
            )));
        }
        Ok(())
    }

    /// Builds the resource graph for `application` without touching the
    /// cluster, applying the tenant's Terraform overrides.
    pub fn resources(&self, tenant: &Tenant, application: &Application) -> Result<Resources> {
        let terraform_tenant = self.store.get_terraform_tenant(&tenant.id)?;
        let terraform_application = self
            .store
            .get_terraform_application(&tenant.id, &application.id)?;

        let azure_group_id = terraform_tenant
            .as_ref()
            .and_then(|t| t.azure_group_id.as_deref())
            .unwrap_or(&self.settings.azure_group_id);
        let storage = terraform_application
            .as_ref()
            .and_then(|a| a.storage.as_ref())
            .unwrap_or(&self.settings.storage);

        Ok(Resources::new(
            tenant,
            application,
            &ResourceSettings {
                azure_group_id,
                acr: &self.settings.acr,
                storage,
                mongo: &self.mongo,
                local_dev_user: self.settings.local_dev_user.as_deref(),
            },
        ))
    }

    /// Provisions the application's namespace, then a welcome microservice
    /// for every environment that does not have one yet, and records the
    /// welcome ids on `application`.
    pub async fn create_application_and_environment_and_welcome_microservice(
        &self,
        tenant: &Tenant,
        application: &mut Application,
    ) -> Result<()> {
        for environment in &mut application.environments {
            if environment.customer_tenants.is_empty() {
                let generated = self.generate_customer_tenant(&application.name, &environment.name);
                info!(
                    environment = %environment.name,
                    customer_tenant_id = %generated.customer_tenant_id,
                    "generated customer tenant"
                );
                environment.customer_tenants.push(generated);
            }
        }

        let resources = self.resources(tenant, application)?;
        provision(self.cluster.as_ref(), &resources, &self.rbac).await?;

        for index in 0..application.environments.len() {
            if !application.environments[index].welcome_microservice_id.is_empty() {
                continue;
            }

            let microservice_id = Uuid::new_v4().to_string();
            let mut environment = application.environments[index].clone();
            for customer_tenant in &mut environment.customer_tenants {
                customer_tenant.link_microservice(&microservice_id);
            }

            let welcome = self.welcome_microservice(tenant, application, &environment, &microservice_id);
            self.microservices
                .create(tenant, application, &environment, &welcome)
                .await?;
            self.store
                .save_microservice(&tenant.id, &MicroserviceDocument::Simple(welcome))?;

            environment.welcome_microservice_id = microservice_id;
            application.environments[index] = environment;
        }

        Ok(())
    }

    /// Runs the whole workflow for a request and persists the application with
    /// its outcome. The request is validated before anything is written; the
    /// application is saved as running before any cluster work starts.
    pub async fn provision_application(&self, request: ProvisionRequest) -> Result<Application> {
        request.validate()?;
        let tenant = request.tenant;
        self.check_platform_environment(&tenant.id)?;

        let mut application = match self.store.get_application(&tenant.id, &request.application_id) {
            Ok(existing) => existing,
            Err(Error::NotFound) => {
                Application::new(&tenant, &request.application_id, &request.application_name)
            }
            Err(e) => return Err(e),
        };
        for name in &request.environments {
            application.upsert_environment(Environment::new(name));
        }

        application.status = ApplicationStatus::running(Utc::now());
        self.store.save_application(&application)?;

        let outcome = self
            .create_application_and_environment_and_welcome_microservice(&tenant, &mut application)
            .await;

        match &outcome {
            Ok(()) => {
                application.status.finish(Utc::now());
                info!(application_id = %application.id, "application provisioned");
            }
            Err(e) => {
                application.status.fail(Utc::now(), e.to_string());
                error!(application_id = %application.id, error = %e, "application failed");
            }
        }

        if let Err(save) = self.store.save_application(&application) {
            warn!(application_id = %application.id, error = %save, "could not record outcome");
            outcome?;
            return Err(save);
        }

        outcome.map(|()| application)
    }

    fn generate_customer_tenant(&self, application_name: &str, environment: &str) -> CustomerTenantInfo {
        let prefix = format!(
            "{}-{}",
            label_value(application_name).to_lowercase(),
            environment.to_lowercase()
        );
        CustomerTenantInfo {
            customer_tenant_id: Uuid::new_v4().to_string(),
            environment: environment.to_string(),
            hosts: vec![CustomerTenantHost {
                host: format!("{prefix}.{}", self.settings.external_host_suffix),
                secret_name: format!("{prefix}-certificate"),
            }],
            microservices_rel: Vec::new(),
        }
    }

    fn welcome_microservice(
        &self,
        tenant: &Tenant,
        application: &Application,
        environment: &Environment,
        microservice_id: &str,
    ) -> Microservice<SimpleExtra> {
        Microservice {
            dolittle: DolittleIds {
                application_id: application.id.clone(),
                customer_id: tenant.id.clone(),
                microservice_id: microservice_id.to_string(),
            },
            name: WELCOME_MICROSERVICE_NAME.to_string(),
            environment: environment.name.clone(),
            extra: SimpleExtra {
                head_image: self.settings.welcome_image.clone(),
                runtime_image: None,
                ingress: IngressPath::default(),
                is_public: true,
                head_port: 80,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::config::GitRepoConfig;
    use crate::k8s::{Kind, MemoryCluster, Verb};
    use crate::store::GitStore;
    use crate::types::{State, TerraformTenant};

    struct Fixture {
        _temp: TempDir,
        cluster: Arc<MemoryCluster>,
        store: Arc<GitStore>,
        provisioner: Provisioner,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(
            GitStore::open(GitRepoConfig {
                directory: temp.path().to_path_buf(),
                directory_only: true,
                ..GitRepoConfig::default()
            })
            .unwrap(),
        );
        let cluster = Arc::new(MemoryCluster::new());
        let provisioner = Provisioner::new(
            cluster.clone(),
            store.clone(),
            PlatformSettings::default(),
            MongoSettings::default(),
        );
        Fixture {
            _temp: temp,
            cluster,
            store,
            provisioner,
        }
    }

    fn request(environments: &[&str]) -> ProvisionRequest {
        ProvisionRequest {
            tenant: Tenant {
                id: "fake-customer-id".to_string(),
                name: "Customer".to_string(),
            },
            application_id: "fake-application-id".to_string(),
            application_name: "Taco".to_string(),
            environments: environments.iter().map(ToString::to_string).collect(),
        }
    }

    #[tokio::test]
    async fn test_welcome_microservice_is_created_and_linked() {
        let f = fixture();
        let application = f.provisioner.provision_application(request(&["Dev"])).await.unwrap();

        let env = &application.environments[0];
        assert!(!env.welcome_microservice_id.is_empty());
        assert_eq!(env.customer_tenants.len(), 1);
        let host = &env.customer_tenants[0].hosts[0];
        assert_eq!(host.host, "taco-dev.dolittle.cloud");
        assert_eq!(host.secret_name, "taco-dev-certificate");
        assert_eq!(
            env.customer_tenants[0].microservices_rel[0].microservice_id,
            env.welcome_microservice_id
        );

        let stored = f
            .store
            .get_microservice("fake-customer-id", "fake-application-id", "Dev", &env.welcome_microservice_id)
            .unwrap();
        assert_eq!(stored.name(), WELCOME_MICROSERVICE_NAME);
        assert!(f.cluster.contains(
            Kind::Deployment,
            Some("application-fake-application-id"),
            "dev-welcome"
        ));
        assert_eq!(application.status.state, State::Finished);
    }

    #[tokio::test]
    async fn test_reprovisioning_keeps_welcome_microservice() {
        let f = fixture();
        let first = f.provisioner.provision_application(request(&["Dev"])).await.unwrap();
        let creates = f.cluster.created().len();

        let second = f.provisioner.provision_application(request(&["dev"])).await.unwrap();

        assert_eq!(
            second.environments[0].welcome_microservice_id,
            first.environments[0].welcome_microservice_id
        );
        assert_eq!(second.environments.len(), 1);
        assert_eq!(f.cluster.created().len(), creates);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_on_the_application() {
        let f = fixture();
        f.cluster.fail_on(Verb::Create, Kind::CronJob, "dev-mongo-backup");

        let result = f.provisioner.provision_application(request(&["Dev"])).await;
        assert!(result.is_err());

        let stored = f
            .store
            .get_application("fake-customer-id", "fake-application-id")
            .unwrap();
        assert_eq!(stored.status.state, State::Failed);
        assert!(stored.status.message.is_some());
        assert!(stored.status.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_invalid_request_writes_nothing() {
        let f = fixture();
        let mut invalid_id = request(&["Dev"]);
        invalid_id.application_id = "My_App".to_string();
        let invalid_environment = request(&["my env"]);

        for request in [invalid_id, invalid_environment, request(&[])] {
            let result = f.provisioner.provision_application(request).await;
            assert!(matches!(result, Err(Error::BadRequest(_))));
        }

        assert!(f.cluster.actions().is_empty());
        assert!(f.store.get_applications("fake-customer-id").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_platform_environment_is_forbidden() {
        let f = fixture();
        f.store
            .save_terraform_tenant(&TerraformTenant {
                id: "fake-customer-id".to_string(),
                name: "Customer".to_string(),
                platform_environment: "prod".to_string(),
                azure_group_id: None,
            })
            .unwrap();

        let result = f.provisioner.provision_application(request(&["Dev"])).await;

        assert!(matches!(result, Err(Error::Forbidden(_))));
        assert!(f.cluster.actions().is_empty());
    }

    #[tokio::test]
    async fn test_terraform_group_overrides_setting() {
        let f = fixture();
        f.store
            .save_terraform_tenant(&TerraformTenant {
                id: "fake-customer-id".to_string(),
                name: "Customer".to_string(),
                platform_environment: "dev".to_string(),
                azure_group_id: Some("tenant-group".to_string()),
            })
            .unwrap();
        let tenant = request(&[]).tenant;
        let application = Application::new(&tenant, "fake-application-id", "Taco");

        let resources = f.provisioner.resources(&tenant, &application).unwrap();
        let subjects = resources.rbac.role_binding.subjects.unwrap();
        assert_eq!(subjects[0].name, "tenant-group");
    }
}
