pub mod path;
mod git;

pub use git::GitStore;

use crate::error::Result;
use crate::types::*;

/// DocumentStore defines the platform's persistent state.
///
/// Every write is pull, write, commit and push against one working tree.
/// Reads never pull, except listing tenants.
pub trait DocumentStore: Send + Sync {
    /// Fast-forwards the working tree from the remote branch.
    fn pull(&self) -> Result<()>;

    // Tenant operations
    fn get_tenants(&self) -> Result<Vec<String>>;
    fn get_studio_config(&self, tenant_id: &str) -> Result<StudioConfig>;
    fn save_studio_config(&self, tenant_id: &str, config: &StudioConfig) -> Result<()>;

    // Application operations
    fn get_application(&self, tenant_id: &str, application_id: &str) -> Result<Application>;
    fn get_applications(&self, tenant_id: &str) -> Result<Vec<Application>>;
    fn save_application(&self, application: &Application) -> Result<()>;

    // Microservice operations
    fn get_microservice(
        &self,
        tenant_id: &str,
        application_id: &str,
        environment: &str,
        microservice_id: &str,
    ) -> Result<MicroserviceDocument>;
    fn get_microservices(
        &self,
        tenant_id: &str,
        application_id: &str,
    ) -> Result<Vec<MicroserviceDocument>>;
    fn save_microservice(&self, tenant_id: &str, microservice: &MicroserviceDocument) -> Result<()>;
    fn delete_microservice(
        &self,
        tenant_id: &str,
        application_id: &str,
        environment: &str,
        microservice_id: &str,
    ) -> Result<()>;

    // Business moment operations (business moments adaptors only)
    fn get_business_moments(
        &self,
        tenant_id: &str,
        application_id: &str,
        environment: &str,
    ) -> Result<BusinessMoments>;
    fn save_business_moment(
        &self,
        tenant_id: &str,
        application_id: &str,
        environment: &str,
        microservice_id: &str,
        moment: BusinessMoment,
    ) -> Result<()>;
    fn delete_business_moment(
        &self,
        tenant_id: &str,
        application_id: &str,
        environment: &str,
        microservice_id: &str,
        moment_type_id: &str,
    ) -> Result<()>;
    fn save_business_moment_entity(
        &self,
        tenant_id: &str,
        application_id: &str,
        environment: &str,
        microservice_id: &str,
        entity: BusinessMomentEntity,
    ) -> Result<()>;
    fn delete_business_moment_entity(
        &self,
        tenant_id: &str,
        application_id: &str,
        environment: &str,
        microservice_id: &str,
        entity_type_id: &str,
    ) -> Result<()>;

    // Terraform operations
    fn get_terraform_tenant(&self, tenant_id: &str) -> Result<Option<TerraformTenant>>;
    fn save_terraform_tenant(&self, tenant: &TerraformTenant) -> Result<()>;
    fn get_terraform_application(
        &self,
        tenant_id: &str,
        application_id: &str,
    ) -> Result<Option<TerraformApplication>>;
    fn save_terraform_application(&self, application: &TerraformApplication) -> Result<()>;
}
