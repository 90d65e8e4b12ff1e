use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{AcrCredentials, StorageCredentials};

pub const PLATFORM_ENVIRONMENTS: &[&str] = &["dev", "prod"];

/// Settings applied to every application this control plane provisions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    /// `dev` or `prod`.
    pub platform_environment: String,
    /// Azure AD group bound to the developer role, unless the tenant's
    /// Terraform document names its own.
    pub azure_group_id: String,
    pub acr: AcrCredentials,
    pub storage: StorageCredentials,
    /// Generated customer tenant hosts are `{application}-{environment}.{suffix}`.
    pub external_host_suffix: String,
    pub welcome_image: String,
    /// When set, a `local-dev` role binding for this user is added to every namespace.
    pub local_dev_user: Option<String>,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            platform_environment: "dev".to_string(),
            azure_group_id: String::new(),
            acr: AcrCredentials::default(),
            storage: StorageCredentials::default(),
            external_host_suffix: "dolittle.cloud".to_string(),
            welcome_image: "nginxdemos/hello:latest".to_string(),
            local_dev_user: None,
        }
    }
}

impl PlatformSettings {
    pub fn validate(&self) -> Result<()> {
        if !PLATFORM_ENVIRONMENTS.contains(&self.platform_environment.as_str()) {
            return Err(Error::Config(format!(
                "platform environment must be one of {PLATFORM_ENVIRONMENTS:?}, got '{}'",
                self.platform_environment
            )));
        }
        Ok(())
    }
}
