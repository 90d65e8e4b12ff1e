use serde::{Deserialize, Serialize};

use super::StorageCredentials;

/// Facts about a tenant produced by the infrastructure plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerraformTenant {
    pub id: String,
    pub name: String,
    /// `dev` or `prod`; only a control plane running in the same platform
    /// environment may provision this tenant.
    pub platform_environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_group_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerraformApplication {
    pub id: String,
    pub name: String,
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageCredentials>,
}
