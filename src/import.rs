//! Importing tenant and application facts from `terraform output -json`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::store::DocumentStore;
use crate::types::{TerraformApplication, TerraformTenant};

/// One named output as written by `terraform output -json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputValue<T> {
    #[serde(default)]
    pub sensitive: bool,
    pub value: T,
}

/// The outputs the platform reads; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TerraformOutput {
    pub customers: OutputValue<Vec<TerraformTenant>>,
    pub applications: OutputValue<Vec<TerraformApplication>>,
}

impl TerraformOutput {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub tenants: Vec<String>,
    pub applications: Vec<String>,
    pub skipped: Vec<String>,
}

/// Writes `tenant.json` and `terraform.json` documents.
///
/// Tenants of another platform environment are skipped, as are tenants whose
/// studio config turns `buildOverwrite` off; their applications go with them.
pub fn import_terraform(
    store: &dyn DocumentStore,
    output: &TerraformOutput,
    platform_environment: &str,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    let mut allowed = BTreeSet::new();

    for tenant in &output.customers.value {
        if tenant.platform_environment != platform_environment {
            warn!(
                tenant_id = %tenant.id,
                platform_environment = %tenant.platform_environment,
                "tenant belongs to another platform environment, skipping"
            );
            summary.skipped.push(tenant.id.clone());
            continue;
        }
        if !store.get_studio_config(&tenant.id)?.build_overwrite {
            warn!(tenant_id = %tenant.id, "studio config disallows overwrite, skipping");
            summary.skipped.push(tenant.id.clone());
            continue;
        }

        store.save_terraform_tenant(tenant)?;
        allowed.insert(tenant.id.as_str());
        summary.tenants.push(tenant.id.clone());
    }

    for application in &output.applications.value {
        if !allowed.contains(application.tenant_id.as_str()) {
            continue;
        }
        store.save_terraform_application(application)?;
        summary.applications.push(application.id.clone());
    }

    info!(
        tenants = summary.tenants.len(),
        applications = summary.applications.len(),
        skipped = summary.skipped.len(),
        "imported terraform output"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::config::GitRepoConfig;
    use crate::store::GitStore;
    use crate::types::StudioConfig;

    const OUTPUT: &str = r#"{
        "customers": {
            "sensitive": false,
            "type": ["list", "object"],
            "value": [
                {"id": "dev-tenant", "name": "Dev Co", "platformEnvironment": "dev", "azureGroupId": "g1"},
                {"id": "locked-tenant", "name": "Locked", "platformEnvironment": "dev"},
                {"id": "prod-tenant", "name": "Prod Co", "platformEnvironment": "prod"}
            ]
        },
        "applications": {
            "sensitive": true,
            "value": [
                {"id": "a1", "name": "Taco", "tenantId": "dev-tenant",
                 "storage": {"accountName": "acc", "accountKey": "key"}},
                {"id": "a2", "name": "Burrito", "tenantId": "locked-tenant"},
                {"id": "a3", "name": "Nacho", "tenantId": "prod-tenant"}
            ]
        },
        "unrelated": {"value": 1}
    }"#;

    #[test]
    fn test_import_honors_gates() {
        let temp = TempDir::new().unwrap();
        let store = GitStore::open(GitRepoConfig {
            directory: temp.path().to_path_buf(),
            directory_only: true,
            ..GitRepoConfig::default()
        })
        .unwrap();
        store
            .save_studio_config(
                "locked-tenant",
                &StudioConfig {
                    build_overwrite: false,
                    ..StudioConfig::default()
                },
            )
            .unwrap();

        let output = TerraformOutput::from_json(OUTPUT).unwrap();
        let summary = import_terraform(&store, &output, "dev").unwrap();

        assert_eq!(summary.tenants, vec!["dev-tenant"]);
        assert_eq!(summary.applications, vec!["a1"]);
        assert_eq!(summary.skipped, vec!["locked-tenant", "prod-tenant"]);

        let tenant = store.get_terraform_tenant("dev-tenant").unwrap().unwrap();
        assert_eq!(tenant.azure_group_id.as_deref(), Some("g1"));
        let application = store.get_terraform_application("dev-tenant", "a1").unwrap().unwrap();
        assert_eq!(application.storage.unwrap().account_name, "acc");
        assert!(store.get_terraform_tenant("locked-tenant").unwrap().is_none());
    }

    #[test]
    fn test_missing_outputs_import_nothing() {
        let output = TerraformOutput::from_json("{}").unwrap();
        assert!(output.customers.value.is_empty());
        assert!(output.applications.value.is_empty());
    }
}
