use std::sync::Arc;

use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{info, warn};

use super::{Cluster, create, get, replace};
use crate::error::{Error, Result};

/// Mutations on roles, role bindings and service accounts that already exist.
#[derive(Clone)]
pub struct RbacRepo {
    cluster: Arc<dyn Cluster>,
}

impl RbacRepo {
    #[must_use]
    pub fn new(cluster: Arc<dyn Cluster>) -> Self {
        Self { cluster }
    }

    /// Creates the account, reporting [`Error::AlreadyExists`] when it is there.
    pub async fn create_service_account(&self, service_account: &ServiceAccount) -> Result<()> {
        create(self.cluster.as_ref(), service_account).await?;
        info!(
            name = service_account.metadata.name.as_deref().unwrap_or_default(),
            "created service account"
        );
        Ok(())
    }

    /// Adds the account as a subject of the binding, reporting
    /// [`Error::AlreadyExists`] when it is already one.
    pub async fn add_service_account_to_role_binding(
        &self,
        namespace: &str,
        role_binding: &str,
        service_account: &str,
    ) -> Result<()> {
        let mut binding: RoleBinding =
            get(self.cluster.as_ref(), Some(namespace), role_binding).await?;

        let subjects = binding.subjects.get_or_insert_with(Vec::new);
        if subjects
            .iter()
            .any(|s| s.kind == "ServiceAccount" && s.name == service_account)
        {
            return Err(Error::AlreadyExists);
        }
        subjects.push(Subject {
            api_group: None,
            kind: "ServiceAccount".to_string(),
            name: service_account.to_string(),
            namespace: Some(namespace.to_string()),
        });

        replace(self.cluster.as_ref(), &binding).await?;
        info!(role_binding, service_account, "attached service account");
        Ok(())
    }

    /// Removes the account from the binding's subjects if present.
    pub async fn remove_service_account_from_role_binding(
        &self,
        namespace: &str,
        role_binding: &str,
        service_account: &str,
    ) -> Result<()> {
        let mut binding: RoleBinding =
            get(self.cluster.as_ref(), Some(namespace), role_binding).await?;
        if let Some(subjects) = binding.subjects.as_mut() {
            subjects.retain(|s| !(s.kind == "ServiceAccount" && s.name == service_account));
        }
        replace(self.cluster.as_ref(), &binding).await
    }

    /// Creates the account and attaches it to the binding; either half already
    /// being in place is skipped.
    pub async fn add_service_account(
        &self,
        namespace: &str,
        service_account: &str,
        role_binding: &str,
    ) -> Result<()> {
        let account = ServiceAccount {
            metadata: ObjectMeta {
                name: Some(service_account.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        match self.create_service_account(&account).await {
            Ok(()) => {}
            Err(Error::AlreadyExists) => {
                warn!(service_account, "service account already exists, skipping");
            }
            Err(e) => return Err(e),
        }

        match self
            .add_service_account_to_role_binding(namespace, role_binding, service_account)
            .await
        {
            Err(Error::AlreadyExists) => {
                warn!(service_account, role_binding, "already bound, skipping");
                Ok(())
            }
            other => other,
        }
    }

    /// Appends the rule to the role unless an identical rule is present.
    ///
    /// Returns whether the role changed.
    pub async fn add_policy_rule(&self, namespace: &str, role: &str, rule: PolicyRule) -> Result<bool> {
        let mut current: Role = get(self.cluster.as_ref(), Some(namespace), role).await?;
        let rules = current.rules.get_or_insert_with(Vec::new);
        if rules.contains(&rule) {
            return Ok(false);
        }
        rules.push(rule);
        replace(self.cluster.as_ref(), &current).await?;
        Ok(true)
    }

    /// Removes every rule equal to `rule` from the role.
    pub async fn remove_policy_rule(&self, namespace: &str, role: &str, rule: &PolicyRule) -> Result<()> {
        let mut current: Role = get(self.cluster.as_ref(), Some(namespace), role).await?;
        if let Some(rules) = current.rules.as_mut() {
            rules.retain(|r| r != rule);
        }
        replace(self.cluster.as_ref(), &current).await
    }
}
