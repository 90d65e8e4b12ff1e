use k8s_openapi::api::rbac::v1::PolicyRule;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::k8s::{Cluster, Kind, Object, RbacRepo};
use crate::resources::Resources;

/// The inverse of one completed provisioning step.
#[derive(Debug, Clone, PartialEq)]
enum Undo {
    Delete {
        kind: Kind,
        namespace: Option<String>,
        name: String,
    },
    RemovePolicyRule {
        namespace: String,
        role: String,
        rule: PolicyRule,
    },
    DetachServiceAccount {
        namespace: String,
        role_binding: String,
        service_account: String,
    },
}

/// Undo actions for the steps completed so far, unwound last-in first-out.
#[derive(Debug, Default)]
struct Compensation {
    undos: Vec<Undo>,
}

impl Compensation {
    fn created(&mut self, object: &Object) {
        self.undos.push(Undo::Delete {
            kind: object.kind(),
            namespace: object.namespace().map(ToString::to_string),
            name: object.name().to_string(),
        });
    }

    /// Runs every undo in reverse. `NotFound` counts as already undone; the
    /// first other failure is returned after the remaining undos have run.
    async fn unwind(self, cluster: &dyn Cluster, rbac: &RbacRepo) -> Result<()> {
        let mut first_failure = None;

        for undo in self.undos.into_iter().rev() {
            let result = match &undo {
                Undo::Delete {
                    kind,
                    namespace,
                    name,
                } => cluster.delete(*kind, namespace.as_deref(), name).await,
                Undo::RemovePolicyRule {
                    namespace,
                    role,
                    rule,
                } => rbac.remove_policy_rule(namespace, role, rule).await,
                Undo::DetachServiceAccount {
                    namespace,
                    role_binding,
                    service_account,
                } => {
                    rbac.remove_service_account_from_role_binding(
                        namespace,
                        role_binding,
                        service_account,
                    )
                    .await
                }
            };

            match result {
                Ok(()) | Err(Error::NotFound) => {}
                Err(e) => {
                    error!(?undo, error = %e, "rollback step failed");
                    first_failure.get_or_insert(e);
                }
            }
        }

        first_failure.map_or(Ok(()), Err)
    }
}

/// Creates the application's objects in dependency order.
///
/// An existing namespace means the application was provisioned before, and the
/// call succeeds without touching anything else. Any later failure rolls back
/// every completed step, namespace last, and the original error is returned.
pub async fn provision(cluster: &dyn Cluster, resources: &Resources, rbac: &RbacRepo) -> Result<()> {
    let namespace = resources.namespace_name();

    match cluster.create(&resources.namespace.clone().into()).await {
        Ok(()) => info!(namespace, "created namespace"),
        Err(Error::AlreadyExists) => {
            warn!(namespace, "namespace already exists, skipping provisioning");
            return Ok(());
        }
        Err(e) => return Err(e),
    }

    let mut compensation = Compensation::default();
    compensation.created(&resources.namespace.clone().into());

    let Err(e) = apply(cluster, resources, rbac, &mut compensation).await else {
        info!(namespace, "provisioned application");
        return Ok(());
    };

    error!(namespace, error = %e, "provisioning failed, rolling back");
    match compensation.unwind(cluster, rbac).await {
        Ok(()) => Err(e),
        Err(rollback) => Err(Error::Rollback {
            source: Box::new(e),
            rollback: Box::new(rollback),
        }),
    }
}

async fn create_step(
    cluster: &dyn Cluster,
    compensation: &mut Compensation,
    object: impl Into<Object>,
) -> Result<()> {
    let object = object.into();
    cluster.create(&object).await?;
    info!(kind = %object.kind(), name = object.name(), "created");
    compensation.created(&object);
    Ok(())
}

async fn apply(
    cluster: &dyn Cluster,
    resources: &Resources,
    rbac: &RbacRepo,
    compensation: &mut Compensation,
) -> Result<()> {
    let namespace = resources.namespace_name();
    let role = resources.rbac.role.metadata.name.as_deref().unwrap_or_default();

    create_step(cluster, compensation, resources.acr.clone()).await?;
    create_step(cluster, compensation, resources.rbac.role.clone()).await?;
    create_step(cluster, compensation, resources.rbac.role_binding.clone()).await?;

    for account in &resources.service_accounts {
        let account_name = account
            .service_account
            .metadata
            .name
            .as_deref()
            .unwrap_or_default();
        let binding_name = account
            .role_binding
            .metadata
            .name
            .as_deref()
            .unwrap_or_default();

        match rbac.create_service_account(&account.service_account).await {
            Ok(()) => compensation.created(&account.service_account.clone().into()),
            Err(Error::AlreadyExists) => {
                warn!(service_account = account_name, "service account already exists");
            }
            Err(e) => return Err(e),
        }

        create_step(cluster, compensation, account.role_binding.clone()).await?;

        match rbac
            .add_service_account_to_role_binding(namespace, binding_name, account_name)
            .await
        {
            Ok(()) => compensation.undos.push(Undo::DetachServiceAccount {
                namespace: namespace.to_string(),
                role_binding: binding_name.to_string(),
                service_account: account_name.to_string(),
            }),
            Err(Error::AlreadyExists) => {
                warn!(service_account = account_name, binding_name, "already bound");
            }
            Err(e) => return Err(e),
        }
    }

    create_step(cluster, compensation, resources.storage.clone()).await?;

    for environment in &resources.environments {
        info!(environment = %environment.name, "provisioning environment");
        create_step(cluster, compensation, environment.tenants_config_map.clone()).await?;
        create_step(cluster, compensation, environment.network_policy.clone()).await?;
        create_step(cluster, compensation, environment.mongo.service.clone()).await?;
        create_step(cluster, compensation, environment.mongo.stateful_set.clone()).await?;
        create_step(cluster, compensation, environment.mongo.cron_job.clone()).await?;

        for rule in &environment.rbac_policy_rules {
            if rbac.add_policy_rule(namespace, role, rule.clone()).await? {
                compensation.undos.push(Undo::RemovePolicyRule {
                    namespace: namespace.to_string(),
                    role: role.to_string(),
                    rule: rule.clone(),
                });
            }
        }
    }

    if let Some(binding) = &resources.local_dev_role_binding {
        create_step(cluster, compensation, binding.clone()).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use k8s_openapi::api::rbac::v1::Role;

    use super::*;
    use crate::k8s::{MemoryCluster, Verb, get};
    use crate::resources::{MongoSettings, ResourceSettings};
    use crate::types::{AcrCredentials, Application, Environment, StorageCredentials, Tenant};

    const NAMESPACE: &str = "application-fake-application-id";

    fn resources(local_dev_user: Option<&str>) -> Resources {
        let tenant = Tenant {
            id: "fake-customer-id".to_string(),
            name: "Customer".to_string(),
        };
        let mut application = Application::new(&tenant, "fake-application-id", "Taco");
        application.environments.push(Environment::new("Dev"));
        Resources::new(
            &tenant,
            &application,
            &ResourceSettings {
                azure_group_id: "group",
                acr: &AcrCredentials::default(),
                storage: &StorageCredentials::default(),
                mongo: &MongoSettings::default(),
                local_dev_user,
            },
        )
    }

    fn setup() -> (Arc<MemoryCluster>, RbacRepo) {
        let cluster = Arc::new(MemoryCluster::new());
        let rbac = RbacRepo::new(cluster.clone());
        (cluster, rbac)
    }

    #[tokio::test]
    async fn test_objects_are_created_in_dependency_order() {
        let (cluster, rbac) = setup();
        provision(cluster.as_ref(), &resources(Some("me")), &rbac)
            .await
            .unwrap();

        let created = cluster.created();
        let created: Vec<(Kind, &str)> = created
            .iter()
            .map(|(kind, name)| (*kind, name.as_str()))
            .collect();
        assert_eq!(
            created,
            vec![
                (Kind::Namespace, NAMESPACE),
                (Kind::Secret, "acr"),
                (Kind::Role, "developer"),
                (Kind::RoleBinding, "developer"),
                (Kind::ServiceAccount, "devops"),
                (Kind::RoleBinding, "devops"),
                (Kind::Secret, "storage"),
                (Kind::ConfigMap, "dev-tenants"),
                (Kind::NetworkPolicy, "dev"),
                (Kind::Service, "dev-mongo"),
                (Kind::StatefulSet, "dev-mongo"),
                (Kind::CronJob, "dev-mongo-backup"),
                (Kind::RoleBinding, "local-dev"),
            ]
        );

        let role: Role = get(cluster.as_ref(), Some(NAMESPACE), "developer").await.unwrap();
        let rules = role.rules.unwrap();
        assert!(rules.iter().any(|rule| {
            rule.resource_names.as_deref() == Some(&["dev-mongo-0".to_string()][..])
        }));
    }

    #[tokio::test]
    async fn test_existing_namespace_is_a_no_op() {
        let (cluster, rbac) = setup();
        let resources = resources(None);
        provision(cluster.as_ref(), &resources, &rbac).await.unwrap();
        let before = cluster.actions().len();

        provision(cluster.as_ref(), &resources, &rbac).await.unwrap();

        assert_eq!(cluster.actions().len(), before);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_everything() {
        let (cluster, rbac) = setup();
        cluster.fail_on(Verb::Create, Kind::StatefulSet, "dev-mongo");

        let result = provision(cluster.as_ref(), &resources(None), &rbac).await;

        assert!(matches!(result, Err(Error::Kube(_))));
        assert!(!cluster.contains(Kind::Namespace, None, NAMESPACE));
        assert!(cluster.objects_in(NAMESPACE).is_empty());

        let last = cluster.actions().pop().unwrap();
        assert_eq!(last.verb, Verb::Delete);
        assert_eq!(last.kind, Kind::Namespace);
    }

    #[tokio::test]
    async fn test_undos_run_in_reverse() {
        let (cluster, rbac) = setup();
        cluster.fail_on(Verb::Create, Kind::Secret, "storage");

        provision(cluster.as_ref(), &resources(None), &rbac)
            .await
            .unwrap_err();

        let deleted: Vec<(Kind, String)> = cluster
            .actions()
            .into_iter()
            .filter(|action| action.verb == Verb::Delete)
            .map(|action| (action.kind, action.name))
            .collect();
        assert_eq!(
            deleted,
            vec![
                (Kind::RoleBinding, "devops".to_string()),
                (Kind::ServiceAccount, "devops".to_string()),
                (Kind::RoleBinding, "developer".to_string()),
                (Kind::Role, "developer".to_string()),
                (Kind::Secret, "acr".to_string()),
                (Kind::Namespace, NAMESPACE.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_rollback_reports_both_errors() {
        let (cluster, rbac) = setup();
        cluster.fail_on(Verb::Create, Kind::ConfigMap, "dev-tenants");
        cluster.fail_on(Verb::Delete, Kind::Namespace, NAMESPACE);

        let result = provision(cluster.as_ref(), &resources(None), &rbac).await;

        match result {
            Err(Error::Rollback { source, rollback }) => {
                assert!(matches!(*source, Error::Kube(_)));
                assert!(matches!(*rollback, Error::Kube(_)));
            }
            other => panic!("expected rollback error, got {other:?}"),
        }
    }
}
