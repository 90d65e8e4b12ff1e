use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};

use super::labels::Owner;

pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";
pub const DEVELOPER_ROLE_NAME: &str = "developer";
pub const DEVOPS_SERVICE_ACCOUNT_NAME: &str = "devops";
pub const LOCAL_DEV_ROLE_BINDING_NAME: &str = "local-dev";
pub const LOCAL_DEV_CLUSTER_ROLE_NAME: &str = "local-dev";

fn rule(api_groups: &[&str], resources: &[&str], verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(api_groups.iter().map(ToString::to_string).collect()),
        resources: Some(resources.iter().map(ToString::to_string).collect()),
        verbs: verbs.iter().map(ToString::to_string).collect(),
        ..Default::default()
    }
}

fn developer_role_ref() -> RoleRef {
    RoleRef {
        api_group: RBAC_API_GROUP.to_string(),
        kind: "Role".to_string(),
        name: DEVELOPER_ROLE_NAME.to_string(),
    }
}

/// Read access to the workloads in the namespace, plus restarting deployments.
#[must_use]
pub fn developer_role(owner: &Owner<'_>) -> Role {
    Role {
        metadata: owner.metadata(DEVELOPER_ROLE_NAME),
        rules: Some(vec![
            rule(
                &[""],
                &["pods", "pods/log", "services", "configmaps", "events"],
                &["get", "list", "watch"],
            ),
            rule(
                &["apps"],
                &["deployments", "replicasets", "statefulsets"],
                &["get", "list", "watch"],
            ),
            rule(&["apps"], &["deployments"], &["patch"]),
            rule(&["batch"], &["cronjobs", "jobs"], &["get", "list", "watch"]),
        ]),
    }
}

#[must_use]
pub fn developer_role_binding(owner: &Owner<'_>, azure_group_id: &str) -> RoleBinding {
    RoleBinding {
        metadata: owner.metadata(DEVELOPER_ROLE_NAME),
        role_ref: developer_role_ref(),
        subjects: Some(vec![Subject {
            api_group: Some(RBAC_API_GROUP.to_string()),
            kind: "Group".to_string(),
            name: azure_group_id.to_string(),
            namespace: None,
        }]),
    }
}

#[must_use]
pub fn devops_service_account(owner: &Owner<'_>) -> ServiceAccount {
    ServiceAccount {
        metadata: owner.metadata(DEVOPS_SERVICE_ACCOUNT_NAME),
        ..Default::default()
    }
}

/// Binding for the devops account; the account itself is attached after creation.
#[must_use]
pub fn devops_role_binding(owner: &Owner<'_>) -> RoleBinding {
    RoleBinding {
        metadata: owner.metadata(DEVOPS_SERVICE_ACCOUNT_NAME),
        role_ref: developer_role_ref(),
        subjects: None,
    }
}

#[must_use]
pub fn local_dev_role_binding(owner: &Owner<'_>, user: &str) -> RoleBinding {
    RoleBinding {
        metadata: owner.metadata(LOCAL_DEV_ROLE_BINDING_NAME),
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "ClusterRole".to_string(),
            name: LOCAL_DEV_CLUSTER_ROLE_NAME.to_string(),
        },
        subjects: Some(vec![Subject {
            api_group: Some(RBAC_API_GROUP.to_string()),
            kind: "User".to_string(),
            name: user.to_string(),
            namespace: None,
        }]),
    }
}

/// Rules appended to the developer role so the environment's database can be
/// reached with `kubectl port-forward`.
#[must_use]
pub fn environment_policy_rules(mongo_pod_name: &str) -> Vec<PolicyRule> {
    vec![
        PolicyRule {
            api_groups: Some(vec![String::new()]),
            resources: Some(vec!["pods".to_string()]),
            resource_names: Some(vec![mongo_pod_name.to_string()]),
            verbs: vec!["get".to_string()],
            ..Default::default()
        },
        PolicyRule {
            api_groups: Some(vec![String::new()]),
            resources: Some(vec!["pods/portforward".to_string()]),
            resource_names: Some(vec![mongo_pod_name.to_string()]),
            verbs: vec!["create".to_string()],
            ..Default::default()
        },
    ]
}
