use std::collections::BTreeMap;

use k8s_openapi::api::networking::v1::{
    NetworkPolicy, NetworkPolicyIngressRule, NetworkPolicyPeer, NetworkPolicySpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

use super::labels::Owner;

fn selector(pairs: &[(&str, &str)]) -> LabelSelector {
    let labels: BTreeMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    LabelSelector {
        match_labels: Some(labels),
        ..Default::default()
    }
}

/// Pods of the platform API, which manages workloads in every namespace.
#[must_use]
pub fn system_api_peer() -> NetworkPolicyPeer {
    NetworkPolicyPeer {
        namespace_selector: Some(selector(&[("system", "Api")])),
        pod_selector: Some(selector(&[("system", "Api")])),
        ..Default::default()
    }
}

/// The Prometheus scraper in the monitoring namespace.
#[must_use]
pub fn monitoring_peer() -> NetworkPolicyPeer {
    NetworkPolicyPeer {
        namespace_selector: Some(selector(&[("system", "Monitoring")])),
        pod_selector: Some(selector(&[("app", "prometheus")])),
        ..Default::default()
    }
}

/// Only pods of the same environment, the platform API and the monitoring
/// scraper may reach an environment's pods.
#[must_use]
pub fn network_policy(owner: &Owner<'_>, environment: &str) -> NetworkPolicy {
    let environment_pods = LabelSelector {
        match_labels: Some(owner.labels()),
        ..Default::default()
    };

    NetworkPolicy {
        metadata: owner.metadata(environment.to_lowercase()),
        spec: Some(NetworkPolicySpec {
            pod_selector: environment_pods.clone().into(),
            policy_types: Some(vec!["Ingress".to_string()]),
            ingress: Some(vec![NetworkPolicyIngressRule {
                from: Some(vec![
                    NetworkPolicyPeer {
                        pod_selector: Some(environment_pods),
                        ..Default::default()
                    },
                    system_api_peer(),
                    monitoring_peer(),
                ]),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
