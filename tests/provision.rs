//! End-to-end provisioning against an in-memory cluster and a Git store
//! cloned from a local bare remote.

mod common;

use common::{APPLICATION_ID, TENANT_ID, TestPlatform, request};
use platform_api::k8s::{Kind, Verb};
use platform_api::provision::WELCOME_MICROSERVICE_NAME;
use platform_api::store::DocumentStore;
use platform_api::types::State;

#[tokio::test]
async fn test_provisioned_application_is_pushed_with_welcome_id() {
    let platform = TestPlatform::new();

    let application = platform
        .provisioner
        .provision_application(request(&["Dev"]))
        .await
        .expect("provision");
    let welcome_id = application.environments[0].welcome_microservice_id.clone();
    assert!(!welcome_id.is_empty());

    let other = platform.second_clone();
    let stored = other
        .get_application(TENANT_ID, APPLICATION_ID)
        .expect("application pushed");
    assert_eq!(stored.environments.len(), 1);
    assert_eq!(stored.environments[0].name, "Dev");
    assert_eq!(stored.environments[0].welcome_microservice_id, welcome_id);
    assert_eq!(stored.status.state, State::Finished);

    let welcome = other
        .get_microservice(TENANT_ID, APPLICATION_ID, "Dev", &welcome_id)
        .expect("welcome microservice pushed");
    assert_eq!(welcome.name(), WELCOME_MICROSERVICE_NAME);

    // initial, running status, welcome microservice, finished status
    assert_eq!(platform.remote_commits(), 4);
}

#[tokio::test]
async fn test_objects_are_created_in_dependency_order() {
    let platform = TestPlatform::new();

    platform
        .provisioner
        .provision_application(request(&["Dev"]))
        .await
        .expect("provision");

    let created = platform.cluster.created();
    let kinds: Vec<Kind> = created.iter().map(|(kind, _)| *kind).collect();
    assert_eq!(
        kinds[..12],
        [
            Kind::Namespace,
            Kind::Secret,
            Kind::Role,
            Kind::RoleBinding,
            Kind::ServiceAccount,
            Kind::RoleBinding,
            Kind::Secret,
            Kind::ConfigMap,
            Kind::NetworkPolicy,
            Kind::Service,
            Kind::StatefulSet,
            Kind::CronJob,
        ]
    );

    let names: Vec<&str> = created.iter().map(|(_, name)| name.as_str()).collect();
    assert!(names.contains(&"dev-tenants"));
    assert!(names.contains(&"dev-mongo"));
    assert!(names.contains(&"dev-mongo-backup"));
    assert!(names.contains(&"dev-welcome"));
}

#[tokio::test]
async fn test_failed_provisioning_rolls_back_and_records_failure() {
    let platform = TestPlatform::new();
    platform
        .cluster
        .fail_on(Verb::Create, Kind::StatefulSet, "dev-mongo");

    let result = platform
        .provisioner
        .provision_application(request(&["Dev"]))
        .await;
    assert!(result.is_err());

    assert!(!platform.cluster.contains(
        Kind::Namespace,
        None,
        "application-fake-application-id"
    ));
    assert!(
        platform
            .cluster
            .objects_in("application-fake-application-id")
            .is_empty()
    );

    let stored = platform
        .second_clone()
        .get_application(TENANT_ID, APPLICATION_ID)
        .expect("failure recorded");
    assert_eq!(stored.status.state, State::Failed);
    assert!(stored.environments[0].welcome_microservice_id.is_empty());
}

#[tokio::test]
async fn test_second_environment_is_added_without_touching_the_first() {
    let platform = TestPlatform::new();
    let first = platform
        .provisioner
        .provision_application(request(&["Dev"]))
        .await
        .expect("provision dev");

    // The namespace exists, so the second run only adds the missing welcome
    // microservice and records the new environment.
    let second = platform
        .provisioner
        .provision_application(request(&["Dev", "Prod"]))
        .await
        .expect("provision prod");

    assert_eq!(second.environments.len(), 2);
    assert_eq!(
        second.environments[0].welcome_microservice_id,
        first.environments[0].welcome_microservice_id
    );
    assert!(!second.environments[1].welcome_microservice_id.is_empty());

    let microservices = platform
        .store
        .get_microservices(TENANT_ID, APPLICATION_ID)
        .expect("list microservices");
    assert_eq!(microservices.len(), 2);
}
