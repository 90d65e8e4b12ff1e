use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapEnvSource, ConfigMapVolumeSource, Container, ContainerPort,
    EnvFromSource, LocalObjectReference, PodSpec, PodTemplateSpec, Secret, SecretEnvSource,
    Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::Serialize;
use serde_json::json;

use crate::k8s::Object;
use crate::resources::labels::{MICROSERVICE_ID_ANNOTATION, MICROSERVICE_LABEL, label_value};
use crate::resources::mongo::{MONGO_PORT, mongo_name};
use crate::resources::secrets::ACR_SECRET_NAME;
use crate::resources::Owner;
use crate::types::{CustomerTenantInfo, Microservice, SimpleExtra, resource_hash};

const SERVICE_PORT: i32 = 80;
const DOLITTLE_MOUNT_PATH: &str = "/app/.dolittle";
const CONFIG_FILES_MOUNT_PATH: &str = "/app/data";
const TENANT_HEADER_ANNOTATION: &str = "nginx.ingress.kubernetes.io/configuration-snippet";

/// Prefix shared by every object of one microservice: `{environment}-{name}`.
#[must_use]
pub fn object_name(environment: &str, name: &str) -> String {
    format!("{}-{}", environment.to_lowercase(), label_value(name).to_lowercase())
}

#[must_use]
pub fn env_variables_name(environment: &str, name: &str) -> String {
    format!("{}-env-variables", object_name(environment, name))
}

#[must_use]
pub fn secret_env_variables_name(environment: &str, name: &str) -> String {
    format!("{}-secret-env-variables", object_name(environment, name))
}

#[must_use]
pub fn config_files_name(environment: &str, name: &str) -> String {
    format!("{}-config-files", object_name(environment, name))
}

#[must_use]
pub fn dolittle_config_name(environment: &str, name: &str) -> String {
    format!("{}-dolittle", object_name(environment, name))
}

/// Everything one simple microservice runs on, in creation order.
#[derive(Debug, Clone, Serialize)]
pub struct SimpleMicroserviceResources {
    pub dolittle_config: ConfigMap,
    pub env_variables: ConfigMap,
    pub config_files: ConfigMap,
    pub secret_env_variables: Secret,
    pub service: Service,
    pub deployment: Deployment,
    pub ingresses: Vec<Ingress>,
}

impl SimpleMicroserviceResources {
    #[must_use]
    pub fn new(
        owner: &Owner<'_>,
        microservice: &Microservice<SimpleExtra>,
        customer_tenants: &[CustomerTenantInfo],
    ) -> Self {
        let env = &microservice.environment;
        let name = &microservice.name;
        let meta = |object: String| metadata(owner, microservice, object);

        let ingresses = if microservice.extra.is_public {
            customer_tenants
                .iter()
                .flat_map(|tenant| ingresses(owner, microservice, tenant))
                .collect()
        } else {
            Vec::new()
        };

        Self {
            dolittle_config: ConfigMap {
                metadata: meta(dolittle_config_name(env, name)),
                data: Some(dolittle_files(owner, microservice, customer_tenants)),
                ..Default::default()
            },
            env_variables: ConfigMap {
                metadata: meta(env_variables_name(env, name)),
                data: Some(BTreeMap::new()),
                ..Default::default()
            },
            config_files: ConfigMap {
                metadata: meta(config_files_name(env, name)),
                data: Some(BTreeMap::new()),
                ..Default::default()
            },
            secret_env_variables: Secret {
                metadata: meta(secret_env_variables_name(env, name)),
                type_: Some("Opaque".to_string()),
                ..Default::default()
            },
            service: service(owner, microservice),
            deployment: deployment(owner, microservice),
            ingresses,
        }
    }

    #[must_use]
    pub fn into_objects(self) -> Vec<Object> {
        let mut objects: Vec<Object> = vec![
            self.dolittle_config.into(),
            self.env_variables.into(),
            self.config_files.into(),
            self.secret_env_variables.into(),
            self.service.into(),
            self.deployment.into(),
        ];
        objects.extend(self.ingresses.into_iter().map(Object::from));
        objects
    }
}

fn selector_labels(owner: &Owner<'_>, microservice: &Microservice<SimpleExtra>) -> BTreeMap<String, String> {
    let mut labels = owner.labels();
    labels.insert(MICROSERVICE_LABEL.to_string(), label_value(&microservice.name));
    labels
}

fn metadata(owner: &Owner<'_>, microservice: &Microservice<SimpleExtra>, name: String) -> ObjectMeta {
    let mut metadata = owner.metadata(name);
    metadata.labels = Some(selector_labels(owner, microservice));
    metadata.annotations.get_or_insert_with(BTreeMap::new).insert(
        MICROSERVICE_ID_ANNOTATION.to_string(),
        microservice.dolittle.microservice_id.clone(),
    );
    metadata
}

/// The runtime's view of the platform: identity plus per customer tenant
/// storage in the environment's database.
fn dolittle_files(
    owner: &Owner<'_>,
    microservice: &Microservice<SimpleExtra>,
    customer_tenants: &[CustomerTenantInfo],
) -> BTreeMap<String, String> {
    let mongo_host = format!(
        "{}.{}.svc.cluster.local",
        mongo_name(&microservice.environment),
        owner.namespace()
    );

    let resources: serde_json::Map<String, serde_json::Value> = customer_tenants
        .iter()
        .map(|tenant| {
            let prefix = format!(
                "{}_{}",
                label_value(&microservice.name).to_lowercase(),
                resource_hash(&tenant.customer_tenant_id, &microservice.dolittle.microservice_id)
            );
            let resource = json!({
                "readModels": {
                    "host": format!("mongodb://{mongo_host}:{MONGO_PORT}"),
                    "database": format!("{prefix}_readmodels"),
                    "useSSL": false,
                },
                "eventStore": {
                    "servers": [mongo_host],
                    "port": MONGO_PORT,
                    "database": format!("{prefix}_eventstore"),
                },
            });
            (tenant.customer_tenant_id.clone(), resource)
        })
        .collect();

    let platform = json!({
        "applicationName": owner.application.name,
        "applicationID": microservice.dolittle.application_id,
        "microserviceName": microservice.name,
        "microserviceID": microservice.dolittle.microservice_id,
        "customerName": owner.tenant.name,
        "customerID": microservice.dolittle.customer_id,
        "environment": microservice.environment,
    });

    let mut files = BTreeMap::new();
    files.insert(
        "resources.json".to_string(),
        format!("{:#}", serde_json::Value::Object(resources)),
    );
    files.insert("platform.json".to_string(), format!("{platform:#}"));
    files
}

fn service(owner: &Owner<'_>, microservice: &Microservice<SimpleExtra>) -> Service {
    Service {
        metadata: metadata(
            owner,
            microservice,
            object_name(&microservice.environment, &microservice.name),
        ),
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(owner, microservice)),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(microservice.extra.head_port)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn deployment(owner: &Owner<'_>, microservice: &Microservice<SimpleExtra>) -> Deployment {
    let env = &microservice.environment;
    let name = &microservice.name;
    let labels = selector_labels(owner, microservice);

    let head = Container {
        name: "head".to_string(),
        image: Some(microservice.extra.head_image.clone()),
        ports: Some(vec![ContainerPort {
            name: Some("http".to_string()),
            container_port: microservice.extra.head_port,
            ..Default::default()
        }]),
        env_from: Some(vec![
            EnvFromSource {
                config_map_ref: Some(ConfigMapEnvSource {
                    name: env_variables_name(env, name).into(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            EnvFromSource {
                secret_ref: Some(SecretEnvSource {
                    name: secret_env_variables_name(env, name).into(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ]),
        volume_mounts: Some(vec![
            VolumeMount {
                name: "dolittle-config".to_string(),
                mount_path: DOLITTLE_MOUNT_PATH.to_string(),
                ..Default::default()
            },
            VolumeMount {
                name: "config-files".to_string(),
                mount_path: CONFIG_FILES_MOUNT_PATH.to_string(),
                ..Default::default()
            },
        ]),
        ..Default::default()
    };

    let mut containers = vec![head];
    if let Some(runtime_image) = &microservice.extra.runtime_image {
        containers.push(Container {
            name: "runtime".to_string(),
            image: Some(runtime_image.clone()),
            volume_mounts: Some(vec![VolumeMount {
                name: "dolittle-config".to_string(),
                mount_path: DOLITTLE_MOUNT_PATH.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        });
    }

    Deployment {
        metadata: metadata(owner, microservice, object_name(env, name)),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations: Some(owner.annotations()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers,
                    image_pull_secrets: Some(vec![LocalObjectReference {
                        name: ACR_SECRET_NAME.to_string().into(),
                    }]),
                    volumes: Some(vec![
                        Volume {
                            name: "dolittle-config".to_string(),
                            config_map: Some(ConfigMapVolumeSource {
                                name: dolittle_config_name(env, name).into(),
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                        Volume {
                            name: "config-files".to_string(),
                            config_map: Some(ConfigMapVolumeSource {
                                name: config_files_name(env, name).into(),
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                    ]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// One ingress per host of the customer tenant, each injecting the tenant id
/// header the runtime routes on.
fn ingresses(
    owner: &Owner<'_>,
    microservice: &Microservice<SimpleExtra>,
    tenant: &CustomerTenantInfo,
) -> Vec<Ingress> {
    let hash = resource_hash(&tenant.customer_tenant_id, &microservice.dolittle.microservice_id);
    let service_name = object_name(&microservice.environment, &microservice.name);

    tenant
        .hosts
        .iter()
        .enumerate()
        .map(|(index, host)| {
            let mut meta = metadata(
                owner,
                microservice,
                format!("{service_name}-{hash}-{index}"),
            );
            meta.annotations.get_or_insert_with(BTreeMap::new).insert(
                TENANT_HEADER_ANNOTATION.to_string(),
                format!(
                    "proxy_set_header Tenant-ID \"{}\";\n",
                    tenant.customer_tenant_id
                ),
            );

            Ingress {
                metadata: meta,
                spec: Some(IngressSpec {
                    ingress_class_name: Some("nginx".to_string()),
                    tls: Some(vec![IngressTLS {
                        hosts: Some(vec![host.host.clone()]),
                        secret_name: Some(host.secret_name.clone()),
                    }]),
                    rules: Some(vec![IngressRule {
                        host: Some(host.host.clone()),
                        http: Some(HTTPIngressRuleValue {
                            paths: vec![HTTPIngressPath {
                                path: Some(microservice.extra.ingress.path.clone()),
                                path_type: microservice.extra.ingress.path_type.clone(),
                                backend: IngressBackend {
                                    service: Some(IngressServiceBackend {
                                        name: service_name.clone(),
                                        port: Some(ServiceBackendPort {
                                            number: Some(SERVICE_PORT),
                                            ..Default::default()
                                        }),
                                    }),
                                    ..Default::default()
                                },
                            }],
                        }),
                    }]),
                    ..Default::default()
                }),
                ..Default::default()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::Kind;
    use crate::types::{Application, CustomerTenantHost, DolittleIds, IngressPath, Tenant};

    fn tenant() -> Tenant {
        Tenant {
            id: "fake-customer-id".to_string(),
            name: "Customer".to_string(),
        }
    }

    fn welcome(is_public: bool) -> Microservice<SimpleExtra> {
        Microservice {
            dolittle: DolittleIds {
                application_id: "fake-application-id".to_string(),
                customer_id: "fake-customer-id".to_string(),
                microservice_id: "ms-id".to_string(),
            },
            name: "Welcome".to_string(),
            environment: "Dev".to_string(),
            extra: SimpleExtra {
                head_image: "nginxdemos/hello:latest".to_string(),
                runtime_image: None,
                ingress: IngressPath::default(),
                is_public,
                head_port: 80,
            },
        }
    }

    fn customer_tenants() -> Vec<CustomerTenantInfo> {
        vec![CustomerTenantInfo {
            customer_tenant_id: "ct".to_string(),
            environment: "Dev".to_string(),
            hosts: vec![CustomerTenantHost {
                host: "taco-dev.dolittle.cloud".to_string(),
                secret_name: "taco-dev-certificate".to_string(),
            }],
            microservices_rel: Vec::new(),
        }]
    }

    #[test]
    fn test_objects_are_named_after_environment_and_microservice() {
        let tenant = tenant();
        let app = Application::new(&tenant, "fake-application-id", "Taco");
        let owner = Owner::environment(&tenant, &app, "Dev");

        let objects = SimpleMicroserviceResources::new(&owner, &welcome(true), &customer_tenants())
            .into_objects();
        let names: Vec<(Kind, &str)> = objects.iter().map(|o| (o.kind(), o.name())).collect();

        assert_eq!(names[0], (Kind::ConfigMap, "dev-welcome-dolittle"));
        assert_eq!(names[1], (Kind::ConfigMap, "dev-welcome-env-variables"));
        assert_eq!(names[2], (Kind::ConfigMap, "dev-welcome-config-files"));
        assert_eq!(names[3], (Kind::Secret, "dev-welcome-secret-env-variables"));
        assert_eq!(names[4], (Kind::Service, "dev-welcome"));
        assert_eq!(names[5], (Kind::Deployment, "dev-welcome"));
        assert_eq!(names[6].0, Kind::Ingress);
        assert_eq!(objects.len(), 7);

        for object in &objects {
            assert_eq!(object.namespace(), Some("application-fake-application-id"));
            let annotations = object.metadata().annotations.as_ref().unwrap();
            assert_eq!(annotations[MICROSERVICE_ID_ANNOTATION], "ms-id");
        }
    }

    #[test]
    fn test_private_microservice_has_no_ingress() {
        let tenant = tenant();
        let app = Application::new(&tenant, "fake-application-id", "Taco");
        let owner = Owner::environment(&tenant, &app, "Dev");

        let resources = SimpleMicroserviceResources::new(&owner, &welcome(false), &customer_tenants());
        assert!(resources.ingresses.is_empty());
    }

    #[test]
    fn test_deployment_pulls_from_registry_secret() {
        let tenant = tenant();
        let app = Application::new(&tenant, "fake-application-id", "Taco");
        let owner = Owner::environment(&tenant, &app, "Dev");

        let resources = SimpleMicroserviceResources::new(&owner, &welcome(false), &[]);
        let pod = resources.deployment.spec.unwrap().template.spec.unwrap();
        let secrets = serde_json::to_value(pod.image_pull_secrets.unwrap()).unwrap();
        assert_eq!(secrets, serde_json::json!([{ "name": "acr" }]));
        assert_eq!(pod.containers.len(), 1);
    }

    #[test]
    fn test_resources_json_lists_customer_tenants() {
        let tenant = tenant();
        let app = Application::new(&tenant, "fake-application-id", "Taco");
        let owner = Owner::environment(&tenant, &app, "Dev");

        let resources = SimpleMicroserviceResources::new(&owner, &welcome(false), &customer_tenants());
        let data = resources.dolittle_config.data.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&data["resources.json"]).unwrap();
        assert!(parsed.get("ct").is_some());
    }
}
