use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{
    AzureFileVolumeSource, Container, ContainerPort, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
    Volume, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::{Deserialize, Serialize};

use super::labels::{Owner, label_value};
use super::quantity::validate_quantity;
use super::secrets::STORAGE_SECRET_NAME;
use crate::error::Result;

pub const MONGO_PORT: i32 = 27017;
const DATA_VOLUME_NAME: &str = "db";
const BACKUP_VOLUME_NAME: &str = "backup-storage";
const BACKUP_MOUNT_PATH: &str = "/mnt/backup";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MongoSettings {
    pub image: String,
    pub volume_size: String,
    pub storage_class: String,
    pub backup_image: String,
    pub backup_schedule: String,
}

impl Default for MongoSettings {
    fn default() -> Self {
        Self {
            image: "dolittle/mongodb:4.2.2".to_string(),
            volume_size: "8Gi".to_string(),
            storage_class: "managed-premium".to_string(),
            backup_image: "mongo:4.2.8".to_string(),
            backup_schedule: "0 * * * *".to_string(),
        }
    }
}

impl MongoSettings {
    pub fn validate(&self) -> Result<()> {
        validate_quantity(&self.volume_size)
    }
}

#[must_use]
pub fn mongo_name(environment: &str) -> String {
    format!("{}-mongo", environment.to_lowercase())
}

#[must_use]
pub fn mongo_backup_name(environment: &str) -> String {
    format!("{}-mongo-backup", environment.to_lowercase())
}

/// The single replica's pod, as named by the stateful set controller.
#[must_use]
pub fn mongo_pod_name(environment: &str) -> String {
    format!("{}-0", mongo_name(environment))
}

fn selector_labels(owner: &Owner<'_>) -> BTreeMap<String, String> {
    let mut labels = owner.labels();
    labels.insert("infrastructure".to_string(), "Mongo".to_string());
    labels
}

fn metadata(owner: &Owner<'_>, name: String) -> ObjectMeta {
    let mut metadata = owner.metadata(name);
    metadata.labels = Some(selector_labels(owner));
    metadata
}

#[derive(Debug, Clone, Serialize)]
pub struct MongoResources {
    pub service: Service,
    pub stateful_set: StatefulSet,
    pub cron_job: CronJob,
}

impl MongoResources {
    #[must_use]
    pub fn new(owner: &Owner<'_>, environment: &str, settings: &MongoSettings) -> Self {
        Self {
            service: service(owner, environment),
            stateful_set: stateful_set(owner, environment, settings),
            cron_job: backup_cron_job(owner, environment, settings),
        }
    }
}

fn service(owner: &Owner<'_>, environment: &str) -> Service {
    Service {
        metadata: metadata(owner, mongo_name(environment)),
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".to_string()),
            selector: Some(selector_labels(owner)),
            ports: Some(vec![ServicePort {
                name: Some("mongo".to_string()),
                port: MONGO_PORT,
                target_port: Some(IntOrString::String("mongo".to_string())),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn stateful_set(owner: &Owner<'_>, environment: &str, settings: &MongoSettings) -> StatefulSet {
    let name = mongo_name(environment);
    let labels = selector_labels(owner);

    let mut requests = BTreeMap::new();
    requests.insert(
        "storage".to_string(),
        Quantity(settings.volume_size.clone()),
    );

    StatefulSet {
        metadata: metadata(owner, name.clone()),
        spec: Some(StatefulSetSpec {
            replicas: Some(1),
            service_name: name.clone().into(),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels.clone()),
                    annotations: Some(owner.annotations()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "mongo".to_string(),
                        image: Some(settings.image.clone()),
                        ports: Some(vec![ContainerPort {
                            name: Some("mongo".to_string()),
                            container_port: MONGO_PORT,
                            ..Default::default()
                        }]),
                        volume_mounts: Some(vec![VolumeMount {
                            name: DATA_VOLUME_NAME.to_string(),
                            mount_path: "/data/db".to_string(),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            volume_claim_templates: Some(vec![PersistentVolumeClaim {
                metadata: ObjectMeta {
                    name: Some(DATA_VOLUME_NAME.to_string()),
                    ..Default::default()
                },
                spec: Some(PersistentVolumeClaimSpec {
                    access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                    storage_class_name: Some(settings.storage_class.clone()),
                    resources: Some(VolumeResourceRequirements {
                        requests: Some(requests),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn backup_cron_job(owner: &Owner<'_>, environment: &str, settings: &MongoSettings) -> CronJob {
    let env = environment.to_lowercase();
    let application = label_value(&owner.application.name).to_lowercase();
    let host = format!(
        "{}.{}.svc.cluster.local:{MONGO_PORT}",
        mongo_name(environment),
        owner.namespace()
    );
    let archive = format!(
        "{BACKUP_MOUNT_PATH}/{application}-{env}-$(date +%Y-%m-%d_%H-%M-%S).gz.mongodump"
    );

    CronJob {
        metadata: owner.metadata(mongo_backup_name(environment)),
        spec: Some(CronJobSpec {
            schedule: settings.backup_schedule.clone(),
            concurrency_policy: Some("Forbid".to_string()),
            successful_jobs_history_limit: Some(1),
            failed_jobs_history_limit: Some(1),
            job_template: JobTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(owner.labels()),
                    annotations: Some(owner.annotations()),
                    ..Default::default()
                }),
                spec: Some(JobSpec {
                    template: PodTemplateSpec {
                        metadata: Some(ObjectMeta {
                            labels: Some(owner.labels()),
                            ..Default::default()
                        }),
                        spec: Some(PodSpec {
                            restart_policy: Some("Never".to_string()),
                            containers: vec![Container {
                                name: "mongo-backup".to_string(),
                                image: Some(settings.backup_image.clone()),
                                command: Some(vec!["/bin/sh".to_string(), "-c".to_string()]),
                                args: Some(vec![format!(
                                    "mongodump --host={host} --gzip --archive={archive}"
                                )]),
                                volume_mounts: Some(vec![VolumeMount {
                                    name: BACKUP_VOLUME_NAME.to_string(),
                                    mount_path: BACKUP_MOUNT_PATH.to_string(),
                                    ..Default::default()
                                }]),
                                ..Default::default()
                            }],
                            volumes: Some(vec![Volume {
                                name: BACKUP_VOLUME_NAME.to_string(),
                                azure_file: Some(AzureFileVolumeSource {
                                    secret_name: STORAGE_SECRET_NAME.to_string(),
                                    share_name: format!("{application}-{env}-backup"),
                                    read_only: Some(false),
                                }),
                                ..Default::default()
                            }]),
                            ..Default::default()
                        }),
                    },
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}
