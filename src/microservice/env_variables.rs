use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::simple::{env_variables_name, secret_env_variables_name};
use crate::error::{Error, Result};
use crate::k8s::{Cluster, get, replace};
use crate::resources::namespace_name;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub is_secret: bool,
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '-' || c == '.' || c == '_'
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit()
}

/// Names follow `[-._a-zA-Z][-._a-zA-Z0-9]*`; values may not contain NUL.
pub fn validate_environment_variable(variable: &EnvironmentVariable) -> Result<()> {
    let mut chars = variable.name.chars();
    let valid_name = chars.next().is_some_and(is_name_start) && chars.all(is_name_char);
    if !valid_name {
        return Err(Error::InvalidEnvironmentVariable(format!(
            "'{}' is not a valid name",
            variable.name
        )));
    }
    if variable.value.contains('\0') {
        return Err(Error::InvalidEnvironmentVariable(format!(
            "value of '{}' contains a NUL character",
            variable.name
        )));
    }
    Ok(())
}

/// Reads both the plain and secret variables of a microservice, plain first.
pub async fn get_environment_variables(
    cluster: &dyn Cluster,
    application_id: &str,
    environment: &str,
    microservice_name: &str,
) -> Result<Vec<EnvironmentVariable>> {
    let namespace = namespace_name(application_id);
    let config_map: ConfigMap = get(
        cluster,
        Some(&namespace),
        &env_variables_name(environment, microservice_name),
    )
    .await?;
    let secret: Secret = get(
        cluster,
        Some(&namespace),
        &secret_env_variables_name(environment, microservice_name),
    )
    .await?;

    let plain = config_map
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| EnvironmentVariable {
            name,
            value,
            is_secret: false,
        });
    let secret = secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| EnvironmentVariable {
            name,
            value: String::from_utf8_lossy(&value.0).into_owned(),
            is_secret: true,
        });

    Ok(plain.chain(secret).collect())
}

/// Replaces the full variable set. Every entry is validated before anything
/// is written.
pub async fn update_environment_variables(
    cluster: &dyn Cluster,
    application_id: &str,
    environment: &str,
    microservice_name: &str,
    variables: &[EnvironmentVariable],
) -> Result<()> {
    for variable in variables {
        validate_environment_variable(variable)?;
    }

    let namespace = namespace_name(application_id);
    let mut config_map: ConfigMap = get(
        cluster,
        Some(&namespace),
        &env_variables_name(environment, microservice_name),
    )
    .await?;
    let mut secret: Secret = get(
        cluster,
        Some(&namespace),
        &secret_env_variables_name(environment, microservice_name),
    )
    .await?;

    let mut plain = BTreeMap::new();
    let mut secrets = BTreeMap::new();
    for variable in variables {
        if variable.is_secret {
            secrets.insert(
                variable.name.clone(),
                ByteString(variable.value.clone().into_bytes()),
            );
        } else {
            plain.insert(variable.name.clone(), variable.value.clone());
        }
    }

    config_map.data = Some(plain);
    secret.data = Some(secrets);
    secret.string_data = None;

    replace(cluster, &config_map).await?;
    replace(cluster, &secret).await?;

    info!(
        application_id,
        environment,
        microservice_name,
        count = variables.len(),
        "updated environment variables"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use k8s_openapi::api::core::v1::Namespace;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    use super::*;
    use crate::k8s::{MemoryCluster, create};

    fn variable(name: &str, value: &str, is_secret: bool) -> EnvironmentVariable {
        EnvironmentVariable {
            name: name.to_string(),
            value: value.to_string(),
            is_secret,
        }
    }

    fn meta(name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("application-app".to_string()),
            ..Default::default()
        }
    }

    async fn cluster_with_objects() -> Arc<MemoryCluster> {
        let cluster = Arc::new(MemoryCluster::new());
        create(
            cluster.as_ref(),
            &Namespace {
                metadata: ObjectMeta {
                    name: Some("application-app".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .await
        .unwrap();
        create(
            cluster.as_ref(),
            &ConfigMap {
                metadata: meta("dev-welcome-env-variables"),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        create(
            cluster.as_ref(),
            &Secret {
                metadata: meta("dev-welcome-secret-env-variables"),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        cluster
    }

    #[test]
    fn test_name_validation() {
        for name in ["PORT", "_private", "-dash", ".dot", "a1.b-c_d"] {
            assert!(validate_environment_variable(&variable(name, "v", false)).is_ok(), "{name}");
        }
        for name in ["", "1LEADING", "has space", "equals=sign"] {
            assert!(
                matches!(
                    validate_environment_variable(&variable(name, "v", false)),
                    Err(Error::InvalidEnvironmentVariable(_))
                ),
                "{name}"
            );
        }
    }

    #[test]
    fn test_nul_value_is_rejected() {
        assert!(validate_environment_variable(&variable("A", "x\0y", false)).is_err());
    }

    #[tokio::test]
    async fn test_update_splits_plain_and_secret() {
        let cluster = cluster_with_objects().await;
        let variables = vec![variable("A", "1", false), variable("B", "hush", true)];

        update_environment_variables(cluster.as_ref(), "app", "Dev", "Welcome", &variables)
            .await
            .unwrap();

        let read = get_environment_variables(cluster.as_ref(), "app", "Dev", "Welcome")
            .await
            .unwrap();
        assert_eq!(read, variables);
    }

    #[tokio::test]
    async fn test_invalid_update_writes_nothing() {
        let cluster = cluster_with_objects().await;
        let before = cluster.actions().len();

        let result = update_environment_variables(
            cluster.as_ref(),
            "app",
            "Dev",
            "Welcome",
            &[variable("OK", "1", false), variable("9bad", "2", false)],
        )
        .await;

        assert!(matches!(result, Err(Error::InvalidEnvironmentVariable(_))));
        assert_eq!(cluster.actions().len(), before);
    }

    #[tokio::test]
    async fn test_missing_objects_are_not_found() {
        let cluster = Arc::new(MemoryCluster::new());
        assert!(matches!(
            get_environment_variables(cluster.as_ref(), "app", "Dev", "Welcome").await,
            Err(Error::NotFound)
        ));
    }
}
