use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::error::{Error, Result};
use crate::types::{Application, Tenant};

pub const TENANT_LABEL: &str = "tenant";
pub const APPLICATION_LABEL: &str = "application";
pub const ENVIRONMENT_LABEL: &str = "environment";
pub const MICROSERVICE_LABEL: &str = "microservice";
pub const TENANT_ID_ANNOTATION: &str = "dolittle.io/tenant-id";
pub const APPLICATION_ID_ANNOTATION: &str = "dolittle.io/application-id";
pub const MICROSERVICE_ID_ANNOTATION: &str = "dolittle.io/microservice-id";

const MAX_LABEL_VALUE_LEN: usize = 63;
const NAMESPACE_PREFIX: &str = "application-";

/// Longest application id whose namespace name still fits a DNS-1123 label.
pub const MAX_APPLICATION_ID_LEN: usize = MAX_LABEL_VALUE_LEN - NAMESPACE_PREFIX.len();
/// Environment names prefix object names such as `{env}-mongo-backup`.
pub const MAX_ENVIRONMENT_NAME_LEN: usize = 32;

#[must_use]
pub fn namespace_name(application_id: &str) -> String {
    format!("{NAMESPACE_PREFIX}{application_id}")
}

fn is_dns_label(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-')
}

/// Application ids must be lowercase alphanumerics and `-` so that
/// `application-{id}` is a valid namespace name.
pub fn validate_application_id(application_id: &str) -> Result<()> {
    if application_id.len() > MAX_APPLICATION_ID_LEN || !is_dns_label(application_id) {
        return Err(Error::BadRequest(format!(
            "application id '{application_id}' must be lowercase alphanumerics and '-', \
             at most {MAX_APPLICATION_ID_LEN} characters"
        )));
    }
    Ok(())
}

/// Environment names are lower-cased into object names, so any case is
/// accepted but only alphanumerics and `-`.
pub fn validate_environment_name(environment: &str) -> Result<()> {
    if environment.len() > MAX_ENVIRONMENT_NAME_LEN
        || !is_dns_label(&environment.to_ascii_lowercase())
    {
        return Err(Error::BadRequest(format!(
            "environment '{environment}' must be alphanumerics and '-', \
             at most {MAX_ENVIRONMENT_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Coerces a display name into a valid label value.
#[must_use]
pub fn label_value(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .take(MAX_LABEL_VALUE_LEN)
        .collect();
    replaced
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}

/// The identity every object in an application namespace carries.
#[derive(Debug, Clone, Copy)]
pub struct Owner<'a> {
    pub tenant: &'a Tenant,
    pub application: &'a Application,
    pub environment: Option<&'a str>,
}

impl<'a> Owner<'a> {
    #[must_use]
    pub fn application(tenant: &'a Tenant, application: &'a Application) -> Self {
        Self {
            tenant,
            application,
            environment: None,
        }
    }

    #[must_use]
    pub fn environment(tenant: &'a Tenant, application: &'a Application, environment: &'a str) -> Self {
        Self {
            tenant,
            application,
            environment: Some(environment),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> String {
        namespace_name(&self.application.id)
    }

    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(TENANT_LABEL.to_string(), label_value(&self.tenant.name));
        labels.insert(APPLICATION_LABEL.to_string(), label_value(&self.application.name));
        if let Some(environment) = self.environment {
            labels.insert(ENVIRONMENT_LABEL.to_string(), label_value(environment));
        }
        labels
    }

    #[must_use]
    pub fn annotations(&self) -> BTreeMap<String, String> {
        let mut annotations = BTreeMap::new();
        annotations.insert(TENANT_ID_ANNOTATION.to_string(), self.tenant.id.clone());
        annotations.insert(APPLICATION_ID_ANNOTATION.to_string(), self.application.id.clone());
        annotations
    }

    /// Metadata for an object named `name` inside the application namespace.
    #[must_use]
    pub fn metadata(&self, name: impl Into<String>) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.into()),
            namespace: Some(self.namespace()),
            labels: Some(self.labels()),
            annotations: Some(self.annotations()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_value_replaces_invalid_characters() {
        assert_eq!(label_value("Taco Shop"), "Taco-Shop");
        assert_eq!(label_value("  edge  "), "edge");
        assert_eq!(label_value("already-fine_1.0"), "already-fine_1.0");
        assert_eq!(label_value(&"a".repeat(80)).len(), MAX_LABEL_VALUE_LEN);
    }

    #[test]
    fn test_application_id_must_fit_a_namespace_name() {
        assert!(validate_application_id("fake-application-id").is_ok());
        assert!(validate_application_id(&"a".repeat(MAX_APPLICATION_ID_LEN)).is_ok());
        assert_eq!(
            namespace_name(&"a".repeat(MAX_APPLICATION_ID_LEN)).len(),
            MAX_LABEL_VALUE_LEN
        );

        for invalid in ["My_App", "MyApp", "my_app", "-app", "app-", "", "my app"] {
            assert!(
                matches!(validate_application_id(invalid), Err(Error::BadRequest(_))),
                "{invalid} accepted"
            );
        }
        assert!(validate_application_id(&"a".repeat(MAX_APPLICATION_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_environment_names() {
        assert!(validate_environment_name("Dev").is_ok());
        assert!(validate_environment_name("pre-prod").is_ok());
        for invalid in ["my env", "my_env", "..", "", "-dev"] {
            assert!(validate_environment_name(invalid).is_err(), "{invalid} accepted");
        }
        assert!(validate_environment_name(&"d".repeat(MAX_ENVIRONMENT_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_namespace_name() {
        assert_eq!(namespace_name("abc"), "application-abc");
    }
}
