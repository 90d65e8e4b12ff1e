//! Canonical document locations inside the working tree.

use std::path::PathBuf;

use crate::error::{Error, Result};

pub const APPLICATION_FILE: &str = "application.json";
pub const STUDIO_FILE: &str = "studio.json";
pub const TENANT_FILE: &str = "tenant.json";
pub const TERRAFORM_FILE: &str = "terraform.json";
pub const MICROSERVICE_PREFIX: &str = "ms_";
pub const JSON_SUFFIX: &str = ".json";

/// Rejects ids that would escape or reshape the directory layout.
pub fn validate_segment(segment: &str) -> Result<&str> {
    if segment.is_empty() {
        return Err(Error::BadRequest("path segment cannot be empty".to_string()));
    }

    if segment.len() > 255 {
        return Err(Error::BadRequest(
            "path segment cannot exceed 255 characters".to_string(),
        ));
    }

    if segment == "." || segment == ".." || segment.starts_with('.') {
        return Err(Error::BadRequest(format!(
            "path segment '{segment}' is reserved"
        )));
    }

    const INVALID_CHARS: &[char] = &['/', '\\', '\0', '\n', '\r'];
    if segment.chars().any(|c| INVALID_CHARS.contains(&c)) {
        return Err(Error::BadRequest(
            "path segment contains invalid characters".to_string(),
        ));
    }

    Ok(segment)
}

pub fn tenant_dir(tenant_id: &str) -> Result<PathBuf> {
    Ok(PathBuf::from(validate_segment(tenant_id)?))
}

pub fn application_dir(tenant_id: &str, application_id: &str) -> Result<PathBuf> {
    Ok(tenant_dir(tenant_id)?.join(validate_segment(application_id)?))
}

pub fn environment_dir(tenant_id: &str, application_id: &str, environment: &str) -> Result<PathBuf> {
    let environment = environment.to_lowercase();
    Ok(application_dir(tenant_id, application_id)?.join(validate_segment(&environment)?))
}

pub fn application(tenant_id: &str, application_id: &str) -> Result<PathBuf> {
    Ok(application_dir(tenant_id, application_id)?.join(APPLICATION_FILE))
}

pub fn microservice(
    tenant_id: &str,
    application_id: &str,
    environment: &str,
    microservice_id: &str,
) -> Result<PathBuf> {
    let file = format!(
        "{MICROSERVICE_PREFIX}{}{JSON_SUFFIX}",
        validate_segment(microservice_id)?
    );
    Ok(environment_dir(tenant_id, application_id, environment)?.join(file))
}

pub fn studio(tenant_id: &str) -> Result<PathBuf> {
    Ok(tenant_dir(tenant_id)?.join(STUDIO_FILE))
}

pub fn tenant(tenant_id: &str) -> Result<PathBuf> {
    Ok(tenant_dir(tenant_id)?.join(TENANT_FILE))
}

pub fn terraform_application(tenant_id: &str, application_id: &str) -> Result<PathBuf> {
    Ok(application_dir(tenant_id, application_id)?.join(TERRAFORM_FILE))
}

/// The microservice id encoded in a `ms_{id}.json` file name.
#[must_use]
pub fn microservice_id_from_file(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(MICROSERVICE_PREFIX)?
        .strip_suffix(JSON_SUFFIX)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn test_canonical_paths() {
        assert_eq!(
            microservice("t", "a", "Dev", "m").unwrap(),
            Path::new("t/a/dev/ms_m.json")
        );
        assert_eq!(application("t", "a").unwrap(), Path::new("t/a/application.json"));
        assert_eq!(studio("t").unwrap(), Path::new("t/studio.json"));
        assert_eq!(tenant("t").unwrap(), Path::new("t/tenant.json"));
        assert_eq!(
            terraform_application("t", "a").unwrap(),
            Path::new("t/a/terraform.json")
        );
    }

    #[test]
    fn test_traversal_is_rejected() {
        assert!(application("..", "a").is_err());
        assert!(application("t", "a/b").is_err());
        assert!(studio("").is_err());
        assert!(studio(".git").is_err());
    }

    #[test]
    fn test_microservice_id_from_file() {
        assert_eq!(microservice_id_from_file("ms_abc.json"), Some("abc"));
        assert_eq!(microservice_id_from_file("application.json"), None);
    }
}
