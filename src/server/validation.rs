use crate::provision::ProvisionRequest;
use crate::resources::{
    validate_application_id as check_application_id, validate_environment_name,
};
use crate::server::response::ApiError;

const MAX_ID_LEN: usize = 64;
const MAX_NAME_LEN: usize = 100;

fn is_valid_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn validate_id(id: &str, entity: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{entity} id cannot be empty"));
    }
    if id.len() > MAX_ID_LEN {
        return Err(format!("{entity} id cannot exceed {MAX_ID_LEN} characters"));
    }
    if !id.chars().all(is_valid_id_char) {
        return Err(format!(
            "{entity} id can only contain alphanumeric characters, hyphens, and underscores"
        ));
    }
    if id.starts_with('-') || id.starts_with('_') {
        return Err(format!("{entity} id cannot start with a hyphen or underscore"));
    }
    Ok(())
}

fn validate_display_name(name: &str, entity: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(format!("{entity} name cannot be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("{entity} name cannot exceed {MAX_NAME_LEN} characters"));
    }
    Ok(())
}

pub fn validate_tenant_id(id: &str) -> Result<(), ApiError> {
    validate_id(id, "Tenant").map_err(ApiError::bad_request)
}

/// Application ids end up in namespace names, so they follow DNS-1123.
pub fn validate_application_id(id: &str) -> Result<(), ApiError> {
    check_application_id(id).map_err(ApiError::from)
}

pub fn validate_microservice_id(id: &str) -> Result<(), ApiError> {
    validate_id(id, "Microservice").map_err(ApiError::bad_request)
}

/// Environment names become part of Kubernetes object names once lower-cased.
pub fn validate_environment(name: &str) -> Result<(), ApiError> {
    validate_environment_name(name).map_err(ApiError::from)
}

pub fn validate_provision_request(request: &ProvisionRequest) -> Result<(), ApiError> {
    validate_tenant_id(&request.tenant.id)?;
    validate_display_name(&request.tenant.name, "Tenant").map_err(ApiError::bad_request)?;
    validate_display_name(&request.application_name, "Application")
        .map_err(ApiError::bad_request)?;
    request.validate().map_err(ApiError::from)
}
