use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use serde_json::json;

use super::labels::Owner;
use crate::types::{AcrCredentials, StorageCredentials};

pub const ACR_SECRET_NAME: &str = "acr";
pub const STORAGE_SECRET_NAME: &str = "storage";
pub const STORAGE_ACCOUNT_NAME_KEY: &str = "azurestorageaccountname";
pub const STORAGE_ACCOUNT_KEY_KEY: &str = "azurestorageaccountkey";

/// Image-pull secret for the platform container registry.
#[must_use]
pub fn acr_secret(owner: &Owner<'_>, acr: &AcrCredentials) -> Secret {
    let auth = STANDARD.encode(format!("{}:{}", acr.username, acr.password));
    let config = json!({
        "auths": {
            acr.server.as_str(): {
                "username": acr.username,
                "password": acr.password,
                "auth": auth,
            }
        }
    });

    let mut data = BTreeMap::new();
    data.insert(
        ".dockerconfigjson".to_string(),
        ByteString(config.to_string().into_bytes()),
    );

    Secret {
        metadata: owner.metadata(ACR_SECRET_NAME),
        type_: Some("kubernetes.io/dockerconfigjson".to_string()),
        data: Some(data),
        ..Default::default()
    }
}

/// Credentials the backup cron jobs use to mount their file share.
#[must_use]
pub fn storage_secret(owner: &Owner<'_>, storage: &StorageCredentials) -> Secret {
    let mut string_data = BTreeMap::new();
    string_data.insert(
        STORAGE_ACCOUNT_NAME_KEY.to_string(),
        storage.account_name.clone(),
    );
    string_data.insert(
        STORAGE_ACCOUNT_KEY_KEY.to_string(),
        storage.account_key.clone(),
    );

    Secret {
        metadata: owner.metadata(STORAGE_SECRET_NAME),
        type_: Some("Opaque".to_string()),
        string_data: Some(string_data),
        ..Default::default()
    }
}
