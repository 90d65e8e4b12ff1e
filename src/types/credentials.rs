use serde::{Deserialize, Serialize};

/// Container registry login used for the image-pull secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcrCredentials {
    pub server: String,
    pub username: String,
    pub password: String,
}

/// Azure storage account used for database backups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageCredentials {
    pub account_name: String,
    pub account_key: String,
}
