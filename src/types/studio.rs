use serde::{Deserialize, Serialize};

/// Entry in `disabled_environments` that switches automation off everywhere.
pub const ALL_ENVIRONMENTS: &str = "*";

/// Per tenant gate over automated tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioConfig {
    pub build_overwrite: bool,
    /// Entries are `{application_id}/{environment}` with the environment
    /// lower-cased, or `*`.
    #[serde(default)]
    pub disabled_environments: Vec<String>,
    #[serde(default)]
    pub can_create_application: bool,
}

impl Default for StudioConfig {
    /// Default-allow, used whenever a tenant has no readable `studio.json`.
    fn default() -> Self {
        Self {
            build_overwrite: true,
            disabled_environments: Vec::new(),
            can_create_application: true,
        }
    }
}

impl StudioConfig {
    #[must_use]
    pub fn environment_key(application_id: &str, environment: &str) -> String {
        format!("{application_id}/{}", environment.to_lowercase())
    }

    #[must_use]
    pub fn automation_enabled(&self, application_id: &str, environment: &str) -> bool {
        let key = Self::environment_key(application_id, environment);
        !self
            .disabled_environments
            .iter()
            .any(|entry| entry == ALL_ENVIRONMENTS || entry.eq_ignore_ascii_case(&key))
    }
}
