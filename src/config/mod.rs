mod git;
mod platform;
mod server;

use std::path::Path;

use serde::Deserialize;

pub use git::GitRepoConfig;
pub use platform::{PLATFORM_ENVIRONMENTS, PlatformSettings};
pub use server::ServerConfig;

use crate::error::{Error, Result};
use crate::resources::MongoSettings;

/// Everything the binary reads from its TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub server: ServerConfig,
    pub git: GitRepoConfig,
    pub platform: PlatformSettings,
    pub mongo: MongoSettings,
}

impl PlatformConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.platform.validate()?;
        config.mongo.validate()?;
        Ok(config)
    }

    /// Reads the file if it exists, otherwise returns defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = PlatformConfig::from_toml("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.git.branch, "main");
        assert_eq!(config.platform.platform_environment, "dev");
        assert_eq!(config.mongo.volume_size, "8Gi");
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = PlatformConfig::from_toml(
            r#"
            [git]
            url = "git@github.com:dolittle/platform-config.git"
            branch = "dev"
            directory_only = true

            [platform]
            platform_environment = "prod"
            azure_group_id = "group"

            [platform.acr]
            server = "registry.azurecr.io"
            username = "user"
            password = "secret"

            [mongo]
            volume_size = "50Gi"
            "#,
        )
        .unwrap();

        assert_eq!(config.git.branch, "dev");
        assert!(config.git.directory_only);
        assert_eq!(config.platform.platform_environment, "prod");
        assert_eq!(config.platform.acr.server, "registry.azurecr.io");
        assert_eq!(config.mongo.volume_size, "50Gi");
    }

    #[test]
    fn test_unknown_platform_environment_is_rejected() {
        let result = PlatformConfig::from_toml(
            r#"
            [platform]
            platform_environment = "staging"
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_volume_size_is_rejected() {
        let result = PlatformConfig::from_toml(
            r#"
            [mongo]
            volume_size = "lots"
            "#,
        );
        assert!(matches!(result, Err(Error::InvalidQuantity(_))));
    }
}
