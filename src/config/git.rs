use std::path::PathBuf;

use serde::Deserialize;

/// Where the document store clones from and how it authenticates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitRepoConfig {
    /// Remote URL; an SSH URL or a local path to a bare repository.
    pub url: String,
    pub branch: String,
    /// Local working tree.
    pub directory: PathBuf,
    /// Private key used for SSH remotes.
    pub ssh_key: Option<PathBuf>,
    /// Work on the directory only; no pull, commit or push.
    pub directory_only: bool,
    pub author_name: String,
    pub author_email: String,
}

impl Default for GitRepoConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            branch: "main".to_string(),
            directory: PathBuf::from("./data/git"),
            ssh_key: None,
            directory_only: false,
            author_name: "Auto Platform".to_string(),
            author_email: "platform@dolittle.com".to_string(),
        }
    }
}
