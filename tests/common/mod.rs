#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::{Repository, Signature};
use platform_api::config::{GitRepoConfig, PlatformSettings};
use platform_api::k8s::MemoryCluster;
use platform_api::provision::{ProvisionRequest, Provisioner};
use platform_api::resources::MongoSettings;
use platform_api::store::GitStore;
use platform_api::types::Tenant;
use tempfile::TempDir;

pub const TENANT_ID: &str = "fake-customer-id";
pub const APPLICATION_ID: &str = "fake-application-id";

/// A store cloned from a local bare remote plus an in-memory cluster.
pub struct TestPlatform {
    pub temp_dir: TempDir,
    pub remote: PathBuf,
    pub store: Arc<GitStore>,
    pub cluster: Arc<MemoryCluster>,
    pub provisioner: Provisioner,
}

impl TestPlatform {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let remote = bare_remote(temp_dir.path());
        let store = Arc::new(
            GitStore::open(clone_config(&remote, temp_dir.path().join("clone")))
                .expect("clone store"),
        );
        let cluster = Arc::new(MemoryCluster::new());
        let provisioner = Provisioner::new(
            cluster.clone(),
            store.clone(),
            PlatformSettings::default(),
            MongoSettings::default(),
        );

        Self {
            temp_dir,
            remote,
            store,
            cluster,
            provisioner,
        }
    }

    /// Opens a second working tree on the same remote.
    pub fn second_clone(&self) -> GitStore {
        GitStore::open(clone_config(&self.remote, self.temp_dir.path().join("second")))
            .expect("clone second store")
    }

    pub fn remote_commits(&self) -> usize {
        let repo = Repository::open_bare(&self.remote).expect("open remote");
        let mut walk = repo.revwalk().expect("revwalk");
        walk.push_ref("refs/heads/main").expect("push main");
        walk.count()
    }
}

pub fn request(environments: &[&str]) -> ProvisionRequest {
    ProvisionRequest {
        tenant: Tenant {
            id: TENANT_ID.to_string(),
            name: "Customer".to_string(),
        },
        application_id: APPLICATION_ID.to_string(),
        application_name: "Taco".to_string(),
        environments: environments.iter().map(ToString::to_string).collect(),
    }
}

fn bare_remote(dir: &Path) -> PathBuf {
    let path = dir.join("remote.git");
    let repo = Repository::init_bare(&path).expect("init bare remote");
    let signature = Signature::now("test", "test@example.com").expect("signature");
    let tree_id = repo
        .treebuilder(None)
        .expect("treebuilder")
        .write()
        .expect("write tree");
    let tree = repo.find_tree(tree_id).expect("find tree");
    repo.commit(Some("refs/heads/main"), &signature, &signature, "initial", &tree, &[])
        .expect("initial commit");
    repo.set_head("refs/heads/main").expect("set head");
    path
}

fn clone_config(remote: &Path, directory: PathBuf) -> GitRepoConfig {
    GitRepoConfig {
        url: remote.to_string_lossy().into_owned(),
        directory,
        ..GitRepoConfig::default()
    }
}
