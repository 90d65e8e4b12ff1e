use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{Cred, ErrorCode, FetchOptions, PushOptions, RemoteCallbacks, Repository, Signature};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::DocumentStore;
use super::path;
use crate::config::GitRepoConfig;
use crate::error::{Error, Result};
use crate::types::*;

const REMOTE: &str = "origin";

/// [`DocumentStore`] over a local clone of one branch of a Git repository.
///
/// The working tree is owned exclusively by this value; every read and every
/// pull/write/commit/push cycle runs with the lock held.
pub struct GitStore {
    config: GitRepoConfig,
    repo: Mutex<Option<Repository>>,
}

fn remote_callbacks(config: &GitRepoConfig) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    if let Some(key) = &config.ssh_key {
        callbacks.credentials(move |_url, username, _allowed| {
            Cred::ssh_key(username.unwrap_or("git"), None, key, None)
        });
    }
    callbacks
}

fn fetch_options(config: &GitRepoConfig) -> FetchOptions<'_> {
    let mut options = FetchOptions::new();
    options.remote_callbacks(remote_callbacks(config));
    options
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Pretty JSON with two-space indentation and a trailing newline.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    fs::write(path, content)?;
    Ok(())
}

/// Names of the visible subdirectories of `dir`, sorted; a missing directory
/// has none.
fn subdirectories(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

impl GitStore {
    /// Opens the working tree, cloning it first if the directory holds none.
    pub fn open(config: GitRepoConfig) -> Result<Self> {
        let repo = if config.directory_only {
            fs::create_dir_all(&config.directory)?;
            info!(directory = %config.directory.display(), "using directory without git");
            None
        } else if config.directory.join(".git").exists() {
            info!(directory = %config.directory.display(), "opening existing clone");
            Some(Repository::open(&config.directory)?)
        } else {
            if config.url.is_empty() {
                return Err(Error::Config("git url is required to clone".to_string()));
            }
            info!(url = %config.url, branch = %config.branch, "cloning");
            let repo = RepoBuilder::new()
                .branch(&config.branch)
                .fetch_options(fetch_options(&config))
                .clone(&config.url, &config.directory)?;
            Some(repo)
        };

        Ok(Self {
            config,
            repo: Mutex::new(repo),
        })
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    fn lock(&self) -> MutexGuard<'_, Option<Repository>> {
        self.repo.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn absolute(&self, relative: &Path) -> PathBuf {
        self.config.directory.join(relative)
    }

    fn pull_locked(&self, repo: &Repository) -> Result<()> {
        let branch = self.config.branch.as_str();
        let mut remote = repo.find_remote(REMOTE)?;
        remote.fetch(&[branch], Some(&mut fetch_options(&self.config)), None)?;

        let fetch_head = repo.find_reference("FETCH_HEAD")?;
        let incoming = repo.reference_to_annotated_commit(&fetch_head)?;
        let (analysis, _) = repo.merge_analysis(&[&incoming])?;

        if analysis.is_up_to_date() {
            debug!(branch, "already up to date");
            return Ok(());
        }
        if !(analysis.is_fast_forward() || analysis.is_unborn()) {
            return Err(Error::NotFastForward);
        }

        let refname = format!("refs/heads/{branch}");
        match repo.find_reference(&refname) {
            Ok(mut reference) => {
                reference.set_target(incoming.id(), "pull: fast-forward")?;
            }
            Err(e) if e.code() == ErrorCode::NotFound => {
                repo.reference(&refname, incoming.id(), true, "pull: fast-forward")?;
            }
            Err(e) => return Err(e.into()),
        }
        repo.set_head(&refname)?;
        repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
        debug!(branch, commit = %incoming.id(), "fast-forwarded");
        Ok(())
    }

    /// Stages `paths` and commits them. Returns false when the tree did not
    /// change, in which case nothing is committed.
    fn commit_locked(&self, repo: &Repository, paths: &[PathBuf], message: &str) -> Result<bool> {
        let mut index = repo.index()?;
        for relative in paths {
            if self.absolute(relative).exists() {
                index.add_path(relative)?;
            } else {
                index.remove_path(relative)?;
            }
        }
        index.write()?;
        let tree_id = index.write_tree()?;

        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e.into()),
        };
        if parent.as_ref().is_some_and(|p| p.tree_id() == tree_id) {
            debug!(message, "nothing changed, skipping commit");
            return Ok(false);
        }

        let tree = repo.find_tree(tree_id)?;
        let signature = Signature::now(&self.config.author_name, &self.config.author_email)?;
        let parents: Vec<_> = parent.iter().collect();
        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
        Ok(true)
    }

    fn push_locked(&self, repo: &Repository) -> Result<()> {
        let branch = self.config.branch.as_str();
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let mut remote = repo.find_remote(REMOTE)?;

        let mut rejection: Option<String> = None;
        let pushed = {
            let mut callbacks = remote_callbacks(&self.config);
            callbacks.push_update_reference(|refname, status| {
                if let Some(status) = status {
                    rejection = Some(format!("{refname}: {status}"));
                }
                Ok(())
            });
            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);
            remote.push(&[refspec.as_str()], Some(&mut options))
        };

        match pushed {
            Err(e) if e.code() == ErrorCode::NotFastForward => {
                return Err(Error::PushRejected(e.message().to_string()));
            }
            Err(e) => return Err(e.into()),
            Ok(()) => {}
        }
        if let Some(reason) = rejection {
            return Err(Error::PushRejected(reason));
        }
        Ok(())
    }

    /// Runs one write cycle. `apply` edits files under the working tree root and
    /// returns the relative paths it touched.
    fn write<F>(&self, message: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&Path) -> Result<Vec<PathBuf>>,
    {
        let guard = self.lock();

        if let Some(repo) = guard.as_ref() {
            self.pull_locked(repo)?;
        }

        let changed = apply(&self.config.directory)?;

        if let Some(repo) = guard.as_ref() {
            if self.commit_locked(repo, &changed, message)? {
                self.push_locked(repo)?;
                info!(message, "committed and pushed");
            }
        } else {
            info!(message, "written");
        }
        Ok(())
    }

    fn save<T: Serialize>(&self, relative: PathBuf, value: &T, message: &str) -> Result<()> {
        self.write(message, |root| {
            write_json(&root.join(&relative), value)?;
            Ok(vec![relative.clone()])
        })
    }

    fn read<T: DeserializeOwned>(&self, relative: &Path) -> Result<Option<T>> {
        let _guard = self.lock();
        read_json(&self.absolute(relative))
    }

    fn update_adaptor<F>(
        &self,
        tenant_id: &str,
        application_id: &str,
        environment: &str,
        microservice_id: &str,
        message: &str,
        update: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut BusinessMomentsAdaptorExtra),
    {
        let relative = path::microservice(tenant_id, application_id, environment, microservice_id)?;
        self.write(message, |root| {
            let file = root.join(&relative);
            let mut document: MicroserviceDocument = read_json(&file)?.ok_or(Error::NotFound)?;
            update(&mut document.as_business_moments_adaptor_mut()?.extra);
            write_json(&file, &document)?;
            Ok(vec![relative.clone()])
        })
    }

    fn with_automation(&self, mut application: Application) -> Result<Application> {
        let studio = self.get_studio_config(&application.tenant_id)?;
        for environment in &mut application.environments {
            environment.automation_enabled =
                studio.automation_enabled(&application.id, &environment.name);
        }
        Ok(application)
    }

    fn read_microservices_in(&self, dir: &Path) -> Result<Vec<MicroserviceDocument>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if path::microservice_id_from_file(&name).is_some() {
                files.push(entry.path());
            }
        }
        files.sort();

        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            if let Some(document) = read_json(&file)? {
                documents.push(document);
            }
        }
        Ok(documents)
    }
}

impl DocumentStore for GitStore {
    fn pull(&self) -> Result<()> {
        let guard = self.lock();
        match guard.as_ref() {
            Some(repo) => self.pull_locked(repo),
            None => Ok(()),
        }
    }

    fn get_tenants(&self) -> Result<Vec<String>> {
        let guard = self.lock();
        if let Some(repo) = guard.as_ref() {
            self.pull_locked(repo)?;
        }
        subdirectories(&self.config.directory)
    }

    fn get_studio_config(&self, tenant_id: &str) -> Result<StudioConfig> {
        match self.read(&path::studio(tenant_id)?) {
            Ok(Some(config)) => Ok(config),
            Ok(None) => Ok(StudioConfig::default()),
            Err(Error::Json(e)) => {
                warn!(tenant_id, error = %e, "unreadable studio config, allowing everything");
                Ok(StudioConfig::default())
            }
            Err(e) => Err(e),
        }
    }

    fn save_studio_config(&self, tenant_id: &str, config: &StudioConfig) -> Result<()> {
        self.save(
            path::studio(tenant_id)?,
            config,
            &format!("saved studio config for {tenant_id}"),
        )
    }

    fn get_application(&self, tenant_id: &str, application_id: &str) -> Result<Application> {
        let application = self
            .read(&path::application(tenant_id, application_id)?)?
            .ok_or(Error::NotFound)?;
        self.with_automation(application)
    }

    fn get_applications(&self, tenant_id: &str) -> Result<Vec<Application>> {
        let dir = self.absolute(&path::tenant_dir(tenant_id)?);
        let mut applications = Vec::new();
        {
            let _guard = self.lock();
            for application_id in subdirectories(&dir)? {
                let file = dir.join(&application_id).join(path::APPLICATION_FILE);
                if let Some(application) = read_json::<Application>(&file)? {
                    applications.push(application);
                }
            }
        }
        applications
            .into_iter()
            .map(|application| self.with_automation(application))
            .collect()
    }

    fn save_application(&self, application: &Application) -> Result<()> {
        self.save(
            path::application(&application.tenant_id, &application.id)?,
            application,
            &format!("saved application {}", application.id),
        )
    }

    fn get_microservice(
        &self,
        tenant_id: &str,
        application_id: &str,
        environment: &str,
        microservice_id: &str,
    ) -> Result<MicroserviceDocument> {
        self.read(&path::microservice(
            tenant_id,
            application_id,
            environment,
            microservice_id,
        )?)?
        .ok_or(Error::NotFound)
    }

    fn get_microservices(
        &self,
        tenant_id: &str,
        application_id: &str,
    ) -> Result<Vec<MicroserviceDocument>> {
        let dir = self.absolute(&path::application_dir(tenant_id, application_id)?);
        let _guard = self.lock();
        let mut documents = Vec::new();
        for environment in subdirectories(&dir)? {
            documents.extend(self.read_microservices_in(&dir.join(environment))?);
        }
        Ok(documents)
    }

    fn save_microservice(&self, tenant_id: &str, microservice: &MicroserviceDocument) -> Result<()> {
        let relative = path::microservice(
            tenant_id,
            &microservice.dolittle().application_id,
            microservice.environment(),
            microservice.id(),
        )?;
        self.save(
            relative,
            microservice,
            &format!("saved microservice {}", microservice.id()),
        )
    }

    fn delete_microservice(
        &self,
        tenant_id: &str,
        application_id: &str,
        environment: &str,
        microservice_id: &str,
    ) -> Result<()> {
        let relative = path::microservice(tenant_id, application_id, environment, microservice_id)?;
        self.write(&format!("deleted microservice {microservice_id}"), |root| {
            match fs::remove_file(root.join(&relative)) {
                Ok(()) => Ok(vec![relative.clone()]),
                Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn get_business_moments(
        &self,
        tenant_id: &str,
        application_id: &str,
        environment: &str,
    ) -> Result<BusinessMoments> {
        let dir = self.absolute(&path::environment_dir(tenant_id, application_id, environment)?);
        let documents = {
            let _guard = self.lock();
            self.read_microservices_in(&dir)?
        };

        let mut result = BusinessMoments {
            application_id: application_id.to_string(),
            environment: environment.to_string(),
            ..Default::default()
        };
        for document in &documents {
            let Ok(adaptor) = document.as_business_moments_adaptor() else {
                continue;
            };
            let microservice_id = &adaptor.dolittle.microservice_id;
            result
                .moments
                .extend(adaptor.extra.moments.iter().map(|moment| MicroserviceBusinessMoment {
                    microservice_id: microservice_id.clone(),
                    moment: moment.clone(),
                }));
            result.entities.extend(adaptor.extra.entities.iter().map(|entity| {
                MicroserviceBusinessMomentEntity {
                    microservice_id: microservice_id.clone(),
                    entity: entity.clone(),
                }
            }));
        }
        Ok(result)
    }

    fn save_business_moment(
        &self,
        tenant_id: &str,
        application_id: &str,
        environment: &str,
        microservice_id: &str,
        moment: BusinessMoment,
    ) -> Result<()> {
        let message = format!("saved business moment {}", moment.moment_type_id);
        self.update_adaptor(
            tenant_id,
            application_id,
            environment,
            microservice_id,
            &message,
            |extra| extra.upsert_moment(moment),
        )
    }

    fn delete_business_moment(
        &self,
        tenant_id: &str,
        application_id: &str,
        environment: &str,
        microservice_id: &str,
        moment_type_id: &str,
    ) -> Result<()> {
        self.update_adaptor(
            tenant_id,
            application_id,
            environment,
            microservice_id,
            &format!("deleted business moment {moment_type_id}"),
            |extra| extra.remove_moment(moment_type_id),
        )
    }

    fn save_business_moment_entity(
        &self,
        tenant_id: &str,
        application_id: &str,
        environment: &str,
        microservice_id: &str,
        entity: BusinessMomentEntity,
    ) -> Result<()> {
        let message = format!("saved business moment entity {}", entity.entity_type_id);
        self.update_adaptor(
            tenant_id,
            application_id,
            environment,
            microservice_id,
            &message,
            |extra| extra.upsert_entity(entity),
        )
    }

    fn delete_business_moment_entity(
        &self,
        tenant_id: &str,
        application_id: &str,
        environment: &str,
        microservice_id: &str,
        entity_type_id: &str,
    ) -> Result<()> {
        self.update_adaptor(
            tenant_id,
            application_id,
            environment,
            microservice_id,
            &format!("deleted business moment entity {entity_type_id}"),
            |extra| extra.remove_entity(entity_type_id),
        )
    }

    fn get_terraform_tenant(&self, tenant_id: &str) -> Result<Option<TerraformTenant>> {
        self.read(&path::tenant(tenant_id)?)
    }

    fn save_terraform_tenant(&self, tenant: &TerraformTenant) -> Result<()> {
        self.save(
            path::tenant(&tenant.id)?,
            tenant,
            &format!("saved terraform tenant {}", tenant.id),
        )
    }

    fn get_terraform_application(
        &self,
        tenant_id: &str,
        application_id: &str,
    ) -> Result<Option<TerraformApplication>> {
        self.read(&path::terraform_application(tenant_id, application_id)?)
    }

    fn save_terraform_application(&self, application: &TerraformApplication) -> Result<()> {
        self.save(
            path::terraform_application(&application.tenant_id, &application.id)?,
            application,
            &format!("saved terraform application {}", application.id),
        )
    }
}
