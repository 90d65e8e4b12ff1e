use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use kube::core::ErrorResponse;
use serde::Serialize;

use super::{Cluster, Kind, Object};
use crate::error::{Error, Result};

type Key = (Kind, String, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Create,
    Replace,
    Delete,
}

/// A mutation the in-memory cluster accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub verb: Verb,
    pub kind: Kind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<Key, Object>,
    actions: Vec<Action>,
    failing: HashSet<(Verb, Kind, String)>,
}

/// [`Cluster`] that keeps objects in process.
///
/// It mimics the API server where provisioning depends on it: conflicts on
/// create, namespaced objects requiring their namespace, and namespace
/// deletion removing everything inside. Failures can be injected per verb,
/// kind and name.
#[derive(Default)]
pub struct MemoryCluster {
    state: Mutex<State>,
}

fn key(kind: Kind, namespace: Option<&str>, name: &str) -> Key {
    (
        kind,
        namespace.unwrap_or_default().to_string(),
        name.to_string(),
    )
}

fn injected(verb: Verb, kind: Kind, name: &str) -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected {verb:?} failure for {kind} {name}"),
        reason: "InternalError".to_string(),
        code: 500,
    }))
}

impl MemoryCluster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes every later `verb` on the named object fail.
    pub fn fail_on(&self, verb: Verb, kind: Kind, name: &str) {
        self.state().failing.insert((verb, kind, name.to_string()));
    }

    #[must_use]
    pub fn actions(&self) -> Vec<Action> {
        self.state().actions.clone()
    }

    /// Kind and name of every accepted create, in order.
    #[must_use]
    pub fn created(&self) -> Vec<(Kind, String)> {
        self.state()
            .actions
            .iter()
            .filter(|action| action.verb == Verb::Create)
            .map(|action| (action.kind, action.name.clone()))
            .collect()
    }

    #[must_use]
    pub fn contains(&self, kind: Kind, namespace: Option<&str>, name: &str) -> bool {
        self.state()
            .objects
            .contains_key(&key(kind, namespace, name))
    }

    #[must_use]
    pub fn objects_in(&self, namespace: &str) -> Vec<Object> {
        self.state()
            .objects
            .iter()
            .filter(|((_, ns, _), _)| ns == namespace)
            .map(|(_, object)| object.clone())
            .collect()
    }

    fn check_fault(state: &State, verb: Verb, kind: Kind, name: &str) -> Result<()> {
        if state.failing.contains(&(verb, kind, name.to_string())) {
            return Err(injected(verb, kind, name));
        }
        Ok(())
    }

    fn record(state: &mut State, verb: Verb, kind: Kind, namespace: Option<&str>, name: &str) {
        state.actions.push(Action {
            verb,
            kind,
            namespace: namespace.map(ToString::to_string),
            name: name.to_string(),
        });
    }
}

#[async_trait]
impl Cluster for MemoryCluster {
    async fn create(&self, object: &Object) -> Result<()> {
        let mut state = self.state();
        let (kind, namespace, name) = (object.kind(), object.namespace(), object.name());
        Self::check_fault(&state, Verb::Create, kind, name)?;

        if kind.is_namespaced() {
            let ns = namespace.ok_or_else(|| {
                Error::BadRequest(format!("{kind} {name} has no namespace"))
            })?;
            if !state.objects.contains_key(&key(Kind::Namespace, None, ns)) {
                return Err(Error::NotFound);
            }
        }

        let key = key(kind, namespace, name);
        if state.objects.contains_key(&key) {
            return Err(Error::AlreadyExists);
        }
        state.objects.insert(key, object.clone());
        Self::record(&mut state, Verb::Create, kind, namespace, name);
        Ok(())
    }

    async fn get(&self, kind: Kind, namespace: Option<&str>, name: &str) -> Result<Object> {
        self.state()
            .objects
            .get(&key(kind, namespace, name))
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn replace(&self, object: &Object) -> Result<()> {
        let mut state = self.state();
        let (kind, namespace, name) = (object.kind(), object.namespace(), object.name());
        Self::check_fault(&state, Verb::Replace, kind, name)?;

        let key = key(kind, namespace, name);
        match state.objects.get_mut(&key) {
            Some(existing) => *existing = object.clone(),
            None => return Err(Error::NotFound),
        }
        Self::record(&mut state, Verb::Replace, kind, namespace, name);
        Ok(())
    }

    async fn delete(&self, kind: Kind, namespace: Option<&str>, name: &str) -> Result<()> {
        let mut state = self.state();
        Self::check_fault(&state, Verb::Delete, kind, name)?;

        if state.objects.remove(&key(kind, namespace, name)).is_none() {
            return Err(Error::NotFound);
        }
        if kind == Kind::Namespace {
            state.objects.retain(|(_, ns, _), _| ns != name);
        }
        Self::record(&mut state, Verb::Delete, kind, namespace, name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::{ConfigMap, Namespace};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    use super::*;

    fn namespace(name: &str) -> Object {
        Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
        .into()
    }

    fn config_map(namespace: &str, name: &str) -> Object {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
        .into()
    }

    #[tokio::test]
    async fn test_create_conflicts() {
        let cluster = MemoryCluster::new();
        cluster.create(&namespace("ns")).await.unwrap();
        assert!(matches!(
            cluster.create(&namespace("ns")).await,
            Err(Error::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_namespaced_create_requires_namespace() {
        let cluster = MemoryCluster::new();
        assert!(matches!(
            cluster.create(&config_map("missing", "cm")).await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_namespace_delete_cascades() {
        let cluster = MemoryCluster::new();
        cluster.create(&namespace("ns")).await.unwrap();
        cluster.create(&config_map("ns", "cm")).await.unwrap();

        cluster.delete(Kind::Namespace, None, "ns").await.unwrap();

        assert!(!cluster.contains(Kind::ConfigMap, Some("ns"), "cm"));
        assert!(cluster.objects_in("ns").is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let cluster = MemoryCluster::new();
        cluster.fail_on(Verb::Create, Kind::Namespace, "ns");
        assert!(matches!(
            cluster.create(&namespace("ns")).await,
            Err(Error::Kube(_))
        ));
        assert!(cluster.actions().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_is_scoped_to_verb_and_name() {
        let cluster = MemoryCluster::new();
        cluster.fail_on(Verb::Delete, Kind::ConfigMap, "doomed");
        cluster.fail_on(Verb::Delete, Kind::ConfigMap, "doomed");
        cluster.create(&namespace("ns")).await.unwrap();
        cluster.create(&config_map("ns", "doomed")).await.unwrap();
        cluster.create(&config_map("ns", "spared")).await.unwrap();

        cluster.delete(Kind::ConfigMap, Some("ns"), "spared").await.unwrap();
        assert!(matches!(
            cluster.delete(Kind::ConfigMap, Some("ns"), "doomed").await,
            Err(Error::Kube(_))
        ));
        assert!(cluster.contains(Kind::ConfigMap, Some("ns"), "doomed"));
        assert_eq!(cluster.actions().len(), 4);
    }
}
