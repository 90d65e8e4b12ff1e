use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of the hex prefix used when naming per customer tenant resources.
const RESOURCE_HASH_LEN: usize = 16;

/// The customer owning one or more applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub name: String,
    pub tenant_id: String,
    pub tenant_name: String,
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default)]
    pub status: ApplicationStatus,
}

impl Application {
    #[must_use]
    pub fn new(tenant: &Tenant, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tenant_id: tenant.id.clone(),
            tenant_name: tenant.name.clone(),
            environments: Vec::new(),
            status: ApplicationStatus::default(),
        }
    }

    #[must_use]
    pub fn tenant(&self) -> Tenant {
        Tenant {
            id: self.tenant_id.clone(),
            name: self.tenant_name.clone(),
        }
    }

    /// Looks up an environment by name, ignoring case.
    #[must_use]
    pub fn environment(&self, name: &str) -> Option<&Environment> {
        self.environments
            .iter()
            .find(|env| env.name.eq_ignore_ascii_case(name))
    }

    /// Inserts or merges an environment.
    ///
    /// An existing entry keeps its display name and its welcome microservice id
    /// unless the incoming one is set and the stored one is empty.
    pub fn upsert_environment(&mut self, environment: Environment) {
        match self
            .environments
            .iter_mut()
            .find(|env| env.name.eq_ignore_ascii_case(&environment.name))
        {
            Some(existing) => {
                if existing.welcome_microservice_id.is_empty() {
                    existing.welcome_microservice_id = environment.welcome_microservice_id;
                }
                if !environment.customer_tenants.is_empty() {
                    existing.customer_tenants = environment.customer_tenants;
                }
            }
            None => self.environments.push(environment),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub name: String,
    #[serde(default)]
    pub customer_tenants: Vec<CustomerTenantInfo>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub welcome_microservice_id: String,
    /// Derived from the tenant's studio config when read, never stored.
    #[serde(skip)]
    pub automation_enabled: bool,
}

impl Environment {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            customer_tenants: Vec::new(),
            welcome_microservice_id: String::new(),
            automation_enabled: false,
        }
    }

    /// The lower-cased name used in every Kubernetes resource name and Git path.
    #[must_use]
    pub fn resource_name(&self) -> String {
        self.name.to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerTenantInfo {
    pub customer_tenant_id: String,
    pub environment: String,
    #[serde(default)]
    pub hosts: Vec<CustomerTenantHost>,
    #[serde(default)]
    pub microservices_rel: Vec<MicroserviceRel>,
}

impl CustomerTenantInfo {
    /// Links a microservice to this customer tenant, ignoring duplicates.
    pub fn link_microservice(&mut self, microservice_id: &str) {
        if self
            .microservices_rel
            .iter()
            .any(|rel| rel.microservice_id == microservice_id)
        {
            return;
        }
        self.microservices_rel
            .push(MicroserviceRel::new(&self.customer_tenant_id, microservice_id));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerTenantHost {
    pub host: String,
    pub secret_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroserviceRel {
    pub microservice_id: String,
    pub hash: String,
}

impl MicroserviceRel {
    #[must_use]
    pub fn new(customer_tenant_id: &str, microservice_id: &str) -> Self {
        Self {
            microservice_id: microservice_id.to_string(),
            hash: resource_hash(customer_tenant_id, microservice_id),
        }
    }
}

/// Deterministic name fragment for resources owned by one microservice within
/// one customer tenant.
#[must_use]
pub fn resource_hash(customer_tenant_id: &str, microservice_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(customer_tenant_id.as_bytes());
    hasher.update(b"_");
    hasher.update(microservice_id.as_bytes());
    hex::encode(hasher.finalize())[..RESOURCE_HASH_LEN].to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Pending,
    Running,
    Finished,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    pub state: State,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApplicationStatus {
    #[must_use]
    pub fn running(now: DateTime<Utc>) -> Self {
        Self {
            state: State::Running,
            started_at: Some(now),
            finished_at: None,
            message: None,
        }
    }

    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.state = State::Finished;
        self.finished_at = Some(now);
        self.message = None;
    }

    pub fn fail(&mut self, now: DateTime<Utc>, message: impl Into<String>) {
        self.state = State::Failed;
        self.finished_at = Some(now);
        self.message = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> Tenant {
        Tenant {
            id: "fake-customer-id".to_string(),
            name: "Customer".to_string(),
        }
    }

    #[test]
    fn test_upsert_keeps_welcome_microservice_id() {
        let mut app = Application::new(&tenant(), "fake-application-id", "Taco");
        let mut dev = Environment::new("Dev");
        dev.welcome_microservice_id = "first".to_string();
        app.upsert_environment(dev);

        app.upsert_environment(Environment::new("dev"));

        assert_eq!(app.environments.len(), 1);
        assert_eq!(app.environments[0].name, "Dev");
        assert_eq!(app.environments[0].welcome_microservice_id, "first");
    }

    #[test]
    fn test_upsert_fills_empty_welcome_microservice_id() {
        let mut app = Application::new(&tenant(), "fake-application-id", "Taco");
        app.upsert_environment(Environment::new("Prod"));

        let mut prod = Environment::new("Prod");
        prod.welcome_microservice_id = "second".to_string();
        app.upsert_environment(prod);

        assert_eq!(app.environment("prod").unwrap().welcome_microservice_id, "second");
    }

    #[test]
    fn test_resource_hash_is_deterministic() {
        let a = resource_hash("tenant", "microservice");
        let b = resource_hash("tenant", "microservice");
        assert_eq!(a, b);
        assert_eq!(a.len(), RESOURCE_HASH_LEN);
        assert_ne!(a, resource_hash("other", "microservice"));
    }

    #[test]
    fn test_link_microservice_ignores_duplicates() {
        let mut info = CustomerTenantInfo {
            customer_tenant_id: "ct".to_string(),
            environment: "Dev".to_string(),
            hosts: Vec::new(),
            microservices_rel: Vec::new(),
        };
        info.link_microservice("ms");
        info.link_microservice("ms");
        assert_eq!(info.microservices_rel.len(), 1);
    }

    #[test]
    fn test_automation_enabled_is_not_serialized() {
        let mut env = Environment::new("Dev");
        env.automation_enabled = true;
        let json = serde_json::to_value(&env).unwrap();
        assert!(json.get("automationEnabled").is_none());
        assert!(json.get("welcomeMicroserviceId").is_none());
    }
}
