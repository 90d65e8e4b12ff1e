use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identity header shared by every stored microservice document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DolittleIds {
    pub application_id: String,
    pub customer_id: String,
    pub microservice_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MicroserviceKind {
    Simple,
    BusinessMomentsAdaptor,
    RawDataLogIngestor,
    PurchaseOrderApi,
}

/// A stored microservice, tagged by its `kind` field.
///
/// Unknown kinds are rejected when the document is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MicroserviceDocument {
    Simple(Microservice<SimpleExtra>),
    BusinessMomentsAdaptor(Microservice<BusinessMomentsAdaptorExtra>),
    RawDataLogIngestor(Microservice<RawDataLogIngestorExtra>),
    PurchaseOrderApi(Microservice<PurchaseOrderApiExtra>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Microservice<E> {
    pub dolittle: DolittleIds,
    pub name: String,
    pub environment: String,
    pub extra: E,
}

impl MicroserviceDocument {
    #[must_use]
    pub fn kind(&self) -> MicroserviceKind {
        match self {
            Self::Simple(_) => MicroserviceKind::Simple,
            Self::BusinessMomentsAdaptor(_) => MicroserviceKind::BusinessMomentsAdaptor,
            Self::RawDataLogIngestor(_) => MicroserviceKind::RawDataLogIngestor,
            Self::PurchaseOrderApi(_) => MicroserviceKind::PurchaseOrderApi,
        }
    }

    #[must_use]
    pub fn dolittle(&self) -> &DolittleIds {
        match self {
            Self::Simple(ms) => &ms.dolittle,
            Self::BusinessMomentsAdaptor(ms) => &ms.dolittle,
            Self::RawDataLogIngestor(ms) => &ms.dolittle,
            Self::PurchaseOrderApi(ms) => &ms.dolittle,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Simple(ms) => &ms.name,
            Self::BusinessMomentsAdaptor(ms) => &ms.name,
            Self::RawDataLogIngestor(ms) => &ms.name,
            Self::PurchaseOrderApi(ms) => &ms.name,
        }
    }

    #[must_use]
    pub fn environment(&self) -> &str {
        match self {
            Self::Simple(ms) => &ms.environment,
            Self::BusinessMomentsAdaptor(ms) => &ms.environment,
            Self::RawDataLogIngestor(ms) => &ms.environment,
            Self::PurchaseOrderApi(ms) => &ms.environment,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.dolittle().microservice_id
    }

    pub fn as_business_moments_adaptor_mut(
        &mut self,
    ) -> Result<&mut Microservice<BusinessMomentsAdaptorExtra>> {
        match self {
            Self::BusinessMomentsAdaptor(ms) => Ok(ms),
            _ => Err(Error::NotBusinessMomentsAdaptor),
        }
    }

    pub fn as_business_moments_adaptor(&self) -> Result<&Microservice<BusinessMomentsAdaptorExtra>> {
        match self {
            Self::BusinessMomentsAdaptor(ms) => Ok(ms),
            _ => Err(Error::NotBusinessMomentsAdaptor),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressPath {
    pub path: String,
    pub path_type: String,
}

impl Default for IngressPath {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            path_type: "Prefix".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleExtra {
    pub head_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_image: Option<String>,
    #[serde(default)]
    pub ingress: IngressPath,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default = "default_head_port")]
    pub head_port: i32,
}

fn default_head_port() -> i32 {
    80
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessMomentsAdaptorExtra {
    pub head_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_image: Option<String>,
    #[serde(default)]
    pub ingress: IngressPath,
    #[serde(default)]
    pub connector: serde_json::Value,
    #[serde(default)]
    pub entities: Vec<BusinessMomentEntity>,
    #[serde(default)]
    pub moments: Vec<BusinessMoment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessMomentEntity {
    pub entity_type_id: String,
    pub name: String,
    #[serde(default)]
    pub filter_code: String,
    #[serde(default)]
    pub transform_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessMoment {
    pub moment_type_id: String,
    pub entity_type_id: String,
    pub name: String,
    #[serde(default)]
    pub embedding_code: String,
    #[serde(default)]
    pub projection_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub kind: String,
    pub uri_suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDataLogIngestorExtra {
    pub head_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_image: Option<String>,
    #[serde(default)]
    pub ingress: IngressPath,
    #[serde(default)]
    pub webhooks: Vec<Webhook>,
    #[serde(default)]
    pub webhook_statsd_authorization: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderApiExtra {
    pub head_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_image: Option<String>,
    #[serde(default)]
    pub raw_data_log_name: String,
    #[serde(default)]
    pub webhooks: Vec<Webhook>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroserviceBusinessMoment {
    pub microservice_id: String,
    pub moment: BusinessMoment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroserviceBusinessMomentEntity {
    pub microservice_id: String,
    pub entity: BusinessMomentEntity,
}

/// Every moment and entity across the business moments adaptors of one
/// environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessMoments {
    pub application_id: String,
    pub environment: String,
    pub moments: Vec<MicroserviceBusinessMoment>,
    pub entities: Vec<MicroserviceBusinessMomentEntity>,
}

impl BusinessMomentsAdaptorExtra {
    /// Replaces the moment with the same type id, or appends it.
    pub fn upsert_moment(&mut self, moment: BusinessMoment) {
        match self
            .moments
            .iter_mut()
            .find(|m| m.moment_type_id == moment.moment_type_id)
        {
            Some(existing) => *existing = moment,
            None => self.moments.push(moment),
        }
    }

    pub fn upsert_entity(&mut self, entity: BusinessMomentEntity) {
        match self
            .entities
            .iter_mut()
            .find(|e| e.entity_type_id == entity.entity_type_id)
        {
            Some(existing) => *existing = entity,
            None => self.entities.push(entity),
        }
    }

    /// Removing an entity also removes the moments built on it.
    pub fn remove_entity(&mut self, entity_type_id: &str) {
        self.entities.retain(|e| e.entity_type_id != entity_type_id);
        self.moments.retain(|m| m.entity_type_id != entity_type_id);
    }

    pub fn remove_moment(&mut self, moment_type_id: &str) {
        self.moments.retain(|m| m.moment_type_id != moment_type_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> DolittleIds {
        DolittleIds {
            application_id: "app".to_string(),
            customer_id: "customer".to_string(),
            microservice_id: "ms".to_string(),
        }
    }

    #[test]
    fn test_kind_tag_is_written() {
        let doc = MicroserviceDocument::Simple(Microservice {
            dolittle: ids(),
            name: "Welcome".to_string(),
            environment: "Dev".to_string(),
            extra: SimpleExtra {
                head_image: "nginxdemos/hello:latest".to_string(),
                runtime_image: None,
                ingress: IngressPath::default(),
                is_public: true,
                head_port: 80,
            },
        });

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["kind"], "simple");
        assert_eq!(json["dolittle"]["microserviceId"], "ms");
        assert_eq!(json["extra"]["ingress"]["pathType"], "Prefix");
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let json = serde_json::json!({
            "kind": "mystery",
            "dolittle": {"applicationId": "a", "customerId": "c", "microserviceId": "m"},
            "name": "x",
            "environment": "Dev",
            "extra": {}
        });
        assert!(serde_json::from_value::<MicroserviceDocument>(json).is_err());
    }

    #[test]
    fn test_business_moments_accessor_checks_kind() {
        let json = serde_json::json!({
            "kind": "business-moments-adaptor",
            "dolittle": {"applicationId": "a", "customerId": "c", "microserviceId": "m"},
            "name": "bma",
            "environment": "Dev",
            "extra": {"headImage": "img"}
        });
        let mut doc: MicroserviceDocument = serde_json::from_value(json).unwrap();
        assert_eq!(doc.kind(), MicroserviceKind::BusinessMomentsAdaptor);
        assert!(doc.as_business_moments_adaptor_mut().is_ok());

        let mut simple = MicroserviceDocument::Simple(Microservice {
            dolittle: ids(),
            name: "Welcome".to_string(),
            environment: "Dev".to_string(),
            extra: SimpleExtra {
                head_image: "img".to_string(),
                runtime_image: None,
                ingress: IngressPath::default(),
                is_public: false,
                head_port: 80,
            },
        });
        assert!(matches!(
            simple.as_business_moments_adaptor_mut(),
            Err(Error::NotBusinessMomentsAdaptor)
        ));
    }

    #[test]
    fn test_removing_entity_drops_its_moments() {
        let mut extra = BusinessMomentsAdaptorExtra {
            head_image: "img".to_string(),
            runtime_image: None,
            ingress: IngressPath::default(),
            connector: serde_json::Value::Null,
            entities: Vec::new(),
            moments: Vec::new(),
        };
        extra.upsert_entity(BusinessMomentEntity {
            entity_type_id: "order".to_string(),
            name: "Order".to_string(),
            filter_code: String::new(),
            transform_code: String::new(),
        });
        let moment = BusinessMoment {
            moment_type_id: "placed".to_string(),
            entity_type_id: "order".to_string(),
            name: "Placed".to_string(),
            embedding_code: String::new(),
            projection_code: String::new(),
        };
        extra.upsert_moment(moment.clone());
        extra.upsert_moment(BusinessMoment {
            name: "Order placed".to_string(),
            ..moment
        });
        assert_eq!(extra.moments.len(), 1);
        assert_eq!(extra.moments[0].name, "Order placed");

        extra.remove_entity("order");
        assert!(extra.entities.is_empty());
        assert!(extra.moments.is_empty());
    }
}
