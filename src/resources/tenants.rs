use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use serde_json::{Map, Value};

use super::labels::Owner;
use crate::error::{Error, Result};
use crate::types::CustomerTenantInfo;

pub const TENANTS_FILE: &str = "tenants.json";

#[must_use]
pub fn tenants_config_map_name(environment: &str) -> String {
    format!("{}-tenants", environment.to_lowercase())
}

/// Serializes the customer tenant ids as `{"<id>": {}, ...}`.
#[must_use]
pub fn tenants_json(customer_tenants: &[CustomerTenantInfo]) -> String {
    let tenants: Map<String, Value> = customer_tenants
        .iter()
        .map(|info| (info.customer_tenant_id.clone(), Value::Object(Map::new())))
        .collect();
    format!("{:#}", Value::Object(tenants))
}

/// The ConfigMap the runtime reads its customer tenants from.
#[must_use]
pub fn tenants_config_map(
    owner: &Owner<'_>,
    environment: &str,
    customer_tenants: &[CustomerTenantInfo],
) -> ConfigMap {
    let mut data = BTreeMap::new();
    data.insert(TENANTS_FILE.to_string(), tenants_json(customer_tenants));

    ConfigMap {
        metadata: owner.metadata(tenants_config_map_name(environment)),
        data: Some(data),
        ..Default::default()
    }
}

/// Reads the customer tenant ids back out of a tenants ConfigMap.
pub fn customer_tenants_from_config_map(
    config_map: &ConfigMap,
) -> Result<BTreeMap<String, Map<String, Value>>> {
    let raw = config_map
        .data
        .as_ref()
        .and_then(|data| data.get(TENANTS_FILE))
        .ok_or(Error::NotFound)?;
    Ok(serde_json::from_str(raw)?)
}
