//! Shared ARM request and response shapes

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `api-version` for `Microsoft.Web/sites` and `Microsoft.Web/serverfarms`
pub const WEB_API_VERSION: &str = "2023-12-01";

/// `api-version` for `Microsoft.Web/staticSites`
pub const STATIC_SITES_API_VERSION: &str = "2023-01-01";

/// ARM error envelope: `{"error": {"code": "...", "message": "..."}}`
#[derive(Debug, Deserialize)]
pub struct ArmErrorResponse {
    pub error: ArmErrorBody,
}

#[derive(Debug, Deserialize, Default)]
pub struct ArmErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Settings-style resource body (`config/appsettings`, `config/metadata`)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StringDictionary {
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl StringDictionary {
    pub fn new(properties: HashMap<String, String>) -> Self {
        Self { properties }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedServiceIdentity {
    #[serde(rename = "type")]
    pub identity_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_assigned_identities: Option<HashMap<String, UserAssignedIdentity>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SkuDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ApiQueryParams {
    params: Vec<(String, String)>,
}

impl ApiQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query string carrying only the `api-version`
    pub fn api_version(version: &str) -> Self {
        Self::new().add("api-version", version)
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    pub fn to_query_string(&self) -> String {
        if self.params.is_empty() {
            String::new()
        } else {
            format!(
                "?{}",
                self.params
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&")
            )
        }
    }
}
