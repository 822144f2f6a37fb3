//! `Microsoft.Web/staticSites` operations

mod models;

pub use models::*;

use super::client::{ArmResponse, Client};
use super::common::{ApiQueryParams, StringDictionary, STATIC_SITES_API_VERSION};
use super::error::ApiError;
use crate::ids::StaticSiteId;
use reqwest::Method;

pub struct StaticSitesApi<'a> {
    client: &'a Client,
}

impl<'a> StaticSitesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(id: &StaticSiteId, suffix: &str) -> String {
        format!(
            "{}{}{}",
            id,
            suffix,
            ApiQueryParams::api_version(STATIC_SITES_API_VERSION).to_query_string()
        )
    }

    /// GET /staticSites/{name}
    pub async fn get(&self, id: &StaticSiteId) -> Result<StaticSiteArmResource, ApiError> {
        self.client.get(&Self::path(id, "")).await
    }

    /// PUT /staticSites/{name}, returns the response for long-running polling
    pub async fn create_or_update(
        &self,
        id: &StaticSiteId,
        site: &StaticSiteArmResource,
    ) -> Result<ArmResponse, ApiError> {
        self.client
            .send(Method::PUT, &Self::path(id, ""), Some(site))
            .await
    }

    /// DELETE /staticSites/{name}, returns the response for long-running polling
    pub async fn delete(&self, id: &StaticSiteId) -> Result<ArmResponse, ApiError> {
        self.client.delete(&Self::path(id, "")).await
    }

    /// POST /staticSites/{name}/listSecrets
    pub async fn list_secrets(&self, id: &StaticSiteId) -> Result<StringDictionary, ApiError> {
        self.client
            .post(&Self::path(id, "/listSecrets"), &serde_json::json!({}))
            .await
    }

    /// POST /staticSites/{name}/listAppSettings
    pub async fn list_app_settings(&self, id: &StaticSiteId) -> Result<StringDictionary, ApiError> {
        self.client
            .post(&Self::path(id, "/listAppSettings"), &serde_json::json!({}))
            .await
    }

    /// PUT /staticSites/{name}/config/appsettings
    pub async fn update_app_settings(
        &self,
        id: &StaticSiteId,
        settings: &StringDictionary,
    ) -> Result<StringDictionary, ApiError> {
        self.client
            .put(&Self::path(id, "/config/appsettings"), settings)
            .await
    }

    /// GET /staticSites/{name}/basicAuth/default
    pub async fn get_basic_auth(&self, id: &StaticSiteId) -> Result<StaticSiteBasicAuth, ApiError> {
        self.client.get(&Self::path(id, "/basicAuth/default")).await
    }

    /// PUT /staticSites/{name}/basicAuth/default
    pub async fn update_basic_auth(
        &self,
        id: &StaticSiteId,
        auth: &StaticSiteBasicAuth,
    ) -> Result<StaticSiteBasicAuth, ApiError> {
        self.client
            .put(&Self::path(id, "/basicAuth/default"), auth)
            .await
    }
}
