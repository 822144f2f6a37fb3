//! `Microsoft.Web/sites` operations
//!
//! Every operation takes the App or Slot ID; both address the same set of
//! sub-resources, so the ID's canonical form is the request path.

mod models;

pub use models::*;

use super::client::{ArmResponse, Client};
use super::common::{ApiQueryParams, StringDictionary, WEB_API_VERSION};
use super::error::ApiError;
use crate::ids::WebAppId;
use reqwest::Method;
use std::fmt::Display;

/// Publishing credential policies that can be toggled per site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishingPolicy {
    Ftp,
    Scm,
}

impl PublishingPolicy {
    fn segment(self) -> &'static str {
        match self {
            PublishingPolicy::Ftp => "ftp",
            PublishingPolicy::Scm => "scm",
        }
    }
}

pub struct SitesApi<'a> {
    client: &'a Client,
}

impl<'a> SitesApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(id: &impl Display, suffix: &str) -> String {
        format!(
            "{}{}{}",
            id,
            suffix,
            ApiQueryParams::api_version(WEB_API_VERSION).to_query_string()
        )
    }

    /// GET /sites/{name}
    pub async fn get(&self, id: &impl Display) -> Result<Site, ApiError> {
        self.client.get(&Self::path(id, "")).await
    }

    /// PUT /sites/{name}, returns the response for long-running polling
    pub async fn create_or_update(
        &self,
        id: &impl Display,
        site: &Site,
    ) -> Result<ArmResponse, ApiError> {
        self.client
            .send(Method::PUT, &Self::path(id, ""), Some(site))
            .await
    }

    /// PATCH /sites/{name}
    pub async fn update(&self, id: &impl Display, site: &Site) -> Result<Site, ApiError> {
        self.client.patch(&Self::path(id, ""), site).await
    }

    /// DELETE /sites/{name}, keeping the service plan and removing metrics
    pub async fn delete(&self, id: &impl Display) -> Result<(), ApiError> {
        let params = ApiQueryParams::api_version(WEB_API_VERSION)
            .add("deleteEmptyServerFarm", false)
            .add("deleteMetrics", true);
        self.client
            .delete(&format!("{}{}", id, params.to_query_string()))
            .await
            .map(|_| ())
    }

    /// GET /sites/{name}/config/web
    pub async fn get_configuration(&self, id: &impl Display) -> Result<SiteConfigResource, ApiError> {
        self.client.get(&Self::path(id, "/config/web")).await
    }

    /// PUT /sites/{name}/config/web
    pub async fn update_configuration(
        &self,
        id: &impl Display,
        config: &SiteConfigResource,
    ) -> Result<SiteConfigResource, ApiError> {
        self.client.put(&Self::path(id, "/config/web"), config).await
    }

    /// POST /sites/{name}/config/appsettings/list
    pub async fn list_application_settings(
        &self,
        id: &impl Display,
    ) -> Result<StringDictionary, ApiError> {
        self.client
            .post(&Self::path(id, "/config/appsettings/list"), &serde_json::json!({}))
            .await
    }

    /// PUT /sites/{name}/config/appsettings
    pub async fn update_application_settings(
        &self,
        id: &impl Display,
        settings: &StringDictionary,
    ) -> Result<StringDictionary, ApiError> {
        self.client
            .put(&Self::path(id, "/config/appsettings"), settings)
            .await
    }

    /// POST /sites/{name}/config/connectionstrings/list
    pub async fn list_connection_strings(
        &self,
        id: &impl Display,
    ) -> Result<ConnectionStringDictionary, ApiError> {
        self.client
            .post(
                &Self::path(id, "/config/connectionstrings/list"),
                &serde_json::json!({}),
            )
            .await
    }

    /// PUT /sites/{name}/config/connectionstrings
    pub async fn update_connection_strings(
        &self,
        id: &impl Display,
        strings: &ConnectionStringDictionary,
    ) -> Result<ConnectionStringDictionary, ApiError> {
        self.client
            .put(&Self::path(id, "/config/connectionstrings"), strings)
            .await
    }

    /// GET /sites/{name}/config/slotConfigNames
    ///
    /// Sticky settings belong to the App, never to a slot.
    pub async fn get_slot_config_names(
        &self,
        id: &WebAppId,
    ) -> Result<SlotConfigNamesResource, ApiError> {
        self.client
            .get(&Self::path(id, "/config/slotConfigNames"))
            .await
    }

    /// PUT /sites/{name}/config/slotConfigNames
    pub async fn update_slot_config_names(
        &self,
        id: &WebAppId,
        names: &SlotConfigNamesResource,
    ) -> Result<SlotConfigNamesResource, ApiError> {
        self.client
            .put(&Self::path(id, "/config/slotConfigNames"), names)
            .await
    }

    /// POST /sites/{name}/config/authsettings/list
    pub async fn get_auth_settings(&self, id: &impl Display) -> Result<SiteAuthSettings, ApiError> {
        self.client
            .post(
                &Self::path(id, "/config/authsettings/list"),
                &serde_json::json!({}),
            )
            .await
    }

    /// PUT /sites/{name}/config/authsettings
    pub async fn update_auth_settings(
        &self,
        id: &impl Display,
        settings: &SiteAuthSettings,
    ) -> Result<SiteAuthSettings, ApiError> {
        self.client
            .put(&Self::path(id, "/config/authsettings"), settings)
            .await
    }

    /// GET /sites/{name}/config/authsettingsV2/list
    pub async fn get_auth_settings_v2(
        &self,
        id: &impl Display,
    ) -> Result<SiteAuthSettingsV2, ApiError> {
        self.client
            .get(&Self::path(id, "/config/authsettingsV2/list"))
            .await
    }

    /// PUT /sites/{name}/config/authsettingsV2
    pub async fn update_auth_settings_v2(
        &self,
        id: &impl Display,
        settings: &SiteAuthSettingsV2,
    ) -> Result<SiteAuthSettingsV2, ApiError> {
        self.client
            .put(&Self::path(id, "/config/authsettingsV2"), settings)
            .await
    }

    /// POST /sites/{name}/config/metadata/list
    pub async fn list_metadata(&self, id: &impl Display) -> Result<StringDictionary, ApiError> {
        self.client
            .post(&Self::path(id, "/config/metadata/list"), &serde_json::json!({}))
            .await
    }

    /// PUT /sites/{name}/config/metadata
    pub async fn update_metadata(
        &self,
        id: &impl Display,
        metadata: &StringDictionary,
    ) -> Result<StringDictionary, ApiError> {
        self.client
            .put(&Self::path(id, "/config/metadata"), metadata)
            .await
    }

    /// GET /sites/{name}/basicPublishingCredentialsPolicies/{ftp|scm}
    pub async fn get_publishing_policy(
        &self,
        id: &impl Display,
        policy: PublishingPolicy,
    ) -> Result<CsmPublishingCredentialsPoliciesEntity, ApiError> {
        let suffix = format!("/basicPublishingCredentialsPolicies/{}", policy.segment());
        self.client.get(&Self::path(id, &suffix)).await
    }

    /// PUT /sites/{name}/basicPublishingCredentialsPolicies/{ftp|scm}
    pub async fn update_publishing_policy(
        &self,
        id: &impl Display,
        policy: PublishingPolicy,
        allow: bool,
    ) -> Result<(), ApiError> {
        let suffix = format!("/basicPublishingCredentialsPolicies/{}", policy.segment());
        let body = CsmPublishingCredentialsPoliciesEntity {
            properties: PublishingCredentialsPolicy { allow },
        };
        self.client
            .put::<serde_json::Value, _>(&Self::path(id, &suffix), &body)
            .await
            .map(|_| ())
    }

    /// POST /sites/{name}/slotsswap
    ///
    /// Swaps `target_slot` into production; returns the response for
    /// long-running polling.
    pub async fn swap_slot_with_production(
        &self,
        id: &WebAppId,
        swap: &CsmSlotEntity,
    ) -> Result<ArmResponse, ApiError> {
        self.client
            .send(Method::POST, &Self::path(id, "/slotsswap"), Some(swap))
            .await
    }
}
