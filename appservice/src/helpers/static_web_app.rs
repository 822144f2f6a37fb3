//! Static Web App model and its mapping to `Microsoft.Web/staticSites`

use super::identity::{self, Identity};
use super::ExpandError;
use crate::api::common::SkuDescription;
use crate::api::static_sites::{
    StaticSiteArmResource, StaticSiteBasicAuth, StaticSiteBasicAuthProperties, StaticSiteProperties,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const SKU_FREE: &str = "Free";
pub const SKU_STANDARD: &str = "Standard";
pub const BASIC_AUTH_ENVIRONMENTS: &[&str] = &["AllEnvironments", "StagingEnvironments"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicAuth {
    pub password: String,
    pub environments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticWebAppModel {
    pub id: String,
    pub name: String,
    pub resource_group_name: String,
    pub location: String,
    pub sku_tier: String,
    pub sku_size: String,
    pub configuration_file_changes_enabled: bool,
    pub preview_environments_enabled: bool,
    pub public_network_access_enabled: bool,
    pub app_settings: HashMap<String, String>,
    pub basic_auth: Vec<BasicAuth>,
    pub identity: Vec<Identity>,
    pub tags: HashMap<String, String>,
    pub api_key: String,
    pub default_host_name: String,
}

impl Default for StaticWebAppModel {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            resource_group_name: String::new(),
            location: String::new(),
            sku_tier: SKU_FREE.to_string(),
            sku_size: SKU_FREE.to_string(),
            configuration_file_changes_enabled: true,
            preview_environments_enabled: true,
            public_network_access_enabled: true,
            app_settings: HashMap::new(),
            basic_auth: Vec::new(),
            identity: Vec::new(),
            tags: HashMap::new(),
            api_key: String::new(),
            default_host_name: String::new(),
        }
    }
}

impl StaticWebAppModel {
    fn is_free(&self) -> bool {
        self.sku_tier.eq_ignore_ascii_case(SKU_FREE) || self.sku_size.eq_ignore_ascii_case(SKU_FREE)
    }

    /// Rules that hold regardless of what exists in Azure
    pub fn validate(&self) -> Result<(), ExpandError> {
        if self.is_free() {
            if !self.basic_auth.is_empty() {
                return Err(ExpandError::new(
                    "basic_auth cannot be used with the Free tier of Static Web Apps",
                ));
            }
            if !self.identity.is_empty() {
                return Err(ExpandError::new(
                    "identities cannot be used with the Free tier of Static Web Apps",
                ));
            }
        }
        Ok(())
    }

    pub fn expand(&self) -> Result<StaticSiteArmResource, ExpandError> {
        self.validate()?;

        let staging_environment_policy = if self.preview_environments_enabled {
            "Enabled"
        } else {
            "Disabled"
        };
        let public_network_access = if self.public_network_access_enabled {
            "Enabled"
        } else {
            "Disabled"
        };

        Ok(StaticSiteArmResource {
            location: self.location.clone(),
            tags: Some(self.tags.clone()),
            sku: Some(SkuDescription {
                name: Some(self.sku_size.clone()),
                tier: Some(self.sku_tier.clone()),
            }),
            identity: identity::expand(&self.identity)?,
            properties: Some(StaticSiteProperties {
                allow_config_file_updates: Some(self.configuration_file_changes_enabled),
                staging_environment_policy: Some(staging_environment_policy.to_string()),
                public_network_access: Some(public_network_access.to_string()),
                default_hostname: None,
            }),
            ..Default::default()
        })
    }

    /// Without a `basic_auth` block the body carries no environments mode,
    /// which turns basic auth off
    pub fn expand_basic_auth(&self) -> StaticSiteBasicAuth {
        let properties = match self.basic_auth.first() {
            Some(auth) => StaticSiteBasicAuthProperties {
                applicable_environments_mode: Some(auth.environments.clone()),
                password: Some(auth.password.clone()),
                environments: None,
            },
            None => StaticSiteBasicAuthProperties::default(),
        };
        StaticSiteBasicAuth { properties }
    }

    /// Overwrites the API-owned fields from `site`
    pub fn flatten(&mut self, site: &StaticSiteArmResource) {
        self.location = site.location.clone();
        self.tags = site.tags.clone().unwrap_or_default();
        if let Some(sku) = &site.sku {
            self.sku_size = sku.name.clone().unwrap_or_default();
            self.sku_tier = sku.tier.clone().unwrap_or_default();
        }
        self.identity = identity::flatten(site.identity.as_ref());

        if let Some(props) = &site.properties {
            self.configuration_file_changes_enabled =
                props.allow_config_file_updates.unwrap_or(true);
            self.preview_environments_enabled = props
                .staging_environment_policy
                .as_deref()
                .map_or(true, |p| p.eq_ignore_ascii_case("Enabled"));
            self.public_network_access_enabled = props
                .public_network_access
                .as_deref()
                .map_or(true, |p| !p.eq_ignore_ascii_case("Disabled"));
            self.default_host_name = props.default_hostname.clone().unwrap_or_default();
        }
    }

    /// The password is write-only; it comes from `prior`
    pub fn flatten_basic_auth(&mut self, auth: &StaticSiteBasicAuth, prior: &[BasicAuth]) {
        self.basic_auth = match auth.properties.applicable_environments_mode.as_deref() {
            Some(mode) if !mode.is_empty() => vec![BasicAuth {
                environments: mode.to_string(),
                password: prior
                    .first()
                    .map(|p| p.password.clone())
                    .unwrap_or_default(),
            }],
            _ => Vec::new(),
        };
    }
}
