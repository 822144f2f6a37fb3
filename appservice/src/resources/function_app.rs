//! Linux and Windows Function Apps
//!
//! Function Apps add backend storage, the Functions runtime version and
//! built-in logging on top of [`SiteCommon`]. Most of that travels as app
//! settings, so expansion folds it in and flattening unpacks it again.

use super::site::{ExpandContext, SiteCommon, SiteFlavor, SiteRead};
use crate::api::sites::SiteConfig;
use crate::helpers::function_app::{
    linux_function_schema, unpack_app_settings, user_app_settings, windows_function_schema,
    FunctionRuntime, FunctionStorage, LinuxFunctionSiteConfig, UnpackedAppSettings,
    WindowsFunctionSiteConfig, CONTENT_CONNECTION_STRING, CONTENT_SHARE,
};
use crate::helpers::service_plan::{is_consumption, is_elastic};
use crate::helpers::ExpandError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tfplug::defaults::StaticDefault;
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, NestedBlock};

const DEFAULT_EXTENSION_VERSION: &str = "~4";

pub trait FunctionConfig:
    Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const LABEL: &'static str;
    const WINDOWS: bool;
    const APP_TYPE_NAME: &'static str;
    const SLOT_TYPE_NAME: &'static str;

    fn schema() -> NestedBlock;
    fn expand(
        &self,
        existing: Option<&SiteConfig>,
        runtime: &FunctionRuntime,
        user_settings: &HashMap<String, String>,
    ) -> Result<SiteConfig, ExpandError>;
    fn flatten(config: &SiteConfig) -> Self;
    fn apply_unpacked(&mut self, unpacked: &UnpackedAppSettings);
    fn preserve_secrets(&mut self, _prior: &Self) {}
}

impl FunctionConfig for LinuxFunctionSiteConfig {
    const LABEL: &'static str = "Linux Function App";
    const WINDOWS: bool = false;
    const APP_TYPE_NAME: &'static str = "azurerm_linux_function_app";
    const SLOT_TYPE_NAME: &'static str = "azurerm_linux_function_app_slot";

    fn schema() -> NestedBlock {
        linux_function_schema()
    }

    fn expand(
        &self,
        existing: Option<&SiteConfig>,
        runtime: &FunctionRuntime,
        user_settings: &HashMap<String, String>,
    ) -> Result<SiteConfig, ExpandError> {
        LinuxFunctionSiteConfig::expand(self, existing, runtime, user_settings)
    }

    fn flatten(config: &SiteConfig) -> Self {
        LinuxFunctionSiteConfig::flatten(config)
    }

    fn apply_unpacked(&mut self, unpacked: &UnpackedAppSettings) {
        LinuxFunctionSiteConfig::apply_unpacked(self, unpacked)
    }

    fn preserve_secrets(&mut self, prior: &Self) {
        LinuxFunctionSiteConfig::preserve_secrets(self, prior)
    }
}

impl FunctionConfig for WindowsFunctionSiteConfig {
    const LABEL: &'static str = "Windows Function App";
    const WINDOWS: bool = true;
    const APP_TYPE_NAME: &'static str = "azurerm_windows_function_app";
    const SLOT_TYPE_NAME: &'static str = "azurerm_windows_function_app_slot";

    fn schema() -> NestedBlock {
        windows_function_schema()
    }

    fn expand(
        &self,
        existing: Option<&SiteConfig>,
        runtime: &FunctionRuntime,
        user_settings: &HashMap<String, String>,
    ) -> Result<SiteConfig, ExpandError> {
        WindowsFunctionSiteConfig::expand(self, existing, runtime, user_settings)
    }

    fn flatten(config: &SiteConfig) -> Self {
        WindowsFunctionSiteConfig::flatten(config)
    }

    fn apply_unpacked(&mut self, unpacked: &UnpackedAppSettings) {
        WindowsFunctionSiteConfig::apply_unpacked(self, unpacked)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionAppModel<C> {
    #[serde(flatten)]
    pub common: SiteCommon,
    pub site_config: Vec<C>,
    #[serde(flatten)]
    pub storage: FunctionStorage,
    pub functions_extension_version: String,
    pub builtin_logging_enabled: bool,
    pub content_share_force_disabled: bool,
    pub daily_memory_time_quota: i64,
}

impl<C> Default for FunctionAppModel<C> {
    fn default() -> Self {
        Self {
            common: SiteCommon::default(),
            site_config: Vec::new(),
            storage: FunctionStorage::default(),
            functions_extension_version: DEFAULT_EXTENSION_VERSION.to_string(),
            builtin_logging_enabled: true,
            content_share_force_disabled: false,
            daily_memory_time_quota: 0,
        }
    }
}

pub type LinuxFunctionApp = FunctionAppModel<LinuxFunctionSiteConfig>;
pub type WindowsFunctionApp = FunctionAppModel<WindowsFunctionSiteConfig>;

impl<C: FunctionConfig> FunctionAppModel<C> {
    fn config(&self) -> C {
        self.site_config.first().cloned().unwrap_or_default()
    }

    /// The user's app settings plus the storage, logging and content share
    /// values the host needs
    fn app_settings(&self, ctx: &ExpandContext<'_>, storage_string: &str) -> Result<HashMap<String, String>, ExpandError> {
        let send_content_settings = (is_elastic(ctx.plan_sku) || is_consumption(ctx.plan_sku))
            && !self.content_share_force_disabled;

        let mut user = self.common.app_settings.clone();
        // a generated share name must survive updates
        if send_content_settings {
            for key in [CONTENT_SHARE, CONTENT_CONNECTION_STRING] {
                if let Some(value) = ctx.current_app_settings.get(key) {
                    user.entry(key.to_string()).or_insert_with(|| value.clone());
                }
            }
        }

        user_app_settings(
            &user,
            &self.storage,
            storage_string,
            self.builtin_logging_enabled,
            send_content_settings,
            ctx.site_name,
        )
    }
}

impl<C: FunctionConfig> SiteFlavor for FunctionAppModel<C> {
    const LABEL: &'static str = C::LABEL;
    const FUNCTION_APP: bool = true;
    const WINDOWS: bool = C::WINDOWS;
    const APP_TYPE_NAME: &'static str = C::APP_TYPE_NAME;
    const SLOT_TYPE_NAME: &'static str = C::SLOT_TYPE_NAME;

    fn common(&self) -> &SiteCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut SiteCommon {
        &mut self.common
    }

    fn extra_attributes() -> Vec<Attribute> {
        let mut attributes = FunctionStorage::schema_attributes();
        attributes.extend([
            AttributeBuilder::new("functions_extension_version", AttributeType::String)
                .description("The runtime version of the Functions host")
                .optional()
                .default(StaticDefault::string(DEFAULT_EXTENSION_VERSION))
                .build(),
            AttributeBuilder::new("builtin_logging_enabled", AttributeType::Bool)
                .description("Send host logs to the backend storage account")
                .optional()
                .default(StaticDefault::bool(true))
                .build(),
            AttributeBuilder::new("content_share_force_disabled", AttributeType::Bool)
                .description("Do not configure a content share on Elastic and Consumption plans")
                .optional()
                .default(StaticDefault::bool(false))
                .build(),
            AttributeBuilder::new("daily_memory_time_quota", AttributeType::Number)
                .description("GB-seconds per day the app may use on a Consumption plan, 0 for no limit")
                .optional()
                .default(StaticDefault::number(0.0))
                .build(),
        ]);
        attributes
    }

    fn site_config_schema() -> NestedBlock {
        C::schema()
    }

    fn validate(&self) -> Result<(), ExpandError> {
        self.storage.validate()
    }

    fn expand_site_config(&self, ctx: &ExpandContext<'_>) -> Result<SiteConfig, ExpandError> {
        let storage_string = self
            .storage
            .connection_string(ctx.environment.storage_endpoint_suffix());
        let settings = self.app_settings(ctx, &storage_string)?;
        let runtime = FunctionRuntime {
            extension_version: self.functions_extension_version.clone(),
            storage_string,
            storage_uses_managed_identity: self.storage.storage_uses_managed_identity,
        };
        self.config().expand(ctx.existing, &runtime, &settings)
    }

    fn daily_memory_time_quota(&self) -> Option<i64> {
        Some(self.daily_memory_time_quota)
    }

    fn flatten(mut common: SiteCommon, read: &SiteRead, prior: &Self) -> Self {
        let unpacked = unpack_app_settings(read.app_settings.clone(), &prior.common.app_settings);

        let mut config = C::flatten(&read.config);
        config.apply_unpacked(&unpacked);
        if let Some(prior) = prior.site_config.first() {
            config.preserve_secrets(prior);
        }

        let mut storage = unpacked.storage.clone();
        if storage.storage_account_access_key.is_empty() {
            storage.storage_account_access_key = prior.storage.storage_account_access_key.clone();
        }
        common.app_settings = unpacked.app_settings.clone();

        Self {
            common,
            site_config: vec![config],
            storage,
            functions_extension_version: unpacked.extension_version,
            builtin_logging_enabled: unpacked.builtin_logging,
            content_share_force_disabled: prior.content_share_force_disabled,
            daily_memory_time_quota: read
                .site
                .properties
                .as_ref()
                .and_then(|p| p.daily_memory_time_quota)
                .unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::sites::{Site, SiteProperties};
    use crate::config::CloudEnvironment;

    fn app() -> LinuxFunctionApp {
        LinuxFunctionApp {
            common: SiteCommon {
                name: "func".to_string(),
                ..Default::default()
            },
            site_config: vec![LinuxFunctionSiteConfig::default()],
            storage: FunctionStorage {
                storage_account_name: "sa".to_string(),
                storage_account_access_key: "key".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn expand(app: &LinuxFunctionApp, sku: &str, current: &HashMap<String, String>) -> HashMap<String, String> {
        let config = app
            .expand_site_config(&ExpandContext {
                site_name: "func",
                plan_sku: sku,
                environment: CloudEnvironment::Public,
                existing: None,
                current_app_settings: current,
            })
            .unwrap();
        config
            .app_settings
            .unwrap_or_default()
            .into_iter()
            .map(|p| (p.name, p.value))
            .collect()
    }

    #[test]
    fn consumption_plans_get_a_content_share() {
        let settings = expand(&app(), "Y1", &HashMap::new());

        assert_eq!(settings["FUNCTIONS_EXTENSION_VERSION"], "~4");
        assert_eq!(
            settings["AzureWebJobsStorage"],
            "DefaultEndpointsProtocol=https;AccountName=sa;AccountKey=key;EndpointSuffix=core.windows.net"
        );
        assert!(settings[CONTENT_SHARE].starts_with("func-"));
        assert!(settings.contains_key(CONTENT_CONNECTION_STRING));
        assert!(settings.contains_key("AzureWebJobsDashboard"));
    }

    #[test]
    fn existing_content_share_is_kept() {
        let current = HashMap::from([(CONTENT_SHARE.to_string(), "func-abcd".to_string())]);
        let settings = expand(&app(), "EP1", &current);
        assert_eq!(settings[CONTENT_SHARE], "func-abcd");
    }

    #[test]
    fn content_share_can_be_disabled() {
        let mut app = app();
        app.content_share_force_disabled = true;
        app.builtin_logging_enabled = false;

        let settings = expand(&app, "Y1", &HashMap::new());
        assert!(!settings.contains_key(CONTENT_SHARE));
        assert!(!settings.contains_key("AzureWebJobsDashboard"));

        let dedicated = expand(&self::app(), "P1v3", &HashMap::new());
        assert!(!dedicated.contains_key(CONTENT_SHARE));
    }

    #[test]
    fn storage_settings_are_validated() {
        let mut app = app();
        app.storage.storage_uses_managed_identity = true;
        assert!(app.validate().is_err());

        app.storage.storage_account_access_key.clear();
        assert!(app.validate().is_ok());
    }

    #[test]
    fn flatten_unpacks_host_settings() {
        let prior = LinuxFunctionApp {
            common: SiteCommon {
                app_settings: HashMap::from([("FOO".to_string(), "old".to_string())]),
                ..Default::default()
            },
            content_share_force_disabled: true,
            ..app()
        };
        let read = SiteRead {
            site: Site {
                properties: Some(SiteProperties {
                    daily_memory_time_quota: Some(100),
                    ..Default::default()
                }),
                ..Default::default()
            },
            config: SiteConfig::default(),
            app_settings: HashMap::from([
                ("FOO".to_string(), "bar".to_string()),
                ("FUNCTIONS_EXTENSION_VERSION".to_string(), "~3".to_string()),
                (
                    "AzureWebJobsStorage".to_string(),
                    "DefaultEndpointsProtocol=https;AccountName=other;AccountKey=k2".to_string(),
                ),
                (CONTENT_SHARE.to_string(), "func-1234".to_string()),
            ]),
            metadata: HashMap::new(),
        };

        let flattened = LinuxFunctionApp::flatten(SiteCommon::default(), &read, &prior);

        assert_eq!(flattened.functions_extension_version, "~3");
        assert_eq!(flattened.storage.storage_account_name, "other");
        assert_eq!(flattened.storage.storage_account_access_key, "k2");
        assert!(!flattened.builtin_logging_enabled);
        assert!(flattened.content_share_force_disabled);
        assert_eq!(flattened.daily_memory_time_quota, 100);
        assert_eq!(
            flattened.common.app_settings,
            HashMap::from([("FOO".to_string(), "bar".to_string())])
        );
    }
}
