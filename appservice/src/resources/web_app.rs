//! Linux and Windows Web Apps
//!
//! Both share [`SiteCommon`]; they differ only in the `site_config` block,
//! so one generic model covers them.

use super::site::{ExpandContext, SiteCommon, SiteFlavor, SiteRead};
use crate::api::sites::SiteConfig;
use crate::helpers::app_settings::filter_managed;
use crate::helpers::service_plan::is_free_or_shared;
use crate::helpers::site_config::{
    linux_web_schema, windows_web_schema, LinuxWebSiteConfig, SiteConfigCommon,
    WindowsWebSiteConfig, CURRENT_STACK,
};
use crate::helpers::ExpandError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tfplug::schema::NestedBlock;

/// The `site_config` variants a Web App can carry
pub trait WebConfig:
    Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const LABEL: &'static str;
    const WINDOWS: bool;
    const APP_TYPE_NAME: &'static str;
    const SLOT_TYPE_NAME: &'static str;

    fn schema() -> NestedBlock;
    fn common(&self) -> &SiteConfigCommon;
    fn expand(
        &self,
        existing: Option<&SiteConfig>,
        app_settings: &HashMap<String, String>,
    ) -> Result<SiteConfig, ExpandError>;
    fn current_stack(&self) -> Option<&str> {
        None
    }
    /// Returns the block and the settings left for `app_settings`
    fn flatten(read: &SiteRead, prior: Option<&Self>) -> (Self, HashMap<String, String>);
}

impl WebConfig for LinuxWebSiteConfig {
    const LABEL: &'static str = "Linux Web App";
    const WINDOWS: bool = false;
    const APP_TYPE_NAME: &'static str = "azurerm_linux_web_app";
    const SLOT_TYPE_NAME: &'static str = "azurerm_linux_web_app_slot";

    fn schema() -> NestedBlock {
        linux_web_schema()
    }

    fn common(&self) -> &SiteConfigCommon {
        &self.common
    }

    fn expand(
        &self,
        existing: Option<&SiteConfig>,
        app_settings: &HashMap<String, String>,
    ) -> Result<SiteConfig, ExpandError> {
        match existing {
            Some(existing) => self.expand_for_update(existing, app_settings),
            None => self.expand_for_create(app_settings),
        }
    }

    fn flatten(read: &SiteRead, prior: Option<&Self>) -> (Self, HashMap<String, String>) {
        let mut config = LinuxWebSiteConfig::flatten(&read.config, &read.app_settings);
        if let Some(prior) = prior {
            config.preserve_secrets(prior);
        }
        (config, filter_managed(read.app_settings.clone()))
    }
}

impl WebConfig for WindowsWebSiteConfig {
    const LABEL: &'static str = "Windows Web App";
    const WINDOWS: bool = true;
    const APP_TYPE_NAME: &'static str = "azurerm_windows_web_app";
    const SLOT_TYPE_NAME: &'static str = "azurerm_windows_web_app_slot";

    fn schema() -> NestedBlock {
        windows_web_schema()
    }

    fn common(&self) -> &SiteConfigCommon {
        &self.common
    }

    fn expand(
        &self,
        existing: Option<&SiteConfig>,
        app_settings: &HashMap<String, String>,
    ) -> Result<SiteConfig, ExpandError> {
        match existing {
            Some(existing) => self.expand_for_update(existing, app_settings),
            None => self.expand_for_create(app_settings),
        }
    }

    fn current_stack(&self) -> Option<&str> {
        WindowsWebSiteConfig::current_stack(self)
    }

    fn flatten(read: &SiteRead, prior: Option<&Self>) -> (Self, HashMap<String, String>) {
        let mut settings = read.app_settings.clone();
        let stack = read
            .metadata
            .get(CURRENT_STACK)
            .map(String::as_str)
            .unwrap_or_default();
        let mut config = WindowsWebSiteConfig::flatten(&read.config, stack, &mut settings);
        if let Some(prior) = prior {
            config.preserve_secrets(prior);
        }
        (config, filter_managed(settings))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebAppModel<C> {
    #[serde(flatten)]
    pub common: SiteCommon,
    pub site_config: Vec<C>,
}

pub type LinuxWebApp = WebAppModel<LinuxWebSiteConfig>;
pub type WindowsWebApp = WebAppModel<WindowsWebSiteConfig>;

impl<C: WebConfig> WebAppModel<C> {
    fn config(&self) -> C {
        self.site_config.first().cloned().unwrap_or_default()
    }
}

impl<C: WebConfig> SiteFlavor for WebAppModel<C> {
    const LABEL: &'static str = C::LABEL;
    const FUNCTION_APP: bool = false;
    const WINDOWS: bool = C::WINDOWS;
    const APP_TYPE_NAME: &'static str = C::APP_TYPE_NAME;
    const SLOT_TYPE_NAME: &'static str = C::SLOT_TYPE_NAME;

    fn common(&self) -> &SiteCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut SiteCommon {
        &mut self.common
    }

    fn site_config_schema() -> NestedBlock {
        C::schema()
    }

    fn validate_plan(&self, sku: &str) -> Result<(), ExpandError> {
        if is_free_or_shared(sku) && self.config().common().always_on {
            return Err(ExpandError::new(
                "always_on cannot be set to true when using Free, F1, D1 Sku",
            ));
        }
        Ok(())
    }

    fn expand_site_config(&self, ctx: &ExpandContext<'_>) -> Result<SiteConfig, ExpandError> {
        self.config().expand(ctx.existing, &self.common.app_settings)
    }

    fn current_stack(&self) -> Option<&str> {
        self.site_config.first().and_then(|c| c.current_stack())
    }

    fn flatten(mut common: SiteCommon, read: &SiteRead, prior: &Self) -> Self {
        let (config, app_settings) = C::flatten(read, prior.site_config.first());
        common.app_settings = app_settings;
        Self {
            common,
            site_config: vec![config],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::sites::{NameValuePair, Site};

    fn read(config: SiteConfig, settings: &[(&str, &str)], stack: Option<&str>) -> SiteRead {
        SiteRead {
            site: Site::default(),
            config,
            app_settings: settings
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            metadata: stack
                .map(|s| HashMap::from([(CURRENT_STACK.to_string(), s.to_string())]))
                .unwrap_or_default(),
        }
    }

    #[test]
    fn always_on_needs_a_dedicated_plan() {
        let app = LinuxWebApp {
            site_config: vec![LinuxWebSiteConfig::default()],
            ..Default::default()
        };
        let err = app.validate_plan("F1").unwrap_err();
        assert_eq!(err.message, "always_on cannot be set to true when using Free, F1, D1 Sku");
        assert!(app.validate_plan("P1v3").is_ok());

        let mut off = app.clone();
        off.site_config[0].common.always_on = false;
        assert!(off.validate_plan("D1").is_ok());
    }

    #[test]
    fn create_expansion_embeds_app_settings() {
        let mut app = LinuxWebApp {
            site_config: vec![LinuxWebSiteConfig::default()],
            ..Default::default()
        };
        app.common
            .app_settings
            .insert("FOO".to_string(), "bar".to_string());

        let no_settings = HashMap::new();
        let config = app
            .expand_site_config(&ExpandContext {
                site_name: "web",
                plan_sku: "P1v3",
                environment: Default::default(),
                existing: None,
                current_app_settings: &no_settings,
            })
            .unwrap();

        assert_eq!(
            config.app_settings,
            Some(vec![NameValuePair {
                name: "FOO".to_string(),
                value: "bar".to_string(),
            }])
        );
    }

    #[test]
    fn flatten_drops_managed_settings() {
        let flattened = LinuxWebApp::flatten(
            SiteCommon::default(),
            &read(
                SiteConfig::default(),
                &[("FOO", "bar"), ("DOCKER_REGISTRY_SERVER_URL", "https://r")],
                None,
            ),
            &LinuxWebApp::default(),
        );
        assert_eq!(flattened.common.app_settings.len(), 1);
        assert_eq!(flattened.common.app_settings["FOO"], "bar");
        assert_eq!(flattened.site_config.len(), 1);
    }

    #[test]
    fn windows_flatten_moves_node_version_into_stack() {
        let flattened = WindowsWebApp::flatten(
            SiteCommon::default(),
            &read(
                SiteConfig::default(),
                &[("WEBSITE_NODE_DEFAULT_VERSION", "~18"), ("FOO", "bar")],
                Some("node"),
            ),
            &WindowsWebApp::default(),
        );
        assert!(!flattened.common.app_settings.contains_key("WEBSITE_NODE_DEFAULT_VERSION"));
        let stack = &flattened.site_config[0].application_stack[0];
        assert_eq!(stack.node_version, "~18");
        assert_eq!(stack.current_stack, "node");
        assert_eq!(flattened.current_stack(), Some("node"));
    }

    #[test]
    fn linux_apps_have_no_current_stack() {
        assert_eq!(LinuxWebApp::default().current_stack(), None);
        assert!(!<LinuxWebApp as SiteFlavor>::WINDOWS);
        assert_eq!(<WindowsWebApp as SiteFlavor>::SLOT_TYPE_NAME, "azurerm_windows_web_app_slot");
    }
}
