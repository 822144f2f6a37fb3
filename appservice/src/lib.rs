//! Azure App Service resources for Terraform
//!
//! [`AppServiceProvider`] registers the Linux and Windows Web Apps and
//! Function Apps (with their slots), the active slot swap resources and
//! Static Web Apps. Handlers talk to Azure Resource Manager through
//! [`api::Client`].

pub mod api;
pub mod config;
pub mod data_sources;
pub mod helpers;
pub mod ids;
pub mod locks;
pub mod provider_data;
pub mod resources;

use async_trait::async_trait;
use config::ProviderConfig;
use provider_data::AppServiceProviderData;
use resources::{
    ActiveSlotResource, LinuxFunctionApp, LinuxWebApp, SiteResource, StaticWebAppResource,
    WindowsFunctionApp, WindowsWebApp,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetadataRequest, ProviderMetadataResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory, ValidateProviderConfigRequest,
    ValidateProviderConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic};
use tfplug::validator::validate_config;
use tfplug::{DataSourceWithConfigure, ResourceWithConfigure};

const TYPE_NAME: &str = "azurerm";

pub struct AppServiceProvider {
    provider_data: Option<Arc<AppServiceProviderData>>,
}

impl Default for AppServiceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AppServiceProvider {
    pub fn new() -> Self {
        Self {
            provider_data: None,
        }
    }

    /// Set once `configure` succeeds
    pub fn provider_data(&self) -> Option<&Arc<AppServiceProviderData>> {
        self.provider_data.as_ref()
    }

    fn build_schema() -> Schema {
        let optional = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .optional()
                .description(description)
                .build()
        };
        let secret = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .optional()
                .sensitive()
                .description(description)
                .build()
        };

        SchemaBuilder::new()
            .version(0)
            .attribute(optional(
                "subscription_id",
                "Subscription ID. Falls back to ARM_SUBSCRIPTION_ID",
            ))
            .attribute(optional("tenant_id", "Tenant ID. Falls back to ARM_TENANT_ID"))
            .attribute(optional("client_id", "Client ID. Falls back to ARM_CLIENT_ID"))
            .attribute(secret(
                "client_secret",
                "Client secret. Falls back to ARM_CLIENT_SECRET",
            ))
            .attribute(secret(
                "access_token",
                "Pre-acquired bearer token, used instead of the client credentials",
            ))
            .attribute(optional(
                "environment",
                "public, usgovernment or china. Falls back to ARM_ENVIRONMENT",
            ))
            .attribute(optional(
                "resource_manager_endpoint",
                "Overrides the environment's Resource Manager endpoint",
            ))
            .build()
    }
}

fn resource<R>(make: fn() -> R) -> ResourceFactory
where
    R: ResourceWithConfigure + 'static,
{
    Box::new(move || Box::new(make()) as Box<dyn ResourceWithConfigure>)
}

fn data_source<D>(make: fn() -> D) -> DataSourceFactory
where
    D: DataSourceWithConfigure + 'static,
{
    Box::new(move || Box::new(make()) as Box<dyn DataSourceWithConfigure>)
}

#[async_trait]
impl Provider for AppServiceProvider {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: TYPE_NAME.to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: Self::build_schema(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        let mut diagnostics = validate_config(&Self::build_schema().block, &request.config);

        if let Ok(Some(environment)) = request
            .config
            .get_optional_string(&AttributePath::new("environment"))
        {
            if let Err(e) = config::CloudEnvironment::parse(&environment) {
                diagnostics.push(Diagnostic::error("Invalid environment", e));
            }
        }

        ValidateProviderConfigResponse { diagnostics }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let resolved = match ProviderConfig::from_config(&request.config) {
            Ok(resolved) => resolved,
            Err(errors) => {
                return ConfigureProviderResponse {
                    diagnostics: errors
                        .into_iter()
                        .map(|e| Diagnostic::error(e, "Invalid provider configuration"))
                        .collect(),
                    provider_data: None,
                };
            }
        };

        let client = match api::Client::new(&resolved.resource_manager_endpoint, resolved.credential)
        {
            Ok(client) => client,
            Err(e) => {
                return ConfigureProviderResponse {
                    diagnostics: vec![Diagnostic::error(
                        "Failed to create API client",
                        e.to_string(),
                    )],
                    provider_data: None,
                };
            }
        };

        tracing::info!(
            "Configured provider for subscription {} ({})",
            resolved.subscription_id,
            resolved.resource_manager_endpoint
        );

        let data = Arc::new(
            AppServiceProviderData::new(client, resolved.subscription_id)
                .with_environment(resolved.environment),
        );
        self.provider_data = Some(data.clone());

        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(data as Arc<dyn Any + Send + Sync>),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let factories = [
            ("azurerm_linux_web_app", resource(SiteResource::<LinuxWebApp>::app)),
            ("azurerm_linux_web_app_slot", resource(SiteResource::<LinuxWebApp>::slot)),
            ("azurerm_windows_web_app", resource(SiteResource::<WindowsWebApp>::app)),
            ("azurerm_windows_web_app_slot", resource(SiteResource::<WindowsWebApp>::slot)),
            ("azurerm_linux_function_app", resource(SiteResource::<LinuxFunctionApp>::app)),
            (
                "azurerm_linux_function_app_slot",
                resource(SiteResource::<LinuxFunctionApp>::slot),
            ),
            (
                "azurerm_windows_function_app",
                resource(SiteResource::<WindowsFunctionApp>::app),
            ),
            (
                "azurerm_windows_function_app_slot",
                resource(SiteResource::<WindowsFunctionApp>::slot),
            ),
            ("azurerm_web_app_active_slot", resource(ActiveSlotResource::web_app)),
            (
                "azurerm_function_app_active_slot",
                resource(ActiveSlotResource::function_app),
            ),
            ("azurerm_static_web_app", resource(StaticWebAppResource::new)),
        ];

        factories
            .into_iter()
            .map(|(name, factory)| (name.to_string(), factory))
            .collect()
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories = HashMap::new();
        factories.insert(
            "azurerm_static_web_app".to_string(),
            data_source(data_sources::StaticWebAppDataSource::new),
        );
        factories
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tfplug::types::DynamicValue;
    use tfplug::{DataSource, Resource};

    const VARS: &[&str] = &[
        "ARM_SUBSCRIPTION_ID",
        "ARM_TENANT_ID",
        "ARM_CLIENT_ID",
        "ARM_CLIENT_SECRET",
        "ARM_ACCESS_TOKEN",
        "ARM_ENVIRONMENT",
        "ARM_RESOURCE_MANAGER_ENDPOINT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    async fn configure(provider: &mut AppServiceProvider) -> ConfigureProviderResponse {
        provider
            .configure(
                Context::new(),
                ConfigureProviderRequest {
                    config: DynamicValue::object(),
                },
            )
            .await
    }

    #[tokio::test]
    #[serial]
    async fn provider_configures_successfully_with_env_vars() {
        clear_env();
        std::env::set_var("ARM_SUBSCRIPTION_ID", "sub-1");
        std::env::set_var("ARM_ACCESS_TOKEN", "token");
        std::env::set_var("ARM_ENVIRONMENT", "china");

        let mut provider = AppServiceProvider::new();
        let response = configure(&mut provider).await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let data = response
            .provider_data
            .unwrap()
            .downcast::<AppServiceProviderData>()
            .unwrap();
        assert_eq!(data.subscription_id, "sub-1");
        assert_eq!(data.environment, config::CloudEnvironment::China);
        assert!(provider.provider_data().is_some());

        clear_env();
    }

    #[tokio::test]
    #[serial]
    async fn provider_configure_requires_subscription_and_credentials() {
        clear_env();

        let mut provider = AppServiceProvider::new();
        let response = configure(&mut provider).await;

        assert!(response.provider_data.is_none());
        let summaries: Vec<_> = response
            .diagnostics
            .iter()
            .map(|d| d.summary.as_str())
            .collect();
        assert!(summaries
            .iter()
            .any(|s| s.contains("subscription_id is required")));
        assert!(summaries.iter().any(|s| s.contains("tenant_id is required")));
        assert!(summaries
            .iter()
            .any(|s| s.contains("client_secret is required")));
    }

    #[tokio::test]
    #[serial]
    async fn provider_configure_rejects_bad_endpoint() {
        clear_env();
        std::env::set_var("ARM_SUBSCRIPTION_ID", "sub-1");
        std::env::set_var("ARM_ACCESS_TOKEN", "token");
        std::env::set_var("ARM_RESOURCE_MANAGER_ENDPOINT", "not a url");

        let mut provider = AppServiceProvider::new();
        let response = configure(&mut provider).await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Failed to create API client");

        clear_env();
    }

    #[tokio::test]
    async fn validate_rejects_unknown_environment() {
        let provider = AppServiceProvider::new();
        let mut config = DynamicValue::object();
        config
            .set_string(&AttributePath::new("environment"), "mars".to_string())
            .unwrap();

        let response = provider
            .validate(Context::new(), ValidateProviderConfigRequest { config })
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Invalid environment");
    }

    #[test]
    fn factories_build_handlers_named_after_their_key() {
        let provider = AppServiceProvider::new();

        let resources = provider.resources();
        assert_eq!(resources.len(), 11);
        for (name, factory) in &resources {
            assert_eq!(factory().type_name(), name.as_str());
        }

        let data_sources = provider.data_sources();
        assert_eq!(data_sources.len(), 1);
        assert_eq!(
            data_sources["azurerm_static_web_app"]().type_name(),
            "azurerm_static_web_app"
        );
    }

    #[test]
    fn provider_schema_marks_secrets_sensitive() {
        let provider = AppServiceProvider::new();
        let schema =
            tokio_test::block_on(provider.schema(Context::new(), ProviderSchemaRequest)).schema;

        assert!(schema.block.attribute("client_secret").unwrap().sensitive);
        assert!(schema.block.attribute("access_token").unwrap().sensitive);
        assert!(!schema.block.attribute("subscription_id").unwrap().sensitive);
    }
}
