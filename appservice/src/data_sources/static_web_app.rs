use crate::helpers::identity;
use crate::helpers::static_web_app::StaticWebAppModel;
use crate::ids::StaticSiteId;
use crate::provider_data::AppServiceProviderData;
use crate::resources::{
    extract_provider_data, not_configured, read_static_web_app, state_from_model, within, TIMEOUTS,
};
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource,
    DataSourceMetadataRequest, DataSourceMetadataResponse, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic};
use tfplug::validator::validate_config;

const TYPE_NAME: &str = "azurerm_static_web_app";

fn computed(name: &str, attr_type: AttributeType) -> Attribute {
    AttributeBuilder::new(name, attr_type).computed().build()
}

fn string_map() -> AttributeType {
    AttributeType::Map(Box::new(AttributeType::String))
}

fn build_schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Reads an existing Static Web App")
        .attribute(computed("id", AttributeType::String))
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("resource_group_name", AttributeType::String)
                .required()
                .build(),
        )
        .attribute(computed("location", AttributeType::String))
        .attribute(computed("sku_tier", AttributeType::String))
        .attribute(computed("sku_size", AttributeType::String))
        .attribute(computed("configuration_file_changes_enabled", AttributeType::Bool))
        .attribute(computed("preview_environments_enabled", AttributeType::Bool))
        .attribute(computed("public_network_access_enabled", AttributeType::Bool))
        .attribute(computed("app_settings", string_map()))
        .attribute(computed("tags", string_map()))
        .attribute(
            AttributeBuilder::new("api_key", AttributeType::String)
                .computed()
                .sensitive()
                .build(),
        )
        .attribute(computed("default_host_name", AttributeType::String))
        .block(identity::schema())
        .build()
}

/// `azurerm_static_web_app` looked up by name and resource group
pub struct StaticWebAppDataSource {
    provider_data: Option<AppServiceProviderData>,
}

impl StaticWebAppDataSource {
    pub fn new() -> Self {
        Self {
            provider_data: None,
        }
    }

    async fn read_state(
        &self,
        data: &AppServiceProviderData,
        ctx: &Context,
        request: &ReadDataSourceRequest,
    ) -> Result<tfplug::types::DynamicValue, Diagnostic> {
        let config = &request.config;
        let name = config
            .get_string(&AttributePath::new("name"))
            .map_err(|e| Diagnostic::error("Invalid name", e.to_string()))?;
        let resource_group = config
            .get_string(&AttributePath::new("resource_group_name"))
            .map_err(|e| Diagnostic::error("Invalid resource_group_name", e.to_string()))?;

        let id = StaticSiteId::new(&data.subscription_id, &resource_group, &name);
        let prior = StaticWebAppModel::default();
        let read = read_static_web_app(data, &id, &prior);
        let model = within(ctx, "reading", "Static Web App", &id, read)
            .await?
            .ok_or_else(|| {
                Diagnostic::error(
                    "Static Web App not found",
                    format!("Static Web App {:?} (Resource Group {:?}) was not found", name, resource_group),
                )
            })?;

        state_from_model(&model, &build_schema())
            .map_err(|e| Diagnostic::error("Failed to encode state", e.to_string()))
    }
}

impl Default for StaticWebAppDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for StaticWebAppDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: TYPE_NAME.to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: build_schema(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: validate_config(&build_schema().block, &request.config),
        }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(data) = &self.provider_data else {
            return ReadDataSourceResponse {
                state: request.config,
                diagnostics: vec![not_configured()],
            };
        };

        let ctx = TIMEOUTS.read_context(&ctx);
        match self.read_state(data, &ctx, &request).await {
            Ok(state) => ReadDataSourceResponse {
                state,
                diagnostics: vec![],
            },
            Err(diag) => ReadDataSourceResponse {
                state: request.config,
                diagnostics: vec![diag],
            },
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for StaticWebAppDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = vec![];
        match extract_provider_data(request.provider_data) {
            Ok(data) => self.provider_data = Some(data),
            Err(diag) => diagnostics.push(diag),
        }
        ConfigureDataSourceResponse { diagnostics }
    }
}
