use super::{
    extract_provider_data, not_configured, operation_error, requires_import, state_from_model,
    within, TIMEOUTS,
};
use crate::api::common::StringDictionary;
use crate::api::{ApiError, Poller};
use crate::helpers::identity;
use crate::helpers::static_web_app::{
    StaticWebAppModel, BASIC_AUTH_ENVIRONMENTS, SKU_FREE, SKU_STANDARD,
};
use crate::helpers::ExpandError;
use crate::ids::StaticSiteId;
use crate::provider_data::AppServiceProviderData;
use async_trait::async_trait;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::import::import_state_passthrough_id;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{
    Attribute, AttributeBuilder, AttributeType, NestedBlockBuilder, Schema, SchemaBuilder,
};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{validate_config, StringNotEmpty, StringOneOf};

const TYPE_NAME: &str = "azurerm_static_web_app";
const LABEL: &str = "Static Web App";
const SKUS: &[&str] = &[SKU_FREE, SKU_STANDARD];
const API_KEY: &str = "apiKey";

fn sku_attribute(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .optional()
        .default(StaticDefault::string(SKU_FREE))
        .validator(StringOneOf::create(SKUS))
        .build()
}

fn optional_bool(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Bool)
        .description(description)
        .optional()
        .default(StaticDefault::bool(true))
        .build()
}

fn build_schema() -> Schema {
    SchemaBuilder::new()
        .version(0)
        .description("Manages a Static Web App")
        .attribute(
            AttributeBuilder::new("id", AttributeType::String)
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .required()
                .requires_replace()
                .validator(StringNotEmpty::create())
                .build(),
        )
        .attribute(
            AttributeBuilder::new("resource_group_name", AttributeType::String)
                .required()
                .requires_replace()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("location", AttributeType::String)
                .required()
                .requires_replace()
                .build(),
        )
        .attribute(sku_attribute("sku_tier"))
        .attribute(sku_attribute("sku_size"))
        .attribute(optional_bool(
            "configuration_file_changes_enabled",
            "Allow staticwebapp.config.json to change the site configuration",
        ))
        .attribute(optional_bool(
            "preview_environments_enabled",
            "Create staging environments for pull requests",
        ))
        .attribute(optional_bool(
            "public_network_access_enabled",
            "Allow public network access",
        ))
        .attribute(
            AttributeBuilder::new("app_settings", AttributeType::Map(Box::new(AttributeType::String)))
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("tags", AttributeType::Map(Box::new(AttributeType::String)))
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("api_key", AttributeType::String)
                .description("Deployment token")
                .computed()
                .sensitive()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("default_host_name", AttributeType::String)
                .computed()
                .build(),
        )
        .block(
            NestedBlockBuilder::list("basic_auth")
                .max_items(1)
                .attribute(
                    AttributeBuilder::new("password", AttributeType::String)
                        .required()
                        .sensitive()
                        .validator(StringNotEmpty::create())
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("environments", AttributeType::String)
                        .required()
                        .validator(StringOneOf::create(BASIC_AUTH_ENVIRONMENTS))
                        .build(),
                )
                .build(),
        )
        .block(identity::schema())
        .build()
}

fn invalid(err: ExpandError) -> Diagnostic {
    Diagnostic::error("Invalid configuration", err.message)
}

/// GET the site and everything hung off it. `prior` supplies the basic auth
/// password, which the API never returns. `Ok(None)` when the site is gone.
pub(crate) async fn read_static_web_app(
    data: &AppServiceProviderData,
    id: &StaticSiteId,
    prior: &StaticWebAppModel,
) -> Result<Option<StaticWebAppModel>, Diagnostic> {
    let api = data.client.static_sites();

    let site = match api.get(id).await {
        Ok(site) => site,
        Err(e) if e.is_not_found() => {
            tracing::info!("{} {} not found, removing from state", LABEL, id);
            return Ok(None);
        }
        Err(e) => return Err(operation_error("reading", LABEL, id, &e)),
    };
    let reading = |what: &str, e: ApiError| {
        operation_error(&format!("reading {} for", what), LABEL, id, &e)
    };

    let secrets = api
        .list_secrets(id)
        .await
        .map_err(|e| reading("secrets", e))?;
    let settings = api
        .list_app_settings(id)
        .await
        .map_err(|e| reading("app settings", e))?;
    let basic_auth = match api.get_basic_auth(id).await {
        Ok(auth) => auth,
        Err(e) if e.is_not_found() => Default::default(),
        Err(e) => return Err(reading("basic auth", e)),
    };

    let mut model = StaticWebAppModel {
        id: id.to_string(),
        name: id.static_site_name.clone(),
        resource_group_name: id.resource_group.clone(),
        app_settings: settings.properties,
        api_key: secrets.properties.get(API_KEY).cloned().unwrap_or_default(),
        ..Default::default()
    };
    model.flatten(&site);
    model.flatten_basic_auth(&basic_auth, &prior.basic_auth);
    Ok(Some(model))
}

pub struct StaticWebAppResource {
    provider_data: Option<AppServiceProviderData>,
}

impl StaticWebAppResource {
    pub fn new() -> Self {
        Self {
            provider_data: None,
        }
    }

    async fn create_site(
        &self,
        data: &AppServiceProviderData,
        ctx: &Context,
        model: &StaticWebAppModel,
    ) -> Result<StaticSiteId, Diagnostic> {
        model.validate().map_err(invalid)?;

        let id = StaticSiteId::new(&data.subscription_id, &model.resource_group_name, &model.name);
        let api = data.client.static_sites();

        match api.get(&id).await {
            Ok(_) => return Err(requires_import(TYPE_NAME, &id)),
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                return Err(operation_error(
                    "checking for presence of existing",
                    LABEL,
                    &id,
                    &e,
                ))
            }
        }

        let envelope = model.expand().map_err(invalid)?;

        tracing::info!("Creating {} {}", LABEL, id);
        let response = api
            .create_or_update(&id, &envelope)
            .await
            .map_err(|e| operation_error("creating", LABEL, &id, &e))?;
        Poller::new(&data.client, &response)
            .poll_until_done(ctx)
            .await
            .map_err(|e| operation_error("creating", LABEL, &id, &e))?;

        if !model.app_settings.is_empty() {
            api.update_app_settings(&id, &StringDictionary::new(model.app_settings.clone()))
                .await
                .map_err(|e| operation_error("updating app settings for", LABEL, &id, &e))?;
        }
        if !model.basic_auth.is_empty() {
            api.update_basic_auth(&id, &model.expand_basic_auth())
                .await
                .map_err(|e| operation_error("updating basic auth for", LABEL, &id, &e))?;
        }

        Ok(id)
    }

    async fn update_site(
        &self,
        data: &AppServiceProviderData,
        ctx: &Context,
        model: &StaticWebAppModel,
        prior: &StaticWebAppModel,
    ) -> Result<StaticSiteId, Diagnostic> {
        let id = StaticSiteId::parse(&prior.id)
            .map_err(|e| Diagnostic::error("Invalid resource ID", e.to_string()))?;
        let api = data.client.static_sites();

        let mut envelope = model.expand().map_err(invalid)?;
        if envelope.identity.is_none() && !prior.identity.is_empty() {
            envelope.identity = Some(identity::none());
        }

        tracing::info!("Updating {} {}", LABEL, id);
        let response = api
            .create_or_update(&id, &envelope)
            .await
            .map_err(|e| operation_error("updating", LABEL, &id, &e))?;
        Poller::new(&data.client, &response)
            .poll_until_done(ctx)
            .await
            .map_err(|e| operation_error("updating", LABEL, &id, &e))?;

        if model.app_settings != prior.app_settings {
            api.update_app_settings(&id, &StringDictionary::new(model.app_settings.clone()))
                .await
                .map_err(|e| operation_error("updating app settings for", LABEL, &id, &e))?;
        }
        if model.basic_auth != prior.basic_auth {
            api.update_basic_auth(&id, &model.expand_basic_auth())
                .await
                .map_err(|e| operation_error("updating basic auth for", LABEL, &id, &e))?;
        }

        Ok(id)
    }

    async fn delete_site(
        &self,
        data: &AppServiceProviderData,
        ctx: &Context,
        id: &StaticSiteId,
    ) -> Result<(), Diagnostic> {
        tracing::info!("Deleting {} {}", LABEL, id);
        let response = match data.client.static_sites().delete(id).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} {} was already gone", LABEL, id);
                return Ok(());
            }
            Err(e) => return Err(operation_error("deleting", LABEL, id, &e)),
        };
        Poller::new(&data.client, &response)
            .poll_until_done(ctx)
            .await
            .map_err(|e| operation_error("deleting", LABEL, id, &e))
    }

    async fn refreshed_state(
        &self,
        data: &AppServiceProviderData,
        id: &StaticSiteId,
        planned: &StaticWebAppModel,
    ) -> Result<DynamicValue, Diagnostic> {
        match read_static_web_app(data, id, planned).await? {
            Some(model) => encode(&model),
            None => Err(Diagnostic::error(
                format!("{} not found", LABEL),
                format!("{} {} could not be read back", LABEL, id),
            )),
        }
    }
}

impl Default for StaticWebAppResource {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(model: &StaticWebAppModel) -> Result<DynamicValue, Diagnostic> {
    state_from_model(model, &build_schema())
        .map_err(|e| Diagnostic::error("Failed to encode state", e.to_string()))
}

#[async_trait]
impl Resource for StaticWebAppResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: TYPE_NAME.to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: build_schema(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = validate_config(&build_schema().block, &request.config);

        match request.config.decode_model::<StaticWebAppModel>() {
            Ok(mut model) => {
                // An unknown SKU would otherwise decode as the Free default.
                // Create checks the tier again once it is known.
                let unknown = |name: &str| {
                    matches!(
                        request.config.get(&AttributePath::new(name)),
                        Some(Dynamic::Unknown)
                    )
                };
                if unknown("sku_tier") {
                    model.sku_tier.clear();
                }
                if unknown("sku_size") {
                    model.sku_size.clear();
                }

                if let Err(e) = model.validate() {
                    diagnostics.push(invalid(e));
                }
                if let Err(e) = identity::expand(&model.identity) {
                    diagnostics.push(invalid(e).with_attribute(AttributePath::new("identity")));
                }
            }
            Err(e) => diagnostics.push(Diagnostic::error(
                "Failed to decode configuration",
                e.to_string(),
            )),
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];

        let Some(data) = &self.provider_data else {
            diagnostics.push(not_configured());
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        };

        let planned = match request.planned_state.decode_model::<StaticWebAppModel>() {
            Ok(model) => model,
            Err(e) => {
                diagnostics.push(Diagnostic::error("Failed to decode planned state", e.to_string()));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let ctx = TIMEOUTS.create_context(&ctx);
        let result = within(&ctx, "creating", LABEL, &planned.name, async {
            let id = self.create_site(data, &ctx, &planned).await?;
            self.refreshed_state(data, &id, &planned).await
        })
        .await;

        match result {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                diagnostics,
            },
            Err(diag) => {
                diagnostics.push(diag);
                CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                }
            }
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];

        let Some(data) = &self.provider_data else {
            diagnostics.push(not_configured());
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics,
            };
        };

        let prior = request
            .current_state
            .decode_model::<StaticWebAppModel>()
            .unwrap_or_default();
        let id = match StaticSiteId::parse(&prior.id) {
            Ok(id) => id,
            Err(e) => {
                diagnostics.push(Diagnostic::error("Invalid resource ID", e.to_string()));
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                };
            }
        };

        let ctx = TIMEOUTS.read_context(&ctx);
        let read = read_static_web_app(data, &id, &prior);
        let result = match within(&ctx, "reading", LABEL, &id, read).await {
            Ok(Some(model)) => encode(&model).map(Some),
            Ok(None) => Ok(None),
            Err(diag) => Err(diag),
        };

        match result {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics,
            },
            Err(diag) => {
                diagnostics.push(diag);
                ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                }
            }
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut diagnostics = vec![];

        let Some(data) = &self.provider_data else {
            diagnostics.push(not_configured());
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics,
            };
        };

        let models = request
            .planned_state
            .decode_model::<StaticWebAppModel>()
            .and_then(|planned| {
                Ok((
                    planned,
                    request.prior_state.decode_model::<StaticWebAppModel>()?,
                ))
            });
        let (planned, prior) = match models {
            Ok(models) => models,
            Err(e) => {
                diagnostics.push(Diagnostic::error("Failed to decode state", e.to_string()));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        let ctx = TIMEOUTS.update_context(&ctx);
        let result = within(&ctx, "updating", LABEL, &prior.id, async {
            let id = self.update_site(data, &ctx, &planned, &prior).await?;
            self.refreshed_state(data, &id, &planned).await
        })
        .await;

        match result {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                diagnostics,
            },
            Err(diag) => {
                diagnostics.push(diag);
                UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                }
            }
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let Some(data) = &self.provider_data else {
            diagnostics.push(not_configured());
            return DeleteResourceResponse { diagnostics };
        };

        let prior = request
            .prior_state
            .decode_model::<StaticWebAppModel>()
            .unwrap_or_default();
        match StaticSiteId::parse(&prior.id) {
            Ok(id) => {
                let ctx = TIMEOUTS.delete_context(&ctx);
                if let Err(diag) =
                    within(&ctx, "deleting", LABEL, &id, self.delete_site(data, &ctx, &id)).await
                {
                    diagnostics.push(diag);
                }
            }
            Err(e) => diagnostics.push(Diagnostic::error("Invalid resource ID", e.to_string())),
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for StaticWebAppResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];
        match extract_provider_data(request.provider_data) {
            Ok(data) => self.provider_data = Some(data),
            Err(diag) => diagnostics.push(diag),
        }
        ConfigureResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithImportState for StaticWebAppResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();
        if let Err(e) = StaticSiteId::parse(&request.id) {
            response
                .diagnostics
                .push(Diagnostic::error("Invalid import ID", e.to_string()));
            return response;
        }
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}
