//! Active slot: swaps a deployment slot into production
//!
//! The resource has no Azure object of its own. Its ID is the App's ID and
//! its state mirrors the App's last recorded slot swap.

use super::{
    extract_provider_data, not_configured, operation_error, state_from_model, TIMEOUTS,
};
use crate::api::lro::race;
use crate::api::sites::CsmSlotEntity;
use crate::api::{ApiError, Poller};
use crate::ids::{WebAppId, WebAppSlotId};
use crate::provider_data::AppServiceProviderData;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
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
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ActiveSlotModel {
    id: String,
    slot_id: String,
    overwrite_network_config: bool,
    last_successful_swap: String,
}

impl Default for ActiveSlotModel {
    fn default() -> Self {
        Self {
            id: String::new(),
            slot_id: String::new(),
            overwrite_network_config: true,
            last_successful_swap: String::new(),
        }
    }
}

/// `azurerm_web_app_active_slot` and `azurerm_function_app_active_slot`.
/// Both swap through the same `slotsswap` operation on the parent site.
pub struct ActiveSlotResource {
    type_name: &'static str,
    label: &'static str,
    provider_data: Option<AppServiceProviderData>,
}

impl ActiveSlotResource {
    pub fn web_app() -> Self {
        Self {
            type_name: "azurerm_web_app_active_slot",
            label: "Web App",
            provider_data: None,
        }
    }

    pub fn function_app() -> Self {
        Self {
            type_name: "azurerm_function_app_active_slot",
            label: "Function App",
            provider_data: None,
        }
    }

    fn build_schema(&self) -> Schema {
        SchemaBuilder::new()
            .version(0)
            .description(&format!(
                "Manages which {} slot is swapped into production",
                self.label
            ))
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The ID of the parent App")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("slot_id", AttributeType::String)
                    .description("The ID of the slot to swap with production")
                    .required()
                    .requires_replace()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("overwrite_network_config", AttributeType::Bool)
                    .description("Swap the slot's virtual network configuration along with it")
                    .optional()
                    .requires_replace()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("last_successful_swap", AttributeType::String)
                    .description("Timestamp of the last successful swap")
                    .computed()
                    .build(),
            )
            .build()
    }

    /// Rebuild state from the App's swap status. `Ok(None)` when the App is gone.
    async fn read_model(
        &self,
        data: &AppServiceProviderData,
        ctx: &Context,
        app_id: &WebAppId,
        prior: &ActiveSlotModel,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Option<ActiveSlotModel>, Diagnostic> {
        let site = match race(ctx, data.client.sites().get(app_id)).await.and_then(|r| r) {
            Ok(site) => site,
            Err(e) if e.is_not_found() => {
                tracing::info!("{} {} not found, removing from state", self.label, app_id);
                return Ok(None);
            }
            Err(e) => return Err(operation_error("reading", self.label, app_id, &e)),
        };

        let mut model = ActiveSlotModel {
            id: app_id.to_string(),
            ..prior.clone()
        };

        let status = site.properties.and_then(|p| p.slot_swap_status);
        match status.and_then(|s| s.source_slot_name.map(|slot| (slot, s.timestamp_utc))) {
            Some((slot, timestamp)) => {
                model.slot_id = app_id.slot(&slot).to_string();
                model.last_successful_swap = timestamp
                    .as_deref()
                    .map(normalise_timestamp)
                    .unwrap_or_default();
            }
            None => {
                model.last_successful_swap = String::new();
                diagnostics.push(Diagnostic::warning(
                    "No slot swap recorded",
                    format!(
                        "{} {} reports no slot swap status; keeping slot_id from state",
                        self.label, app_id
                    ),
                ));
            }
        }

        Ok(Some(model))
    }
}

/// Azure reports seven fractional digits; state keeps whole seconds in UTC
fn normalise_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        Err(_) => raw.to_string(),
    }
}

#[async_trait]
impl Resource for ActiveSlotResource {
    fn type_name(&self) -> &str {
        self.type_name
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name.to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: self.build_schema(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];

        match request.config.decode_model::<ActiveSlotModel>() {
            Ok(model) if !model.slot_id.is_empty() => {
                if let Err(e) = WebAppSlotId::parse(&model.slot_id) {
                    diagnostics.push(
                        Diagnostic::error("Invalid slot_id", e.to_string())
                            .with_attribute(AttributePath::new("slot_id")),
                    );
                }
            }
            Ok(_) => {}
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

        let planned = match request.planned_state.decode_model::<ActiveSlotModel>() {
            Ok(m) => m,
            Err(e) => {
                diagnostics.push(Diagnostic::error("Failed to decode planned state", e.to_string()));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let slot_id = match WebAppSlotId::parse(&planned.slot_id) {
            Ok(id) => id,
            Err(e) => {
                diagnostics.push(
                    Diagnostic::error("Invalid slot_id", e.to_string())
                        .with_attribute(AttributePath::new("slot_id")),
                );
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };
        let app_id = slot_id.parent();
        let sites = data.client.sites();
        let ctx = TIMEOUTS.create_context(&ctx);

        if let Err(e) = race(&ctx, sites.get(&app_id)).await.and_then(|r| r) {
            diagnostics.push(if e.is_not_found() {
                Diagnostic::error(
                    format!("{} not found", self.label),
                    format!("{} {} was not found", self.label, app_id),
                )
            } else {
                operation_error("retrieving", self.label, &app_id, &e)
            });
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        }

        if let Err(e) = race(&ctx, sites.get(&slot_id)).await.and_then(|r| r) {
            diagnostics.push(if e.is_not_found() {
                Diagnostic::error(
                    "Slot not found",
                    format!("{} Slot {} was not found", self.label, slot_id),
                )
            } else {
                operation_error("retrieving", &format!("{} Slot", self.label), &slot_id, &e)
            });
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        }

        let _lock = match data.locks.lock_within(&ctx, &app_id.to_string()).await {
            Ok(guard) => guard,
            Err(reason) => {
                diagnostics.push(operation_error(
                    "swapping slot into production for",
                    self.label,
                    &app_id,
                    &ApiError::Cancelled(reason.to_string()),
                ));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        tracing::info!(
            "Swapping slot {} into production for {}",
            slot_id.slot_name,
            app_id
        );
        let swap = CsmSlotEntity {
            target_slot: slot_id.slot_name.clone(),
            preserve_vnet: planned.overwrite_network_config,
        };
        let swapped = match sites.swap_slot_with_production(&app_id, &swap).await {
            Ok(resp) => Poller::new(&data.client, &resp).poll_until_done(&ctx).await,
            Err(e) => Err(e),
        };
        if let Err(e) = swapped {
            diagnostics.push(operation_error(
                "swapping slot into production for",
                self.label,
                &app_id,
                &e,
            ));
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        }

        let new_state = match self
            .read_model(data, &ctx, &app_id, &planned, &mut diagnostics)
            .await
        {
            Ok(Some(model)) => state_from_model(&model, &self.build_schema()),
            Ok(None) => {
                diagnostics.push(Diagnostic::error(
                    format!("{} not found", self.label),
                    format!("{} {} disappeared after the swap", self.label, app_id),
                ));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        match new_state {
            Ok(state) => CreateResourceResponse {
                new_state: state,
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::error("Failed to encode state", e.to_string()));
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
            .decode_model::<ActiveSlotModel>()
            .unwrap_or_default();
        let app_id = match WebAppId::parse(&prior.id) {
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
        match self
            .read_model(data, &ctx, &app_id, &prior, &mut diagnostics)
            .await
        {
            Ok(Some(model)) => match state_from_model(&model, &self.build_schema()) {
                Ok(state) => ReadResourceResponse {
                    new_state: Some(state),
                    diagnostics,
                },
                Err(e) => {
                    diagnostics.push(Diagnostic::error("Failed to encode state", e.to_string()));
                    ReadResourceResponse {
                        new_state: Some(request.current_state),
                        diagnostics,
                    }
                }
            },
            Ok(None) => ReadResourceResponse {
                new_state: None,
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

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        // Every argument forces replacement
        UpdateResourceResponse {
            new_state: request.planned_state,
            diagnostics: vec![],
        }
    }

    async fn delete(&self, _ctx: Context, _request: DeleteResourceRequest) -> DeleteResourceResponse {
        tracing::debug!(
            "Removing {} from state without calling Azure",
            self.type_name
        );
        DeleteResourceResponse {
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for ActiveSlotResource {
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
impl ResourceWithImportState for ActiveSlotResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();

        if let Err(e) = WebAppId::parse(&request.id) {
            response
                .diagnostics
                .push(Diagnostic::error("Invalid import ID", e.to_string()));
            return response;
        }

        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

#[cfg(test)]
#[path = "./active_slot_test.rs"]
mod active_slot_test;
