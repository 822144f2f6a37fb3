//! Managed resource handlers
//!
//! The host decodes each plugin-protocol call into one of the request types
//! here and hands it to the handler built by the provider's factory. Every
//! call carries a [`Context`] with the caller's deadline; long waits inside a
//! handler should stop when it is done.

use crate::context::Context;
use crate::schema::Schema;
use crate::types::{Diagnostic, DynamicValue};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// Lifecycle of one managed resource type. Failures are reported as
/// diagnostics on the response, never as panics.
#[async_trait]
pub trait Resource: Send + Sync {
    /// The key this handler is registered under in `Provider::resources`,
    /// e.g. `azurerm_linux_web_app`
    fn type_name(&self) -> &str;

    async fn metadata(
        &self,
        ctx: Context,
        request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse;

    async fn schema(&self, ctx: Context, request: ResourceSchemaRequest) -> ResourceSchemaResponse;

    /// Called during plan to validate configuration, before any API call
    async fn validate(
        &self,
        ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse;

    /// Returns the full new state, computed attributes included. On failure
    /// the planned state is echoed back with the diagnostics.
    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse;

    /// Refresh. A remote object that no longer exists yields `new_state: None`.
    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse;

    /// Apply `planned_state` in place. Attributes that require replacement
    /// never reach here.
    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse;

    /// Deleting something already gone is not an error
    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse;
}

pub struct ResourceMetadataRequest;

pub struct ResourceMetadataResponse {
    pub type_name: String,
}

pub struct ResourceSchemaRequest;

pub struct ResourceSchemaResponse {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ValidateResourceConfigRequest {
    pub type_name: String,
    pub config: DynamicValue,
}

pub struct ValidateResourceConfigResponse {
    pub diagnostics: Vec<Diagnostic>,
}

pub struct CreateResourceRequest {
    pub type_name: String,
    pub planned_state: DynamicValue,
    pub config: DynamicValue,
}

pub struct CreateResourceResponse {
    pub new_state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ReadResourceRequest {
    pub type_name: String,
    pub current_state: DynamicValue,
}

pub struct ReadResourceResponse {
    /// `None` removes the resource from state
    pub new_state: Option<DynamicValue>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct UpdateResourceRequest {
    pub type_name: String,
    pub prior_state: DynamicValue,
    pub planned_state: DynamicValue,
    pub config: DynamicValue,
}

pub struct UpdateResourceResponse {
    pub new_state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct DeleteResourceRequest {
    pub type_name: String,
    pub prior_state: DynamicValue,
}

pub struct DeleteResourceResponse {
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs right after the factory builds the handler, with whatever the
/// provider's `configure` returned
#[async_trait]
pub trait ResourceWithConfigure: Resource {
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse;
}

pub struct ConfigureResourceRequest {
    /// `ConfigureProviderResponse::provider_data`, downcast by the handler
    pub provider_data: Option<Arc<dyn Any + Send + Sync>>,
}

pub struct ConfigureResourceResponse {
    pub diagnostics: Vec<Diagnostic>,
}

/// `terraform import` support
#[async_trait]
pub trait ResourceWithImportState: Resource {
    /// Check the ID and seed enough state for the Read that follows
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse;
}

pub struct ImportResourceStateRequest {
    pub type_name: String,
    pub id: String,
}

#[derive(Default)]
pub struct ImportResourceStateResponse {
    pub imported_resources: Vec<ImportedResource>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ImportedResource {
    pub type_name: String,
    pub state: DynamicValue,
}
