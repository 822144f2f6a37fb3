//! Provider trait and related types
//!
//! The host calls `configure` once, then instantiates resources and data
//! sources through the factories and hands each the configured
//! `provider_data`.

use crate::context::Context;
use crate::data_source::DataSourceWithConfigure;
use crate::resource::ResourceWithConfigure;
use crate::schema::Schema;
use crate::types::{Diagnostic, DynamicValue};
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

pub type ResourceFactory = Box<dyn Fn() -> Box<dyn ResourceWithConfigure> + Send + Sync>;
pub type DataSourceFactory = Box<dyn Fn() -> Box<dyn DataSourceWithConfigure> + Send + Sync>;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider type name, the prefix of every resource type name
    fn type_name(&self) -> &str;

    async fn metadata(
        &self,
        ctx: Context,
        request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse;

    async fn schema(&self, ctx: Context, request: ProviderSchemaRequest) -> ProviderSchemaResponse;

    async fn validate(
        &self,
        ctx: Context,
        request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse;

    /// Build API clients from configuration. `provider_data` is passed to
    /// every resource and data source configure call.
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse;

    fn resources(&self) -> HashMap<String, ResourceFactory>;

    fn data_sources(&self) -> HashMap<String, DataSourceFactory>;
}

pub struct ProviderMetadataRequest;

pub struct ProviderMetadataResponse {
    pub type_name: String,
}

pub struct ProviderSchemaRequest;

pub struct ProviderSchemaResponse {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ValidateProviderConfigRequest {
    pub config: DynamicValue,
}

pub struct ValidateProviderConfigResponse {
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ConfigureProviderRequest {
    pub config: DynamicValue,
}

pub struct ConfigureProviderResponse {
    pub diagnostics: Vec<Diagnostic>,
    pub provider_data: Option<Arc<dyn Any + Send + Sync>>,
}
