//! Data source handlers: read-only lookups of existing remote objects

use crate::context::Context;
use crate::schema::Schema;
use crate::types::{Diagnostic, DynamicValue};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// One data source type. Only `read` talks to the remote API.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// The key this handler is registered under in `Provider::data_sources`
    fn type_name(&self) -> &str;

    async fn metadata(
        &self,
        ctx: Context,
        request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse;

    async fn schema(
        &self,
        ctx: Context,
        request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse;

    async fn validate(
        &self,
        ctx: Context,
        request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse;

    /// Resolve `config` into the full state. A missing object is an error
    /// diagnostic, unlike a resource read.
    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse;
}

pub struct DataSourceMetadataRequest;

pub struct DataSourceMetadataResponse {
    pub type_name: String,
}

pub struct DataSourceSchemaRequest;

pub struct DataSourceSchemaResponse {
    pub schema: Schema,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ValidateDataSourceConfigRequest {
    pub type_name: String,
    pub config: DynamicValue,
}

pub struct ValidateDataSourceConfigResponse {
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ReadDataSourceRequest {
    pub type_name: String,
    pub config: DynamicValue,
}

pub struct ReadDataSourceResponse {
    pub state: DynamicValue,
    pub diagnostics: Vec<Diagnostic>,
}

/// Receives the provider's shared data before the first `read`
#[async_trait]
pub trait DataSourceWithConfigure: DataSource {
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse;
}

pub struct ConfigureDataSourceRequest {
    pub provider_data: Option<Arc<dyn Any + Send + Sync>>,
}

pub struct ConfigureDataSourceResponse {
    pub diagnostics: Vec<Diagnostic>,
}
