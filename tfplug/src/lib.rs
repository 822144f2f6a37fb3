//! tfplug - Terraform provider resource framework for Rust
//!
//! Typed building blocks for provider handlers: request-scoped contexts,
//! dynamic Terraform values, schemas, planning helpers and the
//! provider/resource/data source traits. The plugin wire protocol is served
//! by the host process and is not part of this crate.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod data_source;
pub mod provider;
pub mod resource;

// Helper modules
pub mod defaults;
pub mod import;
pub mod plan;
pub mod timeouts;
pub mod validator;

// Re-exports for convenience
pub use context::Context;
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use import::import_state_passthrough_id;
pub use provider::{DataSourceFactory, Provider, ResourceFactory};
pub use resource::{Resource, ResourceWithConfigure, ResourceWithImportState};
pub use schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, Schema, SchemaBuilder};
pub use timeouts::Timeouts;
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
