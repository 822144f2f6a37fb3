//! Drives a small in-memory provider through the tfplug traits

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
    ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::defaults::StaticDefault;
use tfplug::plan::{plan_create, plan_update};
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetadataRequest, ProviderMetadataResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory, ValidateProviderConfigRequest,
    ValidateProviderConfigResponse,
};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{has_errors, AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::{validate_config, StringNotEmpty};

type Store = Arc<Mutex<HashMap<String, String>>>;

struct MemoryProvider {
    store: Store,
    configured: bool,
}

#[async_trait]
impl Provider for MemoryProvider {
    fn type_name(&self) -> &str {
        "memory"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: "memory".to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ProviderSchemaRequest,
    ) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: SchemaBuilder::new().build(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateProviderConfigRequest,
    ) -> ValidateProviderConfigResponse {
        ValidateProviderConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        _request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        self.configured = true;
        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(self.store.clone() as Arc<dyn Any + Send + Sync>),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert(
            "memory_entry".to_string(),
            Box::new(|| Box::new(EntryResource::default()) as Box<dyn ResourceWithConfigure>),
        );
        factories
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut factories: HashMap<String, DataSourceFactory> = HashMap::new();
        factories.insert(
            "memory_entry".to_string(),
            Box::new(|| Box::new(EntryDataSource::default()) as Box<dyn DataSourceWithConfigure>),
        );
        factories
    }
}

#[derive(Default)]
struct EntryResource {
    store: Option<Store>,
}

impl EntryResource {
    fn schema_static() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("key", AttributeType::String)
                    .required()
                    .requires_replace()
                    .validator(StringNotEmpty::create())
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("value", AttributeType::String)
                    .optional()
                    .default(StaticDefault::string("empty"))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("delay_ms", AttributeType::Number)
                    .optional()
                    .build(),
            )
            .build()
    }
}

#[async_trait]
impl Resource for EntryResource {
    fn type_name(&self) -> &str {
        "memory_entry"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: validate_config(&Self::schema_static().block, &request.config),
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut state = request.planned_state;
        let key = state.get_string(&AttributePath::new("key")).unwrap();
        let value = state.get_string(&AttributePath::new("value")).unwrap();

        if let Ok(delay) = state.get_number(&AttributePath::new("delay_ms")) {
            let ctx = ctx.with_default_timeout(Duration::from_millis(50));
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(delay as u64)) => {}
                reason = ctx.cancelled() => {
                    return CreateResourceResponse {
                        new_state: state,
                        diagnostics: vec![Diagnostic::error("Creating entry", reason.to_string())],
                    };
                }
            }
        }

        if let Some(store) = &self.store {
            store.lock().unwrap().insert(key.clone(), value);
        }
        state
            .set_string(&AttributePath::new("id"), key)
            .unwrap();
        CreateResourceResponse {
            new_state: state,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let key = request
            .current_state
            .get_string(&AttributePath::new("id"))
            .unwrap();
        let found = self
            .store
            .as_ref()
            .and_then(|s| s.lock().unwrap().get(&key).cloned());

        ReadResourceResponse {
            new_state: found.map(|value| {
                let mut state = request.current_state.clone();
                state
                    .set_string(&AttributePath::new("value"), value)
                    .unwrap();
                state
            }),
            diagnostics: vec![],
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let created = self
            .create(
                ctx,
                CreateResourceRequest {
                    type_name: request.type_name,
                    planned_state: request.planned_state,
                    config: request.config,
                },
            )
            .await;
        UpdateResourceResponse {
            new_state: created.new_state,
            diagnostics: created.diagnostics,
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let key = request
            .prior_state
            .get_string(&AttributePath::new("id"))
            .unwrap();
        if let Some(store) = &self.store {
            store.lock().unwrap().remove(&key);
        }
        DeleteResourceResponse {
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for EntryResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        self.store = request
            .provider_data
            .and_then(|d| d.downcast_ref::<Store>().cloned());
        ConfigureResourceResponse {
            diagnostics: vec![],
        }
    }
}

#[derive(Default)]
struct EntryDataSource {
    store: Option<Store>,
}

#[async_trait]
impl DataSource for EntryDataSource {
    fn type_name(&self) -> &str {
        "memory_entry"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: SchemaBuilder::new().build(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let key = request.config.get_string(&AttributePath::new("key")).unwrap();
        let mut state = request.config.clone();
        let mut diagnostics = vec![];
        match self
            .store
            .as_ref()
            .and_then(|s| s.lock().unwrap().get(&key).cloned())
        {
            Some(value) => state
                .set_string(&AttributePath::new("value"), value)
                .unwrap(),
            None => diagnostics.push(Diagnostic::error("Entry not found", key)),
        }
        ReadDataSourceResponse { state, diagnostics }
    }
}

#[async_trait]
impl DataSourceWithConfigure for EntryDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        self.store = request
            .provider_data
            .and_then(|d| d.downcast_ref::<Store>().cloned());
        ConfigureDataSourceResponse {
            diagnostics: vec![],
        }
    }
}

async fn configured_provider() -> (MemoryProvider, Option<Arc<dyn Any + Send + Sync>>) {
    let mut provider = MemoryProvider {
        store: Arc::new(Mutex::new(HashMap::new())),
        configured: false,
    };
    let response = provider
        .configure(
            Context::new(),
            ConfigureProviderRequest {
                config: DynamicValue::object(),
            },
        )
        .await;
    assert!(response.diagnostics.is_empty());
    assert!(provider.configured);
    (provider, response.provider_data)
}

fn entry_config(key: &str, delay_ms: Option<f64>) -> DynamicValue {
    let mut config = DynamicValue::object();
    config
        .set_string(&AttributePath::new("key"), key.to_string())
        .unwrap();
    if let Some(delay) = delay_ms {
        config
            .set_number(&AttributePath::new("delay_ms"), delay)
            .unwrap();
    }
    config
}

#[tokio::test]
async fn resource_lifecycle_through_factories() {
    let (provider, provider_data) = configured_provider().await;

    let factories = provider.resources();
    let mut resource = factories.get("memory_entry").unwrap()();
    resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: provider_data.clone(),
            },
        )
        .await;

    let schema = EntryResource::schema_static();
    let config = entry_config("greeting", None);
    let planned = plan_create(&schema, &config);

    let created = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "memory_entry".to_string(),
                planned_state: planned,
                config: config.clone(),
            },
        )
        .await;
    assert!(!has_errors(&created.diagnostics));
    assert_eq!(
        created
            .new_state
            .get_string(&AttributePath::new("value"))
            .unwrap(),
        "empty"
    );

    let read = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "memory_entry".to_string(),
                current_state: created.new_state.clone(),
            },
        )
        .await;
    assert!(read.new_state.is_some());

    let planned = plan_update(&schema, &created.new_state, &config);
    assert_eq!(
        planned.get_string(&AttributePath::new("id")).unwrap(),
        "greeting"
    );

    resource
        .delete(
            Context::new(),
            DeleteResourceRequest {
                type_name: "memory_entry".to_string(),
                prior_state: created.new_state.clone(),
            },
        )
        .await;

    let gone = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "memory_entry".to_string(),
                current_state: created.new_state,
            },
        )
        .await;
    assert!(gone.new_state.is_none());
}

#[tokio::test]
async fn validate_reports_schema_violations() {
    let resource = EntryResource::default();
    let response = resource
        .validate(
            Context::new(),
            ValidateResourceConfigRequest {
                type_name: "memory_entry".to_string(),
                config: entry_config("", None),
            },
        )
        .await;
    assert!(has_errors(&response.diagnostics));
}

#[tokio::test]
async fn create_honours_context_deadline() {
    let (provider, provider_data) = configured_provider().await;
    let mut resource = provider.resources().get("memory_entry").unwrap()();
    resource
        .configure(Context::new(), ConfigureResourceRequest { provider_data })
        .await;

    let config = entry_config("slow", Some(5_000.0));
    let response = resource
        .create(
            Context::new(),
            CreateResourceRequest {
                type_name: "memory_entry".to_string(),
                planned_state: plan_create(&EntryResource::schema_static(), &config),
                config,
            },
        )
        .await;

    assert!(has_errors(&response.diagnostics));
    assert!(response.diagnostics[0].detail.contains("deadline exceeded"));
}

#[tokio::test]
async fn concurrent_creates_share_provider_data() {
    let (provider, provider_data) = configured_provider().await;
    let factories = provider.resources();

    let mut resources = Vec::new();
    for _ in 0..5 {
        let mut resource = factories.get("memory_entry").unwrap()();
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: provider_data.clone(),
                },
            )
            .await;
        resources.push(resource);
    }

    let schema = EntryResource::schema_static();
    let creates = resources.iter().enumerate().map(|(i, resource)| {
        let config = entry_config(&format!("key-{}", i), Some(5.0));
        let planned = plan_create(&schema, &config);
        resource.create(
            Context::new(),
            CreateResourceRequest {
                type_name: "memory_entry".to_string(),
                planned_state: planned,
                config,
            },
        )
    });
    let responses = futures::future::join_all(creates).await;

    assert!(responses.iter().all(|r| r.diagnostics.is_empty()));
    assert_eq!(provider.store.lock().unwrap().len(), 5);

    let mut data_source = provider.data_sources().get("memory_entry").unwrap()();
    data_source
        .configure(Context::new(), ConfigureDataSourceRequest { provider_data })
        .await;
    let read = data_source
        .read(
            Context::new(),
            ReadDataSourceRequest {
                type_name: "memory_entry".to_string(),
                config: entry_config("key-3", None),
            },
        )
        .await;
    assert!(read.diagnostics.is_empty());
    assert_eq!(
        read.state.get_string(&AttributePath::new("value")).unwrap(),
        "empty"
    );
}
