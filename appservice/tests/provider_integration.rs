//! Drives the provider through the tfplug traits against a mock ARM endpoint

#![allow(clippy::disallowed_methods)]

use appservice::AppServiceProvider;
use mockito::{Matcher, Server, ServerGuard};
use serial_test::serial;
use std::any::Any;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, DataSource, DataSourceWithConfigure, ReadDataSourceRequest,
};
use tfplug::provider::{ConfigureProviderRequest, Provider};
use tfplug::resource::{
    ConfigureResourceRequest, ReadResourceRequest, Resource, ResourceWithConfigure,
};
use tfplug::types::{AttributePath, DynamicValue};

const SITE: &str = "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Web/sites/web-1";
const STATIC_SITE: &str =
    "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Web/staticSites/swa-1";

fn clear_env() {
    for var in [
        "ARM_SUBSCRIPTION_ID",
        "ARM_TENANT_ID",
        "ARM_CLIENT_ID",
        "ARM_CLIENT_SECRET",
        "ARM_ACCESS_TOKEN",
        "ARM_ENVIRONMENT",
        "ARM_RESOURCE_MANAGER_ENDPOINT",
    ] {
        std::env::remove_var(var);
    }
}

async fn configured_provider(
    server: &ServerGuard,
) -> (AppServiceProvider, Arc<dyn Any + Send + Sync>) {
    clear_env();
    let mut config = DynamicValue::object();
    for (name, value) in [
        ("subscription_id", "sub-1".to_string()),
        ("access_token", "test-token".to_string()),
        ("resource_manager_endpoint", server.url()),
    ] {
        config.set_string(&AttributePath::new(name), value).unwrap();
    }

    let mut provider = AppServiceProvider::new();
    let response = provider
        .configure(Context::new(), ConfigureProviderRequest { config })
        .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let data = response.provider_data.unwrap();
    (provider, data)
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn static_web_app_data_source_reads_through_provider() {
    let mut server = Server::new_async().await;
    let _site = server
        .mock("GET", STATIC_SITE)
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer test-token")
        .with_status(200)
        .with_body(
            r#"{"location":"westeurope","sku":{"name":"Standard","tier":"Standard"},
            "identity":{"type":"SystemAssigned","principalId":"p-1","tenantId":"t-1"},
            "properties":{"defaultHostname":"swa-1.azurestaticapps.net","allowConfigFileUpdates":true}}"#,
        )
        .create_async()
        .await;
    let _secrets = server
        .mock("POST", format!("{}/listSecrets", STATIC_SITE).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"properties":{"apiKey":"deploy-token"}}"#)
        .create_async()
        .await;
    let _settings = server
        .mock("POST", format!("{}/listAppSettings", STATIC_SITE).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"properties":{"FOO":"bar"}}"#)
        .create_async()
        .await;
    let _auth = server
        .mock("GET", format!("{}/basicAuth/default", STATIC_SITE).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"properties":{"applicableEnvironmentsMode":"AllEnvironments"}}"#)
        .create_async()
        .await;

    let (provider, data) = configured_provider(&server).await;
    let factories = provider.data_sources();
    let mut data_source = factories["azurerm_static_web_app"]();
    let configure = data_source
        .configure(
            Context::new(),
            ConfigureDataSourceRequest {
                provider_data: Some(data),
            },
        )
        .await;
    assert!(configure.diagnostics.is_empty());

    let mut config = DynamicValue::object();
    config
        .set_string(&AttributePath::new("name"), "swa-1".to_string())
        .unwrap();
    config
        .set_string(&AttributePath::new("resource_group_name"), "rg-1".to_string())
        .unwrap();

    let response = data_source
        .read(
            Context::new(),
            ReadDataSourceRequest {
                type_name: "azurerm_static_web_app".to_string(),
                config,
            },
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let state = response.state;
    assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), STATIC_SITE);
    assert_eq!(
        state.get_string(&AttributePath::new("sku_tier")).unwrap(),
        "Standard"
    );
    assert_eq!(
        state
            .get_string(&AttributePath::new("default_host_name"))
            .unwrap(),
        "swa-1.azurestaticapps.net"
    );
    assert!(state
        .get_bool(&AttributePath::new("configuration_file_changes_enabled"))
        .unwrap());

    clear_env();
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn web_app_read_drops_deleted_site_from_state() {
    let mut server = Server::new_async().await;
    let _site = server
        .mock("GET", SITE)
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"error":{"code":"ResourceNotFound","message":"gone"}}"#)
        .create_async()
        .await;

    let (provider, data) = configured_provider(&server).await;
    let factories = provider.resources();
    let mut resource = factories["azurerm_linux_web_app"]();
    let configure = resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: Some(data),
            },
        )
        .await;
    assert!(configure.diagnostics.is_empty());

    let mut state = DynamicValue::object();
    state
        .set_string(&AttributePath::new("id"), SITE.to_string())
        .unwrap();

    let response = resource
        .read(
            Context::new(),
            ReadResourceRequest {
                type_name: "azurerm_linux_web_app".to_string(),
                current_state: state,
            },
        )
        .await;

    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert!(response.new_state.is_none());

    clear_env();
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn handlers_reject_provider_data_from_elsewhere() {
    let server = Server::new_async().await;
    let (provider, _) = configured_provider(&server).await;

    let factories = provider.resources();
    let mut resource = factories["azurerm_web_app_active_slot"]();
    let foreign: Arc<dyn Any + Send + Sync> = Arc::new(42u32);
    let configure = resource
        .configure(
            Context::new(),
            ConfigureResourceRequest {
                provider_data: Some(foreign),
            },
        )
        .await;

    assert_eq!(configure.diagnostics.len(), 1);
    assert_eq!(configure.diagnostics[0].summary, "Invalid provider data");

    clear_env();
}
