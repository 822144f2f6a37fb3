//! `Microsoft.Web/sites` request and response bodies

use crate::api::common::ManagedServiceIdentity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<ManagedServiceIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<SiteProperties>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SiteProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_farm_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_affinity_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_cert_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_cert_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_cert_exclusion_paths: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_network_access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_network_subnet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_vault_reference_identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vnet_route_all_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_memory_time_quota: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_config: Option<SiteConfig>,

    // Read-only
    #[serde(skip_serializing)]
    pub default_host_name: Option<String>,
    #[serde(skip_serializing)]
    pub outbound_ip_addresses: Option<String>,
    #[serde(skip_serializing)]
    pub possible_outbound_ip_addresses: Option<String>,
    #[serde(skip_serializing)]
    pub custom_domain_verification_id: Option<String>,
    #[serde(skip_serializing)]
    pub slot_swap_status: Option<SlotSwapStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SlotSwapStatus {
    pub source_slot_name: Option<String>,
    pub destination_slot_name: Option<String>,
    pub timestamp_utc: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SiteConfigResource {
    #[serde(default)]
    pub properties: SiteConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_management_config: Option<ApiManagementConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_definition: Option<ApiDefinitionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_command_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr_use_managed_identity_creds: Option<bool>,
    #[serde(
        rename = "acrUserManagedIdentityID",
        skip_serializing_if = "Option::is_none"
    )]
    pub acr_user_managed_identity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_documents: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http20_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_security_restrictions: Option<Vec<IpSecurityRestriction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_security_restrictions_default_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scm_ip_security_restrictions_use_main: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scm_ip_security_restrictions: Option<Vec<IpSecurityRestriction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scm_ip_security_restrictions_default_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_my_sql_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_pipeline_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_debugging_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_debugging_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scm_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_32_bit_worker_process: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_sockets_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ftps_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_workers: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linux_fx_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windows_fx_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_tls_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scm_min_tls_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors: Option<CorsSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_error_logging_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vnet_route_all_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_network_access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_settings: Option<Vec<NameValuePair>>,

    // Windows runtime selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_framework_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub php_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_shell_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_container_version: Option<String>,

    // Function App scaling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_app_scale_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_elastic_instance_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_warmed_instance_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub functions_runtime_scale_monitoring_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApiManagementConfig {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApiDefinitionInfo {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CorsSettings {
    #[serde(default)]
    pub allowed_origins: Option<Vec<String>>,
    #[serde(default)]
    pub support_credentials: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NameValuePair {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IpSecurityRestriction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vnet_subnet_resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConnectionStringDictionary {
    #[serde(default)]
    pub properties: HashMap<String, ConnStringValueTypePair>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConnStringValueTypePair {
    pub value: String,
    #[serde(rename = "type")]
    pub connection_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SlotConfigNamesResource {
    #[serde(default)]
    pub properties: SlotConfigNames,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SlotConfigNames {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_setting_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SiteAuthSettings {
    #[serde(default)]
    pub properties: SiteAuthSettingsProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SiteAuthSettingsProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unauthenticated_client_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_store_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_external_redirect_urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_refresh_extension_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_login_params: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret_setting_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_audiences: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook_app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook_app_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook_app_secret_setting_name: Option<String>,
    #[serde(rename = "facebookOAuthScopes", skip_serializing_if = "Option::is_none")]
    pub facebook_oauth_scopes: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_hub_client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_hub_client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_hub_client_secret_setting_name: Option<String>,
    #[serde(rename = "gitHubOAuthScopes", skip_serializing_if = "Option::is_none")]
    pub git_hub_oauth_scopes: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_client_secret_setting_name: Option<String>,
    #[serde(rename = "googleOAuthScopes", skip_serializing_if = "Option::is_none")]
    pub google_oauth_scopes: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub microsoft_account_client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microsoft_account_client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microsoft_account_client_secret_setting_name: Option<String>,
    #[serde(
        rename = "microsoftAccountOAuthScopes",
        skip_serializing_if = "Option::is_none"
    )]
    pub microsoft_account_oauth_scopes: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_consumer_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_consumer_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_consumer_secret_setting_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SiteAuthSettingsV2 {
    #[serde(default)]
    pub properties: SiteAuthSettingsV2Properties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SiteAuthSettingsV2Properties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<AuthPlatform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_validation: Option<GlobalValidation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_providers: Option<IdentityProviders>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<AuthLogin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_settings: Option<AuthHttpSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthPlatform {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalValidation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_authentication: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unauthenticated_client_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_paths: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProviders {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure_active_directory: Option<AzureActiveDirectoryProvider>,
    #[serde(rename = "gitHub", skip_serializing_if = "Option::is_none")]
    pub github: Option<GitHubProvider>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AzureActiveDirectoryProvider {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<AadRegistration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<AadValidation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AadRegistration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret_setting_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_id_issuer: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AadValidation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_audiences: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitHubProvider {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<ClientRegistration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<LoginScopes>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientRegistration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret_setting_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoginScopes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthLogin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_store: Option<TokenStore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_external_redirect_urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preserve_url_fragments_for_logins: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenStore {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_refresh_extension_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthHttpSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_https: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes: Option<HttpRoutes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_proxy: Option<ForwardProxy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpRoutes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForwardProxy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convention: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_host_header_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_proto_header_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CsmPublishingCredentialsPoliciesEntity {
    #[serde(default)]
    pub properties: PublishingCredentialsPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishingCredentialsPolicy {
    pub allow: bool,
}

impl Default for PublishingCredentialsPolicy {
    fn default() -> Self {
        Self { allow: true }
    }
}

/// Body of `POST .../slotsswap`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CsmSlotEntity {
    pub target_slot: String,
    pub preserve_vnet: bool,
}
