//! `auth_settings_v2`: App Service authentication (v2)
//!
//! Covers the platform, global validation, HTTP and login settings plus the
//! Azure Active Directory and GitHub identity providers.

use super::non_empty;
use crate::api::sites::{
    AadRegistration, AadValidation, AuthHttpSettings, AuthLogin, AuthPlatform,
    AzureActiveDirectoryProvider, ClientRegistration, ForwardProxy, GitHubProvider,
    GlobalValidation, HttpRoutes, IdentityProviders, LoginScopes, SiteAuthSettingsV2,
    SiteAuthSettingsV2Properties, TokenStore,
};
use serde::{Deserialize, Serialize};
use tfplug::defaults::StaticDefault;
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder};
use tfplug::validator::StringOneOf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthV2Settings {
    pub auth_enabled: bool,
    pub runtime_version: String,
    pub config_file_path: String,
    pub require_authentication: bool,
    pub unauthenticated_action: String,
    pub default_provider: String,
    pub excluded_paths: Vec<String>,
    pub require_https: bool,
    pub http_route_api_prefix: String,
    pub forward_proxy_convention: String,
    pub forward_proxy_custom_host_header_name: String,
    pub forward_proxy_custom_scheme_header_name: String,
    pub login: Vec<AuthV2Login>,
    pub active_directory_v2: Vec<AadAuthV2Settings>,
    pub github_v2: Vec<GithubAuthV2Settings>,
}

impl Default for AuthV2Settings {
    fn default() -> Self {
        Self {
            auth_enabled: false,
            runtime_version: "~1".to_string(),
            config_file_path: String::new(),
            require_authentication: false,
            unauthenticated_action: "RedirectToLoginPage".to_string(),
            default_provider: String::new(),
            excluded_paths: Vec::new(),
            require_https: true,
            http_route_api_prefix: "/.auth".to_string(),
            forward_proxy_convention: "NoProxy".to_string(),
            forward_proxy_custom_host_header_name: String::new(),
            forward_proxy_custom_scheme_header_name: String::new(),
            login: Vec::new(),
            active_directory_v2: Vec::new(),
            github_v2: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthV2Login {
    pub token_store_enabled: bool,
    pub token_refresh_extension_time: f64,
    pub allowed_external_redirect_urls: Vec<String>,
    pub preserve_url_fragments_for_logins: bool,
}

impl Default for AuthV2Login {
    fn default() -> Self {
        Self {
            token_store_enabled: false,
            token_refresh_extension_time: 72.0,
            allowed_external_redirect_urls: Vec::new(),
            preserve_url_fragments_for_logins: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AadAuthV2Settings {
    pub client_id: String,
    pub tenant_auth_endpoint: String,
    pub client_secret_setting_name: String,
    pub allowed_audiences: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubAuthV2Settings {
    pub client_id: String,
    pub client_secret_setting_name: String,
    pub login_scopes: Vec<String>,
}

fn string_list() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::String))
}

fn optional_string(name: &str) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .optional()
        .build()
}

fn login_schema() -> NestedBlock {
    NestedBlockBuilder::list("login")
        .min_items(1)
        .max_items(1)
        .attribute(
            AttributeBuilder::new("token_store_enabled", AttributeType::Bool)
                .optional()
                .default(StaticDefault::bool(false))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("token_refresh_extension_time", AttributeType::Number)
                .optional()
                .default(StaticDefault::number(72.0))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("allowed_external_redirect_urls", string_list())
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("preserve_url_fragments_for_logins", AttributeType::Bool)
                .optional()
                .default(StaticDefault::bool(false))
                .build(),
        )
        .build()
}

pub fn schema() -> NestedBlock {
    NestedBlockBuilder::list("auth_settings_v2")
        .max_items(1)
        .description("Authentication settings (v2)")
        .attribute(
            AttributeBuilder::new("auth_enabled", AttributeType::Bool)
                .optional()
                .default(StaticDefault::bool(false))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("runtime_version", AttributeType::String)
                .optional()
                .default(StaticDefault::string("~1"))
                .build(),
        )
        .attribute(optional_string("config_file_path"))
        .attribute(
            AttributeBuilder::new("require_authentication", AttributeType::Bool)
                .optional()
                .default(StaticDefault::bool(false))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("unauthenticated_action", AttributeType::String)
                .optional()
                .default(StaticDefault::string("RedirectToLoginPage"))
                .validator(StringOneOf::create(&[
                    "RedirectToLoginPage",
                    "AllowAnonymous",
                    "Return401",
                    "Return403",
                ]))
                .build(),
        )
        .attribute(optional_string("default_provider"))
        .attribute(
            AttributeBuilder::new("excluded_paths", string_list())
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("require_https", AttributeType::Bool)
                .optional()
                .default(StaticDefault::bool(true))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("http_route_api_prefix", AttributeType::String)
                .optional()
                .default(StaticDefault::string("/.auth"))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("forward_proxy_convention", AttributeType::String)
                .optional()
                .default(StaticDefault::string("NoProxy"))
                .validator(StringOneOf::create(&["NoProxy", "Standard", "Custom"]))
                .build(),
        )
        .attribute(optional_string("forward_proxy_custom_host_header_name"))
        .attribute(optional_string("forward_proxy_custom_scheme_header_name"))
        .block(login_schema())
        .block(
            NestedBlockBuilder::list("active_directory_v2")
                .max_items(1)
                .attribute(
                    AttributeBuilder::new("client_id", AttributeType::String)
                        .required()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("tenant_auth_endpoint", AttributeType::String)
                        .required()
                        .build(),
                )
                .attribute(optional_string("client_secret_setting_name"))
                .attribute(
                    AttributeBuilder::new("allowed_audiences", string_list())
                        .optional()
                        .build(),
                )
                .build(),
        )
        .block(
            NestedBlockBuilder::list("github_v2")
                .max_items(1)
                .attribute(
                    AttributeBuilder::new("client_id", AttributeType::String)
                        .required()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("client_secret_setting_name", AttributeType::String)
                        .required()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("login_scopes", string_list())
                        .optional()
                        .build(),
                )
                .build(),
        )
        .build()
}

/// Body that turns v2 authentication off after the block is removed
pub fn disabled() -> SiteAuthSettingsV2 {
    SiteAuthSettingsV2 {
        properties: SiteAuthSettingsV2Properties {
            platform: Some(AuthPlatform {
                enabled: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        },
    }
}

pub fn expand(input: &[AuthV2Settings]) -> Option<SiteAuthSettingsV2> {
    let settings = input.first()?;

    let login = settings.login.first().map(|l| AuthLogin {
        token_store: Some(TokenStore {
            enabled: Some(l.token_store_enabled),
            token_refresh_extension_hours: Some(l.token_refresh_extension_time),
        }),
        allowed_external_redirect_urls: Some(l.allowed_external_redirect_urls.clone()),
        preserve_url_fragments_for_logins: Some(l.preserve_url_fragments_for_logins),
    });

    let azure_active_directory = settings.active_directory_v2.first().map(|aad| {
        AzureActiveDirectoryProvider {
            enabled: Some(true),
            registration: Some(AadRegistration {
                client_id: Some(aad.client_id.clone()),
                client_secret_setting_name: non_empty(&aad.client_secret_setting_name),
                open_id_issuer: Some(aad.tenant_auth_endpoint.clone()),
            }),
            validation: Some(AadValidation {
                allowed_audiences: Some(aad.allowed_audiences.clone()),
            }),
        }
    });

    let github = settings.github_v2.first().map(|gh| GitHubProvider {
        enabled: Some(true),
        registration: Some(ClientRegistration {
            client_id: Some(gh.client_id.clone()),
            client_secret_setting_name: Some(gh.client_secret_setting_name.clone()),
        }),
        login: Some(LoginScopes {
            scopes: Some(gh.login_scopes.clone()),
        }),
    });

    Some(SiteAuthSettingsV2 {
        properties: SiteAuthSettingsV2Properties {
            platform: Some(AuthPlatform {
                enabled: Some(settings.auth_enabled),
                runtime_version: Some(settings.runtime_version.clone()),
                config_file_path: non_empty(&settings.config_file_path),
            }),
            global_validation: Some(GlobalValidation {
                require_authentication: Some(settings.require_authentication),
                unauthenticated_client_action: Some(settings.unauthenticated_action.clone()),
                redirect_to_provider: non_empty(&settings.default_provider),
                excluded_paths: Some(settings.excluded_paths.clone()),
            }),
            identity_providers: Some(IdentityProviders {
                azure_active_directory,
                github,
            }),
            login,
            http_settings: Some(AuthHttpSettings {
                require_https: Some(settings.require_https),
                routes: Some(HttpRoutes {
                    api_prefix: Some(settings.http_route_api_prefix.clone()),
                }),
                forward_proxy: Some(ForwardProxy {
                    convention: Some(settings.forward_proxy_convention.clone()),
                    custom_host_header_name: non_empty(
                        &settings.forward_proxy_custom_host_header_name,
                    ),
                    custom_proto_header_name: non_empty(
                        &settings.forward_proxy_custom_scheme_header_name,
                    ),
                }),
            }),
        },
    })
}

pub fn flatten(input: Option<&SiteAuthSettingsV2>) -> Vec<AuthV2Settings> {
    let Some(props) = input.map(|s| &s.properties) else {
        return Vec::new();
    };

    let mut result = AuthV2Settings::default();

    if let Some(platform) = &props.platform {
        result.auth_enabled = platform.enabled.unwrap_or(false);
        result.runtime_version = platform.runtime_version.clone().unwrap_or_default();
        result.config_file_path = platform.config_file_path.clone().unwrap_or_default();
    }

    if let Some(global) = &props.global_validation {
        result.require_authentication = global.require_authentication.unwrap_or(false);
        result.unauthenticated_action = global
            .unauthenticated_client_action
            .clone()
            .unwrap_or_default();
        result.default_provider = global.redirect_to_provider.clone().unwrap_or_default();
        result.excluded_paths = global.excluded_paths.clone().unwrap_or_default();
    }

    if let Some(http) = &props.http_settings {
        result.require_https = http.require_https.unwrap_or(false);
        result.http_route_api_prefix = http
            .routes
            .as_ref()
            .and_then(|r| r.api_prefix.clone())
            .unwrap_or_default();
        if let Some(fp) = &http.forward_proxy {
            result.forward_proxy_convention = fp.convention.clone().unwrap_or_default();
            result.forward_proxy_custom_host_header_name =
                fp.custom_host_header_name.clone().unwrap_or_default();
            result.forward_proxy_custom_scheme_header_name =
                fp.custom_proto_header_name.clone().unwrap_or_default();
        }
    }

    if let Some(login) = &props.login {
        let token_store = login.token_store.clone().unwrap_or_default();
        result.login = vec![AuthV2Login {
            token_store_enabled: token_store.enabled.unwrap_or(false),
            token_refresh_extension_time: token_store
                .token_refresh_extension_hours
                .unwrap_or_default(),
            allowed_external_redirect_urls: login
                .allowed_external_redirect_urls
                .clone()
                .unwrap_or_default(),
            preserve_url_fragments_for_logins: login
                .preserve_url_fragments_for_logins
                .unwrap_or(false),
        }];
    }

    if let Some(providers) = &props.identity_providers {
        if let Some(aad) = providers
            .azure_active_directory
            .as_ref()
            .filter(|p| p.enabled.unwrap_or(true))
        {
            let registration = aad.registration.clone().unwrap_or_default();
            result.active_directory_v2 = vec![AadAuthV2Settings {
                client_id: registration.client_id.unwrap_or_default(),
                tenant_auth_endpoint: registration.open_id_issuer.unwrap_or_default(),
                client_secret_setting_name: registration
                    .client_secret_setting_name
                    .unwrap_or_default(),
                allowed_audiences: aad
                    .validation
                    .as_ref()
                    .and_then(|v| v.allowed_audiences.clone())
                    .unwrap_or_default(),
            }];
        }

        if let Some(gh) = providers.github.as_ref().filter(|p| p.enabled.unwrap_or(true)) {
            let registration = gh.registration.clone().unwrap_or_default();
            result.github_v2 = vec![GithubAuthV2Settings {
                client_id: registration.client_id.unwrap_or_default(),
                client_secret_setting_name: registration
                    .client_secret_setting_name
                    .unwrap_or_default(),
                login_scopes: gh
                    .login
                    .as_ref()
                    .and_then(|l| l.scopes.clone())
                    .unwrap_or_default(),
            }];
        }
    }

    vec![result]
}
