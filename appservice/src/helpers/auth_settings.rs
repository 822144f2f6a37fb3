//! `auth_settings`: App Service authentication (v1)

use super::non_empty;
use crate::api::sites::{SiteAuthSettings, SiteAuthSettingsProperties};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tfplug::defaults::StaticDefault;
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder};
use tfplug::validator::StringOneOf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub enabled: bool,
    pub additional_login_parameters: HashMap<String, String>,
    pub allowed_external_redirect_urls: Vec<String>,
    pub default_provider: String,
    pub issuer: String,
    pub runtime_version: String,
    pub token_refresh_extension_hours: f64,
    pub token_store_enabled: bool,
    pub unauthenticated_client_action: String,
    pub active_directory: Vec<AadAuthSettings>,
    pub facebook: Vec<FacebookAuthSettings>,
    pub github: Vec<OAuthClientSettings>,
    pub google: Vec<OAuthClientSettings>,
    pub microsoft: Vec<OAuthClientSettings>,
    pub twitter: Vec<TwitterAuthSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AadAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub client_secret_setting_name: String,
    pub allowed_audiences: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacebookAuthSettings {
    pub app_id: String,
    pub app_secret: String,
    pub app_secret_setting_name: String,
    pub oauth_scopes: Vec<String>,
}

/// GitHub, Google and Microsoft share one block shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthClientSettings {
    pub client_id: String,
    pub client_secret: String,
    pub client_secret_setting_name: String,
    pub oauth_scopes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterAuthSettings {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub consumer_secret_setting_name: String,
}

fn string_list() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::String))
}

fn secret_pair(block: NestedBlockBuilder, id: &str, secret: &str) -> NestedBlockBuilder {
    block
        .attribute(AttributeBuilder::new(id, AttributeType::String).required().build())
        .attribute(
            AttributeBuilder::new(secret, AttributeType::String)
                .optional()
                .sensitive()
                .build(),
        )
        .attribute(
            AttributeBuilder::new(&format!("{}_setting_name", secret), AttributeType::String)
                .optional()
                .build(),
        )
}

fn oauth_client_schema(name: &str) -> NestedBlock {
    secret_pair(
        NestedBlockBuilder::list(name).max_items(1),
        "client_id",
        "client_secret",
    )
    .attribute(AttributeBuilder::new("oauth_scopes", string_list()).optional().build())
    .build()
}

pub fn schema() -> NestedBlock {
    NestedBlockBuilder::list("auth_settings")
        .max_items(1)
        .description("Authentication settings (v1)")
        .attribute(
            AttributeBuilder::new("enabled", AttributeType::Bool)
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new(
                "additional_login_parameters",
                AttributeType::Map(Box::new(AttributeType::String)),
            )
            .description("Login parameters sent to the OpenID Connect authorization endpoint")
            .optional()
            .build(),
        )
        .attribute(
            AttributeBuilder::new("allowed_external_redirect_urls", string_list())
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("default_provider", AttributeType::String)
                .optional()
                .validator(StringOneOf::create(&[
                    "AzureActiveDirectory",
                    "Facebook",
                    "Google",
                    "MicrosoftAccount",
                    "Twitter",
                    "Github",
                ]))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("issuer", AttributeType::String)
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("runtime_version", AttributeType::String)
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("token_refresh_extension_hours", AttributeType::Number)
                .optional()
                .default(StaticDefault::number(72.0))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("token_store_enabled", AttributeType::Bool)
                .optional()
                .default(StaticDefault::bool(false))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("unauthenticated_client_action", AttributeType::String)
                .optional()
                .computed()
                .validator(StringOneOf::create(&["AllowAnonymous", "RedirectToLoginPage"]))
                .build(),
        )
        .block(
            secret_pair(
                NestedBlockBuilder::list("active_directory").max_items(1),
                "client_id",
                "client_secret",
            )
            .attribute(
                AttributeBuilder::new("allowed_audiences", string_list())
                    .optional()
                    .build(),
            )
            .build(),
        )
        .block(
            secret_pair(
                NestedBlockBuilder::list("facebook").max_items(1),
                "app_id",
                "app_secret",
            )
            .attribute(AttributeBuilder::new("oauth_scopes", string_list()).optional().build())
            .build(),
        )
        .block(oauth_client_schema("github"))
        .block(oauth_client_schema("google"))
        .block(oauth_client_schema("microsoft"))
        .block(
            secret_pair(
                NestedBlockBuilder::list("twitter").max_items(1),
                "consumer_key",
                "consumer_secret",
            )
            .build(),
        )
        .build()
}

/// Body for `PUT config/authsettings`. A removed block disables
/// authentication instead of leaving the previous settings in place.
pub fn expand(input: &[AuthSettings]) -> SiteAuthSettings {
    let Some(auth) = input.first() else {
        return SiteAuthSettings {
            properties: SiteAuthSettingsProperties {
                enabled: Some(false),
                ..Default::default()
            },
        };
    };

    let mut params: Vec<String> = auth
        .additional_login_parameters
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    params.sort();

    let mut props = SiteAuthSettingsProperties {
        enabled: Some(auth.enabled),
        additional_login_params: (!params.is_empty()).then_some(params),
        allowed_external_redirect_urls: Some(auth.allowed_external_redirect_urls.clone()),
        default_provider: non_empty(&auth.default_provider),
        issuer: non_empty(&auth.issuer),
        runtime_version: non_empty(&auth.runtime_version),
        token_store_enabled: Some(auth.token_store_enabled),
        token_refresh_extension_hours: Some(auth.token_refresh_extension_hours),
        unauthenticated_client_action: non_empty(&auth.unauthenticated_client_action),
        ..Default::default()
    };

    if let Some(aad) = auth.active_directory.first() {
        props.client_id = Some(aad.client_id.clone());
        props.client_secret = non_empty(&aad.client_secret);
        props.client_secret_setting_name = non_empty(&aad.client_secret_setting_name);
        props.allowed_audiences = Some(aad.allowed_audiences.clone());
    }

    if let Some(fb) = auth.facebook.first() {
        props.facebook_app_id = Some(fb.app_id.clone());
        props.facebook_app_secret = non_empty(&fb.app_secret);
        props.facebook_app_secret_setting_name = non_empty(&fb.app_secret_setting_name);
        props.facebook_oauth_scopes = Some(fb.oauth_scopes.clone());
    }

    if let Some(gh) = auth.github.first() {
        props.git_hub_client_id = Some(gh.client_id.clone());
        props.git_hub_client_secret = non_empty(&gh.client_secret);
        props.git_hub_client_secret_setting_name = non_empty(&gh.client_secret_setting_name);
        props.git_hub_oauth_scopes = Some(gh.oauth_scopes.clone());
    }

    if let Some(g) = auth.google.first() {
        props.google_client_id = Some(g.client_id.clone());
        props.google_client_secret = non_empty(&g.client_secret);
        props.google_client_secret_setting_name = non_empty(&g.client_secret_setting_name);
        props.google_oauth_scopes = Some(g.oauth_scopes.clone());
    }

    if let Some(m) = auth.microsoft.first() {
        props.microsoft_account_client_id = Some(m.client_id.clone());
        props.microsoft_account_client_secret = non_empty(&m.client_secret);
        props.microsoft_account_client_secret_setting_name =
            non_empty(&m.client_secret_setting_name);
        props.microsoft_account_oauth_scopes = Some(m.oauth_scopes.clone());
    }

    if let Some(t) = auth.twitter.first() {
        props.twitter_consumer_key = Some(t.consumer_key.clone());
        props.twitter_consumer_secret = non_empty(&t.consumer_secret);
        props.twitter_consumer_secret_setting_name = non_empty(&t.consumer_secret_setting_name);
    }

    SiteAuthSettings { properties: props }
}

/// Only enabled v1 settings map back to the block
pub fn flatten(input: Option<&SiteAuthSettings>) -> Vec<AuthSettings> {
    let Some(props) = input.map(|a| &a.properties) else {
        return Vec::new();
    };
    let is_v1 = props
        .config_version
        .as_deref()
        .is_some_and(|v| v.eq_ignore_ascii_case("v1"));
    if !props.enabled.unwrap_or(false) || !is_v1 {
        return Vec::new();
    }

    let additional_login_parameters = props
        .additional_login_params
        .iter()
        .flatten()
        .filter_map(|p| {
            let parts: Vec<&str> = p.split('=').collect();
            match parts.as_slice() {
                [k, v] => Some((k.to_string(), v.to_string())),
                _ => None,
            }
        })
        .collect();

    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let list = |v: &Option<Vec<String>>| v.clone().unwrap_or_default();

    let mut result = AuthSettings {
        enabled: true,
        additional_login_parameters,
        allowed_external_redirect_urls: list(&props.allowed_external_redirect_urls),
        default_provider: text(&props.default_provider),
        issuer: text(&props.issuer),
        runtime_version: text(&props.runtime_version),
        token_refresh_extension_hours: props.token_refresh_extension_hours.unwrap_or_default(),
        token_store_enabled: props.token_store_enabled.unwrap_or(false),
        unauthenticated_client_action: text(&props.unauthenticated_client_action),
        ..Default::default()
    };

    if let Some(client_id) = props.client_id.as_deref().and_then(non_empty) {
        result.active_directory = vec![AadAuthSettings {
            client_id,
            client_secret: text(&props.client_secret),
            client_secret_setting_name: text(&props.client_secret_setting_name),
            allowed_audiences: list(&props.allowed_audiences),
        }];
    }

    if let Some(app_id) = props.facebook_app_id.as_deref().and_then(non_empty) {
        result.facebook = vec![FacebookAuthSettings {
            app_id,
            app_secret: text(&props.facebook_app_secret),
            app_secret_setting_name: text(&props.facebook_app_secret_setting_name),
            oauth_scopes: list(&props.facebook_oauth_scopes),
        }];
    }

    if let Some(client_id) = props.git_hub_client_id.as_deref().and_then(non_empty) {
        result.github = vec![OAuthClientSettings {
            client_id,
            client_secret: text(&props.git_hub_client_secret),
            client_secret_setting_name: text(&props.git_hub_client_secret_setting_name),
            oauth_scopes: list(&props.git_hub_oauth_scopes),
        }];
    }

    if let Some(client_id) = props.google_client_id.as_deref().and_then(non_empty) {
        result.google = vec![OAuthClientSettings {
            client_id,
            client_secret: text(&props.google_client_secret),
            client_secret_setting_name: text(&props.google_client_secret_setting_name),
            oauth_scopes: list(&props.google_oauth_scopes),
        }];
    }

    if let Some(client_id) = props.microsoft_account_client_id.as_deref().and_then(non_empty) {
        result.microsoft = vec![OAuthClientSettings {
            client_id,
            client_secret: text(&props.microsoft_account_client_secret),
            client_secret_setting_name: text(&props.microsoft_account_client_secret_setting_name),
            oauth_scopes: list(&props.microsoft_account_oauth_scopes),
        }];
    }

    if let Some(consumer_key) = props.twitter_consumer_key.as_deref().and_then(non_empty) {
        result.twitter = vec![TwitterAuthSettings {
            consumer_key,
            consumer_secret: text(&props.twitter_consumer_secret),
            consumer_secret_setting_name: text(&props.twitter_consumer_secret_setting_name),
        }];
    }

    vec![result]
}

/// Secrets are write-only in practice; keep the configured ones when the
/// service answers without them
pub fn preserve_secrets(flattened: &mut [AuthSettings], prior: &[AuthSettings]) {
    let (Some(current), Some(prior)) = (flattened.first_mut(), prior.first()) else {
        return;
    };

    fn keep(current: &mut String, prior: &str) {
        if current.is_empty() {
            *current = prior.to_string();
        }
    }

    if let (Some(c), Some(p)) = (current.active_directory.first_mut(), prior.active_directory.first()) {
        keep(&mut c.client_secret, &p.client_secret);
    }
    if let (Some(c), Some(p)) = (current.facebook.first_mut(), prior.facebook.first()) {
        keep(&mut c.app_secret, &p.app_secret);
    }
    for (current, prior) in [
        (&mut current.github, &prior.github),
        (&mut current.google, &prior.google),
        (&mut current.microsoft, &prior.microsoft),
    ] {
        if let (Some(c), Some(p)) = (current.first_mut(), prior.first()) {
            keep(&mut c.client_secret, &p.client_secret);
        }
    }
    if let (Some(c), Some(p)) = (current.twitter.first_mut(), prior.twitter.first()) {
        keep(&mut c.consumer_secret, &p.consumer_secret);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_settings() -> AuthSettings {
        AuthSettings {
            enabled: true,
            additional_login_parameters: HashMap::from([(
                "response_type".to_string(),
                "code id_token".to_string(),
            )]),
            default_provider: "AzureActiveDirectory".to_string(),
            token_refresh_extension_hours: 72.0,
            active_directory: vec![AadAuthSettings {
                client_id: "aad-client".to_string(),
                client_secret: "s3cret".to_string(),
                allowed_audiences: vec!["api://app".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn removed_block_disables_auth() {
        assert_eq!(expand(&[]).properties.enabled, Some(false));
    }

    #[test]
    fn login_parameters_expand_to_pairs() {
        let expanded = expand(&[enabled_settings()]);
        assert_eq!(
            expanded.properties.additional_login_params,
            Some(vec!["response_type=code id_token".to_string()])
        );
        assert_eq!(expanded.properties.client_id.as_deref(), Some("aad-client"));
        assert!(expanded.properties.facebook_app_id.is_none());
    }

    #[test]
    fn flatten_requires_enabled_v1() {
        let mut api = expand(&[enabled_settings()]);
        assert!(flatten(Some(&api)).is_empty());

        api.properties.config_version = Some("v2".to_string());
        assert!(flatten(Some(&api)).is_empty());

        api.properties.config_version = Some("v1".to_string());
        api.properties.additional_login_params =
            Some(vec!["a=b".to_string(), "malformed".to_string()]);
        let flat = flatten(Some(&api));
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].additional_login_parameters.len(), 1);
        assert_eq!(flat[0].active_directory[0].client_id, "aad-client");
    }

    #[test]
    fn secrets_are_kept_from_prior_state() {
        let mut api = expand(&[enabled_settings()]);
        api.properties.config_version = Some("v1".to_string());
        api.properties.client_secret = None;

        let mut flat = flatten(Some(&api));
        preserve_secrets(&mut flat, &[enabled_settings()]);
        assert_eq!(flat[0].active_directory[0].client_secret, "s3cret");
    }
}
