//! Provider configuration
//!
//! Every attribute of the provider block falls back to an `ARM_*`
//! environment variable when it is not set in configuration.

use crate::api::{ClientSecretCredential, Credential};
use tfplug::types::{AttributePath, DynamicValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloudEnvironment {
    #[default]
    Public,
    UsGovernment,
    China,
}

impl CloudEnvironment {
    pub fn parse(name: &str) -> Result<Self, String> {
        match name.to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "usgovernment" => Ok(Self::UsGovernment),
            "china" => Ok(Self::China),
            other => Err(format!(
                "unknown environment {:?}, expected one of public, usgovernment, china",
                other
            )),
        }
    }

    pub fn resource_manager_endpoint(&self) -> &'static str {
        match self {
            Self::Public => "https://management.azure.com",
            Self::UsGovernment => "https://management.usgovcloudapi.net",
            Self::China => "https://management.chinacloudapi.cn",
        }
    }

    pub fn authority_host(&self) -> &'static str {
        match self {
            Self::Public => "https://login.microsoftonline.com",
            Self::UsGovernment => "https://login.microsoftonline.us",
            Self::China => "https://login.chinacloudapi.cn",
        }
    }

    /// Storage endpoint suffix used in Function App connection strings
    pub fn storage_endpoint_suffix(&self) -> &'static str {
        match self {
            Self::Public => "core.windows.net",
            Self::UsGovernment => "core.usgovcloudapi.net",
            Self::China => "core.chinacloudapi.cn",
        }
    }
}

/// Resolved provider configuration
#[derive(Debug)]
pub struct ProviderConfig {
    pub subscription_id: String,
    pub environment: CloudEnvironment,
    pub resource_manager_endpoint: String,
    pub credential: Credential,
}

fn setting(config: &DynamicValue, attribute: &str, env_var: &str) -> Option<String> {
    config
        .get_optional_string(&AttributePath::new(attribute))
        .ok()
        .flatten()
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|v| !v.is_empty()))
}

fn required_error(attribute: &str, env_var: &str) -> String {
    format!(
        "{} is required (set in provider config or {} env var)",
        attribute, env_var
    )
}

impl ProviderConfig {
    /// Resolve the provider block, collecting every problem rather than
    /// stopping at the first
    pub fn from_config(config: &DynamicValue) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();

        let subscription_id = setting(config, "subscription_id", "ARM_SUBSCRIPTION_ID");
        if subscription_id.is_none() {
            errors.push(required_error("subscription_id", "ARM_SUBSCRIPTION_ID"));
        }

        let environment = match setting(config, "environment", "ARM_ENVIRONMENT") {
            Some(name) => CloudEnvironment::parse(&name).unwrap_or_else(|e| {
                errors.push(e);
                CloudEnvironment::Public
            }),
            None => CloudEnvironment::Public,
        };

        let resource_manager_endpoint = setting(
            config,
            "resource_manager_endpoint",
            "ARM_RESOURCE_MANAGER_ENDPOINT",
        )
        .unwrap_or_else(|| environment.resource_manager_endpoint().to_string());

        let credential = match setting(config, "access_token", "ARM_ACCESS_TOKEN") {
            Some(token) => Some(Credential::AccessToken(token)),
            None => {
                let tenant_id = setting(config, "tenant_id", "ARM_TENANT_ID");
                let client_id = setting(config, "client_id", "ARM_CLIENT_ID");
                let client_secret = setting(config, "client_secret", "ARM_CLIENT_SECRET");
                match (tenant_id, client_id, client_secret) {
                    (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                        Some(Credential::ClientSecret(ClientSecretCredential::new(
                            environment.authority_host(),
                            &tenant_id,
                            &client_id,
                            &client_secret,
                            &resource_manager_endpoint,
                        )))
                    }
                    (tenant_id, client_id, client_secret) => {
                        if tenant_id.is_none() {
                            errors.push(required_error("tenant_id", "ARM_TENANT_ID"));
                        }
                        if client_id.is_none() {
                            errors.push(required_error("client_id", "ARM_CLIENT_ID"));
                        }
                        if client_secret.is_none() {
                            errors.push(required_error("client_secret", "ARM_CLIENT_SECRET"));
                        }
                        None
                    }
                }
            }
        };

        match (subscription_id, credential) {
            (Some(subscription_id), Some(credential)) if errors.is_empty() => Ok(Self {
                subscription_id,
                environment,
                resource_manager_endpoint,
                credential,
            }),
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "ARM_SUBSCRIPTION_ID",
        "ARM_TENANT_ID",
        "ARM_CLIENT_ID",
        "ARM_CLIENT_SECRET",
        "ARM_ACCESS_TOKEN",
        "ARM_ENVIRONMENT",
        "ARM_RESOURCE_MANAGER_ENDPOINT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    fn config(pairs: &[(&str, &str)]) -> DynamicValue {
        let mut config = DynamicValue::object();
        for (k, v) in pairs {
            config
                .set_string(&AttributePath::new(k), v.to_string())
                .unwrap();
        }
        config
    }

    #[test]
    #[serial]
    fn config_values_take_precedence_over_env() {
        clear_env();
        std::env::set_var("ARM_SUBSCRIPTION_ID", "from-env");

        let resolved = ProviderConfig::from_config(&config(&[
            ("subscription_id", "from-config"),
            ("access_token", "token"),
        ]))
        .unwrap();

        assert_eq!(resolved.subscription_id, "from-config");
        assert!(matches!(resolved.credential, Credential::AccessToken(_)));
        assert_eq!(
            resolved.resource_manager_endpoint,
            "https://management.azure.com"
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn env_vars_fill_missing_values() {
        clear_env();
        std::env::set_var("ARM_SUBSCRIPTION_ID", "sub");
        std::env::set_var("ARM_TENANT_ID", "tenant");
        std::env::set_var("ARM_CLIENT_ID", "client");
        std::env::set_var("ARM_CLIENT_SECRET", "secret");
        std::env::set_var("ARM_ENVIRONMENT", "china");

        let resolved = ProviderConfig::from_config(&DynamicValue::object()).unwrap();
        assert_eq!(resolved.subscription_id, "sub");
        assert_eq!(resolved.environment, CloudEnvironment::China);
        assert_eq!(
            resolved.resource_manager_endpoint,
            "https://management.chinacloudapi.cn"
        );
        assert!(matches!(resolved.credential, Credential::ClientSecret(_)));
        clear_env();
    }

    #[test]
    #[serial]
    fn missing_credentials_name_env_vars() {
        clear_env();
        let errors =
            ProviderConfig::from_config(&config(&[("subscription_id", "sub")])).unwrap_err();

        assert!(errors.contains(
            &"tenant_id is required (set in provider config or ARM_TENANT_ID env var)".to_string()
        ));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    #[serial]
    fn unknown_environment_is_rejected() {
        clear_env();
        let errors = ProviderConfig::from_config(&config(&[
            ("subscription_id", "sub"),
            ("access_token", "t"),
            ("environment", "mars"),
        ]))
        .unwrap_err();
        assert!(errors[0].contains("unknown environment"));
    }

    #[test]
    fn storage_suffix_follows_environment() {
        assert_eq!(
            CloudEnvironment::UsGovernment.storage_endpoint_suffix(),
            "core.usgovcloudapi.net"
        );
    }
}
