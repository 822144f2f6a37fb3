//! `site_config` for Linux and Windows Web Apps and their slots
//!
//! [`SiteConfigCommon`] holds the fields every site flavour shares, Function
//! Apps included; the Web App configs add the runtime stack on top of it.
//!
//! Create-time expansion only sends what is configured. Update-time
//! expansion starts from the site's current configuration and writes every
//! configured field, empty values included, so that removing a value from
//! configuration clears it on the site.

use super::app_settings::{
    self, DOCKER_REGISTRY_SERVER_PASSWORD, DOCKER_REGISTRY_SERVER_URL,
    DOCKER_REGISTRY_SERVER_USERNAME, HEALTH_CHECK_MAX_PING_FAILURES,
};
use super::cors::{self, CorsSetting};
use super::fx_version;
use super::ip_restrictions::{self, IpRestriction};
use super::ExpandError;
use crate::api::sites::{ApiDefinitionInfo, ApiManagementConfig, SiteConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tfplug::defaults::StaticDefault;
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder};
use tfplug::validator::{NumberBetween, StringOneOf};

pub const NODE_DEFAULT_VERSION: &str = "WEBSITE_NODE_DEFAULT_VERSION";
pub const CURRENT_STACK: &str = "CURRENT_STACK";

const PHP_VERSION_OFF: &str = "Off";
const CURRENT_STACK_DOTNET_CORE: &str = "dotnetcore";
const JAVA_CONTAINER_EMBEDDED: &str = "JAVA";
const JAVA_CONTAINER_EMBEDDED_VERSION: &str = "SE";
const JAVA_CONTAINER_TOMCAT: &str = "TOMCAT";

const LOAD_BALANCING_MODES: &[&str] = &[
    "LeastRequests",
    "WeightedRoundRobin",
    "LeastResponseTime",
    "WeightedTotalTraffic",
    "RequestHash",
    "PerSiteRoundRobin",
];
const TLS_VERSIONS: &[&str] = &["1.0", "1.1", "1.2", "1.3"];
const FTPS_STATES: &[&str] = &["AllAllowed", "FtpsOnly", "Disabled"];
const DEFAULT_ACTIONS: &[&str] = &["Allow", "Deny"];
const REMOTE_DEBUGGING_VERSIONS: &[&str] = &["VS2017", "VS2019", "VS2022"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfigCommon {
    pub always_on: bool,
    pub api_management_api_id: String,
    pub api_definition_url: String,
    pub app_command_line: String,
    pub container_registry_use_managed_identity: bool,
    pub container_registry_managed_identity_client_id: String,
    pub default_documents: Vec<String>,
    pub http2_enabled: bool,
    pub ip_restriction: Vec<IpRestriction>,
    pub ip_restriction_default_action: String,
    pub scm_use_main_ip_restriction: bool,
    pub scm_ip_restriction: Vec<IpRestriction>,
    pub scm_ip_restriction_default_action: String,
    pub load_balancing_mode: String,
    pub managed_pipeline_mode: String,
    pub remote_debugging_enabled: bool,
    pub remote_debugging_version: String,
    pub scm_type: String,
    pub use_32_bit_worker: bool,
    pub websockets_enabled: bool,
    pub ftps_state: String,
    pub health_check_path: String,
    pub health_check_eviction_time_in_min: i64,
    pub worker_count: i64,
    pub minimum_tls_version: String,
    pub scm_minimum_tls_version: String,
    pub cors: Vec<CorsSetting>,
    pub detailed_error_logging_enabled: bool,
    pub vnet_route_all_enabled: bool,
}

impl Default for SiteConfigCommon {
    fn default() -> Self {
        Self {
            always_on: false,
            api_management_api_id: String::new(),
            api_definition_url: String::new(),
            app_command_line: String::new(),
            container_registry_use_managed_identity: false,
            container_registry_managed_identity_client_id: String::new(),
            default_documents: Vec::new(),
            http2_enabled: false,
            ip_restriction: Vec::new(),
            ip_restriction_default_action: "Allow".to_string(),
            scm_use_main_ip_restriction: false,
            scm_ip_restriction: Vec::new(),
            scm_ip_restriction_default_action: "Allow".to_string(),
            load_balancing_mode: "LeastRequests".to_string(),
            managed_pipeline_mode: "Integrated".to_string(),
            remote_debugging_enabled: false,
            remote_debugging_version: String::new(),
            scm_type: String::new(),
            use_32_bit_worker: true,
            websockets_enabled: false,
            ftps_state: "Disabled".to_string(),
            health_check_path: String::new(),
            health_check_eviction_time_in_min: 0,
            worker_count: 0,
            minimum_tls_version: "1.2".to_string(),
            scm_minimum_tls_version: "1.2".to_string(),
            cors: Vec::new(),
            detailed_error_logging_enabled: false,
            vnet_route_all_enabled: false,
        }
    }
}

// Create sends only configured strings; update sends them even when empty
fn configured(value: &str, update: bool) -> Option<String> {
    if update || !value.is_empty() {
        Some(value.to_string())
    } else {
        None
    }
}

impl SiteConfigCommon {
    pub(crate) fn apply(&self, target: &mut SiteConfig, update: bool) -> Result<(), ExpandError> {
        target.always_on = Some(self.always_on);
        target.acr_use_managed_identity_creds = Some(self.container_registry_use_managed_identity);
        target.http20_enabled = Some(self.http2_enabled);
        target.scm_ip_security_restrictions_use_main = Some(self.scm_use_main_ip_restriction);
        target.remote_debugging_enabled = Some(self.remote_debugging_enabled);
        target.use_32_bit_worker_process = Some(self.use_32_bit_worker);
        target.web_sockets_enabled = Some(self.websockets_enabled);
        target.vnet_route_all_enabled = Some(self.vnet_route_all_enabled);

        target.load_balancing = Some(self.load_balancing_mode.clone());
        target.managed_pipeline_mode = Some(self.managed_pipeline_mode.clone());
        target.ftps_state = Some(self.ftps_state.clone());
        target.min_tls_version = Some(self.minimum_tls_version.clone());
        target.scm_min_tls_version = Some(self.scm_minimum_tls_version.clone());
        target.ip_security_restrictions_default_action =
            Some(self.ip_restriction_default_action.clone());
        target.scm_ip_security_restrictions_default_action =
            Some(self.scm_ip_restriction_default_action.clone());

        if let Some(id) = configured(&self.api_management_api_id, update) {
            target.api_management_config = Some(ApiManagementConfig { id: Some(id) });
        }
        if let Some(url) = configured(&self.api_definition_url, update) {
            target.api_definition = Some(ApiDefinitionInfo { url: Some(url) });
        }
        if let Some(command) = configured(&self.app_command_line, update) {
            target.app_command_line = Some(command);
        }
        if let Some(client_id) =
            configured(&self.container_registry_managed_identity_client_id, update)
        {
            target.acr_user_managed_identity_id = Some(client_id);
        }
        if let Some(path) = configured(&self.health_check_path, update) {
            target.health_check_path = Some(path);
        }
        if !self.remote_debugging_version.is_empty() {
            target.remote_debugging_version = Some(self.remote_debugging_version.clone());
        }
        if self.worker_count != 0 {
            target.number_of_workers = Some(self.worker_count);
        }

        if update || !self.default_documents.is_empty() {
            target.default_documents = Some(self.default_documents.clone());
        }
        if update || !self.ip_restriction.is_empty() {
            target.ip_security_restrictions = Some(ip_restrictions::expand(&self.ip_restriction)?);
        }
        if update || !self.scm_ip_restriction.is_empty() {
            target.scm_ip_security_restrictions =
                Some(ip_restrictions::expand(&self.scm_ip_restriction)?);
        }
        if update || !self.cors.is_empty() {
            target.cors = Some(cors::expand(&self.cors));
        }

        Ok(())
    }

    pub(crate) fn flatten(config: &SiteConfig) -> Self {
        Self {
            always_on: config.always_on.unwrap_or(false),
            api_management_api_id: config
                .api_management_config
                .as_ref()
                .and_then(|c| c.id.clone())
                .unwrap_or_default(),
            api_definition_url: config
                .api_definition
                .as_ref()
                .and_then(|d| d.url.clone())
                .unwrap_or_default(),
            app_command_line: config.app_command_line.clone().unwrap_or_default(),
            container_registry_use_managed_identity: config
                .acr_use_managed_identity_creds
                .unwrap_or(false),
            container_registry_managed_identity_client_id: config
                .acr_user_managed_identity_id
                .clone()
                .unwrap_or_default(),
            default_documents: config.default_documents.clone().unwrap_or_default(),
            http2_enabled: config.http20_enabled.unwrap_or(false),
            ip_restriction: ip_restrictions::flatten(config.ip_security_restrictions.as_ref()),
            ip_restriction_default_action: config
                .ip_security_restrictions_default_action
                .clone()
                .unwrap_or_default(),
            scm_use_main_ip_restriction: config
                .scm_ip_security_restrictions_use_main
                .unwrap_or(false),
            scm_ip_restriction: ip_restrictions::flatten(
                config.scm_ip_security_restrictions.as_ref(),
            ),
            scm_ip_restriction_default_action: config
                .scm_ip_security_restrictions_default_action
                .clone()
                .unwrap_or_default(),
            load_balancing_mode: config.load_balancing.clone().unwrap_or_default(),
            managed_pipeline_mode: config.managed_pipeline_mode.clone().unwrap_or_default(),
            remote_debugging_enabled: config.remote_debugging_enabled.unwrap_or(false),
            remote_debugging_version: config
                .remote_debugging_version
                .as_deref()
                .unwrap_or_default()
                .to_uppercase(),
            scm_type: config.scm_type.clone().unwrap_or_default(),
            use_32_bit_worker: config.use_32_bit_worker_process.unwrap_or(false),
            websockets_enabled: config.web_sockets_enabled.unwrap_or(false),
            ftps_state: config.ftps_state.clone().unwrap_or_default(),
            health_check_path: config.health_check_path.clone().unwrap_or_default(),
            health_check_eviction_time_in_min: 0,
            worker_count: config.number_of_workers.unwrap_or(0),
            minimum_tls_version: config.min_tls_version.clone().unwrap_or_default(),
            scm_minimum_tls_version: config.scm_min_tls_version.clone().unwrap_or_default(),
            cors: cors::flatten(config.cors.as_ref()),
            detailed_error_logging_enabled: config.detailed_error_logging_enabled.unwrap_or(false),
            vnet_route_all_enabled: config.vnet_route_all_enabled.unwrap_or(false),
        }
    }

    /// Health check eviction time travels as an app setting
    fn apply_health_check_setting(&self, settings: &mut HashMap<String, String>) {
        if self.health_check_eviction_time_in_min != 0 {
            settings.insert(
                HEALTH_CHECK_MAX_PING_FAILURES.to_string(),
                self.health_check_eviction_time_in_min.to_string(),
            );
        } else {
            settings.remove(HEALTH_CHECK_MAX_PING_FAILURES);
        }
    }

    pub fn set_health_check_eviction_time(&mut self, settings: &HashMap<String, String>) {
        self.health_check_eviction_time_in_min = app_settings::health_check_eviction_time(settings);
    }
}

fn optional_string(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description(description)
        .optional()
        .build()
}

fn optional_bool(name: &str, default: bool) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Bool)
        .optional()
        .default(StaticDefault::bool(default))
        .build()
}

fn one_of(name: &str, default: &str, allowed: &[&str]) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .optional()
        .default(StaticDefault::string(default))
        .validator(StringOneOf::create(allowed))
        .build()
}

/// Attributes shared by every `site_config` except `always_on`, whose
/// default depends on the site flavour
pub(crate) fn common_attributes() -> Vec<Attribute> {
    vec![
        optional_string("api_management_api_id", "The API Management API ID"),
        optional_string("api_definition_url", "URL of the API definition"),
        optional_string("app_command_line", "The App command line to launch"),
        optional_bool("container_registry_use_managed_identity", false),
        optional_string(
            "container_registry_managed_identity_client_id",
            "Client ID of the identity used to pull images",
        ),
        AttributeBuilder::new("default_documents", AttributeType::List(Box::new(AttributeType::String)))
            .optional()
            .computed()
            .build(),
        optional_bool("http2_enabled", false),
        one_of("ip_restriction_default_action", "Allow", DEFAULT_ACTIONS),
        optional_bool("scm_use_main_ip_restriction", false),
        one_of("scm_ip_restriction_default_action", "Allow", DEFAULT_ACTIONS),
        one_of("load_balancing_mode", "LeastRequests", LOAD_BALANCING_MODES),
        one_of("managed_pipeline_mode", "Integrated", &["Integrated", "Classic"]),
        optional_bool("remote_debugging_enabled", false),
        AttributeBuilder::new("remote_debugging_version", AttributeType::String)
            .optional()
            .computed()
            .validator(StringOneOf::create(REMOTE_DEBUGGING_VERSIONS))
            .build(),
        AttributeBuilder::new("scm_type", AttributeType::String)
            .computed()
            .build(),
        optional_bool("use_32_bit_worker", true),
        optional_bool("websockets_enabled", false),
        one_of("ftps_state", "Disabled", FTPS_STATES),
        optional_string("health_check_path", "The path to the health check endpoint"),
        AttributeBuilder::new("health_check_eviction_time_in_min", AttributeType::Number)
            .description("Minutes a node may be unhealthy before it is removed from the load balancer")
            .optional()
            .validator(NumberBetween::create(2.0, 10.0))
            .build(),
        AttributeBuilder::new("worker_count", AttributeType::Number)
            .optional()
            .computed()
            .validator(NumberBetween::create(1.0, 100.0))
            .build(),
        one_of("minimum_tls_version", "1.2", TLS_VERSIONS),
        one_of("scm_minimum_tls_version", "1.2", TLS_VERSIONS),
        AttributeBuilder::new("detailed_error_logging_enabled", AttributeType::Bool)
            .computed()
            .build(),
        optional_bool("vnet_route_all_enabled", false),
    ]
}

pub(crate) fn common_blocks() -> Vec<NestedBlock> {
    vec![
        ip_restrictions::schema("ip_restriction"),
        ip_restrictions::schema("scm_ip_restriction"),
        cors::schema(),
    ]
}

fn docker_registry_settings(
    settings: &mut HashMap<String, String>,
    url: &str,
    username: &str,
    password: &str,
) {
    settings.insert(DOCKER_REGISTRY_SERVER_URL.to_string(), url.to_string());
    settings.insert(DOCKER_REGISTRY_SERVER_USERNAME.to_string(), username.to_string());
    settings.insert(DOCKER_REGISTRY_SERVER_PASSWORD.to_string(), password.to_string());
}

fn docker_attributes() -> Vec<Attribute> {
    vec![
        optional_string("docker_image_name", "The docker image, including the tag"),
        optional_string("docker_registry_url", "The URL of the container registry"),
        optional_string("docker_registry_username", "The user name for the container registry"),
        AttributeBuilder::new("docker_registry_password", AttributeType::String)
            .description("The password for the container registry")
            .optional()
            .sensitive()
            .build(),
    ]
}

// ---- Linux ----

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinuxApplicationStack {
    pub docker_image_name: String,
    pub docker_registry_url: String,
    pub docker_registry_username: String,
    pub docker_registry_password: String,
    pub dotnet_version: String,
    pub go_version: String,
    pub java_server: String,
    pub java_server_version: String,
    pub java_version: String,
    pub node_version: String,
    pub php_version: String,
    pub python_version: String,
    pub ruby_version: String,
}

impl LinuxApplicationStack {
    fn fx_version(&self) -> Result<String, ExpandError> {
        let stacks = [
            (fx_version::DOTNET_CORE, &self.dotnet_version),
            (fx_version::GO, &self.go_version),
            (fx_version::NODE, &self.node_version),
            (fx_version::PHP, &self.php_version),
            (fx_version::PYTHON, &self.python_version),
            (fx_version::RUBY, &self.ruby_version),
        ];
        let configured = stacks.iter().filter(|(_, v)| !v.is_empty()).count()
            + usize::from(!self.java_server.is_empty())
            + usize::from(!self.docker_image_name.is_empty());
        if configured > 1 {
            return Err(ExpandError::new(
                "only one runtime may be set in `application_stack`",
            ));
        }

        if !self.docker_image_name.is_empty() {
            return Ok(fx_version::encode_docker(
                &self.docker_image_name,
                &self.docker_registry_url,
            ));
        }
        if !self.java_server.is_empty() {
            return fx_version::encode_java_linux(
                &self.java_version,
                &self.java_server,
                &self.java_server_version,
            );
        }
        Ok(stacks
            .iter()
            .find(|(_, v)| !v.is_empty())
            .map(|(stack, v)| fx_version::encode(stack, v))
            .unwrap_or_default())
    }

    fn decode(fx: &str) -> Self {
        let mut stack = Self::default();
        let Some((name, version)) = fx_version::decode(fx) else {
            return stack;
        };
        let version = version.to_string();
        match name.to_ascii_uppercase().as_str() {
            fx_version::DOTNET_CORE => stack.dotnet_version = version,
            fx_version::GO => stack.go_version = version,
            fx_version::NODE => stack.node_version = version,
            fx_version::PHP => stack.php_version = version,
            fx_version::PYTHON => stack.python_version = version,
            fx_version::RUBY => stack.ruby_version = version,
            server @ (fx_version::JAVA | fx_version::TOMCAT | fx_version::JBOSS_EAP) => {
                let (java_version, server_version) = fx_version::decode_java_linux(&version);
                stack.java_server = server.to_string();
                stack.java_server_version = server_version;
                stack.java_version = java_version;
            }
            _ => {}
        }
        stack
    }
}

fn linux_application_stack_schema() -> NestedBlock {
    NestedBlockBuilder::list("application_stack")
        .max_items(1)
        .attributes(docker_attributes())
        .attribute(
            AttributeBuilder::new("dotnet_version", AttributeType::String)
                .optional()
                .validator(StringOneOf::create(&["3.1", "5.0", "6.0", "7.0", "8.0"]))
                .build(),
        )
        .attribute(optional_string("go_version", "The Go version"))
        .attribute(
            AttributeBuilder::new("java_server", AttributeType::String)
                .optional()
                .validator(StringOneOf::create(fx_version::JAVA_SERVERS))
                .build(),
        )
        .attribute(optional_string("java_server_version", "The Java server version"))
        .attribute(optional_string("java_version", "The Java version"))
        .attribute(optional_string("node_version", "The Node.js version"))
        .attribute(optional_string("php_version", "The PHP version"))
        .attribute(optional_string("python_version", "The Python version"))
        .attribute(optional_string("ruby_version", "The Ruby version"))
        .build()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinuxWebSiteConfig {
    #[serde(flatten)]
    pub common: SiteConfigCommon,
    pub local_mysql_enabled: bool,
    pub application_stack: Vec<LinuxApplicationStack>,
    pub linux_fx_version: String,
}

impl Default for LinuxWebSiteConfig {
    fn default() -> Self {
        Self {
            common: SiteConfigCommon {
                always_on: true,
                ..Default::default()
            },
            local_mysql_enabled: false,
            application_stack: Vec::new(),
            linux_fx_version: String::new(),
        }
    }
}

pub fn linux_web_schema() -> NestedBlock {
    NestedBlockBuilder::list("site_config")
        .min_items(1)
        .max_items(1)
        .attribute(optional_bool("always_on", true))
        .attributes(common_attributes())
        .attribute(optional_bool("local_mysql_enabled", false))
        .attribute(
            AttributeBuilder::new("linux_fx_version", AttributeType::String)
                .computed()
                .build(),
        )
        .blocks(common_blocks())
        .block(linux_application_stack_schema())
        .build()
}

impl LinuxWebSiteConfig {
    pub fn expand_for_create(
        &self,
        app_settings: &HashMap<String, String>,
    ) -> Result<SiteConfig, ExpandError> {
        let mut expanded = SiteConfig::default();
        self.apply(&mut expanded, app_settings, false)?;
        Ok(expanded)
    }

    /// The full configuration to PUT, layered over what the site has now
    pub fn expand_for_update(
        &self,
        existing: &SiteConfig,
        app_settings: &HashMap<String, String>,
    ) -> Result<SiteConfig, ExpandError> {
        let mut expanded = existing.clone();
        self.apply(&mut expanded, app_settings, true)?;
        Ok(expanded)
    }

    fn apply(
        &self,
        target: &mut SiteConfig,
        app_settings: &HashMap<String, String>,
        update: bool,
    ) -> Result<(), ExpandError> {
        self.common.apply(target, update)?;
        target.local_my_sql_enabled = Some(self.local_mysql_enabled);

        let mut settings = app_settings.clone();
        match self.application_stack.first() {
            Some(stack) => {
                target.linux_fx_version = Some(stack.fx_version()?);
                if !stack.docker_image_name.is_empty() {
                    docker_registry_settings(
                        &mut settings,
                        &stack.docker_registry_url,
                        &stack.docker_registry_username,
                        &stack.docker_registry_password,
                    );
                }
            }
            None if update => target.linux_fx_version = Some(String::new()),
            None => {}
        }
        self.common.apply_health_check_setting(&mut settings);
        target.app_settings = app_settings::expand_for_create(&settings);
        Ok(())
    }

    /// Site configuration as reported by the service. `app_settings` is the
    /// unfiltered list, which carries the docker registry and health check
    /// values.
    pub fn flatten(config: &SiteConfig, app_settings: &HashMap<String, String>) -> Self {
        let mut flattened = Self {
            common: SiteConfigCommon::flatten(config),
            local_mysql_enabled: config.local_my_sql_enabled.unwrap_or(false),
            application_stack: Vec::new(),
            linux_fx_version: config.linux_fx_version.clone().unwrap_or_default(),
        };
        flattened.common.set_health_check_eviction_time(app_settings);

        if config.linux_fx_version.is_some() {
            flattened.application_stack =
                vec![LinuxApplicationStack::decode(&flattened.linux_fx_version)];
        }
        if flattened.linux_fx_version.starts_with(fx_version::DOCKER) {
            flattened.decode_docker_app_stack(app_settings);
        }
        flattened
    }

    fn decode_docker_app_stack(&mut self, app_settings: &HashMap<String, String>) {
        let mut stack = self.application_stack.first().cloned().unwrap_or_default();
        read_docker_settings(
            app_settings,
            &mut stack.docker_registry_url,
            &mut stack.docker_registry_username,
            &mut stack.docker_registry_password,
        );
        stack.docker_image_name =
            fx_version::decode_docker_image(&self.linux_fx_version, &stack.docker_registry_url);
        self.application_stack = vec![stack];
    }

    /// Values the API does not return are kept from prior state
    pub fn preserve_secrets(&mut self, prior: &Self) {
        if let (Some(stack), Some(prior)) = (
            self.application_stack.first_mut(),
            prior.application_stack.first(),
        ) {
            if stack.docker_registry_password.is_empty() {
                stack.docker_registry_password = prior.docker_registry_password.clone();
            }
        }
    }
}

fn read_docker_settings(
    app_settings: &HashMap<String, String>,
    url: &mut String,
    username: &mut String,
    password: &mut String,
) {
    for (key, field) in [
        (DOCKER_REGISTRY_SERVER_URL, url),
        (DOCKER_REGISTRY_SERVER_USERNAME, username),
        (DOCKER_REGISTRY_SERVER_PASSWORD, password),
    ] {
        if let Some(v) = app_settings.get(key) {
            *field = v.clone();
        }
    }
}

// ---- Windows ----

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowsApplicationStack {
    pub current_stack: String,
    pub docker_image_name: String,
    pub docker_registry_url: String,
    pub docker_registry_username: String,
    pub docker_registry_password: String,
    pub dotnet_version: String,
    pub dotnet_core_version: String,
    pub java_container: String,
    pub java_container_version: String,
    pub java_embedded_server_enabled: bool,
    pub java_version: String,
    pub node_version: String,
    pub php_version: String,
    pub python: bool,
    pub tomcat_version: String,
}

fn windows_application_stack_schema() -> NestedBlock {
    NestedBlockBuilder::list("application_stack")
        .max_items(1)
        .attribute(
            AttributeBuilder::new("current_stack", AttributeType::String)
                .optional()
                .computed()
                .validator(StringOneOf::create(&[
                    "dotnet",
                    "dotnetcore",
                    "node",
                    "python",
                    "php",
                    "java",
                ]))
                .build(),
        )
        .attributes(docker_attributes())
        .attribute(
            AttributeBuilder::new("dotnet_version", AttributeType::String)
                .optional()
                .computed()
                .validator(StringOneOf::create(&[
                    "v2.0", "v3.0", "v4.0", "v5.0", "v6.0", "v7.0", "v8.0",
                ]))
                .build(),
        )
        .attribute(optional_string("dotnet_core_version", "The .NET Core version"))
        .attribute(optional_string("java_container", "The Java container"))
        .attribute(optional_string(
            "java_container_version",
            "The version of the Java container",
        ))
        .attribute(optional_bool("java_embedded_server_enabled", false))
        .attribute(optional_string("java_version", "The Java version"))
        .attribute(optional_string("node_version", "The Node.js version"))
        .attribute(
            AttributeBuilder::new("php_version", AttributeType::String)
                .optional()
                .computed()
                .build(),
        )
        .attribute(optional_bool("python", false))
        .attribute(optional_string("tomcat_version", "The Tomcat version"))
        .build()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowsWebSiteConfig {
    #[serde(flatten)]
    pub common: SiteConfigCommon,
    pub local_mysql_enabled: bool,
    pub application_stack: Vec<WindowsApplicationStack>,
    pub windows_fx_version: String,
}

impl Default for WindowsWebSiteConfig {
    fn default() -> Self {
        Self {
            common: SiteConfigCommon {
                always_on: true,
                ..Default::default()
            },
            local_mysql_enabled: false,
            application_stack: Vec::new(),
            windows_fx_version: String::new(),
        }
    }
}

pub fn windows_web_schema() -> NestedBlock {
    NestedBlockBuilder::list("site_config")
        .min_items(1)
        .max_items(1)
        .attribute(optional_bool("always_on", true))
        .attributes(common_attributes())
        .attribute(optional_bool("local_mysql_enabled", false))
        .attribute(
            AttributeBuilder::new("windows_fx_version", AttributeType::String)
                .computed()
                .build(),
        )
        .blocks(common_blocks())
        .block(windows_application_stack_schema())
        .build()
}

impl WindowsWebSiteConfig {
    pub fn expand_for_create(
        &self,
        app_settings: &HashMap<String, String>,
    ) -> Result<SiteConfig, ExpandError> {
        let mut expanded = SiteConfig::default();
        self.apply(&mut expanded, app_settings, false)?;
        Ok(expanded)
    }

    pub fn expand_for_update(
        &self,
        existing: &SiteConfig,
        app_settings: &HashMap<String, String>,
    ) -> Result<SiteConfig, ExpandError> {
        let mut expanded = existing.clone();
        self.apply(&mut expanded, app_settings, true)?;
        Ok(expanded)
    }

    fn apply(
        &self,
        target: &mut SiteConfig,
        app_settings: &HashMap<String, String>,
        update: bool,
    ) -> Result<(), ExpandError> {
        self.common.apply(target, update)?;
        target.local_my_sql_enabled = Some(self.local_mysql_enabled);

        let mut settings = app_settings.clone();
        let Some(stack) = self.application_stack.first() else {
            target.windows_fx_version = Some(String::new());
            self.common.apply_health_check_setting(&mut settings);
            target.app_settings = app_settings::expand_for_create(&settings);
            return Ok(());
        };

        if !stack.node_version.is_empty() {
            settings.insert(NODE_DEFAULT_VERSION.to_string(), stack.node_version.clone());
        }
        if !stack.dotnet_version.is_empty() {
            target.net_framework_version = Some(stack.dotnet_version.clone());
        }
        if !stack.dotnet_core_version.is_empty() {
            target.net_framework_version = Some(stack.dotnet_core_version.clone());
        }
        if !stack.php_version.is_empty() {
            target.php_version = Some(if stack.php_version == PHP_VERSION_OFF {
                String::new()
            } else {
                stack.php_version.clone()
            });
        }
        if !stack.java_version.is_empty() {
            target.java_version = Some(stack.java_version.clone());
            let container = if stack.java_embedded_server_enabled {
                Some((JAVA_CONTAINER_EMBEDDED, JAVA_CONTAINER_EMBEDDED_VERSION))
            } else if !stack.tomcat_version.is_empty() {
                Some((JAVA_CONTAINER_TOMCAT, stack.tomcat_version.as_str()))
            } else if !stack.java_container.is_empty() {
                Some((
                    stack.java_container.as_str(),
                    stack.java_container_version.as_str(),
                ))
            } else {
                None
            };
            if let Some((container, version)) = container {
                target.java_container = Some(container.to_string());
                target.java_container_version = Some(version.to_string());
            }
        }
        if !stack.docker_image_name.is_empty() {
            target.windows_fx_version = Some(fx_version::encode_docker(
                &stack.docker_image_name,
                &stack.docker_registry_url,
            ));
            docker_registry_settings(
                &mut settings,
                &stack.docker_registry_url,
                &stack.docker_registry_username,
                &stack.docker_registry_password,
            );
        }

        self.common.apply_health_check_setting(&mut settings);
        target.app_settings = app_settings::expand_for_create(&settings);
        Ok(())
    }

    /// The `CURRENT_STACK` metadata value to write, if any
    pub fn current_stack(&self) -> Option<&str> {
        self.application_stack
            .first()
            .map(|s| s.current_stack.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Site configuration as reported by the service. The Node.js version
    /// lives in `app_settings`; it is moved into the stack and removed from
    /// the map.
    pub fn flatten(
        config: &SiteConfig,
        current_stack: &str,
        app_settings: &mut HashMap<String, String>,
    ) -> Self {
        let mut stack = WindowsApplicationStack::default();
        let net_framework = config.net_framework_version.clone().unwrap_or_default();
        if current_stack == CURRENT_STACK_DOTNET_CORE {
            stack.dotnet_core_version = net_framework;
        } else {
            stack.dotnet_version = net_framework;
        }

        stack.php_version = config
            .php_version
            .clone()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| PHP_VERSION_OFF.to_string());
        stack.python = current_stack == "python";

        // the service keeps reporting a Java version once one was set
        if current_stack == "java" {
            stack.java_version = config.java_version.clone().unwrap_or_default();
        }
        match config.java_container.as_deref() {
            Some(JAVA_CONTAINER_TOMCAT) => {
                stack.tomcat_version = config.java_container_version.clone().unwrap_or_default();
                stack.java_version = config.java_version.clone().unwrap_or_default();
            }
            Some(JAVA_CONTAINER_EMBEDDED) => {
                stack.java_embedded_server_enabled = true;
                stack.java_version = config.java_version.clone().unwrap_or_default();
            }
            _ => {}
        }
        stack.current_stack = current_stack.to_string();

        let windows_fx_version = config.windows_fx_version.clone().unwrap_or_default();
        if windows_fx_version.starts_with(fx_version::DOCKER) {
            read_docker_settings(
                app_settings,
                &mut stack.docker_registry_url,
                &mut stack.docker_registry_username,
                &mut stack.docker_registry_password,
            );
            stack.docker_image_name =
                fx_version::decode_docker_image(&windows_fx_version, &stack.docker_registry_url);
        }
        if let Some(node) = app_settings.remove(NODE_DEFAULT_VERSION) {
            stack.node_version = node;
        }

        let mut common = SiteConfigCommon::flatten(config);
        common.set_health_check_eviction_time(app_settings);

        Self {
            common,
            local_mysql_enabled: config.local_my_sql_enabled.unwrap_or(false),
            application_stack: vec![stack],
            windows_fx_version,
        }
    }

    pub fn preserve_secrets(&mut self, prior: &Self) {
        if let (Some(stack), Some(prior)) = (
            self.application_stack.first_mut(),
            prior.application_stack.first(),
        ) {
            if stack.docker_registry_password.is_empty() {
                stack.docker_registry_password = prior.docker_registry_password.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn setting<'a>(config: &'a SiteConfig, name: &str) -> Option<&'a str> {
        config
            .app_settings
            .as_ref()?
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    #[test]
    fn linux_create_sends_only_configured_values() {
        let config = LinuxWebSiteConfig {
            application_stack: vec![LinuxApplicationStack {
                node_version: "18-lts".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let expanded = config.expand_for_create(&HashMap::new()).unwrap();
        assert_eq!(expanded.linux_fx_version.as_deref(), Some("NODE|18-lts"));
        assert_eq!(expanded.always_on, Some(true));
        assert_eq!(expanded.ftps_state.as_deref(), Some("Disabled"));
        assert!(expanded.api_management_config.is_none());
        assert!(expanded.ip_security_restrictions.is_none());
        assert!(expanded.cors.is_none());
        assert!(expanded.app_settings.is_none());
    }

    #[test]
    fn linux_docker_stack_sets_registry_settings() {
        let config = LinuxWebSiteConfig {
            common: SiteConfigCommon {
                health_check_path: "/health".to_string(),
                health_check_eviction_time_in_min: 5,
                ..Default::default()
            },
            application_stack: vec![LinuxApplicationStack {
                docker_image_name: "nginx:latest".to_string(),
                docker_registry_url: "https://myacr.azurecr.io".to_string(),
                docker_registry_username: "user".to_string(),
                docker_registry_password: "secret".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let expanded = config
            .expand_for_create(&settings(&[("foo", "bar")]))
            .unwrap();
        assert_eq!(
            expanded.linux_fx_version.as_deref(),
            Some("DOCKER|myacr.azurecr.io/nginx:latest")
        );
        assert_eq!(setting(&expanded, "foo"), Some("bar"));
        assert_eq!(setting(&expanded, DOCKER_REGISTRY_SERVER_PASSWORD), Some("secret"));
        assert_eq!(setting(&expanded, HEALTH_CHECK_MAX_PING_FAILURES), Some("5"));
    }

    #[test]
    fn linux_stack_conflicts_are_rejected() {
        let config = LinuxWebSiteConfig {
            application_stack: vec![LinuxApplicationStack {
                node_version: "18-lts".to_string(),
                python_version: "3.11".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(config.expand_for_create(&HashMap::new()).is_err());
    }

    #[test]
    fn linux_update_clears_removed_values() {
        let existing = SiteConfig {
            linux_fx_version: Some("PYTHON|3.11".to_string()),
            app_command_line: Some("gunicorn app:app".to_string()),
            number_of_workers: Some(3),
            ..Default::default()
        };

        let expanded = LinuxWebSiteConfig::default()
            .expand_for_update(&existing, &HashMap::new())
            .unwrap();
        assert_eq!(expanded.linux_fx_version.as_deref(), Some(""));
        assert_eq!(expanded.app_command_line.as_deref(), Some(""));
        assert_eq!(expanded.ip_security_restrictions, Some(Vec::new()));
        assert_eq!(expanded.number_of_workers, Some(3));
    }

    #[test]
    fn linux_flatten_decodes_stacks() {
        let config = SiteConfig {
            linux_fx_version: Some("TOMCAT|10.0-java17".to_string()),
            remote_debugging_version: Some("vs2022".to_string()),
            ..Default::default()
        };
        let flat = LinuxWebSiteConfig::flatten(&config, &HashMap::new());
        let stack = &flat.application_stack[0];
        assert_eq!(stack.java_server, "TOMCAT");
        assert_eq!(stack.java_server_version, "10.0");
        assert_eq!(stack.java_version, "17");
        assert_eq!(flat.common.remote_debugging_version, "VS2022");

        let docker = SiteConfig {
            linux_fx_version: Some("DOCKER|myacr.azurecr.io/api:v2".to_string()),
            ..Default::default()
        };
        let flat = LinuxWebSiteConfig::flatten(
            &docker,
            &settings(&[
                (DOCKER_REGISTRY_SERVER_URL, "https://myacr.azurecr.io"),
                (DOCKER_REGISTRY_SERVER_USERNAME, "user"),
                (HEALTH_CHECK_MAX_PING_FAILURES, "4"),
            ]),
        );
        assert_eq!(flat.application_stack[0].docker_image_name, "api:v2");
        assert_eq!(flat.application_stack[0].docker_registry_username, "user");
        assert_eq!(flat.common.health_check_eviction_time_in_min, 4);
    }

    #[test]
    fn linux_password_comes_from_prior_state() {
        let prior = LinuxWebSiteConfig {
            application_stack: vec![LinuxApplicationStack {
                docker_registry_password: "secret".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut flat = LinuxWebSiteConfig {
            application_stack: vec![LinuxApplicationStack::default()],
            ..Default::default()
        };
        flat.preserve_secrets(&prior);
        assert_eq!(flat.application_stack[0].docker_registry_password, "secret");
    }

    #[test]
    fn windows_stack_expansion() {
        let config = WindowsWebSiteConfig {
            application_stack: vec![WindowsApplicationStack {
                current_stack: "node".to_string(),
                node_version: "~18".to_string(),
                php_version: "Off".to_string(),
                java_version: "17".to_string(),
                java_embedded_server_enabled: true,
                ..Default::default()
            }],
            ..Default::default()
        };

        let expanded = config.expand_for_create(&HashMap::new()).unwrap();
        assert_eq!(setting(&expanded, NODE_DEFAULT_VERSION), Some("~18"));
        assert_eq!(expanded.php_version.as_deref(), Some(""));
        assert_eq!(expanded.java_container.as_deref(), Some("JAVA"));
        assert_eq!(expanded.java_container_version.as_deref(), Some("SE"));
        assert_eq!(config.current_stack(), Some("node"));

        let bare = WindowsWebSiteConfig::default()
            .expand_for_create(&HashMap::new())
            .unwrap();
        assert_eq!(bare.windows_fx_version.as_deref(), Some(""));
        assert_eq!(WindowsWebSiteConfig::default().current_stack(), None);
    }

    #[test]
    fn windows_flatten_moves_node_version_out_of_app_settings() {
        let config = SiteConfig {
            net_framework_version: Some("v6.0".to_string()),
            java_version: Some("11".to_string()),
            ..Default::default()
        };
        let mut app_settings = settings(&[(NODE_DEFAULT_VERSION, "~18"), ("foo", "bar")]);

        let flat = WindowsWebSiteConfig::flatten(&config, "dotnetcore", &mut app_settings);
        let stack = &flat.application_stack[0];
        assert_eq!(stack.dotnet_core_version, "v6.0");
        assert_eq!(stack.dotnet_version, "");
        assert_eq!(stack.php_version, "Off");
        assert_eq!(stack.node_version, "~18");
        assert_eq!(stack.java_version, "");
        assert_eq!(app_settings, settings(&[("foo", "bar")]));
    }

    #[test]
    fn model_decodes_with_flattened_common_fields() {
        let json = serde_json::json!({
            "always_on": false,
            "worker_count": 2,
            "application_stack": [{"python_version": "3.11"}],
        });
        let config: LinuxWebSiteConfig = serde_json::from_value(json).unwrap();
        assert!(!config.common.always_on);
        assert_eq!(config.common.worker_count, 2);
        assert_eq!(config.common.ftps_state, "Disabled");
        assert_eq!(config.application_stack[0].python_version, "3.11");
    }
}
