//! Function App `site_config`, runtime stacks and the storage-backed app
//! settings the Functions host reads at start-up

use super::app_settings::{
    self, DOCKER_REGISTRY_SERVER_PASSWORD, DOCKER_REGISTRY_SERVER_URL,
    DOCKER_REGISTRY_SERVER_USERNAME, HEALTH_CHECK_MAX_PING_FAILURES,
};
use super::fx_version;
use super::site_config::{common_attributes, common_blocks, SiteConfigCommon, NODE_DEFAULT_VERSION};
use super::{trim_url_scheme, ExpandError};
use crate::api::sites::{NameValuePair, SiteConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tfplug::defaults::StaticDefault;
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder};
use tfplug::validator::{NumberBetween, StringNotEmpty};

pub const FUNCTIONS_EXTENSION_VERSION: &str = "FUNCTIONS_EXTENSION_VERSION";
pub const FUNCTIONS_WORKER_RUNTIME: &str = "FUNCTIONS_WORKER_RUNTIME";
pub const AZURE_WEB_JOBS_STORAGE: &str = "AzureWebJobsStorage";
pub const AZURE_WEB_JOBS_STORAGE_ACCOUNT_NAME: &str = "AzureWebJobsStorage__accountName";
pub const AZURE_WEB_JOBS_DASHBOARD: &str = "AzureWebJobsDashboard";
pub const AZURE_WEB_JOBS_DASHBOARD_ACCOUNT_NAME: &str = "AzureWebJobsDashboard__accountName";
pub const CONTENT_CONNECTION_STRING: &str = "WEBSITE_CONTENTAZUREFILECONNECTIONSTRING";
pub const CONTENT_SHARE: &str = "WEBSITE_CONTENTSHARE";
pub const CONTENT_OVER_VNET: &str = "WEBSITE_CONTENTOVERVNET";
pub const APP_INSIGHTS_KEY: &str = "APPINSIGHTS_INSTRUMENTATIONKEY";
pub const APP_INSIGHTS_CONNECTION_STRING: &str = "APPLICATIONINSIGHTS_CONNECTION_STRING";

const KEY_VAULT_REFERENCE_PREFIX: &str = "@Microsoft.KeyVault(SecretUri=";

/// Where the Functions host keeps its state. Part of the resource model
/// rather than `site_config`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionStorage {
    pub storage_account_name: String,
    pub storage_account_access_key: String,
    pub storage_uses_managed_identity: bool,
    pub storage_key_vault_secret_id: String,
}

impl FunctionStorage {
    pub fn validate(&self) -> Result<(), ExpandError> {
        if self.storage_uses_managed_identity && !self.storage_account_access_key.is_empty() {
            return Err(ExpandError::new(
                "`storage_account_access_key` and `storage_uses_managed_identity` cannot both be set",
            ));
        }
        if !self.storage_key_vault_secret_id.is_empty() && !self.storage_account_name.is_empty() {
            return Err(ExpandError::new(
                "`storage_key_vault_secret_id` cannot be used with `storage_account_name`",
            ));
        }
        if self.storage_uses_managed_identity && self.storage_account_name.is_empty() {
            return Err(ExpandError::new(
                "`storage_account_name` is required when `storage_uses_managed_identity` is set",
            ));
        }
        Ok(())
    }

    /// Value of `AzureWebJobsStorage`, or the bare account name when the
    /// host authenticates with its managed identity
    pub fn connection_string(&self, endpoint_suffix: &str) -> String {
        if self.storage_uses_managed_identity {
            self.storage_account_name.clone()
        } else if !self.storage_key_vault_secret_id.is_empty() {
            format!("{}{})", KEY_VAULT_REFERENCE_PREFIX, self.storage_key_vault_secret_id)
        } else {
            format!(
                "DefaultEndpointsProtocol=https;AccountName={};AccountKey={};EndpointSuffix={}",
                self.storage_account_name, self.storage_account_access_key, endpoint_suffix
            )
        }
    }

    /// Inverse of [`FunctionStorage::connection_string`]
    fn read_setting(&mut self, value: &str) {
        if let Some(secret) = value.strip_prefix(KEY_VAULT_REFERENCE_PREFIX) {
            self.storage_key_vault_secret_id = secret.trim_end_matches(')').to_string();
        } else {
            let (name, key) = parse_web_jobs_storage_string(value);
            self.storage_account_name = name;
            self.storage_account_access_key = key;
        }
    }

    pub fn schema_attributes() -> Vec<Attribute> {
        vec![
            AttributeBuilder::new("storage_account_name", AttributeType::String)
                .description("The backend storage account name used by this Function App")
                .optional()
                .build(),
            AttributeBuilder::new("storage_account_access_key", AttributeType::String)
                .description("The access key used to reach the backend storage account")
                .optional()
                .sensitive()
                .validator(StringNotEmpty::create())
                .build(),
            AttributeBuilder::new("storage_uses_managed_identity", AttributeType::Bool)
                .optional()
                .default(StaticDefault::bool(false))
                .build(),
            AttributeBuilder::new("storage_key_vault_secret_id", AttributeType::String)
                .description("Key Vault secret holding the storage connection string")
                .optional()
                .build(),
        ]
    }
}

/// `(AccountName, AccountKey)` from a storage connection string
pub fn parse_web_jobs_storage_string(input: &str) -> (String, String) {
    let mut name = String::new();
    let mut key = String::new();
    for part in input.split(';') {
        if let Some(v) = part.strip_prefix("AccountName=") {
            name = v.to_string();
        } else if let Some(v) = part.strip_prefix("AccountKey=") {
            key = v.to_string();
        }
    }
    (name, key)
}

/// Values the site config expansion writes alongside the user's settings
#[derive(Debug, Clone)]
pub struct FunctionRuntime {
    pub extension_version: String,
    pub storage_string: String,
    pub storage_uses_managed_identity: bool,
}

/// Augments the user's app settings with built-in logging and, on Elastic
/// and Consumption plans, the content share the host mounts
pub fn user_app_settings(
    user: &HashMap<String, String>,
    storage: &FunctionStorage,
    storage_string: &str,
    builtin_logging: bool,
    send_content_settings: bool,
    site_name: &str,
) -> Result<HashMap<String, String>, ExpandError> {
    let mut settings = user.clone();

    if builtin_logging {
        if storage.storage_uses_managed_identity {
            settings.insert(
                AZURE_WEB_JOBS_DASHBOARD_ACCOUNT_NAME.to_string(),
                storage.storage_account_name.clone(),
            );
        } else {
            settings.insert(AZURE_WEB_JOBS_DASHBOARD.to_string(), storage_string.to_string());
        }
    }

    if send_content_settings {
        if storage.storage_uses_managed_identity {
            settings
                .entry(AZURE_WEB_JOBS_STORAGE_ACCOUNT_NAME.to_string())
                .or_insert_with(|| storage_string.to_string());
        } else {
            settings
                .entry(CONTENT_CONNECTION_STRING.to_string())
                .or_insert_with(|| storage_string.to_string());
            if !settings.contains_key(CONTENT_SHARE) {
                if settings.contains_key(CONTENT_OVER_VNET) {
                    return Err(ExpandError::new(
                        "the app_setting WEBSITE_CONTENTSHARE must be specified and set to a valid share when WEBSITE_CONTENTOVERVNET is specified",
                    ));
                }
                let suffix = uuid::Uuid::new_v4().simple().to_string();
                settings.insert(
                    CONTENT_SHARE.to_string(),
                    format!("{}-{}", site_name.to_lowercase(), &suffix[..4]),
                );
            }
        }
    }

    Ok(settings)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionScaling {
    pub app_scale_limit: i64,
    pub application_insights_connection_string: String,
    pub application_insights_key: String,
    pub elastic_instance_minimum: i64,
    pub pre_warmed_instance_count: i64,
    pub runtime_scale_monitoring_enabled: bool,
}

impl FunctionScaling {
    fn apply(&self, target: &mut SiteConfig, settings: Vec<NameValuePair>) -> Vec<NameValuePair> {
        if self.app_scale_limit != 0 {
            target.function_app_scale_limit = Some(self.app_scale_limit);
        }
        if self.elastic_instance_minimum != 0 {
            target.minimum_elastic_instance_count = Some(self.elastic_instance_minimum);
        }
        if self.pre_warmed_instance_count != 0 {
            target.pre_warmed_instance_count = Some(self.pre_warmed_instance_count);
        }
        target.functions_runtime_scale_monitoring_enabled =
            Some(self.runtime_scale_monitoring_enabled);

        let settings = app_settings::update_or_append(
            settings,
            APP_INSIGHTS_CONNECTION_STRING,
            &self.application_insights_connection_string,
            self.application_insights_connection_string.is_empty(),
        );
        app_settings::update_or_append(
            settings,
            APP_INSIGHTS_KEY,
            &self.application_insights_key,
            self.application_insights_key.is_empty(),
        )
    }

    fn flatten(config: &SiteConfig) -> Self {
        Self {
            app_scale_limit: config.function_app_scale_limit.unwrap_or(0),
            application_insights_connection_string: String::new(),
            application_insights_key: String::new(),
            elastic_instance_minimum: config.minimum_elastic_instance_count.unwrap_or(0),
            pre_warmed_instance_count: config.pre_warmed_instance_count.unwrap_or(0),
            runtime_scale_monitoring_enabled: config
                .functions_runtime_scale_monitoring_enabled
                .unwrap_or(false),
        }
    }

    fn attributes() -> Vec<Attribute> {
        vec![
            AttributeBuilder::new("app_scale_limit", AttributeType::Number)
                .description("Number of workers this Function App can scale out to")
                .optional()
                .computed()
                .build(),
            AttributeBuilder::new("application_insights_connection_string", AttributeType::String)
                .optional()
                .sensitive()
                .build(),
            AttributeBuilder::new("application_insights_key", AttributeType::String)
                .optional()
                .sensitive()
                .build(),
            AttributeBuilder::new("elastic_instance_minimum", AttributeType::Number)
                .optional()
                .computed()
                .validator(NumberBetween::create(1.0, 20.0))
                .build(),
            AttributeBuilder::new("pre_warmed_instance_count", AttributeType::Number)
                .optional()
                .computed()
                .validator(NumberBetween::create(0.0, 20.0))
                .build(),
            AttributeBuilder::new("runtime_scale_monitoring_enabled", AttributeType::Bool)
                .optional()
                .default(StaticDefault::bool(false))
                .build(),
        ]
    }
}

/// App-settings list shared by both flavours: the user's settings win over
/// what the expansion computed
fn base_app_settings(
    existing: Option<&SiteConfig>,
    common: &SiteConfigCommon,
    runtime: &FunctionRuntime,
) -> Vec<NameValuePair> {
    let settings = existing
        .and_then(|e| e.app_settings.clone())
        .unwrap_or_default();
    let settings = app_settings::update_or_append(
        settings,
        FUNCTIONS_EXTENSION_VERSION,
        &runtime.extension_version,
        false,
    );
    let storage_key = if runtime.storage_uses_managed_identity {
        AZURE_WEB_JOBS_STORAGE_ACCOUNT_NAME
    } else {
        AZURE_WEB_JOBS_STORAGE
    };
    let settings =
        app_settings::update_or_append(settings, storage_key, &runtime.storage_string, false);

    let eviction = common.health_check_eviction_time_in_min;
    app_settings::update_or_append(
        settings,
        HEALTH_CHECK_MAX_PING_FAILURES,
        &eviction.to_string(),
        eviction == 0 || common.health_check_path.is_empty(),
    )
}

fn set_worker(settings: Vec<NameValuePair>, worker: &str) -> Vec<NameValuePair> {
    app_settings::update_or_append(settings, FUNCTIONS_WORKER_RUNTIME, worker, false)
}

fn always_on() -> Attribute {
    AttributeBuilder::new("always_on", AttributeType::Bool)
        .optional()
        .computed()
        .build()
}

fn optional_string(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .optional()
        .build()
}

fn optional_flag(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Bool)
        .optional()
        .default(StaticDefault::bool(false))
        .build()
}

// ---- Linux ----

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionDocker {
    pub registry_url: String,
    pub image_name: String,
    pub image_tag: String,
    pub registry_username: String,
    pub registry_password: String,
}

impl FunctionDocker {
    fn fx_version(&self) -> String {
        fx_version::encode(
            fx_version::DOCKER,
            &format!(
                "{}/{}:{}",
                trim_url_scheme(&self.registry_url),
                self.image_name,
                self.image_tag
            ),
        )
    }

    fn decode(fx: &str, registry_url: &str) -> Self {
        let image = fx_version::decode_docker_image(fx, registry_url);
        let (image_name, image_tag) = match image.rsplit_once(':') {
            Some((name, tag)) => (name.to_string(), tag.to_string()),
            None => (image, String::new()),
        };
        Self {
            registry_url: registry_url.to_string(),
            image_name,
            image_tag,
            ..Default::default()
        }
    }

    fn schema() -> NestedBlock {
        NestedBlockBuilder::list("docker")
            .max_items(1)
            .attribute(
                AttributeBuilder::new("registry_url", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("image_name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("image_tag", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(optional_string("registry_username"))
            .attribute(
                AttributeBuilder::new("registry_password", AttributeType::String)
                    .optional()
                    .sensitive()
                    .build(),
            )
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinuxFunctionApplicationStack {
    pub docker: Vec<FunctionDocker>,
    pub dotnet_version: String,
    pub use_dotnet_isolated_runtime: bool,
    pub java_version: String,
    pub node_version: String,
    pub python_version: String,
    pub powershell_core_version: String,
    pub use_custom_runtime: bool,
}

impl LinuxFunctionApplicationStack {
    /// `(FUNCTIONS_WORKER_RUNTIME, linuxFxVersion)`
    fn runtime(&self) -> (Option<&'static str>, String) {
        if let Some(docker) = self.docker.first() {
            return (None, docker.fx_version());
        }
        if !self.dotnet_version.is_empty() {
            return if self.use_dotnet_isolated_runtime {
                (
                    Some("dotnet-isolated"),
                    fx_version::encode(fx_version::DOTNET_ISOLATED, &self.dotnet_version),
                )
            } else {
                (
                    Some("dotnet"),
                    fx_version::encode(fx_version::DOTNET, &self.dotnet_version),
                )
            };
        }
        if !self.node_version.is_empty() {
            return (Some("node"), fx_version::encode(fx_version::NODE, &self.node_version));
        }
        if !self.python_version.is_empty() {
            return (
                Some("python"),
                fx_version::encode(fx_version::PYTHON, &self.python_version),
            );
        }
        if !self.java_version.is_empty() {
            return (Some("java"), fx_version::encode(fx_version::JAVA, &self.java_version));
        }
        if !self.powershell_core_version.is_empty() {
            return (
                Some("powershell"),
                fx_version::encode(fx_version::POWERSHELL, &self.powershell_core_version),
            );
        }
        if self.use_custom_runtime {
            return (Some("custom"), String::new());
        }
        (None, String::new())
    }

    fn decode(fx: &str) -> Option<Self> {
        let (stack, version) = fx_version::decode(fx)?;
        let version = version.to_string();
        let mut decoded = Self::default();
        match stack.to_ascii_uppercase().as_str() {
            fx_version::DOTNET => decoded.dotnet_version = version,
            fx_version::DOTNET_ISOLATED => {
                decoded.dotnet_version = version;
                decoded.use_dotnet_isolated_runtime = true;
            }
            fx_version::NODE => decoded.node_version = version,
            fx_version::PYTHON => decoded.python_version = version,
            fx_version::JAVA => decoded.java_version = version,
            fx_version::POWERSHELL => decoded.powershell_core_version = version,
            _ => return None,
        }
        Some(decoded)
    }

    fn schema() -> NestedBlock {
        NestedBlockBuilder::list("application_stack")
            .max_items(1)
            .attribute(optional_string("dotnet_version"))
            .attribute(optional_flag("use_dotnet_isolated_runtime"))
            .attribute(optional_string("java_version"))
            .attribute(optional_string("node_version"))
            .attribute(optional_string("python_version"))
            .attribute(optional_string("powershell_core_version"))
            .attribute(optional_flag("use_custom_runtime"))
            .block(FunctionDocker::schema())
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinuxFunctionSiteConfig {
    #[serde(flatten)]
    pub common: SiteConfigCommon,
    #[serde(flatten)]
    pub scaling: FunctionScaling,
    pub application_stack: Vec<LinuxFunctionApplicationStack>,
    pub linux_fx_version: String,
}

pub fn linux_function_schema() -> NestedBlock {
    NestedBlockBuilder::list("site_config")
        .min_items(1)
        .max_items(1)
        .attribute(always_on())
        .attributes(common_attributes())
        .attributes(FunctionScaling::attributes())
        .attribute(
            AttributeBuilder::new("linux_fx_version", AttributeType::String)
                .computed()
                .build(),
        )
        .blocks(common_blocks())
        .block(LinuxFunctionApplicationStack::schema())
        .build()
}

impl LinuxFunctionSiteConfig {
    /// The site config to send. With `existing` the current configuration is
    /// the starting point and every configured field is written.
    pub fn expand(
        &self,
        existing: Option<&SiteConfig>,
        runtime: &FunctionRuntime,
        user_settings: &HashMap<String, String>,
    ) -> Result<SiteConfig, ExpandError> {
        let mut expanded = existing.cloned().unwrap_or_default();
        self.common.apply(&mut expanded, existing.is_some())?;

        let mut settings = base_app_settings(existing, &self.common, runtime);
        settings = self.scaling.apply(&mut expanded, settings);

        match self.application_stack.first() {
            Some(stack) => {
                let (worker, fx) = stack.runtime();
                if let Some(worker) = worker {
                    settings = set_worker(settings, worker);
                }
                if !stack.node_version.is_empty() {
                    settings = app_settings::update_or_append(
                        settings,
                        NODE_DEFAULT_VERSION,
                        &stack.node_version,
                        false,
                    );
                }
                if let Some(docker) = stack.docker.first() {
                    for (name, value) in [
                        (DOCKER_REGISTRY_SERVER_URL, &docker.registry_url),
                        (DOCKER_REGISTRY_SERVER_USERNAME, &docker.registry_username),
                        (DOCKER_REGISTRY_SERVER_PASSWORD, &docker.registry_password),
                    ] {
                        settings = app_settings::update_or_append(settings, name, value, false);
                    }
                }
                expanded.linux_fx_version = Some(fx);
            }
            None => {
                settings =
                    app_settings::update_or_append(settings, FUNCTIONS_WORKER_RUNTIME, "", true);
                expanded.linux_fx_version = Some(String::new());
            }
        }

        expanded.app_settings = Some(app_settings::merge_user_app_settings(
            settings,
            user_settings,
        ));
        Ok(expanded)
    }

    pub fn flatten(config: &SiteConfig) -> Self {
        let linux_fx_version = config.linux_fx_version.clone().unwrap_or_default();
        Self {
            common: SiteConfigCommon::flatten(config),
            scaling: FunctionScaling::flatten(config),
            application_stack: LinuxFunctionApplicationStack::decode(&linux_fx_version)
                .into_iter()
                .collect(),
            linux_fx_version,
        }
    }

    /// Folds values carried by app settings back into the block
    pub fn apply_unpacked(&mut self, unpacked: &UnpackedAppSettings) {
        unpacked.apply_common(&mut self.common, &mut self.scaling);

        if self.application_stack.is_empty() && unpacked.worker_runtime == "custom" {
            self.application_stack = vec![LinuxFunctionApplicationStack {
                use_custom_runtime: true,
                ..Default::default()
            }];
        }
        if !unpacked.docker_registry_url.is_empty() {
            let mut docker = FunctionDocker::decode(&self.linux_fx_version, &unpacked.docker_registry_url);
            docker.registry_username = unpacked.docker_registry_username.clone();
            docker.registry_password = unpacked.docker_registry_password.clone();
            self.application_stack = vec![LinuxFunctionApplicationStack {
                docker: vec![docker],
                ..Default::default()
            }];
        }
    }

    pub fn preserve_secrets(&mut self, prior: &Self) {
        let prior_docker = prior
            .application_stack
            .first()
            .and_then(|s| s.docker.first());
        let docker = self
            .application_stack
            .first_mut()
            .and_then(|s| s.docker.first_mut());
        if let (Some(docker), Some(prior)) = (docker, prior_docker) {
            if docker.registry_password.is_empty() {
                docker.registry_password = prior.registry_password.clone();
            }
        }
    }
}

// ---- Windows ----

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowsFunctionApplicationStack {
    pub dotnet_version: String,
    pub use_dotnet_isolated_runtime: bool,
    pub java_version: String,
    pub node_version: String,
    pub powershell_core_version: String,
    pub use_custom_runtime: bool,
}

impl WindowsFunctionApplicationStack {
    fn schema() -> NestedBlock {
        NestedBlockBuilder::list("application_stack")
            .max_items(1)
            .attribute(optional_string("dotnet_version"))
            .attribute(optional_flag("use_dotnet_isolated_runtime"))
            .attribute(optional_string("java_version"))
            .attribute(optional_string("node_version"))
            .attribute(optional_string("powershell_core_version"))
            .attribute(optional_flag("use_custom_runtime"))
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowsFunctionSiteConfig {
    #[serde(flatten)]
    pub common: SiteConfigCommon,
    #[serde(flatten)]
    pub scaling: FunctionScaling,
    pub application_stack: Vec<WindowsFunctionApplicationStack>,
    pub windows_fx_version: String,
}

pub fn windows_function_schema() -> NestedBlock {
    NestedBlockBuilder::list("site_config")
        .min_items(1)
        .max_items(1)
        .attribute(always_on())
        .attributes(common_attributes())
        .attributes(FunctionScaling::attributes())
        .attribute(
            AttributeBuilder::new("windows_fx_version", AttributeType::String)
                .computed()
                .build(),
        )
        .blocks(common_blocks())
        .block(WindowsFunctionApplicationStack::schema())
        .build()
}

impl WindowsFunctionSiteConfig {
    pub fn expand(
        &self,
        existing: Option<&SiteConfig>,
        runtime: &FunctionRuntime,
        user_settings: &HashMap<String, String>,
    ) -> Result<SiteConfig, ExpandError> {
        let mut expanded = existing.cloned().unwrap_or_default();
        self.common.apply(&mut expanded, existing.is_some())?;
        expanded.windows_fx_version = Some(String::new());

        let mut settings = base_app_settings(existing, &self.common, runtime);
        settings = self.scaling.apply(&mut expanded, settings);

        match self.application_stack.first() {
            Some(stack) => {
                if !stack.dotnet_version.is_empty() {
                    let worker = if stack.use_dotnet_isolated_runtime {
                        "dotnet-isolated"
                    } else {
                        "dotnet"
                    };
                    settings = set_worker(settings, worker);
                    expanded.net_framework_version = Some(stack.dotnet_version.clone());
                }
                if !stack.node_version.is_empty() {
                    settings = set_worker(settings, "node");
                    settings = app_settings::update_or_append(
                        settings,
                        NODE_DEFAULT_VERSION,
                        &stack.node_version,
                        false,
                    );
                }
                if !stack.java_version.is_empty() {
                    settings = set_worker(settings, "java");
                    expanded.java_version = Some(stack.java_version.clone());
                }
                if !stack.powershell_core_version.is_empty() {
                    settings = set_worker(settings, "powershell");
                    expanded.power_shell_version = Some(
                        stack.powershell_core_version.trim_start_matches('~').to_string(),
                    );
                }
                if stack.use_custom_runtime {
                    settings = set_worker(settings, "custom");
                }
            }
            None => {
                settings =
                    app_settings::update_or_append(settings, FUNCTIONS_WORKER_RUNTIME, "", true);
            }
        }

        expanded.app_settings = Some(app_settings::merge_user_app_settings(
            settings,
            user_settings,
        ));
        Ok(expanded)
    }

    pub fn flatten(config: &SiteConfig) -> Self {
        let powershell = config.power_shell_version.clone().unwrap_or_default();
        let stack = WindowsFunctionApplicationStack {
            dotnet_version: config.net_framework_version.clone().unwrap_or_default(),
            java_version: config.java_version.clone().unwrap_or_default(),
            powershell_core_version: if powershell == "~7" {
                "7".to_string()
            } else {
                powershell
            },
            ..Default::default()
        };
        Self {
            common: SiteConfigCommon::flatten(config),
            scaling: FunctionScaling::flatten(config),
            application_stack: vec![stack],
            windows_fx_version: config.windows_fx_version.clone().unwrap_or_default(),
        }
    }

    pub fn apply_unpacked(&mut self, unpacked: &UnpackedAppSettings) {
        unpacked.apply_common(&mut self.common, &mut self.scaling);

        if let Some(stack) = self.application_stack.first_mut() {
            stack.node_version = unpacked.node_version.clone();
            match unpacked.worker_runtime.as_str() {
                "dotnet-isolated" => stack.use_dotnet_isolated_runtime = true,
                "custom" => stack.use_custom_runtime = true,
                _ => {}
            }
        }
    }
}

/// Function App settings split into first-class attributes and what is left
/// for `app_settings`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnpackedAppSettings {
    pub extension_version: String,
    pub storage: FunctionStorage,
    pub builtin_logging: bool,
    pub application_insights_key: String,
    pub application_insights_connection_string: String,
    pub health_check_eviction_time_in_min: i64,
    pub worker_runtime: String,
    pub node_version: String,
    pub docker_registry_url: String,
    pub docker_registry_username: String,
    pub docker_registry_password: String,
    pub app_settings: HashMap<String, String>,
}

impl UnpackedAppSettings {
    fn apply_common(&self, common: &mut SiteConfigCommon, scaling: &mut FunctionScaling) {
        scaling.application_insights_key = self.application_insights_key.clone();
        scaling.application_insights_connection_string =
            self.application_insights_connection_string.clone();
        common.health_check_eviction_time_in_min = self.health_check_eviction_time_in_min;
    }
}

/// Splits the site's app settings. Content share settings and the worker
/// runtime stay in `app_settings` only when the user configured them there
/// (`user_keys` is the prior `app_settings`).
pub fn unpack_app_settings(
    settings: HashMap<String, String>,
    user_keys: &HashMap<String, String>,
) -> UnpackedAppSettings {
    let mut unpacked = UnpackedAppSettings::default();

    for (key, value) in settings {
        match key.as_str() {
            FUNCTIONS_EXTENSION_VERSION => unpacked.extension_version = value,
            NODE_DEFAULT_VERSION => unpacked.node_version = value,
            CONTENT_CONNECTION_STRING | CONTENT_SHARE => {
                if user_keys.contains_key(&key) {
                    unpacked.app_settings.insert(key, value);
                }
            }
            FUNCTIONS_WORKER_RUNTIME => {
                if user_keys.contains_key(&key) {
                    unpacked.app_settings.insert(key, value.clone());
                }
                unpacked.worker_runtime = value;
            }
            DOCKER_REGISTRY_SERVER_URL => unpacked.docker_registry_url = value,
            DOCKER_REGISTRY_SERVER_USERNAME => unpacked.docker_registry_username = value,
            DOCKER_REGISTRY_SERVER_PASSWORD => unpacked.docker_registry_password = value,
            APP_INSIGHTS_KEY => unpacked.application_insights_key = value,
            APP_INSIGHTS_CONNECTION_STRING => unpacked.application_insights_connection_string = value,
            AZURE_WEB_JOBS_STORAGE => unpacked.storage.read_setting(&value),
            AZURE_WEB_JOBS_STORAGE_ACCOUNT_NAME => {
                unpacked.storage.storage_uses_managed_identity = true;
                unpacked.storage.storage_account_name = value;
            }
            AZURE_WEB_JOBS_DASHBOARD | AZURE_WEB_JOBS_DASHBOARD_ACCOUNT_NAME => {
                unpacked.builtin_logging = true
            }
            HEALTH_CHECK_MAX_PING_FAILURES => {
                unpacked.health_check_eviction_time_in_min = value.parse().unwrap_or(0)
            }
            "WEBSITE_HTTPLOGGING_RETENTION_DAYS" | "WEBSITE_VNET_ROUTE_ALL" => {}
            _ => {
                unpacked.app_settings.insert(key, value);
            }
        }
    }

    unpacked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> FunctionRuntime {
        FunctionRuntime {
            extension_version: "~4".to_string(),
            storage_string: "DefaultEndpointsProtocol=https;AccountName=sa;AccountKey=key;EndpointSuffix=core.windows.net".to_string(),
            storage_uses_managed_identity: false,
        }
    }

    fn setting<'a>(config: &'a SiteConfig, name: &str) -> Option<&'a str> {
        config
            .app_settings
            .as_ref()?
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn storage_connection_strings() {
        let storage = FunctionStorage {
            storage_account_name: "sa".to_string(),
            storage_account_access_key: "key".to_string(),
            ..Default::default()
        };
        assert_eq!(
            storage.connection_string("core.windows.net"),
            "DefaultEndpointsProtocol=https;AccountName=sa;AccountKey=key;EndpointSuffix=core.windows.net"
        );

        let kv = FunctionStorage {
            storage_key_vault_secret_id: "https://kv.vault.azure.net/secrets/s".to_string(),
            ..Default::default()
        };
        assert_eq!(
            kv.connection_string("core.windows.net"),
            "@Microsoft.KeyVault(SecretUri=https://kv.vault.azure.net/secrets/s)"
        );

        let both = FunctionStorage {
            storage_uses_managed_identity: true,
            ..storage
        };
        assert!(both.validate().is_err());
    }

    #[test]
    fn parses_storage_string() {
        assert_eq!(
            parse_web_jobs_storage_string(&runtime().storage_string),
            ("sa".to_string(), "key".to_string())
        );
        assert_eq!(parse_web_jobs_storage_string(""), (String::new(), String::new()));
    }

    #[test]
    fn content_share_settings_for_elastic_plans() {
        let storage = FunctionStorage::default();
        let settings =
            user_app_settings(&HashMap::new(), &storage, "conn", true, true, "MyFunc").unwrap();
        assert_eq!(settings[CONTENT_CONNECTION_STRING], "conn");
        assert_eq!(settings[AZURE_WEB_JOBS_DASHBOARD], "conn");
        assert!(settings[CONTENT_SHARE].starts_with("myfunc-"));
        assert_eq!(settings[CONTENT_SHARE].len(), "myfunc-".len() + 4);

        let err = user_app_settings(
            &map(&[(CONTENT_OVER_VNET, "1")]),
            &storage,
            "conn",
            false,
            true,
            "f",
        )
        .unwrap_err();
        assert!(err.message.contains("WEBSITE_CONTENTSHARE must be specified"));

        let untouched =
            user_app_settings(&map(&[("a", "b")]), &storage, "conn", false, false, "f").unwrap();
        assert_eq!(untouched, map(&[("a", "b")]));
    }

    #[test]
    fn linux_expand_sets_worker_runtime_and_user_settings_win() {
        let config = LinuxFunctionSiteConfig {
            application_stack: vec![LinuxFunctionApplicationStack {
                python_version: "3.11".to_string(),
                ..Default::default()
            }],
            scaling: FunctionScaling {
                application_insights_key: "ikey".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let expanded = config
            .expand(None, &runtime(), &map(&[(AZURE_WEB_JOBS_STORAGE, "@kv")]))
            .unwrap();
        assert_eq!(expanded.linux_fx_version.as_deref(), Some("PYTHON|3.11"));
        assert_eq!(setting(&expanded, FUNCTIONS_WORKER_RUNTIME), Some("python"));
        assert_eq!(setting(&expanded, FUNCTIONS_EXTENSION_VERSION), Some("~4"));
        assert_eq!(setting(&expanded, APP_INSIGHTS_KEY), Some("ikey"));
        assert_eq!(setting(&expanded, AZURE_WEB_JOBS_STORAGE), Some("@kv"));
        assert_eq!(setting(&expanded, HEALTH_CHECK_MAX_PING_FAILURES), None);
    }

    #[test]
    fn linux_docker_round_trip() {
        let stack = LinuxFunctionApplicationStack {
            docker: vec![FunctionDocker {
                registry_url: "https://myacr.azurecr.io".to_string(),
                image_name: "func".to_string(),
                image_tag: "v1".to_string(),
                registry_username: "user".to_string(),
                registry_password: "pw".to_string(),
            }],
            ..Default::default()
        };
        let config = LinuxFunctionSiteConfig {
            application_stack: vec![stack],
            ..Default::default()
        };
        let expanded = config.expand(None, &runtime(), &HashMap::new()).unwrap();
        assert_eq!(
            expanded.linux_fx_version.as_deref(),
            Some("DOCKER|myacr.azurecr.io/func:v1")
        );

        let mut flat = LinuxFunctionSiteConfig::flatten(&expanded);
        let unpacked = unpack_app_settings(
            map(&[
                (DOCKER_REGISTRY_SERVER_URL, "https://myacr.azurecr.io"),
                (DOCKER_REGISTRY_SERVER_USERNAME, "user"),
            ]),
            &HashMap::new(),
        );
        flat.apply_unpacked(&unpacked);
        let docker = &flat.application_stack[0].docker[0];
        assert_eq!(docker.image_name, "func");
        assert_eq!(docker.image_tag, "v1");
        assert_eq!(docker.registry_username, "user");
    }

    #[test]
    fn linux_update_without_stack_clears_runtime() {
        let existing = SiteConfig {
            linux_fx_version: Some("NODE|18".to_string()),
            app_settings: Some(vec![NameValuePair {
                name: FUNCTIONS_WORKER_RUNTIME.to_string(),
                value: "node".to_string(),
            }]),
            ..Default::default()
        };
        let expanded = LinuxFunctionSiteConfig::default()
            .expand(Some(&existing), &runtime(), &HashMap::new())
            .unwrap();
        assert_eq!(expanded.linux_fx_version.as_deref(), Some(""));
        assert_eq!(setting(&expanded, FUNCTIONS_WORKER_RUNTIME), None);
    }

    #[test]
    fn windows_expand_and_flatten() {
        let config = WindowsFunctionSiteConfig {
            application_stack: vec![WindowsFunctionApplicationStack {
                powershell_core_version: "7.2".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let expanded = config.expand(None, &runtime(), &HashMap::new()).unwrap();
        assert_eq!(setting(&expanded, FUNCTIONS_WORKER_RUNTIME), Some("powershell"));
        assert_eq!(expanded.power_shell_version.as_deref(), Some("7.2"));
        assert_eq!(expanded.windows_fx_version.as_deref(), Some(""));

        let mut flat = WindowsFunctionSiteConfig::flatten(&SiteConfig {
            net_framework_version: Some("v8.0".to_string()),
            power_shell_version: Some("~7".to_string()),
            ..Default::default()
        });
        flat.apply_unpacked(&unpack_app_settings(
            map(&[(FUNCTIONS_WORKER_RUNTIME, "dotnet-isolated"), (NODE_DEFAULT_VERSION, "~18")]),
            &HashMap::new(),
        ));
        let stack = &flat.application_stack[0];
        assert_eq!(stack.powershell_core_version, "7");
        assert_eq!(stack.dotnet_version, "v8.0");
        assert!(stack.use_dotnet_isolated_runtime);
        assert_eq!(stack.node_version, "~18");
    }

    #[test]
    fn unpack_separates_first_class_settings() {
        let unpacked = unpack_app_settings(
            map(&[
                (FUNCTIONS_EXTENSION_VERSION, "~4"),
                (AZURE_WEB_JOBS_STORAGE, &runtime().storage_string),
                (AZURE_WEB_JOBS_DASHBOARD, "x"),
                (CONTENT_SHARE, "share"),
                (CONTENT_CONNECTION_STRING, "conn"),
                (HEALTH_CHECK_MAX_PING_FAILURES, "3"),
                ("custom", "value"),
            ]),
            &map(&[(CONTENT_SHARE, "share")]),
        );
        assert_eq!(unpacked.extension_version, "~4");
        assert_eq!(unpacked.storage.storage_account_name, "sa");
        assert_eq!(unpacked.storage.storage_account_access_key, "key");
        assert!(unpacked.builtin_logging);
        assert_eq!(unpacked.health_check_eviction_time_in_min, 3);
        assert_eq!(
            unpacked.app_settings,
            map(&[(CONTENT_SHARE, "share"), ("custom", "value")])
        );

        let msi = unpack_app_settings(
            map(&[(AZURE_WEB_JOBS_STORAGE_ACCOUNT_NAME, "sa")]),
            &HashMap::new(),
        );
        assert!(msi.storage.storage_uses_managed_identity);
        assert_eq!(msi.storage.storage_account_name, "sa");
    }
}
