//! Web App and Function App sites and their deployment slots
//!
//! All eight site resources share one lifecycle. A [`SiteFlavor`] supplies
//! what differs between them: the `kind`, the `site_config` block, extra
//! top-level attributes and how app settings are folded into and out of the
//! site configuration.

use super::{
    extract_provider_data, not_configured, operation_error, requires_import, state_from_model,
    within, TIMEOUTS,
};
use crate::api::common::{ManagedServiceIdentity, StringDictionary};
use crate::api::sites::{
    PublishingPolicy, Site, SiteConfig, SiteConfigResource, SiteProperties,
    SlotConfigNames, SlotConfigNamesResource,
};
use crate::api::lro::race;
use crate::api::{ApiError, Poller};
use crate::config::CloudEnvironment;
use crate::helpers::auth_settings::{self, AuthSettings};
use crate::helpers::auth_settings_v2::{self, AuthV2Settings};
use crate::helpers::connection_strings::{self, ConnectionString};
use crate::helpers::identity::{self, Identity};
use crate::helpers::site_config::CURRENT_STACK;
use crate::helpers::sticky_settings::{self, StickySettings};
use crate::helpers::{app_settings, non_empty, ExpandError};
use crate::ids::{IdError, ServicePlanId, WebAppId, WebAppSlotId};
use crate::provider_data::AppServiceProviderData;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::import::import_state_passthrough_id;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType, NestedBlock, Schema, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::{validate_config, StringOneOf};

const CLIENT_CERT_MODES: &[&str] = &["Required", "Optional", "OptionalInteractiveUser"];

/// Attributes every site resource carries, whatever its flavor.
/// `sticky_settings` and the App-only identification fields are dropped
/// from slot state by the slot schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteCommon {
    pub id: String,
    pub name: String,
    pub resource_group_name: String,
    pub location: String,
    pub service_plan_id: String,
    pub app_service_id: String,
    pub function_app_id: String,

    pub app_settings: HashMap<String, String>,
    pub client_affinity_enabled: bool,
    pub client_certificate_enabled: bool,
    pub client_certificate_mode: String,
    pub client_certificate_exclusion_paths: String,
    pub enabled: bool,
    pub ftp_publish_basic_authentication_enabled: bool,
    pub webdeploy_publish_basic_authentication_enabled: bool,
    pub https_only: bool,
    pub public_network_access_enabled: bool,
    pub key_vault_reference_identity_id: String,
    pub virtual_network_subnet_id: String,
    pub tags: HashMap<String, String>,

    pub auth_settings: Vec<AuthSettings>,
    pub auth_settings_v2: Vec<AuthV2Settings>,
    pub connection_string: Vec<ConnectionString>,
    pub identity: Vec<Identity>,
    pub sticky_settings: Vec<StickySettings>,

    pub kind: String,
    pub custom_domain_verification_id: String,
    pub default_hostname: String,
    pub outbound_ip_addresses: String,
    pub outbound_ip_address_list: Vec<String>,
    pub possible_outbound_ip_addresses: String,
    pub possible_outbound_ip_address_list: Vec<String>,
}

impl Default for SiteCommon {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            resource_group_name: String::new(),
            location: String::new(),
            service_plan_id: String::new(),
            app_service_id: String::new(),
            function_app_id: String::new(),
            app_settings: HashMap::new(),
            client_affinity_enabled: false,
            client_certificate_enabled: false,
            client_certificate_mode: "Required".to_string(),
            client_certificate_exclusion_paths: String::new(),
            enabled: true,
            ftp_publish_basic_authentication_enabled: true,
            webdeploy_publish_basic_authentication_enabled: true,
            https_only: false,
            public_network_access_enabled: true,
            key_vault_reference_identity_id: String::new(),
            virtual_network_subnet_id: String::new(),
            tags: HashMap::new(),
            auth_settings: Vec::new(),
            auth_settings_v2: Vec::new(),
            connection_string: Vec::new(),
            identity: Vec::new(),
            sticky_settings: Vec::new(),
            kind: String::new(),
            custom_domain_verification_id: String::new(),
            default_hostname: String::new(),
            outbound_ip_addresses: String::new(),
            outbound_ip_address_list: Vec::new(),
            possible_outbound_ip_addresses: String::new(),
            possible_outbound_ip_address_list: Vec::new(),
        }
    }
}

impl SiteCommon {
    /// `app_service_id` or `function_app_id`, whichever the slot schema uses
    fn parent_id(&self) -> &str {
        if self.function_app_id.is_empty() {
            &self.app_service_id
        } else {
            &self.function_app_id
        }
    }
}

/// Inputs to a `site_config` expansion besides the model itself
pub struct ExpandContext<'a> {
    pub site_name: &'a str,
    pub plan_sku: &'a str,
    pub environment: CloudEnvironment,
    /// The configuration the site has now; `None` on create
    pub existing: Option<&'a SiteConfig>,
    /// The site's current app settings; empty on create
    pub current_app_settings: &'a HashMap<String, String>,
}

/// What Read collected from the API, handed to [`SiteFlavor::flatten`]
pub struct SiteRead {
    pub site: Site,
    pub config: SiteConfig,
    /// Unfiltered, as listed by `config/appsettings/list`
    pub app_settings: HashMap<String, String>,
    /// `config/metadata`, Windows sites only
    pub metadata: HashMap<String, String>,
}

pub trait SiteFlavor:
    Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// e.g. "Linux Web App"
    const LABEL: &'static str;
    const FUNCTION_APP: bool;
    const WINDOWS: bool;
    const APP_TYPE_NAME: &'static str;
    const SLOT_TYPE_NAME: &'static str;

    fn common(&self) -> &SiteCommon;
    fn common_mut(&mut self) -> &mut SiteCommon;

    /// Top-level attributes beyond [`SiteCommon`]
    fn extra_attributes() -> Vec<Attribute> {
        Vec::new()
    }

    fn site_config_schema() -> NestedBlock;

    /// Checks that need no API call
    fn validate(&self) -> Result<(), ExpandError> {
        Ok(())
    }

    /// Checks against the service plan's SKU
    fn validate_plan(&self, _sku: &str) -> Result<(), ExpandError> {
        Ok(())
    }

    /// The site configuration to send, app settings included
    fn expand_site_config(&self, ctx: &ExpandContext<'_>) -> Result<SiteConfig, ExpandError>;

    fn daily_memory_time_quota(&self) -> Option<i64> {
        None
    }

    /// `CURRENT_STACK` metadata value (Windows Web Apps)
    fn current_stack(&self) -> Option<&str> {
        None
    }

    /// Build the model from what the API reported. `common` is already
    /// flattened except for `app_settings`, which the flavor filters.
    fn flatten(common: SiteCommon, read: &SiteRead, prior: &Self) -> Self;
}

/// `kind` sent on create
pub fn kind<F: SiteFlavor>() -> &'static str {
    match (F::FUNCTION_APP, F::WINDOWS) {
        (false, false) => "app,linux",
        (false, true) => "app",
        (true, false) => "functionapp,linux",
        (true, true) => "functionapp",
    }
}

/// Whether an existing site's `kind` belongs to this flavor
pub fn kind_matches<F: SiteFlavor>(kind: &str) -> bool {
    let kind = kind.to_ascii_lowercase();
    kind.contains("functionapp") == F::FUNCTION_APP && kind.contains("linux") != F::WINDOWS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteTarget {
    App,
    Slot,
}

#[derive(Debug, Clone)]
enum SiteId {
    App(WebAppId),
    Slot(WebAppSlotId),
}

impl SiteId {
    fn app_id(&self) -> WebAppId {
        match self {
            SiteId::App(id) => id.clone(),
            SiteId::Slot(id) => id.parent(),
        }
    }

    fn name(&self) -> &str {
        match self {
            SiteId::App(id) => &id.site_name,
            SiteId::Slot(id) => &id.slot_name,
        }
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteId::App(id) => write!(f, "{}", id),
            SiteId::Slot(id) => write!(f, "{}", id),
        }
    }
}

fn invalid(err: ExpandError) -> Diagnostic {
    Diagnostic::error("Invalid configuration", err.message)
}

/// "West Europe" and "westeurope" are the same region
fn normalize_location(location: &str) -> String {
    location.replace(' ', "").to_ascii_lowercase()
}

fn split_addresses(addresses: &str) -> Vec<String> {
    addresses
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

fn optional_bool(name: &str, default: bool, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Bool)
        .description(description)
        .optional()
        .default(StaticDefault::bool(default))
        .build()
}

fn computed_string(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .computed()
        .build()
}

fn string_map(name: &str, description: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::Map(Box::new(AttributeType::String)))
        .description(description)
        .optional()
        .build()
}

fn computed_list(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::List(Box::new(AttributeType::String)))
        .computed()
        .build()
}

pub fn site_schema<F: SiteFlavor>(target: SiteTarget) -> Schema {
    let description = match target {
        SiteTarget::App => format!("Manages a {}", F::LABEL),
        SiteTarget::Slot => format!("Manages a {} Slot", F::LABEL),
    };

    let mut builder = SchemaBuilder::new()
        .version(0)
        .description(&description)
        .attribute(computed_string("id"))
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .description("The name of the site")
                .required()
                .requires_replace()
                .build(),
        );

    builder = match target {
        SiteTarget::App => builder
            .attribute(
                AttributeBuilder::new("resource_group_name", AttributeType::String)
                    .required()
                    .requires_replace()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("location", AttributeType::String)
                    .required()
                    .requires_replace()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("service_plan_id", AttributeType::String)
                    .description("The ID of the App Service Plan to run in")
                    .required()
                    .build(),
            ),
        SiteTarget::Slot => {
            let parent = if F::FUNCTION_APP {
                "function_app_id"
            } else {
                "app_service_id"
            };
            builder
                .attribute(
                    AttributeBuilder::new(parent, AttributeType::String)
                        .description("The ID of the App this slot belongs to")
                        .required()
                        .requires_replace()
                        .build(),
                )
                .attribute(
                    AttributeBuilder::new("service_plan_id", AttributeType::String)
                        .description("The ID of the App Service Plan, when it differs from the App's")
                        .optional()
                        .computed()
                        .build(),
                )
        }
    };

    builder = builder
        .attribute(string_map("app_settings", "Non-secret app settings"))
        .attribute(optional_bool("client_affinity_enabled", false, "Send session affinity cookies"))
        .attribute(optional_bool("client_certificate_enabled", false, "Require client certificates"))
        .attribute(
            AttributeBuilder::new("client_certificate_mode", AttributeType::String)
                .optional()
                .default(StaticDefault::string("Required"))
                .validator(StringOneOf::create(CLIENT_CERT_MODES))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("client_certificate_exclusion_paths", AttributeType::String)
                .description("Semicolon separated paths that do not require a client certificate")
                .optional()
                .build(),
        )
        .attribute(optional_bool("enabled", true, "Whether the site is enabled"))
        .attribute(optional_bool("ftp_publish_basic_authentication_enabled", true, "Allow FTP basic authentication"))
        .attribute(optional_bool(
            "webdeploy_publish_basic_authentication_enabled",
            true,
            "Allow Web Deploy basic authentication",
        ))
        .attribute(optional_bool("https_only", false, "Redirect HTTP to HTTPS"))
        .attribute(optional_bool("public_network_access_enabled", true, "Allow public network access"))
        .attribute(
            AttributeBuilder::new("key_vault_reference_identity_id", AttributeType::String)
                .description("Identity used for Key Vault references")
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("virtual_network_subnet_id", AttributeType::String)
                .description("Subnet for regional virtual network integration")
                .optional()
                .build(),
        )
        .attribute(string_map("tags", "Tags to assign"))
        .attribute(computed_string("kind"))
        .attribute(computed_string("custom_domain_verification_id"))
        .attribute(computed_string("default_hostname"))
        .attribute(computed_string("outbound_ip_addresses"))
        .attribute(computed_list("outbound_ip_address_list"))
        .attribute(computed_string("possible_outbound_ip_addresses"))
        .attribute(computed_list("possible_outbound_ip_address_list"))
        .attributes(F::extra_attributes())
        .block(F::site_config_schema())
        .block(auth_settings::schema())
        .block(auth_settings_v2::schema())
        .block(connection_strings::schema())
        .block(identity::schema());

    if target == SiteTarget::App {
        builder = builder.block(sticky_settings::schema());
    }

    builder.build()
}

/// One of the site resources. `F` picks Linux or Windows, Web App or
/// Function App; `target` picks the App or one of its slots.
pub struct SiteResource<F: SiteFlavor> {
    target: SiteTarget,
    provider_data: Option<AppServiceProviderData>,
    flavor: PhantomData<fn() -> F>,
}

impl<F: SiteFlavor> SiteResource<F> {
    pub fn app() -> Self {
        Self {
            target: SiteTarget::App,
            provider_data: None,
            flavor: PhantomData,
        }
    }

    pub fn slot() -> Self {
        Self {
            target: SiteTarget::Slot,
            provider_data: None,
            flavor: PhantomData,
        }
    }

    fn label(&self) -> String {
        match self.target {
            SiteTarget::App => F::LABEL.to_string(),
            SiteTarget::Slot => format!("{} Slot", F::LABEL),
        }
    }

    fn parse_id(&self, id: &str) -> Result<SiteId, IdError> {
        match self.target {
            SiteTarget::App => WebAppId::parse(id).map(SiteId::App),
            SiteTarget::Slot => WebAppSlotId::parse(id).map(SiteId::Slot),
        }
    }

    /// The ID a new site will get
    fn new_id(&self, data: &AppServiceProviderData, common: &SiteCommon) -> Result<SiteId, Diagnostic> {
        match self.target {
            SiteTarget::App => Ok(SiteId::App(WebAppId::new(
                &data.subscription_id,
                &common.resource_group_name,
                &common.name,
            ))),
            SiteTarget::Slot => {
                let parent = WebAppId::parse(common.parent_id())
                    .map_err(|e| Diagnostic::error("Invalid parent App ID", e.to_string()))?;
                Ok(SiteId::Slot(parent.slot(&common.name)))
            }
        }
    }

    fn envelope(
        &self,
        model: &F,
        location: String,
        plan_id: &ServicePlanId,
        site_config: Option<SiteConfig>,
        identity: Option<ManagedServiceIdentity>,
        update: bool,
    ) -> Site {
        let common = model.common();
        let public_network_access = if common.public_network_access_enabled {
            "Enabled"
        } else {
            "Disabled"
        };
        let mut site_config = site_config;
        if let Some(config) = site_config.as_mut() {
            config.public_network_access = Some(public_network_access.to_string());
        }
        // an empty value on update removes the integration
        let subnet = if update {
            Some(common.virtual_network_subnet_id.clone())
        } else {
            non_empty(&common.virtual_network_subnet_id)
        };

        Site {
            kind: Some(kind::<F>().to_string()),
            location,
            tags: Some(common.tags.clone()),
            identity,
            properties: Some(SiteProperties {
                server_farm_id: Some(plan_id.to_string()),
                enabled: Some(common.enabled),
                https_only: Some(common.https_only),
                client_affinity_enabled: Some(common.client_affinity_enabled),
                client_cert_enabled: Some(common.client_certificate_enabled),
                client_cert_mode: Some(common.client_certificate_mode.clone()),
                client_cert_exclusion_paths: non_empty(&common.client_certificate_exclusion_paths),
                public_network_access: Some(public_network_access.to_string()),
                virtual_network_subnet_id: subnet,
                key_vault_reference_identity: non_empty(&common.key_vault_reference_identity_id),
                vnet_route_all_enabled: site_config.as_ref().and_then(|c| c.vnet_route_all_enabled),
                daily_memory_time_quota: model.daily_memory_time_quota(),
                site_config,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    async fn publishing_policies(
        &self,
        data: &AppServiceProviderData,
        id: &SiteId,
        common: &SiteCommon,
        prior: Option<&SiteCommon>,
    ) -> Result<(), Diagnostic> {
        let policies = [
            (
                PublishingPolicy::Ftp,
                common.ftp_publish_basic_authentication_enabled,
                prior.map(|p| p.ftp_publish_basic_authentication_enabled),
            ),
            (
                PublishingPolicy::Scm,
                common.webdeploy_publish_basic_authentication_enabled,
                prior.map(|p| p.webdeploy_publish_basic_authentication_enabled),
            ),
        ];

        for (policy, allow, before) in policies {
            // new sites allow basic auth, so only a denial needs a call
            let changed = before.map_or(!allow, |before| before != allow);
            if changed {
                tracing::debug!("Setting {:?} basic auth on {} to {}", policy, id, allow);
                data.client
                    .sites()
                    .update_publishing_policy(id, policy, allow)
                    .await
                    .map_err(|e| {
                        operation_error("updating basic auth policies for", &self.label(), id, &e)
                    })?;
            }
        }
        Ok(())
    }

    async fn write_current_stack(
        &self,
        data: &AppServiceProviderData,
        id: &SiteId,
        stack: &str,
    ) -> Result<(), Diagnostic> {
        let sites = data.client.sites();
        let wrap = |e: ApiError| operation_error("updating metadata for", &self.label(), id, &e);

        let mut metadata = sites.list_metadata(id).await.map_err(wrap)?.properties;
        metadata.insert(CURRENT_STACK.to_string(), stack.to_string());
        sites
            .update_metadata(id, &StringDictionary::new(metadata))
            .await
            .map_err(wrap)?;
        Ok(())
    }

    async fn create_site(
        &self,
        data: &AppServiceProviderData,
        ctx: &Context,
        model: &F,
    ) -> Result<SiteId, Diagnostic> {
        let label = self.label();
        let common = model.common();
        model.validate().map_err(invalid)?;

        let id = self.new_id(data, common)?;
        let sites = data.client.sites();

        match sites.get(&id).await {
            Ok(_) => return Err(requires_import(self.type_name(), &id)),
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                return Err(operation_error(
                    "checking for presence of existing",
                    &label,
                    &id,
                    &e,
                ))
            }
        }

        // slots live where their App lives and default to its plan
        let (location, plan) = match &id {
            SiteId::App(_) => (common.location.clone(), common.service_plan_id.clone()),
            SiteId::Slot(slot_id) => {
                let parent_id = slot_id.parent();
                let parent = sites
                    .get(&parent_id)
                    .await
                    .map_err(|e| operation_error("reading", F::LABEL, &parent_id, &e))?;
                let plan = if common.service_plan_id.is_empty() {
                    parent
                        .properties
                        .as_ref()
                        .and_then(|p| p.server_farm_id.clone())
                        .unwrap_or_default()
                } else {
                    common.service_plan_id.clone()
                };
                (parent.location, plan)
            }
        };

        let plan_id = ServicePlanId::parse(&plan).map_err(|e| {
            Diagnostic::error("Invalid service_plan_id", e.to_string())
                .with_attribute(AttributePath::new("service_plan_id"))
        })?;
        let plan = data
            .client
            .service_plans()
            .get(&plan_id)
            .await
            .map_err(|e| operation_error("reading", "App Service Plan", &plan_id, &e))?;
        model.validate_plan(plan.sku_name()).map_err(invalid)?;

        let no_settings = HashMap::new();
        let site_config = model
            .expand_site_config(&ExpandContext {
                site_name: id.name(),
                plan_sku: plan.sku_name(),
                environment: data.environment,
                existing: None,
                current_app_settings: &no_settings,
            })
            .map_err(invalid)?;
        let identity = identity::expand(&common.identity).map_err(invalid)?;

        let envelope = self.envelope(model, location, &plan_id, Some(site_config), identity, false);

        tracing::info!("Creating {} {}", label, id);
        let response = sites
            .create_or_update(&id, &envelope)
            .await
            .map_err(|e| operation_error("creating", &label, &id, &e))?;
        Poller::new(&data.client, &response)
            .poll_until_done(ctx)
            .await
            .map_err(|e| operation_error("creating", &label, &id, &e))?;

        self.publishing_policies(data, &id, common, None).await?;

        if let SiteId::App(app_id) = &id {
            if let Some(names) = sticky_settings::expand(&common.sticky_settings) {
                sites
                    .update_slot_config_names(app_id, &SlotConfigNamesResource { properties: names })
                    .await
                    .map_err(|e| operation_error("updating sticky settings for", &label, &id, &e))?;
            }
        }

        if !common.auth_settings.is_empty() {
            sites
                .update_auth_settings(&id, &auth_settings::expand(&common.auth_settings))
                .await
                .map_err(|e| operation_error("updating auth settings for", &label, &id, &e))?;
        }
        if let Some(v2) = auth_settings_v2::expand(&common.auth_settings_v2) {
            sites
                .update_auth_settings_v2(&id, &v2)
                .await
                .map_err(|e| operation_error("updating auth settings v2 for", &label, &id, &e))?;
        }
        if !common.connection_string.is_empty() {
            sites
                .update_connection_strings(&id, &connection_strings::expand(&common.connection_string))
                .await
                .map_err(|e| operation_error("updating connection strings for", &label, &id, &e))?;
        }
        if let Some(stack) = model.current_stack() {
            self.write_current_stack(data, &id, stack).await?;
        }

        Ok(id)
    }

    async fn update_site(
        &self,
        data: &AppServiceProviderData,
        ctx: &Context,
        model: &F,
        prior: &F,
    ) -> Result<SiteId, Diagnostic> {
        let label = self.label();
        let common = model.common();
        let before = prior.common();
        model.validate().map_err(invalid)?;

        let id = self
            .parse_id(&before.id)
            .map_err(|e| Diagnostic::error("Invalid resource ID", e.to_string()))?;
        let sites = data.client.sites();
        let reading = |e: ApiError| operation_error("reading", &label, &id, &e);

        let existing = sites.get(&id).await.map_err(reading)?;
        let existing_config = sites.get_configuration(&id).await.map_err(reading)?.properties;
        let current_settings = sites
            .list_application_settings(&id)
            .await
            .map_err(reading)?
            .properties;

        let current_plan = existing
            .properties
            .as_ref()
            .and_then(|p| p.server_farm_id.clone())
            .unwrap_or_default();
        let plan = if common.service_plan_id.is_empty() {
            current_plan.clone()
        } else {
            common.service_plan_id.clone()
        };
        let plan_id = ServicePlanId::parse(&plan).map_err(|e| {
            Diagnostic::error("Invalid service_plan_id", e.to_string())
                .with_attribute(AttributePath::new("service_plan_id"))
        })?;

        // moving a slot between plans must not race other changes to either plan
        let new_plan = plan_id.to_string();
        let _plan_locks = if self.target == SiteTarget::Slot
            && !current_plan.is_empty()
            && !current_plan.eq_ignore_ascii_case(&new_plan)
        {
            data.locks
                .lock_all_within(ctx, &[current_plan.as_str(), new_plan.as_str()])
                .await
                .map_err(|reason| {
                    operation_error(
                        "updating",
                        &label,
                        &id,
                        &ApiError::Cancelled(reason.to_string()),
                    )
                })?
        } else {
            Vec::new()
        };

        let plan = data
            .client
            .service_plans()
            .get(&plan_id)
            .await
            .map_err(|e| operation_error("reading", "App Service Plan", &plan_id, &e))?;
        model.validate_plan(plan.sku_name()).map_err(invalid)?;

        let mut site_config = model
            .expand_site_config(&ExpandContext {
                site_name: id.name(),
                plan_sku: plan.sku_name(),
                environment: data.environment,
                existing: Some(&existing_config),
                current_app_settings: &current_settings,
            })
            .map_err(invalid)?;
        let settings = site_config.app_settings.take().unwrap_or_default();

        let identity = match identity::expand(&common.identity).map_err(invalid)? {
            Some(identity) => Some(identity),
            None if !before.identity.is_empty() => Some(identity::none()),
            None => None,
        };

        let envelope = self.envelope(model, existing.location.clone(), &plan_id, None, identity, true);

        tracing::info!("Updating {} {}", label, id);
        sites
            .update(&id, &envelope)
            .await
            .map_err(|e| operation_error("updating", &label, &id, &e))?;
        sites
            .update_configuration(&id, &SiteConfigResource { properties: site_config })
            .await
            .map_err(|e| operation_error("updating site config for", &label, &id, &e))?;
        sites
            .update_application_settings(&id, &app_settings::expand_for_update(&settings))
            .await
            .map_err(|e| operation_error("updating app settings for", &label, &id, &e))?;

        self.publishing_policies(data, &id, common, Some(before)).await?;

        if let SiteId::App(app_id) = &id {
            if common.sticky_settings != before.sticky_settings {
                let names = sticky_settings::expand(&common.sticky_settings).unwrap_or(SlotConfigNames {
                    app_setting_names: Some(Vec::new()),
                    connection_string_names: Some(Vec::new()),
                });
                sites
                    .update_slot_config_names(app_id, &SlotConfigNamesResource { properties: names })
                    .await
                    .map_err(|e| operation_error("updating sticky settings for", &label, &id, &e))?;
            }
        }

        if common.auth_settings != before.auth_settings {
            sites
                .update_auth_settings(&id, &auth_settings::expand(&common.auth_settings))
                .await
                .map_err(|e| operation_error("updating auth settings for", &label, &id, &e))?;
        }
        if common.auth_settings_v2 != before.auth_settings_v2 {
            let v2 = auth_settings_v2::expand(&common.auth_settings_v2)
                .unwrap_or_else(auth_settings_v2::disabled);
            sites
                .update_auth_settings_v2(&id, &v2)
                .await
                .map_err(|e| operation_error("updating auth settings v2 for", &label, &id, &e))?;
        }
        if common.connection_string != before.connection_string {
            sites
                .update_connection_strings(&id, &connection_strings::expand(&common.connection_string))
                .await
                .map_err(|e| operation_error("updating connection strings for", &label, &id, &e))?;
        }
        if model.current_stack() != prior.current_stack() {
            if let Some(stack) = model.current_stack() {
                self.write_current_stack(data, &id, stack).await?;
            }
        }

        Ok(id)
    }

    /// `Ok(None)` when the site no longer exists
    async fn read_site(
        &self,
        data: &AppServiceProviderData,
        id: &SiteId,
        prior: &F,
    ) -> Result<Option<F>, Diagnostic> {
        let label = self.label();
        let sites = data.client.sites();

        let site = match sites.get(id).await {
            Ok(site) => site,
            Err(e) if e.is_not_found() => {
                tracing::info!("{} {} not found, removing from state", label, id);
                return Ok(None);
            }
            Err(e) => return Err(operation_error("reading", &label, id, &e)),
        };
        let reading = |what: &str, e: ApiError| operation_error(&format!("reading {} for", what), &label, id, &e);

        let config = sites
            .get_configuration(id)
            .await
            .map_err(|e| reading("site config", e))?
            .properties;
        let settings = sites
            .list_application_settings(id)
            .await
            .map_err(|e| reading("app settings", e))?
            .properties;
        let connection = sites
            .list_connection_strings(id)
            .await
            .map_err(|e| reading("connection strings", e))?;
        let auth = sites
            .get_auth_settings(id)
            .await
            .map_err(|e| reading("auth settings", e))?;
        let uses_v2 = auth
            .properties
            .config_version
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("v2"));
        let auth_v2 = if uses_v2 {
            Some(
                sites
                    .get_auth_settings_v2(id)
                    .await
                    .map_err(|e| reading("auth settings v2", e))?,
            )
        } else {
            None
        };
        let sticky = match id {
            SiteId::App(app_id) => Some(
                sites
                    .get_slot_config_names(app_id)
                    .await
                    .map_err(|e| reading("sticky settings", e))?
                    .properties,
            ),
            SiteId::Slot(_) => None,
        };
        let metadata = if F::WINDOWS {
            sites
                .list_metadata(id)
                .await
                .map_err(|e| reading("metadata", e))?
                .properties
        } else {
            HashMap::new()
        };
        let ftp = sites
            .get_publishing_policy(id, PublishingPolicy::Ftp)
            .await
            .map_err(|e| reading("FTP basic auth policy", e))?;
        let scm = sites
            .get_publishing_policy(id, PublishingPolicy::Scm)
            .await
            .map_err(|e| reading("Web Deploy basic auth policy", e))?;

        let before = prior.common();
        let props = site.properties.clone().unwrap_or_default();
        let outbound = props.outbound_ip_addresses.clone().unwrap_or_default();
        let possible_outbound = props.possible_outbound_ip_addresses.clone().unwrap_or_default();
        let server_farm_id = props.server_farm_id.clone().unwrap_or_default();

        let mut auth_settings = auth_settings::flatten(Some(&auth));
        auth_settings::preserve_secrets(&mut auth_settings, &before.auth_settings);

        let mut common = SiteCommon {
            id: id.to_string(),
            name: id.name().to_string(),
            service_plan_id: ServicePlanId::parse(&server_farm_id)
                .map(|p| p.to_string())
                .unwrap_or(server_farm_id),
            client_affinity_enabled: props.client_affinity_enabled.unwrap_or(false),
            client_certificate_enabled: props.client_cert_enabled.unwrap_or(false),
            client_certificate_mode: props
                .client_cert_mode
                .clone()
                .unwrap_or_else(|| "Required".to_string()),
            client_certificate_exclusion_paths: props
                .client_cert_exclusion_paths
                .clone()
                .unwrap_or_default(),
            enabled: props.enabled.unwrap_or(true),
            ftp_publish_basic_authentication_enabled: ftp.properties.allow,
            webdeploy_publish_basic_authentication_enabled: scm.properties.allow,
            https_only: props.https_only.unwrap_or(false),
            public_network_access_enabled: !props
                .public_network_access
                .as_deref()
                .is_some_and(|p| p.eq_ignore_ascii_case("Disabled")),
            key_vault_reference_identity_id: props
                .key_vault_reference_identity
                .clone()
                .unwrap_or_default(),
            virtual_network_subnet_id: props.virtual_network_subnet_id.clone().unwrap_or_default(),
            tags: site.tags.clone().unwrap_or_default(),
            auth_settings,
            auth_settings_v2: auth_settings_v2::flatten(auth_v2.as_ref()),
            connection_string: connection_strings::flatten(Some(connection)),
            identity: identity::flatten(site.identity.as_ref()),
            sticky_settings: sticky_settings::flatten(sticky),
            kind: site.kind.clone().unwrap_or_default(),
            custom_domain_verification_id: props
                .custom_domain_verification_id
                .clone()
                .unwrap_or_default(),
            default_hostname: props.default_host_name.clone().unwrap_or_default(),
            outbound_ip_address_list: split_addresses(&outbound),
            outbound_ip_addresses: outbound,
            possible_outbound_ip_address_list: split_addresses(&possible_outbound),
            possible_outbound_ip_addresses: possible_outbound,
            ..Default::default()
        };

        match id {
            SiteId::App(app_id) => {
                common.resource_group_name = app_id.resource_group.clone();
                common.location = normalize_location(&site.location);
            }
            SiteId::Slot(slot_id) => {
                let parent = slot_id.parent().to_string();
                if F::FUNCTION_APP {
                    common.function_app_id = parent;
                } else {
                    common.app_service_id = parent;
                }
            }
        }

        let read = SiteRead {
            site,
            config,
            app_settings: settings,
            metadata,
        };
        Ok(Some(F::flatten(common, &read, prior)))
    }

    fn encode(&self, model: &F) -> Result<DynamicValue, Diagnostic> {
        state_from_model(model, &site_schema::<F>(self.target))
            .map_err(|e| Diagnostic::error("Failed to encode state", e.to_string()))
    }

    /// Read back after create or update
    async fn refreshed_state(
        &self,
        data: &AppServiceProviderData,
        id: &SiteId,
        planned: &F,
    ) -> Result<DynamicValue, Diagnostic> {
        match self.read_site(data, id, planned).await? {
            Some(model) => self.encode(&model),
            None => Err(Diagnostic::error(
                format!("{} not found", self.label()),
                format!("{} {} could not be read back", self.label(), id),
            )),
        }
    }
}

#[async_trait]
impl<F: SiteFlavor> Resource for SiteResource<F> {
    fn type_name(&self) -> &str {
        match self.target {
            SiteTarget::App => F::APP_TYPE_NAME,
            SiteTarget::Slot => F::SLOT_TYPE_NAME,
        }
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
            schema: site_schema::<F>(self.target),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let schema = site_schema::<F>(self.target);
        let mut diagnostics = validate_config(&schema.block, &request.config);

        match request.config.decode_model::<F>() {
            Ok(model) => {
                if let Err(e) = model.validate() {
                    diagnostics.push(invalid(e));
                }
                if let Err(e) = identity::expand(&model.common().identity) {
                    diagnostics.push(invalid(e).with_attribute(AttributePath::new("identity")));
                }
                let parent = model.common().parent_id();
                if self.target == SiteTarget::Slot && !parent.is_empty() {
                    if let Err(e) = WebAppId::parse(parent) {
                        diagnostics.push(Diagnostic::error("Invalid parent App ID", e.to_string()));
                    }
                }
            }
            Err(e) => diagnostics.push(Diagnostic::error(
                "Failed to decode configuration",
                e.to_string(),
            )),
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];

        let Some(data) = &self.provider_data else {
            diagnostics.push(not_configured());
            return CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics,
            };
        };

        let planned = match request.planned_state.decode_model::<F>() {
            Ok(model) => model,
            Err(e) => {
                diagnostics.push(Diagnostic::error("Failed to decode planned state", e.to_string()));
                return CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                };
            }
        };

        let ctx = TIMEOUTS.create_context(&ctx);
        let label = self.label();
        let result = within(&ctx, "creating", &label, &planned.common().name, async {
            let id = self.create_site(data, &ctx, &planned).await?;
            self.refreshed_state(data, &id, &planned).await
        })
        .await;

        match result {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                diagnostics,
            },
            Err(diag) => {
                diagnostics.push(diag);
                CreateResourceResponse {
                    new_state: request.planned_state,
                    diagnostics,
                }
            }
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];

        let Some(data) = &self.provider_data else {
            diagnostics.push(not_configured());
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics,
            };
        };

        let prior = request.current_state.decode_model::<F>().unwrap_or_default();
        let id = match self.parse_id(&prior.common().id) {
            Ok(id) => id,
            Err(e) => {
                diagnostics.push(Diagnostic::error("Invalid resource ID", e.to_string()));
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                };
            }
        };

        let ctx = TIMEOUTS.read_context(&ctx);
        let label = self.label();
        let read = self.read_site(data, &id, &prior);
        let result = match within(&ctx, "reading", &label, &id, read).await {
            Ok(Some(model)) => self.encode(&model).map(Some),
            Ok(None) => Ok(None),
            Err(diag) => Err(diag),
        };

        match result {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics,
            },
            Err(diag) => {
                diagnostics.push(diag);
                ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                }
            }
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut diagnostics = vec![];

        let Some(data) = &self.provider_data else {
            diagnostics.push(not_configured());
            return UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics,
            };
        };

        let models = request
            .planned_state
            .decode_model::<F>()
            .and_then(|planned| Ok((planned, request.prior_state.decode_model::<F>()?)));
        let (planned, prior) = match models {
            Ok(models) => models,
            Err(e) => {
                diagnostics.push(Diagnostic::error("Failed to decode state", e.to_string()));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                };
            }
        };

        let ctx = TIMEOUTS.update_context(&ctx);
        let label = self.label();
        let result = within(&ctx, "updating", &label, &prior.common().id, async {
            let id = self.update_site(data, &ctx, &planned, &prior).await?;
            self.refreshed_state(data, &id, &planned).await
        })
        .await;

        match result {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                diagnostics,
            },
            Err(diag) => {
                diagnostics.push(diag);
                UpdateResourceResponse {
                    new_state: request.prior_state,
                    diagnostics,
                }
            }
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let Some(data) = &self.provider_data else {
            diagnostics.push(not_configured());
            return DeleteResourceResponse { diagnostics };
        };

        let prior = request.prior_state.decode_model::<F>().unwrap_or_default();
        let id = match self.parse_id(&prior.common().id) {
            Ok(id) => id,
            Err(e) => {
                diagnostics.push(Diagnostic::error("Invalid resource ID", e.to_string()));
                return DeleteResourceResponse { diagnostics };
            }
        };

        let ctx = TIMEOUTS.delete_context(&ctx);
        let label = self.label();
        tracing::info!("Deleting {} {}", label, id);
        match race(&ctx, data.client.sites().delete(&id))
            .await
            .and_then(|r| r)
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} {} was already gone", label, id);
            }
            Err(e) => diagnostics.push(operation_error("deleting", &label, &id, &e)),
        }

        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl<F: SiteFlavor> ResourceWithConfigure for SiteResource<F> {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];
        match extract_provider_data(request.provider_data) {
            Ok(data) => self.provider_data = Some(data),
            Err(diag) => diagnostics.push(diag),
        }
        ConfigureResourceResponse { diagnostics }
    }
}

#[async_trait]
impl<F: SiteFlavor> ResourceWithImportState for SiteResource<F> {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();

        let id = match self.parse_id(&request.id) {
            Ok(id) => id,
            Err(e) => {
                response
                    .diagnostics
                    .push(Diagnostic::error("Invalid import ID", e.to_string()));
                return response;
            }
        };

        let Some(data) = &self.provider_data else {
            response.diagnostics.push(not_configured());
            return response;
        };

        let read_ctx = TIMEOUTS.read_context(&ctx);
        let site = match race(&read_ctx, data.client.sites().get(&id)).await.and_then(|r| r) {
            Ok(site) => site,
            Err(e) => {
                response
                    .diagnostics
                    .push(operation_error("importing", &self.label(), &id, &e));
                return response;
            }
        };

        let kind = site.kind.unwrap_or_default();
        if !kind_matches::<F>(&kind) {
            response.diagnostics.push(Diagnostic::error(
                "Incorrect resource type",
                format!(
                    "{} has kind {:?} and cannot be imported as a {}",
                    id,
                    kind,
                    self.label()
                ),
            ));
            return response;
        }

        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

#[cfg(test)]
#[path = "./site_test.rs"]
mod site_test;
