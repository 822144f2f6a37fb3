//! `ip_restriction` / `scm_ip_restriction` blocks

use super::{non_empty, ExpandError};
use crate::api::sites::IpSecurityRestriction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tfplug::defaults::StaticDefault;
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder};
use tfplug::validator::{NumberBetween, StringOneOf};

const SERVICE_TAG: &str = "ServiceTag";

const HEADER_FORWARDED_HOST: &str = "x-forwarded-host";
const HEADER_FORWARDED_FOR: &str = "x-forwarded-for";
const HEADER_AZURE_FDID: &str = "x-azure-fdid";
const HEADER_FD_HEALTH_PROBE: &str = "x-fd-healthprobe";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpRestriction {
    pub ip_address: String,
    pub service_tag: String,
    pub virtual_network_subnet_id: String,
    pub name: String,
    pub priority: i64,
    pub action: String,
    pub headers: Vec<IpRestrictionHeaders>,
    pub description: String,
}

impl Default for IpRestriction {
    fn default() -> Self {
        Self {
            ip_address: String::new(),
            service_tag: String::new(),
            virtual_network_subnet_id: String::new(),
            name: String::new(),
            priority: 65000,
            action: "Allow".to_string(),
            headers: Vec::new(),
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpRestrictionHeaders {
    pub x_forwarded_host: Vec<String>,
    pub x_forwarded_for: Vec<String>,
    pub x_azure_fdid: Vec<String>,
    pub x_fd_health_probe: Vec<String>,
}

impl IpRestriction {
    /// Exactly one address source must be set
    pub fn validate(&self) -> Result<(), ExpandError> {
        let sources = [
            &self.ip_address,
            &self.service_tag,
            &self.virtual_network_subnet_id,
        ]
        .iter()
        .filter(|s| !s.is_empty())
        .count();

        match sources {
            1 => Ok(()),
            0 => Err(ExpandError::new(
                "one of `ip_address`, `service_tag`, or `virtual_network_subnet_id` must be specified",
            )),
            _ => Err(ExpandError::new(
                "only one of `ip_address`, `service_tag`, or `virtual_network_subnet_id` can be specified",
            )),
        }
    }
}

fn string_list() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::String))
}

fn headers_schema() -> NestedBlock {
    NestedBlockBuilder::list("headers")
        .max_items(1)
        .attribute(
            AttributeBuilder::new("x_forwarded_host", string_list())
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("x_forwarded_for", string_list())
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("x_azure_fdid", string_list())
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("x_fd_health_probe", string_list())
                .optional()
                .validator(StringOneOf::create(&["1"]))
                .build(),
        )
        .build()
}

/// Schema for a restriction list named `block_name`
pub fn schema(block_name: &str) -> NestedBlock {
    NestedBlockBuilder::list(block_name)
        .attribute(
            AttributeBuilder::new("ip_address", AttributeType::String)
                .description("CIDR notation of the IP or range to match")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("service_tag", AttributeType::String)
                .description("The Service Tag used for this restriction")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("virtual_network_subnet_id", AttributeType::String)
                .description("The subnet ID used for this restriction")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .optional()
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("priority", AttributeType::Number)
                .optional()
                .default(StaticDefault::number(65000.0))
                .validator(NumberBetween::create(1.0, 2147483647.0))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("action", AttributeType::String)
                .optional()
                .default(StaticDefault::string("Allow"))
                .validator(StringOneOf::create(&["Allow", "Deny"]))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("description", AttributeType::String)
                .optional()
                .build(),
        )
        .block(headers_schema())
        .build()
}

pub fn expand(input: &[IpRestriction]) -> Result<Vec<IpSecurityRestriction>, ExpandError> {
    input
        .iter()
        .map(|v| {
            v.validate()?;

            let mut restriction = IpSecurityRestriction {
                name: non_empty(&v.name),
                ip_address: non_empty(&v.ip_address),
                vnet_subnet_resource_id: non_empty(&v.virtual_network_subnet_id),
                description: non_empty(&v.description),
                priority: Some(v.priority),
                action: Some(v.action.clone()),
                headers: expand_headers(&v.headers),
                ..Default::default()
            };
            if !v.service_tag.is_empty() {
                restriction.ip_address = Some(v.service_tag.clone());
                restriction.tag = Some(SERVICE_TAG.to_string());
            }
            Ok(restriction)
        })
        .collect()
}

fn expand_headers(input: &[IpRestrictionHeaders]) -> Option<HashMap<String, Vec<String>>> {
    let headers = input.first()?;

    let mut result = HashMap::new();
    for (key, values) in [
        (HEADER_FORWARDED_HOST, &headers.x_forwarded_host),
        (HEADER_FORWARDED_FOR, &headers.x_forwarded_for),
        (HEADER_AZURE_FDID, &headers.x_azure_fdid),
        (HEADER_FD_HEALTH_PROBE, &headers.x_fd_health_probe),
    ] {
        if !values.is_empty() {
            result.insert(key.to_string(), values.clone());
        }
    }
    Some(result)
}

/// The service always reports an implicit `Any` rule; it is not user config
pub fn flatten(input: Option<&Vec<IpSecurityRestriction>>) -> Vec<IpRestriction> {
    let Some(restrictions) = input else {
        return Vec::new();
    };

    restrictions
        .iter()
        .filter(|r| r.ip_address.as_deref() != Some("Any"))
        .map(|r| {
            let mut restriction = IpRestriction {
                name: r.name.clone().unwrap_or_default(),
                virtual_network_subnet_id: r.vnet_subnet_resource_id.clone().unwrap_or_default(),
                priority: r.priority.unwrap_or(65000),
                action: r.action.clone().unwrap_or_default(),
                headers: flatten_headers(r.headers.as_ref()),
                description: r.description.clone().unwrap_or_default(),
                ..Default::default()
            };
            if let Some(address) = &r.ip_address {
                if r.tag.as_deref() == Some(SERVICE_TAG) {
                    restriction.service_tag = address.clone();
                } else {
                    restriction.ip_address = address.clone();
                }
            }
            restriction
        })
        .collect()
}

fn flatten_headers(input: Option<&HashMap<String, Vec<String>>>) -> Vec<IpRestrictionHeaders> {
    let Some(headers) = input.filter(|h| !h.is_empty()) else {
        return Vec::new();
    };

    let get = |key: &str| headers.get(key).cloned().unwrap_or_default();
    vec![IpRestrictionHeaders {
        x_forwarded_host: get(HEADER_FORWARDED_HOST),
        x_forwarded_for: get(HEADER_FORWARDED_FOR),
        x_azure_fdid: get(HEADER_AZURE_FDID),
        x_fd_health_probe: get(HEADER_FD_HEALTH_PROBE),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restriction() -> IpRestriction {
        IpRestriction {
            name: "office".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn exactly_one_address_source() {
        let err = expand(&[restriction()]).unwrap_err();
        assert!(err.message.contains("must be specified"));

        let both = IpRestriction {
            ip_address: "10.0.0.0/24".to_string(),
            service_tag: "AzureFrontDoor.Backend".to_string(),
            ..restriction()
        };
        let err = expand(&[both]).unwrap_err();
        assert!(err.message.starts_with("only one of"));
    }

    #[test]
    fn service_tag_round_trips_through_tag() {
        let tagged = IpRestriction {
            service_tag: "AzureFrontDoor.Backend".to_string(),
            headers: vec![IpRestrictionHeaders {
                x_azure_fdid: vec!["55ce4ed1-4b06-4bf1-b40e-4638452104da".to_string()],
                ..Default::default()
            }],
            ..restriction()
        };

        let expanded = expand(&[tagged.clone()]).unwrap();
        assert_eq!(expanded[0].tag.as_deref(), Some("ServiceTag"));
        assert_eq!(expanded[0].ip_address.as_deref(), Some("AzureFrontDoor.Backend"));
        assert!(expanded[0].headers.as_ref().unwrap().contains_key("x-azure-fdid"));

        assert_eq!(flatten(Some(&expanded)), vec![tagged]);
    }

    #[test]
    fn implicit_any_rule_is_skipped() {
        let api = vec![
            IpSecurityRestriction {
                ip_address: Some("Any".to_string()),
                action: Some("Allow".to_string()),
                priority: Some(2147483647),
                name: Some("Allow all".to_string()),
                ..Default::default()
            },
            IpSecurityRestriction {
                ip_address: Some("10.0.0.0/24".to_string()),
                action: Some("Deny".to_string()),
                priority: Some(100),
                ..Default::default()
            },
        ];

        let flat = flatten(Some(&api));
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].ip_address, "10.0.0.0/24");
        assert_eq!(flat[0].action, "Deny");
        assert!(flat[0].headers.is_empty());
    }
}
