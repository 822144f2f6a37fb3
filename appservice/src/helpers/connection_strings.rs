//! `connection_string` blocks

use crate::api::sites::{ConnStringValueTypePair, ConnectionStringDictionary};
use serde::{Deserialize, Serialize};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder};
use tfplug::validator::StringOneOf;

const CONNECTION_STRING_TYPES: &[&str] = &[
    "APIHub",
    "Custom",
    "DocDb",
    "EventHub",
    "MySQL",
    "NotificationHub",
    "PostgreSQL",
    "RedisCache",
    "ServiceBus",
    "SQLAzure",
    "SQLServer",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionString {
    pub name: String,
    #[serde(rename = "type")]
    pub connection_type: String,
    pub value: String,
}

pub fn schema() -> NestedBlock {
    NestedBlockBuilder::set("connection_string")
        .attribute(
            AttributeBuilder::new("name", AttributeType::String)
                .description("The name of the connection string")
                .required()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("type", AttributeType::String)
                .description("Type of database")
                .required()
                .validator(StringOneOf::create(CONNECTION_STRING_TYPES))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("value", AttributeType::String)
                .description("The connection string value")
                .required()
                .sensitive()
                .build(),
        )
        .build()
}

/// Name-keyed dictionary; an empty list clears every connection string
pub fn expand(input: &[ConnectionString]) -> ConnectionStringDictionary {
    ConnectionStringDictionary {
        properties: input
            .iter()
            .map(|cs| {
                (
                    cs.name.clone(),
                    ConnStringValueTypePair {
                        value: cs.value.clone(),
                        connection_type: cs.connection_type.clone(),
                    },
                )
            })
            .collect(),
    }
}

pub fn flatten(input: Option<ConnectionStringDictionary>) -> Vec<ConnectionString> {
    let Some(dict) = input else {
        return Vec::new();
    };

    let mut result: Vec<ConnectionString> = dict
        .properties
        .into_iter()
        .map(|(name, pair)| ConnectionString {
            name,
            connection_type: pair.connection_type,
            value: pair.value,
        })
        .collect();
    result.sort_by(|a, b| a.name.cmp(&b.name));
    result
}
