//! Planning helpers
//!
//! Builds the planned state the host hands to `create`/`update`:
//! configuration values win, absent attributes take their schema default,
//! and computed attributes become unknown on create or keep their prior
//! value on update.

use crate::schema::{Block, DefaultRequest, Schema};
use crate::types::{AttributePath, Dynamic, DynamicValue};
use std::collections::HashMap;

/// Planned state for a resource that does not exist yet
pub fn plan_create(schema: &Schema, config: &DynamicValue) -> DynamicValue {
    DynamicValue::new(plan_block(
        &schema.block,
        &config.value,
        None,
        AttributePath::root(),
    ))
}

/// Planned state for an existing resource
pub fn plan_update(schema: &Schema, prior: &DynamicValue, config: &DynamicValue) -> DynamicValue {
    DynamicValue::new(plan_block(
        &schema.block,
        &config.value,
        Some(&prior.value),
        AttributePath::root(),
    ))
}

/// Top-level attributes and blocks whose change forces replacement
pub fn requires_replace(
    schema: &Schema,
    prior: &DynamicValue,
    planned: &DynamicValue,
) -> Vec<AttributePath> {
    if prior.is_null() {
        return Vec::new();
    }

    let forced_attrs = schema
        .block
        .attributes
        .iter()
        .filter(|a| a.requires_replace)
        .map(|a| a.name.as_str());
    let forced_blocks = schema
        .block
        .block_types
        .iter()
        .filter(|b| b.requires_replace)
        .map(|b| b.type_name.as_str());

    forced_attrs
        .chain(forced_blocks)
        .map(AttributePath::new)
        .filter(|path| match planned.get(path) {
            Some(Dynamic::Unknown) => true,
            after => after != prior.get(path),
        })
        .collect()
}

fn plan_block(
    block: &Block,
    config: &Dynamic,
    prior: Option<&Dynamic>,
    path: AttributePath,
) -> Dynamic {
    let empty = HashMap::new();
    let config_members = match config {
        Dynamic::Map(m) => m,
        _ => &empty,
    };
    let prior_members = match prior {
        Some(Dynamic::Map(m)) => Some(m),
        _ => None,
    };

    let mut planned = HashMap::new();

    for attr in &block.attributes {
        let attr_path = path.clone().attribute(&attr.name);
        let value = match config_members.get(&attr.name) {
            Some(v) if !v.is_null() => v.clone(),
            _ => match &attr.default {
                Some(default) => {
                    default
                        .default_value(DefaultRequest { path: attr_path })
                        .value
                        .value
                }
                None if attr.computed => prior_members
                    .and_then(|m| m.get(&attr.name))
                    .filter(|v| !v.is_null())
                    .cloned()
                    .unwrap_or(Dynamic::Unknown),
                None => Dynamic::Null,
            },
        };
        planned.insert(attr.name.clone(), value);
    }

    for nested in &block.block_types {
        let nested_path = path.clone().attribute(&nested.type_name);
        let prior_items = match prior_members.and_then(|m| m.get(&nested.type_name)) {
            Some(Dynamic::List(items)) => items.as_slice(),
            _ => &[],
        };
        let value = match config_members.get(&nested.type_name) {
            Some(Dynamic::List(items)) => Dynamic::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(idx, item)| {
                        plan_block(
                            &nested.block,
                            item,
                            prior_items.get(idx),
                            nested_path.clone().index(idx as i64),
                        )
                    })
                    .collect(),
            ),
            Some(Dynamic::Unknown) => Dynamic::Unknown,
            _ => Dynamic::List(Vec::new()),
        };
        planned.insert(nested.type_name.clone(), value);
    }

    Dynamic::Map(planned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::StaticDefault;
    use crate::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};

    fn schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .requires_replace()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enabled", AttributeType::Bool)
                    .optional()
                    .default(StaticDefault::bool(true))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("note", AttributeType::String)
                    .optional()
                    .build(),
            )
            .block(
                NestedBlockBuilder::single("site_config")
                    .attribute(
                        AttributeBuilder::new("ftps_state", AttributeType::String)
                            .optional()
                            .default(StaticDefault::string("Disabled"))
                            .build(),
                    )
                    .build(),
            )
            .build()
    }

    fn config(name: &str) -> DynamicValue {
        let mut config = DynamicValue::object();
        config
            .set_string(&AttributePath::new("name"), name.to_string())
            .unwrap();
        config
            .set_list(
                &AttributePath::new("site_config"),
                vec![Dynamic::Map(HashMap::new())],
            )
            .unwrap();
        config
    }

    #[test]
    fn create_plan_applies_defaults_and_unknowns() {
        let planned = plan_create(&schema(), &config("web"));

        assert_eq!(planned.get(&AttributePath::new("id")), Some(&Dynamic::Unknown));
        assert!(planned.get_bool(&AttributePath::new("enabled")).unwrap());
        assert_eq!(planned.get(&AttributePath::new("note")), Some(&Dynamic::Null));
        assert_eq!(
            planned
                .get_string(&AttributePath::new("site_config").index(0).attribute("ftps_state"))
                .unwrap(),
            "Disabled"
        );
    }

    #[test]
    fn update_plan_keeps_prior_computed_values() {
        let mut prior = plan_create(&schema(), &config("web"));
        prior
            .set_string(&AttributePath::new("id"), "/things/web".to_string())
            .unwrap();

        let planned = plan_update(&schema(), &prior, &config("web"));
        assert_eq!(
            planned.get_string(&AttributePath::new("id")).unwrap(),
            "/things/web"
        );
        assert!(requires_replace(&schema(), &prior, &planned).is_empty());
    }

    #[test]
    fn changing_forced_attribute_requires_replace() {
        let prior = plan_create(&schema(), &config("web"));
        let planned = plan_update(&schema(), &prior, &config("api"));

        assert_eq!(
            requires_replace(&schema(), &prior, &planned),
            vec![AttributePath::new("name")]
        );
    }
}
