//! `sticky_settings`: names that stay with a slot during a swap

use crate::api::sites::SlotConfigNames;
use serde::{Deserialize, Serialize};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StickySettings {
    pub app_setting_names: Vec<String>,
    pub connection_string_names: Vec<String>,
}

pub fn schema() -> NestedBlock {
    NestedBlockBuilder::list("sticky_settings")
        .max_items(1)
        .attribute(
            AttributeBuilder::new("app_setting_names", AttributeType::List(Box::new(AttributeType::String)))
                .description("App setting names that are not swapped between slots")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new(
                "connection_string_names",
                AttributeType::List(Box::new(AttributeType::String)),
            )
            .description("Connection string names that are not swapped between slots")
            .optional()
            .build(),
        )
        .build()
}

pub fn expand(input: &[StickySettings]) -> Option<SlotConfigNames> {
    input.first().map(|s| SlotConfigNames {
        app_setting_names: Some(s.app_setting_names.clone()),
        connection_string_names: Some(s.connection_string_names.clone()),
    })
}

pub fn flatten(input: Option<SlotConfigNames>) -> Vec<StickySettings> {
    let Some(names) = input else {
        return Vec::new();
    };

    let app_setting_names = names.app_setting_names.unwrap_or_default();
    let connection_string_names = names.connection_string_names.unwrap_or_default();
    if app_setting_names.is_empty() && connection_string_names.is_empty() {
        return Vec::new();
    }

    vec![StickySettings {
        app_setting_names,
        connection_string_names,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_block_expands_to_none() {
        assert!(expand(&[]).is_none());
    }

    #[test]
    fn empty_names_flatten_to_no_block() {
        assert!(flatten(None).is_empty());
        assert!(flatten(Some(SlotConfigNames {
            app_setting_names: Some(vec![]),
            connection_string_names: None,
        }))
        .is_empty());
    }

    #[test]
    fn names_flatten_to_one_block() {
        let flat = flatten(Some(SlotConfigNames {
            app_setting_names: Some(vec!["FEATURE_FLAG".to_string()]),
            connection_string_names: None,
        }));

        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].app_setting_names, vec!["FEATURE_FLAG"]);
        assert!(flat[0].connection_string_names.is_empty());
    }
}
