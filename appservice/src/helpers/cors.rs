//! `cors` block

use crate::api::sites::CorsSettings;
use serde::{Deserialize, Serialize};
use tfplug::defaults::StaticDefault;
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsSetting {
    pub allowed_origins: Vec<String>,
    pub support_credentials: bool,
}

pub fn schema() -> NestedBlock {
    NestedBlockBuilder::list("cors")
        .max_items(1)
        .attribute(
            AttributeBuilder::new("allowed_origins", AttributeType::Set(Box::new(AttributeType::String)))
                .description("Origins that may make cross-origin calls")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("support_credentials", AttributeType::Bool)
                .description("Whether CORS requests with credentials are allowed")
                .optional()
                .default(StaticDefault::bool(false))
                .build(),
        )
        .build()
}

/// Removing the block sends empty settings so the service clears them
pub fn expand(input: &[CorsSetting]) -> CorsSettings {
    match input.first() {
        Some(cors) => CorsSettings {
            allowed_origins: Some(cors.allowed_origins.clone()),
            support_credentials: Some(cors.support_credentials),
        },
        None => CorsSettings::default(),
    }
}

pub fn flatten(input: Option<&CorsSettings>) -> Vec<CorsSetting> {
    let Some(cors) = input else {
        return Vec::new();
    };

    let allowed_origins = cors.allowed_origins.clone().unwrap_or_default();
    let support_credentials = cors.support_credentials.unwrap_or(false);
    if allowed_origins.is_empty() && !support_credentials {
        return Vec::new();
    }

    vec![CorsSetting {
        allowed_origins,
        support_credentials,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_block_expands_to_empty_settings() {
        assert_eq!(expand(&[]), CorsSettings::default());
    }

    #[test]
    fn flatten_drops_default_settings() {
        assert!(flatten(None).is_empty());
        assert!(flatten(Some(&CorsSettings {
            allowed_origins: Some(vec![]),
            support_credentials: Some(false),
        }))
        .is_empty());

        let flat = flatten(Some(&CorsSettings {
            allowed_origins: None,
            support_credentials: Some(true),
        }));
        assert_eq!(
            flat,
            vec![CorsSetting {
                allowed_origins: vec![],
                support_credentials: true
            }]
        );
    }
}
