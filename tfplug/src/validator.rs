//! Built-in attribute validators and the config validation walker

use crate::schema::{Block, Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

/// Accepts only one of a fixed set of strings
pub struct StringOneOf {
    allowed: Vec<String>,
}

impl StringOneOf {
    pub fn create(allowed: &[&str]) -> Box<dyn Validator> {
        Box::new(Self {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl Validator for StringOneOf {
    fn description(&self) -> String {
        format!("value must be one of: {}", self.allowed.join(", "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut response = ValidatorResponse::default();
        if let Dynamic::String(s) = &request.config_value {
            if !self.allowed.iter().any(|a| a == s) {
                response.diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid value for {}", request.path),
                        format!("{}, got {:?}", self.description(), s),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        response
    }
}

/// Rejects empty strings
pub struct StringNotEmpty;

impl StringNotEmpty {
    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

impl Validator for StringNotEmpty {
    fn description(&self) -> String {
        "value must not be empty".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut response = ValidatorResponse::default();
        if let Dynamic::String(s) = &request.config_value {
            if s.trim().is_empty() {
                response.diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid value for {}", request.path),
                        self.description(),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        response
    }
}

/// Requires a string to match a regular expression
pub struct StringMatches {
    pattern: Result<regex::Regex, regex::Error>,
    message: String,
}

impl StringMatches {
    pub fn create(pattern: &str, message: &str) -> Box<dyn Validator> {
        Box::new(Self {
            pattern: regex::Regex::new(pattern),
            message: message.to_string(),
        })
    }
}

impl Validator for StringMatches {
    fn description(&self) -> String {
        self.message.clone()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut response = ValidatorResponse::default();
        let Dynamic::String(s) = &request.config_value else {
            return response;
        };
        match &self.pattern {
            Ok(pattern) if pattern.is_match(s) => {}
            Ok(_) => response.diagnostics.push(
                Diagnostic::error(
                    format!("Invalid value for {}", request.path),
                    format!("{}, got {:?}", self.message, s),
                )
                .with_attribute(request.path),
            ),
            Err(e) => response.diagnostics.push(
                Diagnostic::error(
                    format!("Invalid validator for {}", request.path),
                    e.to_string(),
                )
                .with_attribute(request.path),
            ),
        }
        response
    }
}

/// Inclusive numeric range
pub struct NumberBetween {
    min: f64,
    max: f64,
}

impl NumberBetween {
    pub fn create(min: f64, max: f64) -> Box<dyn Validator> {
        Box::new(Self { min, max })
    }
}

impl Validator for NumberBetween {
    fn description(&self) -> String {
        format!("value must be between {} and {}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut response = ValidatorResponse::default();
        if let Dynamic::Number(n) = request.config_value {
            if n < self.min || n > self.max {
                response.diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid value for {}", request.path),
                        format!("{}, got {}", self.description(), n),
                    )
                    .with_attribute(request.path),
                );
            }
        }
        response
    }
}

/// Check a configuration against a schema: required attributes, attribute
/// validators and nested block item counts. Unknown values are skipped.
pub fn validate_config(block: &Block, config: &DynamicValue) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(block, &config.value, AttributePath::root(), &mut diagnostics);
    diagnostics
}

fn validate_block(
    block: &Block,
    value: &Dynamic,
    path: AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Dynamic::Map(members) = value else {
        return;
    };

    for attr in &block.attributes {
        let attr_path = path.clone().attribute(&attr.name);
        match members.get(&attr.name) {
            None | Some(Dynamic::Null) => {
                if attr.required {
                    diagnostics.push(
                        Diagnostic::error(
                            "Missing required argument",
                            format!("The argument \"{}\" is required", attr_path),
                        )
                        .with_attribute(attr_path),
                    );
                }
            }
            Some(Dynamic::Unknown) => {}
            Some(v) => {
                for validator in &attr.validators {
                    let response = validator.validate(ValidatorRequest {
                        config_value: v.clone(),
                        path: attr_path.clone(),
                    });
                    diagnostics.extend(response.diagnostics);
                }
            }
        }
    }

    for nested in &block.block_types {
        let nested_path = path.clone().attribute(&nested.type_name);
        let items = match members.get(&nested.type_name) {
            Some(Dynamic::List(items)) => items.as_slice(),
            Some(Dynamic::Unknown) => continue,
            _ => &[],
        };

        if (items.len() as i64) < nested.min_items {
            diagnostics.push(
                Diagnostic::error(
                    "Insufficient blocks",
                    format!(
                        "At least {} \"{}\" block(s) are required",
                        nested.min_items, nested_path
                    ),
                )
                .with_attribute(nested_path.clone()),
            );
        }
        if nested.max_items > 0 && items.len() as i64 > nested.max_items {
            diagnostics.push(
                Diagnostic::error(
                    "Too many blocks",
                    format!(
                        "No more than {} \"{}\" block(s) are allowed",
                        nested.max_items, nested_path
                    ),
                )
                .with_attribute(nested_path.clone()),
            );
        }

        for (idx, item) in items.iter().enumerate() {
            validate_block(
                &nested.block,
                item,
                nested_path.clone().index(idx as i64),
                diagnostics,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};
    use std::collections::HashMap;

    fn request(value: Dynamic) -> ValidatorRequest {
        ValidatorRequest {
            config_value: value,
            path: AttributePath::new("field"),
        }
    }

    #[test]
    fn string_one_of_rejects_unknown_choice() {
        let validator = StringOneOf::create(&["Enabled", "Disabled"]);

        let ok = validator.validate(request(Dynamic::String("Enabled".to_string())));
        assert!(ok.diagnostics.is_empty());

        let bad = validator.validate(request(Dynamic::String("enabled".to_string())));
        assert_eq!(bad.diagnostics.len(), 1);
        assert!(bad.diagnostics[0].detail.contains("Enabled, Disabled"));
    }

    #[test]
    fn string_not_empty_rejects_blank() {
        let validator = StringNotEmpty::create();
        let bad = validator.validate(request(Dynamic::String("  ".to_string())));
        assert_eq!(bad.diagnostics.len(), 1);
    }

    #[test]
    fn string_matches_checks_pattern() {
        let validator = StringMatches::create(r"^\d+\.\d+$", "must be a version number");
        assert!(validator
            .validate(request(Dynamic::String("1.2".to_string())))
            .diagnostics
            .is_empty());
        let bad = validator.validate(request(Dynamic::String("v1".to_string())));
        assert!(bad.diagnostics[0].detail.contains("must be a version number"));
    }

    #[test]
    fn number_between_is_inclusive() {
        let validator = NumberBetween::create(2.0, 10.0);
        assert!(validator
            .validate(request(Dynamic::Number(2.0)))
            .diagnostics
            .is_empty());
        assert!(validator
            .validate(request(Dynamic::Number(10.0)))
            .diagnostics
            .is_empty());
        assert_eq!(
            validator
                .validate(request(Dynamic::Number(11.0)))
                .diagnostics
                .len(),
            1
        );
    }

    #[test]
    fn validate_config_walks_nested_blocks() {
        let schema = SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .block(
                NestedBlockBuilder::single("site_config")
                    .min_items(1)
                    .attribute(
                        AttributeBuilder::new("ftps_state", AttributeType::String)
                            .optional()
                            .validator(StringOneOf::create(&["AllAllowed", "Disabled"]))
                            .build(),
                    )
                    .build(),
            )
            .build();

        let mut config = DynamicValue::object();
        config
            .set_list(
                &AttributePath::new("site_config"),
                vec![Dynamic::Map(HashMap::from([(
                    "ftps_state".to_string(),
                    Dynamic::String("Sometimes".to_string()),
                )]))],
            )
            .unwrap();

        let diags = validate_config(&schema.block, &config);
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().any(|d| d.detail.contains("\"name\" is required")));
        assert!(diags
            .iter()
            .any(|d| d.summary.contains("site_config[0].ftps_state")));
    }

    #[test]
    fn validate_config_enforces_max_items() {
        let schema = SchemaBuilder::new()
            .block(NestedBlockBuilder::single("identity").build())
            .build();

        let mut config = DynamicValue::object();
        config
            .set_list(
                &AttributePath::new("identity"),
                vec![
                    Dynamic::Map(HashMap::new()),
                    Dynamic::Map(HashMap::new()),
                ],
            )
            .unwrap();

        let diags = validate_config(&schema.block, &config);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Too many blocks");
    }
}
