//! Schema types and builders for tfplug
//!
//! This module provides the schema system for defining resource and data source
//! schemas, including attribute types, nested blocks, defaults and validation.

use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::collections::HashMap;
use std::sync::Arc;

/// AttributeType defines the type system for Terraform attributes
/// This must match Terraform's type system exactly
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number, // Always f64
    Bool,
    List(Box<AttributeType>),               // Ordered, allows duplicates
    Set(Box<AttributeType>),                // Unordered, no duplicates
    Map(Box<AttributeType>),                // String keys only
    Object(HashMap<String, AttributeType>), // Fixed structure
}

/// Schema is returned by providers/resources/data sources
/// Version is used for state migration
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64, // Increment when schema changes require migration
    pub block: Block, // Root block containing all attributes
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attribute(name)
    }
}

/// Block represents a configuration block
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub attributes: Vec<Attribute>,
    pub block_types: Vec<NestedBlock>,
    pub description: String,
    pub deprecated: bool,
}

impl Block {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn nested_block(&self, name: &str) -> Option<&NestedBlock> {
        self.block_types.iter().find(|b| b.type_name == name)
    }
}

/// Attribute represents a single configuration attribute
/// Validators and defaults are shared so schemas stay cheap to clone
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub requires_replace: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub default: Option<Arc<dyn Default>>,
    pub deprecated: bool,
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field("requires_replace", &self.requires_replace)
            .field("validators", &self.validators.len())
            .field("default", &self.default.is_some())
            .finish()
    }
}

/// NestedBlock represents a nested configuration block
#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub type_name: String,
    pub block: Block,
    pub nesting: NestingMode,
    pub min_items: i64,
    pub max_items: i64,
    pub requires_replace: bool,
}

/// NestingMode defines how nested blocks are structured
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NestingMode {
    Single,
    List,
    Set,
}

/// Validator performs validation on attribute values during planning
/// Implement this for custom validation logic
pub trait Validator: Send + Sync {
    /// Human-readable description
    fn description(&self) -> String;
    /// Perform validation
    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse;
}

/// Request for validators
pub struct ValidatorRequest {
    pub config_value: Dynamic,
    pub path: AttributePath,
}

/// Response from validators
#[derive(Default)]
pub struct ValidatorResponse {
    pub diagnostics: Vec<Diagnostic>,
}

/// Default provides default values for optional attributes
/// Called when attribute is not set in configuration
pub trait Default: Send + Sync {
    /// Human-readable description
    fn description(&self) -> String;
    /// Provide default value
    fn default_value(&self, request: DefaultRequest) -> DefaultResponse;
}

/// Request for default values
pub struct DefaultRequest {
    pub path: AttributePath,
}

/// Response with default value
pub struct DefaultResponse {
    pub value: DynamicValue,
}

/// AttributeBuilder provides fluent API for building attributes
/// ALWAYS use this instead of constructing Attribute directly
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    /// Create a new attribute builder
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                requires_replace: false,
                validators: Vec::new(),
                default: None,
                deprecated: false,
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    /// Changing this attribute destroys and recreates the resource
    pub fn requires_replace(mut self) -> Self {
        self.attribute.requires_replace = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    pub fn validator(mut self, validator: Box<dyn Validator>) -> Self {
        self.attribute.validators.push(Arc::from(validator));
        self
    }

    /// Set default. Defaulted attributes are also computed.
    pub fn default(mut self, default: Box<dyn Default>) -> Self {
        self.attribute.default = Some(Arc::from(default));
        self.attribute.computed = true;
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// NestedBlockBuilder provides the same fluent style for nested blocks
pub struct NestedBlockBuilder {
    nested: NestedBlock,
}

impl NestedBlockBuilder {
    /// A repeatable block, stored as a list of objects
    pub fn list(type_name: &str) -> Self {
        Self {
            nested: NestedBlock {
                type_name: type_name.to_string(),
                block: Block::default(),
                nesting: NestingMode::List,
                min_items: 0,
                max_items: 0,
                requires_replace: false,
            },
        }
    }

    /// A block that may appear at most once, stored as a one-element list
    pub fn single(type_name: &str) -> Self {
        Self::list(type_name).max_items(1)
    }

    pub fn set(type_name: &str) -> Self {
        let mut builder = Self::list(type_name);
        builder.nested.nesting = NestingMode::Set;
        builder
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.nested.block.description = desc.to_string();
        self
    }

    pub fn min_items(mut self, min: i64) -> Self {
        self.nested.min_items = min;
        self
    }

    pub fn max_items(mut self, max: i64) -> Self {
        self.nested.max_items = max;
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.nested.requires_replace = true;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.nested.block.attributes.push(attr);
        self
    }

    pub fn attributes(mut self, attrs: impl IntoIterator<Item = Attribute>) -> Self {
        self.nested.block.attributes.extend(attrs);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.nested.block.block_types.push(block);
        self
    }

    pub fn blocks(mut self, blocks: impl IntoIterator<Item = NestedBlock>) -> Self {
        self.nested.block.block_types.extend(blocks);
        self
    }

    pub fn build(self) -> NestedBlock {
        self.nested
    }
}

/// SchemaBuilder provides fluent API for building schemas
/// ALWAYS use this for consistency
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block::default(),
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    /// Add several attributes at once, typically a shared group
    pub fn attributes(mut self, attrs: impl IntoIterator<Item = Attribute>) -> Self {
        self.schema.block.attributes.extend(attrs);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.schema.block.block_types.push(block);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.schema.block.deprecated = true;
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl std::default::Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::StaticDefault;

    #[test]
    fn attribute_builder_creates_required_string() {
        let attr = AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the resource")
            .required()
            .requires_replace()
            .build();

        assert_eq!(attr.name, "name");
        assert!(matches!(attr.r#type, AttributeType::String));
        assert!(attr.required);
        assert!(!attr.optional);
        assert!(attr.requires_replace);
        assert_eq!(attr.description, "The name of the resource");
    }

    #[test]
    fn defaulted_attribute_is_computed() {
        let attr = AttributeBuilder::new("enabled", AttributeType::Bool)
            .optional()
            .default(StaticDefault::bool(true))
            .build();

        assert!(attr.optional);
        assert!(attr.computed);
        assert!(attr.default.is_some());
    }

    #[test]
    fn nested_block_builder_limits_single_blocks() {
        let block = NestedBlockBuilder::single("identity")
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .required()
                    .build(),
            )
            .build();

        assert_eq!(block.max_items, 1);
        assert_eq!(block.nesting, NestingMode::List);
        assert!(block.block.attribute("type").is_some());
    }

    #[test]
    fn schema_builder_creates_schema_with_attributes_and_blocks() {
        let schema = SchemaBuilder::new()
            .version(1)
            .description("Test resource schema")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .block(NestedBlockBuilder::list("rule").build())
            .build();

        assert_eq!(schema.version, 1);
        assert_eq!(schema.block.attributes.len(), 2);
        assert!(schema.block.nested_block("rule").is_some());
        assert!(schema.attribute("name").unwrap().required);
    }
}
