//! Core type system for tfplug
//!
//! This module provides the core types used throughout the framework:
//! Dynamic values, attribute paths and diagnostics. Handlers usually work
//! with typed models and convert at the edges with
//! [`DynamicValue::decode_model`] and [`DynamicValue::from_model`].

use crate::error::{Result, TfplugError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

const UNKNOWN_SENTINEL: &str = "__unknown__";

/// Dynamic represents Terraform values that can be of any type
/// This is the core type for all configuration and state data
/// IMPORTANT: Always use type-safe accessors instead of matching directly
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    /// Explicit null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Number value (all numbers are f64 to match Terraform)
    Number(f64),
    /// String value
    String(String),
    /// List of values (ordered, allows duplicates)
    List(Vec<Dynamic>),
    /// Map of string keys to values (objects are represented as Maps)
    Map(HashMap<String, Dynamic>),
    /// Value not yet known (during planning)
    Unknown,
}

impl Dynamic {
    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
            Dynamic::Unknown => "unknown",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Dynamic::Unknown)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to JSON, dropping null and unknown object members so that
    /// serde defaults apply when decoding a typed model.
    fn to_pruned_json(&self) -> serde_json::Value {
        match self {
            Dynamic::Null | Dynamic::Unknown => serde_json::Value::Null,
            Dynamic::Bool(b) => serde_json::Value::Bool(*b),
            Dynamic::Number(n) => number_to_json(*n),
            Dynamic::String(s) => serde_json::Value::String(s.clone()),
            Dynamic::List(items) => {
                serde_json::Value::Array(items.iter().map(Dynamic::to_pruned_json).collect())
            }
            Dynamic::Map(members) => serde_json::Value::Object(
                members
                    .iter()
                    .filter(|(_, v)| !v.is_null() && !v.is_unknown())
                    .map(|(k, v)| (k.clone(), v.to_pruned_json()))
                    .collect(),
            ),
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    // integral values go out as integers so that i64 model fields decode
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl From<serde_json::Value> for Dynamic {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Dynamic::Null,
            serde_json::Value::Bool(b) => Dynamic::Bool(b),
            serde_json::Value::Number(n) => Dynamic::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) if s == UNKNOWN_SENTINEL => Dynamic::Unknown,
            serde_json::Value::String(s) => Dynamic::String(s),
            serde_json::Value::Array(items) => {
                Dynamic::List(items.into_iter().map(Dynamic::from).collect())
            }
            serde_json::Value::Object(members) => Dynamic::Map(
                members
                    .into_iter()
                    .map(|(k, v)| (k, Dynamic::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Dynamic {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Dynamic::Null => serializer.serialize_unit(),
            Dynamic::Bool(b) => serializer.serialize_bool(*b),
            Dynamic::Number(n) => serializer.serialize_f64(*n),
            Dynamic::String(s) => serializer.serialize_str(s),
            Dynamic::List(l) => l.serialize(serializer),
            Dynamic::Map(m) => m.serialize(serializer),
            Dynamic::Unknown => serializer.serialize_str(UNKNOWN_SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for Dynamic {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Dynamic::from)
    }
}

/// DynamicValue wraps Dynamic and provides encoding/decoding capabilities
/// This is what gets passed between Terraform and the provider
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    pub value: Dynamic,
}

impl DynamicValue {
    pub fn new(value: Dynamic) -> Self {
        Self { value }
    }

    pub fn null() -> Self {
        Self {
            value: Dynamic::Null,
        }
    }

    pub fn unknown() -> Self {
        Self {
            value: Dynamic::Unknown,
        }
    }

    /// An empty object, the usual starting point for building state
    pub fn object() -> Self {
        Self {
            value: Dynamic::Map(HashMap::new()),
        }
    }

    /// Decode into a typed model. Null and unknown attributes are treated
    /// as absent, so `#[serde(default)]` fields pick up their defaults.
    pub fn decode_model<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.value.to_pruned_json())
            .map_err(|e| TfplugError::DecodingError(format!("model decoding failed: {}", e)))
    }

    /// Encode a typed model. `None` fields become null attributes.
    pub fn from_model<T: Serialize>(model: &T) -> Result<Self> {
        let json = serde_json::to_value(model)
            .map_err(|e| TfplugError::EncodingError(format!("model encoding failed: {}", e)))?;
        Ok(Self {
            value: Dynamic::from(json),
        })
    }

    /// Type-safe accessors - ALWAYS use these instead of pattern matching
    /// These handle path navigation and type checking
    pub fn get_string(&self, path: &AttributePath) -> Result<String> {
        match self.navigate_path(path)? {
            Dynamic::String(s) => Ok(s.clone()),
            other => Err(mismatch(path, "string", other)),
        }
    }

    pub fn get_number(&self, path: &AttributePath) -> Result<f64> {
        match self.navigate_path(path)? {
            Dynamic::Number(n) => Ok(*n),
            other => Err(mismatch(path, "number", other)),
        }
    }

    pub fn get_bool(&self, path: &AttributePath) -> Result<bool> {
        match self.navigate_path(path)? {
            Dynamic::Bool(b) => Ok(*b),
            other => Err(mismatch(path, "bool", other)),
        }
    }

    pub fn get_list(&self, path: &AttributePath) -> Result<Vec<Dynamic>> {
        match self.navigate_path(path)? {
            Dynamic::List(l) => Ok(l.clone()),
            other => Err(mismatch(path, "list", other)),
        }
    }

    pub fn get_map(&self, path: &AttributePath) -> Result<HashMap<String, Dynamic>> {
        match self.navigate_path(path)? {
            Dynamic::Map(m) => Ok(m.clone()),
            other => Err(mismatch(path, "map", other)),
        }
    }

    /// Like [`DynamicValue::get_string`] but maps missing, null and unknown
    /// values to `None`
    pub fn get_optional_string(&self, path: &AttributePath) -> Result<Option<String>> {
        match self.get(path) {
            None | Some(Dynamic::Null) | Some(Dynamic::Unknown) => Ok(None),
            Some(Dynamic::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(mismatch(path, "string", other)),
        }
    }

    /// Raw lookup, `None` when any step of the path is missing
    pub fn get(&self, path: &AttributePath) -> Option<&Dynamic> {
        self.navigate_path(path).ok()
    }

    /// Type-safe setters - Use for building state/config objects
    pub fn set_string(&mut self, path: &AttributePath, value: String) -> Result<()> {
        self.set_value(path, Dynamic::String(value))
    }

    pub fn set_number(&mut self, path: &AttributePath, value: f64) -> Result<()> {
        self.set_value(path, Dynamic::Number(value))
    }

    pub fn set_bool(&mut self, path: &AttributePath, value: bool) -> Result<()> {
        self.set_value(path, Dynamic::Bool(value))
    }

    pub fn set_list(&mut self, path: &AttributePath, value: Vec<Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::List(value))
    }

    pub fn set_map(&mut self, path: &AttributePath, value: HashMap<String, Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::Map(value))
    }

    pub fn set_null(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Null)
    }

    /// Helpers for handling unknown values during planning
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn is_unknown(&self) -> bool {
        self.value.is_unknown()
    }

    /// Mark computed values as unknown during planning
    pub fn mark_unknown(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Unknown)
    }

    fn navigate_path<'a>(&'a self, path: &AttributePath) -> Result<&'a Dynamic> {
        let mut current = &self.value;

        for step in &path.steps {
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => m
                    .get(name)
                    .ok_or_else(|| TfplugError::AttributeNotFound(path.to_string()))?,
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => usize::try_from(*idx)
                    .ok()
                    .and_then(|idx| l.get(idx))
                    .ok_or_else(|| TfplugError::AttributeNotFound(path.to_string()))?,
                (Dynamic::Null, _) => return Err(TfplugError::AttributeNotFound(path.to_string())),
                _ => return Err(TfplugError::InvalidPath(path.to_string())),
            };
        }

        Ok(current)
    }

    fn set_value(&mut self, path: &AttributePath, new_value: Dynamic) -> Result<()> {
        let Some((last, parents)) = path.steps.split_last() else {
            self.value = new_value;
            return Ok(());
        };

        let mut current = &mut self.value;
        for (idx, step) in parents.iter().enumerate() {
            let next_is_index = matches!(
                path.steps.get(idx + 1),
                Some(AttributePathStep::ElementKeyInt(_))
            );
            if current.is_null() || current.is_unknown() {
                *current = Dynamic::Map(HashMap::new());
            }
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                    m.entry(name.clone()).or_insert_with(|| {
                        if next_is_index {
                            Dynamic::List(Vec::new())
                        } else {
                            Dynamic::Map(HashMap::new())
                        }
                    })
                }
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(i)) => usize::try_from(*i)
                    .ok()
                    .and_then(|i| l.get_mut(i))
                    .ok_or_else(|| TfplugError::InvalidPath(path.to_string()))?,
                _ => return Err(TfplugError::InvalidPath(path.to_string())),
            };
        }

        if current.is_null() || current.is_unknown() {
            *current = Dynamic::Map(HashMap::new());
        }
        match (current, last) {
            (Dynamic::Map(m), AttributePathStep::AttributeName(name))
            | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                m.insert(name.clone(), new_value);
                Ok(())
            }
            (Dynamic::List(l), AttributePathStep::ElementKeyInt(i)) => {
                match usize::try_from(*i).ok().and_then(|i| l.get_mut(i)) {
                    Some(slot) => {
                        *slot = new_value;
                        Ok(())
                    }
                    None => Err(TfplugError::InvalidPath(path.to_string())),
                }
            }
            _ => Err(TfplugError::InvalidPath(path.to_string())),
        }
    }
}

fn mismatch(path: &AttributePath, expected: &str, actual: &Dynamic) -> TfplugError {
    TfplugError::TypeMismatch {
        path: path.to_string(),
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
}

/// AttributePath represents a path to an attribute within a DynamicValue
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePath {
    pub steps: Vec<AttributePathStep>,
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self {
            steps: vec![AttributePathStep::AttributeName(name.to_string())],
        }
    }

    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.steps
            .push(AttributePathStep::AttributeName(name.to_string()));
        self
    }

    pub fn index(mut self, idx: i64) -> Self {
        self.steps.push(AttributePathStep::ElementKeyInt(idx));
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.steps
            .push(AttributePathStep::ElementKeyString(key.to_string()));
        self
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                AttributePathStep::AttributeName(name) if i == 0 => write!(f, "{}", name)?,
                AttributePathStep::AttributeName(name) => write!(f, ".{}", name)?,
                AttributePathStep::ElementKeyString(key) => write!(f, "[{:?}]", key)?,
                AttributePathStep::ElementKeyInt(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

/// Individual step in an AttributePath
#[derive(Debug, Clone, PartialEq)]
pub enum AttributePathStep {
    /// Access attribute by name in object/map
    AttributeName(String),
    /// Access element by string key (for maps)
    ElementKeyString(String),
    /// Access element by integer index (for lists)
    ElementKeyInt(i64),
}

/// Diagnostic represents a warning or error from the provider
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, path: AttributePath) -> Self {
        self.attribute = Some(path);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// True if any diagnostic in the slice is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
