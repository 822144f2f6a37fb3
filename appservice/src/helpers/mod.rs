//! Expand/flatten between Terraform models and ARM request bodies
//!
//! Each submodule owns one nested block: its schema, the typed model that
//! `DynamicValue::decode_model` produces for it, and the pure functions that
//! turn that model into the ARM shape (expand) and back (flatten). Absent
//! ARM sub-objects always flatten to an empty block list.

pub mod app_settings;
pub mod auth_settings;
pub mod auth_settings_v2;
pub mod connection_strings;
pub mod cors;
pub mod function_app;
pub mod fx_version;
pub mod identity;
pub mod ip_restrictions;
pub mod service_plan;
pub mod site_config;
pub mod static_web_app;
pub mod sticky_settings;

/// Cross-field validation failure found while building an ARM body
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ExpandError {
    pub message: String,
}

impl ExpandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `Some(value)` unless the string is empty
pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// `Some(items)` unless the list is empty
pub(crate) fn non_empty_list(items: &[String]) -> Option<Vec<String>> {
    if items.is_empty() {
        None
    } else {
        Some(items.to_vec())
    }
}

/// Strips `http://` or `https://` from a registry URL
pub(crate) fn trim_url_scheme(url: &str) -> &str {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
}
