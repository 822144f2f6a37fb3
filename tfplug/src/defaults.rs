//! Default value providers for attributes
//!
//! Defaults are evaluated during planning when an attribute is absent from
//! configuration. See [`crate::plan`] for where they are applied.

use crate::schema::{Default, DefaultRequest, DefaultResponse};
use crate::types::{Dynamic, DynamicValue};

/// StaticDefault provides a static default value
pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    pub fn create(value: Dynamic) -> Box<dyn Default> {
        Box::new(Self { value })
    }

    pub fn string(value: &str) -> Box<dyn Default> {
        Self::create(Dynamic::String(value.to_string()))
    }

    pub fn number(value: f64) -> Box<dyn Default> {
        Self::create(Dynamic::Number(value))
    }

    pub fn bool(value: bool) -> Box<dyn Default> {
        Self::create(Dynamic::Bool(value))
    }

    /// Empty list, used for optional list attributes that should plan as []
    pub fn empty_list() -> Box<dyn Default> {
        Self::create(Dynamic::List(Vec::new()))
    }
}

impl Default for StaticDefault {
    fn description(&self) -> String {
        format!("static default value: {:?}", self.value)
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse {
            value: DynamicValue::new(self.value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributePath;

    #[test]
    fn static_defaults_return_their_value() {
        let request = || DefaultRequest {
            path: AttributePath::new("attr"),
        };

        assert_eq!(
            StaticDefault::string("Disabled")
                .default_value(request())
                .value
                .value,
            Dynamic::String("Disabled".to_string())
        );
        assert_eq!(
            StaticDefault::number(65000.0)
                .default_value(request())
                .value
                .value,
            Dynamic::Number(65000.0)
        );
        assert_eq!(
            StaticDefault::bool(true).default_value(request()).value.value,
            Dynamic::Bool(true)
        );
        assert_eq!(
            StaticDefault::empty_list()
                .default_value(request())
                .value
                .value,
            Dynamic::List(vec![])
        );
    }
}
