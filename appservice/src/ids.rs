//! Azure resource IDs for the App Service resource types
//!
//! Parsing matches the segment keywords case-insensitively, since ARM echoes
//! IDs back with varying casing (`serverfarms` vs `serverFarms`). Display is
//! always the canonical form.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("parsing {kind} ID {input:?}: {reason}")]
pub struct IdError {
    pub kind: &'static str,
    pub input: String,
    pub reason: String,
}

/// A fixed keyword segment followed by a user value, or a fixed pair
/// (`providers/Microsoft.Web`) whose value is part of the pattern
type Segment = (&'static str, Option<&'static str>);

const PROVIDER: Segment = ("providers", Some("Microsoft.Web"));

fn parse_segments(
    input: &str,
    kind: &'static str,
    pattern: &[Segment],
) -> Result<Vec<String>, IdError> {
    let error = |reason: String| IdError {
        kind,
        input: input.to_string(),
        reason,
    };

    let trimmed = input
        .strip_prefix('/')
        .ok_or_else(|| error("expected a leading '/'".to_string()))?;
    let parts: Vec<&str> = trimmed.trim_end_matches('/').split('/').collect();

    if parts.len() != pattern.len() * 2 {
        return Err(error(format!(
            "expected {} segments, got {}",
            pattern.len() * 2,
            parts.len()
        )));
    }

    let mut values = Vec::new();
    for (pair, (keyword, fixed)) in parts.chunks(2).zip(pattern) {
        let (key, value) = (pair[0], pair[1]);
        if !key.eq_ignore_ascii_case(keyword) {
            return Err(error(format!("expected segment {:?}, got {:?}", keyword, key)));
        }
        if value.is_empty() {
            return Err(error(format!("segment {:?} has no value", keyword)));
        }
        match fixed {
            Some(expected) if !value.eq_ignore_ascii_case(expected) => {
                return Err(error(format!(
                    "expected {:?} to be {:?}, got {:?}",
                    keyword, expected, value
                )));
            }
            Some(_) => {}
            None => values.push(value.to_string()),
        }
    }

    Ok(values)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WebAppId {
    pub subscription_id: String,
    pub resource_group: String,
    pub site_name: String,
}

impl WebAppId {
    pub fn new(subscription_id: &str, resource_group: &str, site_name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            site_name: site_name.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, IdError> {
        let v = parse_segments(
            input,
            "Web App",
            &[
                ("subscriptions", None),
                ("resourceGroups", None),
                PROVIDER,
                ("sites", None),
            ],
        )?;
        Ok(Self::new(&v[0], &v[1], &v[2]))
    }

    pub fn slot(&self, slot_name: &str) -> WebAppSlotId {
        WebAppSlotId {
            subscription_id: self.subscription_id.clone(),
            resource_group: self.resource_group.clone(),
            site_name: self.site_name.clone(),
            slot_name: slot_name.to_string(),
        }
    }
}

impl fmt::Display for WebAppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Web/sites/{}",
            self.subscription_id, self.resource_group, self.site_name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WebAppSlotId {
    pub subscription_id: String,
    pub resource_group: String,
    pub site_name: String,
    pub slot_name: String,
}

impl WebAppSlotId {
    pub fn parse(input: &str) -> Result<Self, IdError> {
        let v = parse_segments(
            input,
            "Web App Slot",
            &[
                ("subscriptions", None),
                ("resourceGroups", None),
                PROVIDER,
                ("sites", None),
                ("slots", None),
            ],
        )?;
        Ok(Self {
            subscription_id: v[0].clone(),
            resource_group: v[1].clone(),
            site_name: v[2].clone(),
            slot_name: v[3].clone(),
        })
    }

    /// The App the slot belongs to
    pub fn parent(&self) -> WebAppId {
        WebAppId::new(&self.subscription_id, &self.resource_group, &self.site_name)
    }
}

impl fmt::Display for WebAppSlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/slots/{}", self.parent(), self.slot_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServicePlanId {
    pub subscription_id: String,
    pub resource_group: String,
    pub server_farm_name: String,
}

impl ServicePlanId {
    pub fn parse(input: &str) -> Result<Self, IdError> {
        let v = parse_segments(
            input,
            "App Service Plan",
            &[
                ("subscriptions", None),
                ("resourceGroups", None),
                PROVIDER,
                ("serverFarms", None),
            ],
        )?;
        Ok(Self {
            subscription_id: v[0].clone(),
            resource_group: v[1].clone(),
            server_farm_name: v[2].clone(),
        })
    }
}

impl fmt::Display for ServicePlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Web/serverFarms/{}",
            self.subscription_id, self.resource_group, self.server_farm_name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StaticSiteId {
    pub subscription_id: String,
    pub resource_group: String,
    pub static_site_name: String,
}

impl StaticSiteId {
    pub fn new(subscription_id: &str, resource_group: &str, static_site_name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            static_site_name: static_site_name.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, IdError> {
        let v = parse_segments(
            input,
            "Static Web App",
            &[
                ("subscriptions", None),
                ("resourceGroups", None),
                PROVIDER,
                ("staticSites", None),
            ],
        )?;
        Ok(Self::new(&v[0], &v[1], &v[2]))
    }
}

impl fmt::Display for StaticSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Web/staticSites/{}",
            self.subscription_id, self.resource_group, self.static_site_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Web/sites/web-1";

    #[test]
    fn web_app_id_round_trips() {
        let id = WebAppId::parse(APP).unwrap();
        assert_eq!(id.site_name, "web-1");
        assert_eq!(id.to_string(), APP);
    }

    #[test]
    fn parsing_ignores_keyword_case() {
        let id = ServicePlanId::parse(
            "/subscriptions/sub-1/resourcegroups/rg-1/providers/microsoft.web/serverfarms/plan-1",
        )
        .unwrap();
        assert_eq!(id.server_farm_name, "plan-1");
        assert_eq!(
            id.to_string(),
            "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Web/serverFarms/plan-1"
        );
    }

    #[test]
    fn slot_id_derives_parent_app() {
        let slot = WebAppSlotId::parse(&format!("{}/slots/staging", APP)).unwrap();
        assert_eq!(slot.slot_name, "staging");
        assert_eq!(slot.parent().to_string(), APP);
        assert_eq!(slot.parent().slot("staging"), slot);
    }

    #[test]
    fn app_id_is_not_a_slot_id() {
        let err = WebAppSlotId::parse(APP).unwrap_err();
        assert_eq!(err.kind, "Web App Slot");
        assert!(err.to_string().contains("expected 10 segments"));
    }

    #[test]
    fn wrong_provider_is_rejected() {
        let err = WebAppId::parse(
            "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Storage/sites/web-1",
        )
        .unwrap_err();
        assert!(err.reason.contains("Microsoft.Web"));
    }

    #[test]
    fn missing_leading_slash_is_rejected() {
        assert!(StaticSiteId::parse("subscriptions/s/resourceGroups/r").is_err());
    }
}
