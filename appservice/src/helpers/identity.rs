//! `identity` block

use super::ExpandError;
use crate::api::common::{ManagedServiceIdentity, UserAssignedIdentity};
use serde::{Deserialize, Serialize};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder};
use tfplug::validator::StringOneOf;

pub const SYSTEM_ASSIGNED: &str = "SystemAssigned";
pub const USER_ASSIGNED: &str = "UserAssigned";
pub const SYSTEM_ASSIGNED_USER_ASSIGNED: &str = "SystemAssigned, UserAssigned";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    #[serde(rename = "type")]
    pub identity_type: String,
    pub identity_ids: Vec<String>,
    pub principal_id: String,
    pub tenant_id: String,
}

pub fn schema() -> NestedBlock {
    NestedBlockBuilder::list("identity")
        .max_items(1)
        .attribute(
            AttributeBuilder::new("type", AttributeType::String)
                .description("The type of Managed Service Identity")
                .required()
                .validator(StringOneOf::create(&[
                    SYSTEM_ASSIGNED,
                    USER_ASSIGNED,
                    SYSTEM_ASSIGNED_USER_ASSIGNED,
                ]))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("identity_ids", AttributeType::Set(Box::new(AttributeType::String)))
                .description("User Assigned Managed Identity IDs")
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("principal_id", AttributeType::String)
                .computed()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("tenant_id", AttributeType::String)
                .computed()
                .build(),
        )
        .build()
}

/// The body that removes every identity from a resource
pub fn none() -> ManagedServiceIdentity {
    ManagedServiceIdentity {
        identity_type: "None".to_string(),
        ..Default::default()
    }
}

pub fn expand(input: &[Identity]) -> Result<Option<ManagedServiceIdentity>, ExpandError> {
    let Some(identity) = input.first() else {
        return Ok(None);
    };

    let user_assigned = identity.identity_type.contains(USER_ASSIGNED);
    if user_assigned && identity.identity_ids.is_empty() {
        return Err(ExpandError::new(
            "`identity_ids` must be specified when `type` includes `UserAssigned`",
        ));
    }
    if !user_assigned && !identity.identity_ids.is_empty() {
        return Err(ExpandError::new(
            "`identity_ids` can only be specified when `type` includes `UserAssigned`",
        ));
    }

    let user_assigned_identities = user_assigned.then(|| {
        identity
            .identity_ids
            .iter()
            .map(|id| (id.clone(), UserAssignedIdentity::default()))
            .collect()
    });

    Ok(Some(ManagedServiceIdentity {
        identity_type: identity.identity_type.clone(),
        principal_id: None,
        tenant_id: None,
        user_assigned_identities,
    }))
}

pub fn flatten(input: Option<&ManagedServiceIdentity>) -> Vec<Identity> {
    let Some(identity) = input.filter(|i| !i.identity_type.eq_ignore_ascii_case("None")) else {
        return Vec::new();
    };

    let mut identity_ids: Vec<String> = identity
        .user_assigned_identities
        .as_ref()
        .map(|ids| ids.keys().cloned().collect())
        .unwrap_or_default();
    identity_ids.sort();

    vec![Identity {
        identity_type: normalize_type(&identity.identity_type),
        identity_ids,
        principal_id: identity.principal_id.clone().unwrap_or_default(),
        tenant_id: identity.tenant_id.clone().unwrap_or_default(),
    }]
}

// ARM reports the combined type with or without the space
fn normalize_type(input: &str) -> String {
    if input.eq_ignore_ascii_case("SystemAssigned,UserAssigned")
        || input.eq_ignore_ascii_case(SYSTEM_ASSIGNED_USER_ASSIGNED)
    {
        SYSTEM_ASSIGNED_USER_ASSIGNED.to_string()
    } else {
        input.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn user_assigned_requires_ids() {
        let identity = Identity {
            identity_type: USER_ASSIGNED.to_string(),
            ..Default::default()
        };
        assert!(expand(&[identity]).is_err());
    }

    #[test]
    fn expand_system_and_user_assigned() {
        let id = "/subscriptions/0000/resourceGroups/rg/providers/Microsoft.ManagedIdentity/userAssignedIdentities/uai";
        let expanded = expand(&[Identity {
            identity_type: SYSTEM_ASSIGNED_USER_ASSIGNED.to_string(),
            identity_ids: vec![id.to_string()],
            ..Default::default()
        }])
        .unwrap()
        .unwrap();

        assert_eq!(expanded.identity_type, "SystemAssigned, UserAssigned");
        assert!(expanded.user_assigned_identities.unwrap().contains_key(id));
        assert!(expand(&[]).unwrap().is_none());
    }

    #[test]
    fn flatten_reports_principal() {
        let api = ManagedServiceIdentity {
            identity_type: "SystemAssigned,UserAssigned".to_string(),
            principal_id: Some("p".to_string()),
            tenant_id: Some("t".to_string()),
            user_assigned_identities: Some(HashMap::from([(
                "b".to_string(),
                UserAssignedIdentity::default(),
            ), ("a".to_string(), UserAssignedIdentity::default())])),
        };

        let flat = flatten(Some(&api));
        assert_eq!(flat[0].identity_type, SYSTEM_ASSIGNED_USER_ASSIGNED);
        assert_eq!(flat[0].identity_ids, vec!["a", "b"]);
        assert_eq!(flat[0].principal_id, "p");
        assert!(flatten(Some(&none())).is_empty());
    }
}
