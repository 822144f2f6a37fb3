//! Import helpers for simplifying resource import implementations

use crate::context::Context;
use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, DynamicValue};

/// Sets the import ID to a specific attribute in state
///
/// This is useful for resources whose Read only needs the ID to rebuild the
/// rest of the state.
///
/// Example: ID "/subscriptions/.../sites/web" -> state.id = "/subscriptions/.../sites/web"
pub fn import_state_passthrough_id(
    _ctx: &Context,
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let mut state = DynamicValue::object();

    if let Err(e) = state.set_string(&attr_path, request.id.clone()) {
        response.diagnostics.push(
            Diagnostic::error(
                format!("Failed to set import ID: {}", e),
                format!("Could not set attribute '{}' to value '{}'", attr_path, request.id),
            )
            .with_attribute(attr_path),
        );
        return;
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_sets_id_attribute() {
        let request = ImportResourceStateRequest {
            type_name: "example_thing".to_string(),
            id: "/things/1".to_string(),
        };
        let mut response = ImportResourceStateResponse::default();

        import_state_passthrough_id(
            &Context::new(),
            AttributePath::new("id"),
            &request,
            &mut response,
        );

        assert!(response.diagnostics.is_empty());
        assert_eq!(response.imported_resources.len(), 1);
        assert_eq!(
            response.imported_resources[0]
                .state
                .get_string(&AttributePath::new("id"))
                .unwrap(),
            "/things/1"
        );
    }
}
